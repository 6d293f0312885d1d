//! Bridging a child process' stdio to async byte streams

use anyhow::{anyhow, bail, Context};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Longest stderr tail kept for error messages
const STDERR_LIMIT: usize = 4096;

/// Pump `input` into the child's stdin and its stdout into `output`
///
/// Returns `Ok(())` when the child exits successfully or `cancel` fires
/// (the child is killed), an error when it exits unsuccessfully or its
/// stdout breaks. The end of `input` only closes the child's stdin.
pub(crate) async fn pump<R, W>(
    mut child: Child,
    mut input: R,
    mut output: W,
    cancel: CancellationToken,
    what: &str,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stdin = child.stdin.take().context("child stdin not captured")?;
    let mut stdout = child.stdout.take().context("child stdout not captured")?;
    let stderr = child.stderr.take().map(collect_stderr);

    let copy_in = async {
        let result = tokio::io::copy(&mut input, &mut stdin).await;
        let _ = stdin.shutdown().await;
        result
    };
    let copy_out = tokio::io::copy(&mut stdout, &mut output);
    tokio::pin!(copy_in, copy_out);

    let mut input_done = false;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                return Ok(());
            }
            result = &mut copy_in, if !input_done => {
                input_done = true;
                if let Err(e) = result {
                    tracing::debug!("{} input closed: {}", what, e);
                }
            }
            result = &mut copy_out => {
                if let Err(e) = result {
                    let _ = child.kill().await;
                    return Err(anyhow!(e).context(format!("{} output broken", what)));
                }
                break;
            }
        }
    }

    let status = tokio::select! {
        _ = cancel.cancelled() => {
            let _ = child.kill().await;
            return Ok(());
        }
        status = child.wait() => status.with_context(|| format!("wait for {}", what))?,
    };

    if status.success() {
        return Ok(());
    }

    let stderr = match stderr {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    };
    match stderr.trim() {
        "" => bail!("{} exited with {}", what, status),
        message => bail!("{} exited with {}: {}", what, status, message),
    }
}

/// Collect the tail of a stderr stream on a task of its own
pub(crate) fn collect_stderr<R>(mut stderr: R) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stderr.read_to_end(&mut buf).await;
        let start = buf.len().saturating_sub(STDERR_LIMIT);
        String::from_utf8_lossy(&buf[start..]).into_owned()
    })
}
