//! Fake collaborators shared by the supervisor integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use pt_core::config::{
    Arch, PortMapping, ReversePortMapping, SupervisorConfig, TunnelDefinition,
};
use pt_core::hook::{HookPhase, LifecycleEvent};
use pt_core::traits::{
    ExecStreamer, ForwardEndpointProvider, ForwardHandle, ForwardTunnel, HelperInjector,
    HookDispatcher, ReverseMultiplexer, SelectionOptions, TargetSelector,
};
use pt_core::{Direction, HookError, PodRef, PortPair, SelectedTarget};
use pt_supervisor::RetryPolicy;

pub fn policy(direction: Direction) -> RetryPolicy {
    RetryPolicy::for_direction(&SupervisorConfig::default(), direction)
}

pub fn pod(name: &str) -> PodRef {
    PodRef::new("dev", name)
}

/// Forward definition selecting `app=<app>` with one local port
pub fn forward_definition(name: &str, app: &str, port: u16) -> Arc<TunnelDefinition> {
    let mut definition = TunnelDefinition::new(name);
    definition
        .label_selector
        .insert("app".to_string(), app.to_string());
    definition.ports.push(PortMapping::local(port));
    Arc::new(definition)
}

/// Reverse definition selecting `app=<app>` with one reverse mapping
pub fn reverse_definition(name: &str, app: &str, port: u16) -> Arc<TunnelDefinition> {
    let mut definition = TunnelDefinition::new(name);
    definition
        .label_selector
        .insert("app".to_string(), app.to_string());
    definition.container_name = Some("server".to_string());
    definition.arch = Some(Arch::Arm64);
    definition.reverse_ports.push(ReversePortMapping {
        local_port: Some(port),
        remote_port: None,
        bind_address: None,
    });
    Arc::new(definition)
}

// ---- hooks ----

/// Records every dispatched event as `<phase>:<direction>:<definition>`
#[derive(Default)]
pub struct RecordingHooks {
    events: Mutex<Vec<String>>,
    fail_on: Option<HookPhase>,
}

impl RecordingHooks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_on(phase: HookPhase) -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            fail_on: Some(phase),
        })
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events().iter().filter(|e| e.as_str() == name).count()
    }
}

#[async_trait]
impl HookDispatcher for RecordingHooks {
    async fn dispatch(&self, event: &LifecycleEvent<'_>) -> Result<(), HookError> {
        let name = format!("{}:{}", event.name(), event.definition.name);
        self.events.lock().unwrap().push(name.clone());

        if self.fail_on == Some(event.phase()) {
            return Err(HookError::Failed {
                event: name,
                command: "fake-hook".to_string(),
                reason: "exit status: 1".to_string(),
            });
        }
        Ok(())
    }
}

// ---- selection ----

type SelectFn = dyn Fn(&SelectionOptions, usize) -> anyhow::Result<Option<PodRef>> + Send + Sync;

/// Selector driven by a closure of (options, call index)
pub struct FakeSelector {
    select: Box<SelectFn>,
    calls: Mutex<Vec<Instant>>,
}

impl FakeSelector {
    pub fn new(
        select: impl Fn(&SelectionOptions, usize) -> anyhow::Result<Option<PodRef>>
            + Send
            + Sync
            + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            select: Box::new(select),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Always select the same pod
    pub fn always(pod: PodRef) -> Arc<Self> {
        Self::new(move |_, _| Ok(Some(pod.clone())))
    }

    /// When each selection happened
    pub fn calls(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }

    fn next(&self, options: &SelectionOptions) -> anyhow::Result<Option<PodRef>> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Instant::now());
            calls.len() - 1
        };
        (self.select)(options, index)
    }
}

#[async_trait]
impl TargetSelector for FakeSelector {
    async fn select_pod(&self, options: &SelectionOptions) -> anyhow::Result<Option<PodRef>> {
        self.next(options)
    }

    async fn select_container(&self, options: &SelectionOptions) -> anyhow::Result<SelectedTarget> {
        let pod = self
            .next(options)?
            .ok_or_else(|| anyhow::anyhow!("no pod matches {}", options.label_selector))?;
        let container = options
            .container_name
            .clone()
            .unwrap_or_else(|| "main".to_string());
        Ok(SelectedTarget::container(pod, container))
    }
}

// ---- forward endpoints ----

/// Test-side handle to one opened fake tunnel
#[derive(Clone)]
pub struct TunnelControl {
    pub pod: PodRef,
    pub ports: Vec<PortPair>,
    fail: CancellationToken,
    closed: CancellationToken,
}

impl TunnelControl {
    /// Make the tunnel die
    pub fn fail(&self) {
        self.fail.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

struct FakeTunnel {
    control: TunnelControl,
    // Held so a never-ready tunnel does not look like a dropped signal
    _ready: Mutex<Option<oneshot::Sender<()>>>,
}

#[async_trait]
impl ForwardTunnel for FakeTunnel {
    async fn run(&self) -> anyhow::Result<()> {
        tokio::select! {
            _ = self.control.closed.cancelled() => Ok(()),
            _ = self.control.fail.cancelled() => Err(anyhow::anyhow!("connection reset by peer")),
        }
    }

    fn close(&self) {
        self.control.closed.cancel();
    }
}

/// How an opened fake tunnel behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyMode {
    /// Ready right away
    Immediate,
    /// Opens but never becomes ready
    Never,
    /// Opening fails
    FailOpen,
}

pub struct FakeForwardProvider {
    modes: Mutex<VecDeque<ReadyMode>>,
    default: ReadyMode,
    opened: mpsc::UnboundedSender<TunnelControl>,
    opens: AtomicUsize,
}

impl FakeForwardProvider {
    pub fn new(default: ReadyMode) -> (Arc<Self>, mpsc::UnboundedReceiver<TunnelControl>) {
        Self::with_sequence(Vec::new(), default)
    }

    /// Use `modes` for the first opens, `default` afterwards
    pub fn with_sequence(
        modes: Vec<ReadyMode>,
        default: ReadyMode,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<TunnelControl>) {
        let (opened, rx) = mpsc::unbounded_channel();
        let provider = Arc::new(Self {
            modes: Mutex::new(modes.into()),
            default,
            opened,
            opens: AtomicUsize::new(0),
        });
        (provider, rx)
    }

    /// Number of open attempts, failed ones included
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ForwardEndpointProvider for FakeForwardProvider {
    async fn open_forward(&self, pod: &PodRef, ports: &[PortPair]) -> anyhow::Result<ForwardHandle> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let mode = self
            .modes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default);

        if mode == ReadyMode::FailOpen {
            anyhow::bail!("unable to upgrade connection: pod not reachable");
        }

        let control = TunnelControl {
            pod: pod.clone(),
            ports: ports.to_vec(),
            fail: CancellationToken::new(),
            closed: CancellationToken::new(),
        };
        let (ready_tx, ready) = oneshot::channel();
        let held = match mode {
            ReadyMode::Immediate => {
                let _ = ready_tx.send(());
                None
            }
            _ => Some(ready_tx),
        };

        let _ = self.opened.send(control.clone());
        Ok(ForwardHandle {
            tunnel: Arc::new(FakeTunnel {
                control,
                _ready: Mutex::new(held),
            }),
            ready,
        })
    }
}

// ---- reverse endpoints ----

#[derive(Default)]
pub struct FakeInjector {
    calls: Mutex<Vec<(SelectedTarget, Option<Arch>)>>,
}

impl FakeInjector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<(SelectedTarget, Option<Arch>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HelperInjector for FakeInjector {
    async fn ensure_helper(&self, target: &SelectedTarget, arch: Option<Arch>) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push((target.clone(), arch));
        Ok(())
    }

    fn helper_path(&self) -> &str {
        "/tmp/podtunnel-helper"
    }
}

/// Test-side handle to one exec stream or multiplexer run
#[derive(Clone)]
pub struct StreamControl {
    pub target: String,
    pub args: Vec<String>,
    fail: CancellationToken,
    closed: CancellationToken,
}

impl StreamControl {
    fn new(target: String, args: Vec<String>, closed: CancellationToken) -> Self {
        Self {
            target,
            args,
            fail: CancellationToken::new(),
            closed,
        }
    }

    pub fn fail(&self) {
        self.fail.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    async fn serve(&self, what: &str) -> anyhow::Result<()> {
        tokio::select! {
            _ = self.closed.cancelled() => Ok(()),
            _ = self.fail.cancelled() => Err(anyhow::anyhow!("{} reset", what)),
        }
    }
}

pub struct FakeStreamer {
    opened: mpsc::UnboundedSender<StreamControl>,
}

impl FakeStreamer {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<StreamControl>) {
        let (opened, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { opened }), rx)
    }
}

#[async_trait]
impl ExecStreamer for FakeStreamer {
    async fn stream(
        &self,
        target: &SelectedTarget,
        command: Vec<String>,
        io: DuplexStream,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        let control = StreamControl::new(target.to_string(), command, cancel);
        let _ = self.opened.send(control.clone());
        let result = control.serve("exec stream").await;
        drop(io);
        result
    }
}

pub struct FakeMux {
    opened: mpsc::UnboundedSender<StreamControl>,
}

impl FakeMux {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<StreamControl>) {
        let (opened, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { opened }), rx)
    }
}

#[async_trait]
impl ReverseMultiplexer for FakeMux {
    async fn run_reverse(
        &self,
        reader: ReadHalf<DuplexStream>,
        writer: WriteHalf<DuplexStream>,
        mappings: Vec<ReversePortMapping>,
        close: CancellationToken,
        pod: &PodRef,
    ) -> anyhow::Result<()> {
        let args = mappings.iter().map(|m| m.to_string()).collect();
        let control = StreamControl::new(pod.to_string(), args, close);
        let _ = self.opened.send(control.clone());
        let result = control.serve("multiplexer").await;
        drop((reader, writer));
        result
    }
}
