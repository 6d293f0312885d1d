//! Session set orchestration tests

mod common;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use common::*;
use pt_core::hook::HookPhase;
use pt_core::{Direction, TunnelError};
use pt_supervisor::{ForwardDriver, SelectionDefaults, SessionSet, SessionState};

/// Selects `<app>-0` for every label selector except `app=broken`
fn selector() -> Arc<FakeSelector> {
    FakeSelector::new(|options, _| {
        let app = options.label_selector.trim_start_matches("app=");
        if app == "broken" {
            anyhow::bail!("pods is forbidden");
        }
        Ok(Some(pod(&format!("{}-0", app))))
    })
}

fn session_set(
    selector: Arc<FakeSelector>,
    provider: Arc<FakeForwardProvider>,
    hooks: Arc<RecordingHooks>,
) -> SessionSet<ForwardDriver> {
    let driver = ForwardDriver::new(selector, provider, SelectionDefaults::default());
    SessionSet::new(Arc::new(driver), hooks, policy(Direction::Forward))
}

#[tokio::test(start_paused = true)]
async fn test_starts_every_definition_in_order() {
    let (provider, mut opened) = FakeForwardProvider::new(ReadyMode::Immediate);
    let hooks = RecordingHooks::new();
    let set = session_set(selector(), provider, hooks.clone());
    let interrupt = CancellationToken::new();

    let definitions = vec![
        forward_definition("api", "api", 18080),
        forward_definition("web", "web", 13000),
    ];
    let started = set.run_all(&definitions, &interrupt).await.unwrap();
    assert_eq!(started, 2);

    assert_eq!(opened.recv().await.unwrap().pod, pod("api-0"));
    assert_eq!(opened.recv().await.unwrap().pod, pod("web-0"));
    assert_eq!(
        set.states().await,
        vec![
            ("api".to_string(), SessionState::Active),
            ("web".to_string(), SessionState::Active),
        ]
    );

    interrupt.cancel();
    set.wait().await;
    assert!(set.states().await.is_empty());
    assert_eq!(
        hooks.events()[..2],
        ["start:portForwarding:api", "start:portForwarding:web"]
    );
    assert_eq!(hooks.count("stop:portForwarding:api"), 1);
    assert_eq!(hooks.count("stop:portForwarding:web"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_definitions_without_mappings_are_skipped() {
    let selector = selector();
    let (provider, _opened) = FakeForwardProvider::new(ReadyMode::Immediate);
    let hooks = RecordingHooks::new();
    let set = session_set(selector.clone(), provider, hooks.clone());

    let reverse_only = reverse_definition("db", "db", 5432);

    let started = set
        .run_all(&[reverse_only], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(started, 0);
    assert!(selector.calls().is_empty());
    assert!(hooks.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_setup_error_aborts_later_definitions_only() {
    let (provider, mut opened) = FakeForwardProvider::new(ReadyMode::Immediate);
    let hooks = RecordingHooks::new();
    let set = session_set(selector(), provider.clone(), hooks.clone());
    let interrupt = CancellationToken::new();

    let definitions = vec![
        forward_definition("api", "api", 18080),
        forward_definition("broken", "broken", 18081),
        forward_definition("web", "web", 13000),
    ];
    let error = set
        .run_all(&definitions, &interrupt)
        .await
        .expect_err("broken definition should abort the run");

    assert!(matches!(error, TunnelError::TargetResolution(_)));
    assert_eq!(provider.opens(), 1);
    assert_eq!(
        hooks.events(),
        vec![
            "start:portForwarding:api",
            "start:portForwarding:broken",
            "error:portForwarding:broken",
        ]
    );

    // The first session is untouched by the failure
    let first = opened.recv().await.unwrap();
    assert!(!first.is_closed());
    assert_eq!(
        set.states().await,
        vec![("api".to_string(), SessionState::Active)]
    );

    interrupt.cancel();
    set.wait().await;
    assert!(first.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_start_hook_failure_is_fatal() {
    let selector = selector();
    let (provider, _opened) = FakeForwardProvider::new(ReadyMode::Immediate);
    let set = session_set(
        selector.clone(),
        provider,
        RecordingHooks::failing_on(HookPhase::Start),
    );

    let error = set
        .run_all(
            &[forward_definition("api", "api", 18080)],
            &CancellationToken::new(),
        )
        .await
        .expect_err("start hook failure should abort");

    assert!(matches!(error, TunnelError::Hook(_)));
    assert!(selector.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_error_hook_failure_replaces_setup_error() {
    let (provider, _opened) = FakeForwardProvider::new(ReadyMode::Immediate);
    let set = session_set(
        selector(),
        provider,
        RecordingHooks::failing_on(HookPhase::Error),
    );

    let error = set
        .run_all(
            &[forward_definition("broken", "broken", 18081)],
            &CancellationToken::new(),
        )
        .await
        .expect_err("setup should fail");

    assert!(matches!(error, TunnelError::Hook(_)));
}

#[tokio::test(start_paused = true)]
async fn test_restart_hook_failure_is_not_propagated() {
    let (provider, mut opened) = FakeForwardProvider::new(ReadyMode::Immediate);
    let hooks = RecordingHooks::failing_on(HookPhase::Restart);
    let set = session_set(selector(), provider, hooks.clone());
    let interrupt = CancellationToken::new();

    set.run_all(&[forward_definition("api", "api", 18080)], &interrupt)
        .await
        .unwrap();

    opened.recv().await.unwrap().fail();
    let second = opened.recv().await.unwrap();
    assert!(!second.is_closed());
    assert_eq!(hooks.count("restart:portForwarding:api"), 1);

    interrupt.cancel();
    set.wait().await;
    assert!(second.is_closed());
    assert_eq!(hooks.count("stop:portForwarding:api"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_interrupted_run_starts_nothing() {
    let selector = selector();
    let (provider, _opened) = FakeForwardProvider::new(ReadyMode::Immediate);
    let hooks = RecordingHooks::new();
    let set = session_set(selector.clone(), provider, hooks.clone());

    let interrupt = CancellationToken::new();
    interrupt.cancel();

    let started = set
        .run_all(&[forward_definition("api", "api", 18080)], &interrupt)
        .await
        .unwrap();

    assert_eq!(started, 0);
    assert!(selector.calls().is_empty());
    assert!(hooks.events().is_empty());
}
