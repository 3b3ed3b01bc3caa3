//! End-to-end integration tests
//!
//! These tests validate complete debugging workflows over a real WebSocket:
//! tab discovery, attach, breakpoints, pause inspection and disconnect.

mod common;

use common::{attach_first_tab, next_event, test_config};
use mock_backend::{MockBackend, PAGE_URL, SCRIPT_URL};
use wipdbg::model::BreakpointTarget;
use wipdbg::protocol::ids::ScriptId;
use wipdbg::session::{DebugEvent, DebugEventKind};
use wipdbg::wip::Browser;
use wipdbg::{BackendProfile, Error, ProfileSelection, SessionState};

/// Test 1: Tab discovery and version detection
#[tokio::test]
async fn test_tab_discovery() {
    let backend = MockBackend::start("1.0").await.unwrap();
    let browser = Browser::new(backend.http_endpoint());

    let tabs = browser.list_tabs().await.unwrap();
    assert_eq!(tabs.len(), 2);
    assert_eq!(tabs[0].url, PAGE_URL);
    assert!(tabs[1].web_socket_debugger_url.is_none());

    let version = browser.version().await.unwrap();
    assert_eq!(version.protocol_version, "1.0");
    assert_eq!(
        browser.resolve_profile(ProfileSelection::Auto).await,
        BackendProfile::Protocol10
    );
    assert_eq!(
        browser.resolve_profile(ProfileSelection::Dev).await,
        BackendProfile::Dev
    );
}

/// Test 2: Attach runs the handshake and loads scripts
#[tokio::test]
async fn test_attach_lists_scripts() {
    let backend = MockBackend::start("1.3").await.unwrap();
    let session = attach_first_tab(&backend.http_endpoint()).await.unwrap();

    assert_eq!(session.state(), SessionState::Running);
    assert_eq!(session.profile(), BackendProfile::Dev);
    assert_eq!(session.url().as_deref(), Some(PAGE_URL));

    let scripts = session.list_scripts();
    assert_eq!(scripts.len(), 1);
    assert_eq!(scripts[0].url().unwrap(), SCRIPT_URL);

    let source = session.get_source(&ScriptId::new("7")).await.unwrap();
    assert!(source.contains("debugger;"));

    session.disconnect().await.unwrap();
}

/// Test 3: Attaching to a tab claimed by another client fails
#[tokio::test]
async fn test_attach_busy_tab() {
    let backend = MockBackend::start("1.3").await.unwrap();
    let browser = Browser::new(backend.http_endpoint());
    let tabs = browser.list_tabs().await.unwrap();

    let result = browser.attach(&tabs[1], &test_config(&backend.http_endpoint())).await;
    assert!(matches!(result, Err(Error::Transport(_))));
}

/// Test 4: Breakpoint lifecycle
#[tokio::test]
async fn test_breakpoint_lifecycle() {
    let backend = MockBackend::start("1.3").await.unwrap();
    let session = attach_first_tab(&backend.http_endpoint()).await.unwrap();

    let bp = session
        .add_breakpoint(BreakpointTarget::url(SCRIPT_URL, 2), Some("count > 0".to_string()))
        .await
        .unwrap();
    let binding = bp.binding.as_ref().unwrap();
    assert_eq!(binding.server_id.as_str(), format!("{}:2", SCRIPT_URL));
    assert_eq!(binding.locations[0].line, 2);
    assert_eq!(session.list_breakpoints().len(), 1);

    session.remove_breakpoint(bp.uid).await.unwrap();
    assert!(session.list_breakpoints().is_empty());

    session.disconnect().await.unwrap();
}

/// Test 5: Pause, inspect the top frame, resume
#[tokio::test]
async fn test_pause_inspect_resume() {
    let backend = MockBackend::start("1.3").await.unwrap();
    let session = attach_first_tab(&backend.http_endpoint()).await.unwrap();
    let mut rx = session.subscribe_filtered(vec![DebugEventKind::Suspended, DebugEventKind::Resumed]);

    session.suspend().await.unwrap();
    let suspension = match next_event(&mut rx).await {
        DebugEvent::Suspended(suspension) => suspension,
        other => panic!("unexpected event: {:?}", other),
    };
    assert_eq!(session.state(), SessionState::Suspended);

    let frame = suspension.top_frame().unwrap();
    assert_eq!(frame.function_name(), "tick");
    assert_eq!(frame.location().unwrap().line, 2);

    let locals = frame.scopes()[0].variables().await.unwrap();
    assert_eq!(locals.len(), 1);
    assert_eq!(locals[0].name(), "count");
    assert_eq!(locals[0].value().unwrap().text(), "1");

    session.resume().await.unwrap();
    assert_eq!(next_event(&mut rx).await.kind(), DebugEventKind::Resumed);
    assert_eq!(session.state(), SessionState::Running);
    assert!(matches!(
        frame.scopes()[1].variables().await,
        Err(Error::StaleHandle(_))
    ));

    session.disconnect().await.unwrap();
}

/// Test 6: Global evaluation outside a pause
#[tokio::test]
async fn test_global_evaluate() {
    let backend = MockBackend::start("1.3").await.unwrap();
    let session = attach_first_tab(&backend.http_endpoint()).await.unwrap();

    let result = session.evaluate("document.title", None).await.unwrap();
    assert!(!result.was_thrown);
    assert_eq!(result.value.text(), "mock");

    session.disconnect().await.unwrap();
}

/// Test 7: Protocol 1.0 backends skip unsupported domains
#[tokio::test]
async fn test_protocol_1_0_attach() {
    let backend = MockBackend::start("1.0").await.unwrap();
    let session = attach_first_tab(&backend.http_endpoint()).await.unwrap();

    assert_eq!(session.profile(), BackendProfile::Protocol10);
    assert_eq!(session.state(), SessionState::Running);
    assert!(matches!(session.document().await, Err(Error::NotSupported(_))));

    session.disconnect().await.unwrap();
}

/// Test 8: Losing the page fails in-flight work and closes the session
#[tokio::test]
async fn test_connection_loss() {
    let backend = MockBackend::start("1.3").await.unwrap();
    let session = attach_first_tab(&backend.http_endpoint()).await.unwrap();
    let mut rx = session.subscribe_filtered(vec![DebugEventKind::Closed]);

    let result = session.evaluate("window.close()", None).await;
    assert!(matches!(result, Err(Error::SessionClosed)));
    assert_eq!(next_event(&mut rx).await.kind(), DebugEventKind::Closed);
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(session.list_scripts().is_empty());
}
