//! Command processor tests
//!
//! All tests run against the in-memory transport.

use super::client::ProtocolClient;
use super::mock::{event, reply_to, MockTransport};
use super::processor::CommandProcessor;
use crate::protocol::domains::debugger::{
    EvaluateOnCallFrameParams, GetScriptSourceParams, SetVariableValueParams,
};
use crate::protocol::domains::runtime::{CallArgument, RemoteObjectType};
use crate::protocol::ids::{CallFrameId, ScriptId};
use crate::protocol::profile::BackendProfile;
use crate::Error;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

type Log = Arc<Mutex<Vec<String>>>;

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Send `method`, logging `<tag>:ok`, `<tag>:err:<error>` and `<tag>:sync`
fn send_logged(processor: &CommandProcessor, method: &str, tag: &str, log: &Log) -> u64 {
    let callback_log = Arc::clone(log);
    let sync_log = Arc::clone(log);
    let callback_tag = tag.to_string();
    let sync_tag = tag.to_string();
    processor
        .send(
            method,
            None,
            Box::new(move |outcome| {
                let entry = match outcome {
                    Ok(_) => format!("{}:ok", callback_tag),
                    Err(e) => format!("{}:err:{}", callback_tag, e),
                };
                callback_log.lock().unwrap().push(entry);
            }),
            Some(Box::new(move || {
                sync_log.lock().unwrap().push(format!("{}:sync", sync_tag));
            })),
        )
        .unwrap()
}

#[tokio::test]
async fn test_request_envelope_and_sequence() {
    let mock = Arc::new(MockTransport::new());
    let processor = CommandProcessor::start(mock.clone());
    let log = new_log();

    let first = send_logged(&processor, "Debugger.enable", "a", &log);
    let second = send_logged(&processor, "Debugger.pause", "b", &log);
    assert!(second > first);

    let sent = mock.wait_for_sent(2).await.unwrap();
    assert_eq!(sent[0], json!({ "id": first, "method": "Debugger.enable" }));
    assert_eq!(sent[1]["id"], json!(second));
    assert_eq!(processor.pending_count(), 2);
}

#[tokio::test]
async fn test_reply_correlation() {
    let mock = Arc::new(MockTransport::new());
    let processor = CommandProcessor::start(mock.clone());
    let log = new_log();

    let ok = send_logged(&processor, "Debugger.enable", "a", &log);
    let failed = send_logged(&processor, "Debugger.getScriptSource", "b", &log);
    mock.wait_for_sent(2).await.unwrap();

    // Replies out of order
    mock.inject_error(failed, -32000, "No script for id");
    mock.inject_reply(ok, json!({}));
    // Duplicate reply is ignored
    mock.inject_reply(ok, json!({}));

    let (done_tx, done_rx) = oneshot::channel();
    let done_tx = Mutex::new(Some(done_tx));
    processor.on_event("Test.done", Arc::new(move |_| {
        if let Some(tx) = done_tx.lock().unwrap().take() {
            let _ = tx.send(());
        }
    }));
    mock.inject_event("Test.done", json!({}));
    done_rx.await.unwrap();

    assert_eq!(
        entries(&log),
        vec![
            "b:err:Protocol error -32000: No script for id".to_string(),
            "b:sync".to_string(),
            "a:ok".to_string(),
            "a:sync".to_string(),
        ]
    );
    assert_eq!(processor.pending_count(), 0);
}

#[tokio::test]
async fn test_event_before_reply_is_dispatched_first() {
    // The backend emits `paused` before replying to the command that caused it
    let mock = Arc::new(MockTransport::with_responder(|request| {
        vec![
            event("Debugger.paused", json!({ "reason": "other", "callFrames": [] })),
            reply_to(request, json!({})),
        ]
    }));
    let processor = CommandProcessor::start(mock.clone());
    let log = new_log();

    let handler_log = Arc::clone(&log);
    processor.on_event(
        "Debugger.paused",
        Arc::new(move |params: &Value| {
            handler_log
                .lock()
                .unwrap()
                .push(format!("paused:{}", params["reason"].as_str().unwrap_or("")));
        }),
    );

    let callback_log = Arc::clone(&log);
    processor
        .send(
            "Debugger.stepOver",
            None,
            Box::new(move |_| callback_log.lock().unwrap().push("reply".to_string())),
            None,
        )
        .unwrap();

    let result = processor.call("Debugger.enable", None).await.unwrap();
    assert_eq!(result, json!({}));

    let log = entries(&log);
    assert_eq!(&log[..2], &["paused:other".to_string(), "reply".to_string()]);
}

#[tokio::test]
async fn test_unknown_event_is_dropped() {
    let mock = Arc::new(MockTransport::with_responder(|request| {
        vec![reply_to(request, json!({ "ok": true }))]
    }));
    let processor = CommandProcessor::start(mock.clone());

    mock.inject_event("Future.somethingNew", json!({ "x": 1 }));
    mock.inject(json!({ "garbage": true }));

    // The processor keeps working after both
    let result = processor.call("Debugger.enable", None).await.unwrap();
    assert_eq!(result, json!({ "ok": true }));
    assert!(!processor.is_closed());
}

#[tokio::test]
async fn test_transport_loss_fans_out_in_send_order() {
    let mock = Arc::new(MockTransport::new());
    let processor = CommandProcessor::start(mock.clone());
    let log = new_log();

    send_logged(&processor, "Debugger.enable", "1", &log);
    send_logged(&processor, "Runtime.enable", "2", &log);
    send_logged(&processor, "Page.enable", "3", &log);
    mock.wait_for_sent(3).await.unwrap();

    use super::traits::Transport;
    mock.close().await.unwrap();
    processor.wait_closed().await;

    assert_eq!(
        entries(&log),
        vec![
            "1:err:Session closed",
            "2:err:Session closed",
            "3:err:Session closed",
            "1:sync",
            "2:sync",
            "3:sync",
        ]
    );

    // After close, send fails synchronously and runs no callback
    let err = processor
        .send("Debugger.pause", None, Box::new(|_| panic!("callback after close")), None)
        .unwrap_err();
    assert!(err.is_session_closed());
}

#[tokio::test]
async fn test_shutdown_fails_pending_call() {
    let mock = Arc::new(MockTransport::new());
    let processor = CommandProcessor::start(mock.clone());

    let waiter = {
        let processor = Arc::clone(&processor);
        tokio::spawn(async move { processor.call("Debugger.enable", None).await })
    };
    mock.wait_for_sent(1).await.unwrap();

    processor.shutdown().await.unwrap();
    let outcome = waiter.await.unwrap();
    assert!(matches!(outcome, Err(Error::SessionClosed)));
    assert!(processor.is_closed());
}

#[tokio::test]
async fn test_callback_may_send_reentrantly() {
    let mock = Arc::new(MockTransport::with_responder(|request| {
        vec![reply_to(request, json!({}))]
    }));
    let processor = CommandProcessor::start(mock.clone());
    let (done_tx, done_rx) = oneshot::channel();

    let inner = Arc::clone(&processor);
    processor
        .send(
            "Debugger.enable",
            None,
            Box::new(move |_| {
                inner
                    .send(
                        "Page.enable",
                        None,
                        Box::new(move |outcome| {
                            let _ = done_tx.send(outcome.is_ok());
                        }),
                        None,
                    )
                    .unwrap();
            }),
            None,
        )
        .unwrap();

    assert!(done_rx.await.unwrap());
    assert_eq!(mock.sent_methods(), vec!["Debugger.enable", "Page.enable"]);
}

#[tokio::test]
async fn test_typed_evaluate_on_call_frame() {
    let mock = Arc::new(MockTransport::new());
    let processor = CommandProcessor::start(mock.clone());
    let client = ProtocolClient::new(processor, BackendProfile::Dev);

    let (reply_tx, reply_rx) = oneshot::channel();
    let seq = client
        .send_command(
            EvaluateOnCallFrameParams::new(CallFrameId::new("cf0"), "1+2"),
            move |outcome| {
                let _ = reply_tx.send(outcome.map(|reply| reply.into_json()));
            },
            None,
        )
        .unwrap();

    let request = mock.wait_for_method("Debugger.evaluateOnCallFrame").await.unwrap();
    assert_eq!(request["params"], json!({ "callFrameId": "cf0", "expression": "1+2" }));

    mock.inject_reply(
        seq,
        json!({ "result": { "type": "number", "value": 3, "description": "3" }, "wasThrown": false }),
    );

    let json = reply_rx.await.unwrap().unwrap();
    let data = crate::protocol::domains::debugger::EvaluateOnCallFrameData::parse(&json).unwrap();
    assert_eq!(data.result().unwrap().object_type().unwrap(), RemoteObjectType::Number);
    assert_eq!(data.result().unwrap().description().unwrap(), Some("3"));
    assert_eq!(data.was_thrown().unwrap(), Some(false));
}

#[tokio::test]
async fn test_typed_call_and_protocol_error() {
    let mock = Arc::new(MockTransport::with_responder(|request| {
        if request["params"]["scriptId"] == "1" {
            vec![reply_to(request, json!({ "scriptSource": "var a;" }))]
        } else {
            vec![json!({ "id": request["id"], "error": { "code": -32000, "message": "No script", "data": "7" } })]
        }
    }));
    let client = ProtocolClient::new(CommandProcessor::start(mock.clone()), BackendProfile::Dev);

    let reply = client
        .call(GetScriptSourceParams { script_id: ScriptId::new("1") })
        .await
        .unwrap();
    assert_eq!(reply.data().unwrap().script_source().unwrap(), "var a;");

    let err = client
        .call(GetScriptSourceParams { script_id: ScriptId::new("2") })
        .await
        .unwrap_err();
    match err {
        Error::Protocol { code, message, data } => {
            assert_eq!(code, -32000);
            assert_eq!(message, "No script");
            assert_eq!(data, Some(json!("7")));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_profile_gates_commands_before_writing() {
    let mock = Arc::new(MockTransport::new());
    let client = ProtocolClient::new(CommandProcessor::start(mock.clone()), BackendProfile::Protocol10);

    let err = client
        .call(SetVariableValueParams::new(0, "x", CallArgument::from_value(json!(1))))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotSupported(ref method) if method == "Debugger.setVariableValue"));

    let err = client.call_raw("DOM.getDocument", None).await.unwrap_err();
    assert!(matches!(err, Error::NotSupported(_)));
    assert_eq!(mock.sent_count(), 0);
}
