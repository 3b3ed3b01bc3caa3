//! Value mirror tests
//!
//! Mirrors are built directly on an [`EvalContext`] over the in-memory
//! transport; no session is involved.

use super::properties::{EvalContext, ScopeRef};
use super::value::JsType;
use super::variable::{Variable, VariableKind};
use crate::model::handle::HandleGroup;
use crate::protocol::domains::debugger::ScopeType;
use crate::protocol::ids::CallFrameId;
use crate::protocol::profile::BackendProfile;
use crate::wip::client::ProtocolClient;
use crate::wip::mock::{reply_to, MockTransport};
use crate::wip::processor::CommandProcessor;
use crate::Error;
use serde_json::{json, Value};
use std::sync::Arc;

fn descriptor(name: &str, value: Value) -> Value {
    json!({ "name": name, "value": value, "configurable": true, "enumerable": true })
}

fn number(n: i64) -> Value {
    json!({ "type": "number", "value": n, "description": n.to_string() })
}

fn object(object_id: &str) -> Value {
    json!({ "type": "object", "className": "Object", "description": "Object", "objectId": object_id })
}

fn array(object_id: &str, length: usize) -> Value {
    json!({
        "type": "object",
        "subtype": "array",
        "className": "Array",
        "description": format!("Array[{}]", length),
        "objectId": object_id
    })
}

fn backend() -> Arc<MockTransport> {
    Arc::new(MockTransport::with_responder(|request: &Value| {
        let params = &request["params"];
        let result = match request["method"].as_str().unwrap_or("") {
            "Runtime.getProperties" => match params["objectId"].as_str().unwrap_or("") {
                "obj:1" => json!({
                    "result": [
                        descriptor("x", number(1)),
                        descriptor("1", number(2)),
                        descriptor("two words", number(3)),
                        { "name": "lazy", "get": { "type": "function", "objectId": "fn:get" }, "configurable": true, "enumerable": true },
                        descriptor("__proto__", object("obj:proto"))
                    ],
                    "internalProperties": [
                        { "name": "[[PrimitiveValue]]", "value": number(9) }
                    ]
                }),
                "arr:1" => json!({
                    "result": (0..5)
                        .map(|i| descriptor(&i.to_string(), number(i)))
                        .chain(std::iter::once(descriptor("length", number(5))))
                        .collect::<Vec<_>>()
                }),
                _ => json!({ "result": [] }),
            },
            "Debugger.getFunctionDetails" => json!({
                "details": { "location": { "scriptId": "10", "lineNumber": 12, "columnNumber": 4 }, "name": "f" }
            }),
            "Debugger.evaluateOnCallFrame" if params["expression"] == "oops()" => json!({
                "result": { "type": "object", "subtype": "error", "className": "ReferenceError", "description": "ReferenceError: oops is not defined", "objectId": "err:1" },
                "wasThrown": true
            }),
            "Debugger.evaluateOnCallFrame" => json!({ "result": number(42) }),
            _ => json!({}),
        };
        vec![reply_to(request, result)]
    }))
}

fn context(mock: &Arc<MockTransport>, profile: BackendProfile) -> EvalContext {
    EvalContext {
        client: ProtocolClient::new(CommandProcessor::start(mock.clone()), profile),
        group: HandleGroup::new("pause"),
        top_frame: Some(CallFrameId::new("cf:0")),
        page_size: 2,
    }
}

fn local_scope() -> ScopeRef {
    ScopeRef {
        scope_type: ScopeType::Local,
        scope_number: 0,
        call_frame_id: CallFrameId::new("cf:0"),
    }
}

#[tokio::test]
async fn test_value_is_memoised() {
    let mock = backend();
    let ctx = context(&mock, BackendProfile::Dev);
    let variable = Variable::real("o", object("obj:1"), Some("o".to_string()), false, None, ctx);

    let first = variable.value().unwrap();
    let second = variable.value().unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let variable = Arc::clone(&variable);
            tokio::spawn(async move { variable.value().unwrap() })
        })
        .collect();
    for handle in handles {
        assert!(Arc::ptr_eq(&handle.await.unwrap(), &first));
    }
    assert_eq!(mock.sent_count(), 0);
}

#[tokio::test]
async fn test_concurrent_first_access_shares_one_value() {
    let mock = backend();
    let ctx = context(&mock, BackendProfile::Dev);
    let variable = Variable::real("o", object("obj:1"), None, false, None, ctx);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let variable = Arc::clone(&variable);
            tokio::spawn(async move { variable.value().unwrap() })
        })
        .collect();
    let mut values = Vec::new();
    for handle in handles {
        values.push(handle.await.unwrap());
    }
    assert!(values.iter().all(|value| Arc::ptr_eq(value, &values[0])));
}

#[tokio::test]
async fn test_children_carry_qualified_names() {
    let mock = backend();
    let ctx = context(&mock, BackendProfile::Dev);
    let variable = Variable::real("o", object("obj:1"), Some("o".to_string()), false, None, ctx);

    let children = variable.value().unwrap().properties().await.unwrap();
    let names: Vec<_> = children.iter().map(|child| child.name()).collect();
    // Accessor-only `lazy` is skipped, `__proto__` is internal
    assert_eq!(names, vec!["x", "1", "two words"]);

    let expressions: Vec<_> = children.iter().map(|child| child.watch_expression().unwrap()).collect();
    assert_eq!(expressions, vec!["o.x", "o[1]", r#"o["two words"]"#]);
    assert_eq!(children[0].value().unwrap().text(), "1");
    assert_eq!(children[0].reference_type_name().unwrap(), "number");
}

#[tokio::test]
async fn test_internal_properties() {
    let mock = backend();
    let ctx = context(&mock, BackendProfile::Dev);
    let value = Variable::real("o", object("obj:1"), None, false, None, ctx)
        .value()
        .unwrap();

    let internal = value.internal_properties().await.unwrap();
    let names: Vec<_> = internal.iter().map(|child| child.name()).collect();
    assert_eq!(names, vec!["__proto__", "[[PrimitiveValue]]"]);
    assert!(internal.iter().all(|child| child.is_internal()));

    // Both lists come from the one cached reply
    value.properties().await.unwrap();
    assert_eq!(mock.sent_methods(), vec!["Runtime.getProperties"]);
}

#[tokio::test]
async fn test_truncated_array_pages_until_reloaded() {
    let mock = backend();
    let ctx = context(&mock, BackendProfile::Dev);
    let value = Variable::real("list", array("arr:1", 5), None, false, None, ctx)
        .value()
        .unwrap();

    assert_eq!(value.js_type(), JsType::Array);
    let array = value.as_array().unwrap();
    assert_eq!(array.length(), Some(5));
    assert!(value.is_truncated());

    let shown: Vec<_> = value
        .properties()
        .await
        .unwrap()
        .iter()
        .map(|child| child.name().to_string())
        .collect();
    assert_eq!(shown, vec!["0", "1", "length"]);

    value.reload_heavy_value().await.unwrap();
    assert!(!value.is_truncated());
    assert_eq!(value.properties().await.unwrap().len(), 6);
    assert_eq!(mock.sent_count(), 2);
}

#[tokio::test]
async fn test_short_array_is_not_truncated() {
    let mock = backend();
    let ctx = context(&mock, BackendProfile::Dev);
    let remote = json!({
        "type": "object",
        "subtype": "array",
        "className": "Array",
        "description": "Array(2)",
        "objectId": "arr:2",
        "preview": { "overflow": false, "properties": [] }
    });
    let value = Variable::real("pair", remote, None, false, None, ctx).value().unwrap();
    assert_eq!(value.as_array().unwrap().length(), Some(2));
    assert!(!value.is_truncated());
}

#[tokio::test]
async fn test_function_location_is_cached() {
    let mock = backend();
    let ctx = context(&mock, BackendProfile::Dev);
    let remote = json!({ "type": "function", "className": "Function", "description": "function f() {}", "objectId": "fn:1" });
    let value = Variable::real("f", remote, None, false, None, ctx).value().unwrap();
    let function = value.as_function().unwrap();

    let location = function.location().await.unwrap().unwrap();
    assert_eq!(location.script_id.as_str(), "10");
    assert_eq!(location.line, 12);
    function.location().await.unwrap();

    let request = mock.wait_for_method("Debugger.getFunctionDetails").await.unwrap();
    assert_eq!(request["params"], json!({ "functionId": "fn:1" }));
    assert_eq!(mock.sent_count(), 1);
}

#[tokio::test]
async fn test_set_value_on_local_scope() {
    let mock = backend();
    let ctx = context(&mock, BackendProfile::Dev);
    let group = ctx.group.name().to_string();
    let variable = Variable::real("a", number(1), None, false, Some(local_scope()), ctx);
    let old = variable.value().unwrap();
    assert!(variable.writable());

    let new = variable.set_value("40 + 2").await.unwrap();
    assert_eq!(new.text(), "42");
    // The memoised value is the one read before the assignment
    assert!(Arc::ptr_eq(&variable.value().unwrap(), &old));

    let sent = mock.sent();
    assert_eq!(sent[0]["method"], "Debugger.evaluateOnCallFrame");
    assert_eq!(
        sent[0]["params"],
        json!({ "callFrameId": "cf:0", "expression": "40 + 2", "objectGroup": group })
    );
    assert_eq!(sent[1]["method"], "Debugger.setVariableValue");
    assert_eq!(
        sent[1]["params"],
        json!({ "scopeNumber": 0, "variableName": "a", "newValue": { "value": 42 }, "callFrameId": "cf:0" })
    );
}

#[tokio::test]
async fn test_set_value_reports_thrown_expression() {
    let mock = backend();
    let ctx = context(&mock, BackendProfile::Dev);
    let variable = Variable::real("a", number(1), None, false, Some(local_scope()), ctx);

    let result = variable.set_value("oops()").await;
    assert!(matches!(result, Err(Error::Evaluation(_))));
    assert_eq!(mock.sent_methods(), vec!["Debugger.evaluateOnCallFrame"]);
}

#[tokio::test]
async fn test_set_value_unavailable() {
    let mock = backend();

    let old = Variable::real(
        "a",
        number(1),
        None,
        false,
        Some(local_scope()),
        context(&mock, BackendProfile::Protocol10),
    );
    assert!(!old.writable());
    assert!(matches!(old.set_value("2").await, Err(Error::NotSupported(_))));

    let global = Variable::real(
        "g",
        number(1),
        None,
        false,
        Some(ScopeRef {
            scope_type: ScopeType::Global,
            ..local_scope()
        }),
        context(&mock, BackendProfile::Dev),
    );
    assert!(!global.writable());

    let property = Variable::real("p", number(1), None, false, None, context(&mock, BackendProfile::Dev));
    assert!(!property.writable());
    assert!(matches!(property.set_value("2").await, Err(Error::NotSupported(_))));
    assert_eq!(mock.sent_count(), 0);
}

#[tokio::test]
async fn test_released_group_makes_handles_stale() {
    let mock = backend();
    let ctx = context(&mock, BackendProfile::Dev);
    let group = Arc::clone(&ctx.group);
    let touched = Variable::real("o", object("obj:1"), None, false, None, ctx.clone());
    let untouched = Variable::real("p", object("obj:2"), None, false, None, ctx);
    let value = touched.value().unwrap();

    group.invalidate();

    assert!(matches!(untouched.value(), Err(Error::StaleHandle(_))));
    assert!(matches!(untouched.reference_type_name(), Err(Error::StaleHandle(_))));
    assert!(matches!(value.properties().await, Err(Error::StaleHandle(_))));
    // Names stay readable
    assert_eq!(untouched.name(), "p");
    assert_eq!(untouched.kind(), VariableKind::Real);
    assert_eq!(mock.sent_count(), 0);
}
