//! Message bus tests

use super::dispatcher::{expect_no_payload, expect_payload, handler, Dispatcher};
use super::message::{Action, Receiver, RuntimeMessage, RuntimeResponse};
use super::store::{event_key, BroadcastStore};
use crate::error::Error;
use serde::Deserialize;
use serde_json::json;

#[tokio::test]
async fn test_send_and_fetch() {
    let store = BroadcastStore::default();

    store.send("cursor:tab-1", json!({"x": 10})).await;
    let value = store.fetch("cursor:tab-1").await;

    assert_eq!(value, Some(json!({"x": 10})));
    assert_eq!(store.fetch("cursor:tab-2").await, None);
}

#[tokio::test]
async fn test_last_write_wins() {
    let store = BroadcastStore::default();

    store.send("status:debugger", json!("attaching")).await;
    store.send("status:debugger", json!("attached")).await;

    assert_eq!(store.fetch("status:debugger").await, Some(json!("attached")));
}

#[tokio::test]
async fn test_subscribe_receives_new_and_old() {
    let store = BroadcastStore::default();
    let mut sub = store.subscribe("cursor:tab-1");

    store.send("cursor:tab-1", json!(1)).await;
    store.send("cursor:tab-1", json!(2)).await;

    let first = sub.recv().await.unwrap();
    assert_eq!(first.new, Some(json!(1)));
    assert_eq!(first.old, None);

    let second = sub.recv().await.unwrap();
    assert_eq!(second.new, Some(json!(2)));
    assert_eq!(second.old, Some(json!(1)));
}

#[tokio::test]
async fn test_subscribe_filters_other_keys() {
    let store = BroadcastStore::default();
    let mut sub = store.subscribe("cursor:tab-1");

    store.send("cursor:tab-2", json!("other")).await;
    store.send("cursor:tab-1", json!("mine")).await;

    let change = sub.recv().await.unwrap();
    assert_eq!(change.key, "cursor:tab-1");
    assert_eq!(change.new, Some(json!("mine")));
}

#[tokio::test]
async fn test_delete_publishes_absent_value() {
    let store = BroadcastStore::default();
    let mut sub = store.subscribe("cursor:tab-1");

    store.send("cursor:tab-1", json!(1)).await;
    store.delete("cursor:tab-1").await;

    sub.recv().await.unwrap();
    let removal = sub.recv().await.unwrap();
    assert_eq!(removal.new, None);
    assert_eq!(removal.old, Some(json!(1)));
    assert_eq!(store.fetch("cursor:tab-1").await, None);
}

#[tokio::test]
async fn test_subscribe_type_yields_identifier() {
    let store = BroadcastStore::default();
    let mut sub = store.subscribe_type("cursor");

    store.send("status:debugger", json!("attached")).await;
    store.send(&event_key("cursor", "tab-7"), json!({"x": 0})).await;

    let change = sub.recv().await.unwrap();
    assert_eq!(change.event_type(), "cursor");
    assert_eq!(change.identifier(), "tab-7");
}

#[tokio::test]
async fn test_subscribe_all_sees_everything() {
    let store = BroadcastStore::default();
    let mut sub = store.subscribe_all();

    store.send("a:1", json!(1)).await;
    store.send("b:2", json!(2)).await;

    assert_eq!(sub.recv().await.unwrap().key, "a:1");
    assert_eq!(sub.recv().await.unwrap().key, "b:2");
}

#[derive(Debug, Deserialize)]
struct EchoPayload {
    #[allow(dead_code)]
    text: String,
}

fn ping_dispatcher() -> Dispatcher {
    let mut dispatcher = Dispatcher::new(Receiver::ServiceWorker);
    dispatcher.register(
        Action::Ping,
        expect_no_payload,
        handler(|_| async { Ok(Some(json!({"response": "pong"}))) }),
    );
    dispatcher
}

#[tokio::test]
async fn test_dispatch_ping_pong() {
    let dispatcher = ping_dispatcher();

    let response = dispatcher
        .dispatch(RuntimeMessage::new(Receiver::ServiceWorker, Action::Ping))
        .await
        .expect("addressed to us");

    assert!(response.is_success());
    assert_eq!(response.data(), Some(&json!({"response": "pong"})));
}

#[tokio::test]
async fn test_dispatch_ignores_other_receiver() {
    let dispatcher = ping_dispatcher();

    let response = dispatcher
        .dispatch(RuntimeMessage::new(Receiver::ContentScript, Action::Ping))
        .await;

    assert!(response.is_none());
}

#[tokio::test]
async fn test_dispatch_rejects_schema_violation() {
    let mut dispatcher = Dispatcher::new(Receiver::ServiceWorker);
    dispatcher.register(
        Action::PerformInteraction,
        expect_payload::<EchoPayload>,
        handler(|_| async { Ok(None) }),
    );

    let response = dispatcher
        .dispatch(RuntimeMessage::with_payload(
            Receiver::ServiceWorker,
            Action::PerformInteraction,
            json!({"wrong": true}),
        ))
        .await
        .unwrap();

    assert!(!response.is_success());
    assert!(response.error().unwrap().contains("schema"));
}

#[tokio::test]
async fn test_sender_side_validation_uses_same_schema() {
    let mut dispatcher = Dispatcher::new(Receiver::ServiceWorker);
    dispatcher.register(
        Action::PerformInteraction,
        expect_payload::<EchoPayload>,
        handler(|_| async { Ok(None) }),
    );

    let good = RuntimeMessage::with_payload(
        Receiver::ServiceWorker,
        Action::PerformInteraction,
        json!({"text": "hello"}),
    );
    assert!(dispatcher.validate(&good).is_ok());

    let bad = RuntimeMessage::with_payload(
        Receiver::ServiceWorker,
        Action::PerformInteraction,
        json!({"wrong": true}),
    );
    assert!(dispatcher.validate(&bad).is_err());
}

#[tokio::test]
async fn test_dispatch_converts_handler_error_to_failure() {
    let mut dispatcher = Dispatcher::new(Receiver::ServiceWorker);
    dispatcher.register(
        Action::Attach,
        expect_no_payload,
        handler(|_| async { Err(Error::transport_unavailable("no debugger api")) }),
    );

    let response = dispatcher
        .dispatch(RuntimeMessage::new(Receiver::ServiceWorker, Action::Attach))
        .await
        .unwrap();

    assert!(!response.is_success());
    assert!(response.error().unwrap().contains("Transport unavailable"));
}

#[test]
fn test_response_wire_shape() {
    let ok = RuntimeResponse::ok(Some(json!({"response": "pong"})));
    let encoded = serde_json::to_value(&ok).unwrap();
    assert_eq!(encoded, json!({"success": true, "data": {"response": "pong"}}));

    let err = RuntimeResponse::err("boom");
    let encoded = serde_json::to_value(&err).unwrap();
    assert_eq!(encoded, json!({"success": false, "error": "boom"}));

    let decoded: RuntimeResponse =
        serde_json::from_value(json!({"success": false, "error": "boom"})).unwrap();
    assert!(!decoded.is_success());
    assert_eq!(decoded.error(), Some("boom"));

    let decoded: RuntimeResponse = serde_json::from_value(json!({"success": true})).unwrap();
    assert!(decoded.is_success());
    assert!(decoded.data().is_none());
}

#[test]
fn test_envelope_wire_shape() {
    let message = RuntimeMessage::new(Receiver::ServiceWorker, Action::Ping);
    let encoded = serde_json::to_value(&message).unwrap();
    assert_eq!(encoded, json!({"receiver": "SERVICE_WORKER", "action": "PING"}));
}
