//! End-to-end integration tests
//!
//! Drives the full stack over the loopback channel: staged RPC calls into
//! the service-worker dispatcher, down through the transport manager and
//! engine against a mock debugger host.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tabscope::bus::message::{Action, Receiver, RuntimeMessage};
use tabscope::config::Config;
use tabscope::context::ExecContext;
use tabscope::gateway::{InMemoryChannel, RpcGateway, RpcResponder, RpcTimeouts};
use tabscope::handlers::service_worker_dispatcher;
use tabscope::transport::MockDebuggerHost;
use tabscope::tree::{BoundingBox, DomSnapshot, SnapshotElement};

const TARGET: &str = "ext-e2e";

struct Harness {
    host: Arc<MockDebuggerHost>,
    ctx: Arc<ExecContext>,
    gateway: RpcGateway,
}

async fn harness() -> Harness {
    let host = Arc::new(MockDebuggerHost::new());
    let ctx = ExecContext::new(Config::default(), host.clone());

    let channel = Arc::new(InMemoryChannel::new());
    let dispatcher = Arc::new(service_worker_dispatcher(&ctx));
    let responder = Arc::new(RpcResponder::new(channel.clone(), TARGET, dispatcher));
    responder.spawn();
    tokio::task::yield_now().await;

    let gateway = RpcGateway::with_timeouts(
        channel,
        RpcTimeouts {
            ack: Duration::from_millis(250),
            response: Duration::from_secs(2),
        },
    );

    Harness { host, ctx, gateway }
}

fn element(index: usize, parent: Option<usize>, tag: &str, marker: &str) -> SnapshotElement {
    SnapshotElement {
        index,
        parent,
        tag: tag.to_string(),
        role: None,
        input_type: None,
        marker: Some(marker.to_string()),
        name: Some(format!("{} element", tag)),
        value: None,
        bounds: BoundingBox {
            x: 0.0,
            y: index as f64 * 100.0,
            width: 300.0,
            height: 50.0,
        },
    }
}

fn snapshot() -> DomSnapshot {
    DomSnapshot {
        elements: vec![
            element(0, None, "body", "root01"),
            element(1, Some(0), "button", "btn001"),
            element(2, Some(0), "a", "link01"),
        ],
        viewport: BoundingBox {
            x: 0.0,
            y: 0.0,
            width: 1280.0,
            height: 720.0,
        },
    }
}

fn push_snapshot(host: &MockDebuggerHost) {
    let serialized = serde_json::to_string(&snapshot()).unwrap();
    host.push_evaluation(json!(serialized));
}

#[tokio::test]
async fn test_ping_round_trip() {
    let h = harness().await;

    let response = h
        .gateway
        .send_runtime_message(
            TARGET,
            &RuntimeMessage::new(Receiver::ServiceWorker, Action::Ping),
        )
        .await
        .unwrap();

    assert!(response.is_success());
    assert_eq!(response.data(), Some(&json!({"response": "pong"})));
}

#[tokio::test]
async fn test_tree_requires_attachment() {
    let h = harness().await;

    let response = h
        .gateway
        .send_runtime_message(
            TARGET,
            &RuntimeMessage::new(Receiver::ServiceWorker, Action::FetchFullTree),
        )
        .await
        .unwrap();

    assert!(!response.is_success());
    assert!(response.error().unwrap().contains("not attached"));
}

#[tokio::test]
async fn test_attach_fetch_tree_interact_detach() {
    let h = harness().await;

    // Attach
    let response = h
        .gateway
        .send_runtime_message(
            TARGET,
            &RuntimeMessage::new(Receiver::ServiceWorker, Action::Attach),
        )
        .await
        .unwrap();
    assert!(response.is_success());
    assert!(h.ctx.transports.is_attached());

    // Fetch a paginated tree under a tight budget: partial page plus cursor
    push_snapshot(&h.host);
    let response = h
        .gateway
        .send_runtime_message(
            TARGET,
            &RuntimeMessage::with_payload(
                Receiver::ServiceWorker,
                Action::FetchPaginatedTree,
                json!({"max_token_size": 8}),
            ),
        )
        .await
        .unwrap();
    assert!(response.is_success());
    let page = response.data().unwrap();
    assert!(page["cursor"].is_string());
    assert!(page["rendered_nodes"].as_u64().unwrap() < page["total_nodes"].as_u64().unwrap());

    // Resume from the cursor
    let response = h
        .gateway
        .send_runtime_message(
            TARGET,
            &RuntimeMessage::with_payload(
                Receiver::ServiceWorker,
                Action::FetchPaginatedTreeByCursor,
                json!({"max_token_size": 100000, "cursor": page["cursor"]}),
            ),
        )
        .await
        .unwrap();
    assert!(response.is_success());

    // Click the button node
    let response = h
        .gateway
        .send_runtime_message(
            TARGET,
            &RuntimeMessage::with_payload(
                Receiver::ServiceWorker,
                Action::PerformInteraction,
                json!({"node_id": "btn001", "interaction": "click"}),
            ),
        )
        .await
        .unwrap();
    assert!(response.is_success());
    let clicks = h.host.sent("Input.dispatchMouseEvent");
    assert_eq!(clicks.len(), 2);

    // Detach
    let response = h
        .gateway
        .send_runtime_message(
            TARGET,
            &RuntimeMessage::new(Receiver::ServiceWorker, Action::Detach),
        )
        .await
        .unwrap();
    assert!(response.is_success());
    assert!(!h.ctx.transports.is_attached());
}

#[tokio::test]
async fn test_stale_node_reference_fails_cleanly() {
    let h = harness().await;
    h.ctx.transports.attach().await.unwrap();
    h.ctx.engine.load_snapshot(snapshot()).await.unwrap();

    let response = h
        .gateway
        .send_runtime_message(
            TARGET,
            &RuntimeMessage::with_payload(
                Receiver::ServiceWorker,
                Action::PerformInteraction,
                json!({"node_id": "gone99", "interaction": "click"}),
            ),
        )
        .await
        .unwrap();

    assert!(!response.is_success());
    assert!(response.error().unwrap().contains("Node not found"));
}

#[tokio::test]
async fn test_cursor_click_broadcasts_both_edges() {
    let h = harness().await;
    h.ctx.transports.attach().await.unwrap();

    let mut sub = h.ctx.bus.subscribe("cursor:tab-1");

    let response = h
        .gateway
        .send_runtime_message(
            TARGET,
            &RuntimeMessage::with_payload(
                Receiver::ServiceWorker,
                Action::ClickCursor,
                json!({"button": "left"}),
            ),
        )
        .await
        .unwrap();
    assert!(response.is_success());

    let first = sub.recv().await.unwrap().new.unwrap();
    let second = sub.recv().await.unwrap().new.unwrap();
    assert_eq!(first["event"], "mousedown");
    assert_eq!(second["event"], "mouseup");
}

#[tokio::test]
async fn test_page_cursor_report_updates_shared_record() {
    let h = harness().await;
    h.ctx.transports.attach().await.unwrap();

    let response = h
        .gateway
        .send_runtime_message(
            TARGET,
            &RuntimeMessage::with_payload(
                Receiver::ServiceWorker,
                Action::ReportCursor,
                json!({"x": 33.0, "y": 44.0, "event": "mousemove"}),
            ),
        )
        .await
        .unwrap();
    assert!(response.is_success());

    let record = h.ctx.bus.fetch("cursor:tab-1").await.unwrap();
    assert_eq!(record["x"], json!(33.0));
    assert_eq!(record["y"], json!(44.0));
}

#[tokio::test]
async fn test_schema_violation_rejected_at_dispatch() {
    let h = harness().await;
    h.ctx.transports.attach().await.unwrap();

    let response = h
        .gateway
        .send_runtime_message(
            TARGET,
            &RuntimeMessage::with_payload(
                Receiver::ServiceWorker,
                Action::MoveCursor,
                json!({"x": "not a number", "y": 2.0}),
            ),
        )
        .await
        .unwrap();

    assert!(!response.is_success());
    assert!(response.error().unwrap().contains("schema"));
    assert!(h.host.sent("Input.dispatchMouseEvent").is_empty());
}
