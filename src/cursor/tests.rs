//! Cursor coordinator tests

use super::coordinator::CursorCoordinator;
use super::position::{CursorEventKind, CursorPosition};
use crate::bus::store::{BroadcastStore, BusSubscription};
use crate::error::Error;
use crate::transport::{MockDebuggerHost, TransportManager};
use crate::tree::interaction::MouseButton;
use serde_json::json;
use std::sync::Arc;

async fn coordinator_with_mock() -> (
    Arc<MockDebuggerHost>,
    CursorCoordinator,
    Arc<BroadcastStore>,
) {
    let host = Arc::new(MockDebuggerHost::new());
    let bus = Arc::new(BroadcastStore::default());
    let manager = Arc::new(TransportManager::new(host.clone(), bus.clone()));
    manager.attach().await.unwrap();
    (host, CursorCoordinator::new(manager, bus.clone()), bus)
}

fn drain_records(sub: &mut BusSubscription) -> Vec<CursorPosition> {
    let mut records = Vec::new();
    while let Ok(Some(change)) = sub.try_recv() {
        if let Some(value) = change.new {
            records.push(serde_json::from_value(value).unwrap());
        }
    }
    records
}

#[tokio::test]
async fn test_move_publishes_page_queried_style() {
    let (host, coordinator, bus) = coordinator_with_mock().await;
    let mut sub = bus.subscribe("cursor:tab-1");

    host.push_evaluation(json!("pointer"));
    let record = coordinator.r#move(150.0, 250.0).await.unwrap();

    assert_eq!(record.x, 150.0);
    assert_eq!(record.y, 250.0);
    assert_eq!(record.event, CursorEventKind::MouseMove);
    assert_eq!(record.cursor_style, "pointer");

    let moved = host.sent("Input.dispatchMouseEvent");
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].params["type"], "mouseMoved");

    let records = drain_records(&mut sub);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].cursor_style, "pointer");
}

#[tokio::test(start_paused = true)]
async fn test_click_emits_down_then_up_with_human_pause() {
    let (host, coordinator, bus) = coordinator_with_mock().await;
    let mut sub = bus.subscribe("cursor:tab-1");

    let started = tokio::time::Instant::now();
    coordinator.click(MouseButton::Left, false).await.unwrap();
    let elapsed = started.elapsed();

    let records = drain_records(&mut sub);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].event, CursorEventKind::MouseDown);
    assert_eq!(records[1].event, CursorEventKind::MouseUp);

    // The randomized pause dominates the virtual clock
    assert!(elapsed >= std::time::Duration::from_millis(100));
    assert!(elapsed <= std::time::Duration::from_millis(400));

    let dispatched = host.sent("Input.dispatchMouseEvent");
    assert_eq!(dispatched.len(), 2);
    assert_eq!(dispatched[0].params["type"], "mousePressed");
    assert_eq!(dispatched[0].params["button"], "left");
    assert_eq!(dispatched[1].params["type"], "mouseReleased");
}

#[tokio::test(start_paused = true)]
async fn test_double_click_repeats_both_edges() {
    let (host, coordinator, bus) = coordinator_with_mock().await;
    let mut sub = bus.subscribe("cursor:tab-1");

    coordinator.click(MouseButton::Left, true).await.unwrap();

    let records = drain_records(&mut sub);
    let events: Vec<CursorEventKind> = records.iter().map(|r| r.event).collect();
    assert_eq!(
        events,
        vec![
            CursorEventKind::MouseDown,
            CursorEventKind::MouseUp,
            CursorEventKind::MouseDown,
            CursorEventKind::MouseUp,
        ]
    );

    let dispatched = host.sent("Input.dispatchMouseEvent");
    assert_eq!(dispatched.len(), 4);
    assert_eq!(dispatched[2].params["clickCount"], json!(2));
}

#[tokio::test]
async fn test_drag_presses_moves_releases() {
    let (host, coordinator, _bus) = coordinator_with_mock().await;

    coordinator.drag(500.0, 400.0).await.unwrap();

    let dispatched = host.sent("Input.dispatchMouseEvent");
    let kinds: Vec<&str> = dispatched
        .iter()
        .map(|c| c.params["type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["mousePressed", "mouseMoved", "mouseReleased"]);
    assert_eq!(dispatched[1].params["x"], json!(500.0));
}

#[tokio::test]
async fn test_drag_skips_press_when_button_already_down() {
    let (host, coordinator, _bus) = coordinator_with_mock().await;

    // Seed the broadcast state with a held button
    host.push_evaluation(json!("grabbing"));
    coordinator
        .report(10.0, 10.0, CursorEventKind::MouseDown)
        .await
        .unwrap();
    let seed_dispatches = host.sent("Input.dispatchMouseEvent").len();

    coordinator.drag(300.0, 300.0).await.unwrap();

    let dispatched: Vec<String> = host.sent("Input.dispatchMouseEvent")[seed_dispatches..]
        .iter()
        .map(|c| c.params["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(dispatched, vec!["mouseMoved", "mouseReleased"]);
}

#[tokio::test]
async fn test_drag_recovers_from_already_pressed() {
    let (host, coordinator, bus) = coordinator_with_mock().await;

    host.push_error(
        "Input.dispatchMouseEvent",
        Error::pointer_state_conflict("Button is already pressed"),
    );

    // Recoverable: the drag resolves successfully after a reset
    coordinator.drag(300.0, 300.0).await.unwrap();

    let dispatched = host.sent("Input.dispatchMouseEvent");
    let kinds: Vec<&str> = dispatched
        .iter()
        .map(|c| c.params["type"].as_str().unwrap())
        .collect();
    // Failed press, then the reset's release and park move
    assert_eq!(kinds, vec!["mousePressed", "mouseReleased", "mouseMoved"]);

    let record: CursorPosition =
        serde_json::from_value(bus.fetch("cursor:tab-1").await.unwrap()).unwrap();
    assert_eq!(record.event, CursorEventKind::MouseMove);
    assert!(!record.is_button_down());
}

#[tokio::test]
async fn test_reset_parks_inside_middle_half_of_viewport() {
    let (_host, coordinator, _bus) = coordinator_with_mock().await;

    // Mock viewport is 1280x720
    for _ in 0..10 {
        let record = coordinator.reset().await.unwrap();
        assert!(record.x >= 320.0 && record.x <= 960.0);
        assert!(record.y >= 180.0 && record.y <= 540.0);
        assert_eq!(record.event, CursorEventKind::MouseMove);
    }
}

#[tokio::test]
async fn test_page_reports_converge_on_same_record() {
    let (host, coordinator, bus) = coordinator_with_mock().await;

    host.push_evaluation(json!("text"));
    coordinator
        .report(42.0, 84.0, CursorEventKind::MouseMove)
        .await
        .unwrap();

    let record: CursorPosition =
        serde_json::from_value(bus.fetch("cursor:tab-1").await.unwrap()).unwrap();
    assert_eq!(record.x, 42.0);
    assert_eq!(record.y, 84.0);
    assert_eq!(record.cursor_style, "text");

    // An external move replaces the same record
    let moved = coordinator.r#move(50.0, 60.0).await.unwrap();
    let stored: CursorPosition =
        serde_json::from_value(bus.fetch("cursor:tab-1").await.unwrap()).unwrap();
    assert_eq!(stored.x, moved.x);
}
