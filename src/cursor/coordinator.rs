//! Cursor coordinator implementation

use super::position::{cursor_key, CursorEventKind, CursorPosition};
use crate::bus::store::BroadcastStore;
use crate::error::{Error, Result};
use crate::transport::{Transport, TransportManager};
use crate::tree::interaction::MouseButton;
use crate::tree::node::BoundingBox;
use crate::tree::scripts::cursor_style_script;
use rand::Rng;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Bounds of the randomized click pause
const CLICK_PAUSE_MS: std::ops::RangeInclusive<u64> = 100..=400;

/// Cursor coordinator
pub struct CursorCoordinator {
    transports: Arc<TransportManager>,
    bus: Arc<BroadcastStore>,
}

impl CursorCoordinator {
    /// Create a coordinator over the transport manager and broadcast store
    pub fn new(transports: Arc<TransportManager>, bus: Arc<BroadcastStore>) -> Self {
        Self { transports, bus }
    }

    /// Last published record for the active tab
    pub async fn current(&self) -> Result<Option<CursorPosition>> {
        let tab = match self.transports.active_tab().await {
            Some(tab) => tab,
            None => return Ok(None),
        };

        match self.bus.fetch(&cursor_key(&tab.id)).await {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Move the pointer and publish the resulting record
    pub async fn r#move(&self, target_x: f64, target_y: f64) -> Result<CursorPosition> {
        let transport = self.transports.active_transport().await?;

        self.dispatch_mouse(&transport, "mouseMoved", target_x, target_y, None)
            .await?;

        self.publish(&transport, target_x, target_y, CursorEventKind::MouseMove)
            .await
    }

    /// Click at the current pointer position.
    ///
    /// Each edge publishes its own record, so observers can render the press
    /// and the release, not just the final state. The pause between edges is
    /// randomized to human-plausible lengths.
    pub async fn click(&self, button: MouseButton, double_click: bool) -> Result<()> {
        let transport = self.transports.active_transport().await?;
        let (x, y) = self.pointer_position().await;

        let presses = if double_click { 2 } else { 1 };
        for count in 1..=presses {
            self.dispatch_mouse(&transport, "mousePressed", x, y, Some((button, count)))
                .await?;
            self.publish(&transport, x, y, CursorEventKind::MouseDown)
                .await?;

            // Randomize before the await: thread-local RNG handles are not
            // Send
            let pause = rand::thread_rng().gen_range(CLICK_PAUSE_MS);
            tokio::time::sleep(Duration::from_millis(pause)).await;

            self.dispatch_mouse(&transport, "mouseReleased", x, y, Some((button, count)))
                .await?;
            self.publish(&transport, x, y, CursorEventKind::MouseUp)
                .await?;
        }

        Ok(())
    }

    /// Drag from the current pointer position to a target.
    ///
    /// The button press is guarded by the last broadcast state, and a
    /// "button already pressed" report from the input stack is recoverable:
    /// the pointer is reset and the drag reports success.
    pub async fn drag(&self, target_x: f64, target_y: f64) -> Result<()> {
        let transport = self.transports.active_transport().await?;
        let (x, y) = self.pointer_position().await;

        let already_down = self
            .current()
            .await?
            .map(|record| record.is_button_down())
            .unwrap_or(false);

        if !already_down {
            match self
                .dispatch_mouse(&transport, "mousePressed", x, y, Some((MouseButton::Left, 1)))
                .await
            {
                Ok(()) => {
                    self.publish(&transport, x, y, CursorEventKind::MouseDown)
                        .await?;
                }
                Err(Error::PointerStateConflict(reason)) => {
                    warn!("Pointer state conflict during drag ({}), resetting", reason);
                    self.reset().await?;
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        } else {
            debug!("Button already down per last broadcast, skipping press");
        }

        self.dispatch_mouse(&transport, "mouseMoved", target_x, target_y, None)
            .await?;
        self.publish(&transport, target_x, target_y, CursorEventKind::MouseMove)
            .await?;

        self.dispatch_mouse(
            &transport,
            "mouseReleased",
            target_x,
            target_y,
            Some((MouseButton::Left, 1)),
        )
        .await?;
        self.publish(&transport, target_x, target_y, CursorEventKind::MouseUp)
            .await?;

        Ok(())
    }

    /// Force the button released and park the pointer at a random point
    /// inside the middle half of the viewport.
    ///
    /// A fixed reset pixel would look scripted to anti-automation heuristics,
    /// so the target is randomized.
    pub async fn reset(&self) -> Result<CursorPosition> {
        let transport = self.transports.active_transport().await?;
        let (x, y) = self.pointer_position().await;

        if let Err(e) = self
            .dispatch_mouse(&transport, "mouseReleased", x, y, Some((MouseButton::Left, 1)))
            .await
        {
            // Releasing an unpressed button can itself conflict; the goal is
            // a known-released state either way
            debug!("Release during reset reported: {}", e);
        }

        let viewport = self.viewport(&transport).await?;
        let (park_x, park_y) = {
            let mut rng = rand::thread_rng();
            (
                rng.gen_range(viewport.width * 0.25..=viewport.width * 0.75),
                rng.gen_range(viewport.height * 0.25..=viewport.height * 0.75),
            )
        };

        info!("Resetting pointer to ({:.0}, {:.0})", park_x, park_y);
        self.dispatch_mouse(&transport, "mouseMoved", park_x, park_y, None)
            .await?;

        self.publish(&transport, park_x, park_y, CursorEventKind::MouseMove)
            .await
    }

    /// Feed a position event observed inside the page into the shared
    /// record.
    ///
    /// The style still comes from a live page query, the same as for
    /// externally issued moves, so both sources converge on one record shape.
    pub async fn report(&self, x: f64, y: f64, event: CursorEventKind) -> Result<CursorPosition> {
        let transport = self.transports.active_transport().await?;
        self.publish(&transport, x, y, event).await
    }

    /// Pointer position according to the last broadcast, origin when none
    async fn pointer_position(&self) -> (f64, f64) {
        match self.current().await {
            Ok(Some(record)) => (record.x, record.y),
            _ => (0.0, 0.0),
        }
    }

    /// Query the CSS cursor style at a point from the live page
    async fn query_style(&self, transport: &Transport, x: f64, y: f64) -> String {
        match transport.evaluate(&cursor_style_script(x, y)).await {
            Ok(value) => value.as_str().unwrap_or("default").to_string(),
            Err(e) => {
                debug!("Cursor style query failed ({}), using default", e);
                "default".to_string()
            }
        }
    }

    /// Build and publish the authoritative record for one transition
    async fn publish(
        &self,
        transport: &Transport,
        x: f64,
        y: f64,
        event: CursorEventKind,
    ) -> Result<CursorPosition> {
        let cursor_style = self.query_style(transport, x, y).await;

        let record = CursorPosition {
            x,
            y,
            cursor_style,
            event,
            tab_id: transport.tab_id().clone(),
            timestamp: chrono::Utc::now(),
        };

        self.bus
            .send(&cursor_key(transport.tab_id()), serde_json::to_value(&record)?)
            .await;

        Ok(record)
    }

    async fn dispatch_mouse(
        &self,
        transport: &Transport,
        event_type: &str,
        x: f64,
        y: f64,
        button: Option<(MouseButton, u32)>,
    ) -> Result<()> {
        let mut params = json!({ "type": event_type, "x": x, "y": y });
        if let Some((button, click_count)) = button {
            params["button"] = serde_json::to_value(button)?;
            params["clickCount"] = json!(click_count);
        }

        transport.send("Input.dispatchMouseEvent", params).await?;
        Ok(())
    }

    async fn viewport(&self, transport: &Transport) -> Result<BoundingBox> {
        let metrics = transport
            .send("Page.getLayoutMetrics", json!({}))
            .await?;
        let viewport = metrics
            .get("cssLayoutViewport")
            .ok_or_else(|| Error::debugger("Layout metrics missing cssLayoutViewport"))?;

        Ok(BoundingBox {
            x: viewport.get("pageX").and_then(|v| v.as_f64()).unwrap_or(0.0),
            y: viewport.get("pageY").and_then(|v| v.as_f64()).unwrap_or(0.0),
            width: viewport
                .get("clientWidth")
                .and_then(|v| v.as_f64())
                .unwrap_or(1280.0),
            height: viewport
                .get("clientHeight")
                .and_then(|v| v.as_f64())
                .unwrap_or(720.0),
        })
    }
}

impl std::fmt::Debug for CursorCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorCoordinator").finish()
    }
}
