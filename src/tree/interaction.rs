//! Typed interaction vocabulary
//!
//! The vocabulary is fixed and closed. Every interaction owns its config
//! schema and validates it, plus any role requirement, before touching the
//! page.

use super::keys;
use super::node::{Node, NodeRole};
use super::scripts::MARKER_ATTR;
use crate::error::{Error, Result};
use crate::transport::Transport;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// Closed set of interactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InteractionKind {
    Click,
    Type,
    Scroll,
    ScrollIntoView,
    Focus,
    Hover,
    Drag,
    Tap,
    PressKey,
    Wait,
    SaveCanvasAsPng,
}

/// Mouse button for click configs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Middle,
    Right,
}

impl MouseButton {
    fn as_str(&self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Middle => "middle",
            MouseButton::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClickConfig {
    #[serde(default)]
    pub button: MouseButton,
    #[serde(default)]
    pub double: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeConfig {
    pub text: String,
    #[serde(default)]
    pub delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScrollConfig {
    #[serde(default)]
    pub delta_x: f64,
    #[serde(default)]
    pub delta_y: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DragConfig {
    pub to_x: f64,
    pub to_y: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PressKeyConfig {
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaitConfig {
    pub duration_ms: u64,
}

/// Longest wait a single interaction may request
const MAX_WAIT_MS: u64 = 30_000;

/// Parse a required config payload
fn parse_config<T: serde::de::DeserializeOwned>(config: Option<Value>) -> Result<T> {
    let value = config
        .ok_or_else(|| Error::interaction_config_invalid("config is required"))?;
    serde_json::from_value(value)
        .map_err(|e| Error::interaction_config_invalid(format!("config schema mismatch: {}", e)))
}

/// Parse an optional config payload, defaulting when absent
fn parse_optional_config<T: serde::de::DeserializeOwned + Default>(
    config: Option<Value>,
) -> Result<T> {
    match config {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value).map_err(|e| {
            Error::interaction_config_invalid(format!("config schema mismatch: {}", e))
        }),
    }
}

/// Reject a config for interactions that take none
fn reject_config(config: Option<Value>) -> Result<()> {
    match config {
        None | Some(Value::Null) => Ok(()),
        Some(_) => Err(Error::interaction_config_invalid(
            "interaction takes no config",
        )),
    }
}

/// CSS selector addressing a node by its persisted marker
fn marker_selector(node: &Node) -> String {
    format!("[{}=\"{}\"]", MARKER_ATTR, node.id)
}

/// Execute one interaction against a resolved node
pub async fn perform(
    transport: &Transport,
    node: &Node,
    kind: InteractionKind,
    config: Option<Value>,
) -> Result<Option<Value>> {
    debug!("Performing {:?} on node {}", kind, node.id);

    match kind {
        InteractionKind::Click => click(transport, node, parse_optional_config(config)?).await,
        InteractionKind::Type => type_text(transport, node, parse_config(config)?).await,
        InteractionKind::Scroll => scroll(transport, node, parse_optional_config(config)?).await,
        InteractionKind::ScrollIntoView => {
            reject_config(config)?;
            scroll_into_view(transport, node).await
        }
        InteractionKind::Focus => {
            reject_config(config)?;
            focus(transport, node).await
        }
        InteractionKind::Hover => {
            reject_config(config)?;
            hover(transport, node).await
        }
        InteractionKind::Drag => drag(transport, node, parse_config(config)?).await,
        InteractionKind::Tap => {
            reject_config(config)?;
            tap(transport, node).await
        }
        InteractionKind::PressKey => press_key(transport, node, parse_config(config)?).await,
        InteractionKind::Wait => wait(parse_config(config)?).await,
        InteractionKind::SaveCanvasAsPng => {
            reject_config(config)?;
            // Role gate comes before any page-level work
            if node.role != NodeRole::Canvas {
                return Err(Error::role_mismatch(format!(
                    "save-canvas-as-png requires a canvas node, {} is {}",
                    node.id,
                    node.role.as_str()
                )));
            }
            save_canvas_as_png(transport, node).await
        }
    }
}

async fn dispatch_mouse(
    transport: &Transport,
    event_type: &str,
    x: f64,
    y: f64,
    extra: Value,
) -> Result<()> {
    let mut params = json!({ "type": event_type, "x": x, "y": y });
    if let (Some(params_map), Some(extra_map)) = (params.as_object_mut(), extra.as_object()) {
        for (key, value) in extra_map {
            params_map.insert(key.clone(), value.clone());
        }
    }
    transport.send("Input.dispatchMouseEvent", params).await?;
    Ok(())
}

async fn click(transport: &Transport, node: &Node, config: ClickConfig) -> Result<Option<Value>> {
    let (x, y) = node.bounds.center();
    let presses = if config.double { 2 } else { 1 };

    for count in 1..=presses {
        let extra = json!({ "button": config.button.as_str(), "clickCount": count });
        dispatch_mouse(transport, "mousePressed", x, y, extra.clone()).await?;
        dispatch_mouse(transport, "mouseReleased", x, y, extra).await?;
    }

    Ok(None)
}

async fn type_text(transport: &Transport, node: &Node, config: TypeConfig) -> Result<Option<Value>> {
    focus(transport, node).await?;

    for ch in config.text.chars() {
        transport
            .send(
                "Input.dispatchKeyEvent",
                json!({ "type": "char", "text": ch.to_string() }),
            )
            .await?;
        if let Some(delay) = config.delay_ms {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
    }

    Ok(None)
}

async fn scroll(transport: &Transport, node: &Node, config: ScrollConfig) -> Result<Option<Value>> {
    let (x, y) = node.bounds.center();
    dispatch_mouse(
        transport,
        "mouseWheel",
        x,
        y,
        json!({ "deltaX": config.delta_x, "deltaY": config.delta_y }),
    )
    .await?;
    Ok(None)
}

async fn scroll_into_view(transport: &Transport, node: &Node) -> Result<Option<Value>> {
    transport
        .evaluate(&format!(
            "document.querySelector('{}').scrollIntoView({{ block: 'center' }})",
            marker_selector(node)
        ))
        .await?;
    Ok(None)
}

async fn focus(transport: &Transport, node: &Node) -> Result<Option<Value>> {
    transport
        .evaluate(&format!(
            "document.querySelector('{}').focus()",
            marker_selector(node)
        ))
        .await?;
    Ok(None)
}

async fn hover(transport: &Transport, node: &Node) -> Result<Option<Value>> {
    let (x, y) = node.bounds.center();
    dispatch_mouse(transport, "mouseMoved", x, y, json!({})).await?;
    Ok(None)
}

async fn drag(transport: &Transport, node: &Node, config: DragConfig) -> Result<Option<Value>> {
    let (x, y) = node.bounds.center();
    let button = json!({ "button": "left", "clickCount": 1 });

    dispatch_mouse(transport, "mousePressed", x, y, button.clone()).await?;
    dispatch_mouse(
        transport,
        "mouseMoved",
        config.to_x,
        config.to_y,
        json!({ "button": "left" }),
    )
    .await?;
    dispatch_mouse(transport, "mouseReleased", config.to_x, config.to_y, button).await?;

    Ok(None)
}

async fn tap(transport: &Transport, node: &Node) -> Result<Option<Value>> {
    let (x, y) = node.bounds.center();
    let touch_point = json!([{ "x": x, "y": y }]);

    transport
        .send(
            "Input.dispatchTouchEvent",
            json!({ "type": "touchStart", "touchPoints": touch_point }),
        )
        .await?;
    transport
        .send(
            "Input.dispatchTouchEvent",
            json!({ "type": "touchEnd", "touchPoints": [] }),
        )
        .await?;

    Ok(None)
}

async fn press_key(
    transport: &Transport,
    node: &Node,
    config: PressKeyConfig,
) -> Result<Option<Value>> {
    let definition = keys::lookup(&config.key).ok_or_else(|| {
        Error::interaction_config_invalid(format!("unknown key \"{}\"", config.key))
    })?;

    focus(transport, node).await?;

    let mut down = json!({
        "type": "keyDown",
        "key": definition.key,
        "code": definition.code,
        "windowsVirtualKeyCode": definition.key_code,
    });
    if let Some(text) = definition.text {
        down["text"] = json!(text);
    }
    transport.send("Input.dispatchKeyEvent", down).await?;
    transport
        .send(
            "Input.dispatchKeyEvent",
            json!({
                "type": "keyUp",
                "key": definition.key,
                "code": definition.code,
                "windowsVirtualKeyCode": definition.key_code,
            }),
        )
        .await?;

    Ok(None)
}

async fn wait(config: WaitConfig) -> Result<Option<Value>> {
    if config.duration_ms == 0 || config.duration_ms > MAX_WAIT_MS {
        return Err(Error::interaction_config_invalid(format!(
            "wait duration must be between 1 and {} ms",
            MAX_WAIT_MS
        )));
    }
    tokio::time::sleep(std::time::Duration::from_millis(config.duration_ms)).await;
    Ok(None)
}

async fn save_canvas_as_png(transport: &Transport, node: &Node) -> Result<Option<Value>> {
    let data_url = transport
        .evaluate(&format!(
            "document.querySelector('{}').toDataURL('image/png')",
            marker_selector(node)
        ))
        .await?;

    let data_url = data_url
        .as_str()
        .ok_or_else(|| Error::operation_failed("canvas did not return a data URL"))?;

    let encoded = data_url
        .strip_prefix("data:image/png;base64,")
        .ok_or_else(|| Error::operation_failed("unexpected data URL format"))?;

    // Decode to validate, hand the payload on as base64
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| Error::operation_failed(format!("invalid canvas payload: {}", e)))?;

    Ok(Some(json!({
        "format": "png",
        "byte_length": bytes.len(),
        "base64": encoded,
    })))
}
