//! Service-worker action handlers
//!
//! Wires the action vocabulary to the engine, transport manager, and cursor
//! coordinator. Handlers that need a live debugger attachment are composed
//! with an explicit ensure-attached wrapper, keeping the precondition
//! visible at the registration site.

use crate::bus::dispatcher::{expect_no_payload, expect_payload, handler, Dispatcher, Handler};
use crate::bus::message::{Action, Receiver};
use crate::context::ExecContext;
use crate::cursor::CursorEventKind;
use crate::error::Result;
use crate::tree::interaction::MouseButton;
use crate::tree::InteractionKind;
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PaginatedTreePayload {
    /// Falls back to the configured page budget when omitted
    #[serde(default)]
    max_token_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PaginatedTreeCursorPayload {
    #[serde(default)]
    max_token_size: Option<usize>,
    cursor: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PerformInteractionPayload {
    node_id: String,
    interaction: InteractionKind,
    #[serde(default)]
    config: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MoveCursorPayload {
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClickCursorPayload {
    #[serde(default)]
    button: MouseButton,
    #[serde(default)]
    double_click: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DragCursorPayload {
    to_x: f64,
    to_y: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReportCursorPayload {
    x: f64,
    y: f64,
    event: CursorEventKind,
}

/// Compose a handler with the ensure-attached precondition
fn attached<F, Fut>(ctx: &Arc<ExecContext>, f: F) -> Handler
where
    F: Fn(Arc<ExecContext>, Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Value>>> + Send + 'static,
{
    let ctx = Arc::clone(ctx);
    let f = Arc::new(f);
    Arc::new(move |payload| {
        let ctx = Arc::clone(&ctx);
        let f = Arc::clone(&f);
        Box::pin(async move {
            ctx.transports.ensure_attached()?;
            f(ctx, payload).await
        })
    })
}

fn parse<T: serde::de::DeserializeOwned>(payload: Option<Value>) -> Result<T> {
    let value = payload.ok_or_else(|| {
        crate::Error::interaction_config_invalid("payload is required")
    })?;
    serde_json::from_value(value).map_err(|e| {
        crate::Error::interaction_config_invalid(format!("payload schema mismatch: {}", e))
    })
}

/// Build the service-worker dispatcher over a wired context
pub fn service_worker_dispatcher(ctx: &Arc<ExecContext>) -> Dispatcher {
    let mut dispatcher = Dispatcher::new(Receiver::ServiceWorker);

    dispatcher.register(
        Action::Ping,
        expect_no_payload,
        handler(|_| async { Ok(Some(json!({"response": "pong"}))) }),
    );

    {
        let ctx = Arc::clone(ctx);
        dispatcher.register(
            Action::Attach,
            expect_no_payload,
            handler(move |_| {
                let ctx = Arc::clone(&ctx);
                async move {
                    ctx.transports.attach().await?;
                    Ok(None)
                }
            }),
        );
    }

    {
        let ctx = Arc::clone(ctx);
        dispatcher.register(
            Action::Detach,
            expect_no_payload,
            handler(move |_| {
                let ctx = Arc::clone(&ctx);
                async move {
                    ctx.transports.detach().await?;
                    Ok(None)
                }
            }),
        );
    }

    dispatcher.register(
        Action::FetchFullTree,
        expect_no_payload,
        attached(ctx, |ctx, _| async move {
            let tree = ctx.engine.fetch_full_tree().await?;
            Ok(Some(serde_json::to_value(tree)?))
        }),
    );

    dispatcher.register(
        Action::FetchViewTree,
        expect_no_payload,
        attached(ctx, |ctx, _| async move {
            let tree = ctx.engine.fetch_view_tree().await?;
            Ok(Some(serde_json::to_value(tree)?))
        }),
    );

    dispatcher.register(
        Action::FetchPaginatedTree,
        expect_payload::<PaginatedTreePayload>,
        attached(ctx, |ctx, payload| async move {
            let payload: PaginatedTreePayload = parse(payload)?;
            let budget = payload
                .max_token_size
                .unwrap_or(ctx.config.tree_page_token_budget);
            let page = ctx.engine.fetch_paginated_tree(budget).await?;
            Ok(Some(serde_json::to_value(page)?))
        }),
    );

    dispatcher.register(
        Action::FetchPaginatedTreeByCursor,
        expect_payload::<PaginatedTreeCursorPayload>,
        attached(ctx, |ctx, payload| async move {
            let payload: PaginatedTreeCursorPayload = parse(payload)?;
            let budget = payload
                .max_token_size
                .unwrap_or(ctx.config.tree_page_token_budget);
            let page = ctx
                .engine
                .fetch_paginated_tree_by_cursor(budget, &payload.cursor)
                .await?;
            Ok(Some(serde_json::to_value(page)?))
        }),
    );

    dispatcher.register(
        Action::PerformInteraction,
        expect_payload::<PerformInteractionPayload>,
        attached(ctx, |ctx, payload| async move {
            let payload: PerformInteractionPayload = parse(payload)?;
            ctx.engine
                .perform_interaction(&payload.node_id, payload.interaction, payload.config)
                .await
        }),
    );

    dispatcher.register(
        Action::MoveCursor,
        expect_payload::<MoveCursorPayload>,
        attached(ctx, |ctx, payload| async move {
            let payload: MoveCursorPayload = parse(payload)?;
            let record = ctx.cursor.r#move(payload.x, payload.y).await?;
            Ok(Some(serde_json::to_value(record)?))
        }),
    );

    dispatcher.register(
        Action::ClickCursor,
        expect_payload::<ClickCursorPayload>,
        attached(ctx, |ctx, payload| async move {
            let payload: ClickCursorPayload = parse(payload)?;
            ctx.cursor.click(payload.button, payload.double_click).await?;
            Ok(None)
        }),
    );

    dispatcher.register(
        Action::DragCursor,
        expect_payload::<DragCursorPayload>,
        attached(ctx, |ctx, payload| async move {
            let payload: DragCursorPayload = parse(payload)?;
            ctx.cursor.drag(payload.to_x, payload.to_y).await?;
            Ok(None)
        }),
    );

    dispatcher.register(
        Action::ResetCursor,
        expect_no_payload,
        attached(ctx, |ctx, _| async move {
            let record = ctx.cursor.reset().await?;
            Ok(Some(serde_json::to_value(record)?))
        }),
    );

    dispatcher.register(
        Action::ReportCursor,
        expect_payload::<ReportCursorPayload>,
        attached(ctx, |ctx, payload| async move {
            let payload: ReportCursorPayload = parse(payload)?;
            let record = ctx
                .cursor
                .report(payload.x, payload.y, payload.event)
                .await?;
            Ok(Some(serde_json::to_value(record)?))
        }),
    );

    dispatcher
}
