//! Webhook deployment mode: Telegram pushes updates to an axum endpoint
//! instead of the bot pulling them with getUpdates.

use super::{incoming_from_update, perform, Bot, Update};
use crate::handlers::handle_event;
use crate::state::AppState;
use crate::types::ChatId;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Path the webhook is registered under. Kept unguessable enough by living
/// below the public base URL only Telegram is told about.
pub const UPDATE_PATH: &str = "/telegram/update";

#[derive(Clone)]
struct WebhookContext {
    bot: Bot,
    channel: ChatId,
    state: Arc<AppState>,
}

/// Build the webhook router.
pub fn router(bot: Bot, channel: ChatId, state: Arc<AppState>) -> Router {
    let context = WebhookContext {
        bot,
        channel,
        state,
    };
    Router::new()
        .route(UPDATE_PATH, post(receive_update))
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

/// The webhook URL to register for a given public base URL.
pub fn webhook_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), UPDATE_PATH)
}

async fn receive_update(
    State(context): State<WebhookContext>,
    Json(update): Json<Update>,
) -> StatusCode {
    // Always 200: Telegram retries non-2xx responses, and a handler bug
    // must not turn into an endless redelivery storm.
    let Some(event) = incoming_from_update(update) else {
        return StatusCode::OK;
    };
    let effects = handle_event(event, &context.state).await;
    perform(&context.bot, context.channel, effects).await;
    StatusCode::OK
}
