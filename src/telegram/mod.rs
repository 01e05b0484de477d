//! Thin Telegram Bot API client and the conversion between Bot API updates
//! and the transport-independent event protocol.

pub mod poll;
pub mod webhook;

use crate::protocol::{Button, Effect, Incoming, Keyboard, Sender};
use crate::types::{ChatId, MessageId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

const API_BASE: &str = "https://api.telegram.org";
/// Long-poll duration requested from getUpdates.
const POLL_TIMEOUT_SECS: u64 = 30;

// ---- Bot API wire types (the subset this bot consumes) ----

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: MessageId,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: ChatId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl User {
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }

    fn sender(&self) -> Sender {
        Sender {
            id: self.id,
            username: self.username.clone(),
            display_name: self.full_name(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardMarkup<'a> {
    inline_keyboard: &'a [Vec<Button>],
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("telegram api error {code}: {description}")]
    Telegram { code: i64, description: String },
}

// ---- Client ----

#[derive(Clone)]
pub struct Bot {
    client: reqwest::Client,
    base: String,
}

impl Bot {
    pub fn new(token: &str) -> Self {
        // getUpdates holds the connection open for the poll duration, so
        // the client timeout has to exceed it.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 15))
            .build()
            .expect("reqwest client construction only fails on TLS backend misconfiguration");
        Self {
            client,
            base: format!("{API_BASE}/bot{token}"),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: serde_json::Value,
    ) -> Result<T, ApiError> {
        let url = format!("{}/{}", self.base, method);
        let response: ApiResponse<T> = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await?
            .json()
            .await?;

        match response {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse {
                description,
                error_code,
                ..
            } => Err(ApiError::Telegram {
                code: error_code.unwrap_or(0),
                description: description.unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }

    pub async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<Message, ApiError> {
        let mut payload = json!({
            "chat_id": chat,
            "text": text,
            "parse_mode": "Markdown",
        });
        if let Some(Keyboard(rows)) = keyboard {
            payload["reply_markup"] =
                serde_json::to_value(InlineKeyboardMarkup { inline_keyboard: rows })
                    .unwrap_or_default();
        }
        self.call("sendMessage", payload).await
    }

    pub async fn edit_message_text(
        &self,
        chat: ChatId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<Message, ApiError> {
        let mut payload = json!({
            "chat_id": chat,
            "message_id": message_id,
            "text": text,
            "parse_mode": "Markdown",
        });
        if let Some(Keyboard(rows)) = keyboard {
            payload["reply_markup"] =
                serde_json::to_value(InlineKeyboardMarkup { inline_keyboard: rows })
                    .unwrap_or_default();
        }
        self.call("editMessageText", payload).await
    }

    pub async fn answer_callback_query(
        &self,
        query_id: &str,
        alert: Option<&str>,
    ) -> Result<bool, ApiError> {
        let mut payload = json!({ "callback_query_id": query_id });
        if let Some(text) = alert {
            payload["text"] = json!(text);
            payload["show_alert"] = json!(true);
        }
        self.call("answerCallbackQuery", payload).await
    }

    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, ApiError> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": POLL_TIMEOUT_SECS,
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }

    pub async fn get_me(&self) -> Result<User, ApiError> {
        self.call("getMe", json!({})).await
    }

    pub async fn set_webhook(&self, url: &str) -> Result<bool, ApiError> {
        self.call("setWebhook", json!({ "url": url })).await
    }

    pub async fn delete_webhook(&self) -> Result<bool, ApiError> {
        self.call("deleteWebhook", json!({})).await
    }
}

// ---- Update -> event conversion ----

/// Convert a Bot API update into a routable event. `None` for update kinds
/// the bot does not consume (stickers, joins, callbacks without payload...).
pub fn incoming_from_update(update: Update) -> Option<Incoming> {
    if let Some(query) = update.callback_query {
        let message = query.message?;
        return Some(Incoming::Callback {
            payload: query.data?,
            query_id: query.id,
            chat: message.chat.id,
            message_id: message.message_id,
            from: query.from.sender(),
        });
    }

    let message = update.message?;
    let from = message.from.as_ref()?.sender();
    let text = message.text?;

    if let Some(stripped) = text.strip_prefix('/') {
        let mut parts = stripped.split_whitespace();
        let name = parts.next()?;
        // Commands in groups arrive as "/cmd@BotName".
        let name = name.split('@').next().unwrap_or(name).to_string();
        let args = parts.map(str::to_string).collect();
        return Some(Incoming::Command {
            name,
            args,
            chat: message.chat.id,
            from,
        });
    }

    Some(Incoming::Text {
        text,
        chat: message.chat.id,
        from,
    })
}

/// Perform a batch of effects against the Bot API. Failures are logged per
/// effect and never interrupt the batch: a dead edit must not swallow the
/// acknowledgement that follows it.
pub async fn perform(bot: &Bot, channel: ChatId, effects: Vec<Effect>) {
    for effect in effects {
        let result = match &effect {
            Effect::Reply { chat, text } => {
                bot.send_message(*chat, text, None).await.map(|_| ())
            }
            Effect::Broadcast { text, keyboard } => bot
                .send_message(channel, text, keyboard.as_ref())
                .await
                .map(|_| ()),
            Effect::EditMessage {
                chat,
                message_id,
                text,
                keyboard,
            } => bot
                .edit_message_text(*chat, *message_id, text, keyboard.as_ref())
                .await
                .map(|_| ()),
            Effect::AnswerCallback { query_id, alert } => bot
                .answer_callback_query(query_id, alert.as_deref())
                .await
                .map(|_| ()),
        };

        if let Err(e) = result {
            tracing::error!(error = %e, ?effect, "failed to perform effect");
        }
    }
}
