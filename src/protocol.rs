//! Transport-independent event protocol.
//!
//! Inbound Telegram traffic is converted into [`Incoming`] events at the
//! transport boundary; the handlers answer with a list of [`Effect`]s that
//! the transport then performs. The core never talks to the Bot API itself,
//! which keeps the whole contest logic unit-testable without a live chat.

use crate::types::{ChatId, MessageId, VoterId, SCORE_MAX, SCORE_MIN};
use serde::{Deserialize, Serialize};

/// Who sent an inbound event.
#[derive(Debug, Clone, PartialEq)]
pub struct Sender {
    pub id: VoterId,
    /// Telegram @username, absent for many accounts
    pub username: Option<String>,
    /// Full display name, always present
    pub display_name: String,
}

impl Sender {
    /// "@username" when available, otherwise the display name.
    pub fn mention(&self) -> String {
        match &self.username {
            Some(u) => format!("@{u}"),
            None => self.display_name.clone(),
        }
    }
}

/// An inbound event, already routed by kind.
#[derive(Debug, Clone)]
pub enum Incoming {
    /// A `/command`, with its arguments split on whitespace
    Command {
        name: String,
        args: Vec<String>,
        chat: ChatId,
        from: Sender,
    },
    /// An inline-button press carrying its opaque payload
    Callback {
        payload: String,
        query_id: String,
        chat: ChatId,
        message_id: MessageId,
        from: Sender,
    },
    /// Any non-command text message
    Text {
        text: String,
        chat: ChatId,
        from: Sender,
    },
}

/// Validated inline-button action.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackAction {
    Rate { title: String, score: u8 },
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PayloadError {
    #[error("payload is not made of exactly 3 `|`-separated parts: {0:?}")]
    Shape(String),
    #[error("unknown payload tag: {0:?}")]
    UnknownTag(String),
    #[error("score is not a number in 1..=5: {0:?}")]
    BadScore(String),
}

impl CallbackAction {
    /// Parse an opaque button payload of shape `rate|<title>|<score>`.
    pub fn parse(payload: &str) -> Result<Self, PayloadError> {
        let parts: Vec<&str> = payload.split('|').collect();
        let [tag, title, score]: [&str; 3] = parts
            .try_into()
            .map_err(|_| PayloadError::Shape(payload.to_string()))?;
        if tag != "rate" {
            return Err(PayloadError::UnknownTag(tag.to_string()));
        }
        let score: u8 = score
            .parse()
            .map_err(|_| PayloadError::BadScore(score.to_string()))?;
        if !(SCORE_MIN..=SCORE_MAX).contains(&score) {
            return Err(PayloadError::BadScore(score.to_string()));
        }
        Ok(Self::Rate {
            title: title.to_string(),
            score,
        })
    }
}

/// Build the opaque payload for a rating button.
pub fn rate_payload(title: &str, score: u8) -> String {
    format!("rate|{title}|{score}")
}

/// A single inline button: either a callback payload or an external link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Button {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Button {
    pub fn callback(text: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: Some(payload.into()),
            url: None,
        }
    }

    pub fn link(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: None,
            url: Some(url.into()),
        }
    }
}

/// Rows of inline buttons.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Keyboard(pub Vec<Vec<Button>>);

/// The fixed five-star rating row for a film post.
pub fn rating_keyboard(title: &str) -> Keyboard {
    Keyboard(vec![(SCORE_MIN..=SCORE_MAX)
        .map(|score| Button::callback(format!("⭐{score}"), rate_payload(title, score)))
        .collect()])
}

/// The "answer privately" link shown on contest launch.
pub fn reply_keyboard(bot_username: &str) -> Keyboard {
    Keyboard(vec![vec![Button::link(
        "💬 Répondre au bot",
        format!("https://t.me/{bot_username}"),
    )]])
}

/// An outbound side effect to perform against the chat platform.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Message to the chat the event came from
    Reply { chat: ChatId, text: String },
    /// Message to the configured channel; the core never sees the channel id
    Broadcast {
        text: String,
        keyboard: Option<Keyboard>,
    },
    /// Rewrite a previously posted message (vote tallies on the film post)
    EditMessage {
        chat: ChatId,
        message_id: MessageId,
        text: String,
        keyboard: Option<Keyboard>,
    },
    /// Acknowledge a button press, optionally with an alert popup
    AnswerCallback {
        query_id: String,
        alert: Option<String>,
    },
}
