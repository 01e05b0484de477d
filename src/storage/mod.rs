//! Durable vote storage.
//!
//! The spreadsheet is an audit trail, not the source of truth: the ledger in
//! memory decides votes and means, and every recorded vote is echoed here
//! best-effort. Two tables share one schema — the active `Notes` sheet and
//! the cold `Archives` sheet films are moved to after their contest cycle.

pub mod archive;
pub mod memory;
pub mod sheets;

use crate::types::VoterId;
use async_trait::async_trait;
use chrono::Local;

/// Column header, identical for both tables.
pub const HEADER: [&str; 5] = ["Date", "Film", "Note", "Utilisateur", "ID_Telegram"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Votes,
    Archive,
}

/// One spreadsheet row: a vote plus the film title and a server timestamp
/// taken at voting time.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    pub date: String,
    pub film: String,
    pub note: u8,
    pub user: String,
    pub telegram_id: VoterId,
}

impl SheetRow {
    /// Row for a vote happening now.
    pub fn for_vote(film: &str, note: u8, user: &str, telegram_id: VoterId) -> Self {
        Self {
            date: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            film: film.to_string(),
            note,
            user: user.to_string(),
            telegram_id,
        }
    }

    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.date.clone(),
            self.film.clone(),
            self.note.to_string(),
            self.user.clone(),
            self.telegram_id.to_string(),
        ]
    }

    /// Parse a row of raw cell values. The Sheets API hands numbers back as
    /// JSON numbers or strings depending on cell formatting, so both are
    /// accepted. `None` for rows that do not fit the schema.
    pub fn from_values(cells: &[serde_json::Value]) -> Option<Self> {
        if cells.len() < 5 {
            return None;
        }
        Some(Self {
            date: cell_string(&cells[0]),
            film: cell_string(&cells[1]),
            note: cell_number(&cells[2])? as u8,
            user: cell_string(&cells[3]),
            telegram_id: cell_number(&cells[4])?,
        })
    }
}

fn cell_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn cell_number(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("google auth failed: {0}")]
    Auth(String),
    #[error("sheets api returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("malformed sheet data: {0}")]
    Malformed(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Abstract row store over the two tables. Production talks to Google
/// Sheets; tests and credential-less local runs use the in-memory store.
#[async_trait]
pub trait RowStore: Send + Sync {
    async fn append(&self, table: Table, row: SheetRow) -> StoreResult<()>;
    /// All data rows of a table, header excluded.
    async fn read_all(&self, table: Table) -> StoreResult<Vec<SheetRow>>;
    /// Rewrite a table to exactly header + `rows`.
    async fn replace_all(&self, table: Table, rows: Vec<SheetRow>) -> StoreResult<()>;
}
