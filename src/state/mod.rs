mod contest;
mod ledger;
mod ranking;

pub use contest::{AnswerOutcome, ChoiceOutcome, PromptOutcome, SelectionError};
pub use ledger::{Ledger, LedgerError};
pub use ranking::top_films;

use crate::storage::RowStore;
use crate::types::Contest;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<RwLock<Ledger>>,
    pub contest: Arc<RwLock<Contest>>,
    /// Durable vote store (Google Sheets in production)
    pub store: Arc<dyn RowStore>,
    /// Bot username for the "answer privately" deep link, when known
    pub bot_username: Option<String>,
}

impl AppState {
    pub fn new(store: Arc<dyn RowStore>, bot_username: Option<String>) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(Ledger::new())),
            contest: Arc::new(RwLock::new(Contest::new())),
            store,
            bot_username,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::storage::memory::MemoryStore;

    /// State over a fresh in-memory store, with the store handle kept
    /// concrete so tests can inspect and fail it.
    pub fn state_with_store() -> (AppState, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), Some("CineQuizBot".to_string()));
        (state, store)
    }
}
