//! In-memory [`RowStore`] used by the test suite and by local runs without
//! Google credentials.

use super::{RowStore, SheetRow, StoreError, StoreResult, Table};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<Table, Vec<SheetRow>>>,
    /// When set, every operation fails. Lets tests exercise the degraded
    /// paths (vote stands without its audit row, archival failure).
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store marked failing".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn append(&self, table: Table, row: SheetRow) -> StoreResult<()> {
        self.check()?;
        self.tables.lock().await.entry(table).or_default().push(row);
        Ok(())
    }

    async fn read_all(&self, table: Table) -> StoreResult<Vec<SheetRow>> {
        self.check()?;
        Ok(self.tables.lock().await.get(&table).cloned().unwrap_or_default())
    }

    async fn replace_all(&self, table: Table, rows: Vec<SheetRow>) -> StoreResult<()> {
        self.check()?;
        self.tables.lock().await.insert(table, rows);
        Ok(())
    }
}
