//! Filter-and-migrate of finished films to the archive table.

use super::{RowStore, StoreResult, Table};
use std::collections::HashSet;

/// Move every row whose film is in `titles` from the active table to the
/// archive, then rewrite the active table with only the kept rows.
///
/// Two phases: archive appends first, bulk rewrite second. A crash between
/// the phases leaves the moved rows present in both tables (duplicated, not
/// lost); replaying the operation moves them again and the rewrite then
/// removes them from the active table, so replay converges. Returns the
/// number of moved rows.
pub async fn archive_films(store: &dyn RowStore, titles: &HashSet<String>) -> StoreResult<usize> {
    let rows = store.read_all(Table::Votes).await?;
    let (moved, kept): (Vec<_>, Vec<_>) = rows.into_iter().partition(|r| titles.contains(&r.film));

    for row in &moved {
        store.append(Table::Archive, row.clone()).await?;
    }
    store.replace_all(Table::Votes, kept).await?;

    Ok(moved.len())
}
