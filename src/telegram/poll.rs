//! Long-polling event loop (the default deployment mode).

use super::{incoming_from_update, perform, Bot};
use crate::handlers::handle_event;
use crate::state::AppState;
use crate::types::ChatId;
use std::sync::Arc;
use std::time::Duration;

/// How long to back off after a failed getUpdates call.
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Run the getUpdates loop forever. One update is fully handled (state
/// mutation and effects) before the next is looked at, which keeps the
/// event stream logically sequential.
pub async fn run_polling(bot: Bot, channel: ChatId, state: Arc<AppState>) {
    // A previously configured webhook blocks getUpdates.
    if let Err(e) = bot.delete_webhook().await {
        tracing::warn!(error = %e, "could not clear webhook before polling");
    }

    let mut offset = 0i64;
    loop {
        let updates = match bot.get_updates(offset).await {
            Ok(updates) => updates,
            Err(e) => {
                tracing::error!(error = %e, "getUpdates failed, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(event) = incoming_from_update(update) else {
                continue;
            };
            let effects = handle_event(event, &state).await;
            perform(&bot, channel, effects).await;
        }
    }
}
