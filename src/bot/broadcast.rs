//! Sequential best-effort delivery to every registered chat.

use std::time::Duration;

use tracing::{info, warn};

use crate::bot::messenger::Messenger;
use crate::bot::store::{IdentityStore, StoreError};

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

impl BroadcastReport {
    pub fn total(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Send `text` to every stored chat, one at a time.
///
/// A failed or timed-out delivery is logged and counted; the remaining chats
/// still get the message.
pub async fn broadcast(
    store: &IdentityStore,
    messenger: &dyn Messenger,
    text: &str,
    timeout: Duration,
) -> Result<BroadcastReport, StoreError> {
    let chat_ids = store.list_identities()?;
    info!("📣 Broadcasting to {} chats", chat_ids.len());

    let mut report = BroadcastReport::default();
    for chat_id in chat_ids {
        match tokio::time::timeout(timeout, messenger.send_text(chat_id, text)).await {
            Ok(Ok(())) => report.delivered += 1,
            Ok(Err(e)) => {
                warn!("Broadcast to {} failed: {}", chat_id, e);
                report.failed += 1;
            }
            Err(_) => {
                warn!("Broadcast to {} timed out after {:?}", chat_id, timeout);
                report.failed += 1;
            }
        }
    }

    info!("📣 Broadcast done: {} delivered, {} failed", report.delivered, report.failed);
    Ok(report)
}
