//! Runs conversation actions against the store, the price source and the messenger.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::bot::broadcast::{BroadcastReport, broadcast};
use crate::bot::conversation::{Action, ConversationState, Conversations, Event};
use crate::bot::market::PriceSource;
use crate::bot::messenger::{Messenger, currency_keyboard};
use crate::bot::store::IdentityStore;

pub const CHOOSE_CURRENCY: &str = "Choose a currency:";
pub const ACCESS_DENIED: &str = "You do not have access to this command.";
pub const ENTER_BROADCAST_TEXT: &str = "Enter the message text to send:";
pub const BROADCAST_STORE_FAILED: &str = "Could not read the user list, nothing was sent.";

pub fn rate_reply(symbol: &str, snapshot: &str) -> String {
    format!("Rate for {symbol}:\n{snapshot}")
}

pub fn rate_failed_reply(symbol: &str) -> String {
    format!("Could not fetch rate for {symbol}")
}

pub fn rate_not_found_reply(symbol: &str) -> String {
    format!("No rate found for {symbol}")
}

pub fn broadcast_reply(text: &str, report: BroadcastReport) -> String {
    let mut reply = format!(
        "Message '{}' was sent to {} of {} users.",
        text,
        report.delivered,
        report.total()
    );
    if report.failed > 0 {
        reply.push_str(&format!(" Failed: {}.", report.failed));
    }
    reply
}

/// Handles decoded user events one at a time.
pub struct Controller {
    admin_id: i64,
    delivery_timeout: Duration,
    store: Arc<IdentityStore>,
    prices: Arc<dyn PriceSource>,
    messenger: Arc<dyn Messenger>,
    conversations: Mutex<Conversations>,
}

impl Controller {
    pub fn new(
        admin_id: i64,
        delivery_timeout: Duration,
        store: Arc<IdentityStore>,
        prices: Arc<dyn PriceSource>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            admin_id,
            delivery_timeout,
            store,
            prices,
            messenger,
            conversations: Mutex::new(Conversations::new()),
        }
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        user_id == self.admin_id
    }

    pub async fn state_of(&self, identity: i64) -> ConversationState {
        self.conversations.lock().await.state(identity)
    }

    /// Process one event from `sender_id` in chat `chat_id`.
    pub async fn handle(&self, chat_id: i64, sender_id: i64, event: Event) {
        let actions = {
            let mut conversations = self.conversations.lock().await;
            conversations.advance(sender_id, event, self.is_admin(sender_id))
        };

        for action in actions {
            self.run(chat_id, sender_id, action).await;
        }
    }

    async fn run(&self, chat_id: i64, sender_id: i64, action: Action) {
        match action {
            Action::RegisterIdentity => {
                if let Err(e) = self.store.add_identity(chat_id) {
                    error!("Failed to register chat {}: {}", chat_id, e);
                }
            }
            Action::ShowCurrencies => {
                let keyboard = currency_keyboard();
                if let Err(e) = self.messenger.send_keyboard(chat_id, CHOOSE_CURRENCY, &keyboard).await {
                    warn!("Failed to send keyboard to {}: {}", chat_id, e);
                }
            }
            Action::LookupPrice(symbol) => {
                let reply = match self.prices.price(&symbol).await {
                    Ok(snapshot) => rate_reply(&symbol, &snapshot.to_string()),
                    Err(e) if e.is_not_found() => {
                        warn!("Rate lookup for {}: {}", symbol, e);
                        rate_not_found_reply(&symbol)
                    }
                    Err(e) => {
                        error!("Rate lookup for {} failed: {}", symbol, e);
                        rate_failed_reply(&symbol)
                    }
                };
                self.reply(chat_id, &reply).await;
            }
            Action::PromptBroadcastText => {
                info!("Admin {} started a broadcast", sender_id);
                self.reply(chat_id, ENTER_BROADCAST_TEXT).await;
            }
            Action::DenyAccess => {
                info!("Denied /send for user {}", sender_id);
                self.reply(chat_id, ACCESS_DENIED).await;
            }
            Action::Broadcast(text) => {
                let reply = match broadcast(&self.store, self.messenger.as_ref(), &text, self.delivery_timeout).await {
                    Ok(report) => broadcast_reply(&text, report),
                    Err(e) => {
                        error!("Broadcast aborted: {}", e);
                        BROADCAST_STORE_FAILED.to_string()
                    }
                };
                self.reply(chat_id, &reply).await;
            }
        }
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.messenger.send_text(chat_id, text).await {
            warn!("Failed to reply to {}: {}", chat_id, e);
        }
    }
}
