//! Currency-rate bot: identity registry, price lookups and admin broadcast.

pub mod broadcast;
pub mod controller;
pub mod conversation;
pub mod extract;
pub mod market;
pub mod messenger;
pub mod store;
pub mod telegram;


use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::Config;

pub use controller::Controller;
pub use conversation::{Event, MENU_LABEL};
pub use market::MarketPrices;
pub use messenger::Messenger;
pub use store::{IdentityStore, StoreError};
pub use telegram::TelegramClient;

/// Long-lived resources of the running bot.
///
/// Opening connects the store and ensures the schema; `shutdown` closes the
/// HTTP client first and the store second.
pub struct App {
    store: Arc<IdentityStore>,
    prices: Arc<MarketPrices>,
    controller: Controller,
}

impl App {
    pub fn open(config: &Config, messenger: Arc<dyn Messenger>) -> Result<Self, StoreError> {
        let store = Arc::new(IdentityStore::new(config.database_path.clone()));
        store.connect()?;
        if let Err(e) = store.create_table() {
            store.disconnect().ok();
            return Err(e);
        }
        match store.count() {
            Ok(n) => info!("Identity store ready ({} chats)", n),
            Err(e) => warn!("Could not count registered chats: {}", e),
        }

        let prices = Arc::new(MarketPrices::new(config.market_url.clone(), config.request_timeout));
        let controller = Controller::new(
            config.admin_id,
            config.request_timeout,
            store.clone(),
            prices.clone(),
            messenger,
        );

        Ok(Self { store, prices, controller })
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub async fn shutdown(&self) {
        self.prices.close().await;
        if let Err(e) = self.store.disconnect() {
            error!("Failed to close identity store: {}", e);
        }
        info!("Shutdown complete");
    }
}
