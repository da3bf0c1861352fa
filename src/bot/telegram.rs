//! Telegram client using teloxide.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::warn;

use crate::bot::messenger::{Keyboard, Messenger};

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<InlineKeyboardMarkup>,
    ) -> Result<i64, String> {
        let mut request = self.bot.send_message(ChatId(chat_id), text);
        if let Some(markup) = markup {
            request = request.reply_markup(markup);
        }

        request.await.map(|msg| msg.id.0 as i64).map_err(|e| {
            let msg = format!("Failed to send to {chat_id}: {e}");
            warn!("{}", msg);
            msg
        })
    }
}

/// Convert the transport-neutral keyboard into Telegram inline markup.
pub fn inline_markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = keyboard
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.payload.clone()))
                .collect()
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), String> {
        self.send_message(chat_id, text, None).await.map(|_| ())
    }

    async fn send_keyboard(&self, chat_id: i64, text: &str, keyboard: &Keyboard) -> Result<(), String> {
        self.send_message(chat_id, text, Some(inline_markup(keyboard)))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::messenger::currency_keyboard;
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn test_inline_markup_keeps_layout_and_payloads() {
        let markup = inline_markup(&currency_keyboard());
        assert_eq!(markup.inline_keyboard.len(), 3);

        let button = &markup.inline_keyboard[1][0];
        assert_eq!(button.text, "USDT");
        assert!(matches!(&button.kind, InlineKeyboardButtonKind::CallbackData(data) if data == "usdt"));
    }
}
