//! Outbound messaging port and keyboard layout.

use async_trait::async_trait;

/// Inline button: visible label plus the payload sent back on press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub payload: String,
}

/// Rows of inline buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

/// One layout serves both `/start` and the menu label, so every reachable
/// payload is one of these nine tickers.
const CURRENCY_ROWS: [[&str; 3]; 3] = [
    ["BTC", "BNB", "ETH"],
    ["USDT", "LTC", "TRX"],
    ["ADA", "DOGE", "SOL"],
];

/// The fixed 3x3 currency picker. Payloads are the lowercase tickers.
pub fn currency_keyboard() -> Keyboard {
    let rows = CURRENCY_ROWS
        .iter()
        .map(|row| {
            row.iter()
                .map(|label| Button {
                    label: label.to_string(),
                    payload: label.to_lowercase(),
                })
                .collect()
        })
        .collect();
    Keyboard { rows }
}

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), String>;

    async fn send_keyboard(&self, chat_id: i64, text: &str, keyboard: &Keyboard) -> Result<(), String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_keyboard_is_3x3_with_lowercase_payloads() {
        let keyboard = currency_keyboard();
        assert_eq!(keyboard.rows.len(), 3);
        assert!(keyboard.rows.iter().all(|row| row.len() == 3));

        let first = &keyboard.rows[0][0];
        assert_eq!(first.label, "BTC");
        assert_eq!(first.payload, "btc");
        assert_eq!(keyboard.rows[2][1].payload, "doge");
    }
}
