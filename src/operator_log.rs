//! Forwards this crate's WARN/ERROR events to an operator chat.

use teloxide::prelude::*;
use teloxide::types::ChatId;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// Telegram rejects messages longer than this.
const MAX_MESSAGE_CHARS: usize = 4000;

pub struct OperatorLogLayer {
    tx: mpsc::UnboundedSender<String>,
}

impl OperatorLogLayer {
    /// Must be called from inside the tokio runtime.
    pub fn new(bot: Bot, chat_id: i64) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let chat_id = ChatId(chat_id);

        tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                // Going through tracing here would feed the layer its own failures.
                if let Err(e) = bot.send_message(chat_id, truncate(&text)).await {
                    eprintln!("Failed to forward log line to operator chat: {e}");
                }
            }
        });

        Self { tx }
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() > MAX_MESSAGE_CHARS {
        let head: String = text.chars().take(MAX_MESSAGE_CHARS).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

/// Only our own events; library warnings stay in the local logs.
fn forwards(level: Level, target: &str) -> bool {
    level <= Level::WARN && target.starts_with(env!("CARGO_CRATE_NAME"))
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else if self.message.is_empty() {
            self.message = format!("{} = {:?}", field.name(), value);
        } else {
            self.message
                .push_str(&format!(", {} = {:?}", field.name(), value));
        }
    }
}

impl<S: Subscriber> Layer<S> for OperatorLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = *metadata.level();
        if !forwards(level, metadata.target()) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let prefix = if level == Level::ERROR { "❌" } else { "⚠️" };
        if self.tx.send(format!("{prefix} {}", visitor.message)).is_err() {
            eprintln!("Log channel closed, message dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_own_warnings_and_errors_are_forwarded() {
        assert!(forwards(Level::ERROR, "ratebot::bot::controller"));
        assert!(forwards(Level::WARN, "ratebot"));
        assert!(!forwards(Level::INFO, "ratebot::bot::store"));
        assert!(!forwards(Level::WARN, "teloxide::dispatching"));
        assert!(!forwards(Level::ERROR, "hyper_util::client"));
    }

    #[test]
    fn test_truncate_long_messages() {
        let long = "é".repeat(MAX_MESSAGE_CHARS + 10);
        let short = truncate(&long);
        assert_eq!(short.chars().count(), MAX_MESSAGE_CHARS + 3);
        assert!(short.ends_with("..."));
        assert_eq!(truncate("fine"), "fine");
    }
}
