use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;

use ratebot::bot::{App, Event, TelegramClient};
use ratebot::config::Config;
use ratebot::operator_log::OperatorLogLayer;

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Commands:")]
enum Command {
    #[command(description = "show the currency keyboard")]
    Start,
    #[command(description = "send a message to every user (admin only)")]
    Send,
}

struct BotState {
    app: App,
    bot_username: String,
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ratebot.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.telegram_bot_token);
    let _guard = init_logging(&config, &bot);

    info!("🚀 Starting ratebot...");
    info!("Loaded config from {config_path}");
    info!("Admin ID: {}", config.admin_id);

    let telegram = Arc::new(TelegramClient::new(bot.clone()));
    let app = match App::open(&config, telegram) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to open identity store {:?}: {e}", config.database_path);
            return;
        }
    };

    let bot_username = match bot.get_me().await {
        Ok(me) => {
            info!("Bot user ID: {}, username: @{}", me.id, me.username());
            me.username().to_string()
        }
        Err(e) => {
            warn!("Failed to get bot info: {e}");
            String::new()
        }
    };
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register bot commands: {e}");
    }

    let state = Arc::new(BotState { app, bot_username });

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state.clone()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    state.app.shutdown().await;
}

fn init_logging(config: &Config, bot: &Bot) -> Option<WorkerGuard> {
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("ratebot.log"));

    let (file_layer, guard) = match log_file {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                );
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!("Failed to open log file in {}: {e}", log_dir.display());
            (None, None)
        }
    };

    let operator_layer = config
        .log_chat_id
        .map(|chat_id| OperatorLogLayer::new(bot.clone(), chat_id));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(file_layer)
        .with(operator_layer)
        .init();

    guard
}

async fn handle_message(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(ref user) = msg.from else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let event = match Command::parse(text, &state.bot_username) {
        Ok(Command::Start) => Event::Start,
        Ok(Command::Send) => Event::BroadcastCommand,
        Err(_) => Event::from_text(text),
    };

    let sender_id = user.id.0 as i64;
    info!("📨 {} from {} in chat {}", event_name(&event), sender_id, msg.chat.id);
    state.app.controller().handle(msg.chat.id.0, sender_id, event).await;
    Ok(())
}

async fn handle_callback(bot: Bot, q: CallbackQuery, state: Arc<BotState>) -> ResponseResult<()> {
    let chat_id = q.message.as_ref().map(|m| m.chat().id);
    let payload = q.data.clone().unwrap_or_default();

    // Answer first so the client stops showing the spinner.
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!("Failed to answer callback query: {e}");
    }

    let Some(chat_id) = chat_id else {
        return Ok(());
    };
    if payload.is_empty() {
        return Ok(());
    }

    let sender_id = q.from.id.0 as i64;
    info!("🔘 Button {} from {} in chat {}", payload, sender_id, chat_id);
    state
        .app
        .controller()
        .handle(chat_id.0, sender_id, Event::CurrencyPressed(payload))
        .await;
    Ok(())
}

/// Event kind for logs; broadcast text stays out of the log line.
fn event_name(event: &Event) -> &'static str {
    match event {
        Event::Start => "start",
        Event::MenuLabel => "menu",
        Event::CurrencyPressed(_) => "button",
        Event::BroadcastCommand => "send",
        Event::Text(_) => "text",
    }
}
