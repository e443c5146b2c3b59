use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::{info, warn};

use aibird_core::{
    config::Config,
    dispatch::Router,
    handlers::CommandHandlers,
    history::ConversationHistory,
    messaging::throttled::{ThrottleConfig, ThrottledMessenger},
    ports::{FileTransfer, GenerationClient, MessagingPort},
};

use crate::handlers;
use crate::TelegramMessenger;

/// Used when neither `BOT_NAME` nor the Telegram username is available.
const FALLBACK_BOT_NAME: &str = "aibird";

#[derive(Clone)]
pub struct AppState {
    pub router: Router,
    pub handlers: Arc<CommandHandlers>,
}

pub async fn run_polling(
    cfg: Arc<Config>,
    client: Arc<dyn GenerationClient>,
    history: Arc<ConversationHistory>,
    transfer: Arc<dyn FileTransfer>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    let telegram_name = match bot.get_me().await {
        Ok(me) => Some(me.username().to_string()),
        Err(e) => {
            warn!(error = %e, "get_me failed");
            None
        }
    };
    let bot_name = resolve_bot_name(cfg.bot_name.as_deref(), telegram_name.as_deref());
    info!(
        bot = %bot_name,
        completion_model = %cfg.completion_model,
        chat_model = %cfg.chat_model,
        history_backend = ?cfg.history_backend,
        "aibird started"
    );

    // Long replies go out as bursts of fragments; throttle them below Telegram's
    // flood limits. RetryAfter is still retried in the adapter.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let state = Arc::new(AppState {
        router: Router::new(&cfg, bot_name.clone()),
        handlers: Arc::new(CommandHandlers::new(
            cfg.clone(),
            bot_name,
            client,
            messenger,
            history,
            transfer,
        )),
    });

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn resolve_bot_name(configured: Option<&str>, telegram: Option<&str>) -> String {
    configured
        .or(telegram)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(FALLBACK_BOT_NAME)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_name_wins_over_telegram_username() {
        assert_eq!(resolve_bot_name(Some("birdy"), Some("aibird_bot")), "birdy");
        assert_eq!(resolve_bot_name(None, Some("aibird_bot")), "aibird_bot");
        assert_eq!(resolve_bot_name(None, None), FALLBACK_BOT_NAME);
    }
}
