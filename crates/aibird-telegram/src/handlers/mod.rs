//! Telegram update handlers.
//!
//! Text messages are routed to a command and handled on their own task, so a
//! slow generation call never holds up the update loop.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};
use tracing::{debug, warn};

use aibird_core::{
    domain::{ChatId, UserId},
    messaging::types::IncomingText,
};

use crate::router::AppState;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(incoming) = incoming_text(&msg) else {
        return Ok(());
    };

    let Some(cmd) = state.router.route(&incoming.text) else {
        return Ok(());
    };

    let ctx = incoming.context();
    debug!(command = cmd.kind(), chat_id = ctx.chat_id.0, "routed");

    let handlers = state.handlers.clone();
    tokio::spawn(async move {
        if let Err(e) = handlers.handle(&ctx, cmd).await {
            warn!(chat_id = ctx.chat_id.0, error = %e, "reply delivery failed");
        }
    });

    Ok(())
}

/// Text from a human sender; other bots and non-text updates are skipped.
fn incoming_text(msg: &Message) -> Option<IncomingText> {
    let user = msg.from()?;
    if user.is_bot {
        return None;
    }
    let text = msg.text()?;

    Some(IncomingText {
        chat_id: ChatId(msg.chat.id.0),
        user_id: UserId(user.id.0 as i64),
        username: user.username.clone(),
        text: text.to_string(),
    })
}
