//! Command handlers: build a service request, call out, reply in chunks.
//!
//! Every failure stays inside the message being handled. Service errors are
//! replied verbatim; quota exhaustion is additionally logged with the key label
//! so an operator knows which credential to rotate.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    chunker::chunk,
    config::Config,
    cost::format_cost,
    dispatch::{Command, HELP_TEXT},
    domain::{ConversationKey, MessageContext},
    errors::{classify_error, Error, ErrorClass},
    history::{ConversationHistory, HistoryRecord, Turn},
    image::image_file_name,
    model::types::{ChatMessage, ChatRequest, CompletionRequest, ImageRequest, ImageSize, Role},
    ports::{FileTransfer, GenerationClient, MessagingPort},
    Result,
};

/// How a handled command ended. Delivery failures are the `Err` side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Replied,
    /// Empty prompt; a usage hint was sent and the service was not called.
    UsageHint,
    /// Nothing to answer; no reply was sent.
    Ignored,
    /// The service or a transfer failed; the error text was sent as the reply.
    Failed(ErrorClass),
}

pub struct CommandHandlers {
    cfg: Arc<Config>,
    bot_name: String,
    client: Arc<dyn GenerationClient>,
    messenger: Arc<dyn MessagingPort>,
    history: Arc<ConversationHistory>,
    transfer: Arc<dyn FileTransfer>,
}

impl CommandHandlers {
    pub fn new(
        cfg: Arc<Config>,
        bot_name: impl Into<String>,
        client: Arc<dyn GenerationClient>,
        messenger: Arc<dyn MessagingPort>,
        history: Arc<ConversationHistory>,
        transfer: Arc<dyn FileTransfer>,
    ) -> Self {
        Self {
            cfg,
            bot_name: bot_name.into(),
            client,
            messenger,
            history,
            transfer,
        }
    }

    pub async fn handle(&self, ctx: &MessageContext, cmd: Command) -> Result<Outcome> {
        info!(
            command = cmd.kind(),
            chat_id = ctx.chat_id.0,
            user_id = ctx.user_id.0,
            user = %ctx.username,
            "handling command"
        );

        match cmd {
            Command::Completion { model, prompt } => self.completion(ctx, &model, &prompt).await,
            Command::Code { prompt } => self.code(ctx, &prompt).await,
            Command::Chat { prompt } => self.chat(ctx, &prompt).await,
            Command::AutoReply { message } => self.auto_reply(ctx, &message).await,
            Command::Image { size, prompt } => self.image(ctx, size, &prompt).await,
            Command::Help => {
                self.send_chunked(ctx, HELP_TEXT).await?;
                Ok(Outcome::Replied)
            }
        }
    }

    pub async fn completion(
        &self,
        ctx: &MessageContext,
        model: &str,
        prompt: &str,
    ) -> Result<Outcome> {
        if prompt.trim().is_empty() {
            return self.usage_hint(ctx, "ai").await;
        }
        self.run_completion(ctx, completion_request(&self.cfg, model, prompt))
            .await
    }

    pub async fn code(&self, ctx: &MessageContext, prompt: &str) -> Result<Outcome> {
        if prompt.trim().is_empty() {
            return self.usage_hint(ctx, "codex").await;
        }
        self.run_completion(ctx, code_request(&self.cfg, prompt)).await
    }

    async fn run_completion(
        &self,
        ctx: &MessageContext,
        req: CompletionRequest,
    ) -> Result<Outcome> {
        self.notify(ctx, &format!("Processing: {}", req.prompt))
            .await;

        let model = req.model.clone();
        match self.client.create_completion(req).await {
            Ok(completion) => {
                let cost =
                    format_cost(completion.usage.total_tokens, self.cfg.cost_per_1k(&model));
                self.send_chunked(ctx, &format!("{} (${cost})", completion.text.trim()))
                    .await?;
                Ok(Outcome::Replied)
            }
            Err(e) => self.report_failure(ctx, "completion", e).await,
        }
    }

    /// Persona reply to ordinary chatter. No acknowledgment, no history.
    pub async fn auto_reply(&self, ctx: &MessageContext, message: &str) -> Result<Outcome> {
        if message.trim().is_empty() {
            return Ok(Outcome::Ignored);
        }

        match self
            .client
            .create_chat_completion(persona_request(&self.cfg, message))
            .await
        {
            Ok(reply) => {
                for choice in &reply.choices {
                    self.notify(ctx, choice.trim()).await;
                }
                Ok(Outcome::Replied)
            }
            Err(e) => self.report_failure(ctx, "auto_reply", e).await,
        }
    }

    /// Multi-turn chat. Past turns for this participant are replayed as context
    /// and every returned choice is sent and folded back into history, in order.
    /// A failed send does not stop the remaining choices.
    pub async fn chat(&self, ctx: &MessageContext, prompt: &str) -> Result<Outcome> {
        if prompt.trim().is_empty() {
            return self.usage_hint(ctx, "chat").await;
        }

        let key = ConversationKey::for_context(self.bot_name.as_str(), ctx);
        let past = match self.history.load(&key).await {
            Ok(record) => record,
            Err(e) => {
                warn!(key = %key, error = %e, "history read failed; chatting without context");
                HistoryRecord::default()
            }
        };

        let reply = match self
            .client
            .create_chat_completion(chat_request(&self.cfg, &past, prompt))
            .await
        {
            Ok(reply) => reply,
            Err(e) => return self.report_failure(ctx, "chat", e).await,
        };

        for (i, choice) in reply.choices.iter().enumerate() {
            let text = choice.trim();
            self.notify(ctx, text).await;

            let mut turns = Vec::with_capacity(2);
            if i == 0 {
                turns.push(Turn::user(prompt));
            }
            turns.push(Turn::assistant(text));
            if let Err(e) = self.history.record(&key, turns).await {
                warn!(key = %key, error = %e, "history update skipped");
            }
        }

        Ok(Outcome::Replied)
    }

    /// Generate one image, move it to the public host, reply with the reference.
    pub async fn image(
        &self,
        ctx: &MessageContext,
        size: ImageSize,
        prompt: &str,
    ) -> Result<Outcome> {
        if prompt.trim().is_empty() {
            return self.usage_hint(ctx, "dale").await;
        }
        self.notify(ctx, &format!("Processing Dall-E: {prompt}"))
            .await;

        let generated = match self.client.create_image(image_request(prompt, size)).await {
            Ok(generated) => generated,
            Err(e) => return self.report_failure(ctx, "image", e).await,
        };

        let file_name = image_file_name(prompt, &mut rand::thread_rng());
        let path = self.cfg.image_dir.join(file_name);

        if let Err(e) = self.transfer.download(&generated.url, &path).await {
            return self.report_failure(ctx, "image", e).await;
        }
        match self.transfer.upload(&self.cfg.upload_url, &path).await {
            Ok(public_ref) => {
                self.send_chunked(ctx, &format!("{}: {}", ctx.username, public_ref.trim()))
                    .await?;
                Ok(Outcome::Replied)
            }
            Err(e) => self.report_failure(ctx, "image", e).await,
        }
    }

    async fn usage_hint(&self, ctx: &MessageContext, command: &str) -> Result<Outcome> {
        self.send_chunked(ctx, &format!("Usage: !{command} <prompt>"))
            .await?;
        Ok(Outcome::UsageHint)
    }

    async fn report_failure(
        &self,
        ctx: &MessageContext,
        handler: &str,
        err: Error,
    ) -> Result<Outcome> {
        let text = err.to_string();
        let class = classify_error(&text);
        match class {
            ErrorClass::Quota => warn!(
                handler,
                key = %self.cfg.openai_key_label,
                "generation quota exhausted for key"
            ),
            ErrorClass::Generic => warn!(handler, error = %text, "generation request failed"),
        }

        self.send_chunked(ctx, &text).await?;
        Ok(Outcome::Failed(class))
    }

    /// Best-effort send: a delivery failure is logged and the command goes on.
    async fn notify(&self, ctx: &MessageContext, text: &str) {
        if let Err(e) = self.send_chunked(ctx, text).await {
            warn!(chat_id = ctx.chat_id.0, error = %e, "message delivery failed");
        }
    }

    /// One send per fragment, each awaited before the next.
    async fn send_chunked(&self, ctx: &MessageContext, text: &str) -> Result<()> {
        let limit = self
            .messenger
            .capabilities()
            .max_message_len
            .min(self.cfg.message_limit);
        for line in chunk(text, limit) {
            self.messenger.send_text(ctx.chat_id, &line).await?;
        }
        Ok(())
    }
}

pub fn completion_request(cfg: &Config, model: &str, prompt: &str) -> CompletionRequest {
    CompletionRequest {
        model: model.to_string(),
        prompt: prompt.to_string(),
        max_tokens: cfg.tokens,
        temperature: cfg.temperature,
        top_p: None,
        frequency_penalty: None,
        presence_penalty: None,
    }
}

/// Code model requests are always deterministic, whatever the configured temperature.
pub fn code_request(cfg: &Config, prompt: &str) -> CompletionRequest {
    CompletionRequest {
        model: cfg.code_model.clone(),
        prompt: prompt.to_string(),
        max_tokens: cfg.tokens,
        temperature: 0.0,
        top_p: Some(1.0),
        frequency_penalty: Some(0.0),
        presence_penalty: Some(0.0),
    }
}

pub fn persona_prompt(persona: &str, message: &str) -> String {
    let article = match persona.trim().chars().next() {
        Some(c) if "aeiou".contains(c.to_ascii_lowercase()) => "an",
        _ => "a",
    };
    format!(
        "As {article} {} reply to the following chat: {message}.",
        persona.trim()
    )
}

pub fn persona_request(cfg: &Config, message: &str) -> ChatRequest {
    ChatRequest {
        model: cfg.chat_model.clone(),
        messages: vec![ChatMessage {
            role: Role::User,
            content: persona_prompt(&cfg.chat_personality, message),
        }],
        max_tokens: cfg.tokens,
        temperature: cfg.temperature,
    }
}

/// Stored turns oldest first, then the new user message.
pub fn chat_request(cfg: &Config, past: &HistoryRecord, prompt: &str) -> ChatRequest {
    let mut messages: Vec<ChatMessage> = past.chronological().map(Turn::to_message).collect();
    messages.push(ChatMessage {
        role: Role::User,
        content: prompt.to_string(),
    });

    ChatRequest {
        model: cfg.chat_model.clone(),
        messages,
        max_tokens: cfg.tokens,
        temperature: cfg.temperature,
    }
}

pub fn image_request(prompt: &str, size: ImageSize) -> ImageRequest {
    ImageRequest {
        prompt: prompt.to_string(),
        size,
        n: 1,
    }
}
