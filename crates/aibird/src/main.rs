use std::sync::Arc;

use aibird_openai::OpenAiClient;

use aibird_core::{
    config::{Config, HistoryBackend},
    history::{
        store::{FileStore, KvStore, MemoryStore},
        ConversationHistory,
    },
    transfer::HttpFileTransfer,
};

#[tokio::main]
async fn main() -> Result<(), aibird_core::Error> {
    aibird_core::logging::init("aibird")?;

    let cfg = Arc::new(Config::load()?);

    let store: Arc<dyn KvStore> = match cfg.history_backend {
        HistoryBackend::File => Arc::new(FileStore::new(cfg.history_dir.clone())),
        HistoryBackend::Memory => Arc::new(MemoryStore::new()),
    };
    let history = Arc::new(ConversationHistory::new(store, cfg.chat_gpt_total_messages));

    let client = Arc::new(OpenAiClient::new(
        cfg.openai_api_key.clone(),
        cfg.openai_base_url.clone(),
        cfg.openai_timeout,
    )?);
    let transfer = Arc::new(HttpFileTransfer::new(cfg.openai_timeout)?);

    aibird_telegram::router::run_polling(cfg, client, history, transfer)
        .await
        .map_err(|e| aibird_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
