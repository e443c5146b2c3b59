use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    errors::Error,
    model::types::{
        CODE_DAVINCI_002, GPT_3_5_TURBO, TEXT_ADA_001, TEXT_BABBAGE_001, TEXT_CURIE_001,
        TEXT_DAVINCI_001, TEXT_DAVINCI_002, TEXT_DAVINCI_003,
    },
    Result,
};

/// Where conversation history is kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryBackend {
    /// One file per conversation under `history_dir`; survives restarts.
    File,
    /// Process memory only.
    Memory,
}

/// Typed configuration for the bot.
///
/// Read once at startup and shared read-only (`Arc<Config>`) by every handler.
#[derive(Clone, Debug)]
pub struct Config {
    // Chat transport
    pub telegram_bot_token: String,
    pub bot_name: Option<String>,
    pub message_limit: usize,

    // Generation service
    pub openai_api_key: String,
    pub openai_key_label: String,
    pub openai_base_url: String,
    pub openai_timeout: Duration,
    pub tokens: u32,
    pub temperature: f32,
    pub completion_model: String,
    pub code_model: String,
    pub chat_model: String,
    pub model_costs: HashMap<String, f64>,

    // Persona / multi-turn chat
    pub chat_personality: String,
    pub chat_gpt_total_messages: usize,
    pub auto_reply_on_mention: bool,
    pub auto_reply_chance: u8,

    // Storage
    pub history_backend: HistoryBackend,
    pub history_dir: PathBuf,
    pub image_dir: PathBuf,
    pub upload_url: String,
}

impl Config {
    /// Load from the process environment (after merging an optional `.env`) and
    /// make sure the on-disk directories exist.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let cfg = Self::from_lookup(|key| env::var(key).ok())?;

        fs::create_dir_all(&cfg.image_dir)?;
        if cfg.history_backend == HistoryBackend::File {
            fs::create_dir_all(&cfg.history_dir)?;
        }

        Ok(cfg)
    }

    /// Build a config from an arbitrary variable lookup. No side effects.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| get(key).and_then(non_empty);

        // Required
        let telegram_bot_token = var("TELEGRAM_BOT_TOKEN").ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;
        let openai_api_key = var("OPENAI_API_KEY").ok_or_else(|| {
            Error::Config("OPENAI_API_KEY environment variable is required".to_string())
        })?;

        let openai_key_label = var("OPENAI_KEY_NAME").unwrap_or_else(|| mask_key(&openai_api_key));
        let openai_base_url = var("OPENAI_BASE_URL")
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
            .trim_end_matches('/')
            .to_string();
        let openai_timeout = Duration::from_secs(parse_or(&var, "OPENAI_TIMEOUT_SECS", 120)?);

        let tokens = parse_or(&var, "OPENAI_TOKENS", 512u32)?;
        let temperature = parse_or(&var, "OPENAI_TEMPERATURE", 0.8f32)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(Error::Config(format!(
                "OPENAI_TEMPERATURE must be between 0 and 2, got {temperature}"
            )));
        }

        let completion_model =
            var("COMPLETION_MODEL").unwrap_or_else(|| TEXT_DAVINCI_003.to_string());
        let code_model = var("CODE_MODEL").unwrap_or_else(|| CODE_DAVINCI_002.to_string());
        let chat_model = var("CHAT_MODEL").unwrap_or_else(|| GPT_3_5_TURBO.to_string());

        let mut model_costs = default_model_costs();
        model_costs.extend(parse_model_costs(var("MODEL_COSTS"))?);

        let chat_personality =
            var("CHAT_PERSONALITY").unwrap_or_else(|| "sarcastic parrot".to_string());
        let chat_gpt_total_messages = parse_or(&var, "CHAT_GPT_TOTAL_MESSAGES", 10usize)?;
        let auto_reply_on_mention = var("AUTO_REPLY_ON_MENTION")
            .map(|s| parse_bool(&s))
            .unwrap_or(true);
        let auto_reply_chance = parse_or(&var, "AUTO_REPLY_CHANCE", 0u8)?.min(100);

        let history_backend = match var("HISTORY_BACKEND").as_deref().map(str::to_lowercase) {
            None => HistoryBackend::File,
            Some(s) if s == "file" => HistoryBackend::File,
            Some(s) if s == "memory" => HistoryBackend::Memory,
            Some(other) => {
                return Err(Error::Config(format!(
                    "HISTORY_BACKEND must be `file` or `memory`, got `{other}`"
                )))
            }
        };
        let history_dir = PathBuf::from(
            var("HISTORY_DIR").unwrap_or_else(|| "/tmp/aibird-history".to_string()),
        );
        let image_dir =
            PathBuf::from(var("IMAGE_DIR").unwrap_or_else(|| "/tmp/aibird-images".to_string()));
        let upload_url = var("UPLOAD_URL").unwrap_or_else(|| "https://filehole.org/".to_string());

        let bot_name = var("BOT_NAME");
        let message_limit = parse_or(&var, "MESSAGE_LIMIT", 4000usize)?.max(16);

        Ok(Self {
            telegram_bot_token,
            bot_name,
            message_limit,
            openai_api_key,
            openai_key_label,
            openai_base_url,
            openai_timeout,
            tokens,
            temperature,
            completion_model,
            code_model,
            chat_model,
            model_costs,
            chat_personality,
            chat_gpt_total_messages,
            auto_reply_on_mention,
            auto_reply_chance,
            history_backend,
            history_dir,
            image_dir,
            upload_url,
        })
    }

    /// Cost per 1000 tokens for `model`. Unknown models are free.
    pub fn cost_per_1k(&self, model: &str) -> f64 {
        self.model_costs.get(model).copied().unwrap_or(0.0)
    }
}

fn default_model_costs() -> HashMap<String, f64> {
    [
        (TEXT_DAVINCI_003, 0.02),
        (TEXT_DAVINCI_002, 0.02),
        (TEXT_DAVINCI_001, 0.02),
        (TEXT_CURIE_001, 0.002),
        (TEXT_BABBAGE_001, 0.0005),
        (TEXT_ADA_001, 0.0004),
        (CODE_DAVINCI_002, 0.0),
        (GPT_3_5_TURBO, 0.002),
    ]
    .into_iter()
    .map(|(model, cost)| (model.to_string(), cost))
    .collect()
}

/// Parse `model=cost,model=cost`.
fn parse_model_costs(v: Option<String>) -> Result<HashMap<String, f64>> {
    let mut out = HashMap::new();
    for pair in v.unwrap_or_default().split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let Some((model, cost)) = pair.split_once('=') else {
            return Err(Error::Config(format!(
                "MODEL_COSTS entry `{pair}` is not `model=cost`"
            )));
        };
        let cost = cost
            .trim()
            .parse::<f64>()
            .map_err(|e| Error::Config(format!("MODEL_COSTS entry `{pair}`: {e}")))?;
        if cost < 0.0 {
            return Err(Error::Config(format!(
                "MODEL_COSTS entry `{pair}` is negative"
            )));
        }
        out.insert(model.trim().to_string(), cost);
    }
    Ok(out)
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| Error::Config(format!("{key}: cannot parse `{raw}`: {e}"))),
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Key label safe to put in logs.
fn mask_key(key: &str) -> String {
    let tail: String = key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("sk-...{tail}")
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
