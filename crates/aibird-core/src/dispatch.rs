//! Maps incoming chat text to a command.

use rand::Rng;

use crate::{
    config::Config,
    model::types::{
        ImageSize, TEXT_ADA_001, TEXT_BABBAGE_001, TEXT_CURIE_001, TEXT_DAVINCI_001,
        TEXT_DAVINCI_002,
    },
};

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Free-text completion with the given model.
    Completion { model: String, prompt: String },
    /// Completion with the code model.
    Code { prompt: String },
    /// Multi-turn chat with per-participant history.
    Chat { prompt: String },
    /// Persona reply to ordinary chatter.
    AutoReply { message: String },
    Image { size: ImageSize, prompt: String },
    Help,
}

impl Command {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Completion { .. } => "completion",
            Command::Code { .. } => "code",
            Command::Chat { .. } => "chat",
            Command::AutoReply { .. } => "auto_reply",
            Command::Image { .. } => "image",
            Command::Help => "help",
        }
    }
}

/// Text for `!help`.
pub const HELP_TEXT: &str = "Commands: !ai <prompt> (also !davinci, !davinci2, !davinci1, !curie, !babbage, !ada), \
!codex <prompt>, !chat <message>, !dale <prompt> (1024x1024; !dale-m 512x512, !dale-s 256x256), !help";

#[derive(Clone, Debug)]
pub struct Router {
    bot_name: String,
    completion_model: String,
    auto_reply_on_mention: bool,
    auto_reply_chance: u8,
}

impl Router {
    pub fn new(cfg: &Config, bot_name: impl Into<String>) -> Self {
        Self {
            bot_name: bot_name.into(),
            completion_model: cfg.completion_model.clone(),
            auto_reply_on_mention: cfg.auto_reply_on_mention,
            auto_reply_chance: cfg.auto_reply_chance,
        }
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    pub fn route(&self, text: &str) -> Option<Command> {
        let roll = rand::thread_rng().gen_range(0..100u8);
        self.route_with_roll(text, roll)
    }

    /// `roll` in `0..100` decides random auto-replies to plain chatter.
    pub fn route_with_roll(&self, text: &str, roll: u8) -> Option<Command> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        if let Some(body) = text.strip_prefix('!').or_else(|| text.strip_prefix('/')) {
            return self.route_command(body);
        }

        let mentioned = !self.bot_name.is_empty()
            && text
                .to_lowercase()
                .contains(&self.bot_name.to_lowercase());
        if (self.auto_reply_on_mention && mentioned) || roll < self.auto_reply_chance {
            return Some(Command::AutoReply {
                message: text.to_string(),
            });
        }
        None
    }

    fn route_command(&self, body: &str) -> Option<Command> {
        let (name, prompt) = parse_command(body);
        let completion = |model: &str| Command::Completion {
            model: model.to_string(),
            prompt: prompt.clone(),
        };

        let cmd = match name.as_str() {
            "ai" | "davinci" => completion(&self.completion_model),
            "davinci2" => completion(TEXT_DAVINCI_002),
            "davinci1" => completion(TEXT_DAVINCI_001),
            "curie" => completion(TEXT_CURIE_001),
            "babbage" => completion(TEXT_BABBAGE_001),
            "ada" => completion(TEXT_ADA_001),
            "codex" => Command::Code {
                prompt: prompt.clone(),
            },
            "chat" => Command::Chat {
                prompt: prompt.clone(),
            },
            "dale" => Command::Image {
                size: ImageSize::Large,
                prompt: prompt.clone(),
            },
            "dale-m" => Command::Image {
                size: ImageSize::Medium,
                prompt: prompt.clone(),
            },
            "dale-s" => Command::Image {
                size: ImageSize::Small,
                prompt: prompt.clone(),
            },
            "help" | "start" => Command::Help,
            _ => return None,
        };
        Some(cmd)
    }
}

/// `cmd@botname rest of line` -> (`cmd`, `rest of line`).
fn parse_command(body: &str) -> (String, String) {
    let mut parts = body.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first.split('@').next().unwrap_or("").to_lowercase();

    (cmd, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::TEXT_DAVINCI_003;
    use crate::testing::test_config;

    fn router() -> Router {
        Router::new(&test_config(), "aibird")
    }

    #[test]
    fn routes_completion_commands_to_models() {
        let r = router();
        assert_eq!(
            r.route_with_roll("!ai write a haiku", 99),
            Some(Command::Completion {
                model: TEXT_DAVINCI_003.to_string(),
                prompt: "write a haiku".to_string()
            })
        );
        assert_eq!(
            r.route_with_roll("!ADA hi", 99),
            Some(Command::Completion {
                model: TEXT_ADA_001.to_string(),
                prompt: "hi".to_string()
            })
        );
    }

    #[test]
    fn accepts_slash_commands_with_bot_suffix() {
        assert_eq!(
            router().route_with_roll("/chat@aibird_bot  hello there ", 99),
            Some(Command::Chat {
                prompt: "hello there".to_string()
            })
        );
    }

    #[test]
    fn image_commands_pick_a_size() {
        let r = router();
        for (text, size) in [
            ("!dale a fox", ImageSize::Large),
            ("!dale-m a fox", ImageSize::Medium),
            ("!dale-s a fox", ImageSize::Small),
        ] {
            assert_eq!(
                r.route_with_roll(text, 99),
                Some(Command::Image {
                    size,
                    prompt: "a fox".to_string()
                })
            );
        }
    }

    #[test]
    fn commands_without_prompt_still_route() {
        assert_eq!(
            router().route_with_roll("!codex", 99),
            Some(Command::Code {
                prompt: String::new()
            })
        );
    }

    #[test]
    fn unknown_commands_and_plain_chatter_are_ignored() {
        let r = router();
        assert_eq!(r.route_with_roll("!nope x", 0), None);
        assert_eq!(r.route_with_roll("just chatting", 50), None);
        assert_eq!(r.route_with_roll("   ", 0), None);
    }

    #[test]
    fn mentions_trigger_auto_reply() {
        assert_eq!(
            router().route_with_roll("hey AIBird what do you think?", 99),
            Some(Command::AutoReply {
                message: "hey AIBird what do you think?".to_string()
            })
        );
    }

    #[test]
    fn random_auto_reply_respects_chance() {
        let mut cfg = test_config();
        cfg.auto_reply_on_mention = false;
        cfg.auto_reply_chance = 10;
        let r = Router::new(&cfg, "aibird");
        assert!(r.route_with_roll("aibird hello", 10).is_none());
        assert!(matches!(
            r.route_with_roll("anyone here?", 9),
            Some(Command::AutoReply { .. })
        ));
    }
}
