//! In-memory fakes for every port, shared by the unit tests.

use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use async_trait::async_trait;

use crate::{
    config::Config,
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{port::MessagingPort, types::MessagingCapabilities},
    model::{
        client::GenerationClient,
        types::{
            ChatCompletion, ChatRequest, Completion, CompletionRequest, GeneratedImage,
            ImageRequest, TokenUsage,
        },
    },
    ports::FileTransfer,
    Result,
};

/// Config with only the required variables set and an in-memory history.
pub fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "TELEGRAM_BOT_TOKEN" => Some("123:test".to_string()),
        "OPENAI_API_KEY" => Some("sk-test-key-abcd".to_string()),
        "OPENAI_KEY_NAME" => Some("primary".to_string()),
        "HISTORY_BACKEND" => Some("memory".to_string()),
        "IMAGE_DIR" => Some("/tmp/aibird-test-images".to_string()),
        _ => None,
    })
    .unwrap()
}

pub fn usage(total_tokens: u64) -> TokenUsage {
    TokenUsage {
        prompt_tokens: 0,
        completion_tokens: total_tokens,
        total_tokens,
    }
}

/// Records every sent message. Can be told to fail the first few sends.
pub struct FakeMessenger {
    sent: Mutex<Vec<(ChatId, String)>>,
    failures_left: Mutex<usize>,
    max_message_len: usize,
}

impl Default for FakeMessenger {
    fn default() -> Self {
        Self::with_limit(4096)
    }
}

impl FakeMessenger {
    pub fn with_limit(max_message_len: usize) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failures_left: Mutex::new(0),
            max_message_len,
        }
    }

    /// The next `n` sends fail and are not recorded.
    pub fn failing_first(self, n: usize) -> Self {
        *self.failures_left.lock().unwrap() = n;
        self
    }

    pub fn sent(&self) -> Vec<(ChatId, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, t)| t).collect()
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            max_message_len: self.max_message_len,
        }
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        {
            let mut failures_left = self.failures_left.lock().unwrap();
            if *failures_left > 0 {
                *failures_left -= 1;
                return Err(Error::External("telegram error: send failed".to_string()));
            }
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((chat_id, text.to_string()));
        Ok(MessageRef {
            chat_id,
            message_id: MessageId(sent.len() as i32),
        })
    }
}

/// Generation client with scripted replies. `Err(text)` becomes `Error::Service(text)`.
pub struct FakeClient {
    completion: Mutex<std::result::Result<Completion, String>>,
    chat: Mutex<std::result::Result<ChatCompletion, String>>,
    image: Mutex<std::result::Result<GeneratedImage, String>>,
    pub completion_requests: Mutex<Vec<CompletionRequest>>,
    pub chat_requests: Mutex<Vec<ChatRequest>>,
    pub image_requests: Mutex<Vec<ImageRequest>>,
}

impl Default for FakeClient {
    fn default() -> Self {
        Self {
            completion: Mutex::new(Ok(Completion {
                text: "ok".to_string(),
                usage: usage(0),
            })),
            chat: Mutex::new(Ok(ChatCompletion {
                choices: vec!["ok".to_string()],
                usage: usage(0),
            })),
            image: Mutex::new(Ok(GeneratedImage {
                url: "https://images.example/generated.png".to_string(),
            })),
            completion_requests: Mutex::new(Vec::new()),
            chat_requests: Mutex::new(Vec::new()),
            image_requests: Mutex::new(Vec::new()),
        }
    }
}

impl FakeClient {
    pub fn completion_reply(self, text: &str, total_tokens: u64) -> Self {
        *self.completion.lock().unwrap() = Ok(Completion {
            text: text.to_string(),
            usage: usage(total_tokens),
        });
        self
    }

    pub fn chat_reply(self, choices: &[&str]) -> Self {
        *self.chat.lock().unwrap() = Ok(ChatCompletion {
            choices: choices.iter().map(|c| c.to_string()).collect(),
            usage: usage(10),
        });
        self
    }

    /// Every call fails with `text`.
    pub fn failing(self, text: &str) -> Self {
        *self.completion.lock().unwrap() = Err(text.to_string());
        *self.chat.lock().unwrap() = Err(text.to_string());
        *self.image.lock().unwrap() = Err(text.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.completion_requests.lock().unwrap().len()
            + self.chat_requests.lock().unwrap().len()
            + self.image_requests.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationClient for FakeClient {
    async fn create_completion(&self, req: CompletionRequest) -> Result<Completion> {
        self.completion_requests.lock().unwrap().push(req);
        self.completion.lock().unwrap().clone().map_err(Error::Service)
    }

    async fn create_chat_completion(&self, req: ChatRequest) -> Result<ChatCompletion> {
        self.chat_requests.lock().unwrap().push(req);
        self.chat.lock().unwrap().clone().map_err(Error::Service)
    }

    async fn create_image(&self, req: ImageRequest) -> Result<GeneratedImage> {
        self.image_requests.lock().unwrap().push(req);
        self.image.lock().unwrap().clone().map_err(Error::Service)
    }
}

/// Records transfers without touching the disk or network.
pub struct FakeTransfer {
    pub downloads: Mutex<Vec<(String, PathBuf)>>,
    pub uploads: Mutex<Vec<(String, PathBuf)>>,
    download_error: Option<String>,
    public_ref: String,
}

impl Default for FakeTransfer {
    fn default() -> Self {
        Self {
            downloads: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            download_error: None,
            public_ref: "https://files.example/abc.png".to_string(),
        }
    }
}

impl FakeTransfer {
    pub fn failing_download(mut self, text: &str) -> Self {
        self.download_error = Some(text.to_string());
        self
    }
}

#[async_trait]
impl FileTransfer for FakeTransfer {
    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        self.downloads
            .lock()
            .unwrap()
            .push((url.to_string(), dest.to_path_buf()));
        match &self.download_error {
            Some(text) => Err(Error::External(text.clone())),
            None => Ok(()),
        }
    }

    async fn upload(&self, base_url: &str, file: &Path) -> Result<String> {
        self.uploads
            .lock()
            .unwrap()
            .push((base_url.to_string(), file.to_path_buf()));
        Ok(self.public_ref.clone())
    }
}
