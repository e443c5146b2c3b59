//! OpenAI adapter: text completions, chat completions and image generation.
//!
//! Failures come back as `Error::Service` with the upstream message kept
//! verbatim, since handlers show it to the user and look for the quota signature.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use aibird_core::{
    errors::Error,
    model::types::{
        ChatCompletion, ChatRequest, Completion, CompletionRequest, GeneratedImage, ImageRequest,
        TokenUsage,
    },
    ports::GenerationClient,
    Result,
};

#[derive(Clone, Debug)]
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("openai client build error: {e}")))?;
        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        debug!(%url, "openai request");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Service(format!("error, request failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| Error::Service(format!("error, reading response failed: {e}")))?;

        if !status.is_success() {
            return Err(service_error(status.as_u16(), &text));
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl GenerationClient for OpenAiClient {
    async fn create_completion(&self, req: CompletionRequest) -> Result<Completion> {
        let resp: CompletionResponse = self.post_json("completions", &req).await?;
        resp.into_completion()
    }

    async fn create_chat_completion(&self, req: ChatRequest) -> Result<ChatCompletion> {
        let resp: ChatResponse = self.post_json("chat/completions", &req).await?;
        Ok(resp.into_chat_completion())
    }

    async fn create_image(&self, req: ImageRequest) -> Result<GeneratedImage> {
        let body = ImageBody {
            prompt: &req.prompt,
            n: req.n,
            size: req.size.as_str(),
        };
        let resp: ImageResponse = self.post_json("images/generations", &body).await?;
        resp.into_image()
    }
}

#[derive(Serialize)]
struct ImageBody<'a> {
    prompt: &'a str,
    n: u8,
    size: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: TokenUsage,
}

#[derive(Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
}

impl CompletionResponse {
    fn into_completion(self) -> Result<Completion> {
        let text = self
            .choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| Error::Service("error, completion returned no choices".to_string()))?;
        Ok(Completion {
            text,
            usage: self.usage,
        })
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: TokenUsage,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

impl ChatResponse {
    fn into_chat_completion(self) -> ChatCompletion {
        ChatCompletion {
            choices: self
                .choices
                .into_iter()
                .map(|c| c.message.content)
                .collect(),
            usage: self.usage,
        }
    }
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: String,
}

impl ImageResponse {
    fn into_image(self) -> Result<GeneratedImage> {
        self.data
            .into_iter()
            .next()
            .map(|d| GeneratedImage { url: d.url })
            .ok_or_else(|| Error::Service("error, image generation returned no data".to_string()))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// `error, status code: <n>, message: <upstream message>`.
fn service_error(status: u16, body: &str) -> Error {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().chars().take(200).collect());
    Error::Service(format!("error, status code: {status}, message: {message}"))
}
