//! HTTP access to the chat backend.

use async_trait::async_trait;
use futures_util::StreamExt;
use tracing::debug;

use crate::api::{ChatReply, ChatRequest, ErrorBody};
use crate::core::chat_stream::ByteStream;
use crate::core::error::ChatError;
use crate::utils::url::construct_api_url;

pub const DEFAULT_BASE_URL: &str = "https://chatbot-backend-vaup.onrender.com";

/// The two request modes of the chat service.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Sends the request to the whole-response endpoint and returns the reply.
    async fn complete(&self, request: &ChatRequest) -> Result<String, ChatError>;

    /// Sends the request to the streaming endpoint and hands back the raw body.
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ChatError>;
}

#[derive(Clone)]
pub struct HttpChatBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChatBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(
        &self,
        endpoint: &str,
        request: &ChatRequest,
    ) -> Result<reqwest::Response, ChatError> {
        let url = construct_api_url(&self.base_url, endpoint);
        debug!(%url, model = %request.model, history = request.conversation_history.len(), "Sending chat request");

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(http_error(response).await)
        }
    }
}

/// Builds an `Http` error, keeping the body's `error` field when there is one.
async fn http_error(response: reqwest::Response) -> ChatError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ChatError::Http {
        status,
        message: extract_error_message(&body),
    }
}

pub fn extract_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.error)
        .map(|message| message.trim().to_string())
        .filter(|message| !message.is_empty())
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ChatError> {
        let response = self.post("chat", request).await?;
        let body = response.text().await?;
        serde_json::from_str::<ChatReply>(&body)
            .map(|reply| reply.reply)
            .map_err(|err| ChatError::InvalidResponse(err.to_string()))
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ChatError> {
        let response = self.post("chat/stream", request).await?;
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ChatError::from));
        Ok(Box::pin(bytes))
    }
}
