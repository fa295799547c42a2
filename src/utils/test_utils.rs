//! Shared fixtures for unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;

use crate::api::ChatRequest;
use crate::core::chat_stream::ByteStream;
use crate::core::client::ChatBackend;
use crate::core::error::ChatError;

pub type StreamScript = Result<Vec<Result<Vec<u8>, ChatError>>, ChatError>;

/// Backend double that replays canned results in order and records every
/// request it receives.
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<Vec<Result<String, ChatError>>>,
    streams: Mutex<Vec<StreamScript>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    pub fn replying(replies: Vec<Result<String, ChatError>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            ..Default::default()
        }
    }

    pub fn streaming(script: StreamScript) -> Self {
        Self {
            streams: Mutex::new(vec![script]),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ChatError> {
        self.requests.lock().expect("requests lock").push(request.clone());
        let mut replies = self.replies.lock().expect("replies lock");
        if replies.is_empty() {
            return Err(ChatError::Transport("no scripted reply".into()));
        }
        replies.remove(0)
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ChatError> {
        self.requests.lock().expect("requests lock").push(request.clone());
        let script = {
            let mut streams = self.streams.lock().expect("streams lock");
            if streams.is_empty() {
                return Err(ChatError::Transport("no scripted stream".into()));
            }
            streams.remove(0)
        };
        Ok(Box::pin(stream::iter(script?)))
    }
}

/// One `data:` line carrying a content fragment.
pub fn delta_frame(content: &str) -> Vec<u8> {
    format!(
        "data: {}\n",
        serde_json::json!({ "choices": [{ "delta": { "content": content } }] })
    )
    .into_bytes()
}

pub fn done_frame() -> Vec<u8> {
    b"data: [DONE]\n".to_vec()
}
