//! Payloads exchanged with the chat backend.
//!
//! Both endpoints (`POST /chat` and `POST /chat/stream`) accept the same
//! [`ChatRequest`] body. The blocking endpoint answers with [`ChatReply`];
//! the streaming endpoint answers with `data:` lines whose JSON payloads
//! decode as [`ChatResponse`]. Failures carry an [`ErrorBody`].

use serde::{Deserialize, Serialize};

/// One prior turn as the backend expects it in `conversationHistory`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(rename = "conversationHistory")]
    pub conversation_history: Vec<ChatMessage>,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Debug, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponseDelta {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponseChoice {
    #[serde(default)]
    pub delta: Option<ChatResponseDelta>,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatResponseChoice>,
}

impl ChatResponse {
    /// Content fragment carried by the first choice, if any.
    pub fn first_delta(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.as_ref())
            .and_then(|delta| delta.content.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_backend_field_names() {
        let request = ChatRequest {
            message: "hola".into(),
            conversation_history: vec![ChatMessage {
                role: "assistant".into(),
                content: "hi".into(),
            }],
            model: "gpt-4".into(),
            temperature: 0.5,
            max_tokens: 1000,
        };

        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value["message"], "hola");
        assert_eq!(value["conversationHistory"][0]["role"], "assistant");
        assert_eq!(value["model"], "gpt-4");
        assert_eq!(value["temperature"], 0.5);
        assert_eq!(value["max_tokens"], 1000);
        assert!(value["max_tokens"].is_u64());
    }

    #[test]
    fn first_delta_tolerates_missing_pieces() {
        let empty: ChatResponse = serde_json::from_str("{}").expect("parse");
        assert_eq!(empty.first_delta(), None);

        let no_delta: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"finish_reason":"stop"}]}"#).expect("parse");
        assert_eq!(no_delta.first_delta(), None);

        let with_content: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"delta":{"content":"A"}},{"delta":{"content":"B"}}]}"#)
                .expect("parse");
        assert_eq!(with_content.first_delta(), Some("A"));
    }
}
