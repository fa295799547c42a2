//! Failures of a single chat request.

use std::fmt;

/// Banner text for a failed whole-response request without a server message.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Error communicating with the server. Please try again.";

#[derive(Debug, Clone, PartialEq)]
pub enum ChatError {
    /// The request never produced a response, or the body broke off mid-read.
    Transport(String),
    /// The server answered with a non-2xx status.
    Http { status: u16, message: Option<String> },
    /// A stream frame whose payload is not valid JSON. Skipped, never fatal.
    StreamParse { payload: String, reason: String },
    /// The stream finished without a single content fragment.
    EmptyStreamResult,
    /// A 2xx response whose body is not the expected shape.
    InvalidResponse(String),
}

impl ChatError {
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ChatError::Http {
                message: Some(message),
                ..
            } => Some(message.as_str()),
            _ => None,
        }
    }

    /// Whether the request is over once this error occurs.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ChatError::StreamParse { .. })
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::Transport(reason) => write!(f, "Network error: {reason}"),
            ChatError::Http {
                status,
                message: Some(message),
            } => write!(f, "HTTP error {status}: {message}"),
            ChatError::Http {
                status,
                message: None,
            } => write!(f, "HTTP error {status}"),
            ChatError::StreamParse { reason, .. } => write!(f, "Malformed stream frame: {reason}"),
            ChatError::EmptyStreamResult => write!(f, "No response received from the server"),
            ChatError::InvalidResponse(reason) => write!(f, "Unexpected response: {reason}"),
        }
    }
}

impl std::error::Error for ChatError {}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Transport(err.to_string())
    }
}
