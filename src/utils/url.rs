//! Joining the backend base URL with endpoint paths.

/// Removes trailing slashes from a base URL.
///
/// ```
/// use charla::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:3001/"), "http://localhost:3001");
/// assert_eq!(normalize_base_url("https://chat.example.org/api///"), "https://chat.example.org/api");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Appends `endpoint` to `base_url` with exactly one slash between them.
///
/// ```
/// use charla::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://chat.example.org/", "/chat/stream"),
///     "https://chat.example.org/chat/stream"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalize_base_url(base_url), endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_slashes_and_whitespace() {
        assert_eq!(normalize_base_url("http://localhost:3001"), "http://localhost:3001");
        assert_eq!(normalize_base_url(" http://localhost:3001// "), "http://localhost:3001");
        assert_eq!(normalize_base_url("///"), "");
    }

    #[test]
    fn chat_endpoints_join_cleanly() {
        for base in [
            "https://chatbot-backend-vaup.onrender.com",
            "https://chatbot-backend-vaup.onrender.com/",
        ] {
            assert_eq!(
                construct_api_url(base, "chat"),
                "https://chatbot-backend-vaup.onrender.com/chat"
            );
            assert_eq!(
                construct_api_url(base, "/chat/stream"),
                "https://chatbot-backend-vaup.onrender.com/chat/stream"
            );
        }
        assert_eq!(
            construct_api_url("http://127.0.0.1:8080/api/", "///chat"),
            "http://127.0.0.1:8080/api/chat"
        );
    }
}
