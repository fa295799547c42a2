//! Conversation state and the lifecycle of one request.
//!
//! A [`ChatSession`] owns the conversation history, the settings controls,
//! the transient streaming buffer and the error banner. Front ends call
//! [`ChatSession::submit`], run the returned [`PendingTurn`] against a
//! [`ChatBackend`], and feed the results back through
//! [`ChatSession::finish_blocking`] or [`ChatSession::apply_stream_message`].
//! [`ChatSession::run_turn`] does all three in one call.

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::api::ChatRequest;
use crate::core::chat_stream::{stream_reply, StreamMessage};
use crate::core::client::ChatBackend;
use crate::core::conversation::ConversationStore;
use crate::core::error::{ChatError, GENERIC_FAILURE_MESSAGE};
use crate::core::message::Message;
use crate::core::settings::SettingsForm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Idle,
    /// Waiting on the whole-response endpoint.
    Loading,
    /// Receiving fragments from the streaming endpoint.
    Streaming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Blocking,
    Streaming,
}

/// A request the caller must now send.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    pub stream_id: u64,
    pub mode: RequestMode,
    pub request: ChatRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Nothing was sent: blank input, a request already in flight, or
    /// settings that did not resolve (see [`ChatSession::error`]).
    NotSent,
    Replied(String),
    /// `salvaged` holds partial streamed text that was kept as the reply.
    Failed {
        error: String,
        salvaged: Option<String>,
    },
}

/// Accumulates streamed fragments and republishes them to subscribers.
struct StreamingBuffer {
    text: watch::Sender<String>,
}

impl StreamingBuffer {
    fn new() -> Self {
        let (text, _) = watch::channel(String::new());
        Self { text }
    }

    fn push(&self, fragment: &str) {
        self.text.send_modify(|text| text.push_str(fragment));
    }

    fn is_empty(&self) -> bool {
        self.text.borrow().is_empty()
    }

    fn snapshot(&self) -> String {
        self.text.borrow().clone()
    }

    /// Empties the buffer, returning what it held.
    fn take(&self) -> String {
        self.text.send_replace(String::new())
    }

    fn subscribe(&self) -> watch::Receiver<String> {
        self.text.subscribe()
    }
}

pub struct ChatSession {
    store: ConversationStore,
    settings: SettingsForm,
    phase: RequestPhase,
    buffer: StreamingBuffer,
    error: Option<String>,
    current_stream_id: u64,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new(SettingsForm::default())
    }
}

impl ChatSession {
    pub fn new(settings: SettingsForm) -> Self {
        Self {
            store: ConversationStore::new(),
            settings,
            phase: RequestPhase::Idle,
            buffer: StreamingBuffer::new(),
            error: None,
            current_stream_id: 0,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn settings(&self) -> &SettingsForm {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SettingsForm {
        &mut self.settings
    }

    pub fn phase(&self) -> RequestPhase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == RequestPhase::Loading
    }

    pub fn is_streaming(&self) -> bool {
        self.phase == RequestPhase::Streaming
    }

    pub fn is_busy(&self) -> bool {
        self.phase != RequestPhase::Idle
    }

    /// Partial reply of the request in flight; empty outside streaming.
    pub fn streaming_text(&self) -> String {
        self.buffer.snapshot()
    }

    pub fn subscribe_partial(&self) -> watch::Receiver<String> {
        self.buffer.subscribe()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Starts a turn for `input`.
    ///
    /// The user message is committed before anything is sent and is never
    /// rolled back. Returns `None` when no request should be issued.
    pub fn submit(&mut self, input: &str) -> Option<PendingTurn> {
        if input.trim().is_empty() {
            return None;
        }
        if self.is_busy() {
            debug!(phase = ?self.phase, "Ignoring submit while a request is in flight");
            return None;
        }

        let settings = match self.settings.resolve() {
            Ok(settings) => settings,
            Err(err) => {
                warn!(error = %err, "Settings did not resolve; request not sent");
                self.error = Some(err.to_string());
                return None;
            }
        };

        self.error = None;
        let user_message = self.store.append(Message::user(input)).ok()?;
        let request = ChatRequest {
            message: input.to_string(),
            conversation_history: self.store.to_context(user_message),
            model: settings.model.as_str().to_string(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        };

        self.current_stream_id += 1;
        self.buffer.take();
        let mode = if settings.use_streaming {
            self.phase = RequestPhase::Streaming;
            RequestMode::Streaming
        } else {
            self.phase = RequestPhase::Loading;
            RequestMode::Blocking
        };

        info!(
            stream_id = self.current_stream_id,
            ?mode,
            model = %request.model,
            history = request.conversation_history.len(),
            "Submitting chat turn"
        );

        Some(PendingTurn {
            stream_id: self.current_stream_id,
            mode,
            request,
        })
    }

    /// Settles a whole-response request. Returns `None` for a stale id.
    pub fn finish_blocking(
        &mut self,
        stream_id: u64,
        result: Result<String, ChatError>,
    ) -> Option<TurnOutcome> {
        if stream_id != self.current_stream_id || self.phase != RequestPhase::Loading {
            debug!(stream_id, "Ignoring stale reply");
            return None;
        }
        self.phase = RequestPhase::Idle;

        match result {
            Ok(reply) => {
                info!(stream_id, chars = reply.chars().count(), "Reply received");
                self.commit_reply(reply.clone());
                Some(TurnOutcome::Replied(reply))
            }
            Err(err) => {
                warn!(stream_id, error = %err, "Chat request failed");
                let message = err
                    .server_message()
                    .unwrap_or(GENERIC_FAILURE_MESSAGE)
                    .to_string();
                self.error = Some(message.clone());
                Some(TurnOutcome::Failed {
                    error: message,
                    salvaged: None,
                })
            }
        }
    }

    /// Applies one message from the stream producer.
    ///
    /// Returns the outcome once the turn settles. Messages for other stream
    /// ids, or arriving after the turn settled, are ignored.
    pub fn apply_stream_message(
        &mut self,
        stream_id: u64,
        message: StreamMessage,
    ) -> Option<TurnOutcome> {
        if stream_id != self.current_stream_id || self.phase != RequestPhase::Streaming {
            return None;
        }

        match message {
            StreamMessage::Chunk(fragment) => {
                self.buffer.push(&fragment);
                None
            }
            StreamMessage::Error(err) if !err.is_fatal() => {
                debug!(stream_id, error = %err, "Ignoring recoverable stream error");
                None
            }
            StreamMessage::Error(err) => Some(self.fail_stream(stream_id, err)),
            StreamMessage::End => {
                if self.buffer.is_empty() {
                    Some(self.fail_stream(stream_id, ChatError::EmptyStreamResult))
                } else {
                    self.phase = RequestPhase::Idle;
                    let reply = self.buffer.take();
                    info!(stream_id, chars = reply.chars().count(), "Stream committed");
                    self.commit_reply(reply.clone());
                    Some(TurnOutcome::Replied(reply))
                }
            }
        }
    }

    /// Ends a streaming turn in error, keeping any partial text as the reply.
    fn fail_stream(&mut self, stream_id: u64, err: ChatError) -> TurnOutcome {
        self.phase = RequestPhase::Idle;
        let partial = self.buffer.take();
        let message = format!("Communication error: {err}");
        warn!(stream_id, error = %err, salvaged = !partial.is_empty(), "Stream failed");
        self.error = Some(message.clone());

        let salvaged = if partial.is_empty() {
            None
        } else {
            self.commit_reply(partial.clone());
            Some(partial)
        };
        TurnOutcome::Failed {
            error: message,
            salvaged,
        }
    }

    fn commit_reply(&mut self, content: String) {
        // Assistant messages are not validated, so this cannot fail.
        let _ = self.store.append(Message::assistant(content));
    }

    /// Runs a whole turn against `backend`, reporting streamed fragments to
    /// `on_delta` as they arrive.
    pub async fn run_turn(
        &mut self,
        backend: &dyn ChatBackend,
        input: &str,
        mut on_delta: impl FnMut(&str),
    ) -> TurnOutcome {
        let Some(turn) = self.submit(input) else {
            return TurnOutcome::NotSent;
        };
        let stream_id = turn.stream_id;

        match turn.mode {
            RequestMode::Blocking => {
                let result = backend.complete(&turn.request).await;
                self.finish_blocking(stream_id, result)
                    .unwrap_or(TurnOutcome::NotSent)
            }
            RequestMode::Streaming => {
                let (tx, mut rx) = mpsc::unbounded_channel();
                let request = &turn.request;

                let producer = stream_reply(backend, request, tx, stream_id);

                let consumer = async {
                    let mut outcome = None;
                    while let Some((message, id)) = rx.recv().await {
                        if let StreamMessage::Chunk(fragment) = &message {
                            on_delta(fragment);
                        }
                        if let Some(settled) = self.apply_stream_message(id, message) {
                            outcome = Some(settled);
                        }
                    }
                    outcome
                };

                let ((), outcome) = tokio::join!(producer, consumer);
                match outcome {
                    Some(outcome) => outcome,
                    None => self
                        .apply_stream_message(stream_id, StreamMessage::End)
                        .unwrap_or(TurnOutcome::NotSent),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Role;
    use crate::utils::test_utils::{delta_frame, done_frame, ScriptedBackend};

    fn streaming_session() -> ChatSession {
        let mut session = ChatSession::default();
        session.settings_mut().use_streaming = true;
        session
    }

    fn assistant_messages(session: &ChatSession) -> Vec<String> {
        session
            .store()
            .snapshot()
            .into_iter()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.content)
            .collect()
    }

    #[tokio::test]
    async fn blank_input_is_a_no_op() {
        let backend = ScriptedBackend::default();
        let mut session = ChatSession::default();

        for input in ["", "   ", "\n\t "] {
            let outcome = session.run_turn(&backend, input, |_| {}).await;
            assert_eq!(outcome, TurnOutcome::NotSent);
        }
        assert!(session.store().is_empty());
        assert!(backend.requests().is_empty());
        assert!(session.error().is_none());
    }

    #[tokio::test]
    async fn blocking_turn_appends_reply_and_sends_prior_context() {
        let backend = ScriptedBackend::replying(vec![Ok("Hi!".into()), Ok("Fine.".into())]);
        let mut session = ChatSession::default();

        let first = session.run_turn(&backend, "Hello", |_| {}).await;
        assert_eq!(first, TurnOutcome::Replied("Hi!".into()));
        session.run_turn(&backend, "How are you?", |_| {}).await;

        let requests = backend.requests();
        assert!(requests[0].conversation_history.is_empty());
        assert_eq!(requests[1].message, "How are you?");
        assert_eq!(
            requests[1]
                .conversation_history
                .iter()
                .map(|m| (m.role.as_str(), m.content.as_str()))
                .collect::<Vec<_>>(),
            vec![("user", "Hello"), ("assistant", "Hi!")]
        );
        assert_eq!(session.store().len(), 4);
        assert_eq!(session.phase(), RequestPhase::Idle);
    }

    #[tokio::test]
    async fn blocking_failure_shows_server_message_and_keeps_user_turn() {
        let backend = ScriptedBackend::replying(vec![Err(ChatError::Http {
            status: 500,
            message: Some("Upstream timeout".into()),
        })]);
        let mut session = ChatSession::default();

        let outcome = session.run_turn(&backend, "Hello", |_| {}).await;
        assert_eq!(
            outcome,
            TurnOutcome::Failed {
                error: "Upstream timeout".into(),
                salvaged: None
            }
        );
        assert_eq!(session.error(), Some("Upstream timeout"));
        assert_eq!(session.store().snapshot(), vec![Message::user("Hello")]);
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn blocking_transport_failure_uses_generic_message() {
        let backend =
            ScriptedBackend::replying(vec![Err(ChatError::Transport("dns failure".into()))]);
        let mut session = ChatSession::default();

        session.run_turn(&backend, "Hello", |_| {}).await;
        assert_eq!(session.error(), Some(GENERIC_FAILURE_MESSAGE));
        assert!(assistant_messages(&session).is_empty());
    }

    #[tokio::test]
    async fn streamed_fragments_are_committed_as_one_message() {
        let backend = ScriptedBackend::streaming(Ok(vec![
            Ok(delta_frame("A")),
            Ok(delta_frame("B")),
            Ok(done_frame()),
        ]));
        let mut session = streaming_session();
        let mut deltas = Vec::new();

        let outcome = session
            .run_turn(&backend, "Say AB", |delta| deltas.push(delta.to_string()))
            .await;

        assert_eq!(outcome, TurnOutcome::Replied("AB".into()));
        assert_eq!(deltas, vec!["A", "B"]);
        assert_eq!(assistant_messages(&session), vec!["AB"]);
        assert!(session.streaming_text().is_empty());
        assert!(!session.is_streaming());
    }

    #[tokio::test]
    async fn malformed_frame_does_not_interrupt_accumulation() {
        let backend = ScriptedBackend::streaming(Ok(vec![
            Ok(delta_frame("A")),
            Ok(b"data: {\"choices\": [oops\n".to_vec()),
            Ok(delta_frame("B")),
            Ok(done_frame()),
        ]));
        let mut session = streaming_session();

        session.run_turn(&backend, "go", |_| {}).await;
        assert_eq!(assistant_messages(&session), vec!["AB"]);
        assert!(session.error().is_none());
    }

    #[tokio::test]
    async fn empty_stream_is_an_error_without_assistant_message() {
        let backend = ScriptedBackend::streaming(Ok(vec![Ok(done_frame())]));
        let mut session = streaming_session();

        let outcome = session.run_turn(&backend, "anyone?", |_| {}).await;
        assert_eq!(
            outcome,
            TurnOutcome::Failed {
                error: "Communication error: No response received from the server".into(),
                salvaged: None
            }
        );
        assert!(assistant_messages(&session).is_empty());
        assert_eq!(session.store().len(), 1);
    }

    #[tokio::test]
    async fn partial_output_is_salvaged_on_transport_failure() {
        let backend = ScriptedBackend::streaming(Ok(vec![
            Ok(delta_frame("Hel")),
            Err(ChatError::Transport("connection reset".into())),
        ]));
        let mut session = streaming_session();

        let outcome = session.run_turn(&backend, "Say hello", |_| {}).await;
        assert_eq!(
            outcome,
            TurnOutcome::Failed {
                error: "Communication error: Network error: connection reset".into(),
                salvaged: Some("Hel".into())
            }
        );
        assert_eq!(assistant_messages(&session), vec!["Hel"]);
        assert!(session.error().is_some());
        assert!(session.streaming_text().is_empty());
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn rejected_stream_request_surfaces_http_status() {
        let backend = ScriptedBackend::streaming(Err(ChatError::Http {
            status: 500,
            message: None,
        }));
        let mut session = streaming_session();

        session.run_turn(&backend, "hi", |_| {}).await;
        assert_eq!(session.error(), Some("Communication error: HTTP error 500"));
        assert_eq!(session.store().snapshot(), vec![Message::user("hi")]);
    }

    #[tokio::test]
    async fn numeric_controls_are_coerced_into_the_request() {
        let backend = ScriptedBackend::replying(vec![Ok("ok".into())]);
        let mut session = ChatSession::default();
        session.settings_mut().set("temperature", " 0.7 ").expect("set");
        session.settings_mut().set("max-tokens", "1000").expect("set");
        session.settings_mut().set("model", "gpt-3.5-turbo").expect("set");

        session.run_turn(&backend, "hi", |_| {}).await;

        let request = &backend.requests()[0];
        let body = serde_json::to_value(request).expect("serialize");
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["max_tokens"], 1000);
        assert!(body["max_tokens"].is_u64());
        assert_eq!(body["model"], "gpt-3.5-turbo");
    }

    #[tokio::test]
    async fn invalid_settings_block_the_request() {
        let backend = ScriptedBackend::default();
        let mut session = ChatSession::default();
        session.settings_mut().set("max-tokens", "lots").expect("raw text");

        let outcome = session.run_turn(&backend, "hi", |_| {}).await;
        assert_eq!(outcome, TurnOutcome::NotSent);
        assert!(session.store().is_empty());
        assert!(backend.requests().is_empty());
        assert!(session.error().expect("error").contains("max_tokens"));
    }

    #[test]
    fn submit_is_refused_while_busy() {
        let mut session = streaming_session();
        assert!(session.submit("first").is_some());
        assert!(session.is_streaming());
        assert!(session.submit("second").is_none());
        assert_eq!(session.store().len(), 1);
    }

    #[test]
    fn submit_clears_previous_error() {
        let mut session = ChatSession::default();
        let turn = session.submit("one").expect("turn");
        session.finish_blocking(turn.stream_id, Err(ChatError::Transport("down".into())));
        assert!(session.error().is_some());

        assert!(session.submit("two").is_some());
        assert!(session.error().is_none());
        assert!(session.is_loading());
    }

    #[test]
    fn stale_stream_messages_are_ignored() {
        let mut session = streaming_session();
        let turn = session.submit("hi").expect("turn");
        let stale = turn.stream_id - 1;

        assert!(session
            .apply_stream_message(stale, StreamMessage::Chunk("x".into()))
            .is_none());
        assert!(session.streaming_text().is_empty());

        session.apply_stream_message(turn.stream_id, StreamMessage::Chunk("ok".into()));
        let outcome = session.apply_stream_message(turn.stream_id, StreamMessage::End);
        assert_eq!(outcome, Some(TurnOutcome::Replied("ok".into())));

        // A trailing End after the turn settled changes nothing.
        assert!(session
            .apply_stream_message(turn.stream_id, StreamMessage::End)
            .is_none());
        assert_eq!(assistant_messages(&session), vec!["ok"]);
    }

    #[test]
    fn partial_text_is_published_to_subscribers() {
        let mut session = streaming_session();
        let mut partial = session.subscribe_partial();
        let turn = session.submit("hi").expect("turn");

        session.apply_stream_message(turn.stream_id, StreamMessage::Chunk("Hel".into()));
        session.apply_stream_message(turn.stream_id, StreamMessage::Chunk("lo".into()));
        assert_eq!(partial.borrow_and_update().as_str(), "Hello");
        assert_eq!(session.streaming_text(), "Hello");

        session.apply_stream_message(turn.stream_id, StreamMessage::End);
        assert!(partial.has_changed().expect("sender alive"));
        assert_eq!(partial.borrow_and_update().as_str(), "");
    }

    #[test]
    fn recoverable_errors_keep_the_stream_open() {
        let mut session = streaming_session();
        let turn = session.submit("hi").expect("turn");
        let parse_error = ChatError::StreamParse {
            payload: "{".into(),
            reason: "eof".into(),
        };

        assert!(session
            .apply_stream_message(turn.stream_id, StreamMessage::Error(parse_error))
            .is_none());
        assert!(session.is_streaming());
    }

    #[test]
    fn error_banner_can_be_dismissed() {
        let mut session = streaming_session();
        let turn = session.submit("hi").expect("turn");
        session.apply_stream_message(turn.stream_id, StreamMessage::End);
        assert!(session.error().is_some());

        session.dismiss_error();
        assert!(session.error().is_none());
    }
}
