//! Ordered, append-only conversation history.
//!
//! The store is the source of truth for what is rendered and for the
//! context sent with each new user turn. Renderers can follow it through
//! [`ConversationStore::subscribe`].

use std::fmt;

use tokio::sync::watch;

use crate::api::ChatMessage;
use crate::core::message::Message;

/// Position of a message in the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(usize);

impl MessageId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    /// User-authored messages must carry some non-whitespace content.
    EmptyUserMessage,
}

impl fmt::Display for ConversationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationError::EmptyUserMessage => write!(f, "User message is empty"),
        }
    }
}

impl std::error::Error for ConversationError {}

pub struct ConversationStore {
    messages: watch::Sender<Vec<Message>>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        let (messages, _) = watch::channel(Vec::new());
        Self { messages }
    }

    pub fn append(&mut self, message: Message) -> Result<MessageId, ConversationError> {
        if message.is_user() && message.content.trim().is_empty() {
            return Err(ConversationError::EmptyUserMessage);
        }

        let mut id = MessageId(0);
        self.messages.send_modify(|messages| {
            id = MessageId(messages.len());
            messages.push(message);
        });
        Ok(id)
    }

    /// History preceding `pending`, in wire vocabulary.
    ///
    /// `pending` is the user turn being sent; it and anything appended after
    /// it are excluded.
    pub fn to_context(&self, pending: MessageId) -> Vec<ChatMessage> {
        self.messages
            .borrow()
            .iter()
            .take(pending.index())
            .map(ChatMessage::from)
            .collect()
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.borrow().clone()
    }

    pub fn last(&self) -> Option<Message> {
        self.messages.borrow().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.messages.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.borrow().is_empty()
    }

    /// Runs `f` over the current history without cloning it.
    pub fn with_messages<R>(&self, f: impl FnOnce(&[Message]) -> R) -> R {
        f(&self.messages.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Message>> {
        self.messages.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Role;

    #[test]
    fn context_excludes_the_pending_turn() {
        let mut store = ConversationStore::new();
        store.append(Message::user("Hello")).expect("append");
        store.append(Message::assistant("Hi there!")).expect("append");
        let pending = store.append(Message::user("How are you?")).expect("append");

        let context = store.to_context(pending);
        assert_eq!(context.len(), 2);
        assert_eq!(context[0].role, "user");
        assert_eq!(context[1].role, "assistant");
        assert!(context.iter().all(|m| m.content != "How are you?"));
    }

    #[test]
    fn context_ignores_messages_appended_after_the_pending_turn() {
        let mut store = ConversationStore::new();
        let first = store.append(Message::user("first")).expect("append");
        store.append(Message::user("second")).expect("append");

        assert!(store.to_context(first).is_empty());
    }

    #[test]
    fn pending_turn_is_never_in_its_own_context() {
        let inputs = ["a", " padded ", "multi\nline", "ñandú 🙂", "x"];
        let mut store = ConversationStore::new();
        for input in inputs {
            let id = store.append(Message::user(input)).expect("append");
            let context = store.to_context(id);
            assert_eq!(context.len(), id.index());
            assert!(context.len() < store.len());
            store.append(Message::assistant("ok")).expect("append");
        }
    }

    #[test]
    fn blank_user_messages_are_rejected() {
        let mut store = ConversationStore::new();
        assert_eq!(
            store.append(Message::user("   \n\t")),
            Err(ConversationError::EmptyUserMessage)
        );
        assert!(store.is_empty());
    }

    #[test]
    fn assistant_messages_skip_content_validation() {
        let mut store = ConversationStore::new();
        store.append(Message::assistant("")).expect("append");
        assert_eq!(store.last().map(|m| m.role), Some(Role::Assistant));
    }

    #[test]
    fn subscribers_observe_appends() {
        let mut store = ConversationStore::new();
        let mut rx = store.subscribe();
        assert!(!rx.has_changed().expect("sender alive"));

        store.append(Message::user("ping")).expect("append");
        assert!(rx.has_changed().expect("sender alive"));
        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen, vec![Message::user("ping")]);
    }
}
