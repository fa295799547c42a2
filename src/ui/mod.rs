//! Terminal UI for interactive chat sessions.
//!
//! [`chat_loop`] owns the event loop, [`renderer`] draws a frame from the
//! [`crate::core::session::ChatSession`] plus the presentation state kept in
//! [`state`].

pub mod chat_loop;
pub mod renderer;
pub mod state;
