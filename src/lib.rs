//! Charla is a terminal chat client for a hosted chat backend.
//!
//! The crate is organized in a few layers:
//! - [`core`] owns the conversation, the request settings, the HTTP client
//!   and the decoding of streamed replies. [`core::session`] ties them
//!   together into one turn-by-turn state machine.
//! - [`ui`] renders the terminal interface and runs its event loop.
//! - [`cli`] parses arguments, reads the configuration and starts either the
//!   interface or a one-shot `say`.
//! - [`api`] defines the JSON payloads exchanged with the backend.

pub mod api;
pub mod cli;
pub mod core;
pub mod ui;
pub mod utils;
