//! Main chat event loop
//!
//! Reads terminal events, forwards submitted turns to the backend on
//! background tasks and feeds their results back into the [`ChatSession`].

mod lifecycle;

use std::{error::Error, sync::Arc, time::Duration};

use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;
use tracing::{debug, info};

use self::lifecycle::{restore_terminal, setup_terminal, ChatTerminal};
use crate::core::chat_stream::{ChatStreamService, StreamMessage};
use crate::core::client::ChatBackend;
use crate::core::error::ChatError;
use crate::core::session::{ChatSession, PendingTurn, RequestMode};
use crate::ui::renderer::ui;
use crate::ui::state::UiState;
use crate::utils::input::sanitize_text_input;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Continue,
    Send,
    Quit,
}

/// Applies one key press to the session and UI state.
pub fn handle_key(session: &mut ChatSession, state: &mut UiState, key: KeyEvent) -> KeyOutcome {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => return KeyOutcome::Quit,
        KeyCode::F(2) => state.toggle_settings(),
        KeyCode::Esc => {
            if session.error().is_some() {
                session.dismiss_error();
            } else {
                state.settings_open = false;
            }
        }
        KeyCode::PageUp => state.page_up(),
        KeyCode::PageDown => state.page_down(),
        _ if state.settings_open && handle_settings_key(session, state, key.code) => {}
        // The input line is disabled while a request is outstanding.
        _ if session.is_busy() => {}
        KeyCode::Enter => {
            if !state.input.trim().is_empty() {
                return KeyOutcome::Send;
            }
        }
        KeyCode::Char(ch) if !ctrl => state.insert_char(ch),
        KeyCode::Backspace => state.backspace(),
        KeyCode::Delete => state.delete(),
        KeyCode::Left => state.move_left(),
        KeyCode::Right => state.move_right(),
        KeyCode::Home => state.move_home(),
        KeyCode::End => state.move_end(),
        _ => {}
    }
    KeyOutcome::Continue
}

/// Arrow keys drive the open settings panel; text keys never reach it.
/// Returns false for keys it ignores.
fn handle_settings_key(session: &mut ChatSession, state: &mut UiState, code: KeyCode) -> bool {
    let field = state.selected_setting;
    match code {
        KeyCode::Up => state.selected_setting = field.previous(),
        KeyCode::Down => state.selected_setting = field.next(),
        KeyCode::Left => field.adjust(session.settings_mut(), -1),
        KeyCode::Right => field.adjust(session.settings_mut(), 1),
        _ => return false,
    }
    true
}

type ReplyMessage = (u64, Result<String, ChatError>);

/// Runs submitted turns on background tasks and collects their results.
pub struct TurnRunner {
    backend: Arc<dyn ChatBackend>,
    streams: ChatStreamService,
    stream_rx: mpsc::UnboundedReceiver<(StreamMessage, u64)>,
    reply_tx: mpsc::UnboundedSender<ReplyMessage>,
    reply_rx: mpsc::UnboundedReceiver<ReplyMessage>,
}

impl TurnRunner {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        let (streams, stream_rx) = ChatStreamService::new();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            streams,
            stream_rx,
            reply_tx,
            reply_rx,
        }
    }

    pub fn dispatch(&self, turn: PendingTurn) {
        match turn.mode {
            RequestMode::Streaming => {
                self.streams
                    .spawn_stream(Arc::clone(&self.backend), turn.request, turn.stream_id)
            }
            RequestMode::Blocking => {
                let backend = Arc::clone(&self.backend);
                let tx = self.reply_tx.clone();
                tokio::spawn(async move {
                    let result = backend.complete(&turn.request).await;
                    let _ = tx.send((turn.stream_id, result));
                });
            }
        }
    }

    /// Applies every result that has arrived. Returns true if anything did.
    pub fn drain(&mut self, session: &mut ChatSession) -> bool {
        let mut received = false;
        while let Ok((message, stream_id)) = self.stream_rx.try_recv() {
            session.apply_stream_message(stream_id, message);
            received = true;
        }
        while let Ok((stream_id, result)) = self.reply_rx.try_recv() {
            session.finish_blocking(stream_id, result);
            received = true;
        }
        received
    }
}

fn send_input(session: &mut ChatSession, state: &mut UiState, runner: &TurnRunner) {
    if let Some(turn) = session.submit(&state.input) {
        state.clear_input();
        state.scroll.jump_to_bottom();
        runner.dispatch(turn);
    }
}

async fn event_loop(
    terminal: &mut ChatTerminal,
    session: &mut ChatSession,
    state: &mut UiState,
    runner: &mut TurnRunner,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| ui(f, session, state))?;

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    match handle_key(session, state, key) {
                        KeyOutcome::Quit => return Ok(()),
                        KeyOutcome::Send => send_input(session, state, runner),
                        KeyOutcome::Continue => {}
                    }
                }
                Event::Paste(text) if !session.is_busy() => {
                    state.insert_str(&sanitize_text_input(&text));
                }
                _ => {}
            }
        }

        if runner.drain(session) {
            debug!(phase = ?session.phase(), "Applied backend results");
        }
        // Let background request tasks make progress between frames.
        tokio::task::yield_now().await;
    }
}

pub async fn run_chat(
    backend: Arc<dyn ChatBackend>,
    mut session: ChatSession,
    base_url: String,
) -> Result<(), Box<dyn Error>> {
    info!(%base_url, "Starting chat interface");
    let mut state = UiState::new(base_url);
    let mut runner = TurnRunner::new(backend);

    let mut terminal = setup_terminal()?;
    let result = event_loop(&mut terminal, &mut session, &mut state, &mut runner).await;
    restore_terminal(&mut terminal)?;
    info!(messages = session.store().len(), "Chat interface closed");
    result
}
