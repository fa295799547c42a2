//! TUI-less "say" command

use std::error::Error;
use std::io::{self, Write};

use crate::core::client::ChatBackend;
use crate::core::session::{ChatSession, TurnOutcome};

/// Sends one prompt and writes the reply to `out`, streamed fragments as
/// they arrive.
pub async fn say_once<W: Write>(
    session: &mut ChatSession,
    backend: &dyn ChatBackend,
    prompt: &str,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    let mut streamed = false;
    let mut write_error: Option<io::Error> = None;
    let outcome = session
        .run_turn(backend, prompt, |delta| {
            streamed = true;
            if write_error.is_some() {
                return;
            }
            if let Err(err) = out.write_all(delta.as_bytes()) {
                write_error = Some(err);
            } else if let Err(err) = out.flush() {
                write_error = Some(err);
            }
        })
        .await;

    // The first failed write wins over whatever the turn produced.
    if let Some(err) = write_error {
        return Err(err.into());
    }

    match outcome {
        TurnOutcome::Replied(reply) => {
            if !streamed {
                out.write_all(reply.as_bytes())?;
            }
            writeln!(out)?;
            Ok(())
        }
        TurnOutcome::Failed { error, salvaged } => {
            if salvaged.is_some() {
                writeln!(out)?;
            }
            Err(error.into())
        }
        TurnOutcome::NotSent => Err(session
            .error()
            .unwrap_or("Nothing to send")
            .to_string()
            .into()),
    }
}

pub async fn run_say(
    prompt: Vec<String>,
    mut session: ChatSession,
    backend: &dyn ChatBackend,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: charla say <prompt>");
        std::process::exit(1);
    }

    let mut stdout = io::stdout();
    if let Err(err) = say_once(&mut session, backend, &prompt, &mut stdout).await {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
    Ok(())
}
