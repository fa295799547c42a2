//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod say;

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::cli::say::run_say;
use crate::core::client::HttpChatBackend;
use crate::core::config::data::path_display;
use crate::core::config::{Config, BASE_URL_ENV};
use crate::core::session::ChatSession;
use crate::core::settings::{SettingError, SettingsForm};
use crate::ui::chat_loop::run_chat;
use crate::utils::logging::{init_logging, LogTarget};

#[derive(Parser, Debug)]
#[command(name = "charla", version)]
#[command(about = "A terminal chat client for a hosted chat backend")]
#[command(
    long_about = "Charla is a full-screen terminal chat interface for a chat backend that \
exposes /chat and /chat/stream. Replies arrive whole or streamed fragment by fragment.\n\n\
Environment Variables:\n\
  CHARLA_BASE_URL   Backend URL (overridden by --base-url)\n\
  RUST_LOG          Log filter (default: charla=info)\n\n\
Controls:\n\
  Enter             Send the message\n\
  F2                Show or hide the settings panel\n\
  Esc               Close the error banner\n\
  PageUp/PageDown   Scroll through the conversation\n\
  Ctrl+C            Quit the application"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model to request (gpt-4 or gpt-3.5-turbo)
    #[arg(short = 'm', long, global = true)]
    pub model: Option<String>,

    /// Sampling temperature between 0 and 1
    #[arg(short = 't', long, global = true, allow_hyphen_values = true)]
    pub temperature: Option<String>,

    /// Upper bound on reply length, 100 to 4000
    #[arg(long, global = true, allow_hyphen_values = true)]
    pub max_tokens: Option<String>,

    /// Receive replies through the streaming endpoint
    #[arg(long, global = true, overrides_with = "no_stream")]
    pub stream: bool,

    /// Wait for whole replies
    #[arg(long, global = true, overrides_with = "stream")]
    pub no_stream: bool,

    /// Backend URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Write diagnostic logs to the given file
    #[arg(short = 'l', long, global = true)]
    pub log: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the chat interface (default)
    Chat,
    /// Send a single prompt and print the reply
    Say {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// Set a configuration value
    Set {
        /// One of: base-url, model, temperature, max-tokens, streaming, log-file
        key: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset a configuration value
    Unset { key: String },
    /// Show the configuration file and its values
    Config,
}

impl Args {
    /// Settings controls for this run: file values overlaid with flags.
    pub fn settings_form(&self, config: &Config) -> Result<SettingsForm, SettingError> {
        let mut form = config.settings_form();
        if let Some(model) = &self.model {
            form.set("model", model)?;
        }
        if let Some(temperature) = &self.temperature {
            form.set("temperature", temperature)?;
        }
        if let Some(max_tokens) = &self.max_tokens {
            form.set("max-tokens", max_tokens)?;
        }
        if self.stream {
            form.use_streaming = true;
        } else if self.no_stream {
            form.use_streaming = false;
        }
        Ok(form)
    }

    pub fn base_url(&self, config: &Config) -> String {
        let env = std::env::var(BASE_URL_ENV).ok();
        config.resolve_base_url(self.base_url.as_deref(), env.as_deref())
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async_main())
}

fn exit_with(err: impl std::fmt::Display) -> ! {
    eprintln!("❌ {err}");
    std::process::exit(1);
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    match args.command.as_ref().unwrap_or(&Commands::Chat) {
        Commands::Set { key, value } => {
            let mut config = Config::load()?;
            if value.is_empty() {
                config.print_all();
                return Ok(());
            }
            let value = value.join(" ");
            if let Err(err) = config.set_value(key, &value) {
                exit_with(err);
            }
            config.save()?;
            println!("✅ Set {key} to: {value}");
            Ok(())
        }
        Commands::Unset { key } => {
            let mut config = Config::load()?;
            if let Err(err) = config.unset_value(key) {
                exit_with(err);
            }
            config.save()?;
            println!("✅ Unset {key}");
            Ok(())
        }
        Commands::Config => {
            let path = Config::config_path()?;
            println!("Config file: {}", path_display(&path));
            Config::load_from_path(&path)?.print_all();
            Ok(())
        }
        Commands::Say { prompt } => {
            let config = Config::load()?;
            let log_file = config.resolve_log_file(args.log.as_deref());
            match log_file.as_deref() {
                Some(path) => init_logging(LogTarget::File(Path::new(path)))?,
                None => init_logging(LogTarget::Stderr)?,
            }
            let form = args.settings_form(&config).unwrap_or_else(|err| exit_with(err));
            let backend = HttpChatBackend::new(args.base_url(&config));
            debug!(base_url = backend.base_url(), "Sending one-shot prompt");
            run_say(prompt.clone(), ChatSession::new(form), &backend).await
        }
        Commands::Chat => {
            let config = Config::load()?;
            let log_file = config.resolve_log_file(args.log.as_deref());
            match log_file.as_deref() {
                Some(path) => init_logging(LogTarget::File(Path::new(path)))?,
                None => init_logging(LogTarget::Disabled)?,
            }
            let form = args.settings_form(&config).unwrap_or_else(|err| exit_with(err));
            let base_url = args.base_url(&config);
            let backend = Arc::new(HttpChatBackend::new(base_url.clone()));
            run_chat(backend, ChatSession::new(form), base_url).await
        }
    }
}
