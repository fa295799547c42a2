//! Request settings and the string-typed form controls that edit them.
//!
//! UI controls (and the command line) hand over text. The form keeps that
//! text as-is and only coerces it into [`RequestSettings`] when a request is
//! about to be sent.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const MIN_TEMPERATURE: f64 = 0.0;
pub const MAX_TEMPERATURE: f64 = 1.0;
pub const MIN_MAX_TOKENS: u32 = 100;
pub const MAX_MAX_TOKENS: u32 = 4000;
pub const TEMPERATURE_STEP: f64 = 0.1;
pub const MAX_TOKENS_STEP: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Model {
    #[default]
    #[serde(rename = "gpt-4")]
    Gpt4,
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
}

impl Model {
    pub const ALL: [Model; 2] = [Model::Gpt4, Model::Gpt35Turbo];

    pub fn as_str(self) -> &'static str {
        match self {
            Model::Gpt4 => "gpt-4",
            Model::Gpt35Turbo => "gpt-3.5-turbo",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Model::Gpt4 => "GPT-4",
            Model::Gpt35Turbo => "GPT-3.5 Turbo",
        }
    }

    pub fn next(self) -> Model {
        match self {
            Model::Gpt4 => Model::Gpt35Turbo,
            Model::Gpt35Turbo => Model::Gpt4,
        }
    }
}

impl std::str::FromStr for Model {
    type Err = SettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Model::ALL
            .into_iter()
            .find(|model| model.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| SettingError::UnknownModel(trimmed.to_string()))
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed settings read by the response client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestSettings {
    pub model: Model,
    pub temperature: f64,
    pub max_tokens: u32,
    pub use_streaming: bool,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            model: Model::default(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            use_streaming: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettingError {
    UnknownKey(String),
    UnknownModel(String),
    InvalidNumber {
        key: &'static str,
        input: String,
    },
    OutOfRange {
        key: &'static str,
        input: String,
        min: String,
        max: String,
    },
    InvalidBoolean(String),
    InvalidUrl(String),
    EmptyValue(String),
}

impl fmt::Display for SettingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingError::UnknownKey(key) => write!(f, "Unknown setting: {key}"),
            SettingError::UnknownModel(input) => write!(
                f,
                "Unknown model: {input} (expected {} or {})",
                Model::Gpt4,
                Model::Gpt35Turbo
            ),
            SettingError::InvalidNumber { key, input } => {
                write!(f, "Invalid {key}: '{input}' is not a number")
            }
            SettingError::OutOfRange {
                key,
                input,
                min,
                max,
            } => write!(f, "Invalid {key}: {input} is outside {min}..={max}"),
            SettingError::InvalidBoolean(input) => write!(
                f,
                "Invalid boolean value: {input} (use on/off, true/false or yes/no)"
            ),
            SettingError::EmptyValue(key) => write!(f, "No value given for {key}"),
            SettingError::InvalidUrl(input) => {
                write!(f, "Invalid base URL: {input} (expected http:// or https://)")
            }
        }
    }
}

impl std::error::Error for SettingError {}

pub fn parse_bool(input: &str) -> Result<bool, SettingError> {
    match input.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(SettingError::InvalidBoolean(input.to_string())),
    }
}

pub fn parse_temperature(input: &str) -> Result<f64, SettingError> {
    let trimmed = input.trim();
    let value: f64 = trimmed.parse().map_err(|_| SettingError::InvalidNumber {
        key: "temperature",
        input: input.to_string(),
    })?;
    if !value.is_finite() || !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&value) {
        return Err(SettingError::OutOfRange {
            key: "temperature",
            input: trimmed.to_string(),
            min: MIN_TEMPERATURE.to_string(),
            max: MAX_TEMPERATURE.to_string(),
        });
    }
    Ok(value)
}

pub fn parse_max_tokens(input: &str) -> Result<u32, SettingError> {
    let trimmed = input.trim();
    let value: i64 = trimmed.parse().map_err(|_| SettingError::InvalidNumber {
        key: "max_tokens",
        input: input.to_string(),
    })?;
    if !(i64::from(MIN_MAX_TOKENS)..=i64::from(MAX_MAX_TOKENS)).contains(&value) {
        return Err(SettingError::OutOfRange {
            key: "max_tokens",
            input: trimmed.to_string(),
            min: MIN_MAX_TOKENS.to_string(),
            max: MAX_MAX_TOKENS.to_string(),
        });
    }
    Ok(value as u32)
}

fn format_temperature(value: f64) -> String {
    format!("{value:.1}")
}

/// The settings controls as the user edits them.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsForm {
    pub model: Model,
    pub temperature: String,
    pub max_tokens: String,
    pub use_streaming: bool,
}

impl Default for SettingsForm {
    fn default() -> Self {
        Self::from(RequestSettings::default())
    }
}

impl From<RequestSettings> for SettingsForm {
    fn from(settings: RequestSettings) -> Self {
        Self {
            model: settings.model,
            temperature: settings.temperature.to_string(),
            max_tokens: settings.max_tokens.to_string(),
            use_streaming: settings.use_streaming,
        }
    }
}

impl SettingsForm {
    /// Coerces the controls into typed settings.
    pub fn resolve(&self) -> Result<RequestSettings, SettingError> {
        Ok(RequestSettings {
            model: self.model,
            temperature: parse_temperature(&self.temperature)?,
            max_tokens: parse_max_tokens(&self.max_tokens)?,
            use_streaming: self.use_streaming,
        })
    }

    /// Stores a raw control value. Numeric values are kept as text; only the
    /// model and the streaming flag are interpreted here.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingError> {
        match key {
            "model" => self.model = value.parse()?,
            "temperature" => self.temperature = value.to_string(),
            "max-tokens" | "max_tokens" => self.max_tokens = value.to_string(),
            "streaming" | "stream" => self.use_streaming = parse_bool(value)?,
            other => return Err(SettingError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    pub fn cycle_model(&mut self) {
        self.model = self.model.next();
    }

    pub fn toggle_streaming(&mut self) {
        self.use_streaming = !self.use_streaming;
    }

    /// Moves the temperature like a slider with 0.1 steps, clamped to range.
    /// Unparseable text restarts from the default.
    pub fn nudge_temperature(&mut self, steps: i32) {
        let current = parse_temperature(&self.temperature).unwrap_or(DEFAULT_TEMPERATURE);
        let next = (current + f64::from(steps) * TEMPERATURE_STEP)
            .clamp(MIN_TEMPERATURE, MAX_TEMPERATURE);
        self.temperature = format_temperature(next);
    }

    pub fn nudge_max_tokens(&mut self, steps: i32) {
        let current = parse_max_tokens(&self.max_tokens).unwrap_or(DEFAULT_MAX_TOKENS);
        let next = (i64::from(current) + i64::from(steps) * i64::from(MAX_TOKENS_STEP))
            .clamp(i64::from(MIN_MAX_TOKENS), i64::from(MAX_MAX_TOKENS));
        self.max_tokens = next.to_string();
    }
}
