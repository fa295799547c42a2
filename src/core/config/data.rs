use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::client::DEFAULT_BASE_URL;
use crate::core::settings::{
    parse_bool, parse_max_tokens, parse_temperature, Model, RequestSettings, SettingError,
    SettingsForm,
};

/// Environment variable that overrides the configured backend URL.
pub const BASE_URL_ENV: &str = "CHARLA_BASE_URL";

/// Keys accepted by `charla set` / `charla unset`.
pub const CONFIG_KEYS: [&str; 6] = [
    "base-url",
    "model",
    "temperature",
    "max-tokens",
    "streaming",
    "log-file",
];

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Root URL of the chat backend; `/chat` and `/chat/stream` hang off it
    pub base_url: Option<String>,
    pub model: Option<Model>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    /// Use the streaming endpoint by default
    pub streaming: Option<bool>,
    /// Where the terminal UI writes its logs
    pub log_file: Option<String>,
}

fn canonical_key(key: &str) -> String {
    key.trim().to_ascii_lowercase().replace('_', "-")
}

fn validate_base_url(value: &str) -> Result<String, SettingError> {
    let trimmed = value.trim();
    let has_host = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .is_some_and(|rest| !rest.trim_matches('/').is_empty());
    if has_host {
        Ok(trimmed.to_string())
    } else {
        Err(SettingError::InvalidUrl(value.to_string()))
    }
}

impl Config {
    /// Validates and stores one value. Numeric values are range-checked the
    /// same way the settings controls are before a request.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), SettingError> {
        match canonical_key(key).as_str() {
            "base-url" => self.base_url = Some(validate_base_url(value)?),
            "model" => self.model = Some(value.parse()?),
            "temperature" => self.temperature = Some(parse_temperature(value)?),
            "max-tokens" => self.max_tokens = Some(parse_max_tokens(value)?),
            "streaming" => self.streaming = Some(parse_bool(value)?),
            "log-file" => {
                let path = value.trim();
                if path.is_empty() {
                    return Err(SettingError::EmptyValue(key.to_string()));
                }
                self.log_file = Some(path.to_string());
            }
            _ => return Err(SettingError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    pub fn unset_value(&mut self, key: &str) -> Result<(), SettingError> {
        match canonical_key(key).as_str() {
            "base-url" => self.base_url = None,
            "model" => self.model = None,
            "temperature" => self.temperature = None,
            "max-tokens" => self.max_tokens = None,
            "streaming" => self.streaming = None,
            "log-file" => self.log_file = None,
            _ => return Err(SettingError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// Settings controls seeded from the file, with defaults for unset keys.
    pub fn settings_form(&self) -> SettingsForm {
        let defaults = RequestSettings::default();
        SettingsForm::from(RequestSettings {
            model: self.model.unwrap_or(defaults.model),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            use_streaming: self.streaming.unwrap_or(defaults.use_streaming),
        })
    }

    /// Picks the backend URL: command line, then environment, then file.
    pub fn resolve_base_url(&self, cli: Option<&str>, env: Option<&str>) -> String {
        [cli, env, self.base_url.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|url| !url.is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
            .to_string()
    }

    pub fn resolve_log_file(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string).or_else(|| self.log_file.clone())
    }
}

pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
