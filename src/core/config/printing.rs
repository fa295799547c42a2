use crate::core::config::data::Config;
use std::fmt::Display;

fn show<T: Display>(value: Option<T>) -> String {
    value
        .map(|value| value.to_string())
        .unwrap_or_else(|| "(unset)".to_string())
}

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        println!("  base-url: {}", show(self.base_url.as_deref()));
        println!("  model: {}", show(self.model));
        println!("  temperature: {}", show(self.temperature));
        println!("  max-tokens: {}", show(self.max_tokens));
        match self.streaming {
            Some(true) => println!("  streaming: on"),
            Some(false) => println!("  streaming: off"),
            None => println!("  streaming: (unset)"),
        }
        println!("  log-file: {}", show(self.log_file.as_deref()));
    }
}
