pub mod data;
pub mod io;
pub mod printing;

pub use data::{Config, BASE_URL_ENV};
pub use io::ConfigError;
