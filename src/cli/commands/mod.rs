pub mod config;
pub mod generate;
pub mod history;

/// Values accepted by every `--format` flag
pub const FORMATS: [&str; 3] = ["text", "json", "quiet"];
