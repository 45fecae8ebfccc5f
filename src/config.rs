//! Configuration and CLI argument handling

use std::path::PathBuf;
use clap::Parser;

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "slide-timer")]
#[command(about = "A presentation countdown that keeps running while its window is closed")]
#[command(version)]
pub struct Config {
    /// Port to bind the message server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// File holding the persisted presentation state
    #[arg(long, default_value = "slide-timer-state.json")]
    pub state_file: PathBuf,

    /// Keep state in memory only
    #[arg(long)]
    pub ephemeral: bool,

    /// Background wake-up period in minutes
    #[arg(short, long, default_value = "1")]
    pub wake_interval: u64,

    /// Run without the console surface
    #[arg(long)]
    pub headless: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["slide-timer"]).unwrap();
        assert_eq!(config.address(), "127.0.0.1:20554");
        assert_eq!(config.state_file, PathBuf::from("slide-timer-state.json"));
        assert_eq!(config.wake_interval, 1);
        assert!(!config.ephemeral);
        assert!(!config.headless);
        assert_eq!(config.log_level(), "info");
    }

    #[test]
    fn test_flags() {
        let config = Config::try_parse_from([
            "slide-timer",
            "--port",
            "9000",
            "--ephemeral",
            "--headless",
            "--wake-interval",
            "2",
            "-v",
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert!(config.ephemeral);
        assert!(config.headless);
        assert_eq!(config.wake_interval, 2);
        assert_eq!(config.log_level(), "debug");
    }

    #[test]
    fn test_rejects_bad_port() {
        assert!(Config::try_parse_from(["slide-timer", "--port", "seventy"]).is_err());
    }
}
