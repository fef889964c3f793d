//! Configuration for the Auzolan CLI.
//!
//! CLI arguments and environment variable handling using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Auzolan - community help-exchange client
#[derive(Parser, Debug, Clone)]
#[command(name = "auzolan")]
#[command(about = "Client for the Auzolan community help-exchange API")]
pub struct Args {
    /// Base URL of the backend API
    #[arg(long, env = "API_URL", default_value = "http://localhost:8000/api")]
    pub api_url: String,

    /// File holding the persisted session state (tokens and community)
    #[arg(long, env = "STATE_FILE", default_value = ".auzolan.json")]
    pub state_file: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Log in and persist the session
    Login {
        email: String,
        password: String,
    },
    /// Clear the persisted session
    Logout,
    /// Show the current identity and community selection
    Me,
    /// List communities, or switch the current one
    Communities {
        /// Switch to this community id
        #[arg(long)]
        switch: Option<i64>,
        /// Join this community id
        #[arg(long)]
        join: Option<i64>,
    },
    /// List help requests in the current community
    Requests {
        /// Filter by status (open, in_progress, resolved, cancelled)
        #[arg(long)]
        status: Option<String>,
        /// Only my own requests
        #[arg(long)]
        mine: bool,
    },
    /// Show one help request with its capability flags
    Request { id: i64 },
    /// List offers on a request
    Offers { request_id: i64 },
    /// List loan items in the current community
    Loans {
        /// Only my own items
        #[arg(long)]
        mine: bool,
    },
    /// List reports (managers only)
    Reports {
        /// Filter by status (open, in_review, closed)
        #[arg(long)]
        status: Option<String>,
    },
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(format!("API_URL must be an http(s) URL, got {}", self.api_url));
        }
        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(api_url: &str, timeout: u64) -> Args {
        Args {
            api_url: api_url.to_string(),
            state_file: PathBuf::from(".auzolan.json"),
            log_level: "info".to_string(),
            request_timeout_ms: timeout,
            command: Command::Me,
        }
    }

    #[test]
    fn validate_rejects_bad_url_and_zero_timeout() {
        assert!(args("http://localhost:8000/api", 30000).validate().is_ok());
        assert!(args("localhost:8000", 30000).validate().is_err());
        assert!(args("http://localhost:8000/api", 0).validate().is_err());
    }
}
