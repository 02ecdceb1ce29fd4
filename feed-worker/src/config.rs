//! Configuration module for environment variable parsing.
//!
//! Process-level settings (endpoints, ports, file paths) come from the
//! environment. Queue behavior (interval, date forwarding, dedup cleanup)
//! comes from the store's config file, see `QueueConfig`.

use std::env;
use std::time::Duration;

use tracing::warn;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// URL the post publisher POSTs payloads to
    pub publisher_url: String,

    /// Optional bearer token for the post publisher
    pub publisher_token: Option<String>,

    /// Per-request timeout for the post publisher in milliseconds
    pub publisher_timeout_ms: u64,

    /// Path of the queue config file read by the store
    pub config_path: String,

    /// Path of the store state file (last published date, dedup history)
    pub state_path: String,

    /// Port for the intake web server to listen on
    pub port: u16,

    /// Shared key for HMAC signatures on `POST /items`
    pub intake_signing_key: Option<String>,

    /// Maximum age in seconds for signed intake timestamps
    pub intake_signature_max_age: u64,

    /// Optional RabbitMQ connection URL (CloudAMQP) for the AMQP intake
    pub cloudamqp_url: Option<String>,

    /// Language tags applied to items that arrive without any
    pub default_languages: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            publisher_url: env::var("PUBLISHER_URL")
                .unwrap_or_else(|_| "http://localhost:3000/posts".to_string()),

            publisher_token: non_empty_var("PUBLISHER_TOKEN"),

            publisher_timeout_ms: parse_var("PUBLISHER_TIMEOUT_MS", 10_000),

            config_path: env::var("FEEDPOST_CONFIG_PATH")
                .unwrap_or_else(|_| "config.json".to_string()),

            state_path: env::var("FEEDPOST_STATE_PATH")
                .unwrap_or_else(|_| "state.json".to_string()),

            port: parse_var("PORT", 8080),

            intake_signing_key: non_empty_var("INTAKE_SIGNING_KEY"),

            intake_signature_max_age: parse_var("INTAKE_SIGNATURE_MAX_AGE", 300), // 5 minutes default

            cloudamqp_url: non_empty_var("CLOUDAMQP_URL"),

            default_languages: parse_csv("DEFAULT_LANGUAGES")
                .filter(|langs| !langs.is_empty())
                .unwrap_or_else(|| vec!["en".to_string()]),
        }
    }

    pub fn publisher_timeout(&self) -> Duration {
        Duration::from_millis(self.publisher_timeout_ms)
    }
}

/// Parse a numeric variable, warning and falling back on malformed values.
fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a comma-separated list of strings.
fn parse_csv(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}
