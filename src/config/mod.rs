//! Process configuration.
//!
//! The upstream base URL is the only setting read from the environment
//! (`COINCAP_URL`, optionally via a `.env` file). Everything else is a
//! command-line flag with a default.

use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::upstream::DEFAULT_TIMEOUT;

/// Environment variable holding the upstream base URL.
pub const UPSTREAM_URL_ENV: &str = "COINCAP_URL";

/// Rejected configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("upstream URL must start with http:// or https://, got '{0}'")]
    InvalidUpstreamUrl(String),

    #[error("upstream timeout must be at least one second")]
    ZeroTimeout,
}

/// Caching gateway for a crypto asset list API
#[derive(Parser, Debug, Clone)]
#[command(name = "coingate")]
#[command(about = "Serves a crypto asset list from a 60-second cache in front of the upstream API")]
#[command(version)]
pub struct Config {
    /// Base URL of the upstream API; `/assets` is appended
    #[arg(long, env = UPSTREAM_URL_ENV, value_name = "URL")]
    pub upstream_url: String,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080", value_name = "ADDR")]
    pub listen: String,

    /// Path the asset list is served on
    #[arg(long, default_value = "/api/crypto", value_name = "PATH")]
    pub route: String,

    /// Upstream request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs(), value_name = "SECS")]
    pub upstream_timeout: u64,

    /// Collapse concurrent cache misses into one upstream call
    #[arg(long)]
    pub single_flight: bool,

    /// Log filter, e.g. `info` or `coingate=debug`
    #[arg(long, default_value = "info", value_name = "FILTER")]
    pub log_level: String,
}

impl Config {
    /// Loads `.env` if present, then parses the command line.
    ///
    /// Exits the process with usage text on bad arguments, like any clap
    /// program.
    pub fn load() -> Self {
        // A missing .env file is normal.
        let _ = dotenvy::dotenv();
        Self::parse()
    }

    /// Checks values clap cannot check on its own.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a non-HTTP upstream URL or a zero timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.upstream_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidUpstreamUrl(self.upstream_url.clone()));
        }
        if self.upstream_timeout == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("coingate").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_apply() {
        let config = parse(&["--upstream-url", "https://api.coincap.io/v2"]);
        assert_eq!(config.listen, "127.0.0.1:8080");
        assert_eq!(config.route, "/api/crypto");
        assert_eq!(config.upstream_timeout(), Duration::from_secs(30));
        assert!(!config.single_flight);
        assert_eq!(config.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--upstream-url",
            "http://localhost:9000",
            "--listen",
            "0.0.0.0:3000",
            "--route",
            "/assets",
            "--upstream-timeout",
            "5",
            "--single-flight",
        ]);
        assert_eq!(config.listen, "0.0.0.0:3000");
        assert_eq!(config.route, "/assets");
        assert_eq!(config.upstream_timeout(), Duration::from_secs(5));
        assert!(config.single_flight);
    }

    #[test]
    fn non_http_url_is_rejected() {
        let config = parse(&["--upstream-url", "ftp://example.com"]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUpstreamUrl(url)) if url == "ftp://example.com"
        ));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = parse(&["--upstream-url", "https://x", "--upstream-timeout", "0"]);
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTimeout)));
    }
}
