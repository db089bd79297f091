use serde::{Deserialize, Serialize};
use std::env;

/// Target scheme for a relayed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "http" => Some(Scheme::Http),
            "https" => Some(Scheme::Https),
            _ => None,
        }
    }
}

/// Process-wide immutable configuration for the relay pipeline.
///
/// Loaded once at startup via [`Config::from_env`]. Tests that need a
/// variant configuration should build their own `Config` value (or clone
/// and mutate one via [`Config::update`]) rather than touching process
/// environment, which is shared global state.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default target scheme applied when `knocker-scheme` is absent.
    pub scheme: Scheme,
    /// Default per-attempt timeout, in seconds.
    pub timeout: f64,
    /// Ceiling a caller's `knocker-timeout` may not exceed.
    pub timeout_max: f64,
    /// Default retry count applied when `knocker-retries` is absent.
    pub retries: u32,
    /// Ceiling a caller's `knocker-retries` may not exceed.
    pub retries_max: u32,
    /// Default backoff base applied when `knocker-backoff-factor` is absent.
    pub backoff_factor: f64,
    /// Ceiling for both the configured backoff base and any computed delay.
    pub backoff_factor_max: f64,
    /// Maximum redirects the shared HTTP client will follow.
    pub max_redirects: usize,
    /// Path that serves operational status instead of being relayed.
    pub status_url: String,
    /// Non-empty allow-list restricting which target hosts may be relayed to.
    pub hosts_only: Vec<String>,
    /// Optional DSN for the error reporter sink.
    pub sentry_dsn: Option<String>,
    /// Whether a final relay failure (after retries) is also reported.
    pub sentry_failed_requests: bool,
    /// Bind address for the HTTP server.
    pub host: String,
    /// Bind port for the HTTP server.
    pub port: u16,
    /// Default log level, used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheme: Scheme::Https,
            timeout: 10.0,
            timeout_max: 60.0,
            retries: 2,
            retries_max: 10,
            backoff_factor: 0.5,
            backoff_factor_max: 600.0,
            max_redirects: 10,
            status_url: "/knocker/status".to_string(),
            hosts_only: Vec::new(),
            sentry_dsn: None,
            sentry_failed_requests: false,
            host: "0.0.0.0".to_string(),
            port: 5900,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from defaults overridden by environment variables.
    ///
    /// Each field may be overridden by an environment variable of the same
    /// upper-case name (e.g. `TIMEOUT`, `HOSTS_ONLY`, `SENTRY_DSN`). The
    /// value is parsed as JSON first; if that fails it is taken as a raw
    /// string (this lets `SCHEME=http` work without quoting while still
    /// allowing `HOSTS_ONLY=["a.com","b.com"]`).
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_str("SCHEME") {
            if let Some(scheme) = Scheme::parse(&v) {
                config.scheme = scheme;
            } else {
                log::warn!("ignoring invalid SCHEME override: {}", v);
            }
        }
        if let Some(v) = env_json::<f64>("TIMEOUT") {
            config.timeout = v;
        }
        if let Some(v) = env_json::<f64>("TIMEOUT_MAX") {
            config.timeout_max = v;
        }
        if let Some(v) = env_json::<u32>("RETRIES") {
            config.retries = v;
        }
        if let Some(v) = env_json::<u32>("RETRIES_MAX") {
            config.retries_max = v;
        }
        if let Some(v) = env_json::<f64>("BACKOFF_FACTOR") {
            config.backoff_factor = v;
        }
        if let Some(v) = env_json::<f64>("BACKOFF_FACTOR_MAX") {
            config.backoff_factor_max = v;
        }
        if let Some(v) = env_json::<usize>("MAX_REDIRECTS") {
            config.max_redirects = v;
        }
        if let Some(v) = env_str("STATUS_URL") {
            config.status_url = v;
        }
        if let Some(v) = env_json::<Vec<String>>("HOSTS_ONLY") {
            config.hosts_only = v;
        }
        if let Some(v) = env_str("SENTRY_DSN") {
            config.sentry_dsn = if v.is_empty() { None } else { Some(v) };
        }
        if let Some(v) = env_json::<bool>("SENTRY_FAILED_REQUESTS") {
            config.sentry_failed_requests = v;
        }
        if let Some(v) = env_str("HOST") {
            config.host = v;
        }
        if let Some(v) = env_json::<u16>("PORT") {
            config.port = v;
        }
        if let Some(v) = env_str("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }

    /// Returns a copy of this configuration with the given mutation applied.
    ///
    /// Exists for tests that need a one-off variant of process configuration
    /// without touching real environment variables or the shared default.
    pub fn update(&self, f: impl FnOnce(&mut Config)) -> Config {
        let mut next = self.clone();
        f(&mut next);
        next
    }
}

fn env_str(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn env_json<T: serde::de::DeserializeOwned + std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    serde_json::from_str(&raw)
        .ok()
        .or_else(|| raw.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.scheme, Scheme::Https);
        assert_eq!(config.retries, 2);
        assert_eq!(config.retries_max, 10);
        assert_eq!(config.status_url, "/knocker/status");
        assert!(config.hosts_only.is_empty());
    }

    #[test]
    fn update_clones_and_mutates() {
        let base = Config::default();
        let variant = base.update(|c| {
            c.hosts_only = vec!["test.com".to_string()];
            c.retries = 5;
        });
        assert_eq!(base.retries, 2);
        assert_eq!(variant.retries, 5);
        assert_eq!(variant.hosts_only, vec!["test.com".to_string()]);
    }

    #[test]
    fn scheme_parse_is_case_insensitive() {
        assert_eq!(Scheme::parse("HTTP"), Some(Scheme::Http));
        assert_eq!(Scheme::parse("https"), Some(Scheme::Https));
        assert_eq!(Scheme::parse("ftp"), None);
    }
}
