//! Validates and defaults the per-request `knocker-*` directives.
//!
//! This is the Rust analogue of the original `knocker.schemas` marshmallow
//! schema: a pure function from a bag of header values to a fully-defaulted
//! [`RequestConfig`], or a [`crate::models::error::DirectiveErrors`] naming
//! every invalid field at once (not just the first).

use std::collections::BTreeMap;

use serde::Serialize;
use url::Url;
use uuid::Uuid;

use crate::config::{Config, Scheme};
use crate::models::error::{DirectiveErrors, GatewayError};

/// A validated, fully-defaulted set of relay directives.
///
/// Every field here was produced by [`RequestConfig::from_directives`] — no
/// field is ever mutated after load. Unrecognized `knocker-*` headers are
/// retained verbatim in `passthrough` and round-trip into the callback
/// payload without being otherwise interpreted.
#[derive(Debug, Clone, Serialize)]
pub struct RequestConfig {
    pub host: String,
    pub scheme: Scheme,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback: Option<Url>,
    pub id: String,
    pub timeout: f64,
    pub retries: u32,
    pub backoff_factor: f64,
    #[serde(flatten)]
    pub passthrough: BTreeMap<String, String>,
}

const KNOWN_DIRECTIVES: &[&str] = &[
    "knocker-host",
    "knocker-scheme",
    "knocker-callback",
    "knocker-id",
    "knocker-timeout",
    "knocker-retries",
    "knocker-backoff-factor",
];

impl RequestConfig {
    /// Validates `directives` (lower-cased `knocker-*` header name/value
    /// pairs) against `config`, producing a defaulted `RequestConfig` or the
    /// full set of per-field errors.
    pub fn from_directives(
        directives: &[(String, String)],
        config: &Config,
    ) -> Result<Self, GatewayError> {
        let mut errors = DirectiveErrors::new();
        let get = |name: &str| directives.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str());

        let host = match get("knocker-host") {
            Some(raw) => {
                let stripped = strip_scheme_prefix(raw);
                if !config.hosts_only.is_empty() && !config.hosts_only.iter().any(|h| h == stripped) {
                    errors.push("knocker-host", format!("host '{}' is not in the allow-list", stripped));
                }
                stripped.to_string()
            }
            None => {
                errors.push("knocker-host", "required field");
                String::new()
            }
        };

        let scheme = match get("knocker-scheme") {
            Some(raw) => match Scheme::parse(raw) {
                Some(s) => s,
                None => {
                    errors.push("knocker-scheme", format!("must be one of http, https, got '{}'", raw));
                    config.scheme
                }
            },
            None => config.scheme,
        };

        let callback = match get("knocker-callback") {
            Some(raw) => match Url::parse(raw) {
                Ok(url) => Some(url),
                Err(e) => {
                    errors.push("knocker-callback", format!("invalid URL: {}", e));
                    None
                }
            },
            None => None,
        };

        let id = get("knocker-id")
            .map(|s| s.to_string())
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

        let timeout = parse_ranged(get("knocker-timeout"), config.timeout, 0.0, config.timeout_max, "knocker-timeout", &mut errors);
        let retries = parse_ranged_int(get("knocker-retries"), config.retries, 0, config.retries_max, "knocker-retries", &mut errors);
        let backoff_factor = parse_ranged(
            get("knocker-backoff-factor"),
            config.backoff_factor,
            0.0,
            config.backoff_factor_max,
            "knocker-backoff-factor",
            &mut errors,
        );

        let passthrough = directives
            .iter()
            .filter(|(name, _)| name.starts_with("knocker-") && !KNOWN_DIRECTIVES.contains(&name.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if !errors.is_empty() {
            return Err(GatewayError::Directive(errors));
        }

        Ok(RequestConfig {
            host,
            scheme,
            callback,
            id,
            timeout,
            retries,
            backoff_factor,
            passthrough,
        })
    }

    /// Returns a copy of this config with `callback` removed, for use as the
    /// `config` field of the callback's own relay so it cannot chain.
    pub fn without_callback(&self) -> RequestConfig {
        RequestConfig {
            callback: None,
            ..self.clone()
        }
    }
}

fn strip_scheme_prefix(host: &str) -> &str {
    host.strip_prefix("https://")
        .or_else(|| host.strip_prefix("http://"))
        .unwrap_or(host)
}

fn parse_ranged(
    raw: Option<&str>,
    default: f64,
    min: f64,
    max: f64,
    field: &str,
    errors: &mut DirectiveErrors,
) -> f64 {
    let value = match raw {
        None => default,
        Some(s) => match s.parse::<f64>() {
            Ok(v) => v,
            Err(_) => {
                errors.push(field, format!("'{}' is not a number", s));
                return default;
            }
        },
    };
    if value < min || value > max {
        errors.push(field, format!("must be in range [{}, {}]", min, max));
    }
    value
}

fn parse_ranged_int(
    raw: Option<&str>,
    default: u32,
    min: u32,
    max: u32,
    field: &str,
    errors: &mut DirectiveErrors,
) -> u32 {
    let value = match raw {
        None => default,
        Some(s) => match s.parse::<u32>() {
            Ok(v) => v,
            Err(_) => {
                errors.push(field, format!("'{}' is not an integer", s));
                return default;
            }
        },
    };
    if value < min || value > max {
        errors.push(field, format!("must be in range [{}, {}]", min, max));
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dirs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn p1_directive_defaulting() {
        let config = Config::default();
        let rc = RequestConfig::from_directives(&dirs(&[("knocker-host", "test.com")]), &config).unwrap();
        assert_eq!(rc.scheme, config.scheme);
        assert_eq!(rc.retries, config.retries);
        assert_eq!(rc.timeout, config.timeout);
        assert_eq!(rc.backoff_factor, config.backoff_factor);
        assert!(rc.callback.is_none());
        assert_eq!(rc.id.len(), 32);
        assert!(rc.id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn p2_host_allow_list() {
        let config = Config::default().update(|c| {
            c.hosts_only = vec!["a.com".to_string(), "b.com".to_string()];
        });

        let ok = RequestConfig::from_directives(&dirs(&[("knocker-host", "a.com")]), &config);
        assert!(ok.is_ok());

        let err = RequestConfig::from_directives(&dirs(&[("knocker-host", "evil.com")]), &config);
        match err {
            Err(GatewayError::Directive(errors)) => assert!(errors.0.contains_key("knocker-host")),
            other => panic!("expected directive error, got {:?}", other),
        }
    }

    #[test]
    fn p3_scheme_stripping() {
        let config = Config::default();
        let https = RequestConfig::from_directives(&dirs(&[("knocker-host", "https://x.com")]), &config).unwrap();
        let http = RequestConfig::from_directives(&dirs(&[("knocker-host", "http://x.com")]), &config).unwrap();
        assert_eq!(https.host, "x.com");
        assert_eq!(http.host, "x.com");
    }

    #[test]
    fn missing_host_is_an_error() {
        let config = Config::default();
        let err = RequestConfig::from_directives(&dirs(&[]), &config);
        match err {
            Err(GatewayError::Directive(errors)) => assert!(errors.0.contains_key("knocker-host")),
            other => panic!("expected directive error, got {:?}", other),
        }
    }

    #[test]
    fn out_of_range_timeout_is_rejected() {
        let config = Config::default();
        let err = RequestConfig::from_directives(
            &dirs(&[("knocker-host", "x.com"), ("knocker-timeout", "999")]),
            &config,
        );
        match err {
            Err(GatewayError::Directive(errors)) => assert!(errors.0.contains_key("knocker-timeout")),
            other => panic!("expected directive error, got {:?}", other),
        }
    }

    #[test]
    fn unknown_knocker_headers_pass_through() {
        let config = Config::default();
        let rc = RequestConfig::from_directives(
            &dirs(&[("knocker-host", "x.com"), ("knocker-custom", "abc")]),
            &config,
        )
        .unwrap();
        assert_eq!(rc.passthrough.get("knocker-custom"), Some(&"abc".to_string()));
    }

    #[test]
    fn without_callback_clears_only_callback() {
        let config = Config::default();
        let rc = RequestConfig::from_directives(
            &dirs(&[("knocker-host", "x.com"), ("knocker-callback", "https://cb.example/hook")]),
            &config,
        )
        .unwrap();
        assert!(rc.callback.is_some());
        let stripped = rc.without_callback();
        assert!(stripped.callback.is_none());
        assert_eq!(stripped.id, rc.id);
    }
}
