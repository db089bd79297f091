//! Process-wide configuration for the knocker relay.
//!
//! Every option here is immutable once the process has started, except
//! through the test-only [`Config::update`] escape hatch. Values come from
//! environment variables (see [`Config::from_env`]) with documented
//! defaults, mirroring the behavior of the original `knocker.config` module:
//! any upper-case environment variable matching a field name overrides it,
//! parsed as JSON with a raw-string fallback.

pub mod settings;

pub use settings::{Config, Scheme};
