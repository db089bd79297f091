//! Pluggable sink for relay failures that exhaust their retries.
//!
//! The original service wires Sentry in behind `SENTRY_DSN` /
//! `SENTRY_FAILED_REQUESTS`; this crate keeps the same seam (an interface
//! independent of any particular reporting backend) but only ships a
//! logging implementation, since adding a real Sentry client is outside
//! this crate's scope.

use std::fmt;

/// A relay attempt that will not be retried further.
pub struct RelayFailure<'a> {
    pub id: &'a str,
    pub url: &'a str,
    pub attempts: u32,
    pub error: &'a (dyn std::error::Error + Send + Sync),
}

impl fmt::Display for RelayFailure<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "relay {} to {} failed after {} attempt(s): {}",
            self.id, self.url, self.attempts, self.error
        )
    }
}

/// Reports terminal relay failures. Implementations must not block the
/// caller for long — they run inline in the supervised relay task.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, failure: RelayFailure<'_>);
}

/// Reports nothing. Used when no DSN is configured.
pub struct NoopErrorReporter;

impl ErrorReporter for NoopErrorReporter {
    fn report(&self, _failure: RelayFailure<'_>) {}
}

/// Reports terminal failures via the `log` facade at `error` level.
///
/// Stands in for the Sentry transport named in configuration: the seam
/// (`ErrorReporter`) is what matters for the rest of the crate, not the
/// specific backend behind it.
pub struct LoggingErrorReporter;

impl ErrorReporter for LoggingErrorReporter {
    fn report(&self, failure: RelayFailure<'_>) {
        log::error!("{}", failure);
    }
}
