//! The retry/backoff state machine that actually delivers a relayed
//! request, and the classifier that turns a failed delivery attempt into a
//! bounded set of outcomes.
//!
//! Grounded on the original `knocker.request` module's `process()` /
//! `request()` pair: attempt, classify failure, sleep for a backoff delay,
//! retry, and on final failure notify the configured callback. The backoff
//! formula itself is the one named in this crate's specification (full
//! jitter added on top of the original's plain exponential curve).

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::models::RequestConfig;
use crate::services::error_reporter::{ErrorReporter, RelayFailure};
use crate::services::rewriter::{self, EgressRequest};
use crate::services::supervisor::{ShutdownSignal, TaskSupervisor};

/// Why a single delivery attempt did not succeed.
///
/// Named after status code ranges rather than after `reqwest`'s own error
/// variants, since the two don't map one-to-one (a connect failure and a
/// pool timeout are different `reqwest` errors but the same outcome here).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The target responded; its status code is carried through as-is.
    Upstream(u16),
    /// Could not establish a connection to the target.
    ConnectFailed,
    /// The attempt did not complete within its timeout.
    TimedOut,
    /// Some other transport-level failure (decode error, too many
    /// redirects, etc).
    TransportError,
    /// A failure that does not fit any of the above (e.g. a malformed
    /// request that `reqwest` refused to build).
    Unknown,
}

impl Classification {
    /// The status code this classification would map to if it had to be
    /// rendered as one (used only for callback payloads and logging — the
    /// ingress caller never sees this value, since relays run in the
    /// background).
    pub fn as_status_u16(&self) -> u16 {
        match self {
            Classification::Upstream(code) => *code,
            Classification::ConnectFailed => 502,
            Classification::TransportError => 503,
            Classification::TimedOut => 504,
            Classification::Unknown => 418,
        }
    }

    fn is_success(&self) -> bool {
        matches!(self, Classification::Upstream(code) if (200..300).contains(code))
    }
}

/// Classifies a completed `reqwest` attempt.
pub fn classify(result: &Result<reqwest::Response, reqwest::Error>) -> Classification {
    match result {
        Ok(response) => Classification::Upstream(response.status().as_u16()),
        Err(e) if e.is_timeout() => Classification::TimedOut,
        Err(e) if e.is_connect() => Classification::ConnectFailed,
        Err(e) if e.is_request() || e.is_body() || e.is_decode() => Classification::TransportError,
        Err(_) => Classification::Unknown,
    }
}

/// Full-jitter exponential backoff: `min(max, base * 2^(attempt-1) + U)`
/// with `U` uniform on `[0, 1)`, `attempt` starting at 1 for the delay
/// before the *second* try.
pub fn backoff_delay(base: f64, attempt: u32, max: f64) -> Duration {
    let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
    let exponential = base * 2f64.powi(attempt as i32 - 1) + jitter;
    Duration::from_secs_f64(exponential.min(max).max(0.0))
}

/// Drives one relay end-to-end: attempt, classify, backoff, retry, and on
/// terminal failure dispatch the callback (if configured) and report to
/// the error sink.
///
/// The callback notification is itself relayed through this same state
/// machine — it is submitted as a new supervised task with its own
/// `config.retries`/`backoff_factor`, not a single best-effort send, so a
/// flaky callback endpoint gets the same retry discipline as the primary
/// target.
#[derive(Clone)]
pub struct Relay {
    client: reqwest::Client,
    reporter: Arc<dyn ErrorReporter>,
    sentry_failed_requests: bool,
}

impl Relay {
    pub fn new(client: reqwest::Client, reporter: Arc<dyn ErrorReporter>, sentry_failed_requests: bool) -> Self {
        Self { client, reporter, sentry_failed_requests }
    }

    /// Submits `egress` to `supervisor` as a background task, retrying
    /// per `config` and notifying `config.callback` on terminal failure.
    /// Returns immediately; the caller never observes the outcome.
    pub fn spawn(&self, egress: EgressRequest, config: RequestConfig, supervisor: &TaskSupervisor) {
        let relay = self.clone();
        let mut shutdown = supervisor.shutdown_signal();
        let supervisor = supervisor.clone();

        supervisor.spawn(async move {
            relay.run(egress, config, &mut shutdown, &supervisor).await;
        });
    }

    async fn run(
        &self,
        egress: EgressRequest,
        config: RequestConfig,
        shutdown: &mut ShutdownSignal,
        supervisor: &TaskSupervisor,
    ) {
        let max_attempts = config.retries + 1;
        let mut last_classification: Option<Classification> = None;

        for attempt in 1..=max_attempts {
            if shutdown.is_cancelled() {
                log::debug!("relay {} abandoned: shutdown in progress", config.id);
                return;
            }

            let result = send_once(&self.client, &egress, config.timeout).await;
            let classification = classify(&result);

            if classification.is_success() {
                log::info!(
                    "relay {} to {} succeeded on attempt {} ({})",
                    config.id,
                    egress.url,
                    attempt,
                    classification.as_status_u16()
                );
                return;
            }

            log::warn!(
                "relay {} to {} failed on attempt {}/{}: {:?}",
                config.id,
                egress.url,
                attempt,
                max_attempts,
                classification
            );
            last_classification = Some(classification);

            if attempt == max_attempts {
                break;
            }

            let delay = backoff_delay(config.backoff_factor, attempt, config.backoff_factor_max);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => {
                    log::debug!("relay {} abandoned mid-backoff: shutdown in progress", config.id);
                    return;
                }
            }
        }

        let classification = last_classification.expect("loop always runs at least once");

        if self.sentry_failed_requests {
            let err = RelayError(classification);
            self.reporter.report(RelayFailure {
                id: &config.id,
                url: &egress.url,
                attempts: max_attempts,
                error: &err,
            });
        }

        if let Some(callback) = config.callback.clone() {
            let callback_egress = rewriter::rewrite_callback(
                callback.as_str(),
                &egress,
                classification.as_status_u16(),
                &config,
            );
            self.spawn(callback_egress, config.without_callback(), supervisor);
        }
    }
}

async fn send_once(
    client: &reqwest::Client,
    egress: &EgressRequest,
    timeout_secs: f64,
) -> Result<reqwest::Response, reqwest::Error> {
    let mut builder = client
        .request(egress.method.clone(), &egress.url)
        .timeout(Duration::from_secs_f64(timeout_secs))
        .body(egress.body.clone());

    for (name, value) in &egress.headers {
        builder = builder.header(name, value);
    }

    builder.send().await
}

#[derive(Debug)]
struct RelayError(Classification);

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl std::error::Error for RelayError {}
