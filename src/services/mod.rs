//! The relay pipeline: rewrite the ingress request, deliver it with retry
//! and backoff, supervise the background task that does so, and report
//! terminal failures.

pub mod error_reporter;
pub mod relay;
pub mod rewriter;
pub mod supervisor;

pub use error_reporter::ErrorReporter;
pub use relay::Relay;
pub use rewriter::{rewrite, EgressRequest};
pub use supervisor::TaskSupervisor;
