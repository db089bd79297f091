use std::collections::BTreeMap;

use actix_web::{http::StatusCode, HttpResponse};
use serde_json::json;

/// Per-field validation errors produced by [`crate::models::directive`].
///
/// Keyed by the directive header name (e.g. `knocker-host`), each entry is
/// the list of messages for that field, matching the shape callers of the
/// original knocker service already expect: `{"errors": {"knocker-host":
/// ["..."]}}`.
#[derive(Debug, Default, Clone)]
pub struct DirectiveErrors(pub BTreeMap<String, Vec<String>>);

impl DirectiveErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Errors surfaced directly to the ingress caller.
///
/// Relay-internal failures (classified HTTP errors, crashes) never reach
/// this type — they are handled entirely inside the background relay task
/// and are never returned from an actix-web handler.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// One or more `knocker-*` directives failed validation.
    #[error("invalid knocker directives")]
    Directive(DirectiveErrors),

    /// The ingress request itself carries `x-knocker`, meaning it is a
    /// relay loopback that must not be re-relayed.
    #[error("ignore requests from knocker")]
    LoopBlocked,

    /// The shared HTTP client has not been initialized yet (startup race)
    /// or has already been torn down (shutdown race).
    #[error("relay client is not ready")]
    NotReady,
}

impl actix_web::error::ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Directive(_) => StatusCode::BAD_REQUEST,
            GatewayError::LoopBlocked => StatusCode::NOT_ACCEPTABLE,
            GatewayError::NotReady => StatusCode::LOCKED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            GatewayError::Directive(errors) => HttpResponse::BadRequest().json(json!({
                "status": false,
                "errors": errors.0,
            })),
            GatewayError::LoopBlocked => HttpResponse::NotAcceptable().json(json!({
                "status": false,
                "errors": {"system": "ignore requests from knocker"},
            })),
            GatewayError::NotReady => HttpResponse::Locked().body("relay client is not ready"),
        }
    }
}
