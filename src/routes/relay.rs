//! The catch-all ingress handler: every method, every path that isn't the
//! status endpoint, lands here. Implements the same six steps as the
//! original `knocker.app.App.run` / `knocker.core.Knocker.process` pair,
//! in the order fixed by this crate's specification (the loopback guard
//! runs before directive parsing, not after as in the upstream `app.py`).

use std::collections::BTreeMap;

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::models::{GatewayError, RequestConfig};
use crate::services::rewriter;
use crate::state::AppState;

pub async fn relay(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    // 0. Refuse new work once shutdown has begun; in-flight relays still
    // drain, but nothing new is accepted onto a supervisor that is
    // winding down.
    if state.supervisor.shutdown_signal().is_cancelled() {
        return Err(GatewayError::NotReady);
    }

    // 1. Loopback guard: never re-relay something this service produced.
    if req.headers().contains_key(rewriter::MARKER_HEADER) {
        return Err(GatewayError::LoopBlocked);
    }

    // 2. Collect `knocker-*` directives (lower-cased names, as header
    // lookups in HTTP are case-insensitive but our validator compares
    // literal strings).
    let directives: Vec<(String, String)> = req
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            let name = name.as_str().to_ascii_lowercase();
            if name.starts_with("knocker-") {
                value.to_str().ok().map(|v| (name, v.to_string()))
            } else {
                None
            }
        })
        .collect();

    // 3. Validate and default the directives.
    let config = RequestConfig::from_directives(&directives, &state.config)?;

    // 4. Rewrite the ingress request into an outbound one.
    let egress = rewriter::rewrite(&req, &body, &config);
    let ack_url = egress.url.clone();
    let ack_method = egress.method.to_string();
    let ack_headers: BTreeMap<String, String> = egress.headers.iter().cloned().collect();
    let ack_body_length = egress.body.len();

    // 5. Hand the delivery off to the supervised background pipeline.
    state.processed.increment();
    let ack_config = config.clone();
    state.relay.spawn(egress, config, &state.supervisor);

    // 6. Acknowledge acceptance; the caller never learns the outcome.
    Ok(HttpResponse::Ok().json(json!({
        "status": true,
        "config": ack_config,
        "url": ack_url,
        "method": ack_method,
        "headers": ack_headers,
        "body-length": ack_body_length,
    })))
}
