//! Builds the outbound (egress) request from the ingress request and a
//! validated [`RequestConfig`].
//!
//! Grounded on the original `knocker.core` URL-rewrite step (`request.url
//! .with_host(...).with_scheme(...)`) plus the header split in `utils
//! .process_scope`: everything not a `knocker-*` directive, `host`, or
//! `content-length` is forwarded unchanged, and exactly one `x-knocker`
//! marker header is appended so a relayed request can never loop back into
//! the relay.

use actix_web::http::header::HeaderMap;
use actix_web::HttpRequest;

use crate::models::RequestConfig;

/// The version string stamped into the `x-knocker` marker header so a
/// relayed request is recognizable (and rejected) if it loops back here.
pub const MARKER_HEADER: &str = "x-knocker";
pub const MARKER_VALUE: &str = env!("CARGO_PKG_VERSION");

/// A fully-formed outbound request, ready to hand to `reqwest`.
#[derive(Debug, Clone)]
pub struct EgressRequest {
    pub method: reqwest::Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Rewrites an ingress request per `config`, targeting `config.host` over
/// `config.scheme` while preserving the original path, query string,
/// method, and body.
pub fn rewrite(req: &HttpRequest, body: &[u8], config: &RequestConfig) -> EgressRequest {
    let mut url = format!("{}://{}{}", config.scheme.as_str(), config.host, req.uri().path());
    if let Some(query) = req.uri().query() {
        url.push('?');
        url.push_str(query);
    }

    let mut headers = filtered_headers(req.headers());
    headers.push((MARKER_HEADER.to_string(), MARKER_VALUE.to_string()));

    EgressRequest {
        method: convert_method(req.method()),
        url,
        headers,
        body: body.to_vec(),
    }
}

/// Builds the egress request for a callback notification: always `POST`,
/// carrying a JSON report of what was relayed and how it failed.
///
/// `origin` is the `EgressRequest` that was actually attempted against the
/// target; its url, method, and headers (minus the marker this crate
/// stamped on it) are echoed into the callback headers and body so the
/// receiver can see exactly what was sent. `status_code` is the outcome
/// of the final attempt, from [`crate::services::relay::Classification`].
pub fn rewrite_callback(
    callback_url: &str,
    origin: &EgressRequest,
    status_code: u16,
    config: &RequestConfig,
) -> EgressRequest {
    let mut headers = vec![
        ("x-knocker-origin".to_string(), "knocker".to_string()),
        (MARKER_HEADER.to_string(), MARKER_VALUE.to_string()),
    ];
    headers.extend(origin.headers.iter().filter(|(k, _)| k != MARKER_HEADER).cloned());

    let payload = serde_json::json!({
        "url": origin.url,
        "method": origin.method.as_str(),
        "config": config,
        "status_code": status_code,
    });

    EgressRequest {
        method: reqwest::Method::POST,
        url: callback_url.to_string(),
        headers,
        body: serde_json::to_vec(&payload).unwrap_or_default(),
    }
}

fn filtered_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let name = name.as_str();
            if name.eq_ignore_ascii_case("host")
                || name.eq_ignore_ascii_case("content-length")
                || name.to_ascii_lowercase().starts_with("knocker-")
            {
                return None;
            }
            value.to_str().ok().map(|v| (name.to_string(), v.to_string()))
        })
        .collect()
}

fn convert_method(method: &actix_web::http::Method) -> reqwest::Method {
    reqwest::Method::from_bytes(method.as_str().as_bytes()).unwrap_or(reqwest::Method::GET)
}
