//! HTTP route handlers.

pub mod relay;
pub mod status;

pub use relay::relay;
pub use status::status;

use actix_web::web;

/// Registers the status endpoint at `status_url`, with the relay catch-all
/// as the default service for everything else. Split out so `main.rs` and
/// integration tests configure the same routing.
pub fn configure(status_url: &str) -> impl FnOnce(&mut web::ServiceConfig) + '_ {
    move |cfg: &mut web::ServiceConfig| {
        cfg.route(status_url, web::get().to(status)).default_service(web::to(relay));
    }
}
