//! Process entry point: configure logging, load configuration, build the
//! shared HTTP client and relay pipeline, then serve.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};

use knocker::config::Config;
use knocker::logs::logger::configure_logger;
use knocker::routes::status::ProcessedCounter;
use knocker::services::error_reporter::{ErrorReporter, LoggingErrorReporter, NoopErrorReporter};
use knocker::services::{Relay, TaskSupervisor};
use knocker::state::AppState;

/// Upper bound on how long shutdown waits for in-flight relays to finish
/// their current attempt before abandoning them.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(30);

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = Config::from_env();
    configure_logger(&config.log_level);

    log::info!("starting knocker on {}:{}", config.host, config.port);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs_f64(config.timeout_max))
        .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
        .build()
        .expect("failed to build HTTP client");

    let reporter: Arc<dyn ErrorReporter> = if config.sentry_dsn.is_some() {
        Arc::new(LoggingErrorReporter)
    } else {
        Arc::new(NoopErrorReporter)
    };

    let supervisor = TaskSupervisor::new();
    let state = web::Data::new(AppState {
        relay: Relay::new(client, reporter, config.sentry_failed_requests),
        supervisor: supervisor.clone(),
        processed: Arc::new(ProcessedCounter::default()),
        config: config.clone(),
    });

    let bind_addr = (config.host.clone(), config.port);
    let status_url = config.status_url.clone();

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(knocker::routes::configure(&status_url))
    })
    .bind(bind_addr)?
    .run();

    server.await?;

    log::info!("server stopped, draining in-flight relays (up to {:?})", SHUTDOWN_DRAIN);
    supervisor.drain(SHUTDOWN_DRAIN).await;
    log::info!("shutdown complete");

    Ok(())
}
