//! `GET <status_url>` — operational status, served instead of being
//! relayed. Grounded on `knocker.core.Knocker.status`, which reports the
//! worker process id, the crate version, and a running count of requests
//! handled and in-flight relay tasks.

use actix_web::{web, HttpResponse};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::state::AppState;

/// Process-wide counter of ingress requests accepted for relay, surfaced
/// by the status endpoint. Analogous to `Knocker.processed` in the
/// original implementation.
#[derive(Default)]
pub struct ProcessedCounter(AtomicU64);

impl ProcessedCounter {
    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Serialize)]
struct StatusBody {
    status: bool,
    worker: u32,
    version: &'static str,
    tasks: usize,
    processed: u64,
}

pub async fn status(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(StatusBody {
        status: true,
        worker: std::process::id(),
        version: env!("CARGO_PKG_VERSION"),
        tasks: state.supervisor.len(),
        processed: state.processed.get(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::error_reporter::NoopErrorReporter;
    use crate::services::{Relay, TaskSupervisor};
    use actix_web::{test, web, App};
    use std::sync::Arc;

    #[actix_web::test]
    async fn status_reports_worker_version_tasks_and_processed() {
        let processed = Arc::new(ProcessedCounter::default());
        processed.increment();
        processed.increment();

        let supervisor = TaskSupervisor::new();
        supervisor.spawn(async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        });

        let state = web::Data::new(AppState {
            config: Config::default(),
            relay: Relay::new(reqwest::Client::new(), Arc::new(NoopErrorReporter), false),
            supervisor,
            processed,
        });

        let app = test::init_service(
            App::new().app_data(state.clone()).route("/knocker/status", web::get().to(status)),
        )
        .await;

        let req = test::TestRequest::get().uri("/knocker/status").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], true);
        assert_eq!(body["worker"], std::process::id());
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["tasks"], 1);
        assert_eq!(body["processed"], 2);
    }
}
