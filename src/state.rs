//! Shared application state handed to every route via `web::Data`.

use std::sync::Arc;

use crate::config::Config;
use crate::routes::status::ProcessedCounter;
use crate::services::{Relay, TaskSupervisor};

pub struct AppState {
    pub config: Config,
    pub relay: Relay,
    pub supervisor: TaskSupervisor,
    pub processed: Arc<ProcessedCounter>,
}
