//! `knocker` — a fire-and-forget HTTP relay.
//!
//! A caller POSTs (or sends any other method) to this service with a set
//! of `knocker-*` directive headers describing a target. The service
//! validates and defaults those directives, rewrites the request onto the
//! target, and relays it in the background with retry and exponential
//! backoff, replying to the original caller immediately with an
//! acceptance acknowledgement. On final failure it notifies an optional
//! callback URL.
//!
//! This crate is organized the way the directives in [`models::directive`]
//! are processed: [`config`] supplies defaults, [`models`] defines and
//! validates the per-request directive set, [`services`] carries out the
//! rewrite/relay/supervise/report pipeline, and [`routes`] wires it all
//! into actix-web handlers. [`logs`] configures process-wide logging and
//! is independent of the rest.

pub mod config;
pub mod logs;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
