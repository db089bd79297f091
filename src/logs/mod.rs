//! Logging configuration for the knocker relay.
//!
//! This module owns process-wide `log` initialization. The rest of the
//! crate only ever calls the `log` macros; nothing outside this module
//! knows or cares which backend renders them.

pub mod logger;
