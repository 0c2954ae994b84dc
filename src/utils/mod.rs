//! Configuration, errors, logging and worker metrics

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{HarnessError, Result};
