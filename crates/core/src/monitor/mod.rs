//! Acquisition monitor.
//!
//! A periodic reconciliation loop between the ledger and the transfer
//! clients. Each poll reads the ledger fresh, asks every involved client
//! for its transfers once, and moves records through
//! `pending -> active -> completed`, or into `failed` / `missing`.
//! Completed records are claimed and handed to the [`ImportJob`] pool.
//!
//! [`ImportJob`]: crate::import::ImportJob

mod config;
mod runner;
mod types;

pub use config::MonitorConfig;
pub use runner::AcquisitionMonitor;
pub use types::{MonitorError, MonitorStatus, PollReport};
