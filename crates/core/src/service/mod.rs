//! Acquisition service.
//!
//! The facade the API layer talks to: search, initiate, cancel, retry and
//! purge acquisitions, and fill in whatever a library item is missing.

mod acquisition;
mod error;
mod pick;

pub use acquisition::{AcquireOutcome, AcquireReport, AcquisitionService};
pub use error::ServiceError;
pub use pick::{best_pick, PickCriteria};
