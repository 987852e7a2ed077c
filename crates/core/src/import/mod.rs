//! Import of completed transfers into the library.
//!
//! An [`ImportJob`] takes one `completed` acquisition, finds its media files
//! in the client's download directory, names them with the library's
//! templates and places them: hardlink first, then move (when allowed),
//! then copy. A file only replaces an existing one of strictly lower
//! quality; the loser is moved aside rather than deleted unless
//! `replace_existing` is set.

mod config;
mod error;
mod job;
pub mod naming;
mod placement;
mod probe;

pub use config::{ImportConfig, PlacementPolicy, ProbeConfig};
pub use error::ImportError;
pub use job::{FileError, ImportJob, ImportOutcome, ImportReport, PlacedFile};
pub use placement::{displace_existing, place, supersede, superseded_name, PlacementMethod};
pub use probe::{FfprobeProbe, MediaProbe, ProbeInfo};
