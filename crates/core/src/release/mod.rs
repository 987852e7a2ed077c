//! Release descriptor.
//!
//! Turns free-text release names like `Show.S01E02.1080p.WEB-DL.x264-GRP`
//! into structured attributes, and defines the quality comparison used both
//! for ranking search results and for resolving library collisions.
//!
//! Everything here is pure: no I/O, no allocation beyond the returned values.

mod parser;
mod quality;

pub use parser::{parse_release, ReleaseInfo};
pub use quality::{AudioCodec, Hdr, Quality, Resolution, Source, VideoCodec};
