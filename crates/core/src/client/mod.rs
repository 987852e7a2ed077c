//! Transfer client abstraction.
//!
//! A [`DownloadClient`] normalizes one transfer backend into `add`,
//! `get_status`, `list`, `remove`, `pause` and `resume`. Native states are
//! mapped onto [`ClientState`]; snapshots are fetched live and never cached.
//!
//! Backends:
//! - [`QBittorrentClient`]: qBittorrent Web API v2 (cookie session)
//! - [`TransmissionClient`]: Transmission RPC (session token + basic auth)

mod config;
mod fetch;
mod qbittorrent;
mod registry;
mod transmission;
mod types;

pub use config::{ClientConfig, ClientKind};
pub use qbittorrent::QBittorrentClient;
pub use registry::{ClientRegistry, RegisteredClient};
pub use transmission::TransmissionClient;
pub use types::*;
