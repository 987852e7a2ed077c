//! BitTorrent identifiers: info hashes from magnets and `.torrent` files.

use librqbit_core::torrent_metainfo::{torrent_from_bytes, TorrentMetaV1Owned};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetainfoError {
    #[error("Failed to parse torrent: {0}")]
    Parse(String),
}

/// Lowercase hex info hash of a `.torrent` file.
pub fn info_hash_from_torrent(bytes: &[u8]) -> Result<String, MetainfoError> {
    let torrent: TorrentMetaV1Owned =
        torrent_from_bytes(bytes).map_err(|e| MetainfoError::Parse(e.to_string()))?;
    Ok(torrent.info_hash.as_string())
}

/// Lowercase hex info hash from a magnet URI's `xt=urn:btih:` parameter.
///
/// Base32 hashes are converted to hex so they compare equal to what
/// clients report.
pub fn info_hash_from_magnet(magnet: &str) -> Option<String> {
    let (_, query) = magnet.split_once('?')?;
    let value = query
        .split('&')
        .find_map(|param| param.strip_prefix("xt=urn:btih:"))?;

    match value.len() {
        40 if value.chars().all(|c| c.is_ascii_hexdigit()) => Some(value.to_ascii_lowercase()),
        32 => base32_to_hex(value),
        _ => None,
    }
}

/// Build a magnet URI from a bare info hash.
pub fn magnet_from_hash(hash: &str, name: Option<&str>) -> String {
    match name {
        Some(dn) => format!(
            "magnet:?xt=urn:btih:{}&dn={}",
            hash,
            urlencoding::encode(dn)
        ),
        None => format!("magnet:?xt=urn:btih:{}", hash),
    }
}

fn base32_to_hex(value: &str) -> Option<String> {
    const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

    let mut bits: u64 = 0;
    let mut bit_count = 0u32;
    let mut out = String::with_capacity(40);

    for c in value.bytes() {
        let idx = ALPHABET
            .iter()
            .position(|a| *a == c.to_ascii_uppercase())? as u64;
        bits = (bits << 5) | idx;
        bit_count += 5;
        if bit_count >= 8 {
            bit_count -= 8;
            let byte = (bits >> bit_count) & 0xff;
            out.push_str(&format!("{:02x}", byte));
        }
    }
    (out.len() == 40).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_magnet() {
        let magnet = "magnet:?xt=urn:btih:ABCDEF0123456789ABCDEF0123456789ABCDEF01&dn=Show";
        assert_eq!(
            info_hash_from_magnet(magnet).as_deref(),
            Some("abcdef0123456789abcdef0123456789abcdef01")
        );
    }

    #[test]
    fn test_base32_magnet() {
        // 20 zero bytes
        let magnet = "magnet:?xt=urn:btih:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
        assert_eq!(
            info_hash_from_magnet(magnet).as_deref(),
            Some("0000000000000000000000000000000000000000")
        );
    }

    #[test]
    fn test_magnet_without_hash() {
        assert!(info_hash_from_magnet("magnet:?dn=nothing").is_none());
        assert!(info_hash_from_magnet("http://example.com/file.torrent").is_none());
    }

    #[test]
    fn test_invalid_torrent_bytes() {
        assert!(info_hash_from_torrent(b"not a torrent").is_err());
    }

    #[test]
    fn test_magnet_from_hash() {
        assert_eq!(
            magnet_from_hash("abc", Some("My Show")),
            "magnet:?xt=urn:btih:abc&dn=My%20Show"
        );
    }
}
