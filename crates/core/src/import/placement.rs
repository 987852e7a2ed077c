//! Putting files into the library: hardlink, then move, then copy.

use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, warn};

use super::{ImportError, PlacementPolicy};

/// EXDEV on Linux.
const EXDEV: i32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementMethod {
    Hardlink,
    Move,
    Copy,
}

impl PlacementMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlacementMethod::Hardlink => "hardlink",
            PlacementMethod::Move => "move",
            PlacementMethod::Copy => "copy",
        }
    }
}

fn is_cross_device(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(EXDEV)
}

async fn ensure_parent(path: &Path) -> Result<(), ImportError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| ImportError::io(parent, e))?;
    }
    Ok(())
}

/// Place `source` at `destination`, which must not exist yet.
///
/// The source is left untouched unless the method is `Move`.
pub async fn place(
    source: &Path,
    destination: &Path,
    policy: &PlacementPolicy,
) -> Result<PlacementMethod, ImportError> {
    if fs::try_exists(destination).await.unwrap_or(false) {
        return Err(ImportError::io(
            destination,
            io::Error::from(io::ErrorKind::AlreadyExists),
        ));
    }
    ensure_parent(destination).await?;

    if policy.prefer_hardlink {
        match fs::hard_link(source, destination).await {
            Ok(()) => return Ok(PlacementMethod::Hardlink),
            Err(e) => debug!(
                source = %source.display(),
                error = %e,
                "Hardlink not possible, falling back"
            ),
        }
    }

    if policy.allow_move {
        match fs::rename(source, destination).await {
            Ok(()) => return Ok(PlacementMethod::Move),
            Err(e) if is_cross_device(&e) => {
                copy_file(source, destination, policy).await?;
                fs::remove_file(source)
                    .await
                    .map_err(|e| ImportError::io(source, e))?;
                return Ok(PlacementMethod::Move);
            }
            Err(e) => return Err(ImportError::io(source, e)),
        }
    }

    copy_file(source, destination, policy).await?;
    Ok(PlacementMethod::Copy)
}

/// Copy through a `.partial` sibling so a crash never leaves a truncated
/// file under the final name.
async fn copy_file(
    source: &Path,
    destination: &Path,
    policy: &PlacementPolicy,
) -> Result<u64, ImportError> {
    let partial = partial_path(destination);
    match copy_into(source, &partial, policy).await {
        Ok((bytes, source_digest)) => {
            if let Some(expected) = source_digest {
                let actual = sha256_file(&partial, policy.buffer_size).await?;
                if actual != expected {
                    let _ = fs::remove_file(&partial).await;
                    return Err(ImportError::ChecksumMismatch {
                        path: destination.to_path_buf(),
                    });
                }
            }
            fs::rename(&partial, destination)
                .await
                .map_err(|e| ImportError::io(destination, e))?;
            Ok(bytes)
        }
        Err(e) => {
            let _ = fs::remove_file(&partial).await;
            Err(e)
        }
    }
}

async fn copy_into(
    source: &Path,
    destination: &Path,
    policy: &PlacementPolicy,
) -> Result<(u64, Option<String>), ImportError> {
    let source_file = File::open(source)
        .await
        .map_err(|e| ImportError::io(source, e))?;
    let dest_file = File::create(destination)
        .await
        .map_err(|e| ImportError::io(destination, e))?;

    let buffer_size = policy.buffer_size.max(4096);
    let mut reader = BufReader::with_capacity(buffer_size, source_file);
    let mut writer = BufWriter::with_capacity(buffer_size, dest_file);
    let mut hasher = if policy.verify_copies {
        Some(Sha256::new())
    } else {
        None
    };
    let mut buffer = vec![0u8; buffer_size];
    let mut total = 0u64;

    loop {
        let n = reader
            .read(&mut buffer)
            .await
            .map_err(|e| ImportError::io(source, e))?;
        if n == 0 {
            break;
        }
        if let Some(h) = hasher.as_mut() {
            h.update(&buffer[..n]);
        }
        writer
            .write_all(&buffer[..n])
            .await
            .map_err(|e| ImportError::io(destination, e))?;
        total += n as u64;
    }
    writer
        .flush()
        .await
        .map_err(|e| ImportError::io(destination, e))?;
    writer
        .get_ref()
        .sync_all()
        .await
        .map_err(|e| ImportError::io(destination, e))?;

    Ok((total, hasher.map(|h| format!("{:x}", h.finalize()))))
}

async fn sha256_file(path: &Path, buffer_size: usize) -> Result<String, ImportError> {
    let file = File::open(path).await.map_err(|e| ImportError::io(path, e))?;
    let mut reader = BufReader::with_capacity(buffer_size.max(4096), file);
    let mut buffer = vec![0u8; buffer_size.max(4096)];
    let mut hasher = Sha256::new();
    loop {
        let n = reader
            .read(&mut buffer)
            .await
            .map_err(|e| ImportError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    destination.with_file_name(name)
}

/// Name for a superseded file: `{stem}.superseded-{timestamp}.{ext}`.
pub fn superseded_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let stamp = Utc::now().format("%Y%m%dT%H%M%S");
    match path.extension() {
        Some(ext) => format!("{}.superseded-{}.{}", stem, stamp, ext.to_string_lossy()),
        None => format!("{}.superseded-{}", stem, stamp),
    }
}

/// Get an existing library file out of the way of a better one, into the
/// backup directory or next to itself. Returns where it went.
pub async fn displace_existing(
    existing: &Path,
    policy: &PlacementPolicy,
) -> Result<PathBuf, ImportError> {
    let dir = match &policy.backup_dir {
        Some(dir) => dir.clone(),
        None => existing
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    fs::create_dir_all(&dir)
        .await
        .map_err(|e| ImportError::io(&dir, e))?;

    let base = superseded_name(existing);
    let mut target = dir.join(&base);
    let mut n = 1;
    while fs::try_exists(&target).await.unwrap_or(false) {
        target = dir.join(format!("{}.{}", base, n));
        n += 1;
    }

    relocate(existing, &target, policy).await?;
    Ok(target)
}

/// Rename, falling back to copy and delete across devices.
async fn relocate(from: &Path, to: &Path, policy: &PlacementPolicy) -> Result<(), ImportError> {
    match fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            copy_file(from, to, policy).await?;
            fs::remove_file(from)
                .await
                .map_err(|e| ImportError::io(from, e))
        }
        Err(e) => Err(ImportError::io(from, e)),
    }
}

fn staged_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".incoming");
    destination.with_file_name(name)
}

/// Undo a staged placement: a moved source goes back, anything else is
/// dropped.
async fn unstage(
    source: &Path,
    staged: &Path,
    method: PlacementMethod,
    policy: &PlacementPolicy,
) {
    let result = match method {
        PlacementMethod::Move => relocate(staged, source, policy).await,
        PlacementMethod::Hardlink | PlacementMethod::Copy => fs::remove_file(staged)
            .await
            .map_err(|e| ImportError::io(staged, e)),
    };
    if let Err(e) = result {
        warn!(staged = %staged.display(), error = %e, "Failed to clean up staged file");
    }
}

/// Replace an existing library file with a better one.
///
/// The incoming file is placed next to the destination first. The existing
/// file is only touched once that succeeded, and is put back if the final
/// rename fails. Returns the placement method and where the old file went
/// (`None` when it was replaced outright).
pub async fn supersede(
    source: &Path,
    destination: &Path,
    policy: &PlacementPolicy,
) -> Result<(PlacementMethod, Option<PathBuf>), ImportError> {
    let staged = staged_path(destination);
    if fs::try_exists(&staged).await.unwrap_or(false) {
        fs::remove_file(&staged)
            .await
            .map_err(|e| ImportError::io(&staged, e))?;
    }
    let method = place(source, &staged, policy).await?;

    if policy.replace_existing {
        if let Err(e) = fs::rename(&staged, destination).await {
            unstage(source, &staged, method, policy).await;
            return Err(ImportError::io(destination, e));
        }
        return Ok((method, None));
    }

    let moved = match displace_existing(destination, policy).await {
        Ok(moved) => moved,
        Err(e) => {
            unstage(source, &staged, method, policy).await;
            return Err(e);
        }
    };

    if let Err(e) = fs::rename(&staged, destination).await {
        if let Err(restore) = relocate(&moved, destination, policy).await {
            warn!(
                existing = %moved.display(),
                error = %restore,
                "Failed to restore superseded file"
            );
        }
        unstage(source, &staged, method, policy).await;
        return Err(ImportError::io(destination, e));
    }
    Ok((method, Some(moved)))
}
