//! One import run for one completed acquisition.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::naming::{item_destination, relative_to, sub_item_destination};
use super::placement::{place, supersede, PlacementMethod};
use super::probe::{FfprobeProbe, MediaProbe};
use super::{ImportConfig, ImportError, PlacementPolicy};
use crate::client::{ClientError, ClientRegistry};
use crate::events::{DomainEvent, EventBus, EventMetadata, FileFailure};
use crate::ledger::{AcquisitionRecord, AcquisitionStatus, AcquisitionTarget, BatchTarget, LedgerStore};
use crate::library::{FileOwner, LibraryStore, NewLibraryFile};
use crate::metadata::{MediaItem, MetadataProvider, SubItem};
use crate::metrics;
use crate::release::{parse_release, Quality, ReleaseInfo};

static SAMPLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|[.\-_ \[(])samples?(?:[.\-_ \])]|$)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportOutcome {
    /// Every qualifying file was placed.
    Imported,
    /// Some files were placed, others failed.
    Partial,
    /// Nothing was placed; the record is now `failed`.
    Failed,
    /// The record was gone or not ready.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlacedFile {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub method: PlacementMethod,
    pub library_file_id: String,
    pub owner: FileOwner,
    pub quality: Quality,
    /// Where a lower-quality predecessor was moved.
    pub superseded: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileError {
    pub path: PathBuf,
    pub kind: String,
    pub message: String,
}

impl FileError {
    fn new(path: &Path, error: &ImportError) -> Self {
        Self {
            path: path.to_path_buf(),
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }

    fn to_failure(&self) -> FileFailure {
        FileFailure {
            path: self.path.display().to_string(),
            kind: self.kind.clone(),
            message: self.message.clone(),
        }
    }
}

fn summarize(errors: &[FileError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub record_id: String,
    pub outcome: ImportOutcome,
    pub placed: Vec<PlacedFile>,
    pub errors: Vec<FileError>,
}

impl ImportReport {
    fn skipped(record_id: &str) -> Self {
        Self {
            record_id: record_id.to_string(),
            outcome: ImportOutcome::Skipped,
            placed: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// A media file found in the transfer's content.
#[derive(Debug, Clone)]
struct MediaFile {
    path: PathBuf,
    size_bytes: u64,
    extension: String,
    info: ReleaseInfo,
    quality: Quality,
}

struct Assignment {
    file: MediaFile,
    owner: FileOwner,
    destination: PathBuf,
}

/// Places a completed acquisition's files into the library.
pub struct ImportJob {
    ledger: Arc<dyn LedgerStore>,
    library: Arc<dyn LibraryStore>,
    metadata: Arc<dyn MetadataProvider>,
    clients: ClientRegistry,
    probe: Option<Arc<dyn MediaProbe>>,
    events: EventBus,
    config: ImportConfig,
}

impl ImportJob {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        library: Arc<dyn LibraryStore>,
        metadata: Arc<dyn MetadataProvider>,
        clients: ClientRegistry,
        events: EventBus,
        config: ImportConfig,
    ) -> Self {
        let probe: Option<Arc<dyn MediaProbe>> = if config.probe.enabled {
            Some(Arc::new(FfprobeProbe::new(
                config.probe.ffprobe_path.clone(),
                Duration::from_secs(config.probe.timeout_secs),
            )))
        } else {
            None
        };
        Self {
            ledger,
            library,
            metadata,
            clients,
            probe,
            events,
            config,
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn MediaProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Import the files of record `record_id`.
    ///
    /// A `completed` record is claimed first; an `importing` one is assumed
    /// to be claimed by the caller. Per-file failures are collected in the
    /// report. Errors are returned only for ledger failures and for
    /// transient client failures, after which the record is back in
    /// `completed`.
    pub async fn run(&self, record_id: &str) -> Result<ImportReport, ImportError> {
        let record = match self.ledger.get(record_id)? {
            Some(record) => record,
            None => {
                debug!(record_id = %record_id, "Record gone, nothing to import");
                metrics::IMPORTS.with_label_values(&["skipped"]).inc();
                return Ok(ImportReport::skipped(record_id));
            }
        };

        match record.status {
            AcquisitionStatus::Importing => {}
            AcquisitionStatus::Completed => {
                if !self.ledger.claim_for_import(record_id)? {
                    debug!(record_id = %record_id, "Import already claimed");
                    return Ok(ImportReport::skipped(record_id));
                }
            }
            status => {
                warn!(record_id = %record_id, status = %status, "Record not ready for import");
                return Ok(ImportReport::skipped(record_id));
            }
        }

        // Configuration is read once for the whole job.
        let policy = self.config.placement_policy();

        info!(record_id = %record.id, title = %record.title, "Starting import");

        let content = match self.locate_content(&record).await {
            Ok(path) => path,
            Err(e @ ImportError::Client(_)) => {
                warn!(record_id = %record.id, error = %e, "Client unavailable, import deferred");
                self.ledger.transition(
                    &record.id,
                    &[AcquisitionStatus::Importing],
                    AcquisitionStatus::Completed,
                    None,
                )?;
                return Err(e);
            }
            Err(e) => return self.fail_record(&record, Vec::new(), Some(e)),
        };

        let files = match self.collect_media(&record, &content).await {
            Ok(files) => files,
            Err(e) => return self.fail_record(&record, Vec::new(), Some(e)),
        };

        let (assignments, mut errors) = match self.assign(&record, files).await {
            Ok(result) => result,
            Err(e) => return self.fail_record(&record, Vec::new(), Some(e)),
        };

        let mut placed = Vec::new();
        for assignment in assignments {
            match self.place_one(&assignment, &policy).await {
                Ok(file) => {
                    metrics::PLACEMENTS
                        .with_label_values(&[file.method.as_str()])
                        .inc();
                    info!(
                        record_id = %record.id,
                        destination = %file.destination.display(),
                        method = file.method.as_str(),
                        "File imported"
                    );
                    placed.push(file);
                }
                Err(e) => {
                    metrics::IMPORT_FILE_ERRORS
                        .with_label_values(&[e.kind()])
                        .inc();
                    warn!(
                        record_id = %record.id,
                        file = %assignment.file.path.display(),
                        error = %e,
                        "File not imported"
                    );
                    errors.push(FileError::new(&assignment.file.path, &e));
                }
            }
        }

        if placed.is_empty() {
            return self.fail_record(&record, errors, None);
        }

        if !self.ledger.delete(&record.id)? {
            debug!(record_id = %record.id, "Record removed during import");
        }

        if self.config.remove_completed {
            if let Some(client) = self.clients.get(&record.client_name) {
                if let Err(e) = client.remove(&record.client_id, false).await {
                    warn!(
                        record_id = %record.id,
                        client = %record.client_name,
                        error = %e,
                        "Failed to remove completed transfer"
                    );
                }
            }
        }

        for file in &placed {
            self.events.publish(DomainEvent::FileImported {
                acquisition_id: record.id.clone(),
                library_file_id: file.library_file_id.clone(),
                owner: file.owner.clone(),
                path: file.destination.display().to_string(),
                metadata: EventMetadata::default()
                    .with_quality(file.quality)
                    .with_provider(&record.provider)
                    .with_client(&record.client_name),
            });
        }

        let outcome = if errors.is_empty() {
            ImportOutcome::Imported
        } else {
            let summary = format!(
                "{} of {} files not imported: {}",
                errors.len(),
                errors.len() + placed.len(),
                summarize(&errors)
            );
            warn!(record_id = %record.id, error = %summary, "Import incomplete");
            self.events.publish(DomainEvent::ImportIncomplete {
                acquisition_id: record.id.clone(),
                placed: placed.len(),
                failures: errors.iter().map(FileError::to_failure).collect(),
                metadata: EventMetadata::default()
                    .with_provider(&record.provider)
                    .with_client(&record.client_name)
                    .with_error(summary),
            });
            ImportOutcome::Partial
        };
        metrics::IMPORTS
            .with_label_values(&[if errors.is_empty() { "imported" } else { "partial" }])
            .inc();
        info!(
            record_id = %record.id,
            placed = placed.len(),
            errors = errors.len(),
            "Import finished"
        );

        Ok(ImportReport {
            record_id: record.id,
            outcome,
            placed,
            errors,
        })
    }

    async fn locate_content(&self, record: &AcquisitionRecord) -> Result<PathBuf, ImportError> {
        let client = self.clients.get(&record.client_name).ok_or_else(|| {
            ImportError::Unresolvable(format!("client '{}' is not configured", record.client_name))
        })?;

        let snapshot = match client.get_status(&record.client_id).await {
            Ok(snapshot) => snapshot,
            Err(ClientError::NotFound(_)) => {
                return Err(ImportError::Unresolvable(format!(
                    "transfer {} no longer exists in client '{}'",
                    record.client_id, record.client_name
                )))
            }
            Err(e) => return Err(ImportError::Client(e)),
        };

        match (&snapshot.content_path, &snapshot.save_path) {
            (Some(content), _) => Ok(PathBuf::from(content)),
            (None, Some(save)) => Ok(Path::new(save).join(&snapshot.name)),
            (None, None) => Err(ImportError::Unresolvable(
                "client reported no content path".to_string(),
            )),
        }
    }

    async fn collect_media(
        &self,
        record: &AcquisitionRecord,
        content: &Path,
    ) -> Result<Vec<MediaFile>, ImportError> {
        let meta = fs::metadata(content)
            .await
            .map_err(|e| ImportError::io(content, e))?;

        let candidates: Vec<PathBuf> = if meta.is_file() {
            vec![content.to_path_buf()]
        } else {
            WalkDir::new(content)
                .follow_links(false)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .collect()
        };

        let release = parse_release(&record.title);
        let mut files = Vec::new();
        for path in candidates {
            let extension = match path.extension() {
                Some(ext) => ext.to_string_lossy().to_ascii_lowercase(),
                None => continue,
            };
            if !self.config.is_media_extension(&extension) || is_sample(content, &path) {
                continue;
            }
            let size_bytes = fs::metadata(&path)
                .await
                .map_err(|e| ImportError::io(&path, e))?
                .len();
            files.push(self.analyze(path, extension, size_bytes, &release).await);
        }

        if files.is_empty() {
            return Err(ImportError::NoMediaFiles {
                path: content.to_path_buf(),
            });
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    /// Parse a file name, fill gaps from the release title, then let the
    /// probe correct the technical attributes.
    async fn analyze(
        &self,
        path: PathBuf,
        extension: String,
        size_bytes: u64,
        release: &ReleaseInfo,
    ) -> MediaFile {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let mut info = parse_release(&name);
        if info.season.is_none() {
            info.season = release.season;
        }
        if info.episodes.is_empty() {
            info.episodes = release.episodes.clone();
        }
        if info.release_group.is_none() {
            info.release_group = release.release_group.clone();
        }
        if info.edition.is_none() {
            info.edition = release.edition.clone();
        }

        let mut quality = info.quality.or(release.quality);
        if let Some(probe) = &self.probe {
            match probe.probe(&path).await {
                Ok(probed) => quality = probed.reconcile(quality),
                Err(e) => {
                    metrics::IMPORT_FILE_ERRORS
                        .with_label_values(&[e.kind()])
                        .inc();
                    warn!(file = %path.display(), error = %e, "Probe failed, using name only");
                }
            }
        }

        MediaFile {
            path,
            size_bytes,
            extension,
            info,
            quality,
        }
    }

    async fn assign(
        &self,
        record: &AcquisitionRecord,
        files: Vec<MediaFile>,
    ) -> Result<(Vec<Assignment>, Vec<FileError>), ImportError> {
        let root = self.config.library_root.as_path();
        let mut assignments = Vec::new();
        let mut errors = Vec::new();

        match (&record.batch, &record.target) {
            (BatchTarget::Batch { sub_item_ids }, _) => {
                let mut subs = Vec::new();
                let mut parents: HashMap<String, MediaItem> = HashMap::new();
                for id in sub_item_ids {
                    let sub = self.load_sub_item(id).await?;
                    if !parents.contains_key(&sub.item_id) {
                        let parent = self.load_item(&sub.item_id).await?;
                        parents.insert(sub.item_id.clone(), parent);
                    }
                    subs.push(sub);
                }

                for file in files {
                    let matched = subs.iter().find(|s| file.info.covers_episode(s.season, s.episode));
                    match matched.and_then(|s| parents.get(&s.item_id).map(|p| (s, p))) {
                        Some((sub, parent)) => assignments.push(Assignment {
                            destination: sub_item_destination(root, parent, sub, &file.quality, &file.extension),
                            owner: FileOwner::SubItem {
                                sub_item_id: sub.id.clone(),
                            },
                            file,
                        }),
                        None => {
                            let e = ImportError::Unresolvable(format!(
                                "no requested sub-item matches {}",
                                describe_episode(&file.info)
                            ));
                            errors.push(FileError::new(&file.path, &e));
                        }
                    }
                }
            }
            (BatchTarget::Single, AcquisitionTarget::Item { item_id }) => {
                let item = self.load_item(item_id).await?;
                let multi = files.len() > 1;
                for (i, file) in files.into_iter().enumerate() {
                    assignments.push(Assignment {
                        destination: item_destination(
                            root,
                            &item,
                            &file.quality,
                            &file.extension,
                            multi.then_some(i + 1),
                        ),
                        owner: FileOwner::Item {
                            item_id: item.id.clone(),
                        },
                        file,
                    });
                }
            }
            (BatchTarget::Single, AcquisitionTarget::SubItem { sub_item_id }) => {
                let sub = self.load_sub_item(sub_item_id).await?;
                let parent = self.load_item(&sub.item_id).await?;
                let matching = files
                    .iter()
                    .position(|f| f.info.covers_episode(sub.season, sub.episode));
                let chosen = match matching {
                    Some(i) => files.into_iter().nth(i),
                    None => files.into_iter().max_by_key(|f| f.size_bytes),
                };
                if let Some(file) = chosen {
                    assignments.push(Assignment {
                        destination: sub_item_destination(
                            root,
                            &parent,
                            &sub,
                            &file.quality,
                            &file.extension,
                        ),
                        owner: FileOwner::SubItem {
                            sub_item_id: sub.id.clone(),
                        },
                        file,
                    });
                }
            }
        }

        Ok((assignments, errors))
    }

    async fn place_one(
        &self,
        assignment: &Assignment,
        policy: &PlacementPolicy,
    ) -> Result<PlacedFile, ImportError> {
        let root = self.config.library_root.as_path();
        let root_str = root.to_string_lossy().to_string();
        let destination = &assignment.destination;
        let relative_path = relative_to(root, destination);
        let file = &assignment.file;

        let (method, superseded) = if fs::try_exists(destination).await.unwrap_or(false) {
            let existing = match self.library.get_by_path(&root_str, &relative_path)? {
                Some(known) => known.quality,
                None => parse_release(&destination.to_string_lossy()).quality,
            };
            if !file.quality.is_better_than(&existing) {
                return Err(ImportError::NameCollision {
                    path: destination.clone(),
                    existing,
                    incoming: file.quality,
                });
            }
            let (method, superseded) = supersede(&file.path, destination, policy).await?;
            match &superseded {
                Some(moved) => info!(
                    existing = %destination.display(),
                    moved_to = %moved.display(),
                    "Superseded lower-quality file"
                ),
                None => info!(existing = %destination.display(), "Replaced lower-quality file"),
            }
            (method, superseded)
        } else {
            (place(&file.path, destination, policy).await?, None)
        };

        let stored = self.library.upsert(NewLibraryFile {
            root: root_str,
            relative_path,
            size_bytes: file.size_bytes,
            quality: file.quality,
            owner: assignment.owner.clone(),
            release_group: file.info.release_group.clone(),
            source_name: file
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string()),
        })?;

        Ok(PlacedFile {
            source: file.path.clone(),
            destination: destination.clone(),
            method,
            library_file_id: stored.id,
            owner: assignment.owner.clone(),
            quality: file.quality,
            superseded,
        })
    }

    fn fail_record(
        &self,
        record: &AcquisitionRecord,
        mut errors: Vec<FileError>,
        cause: Option<ImportError>,
    ) -> Result<ImportReport, ImportError> {
        if let Some(e) = cause {
            errors.push(FileError::new(&self.config.library_root, &e));
        }
        let summary = if errors.is_empty() {
            "import placed no files".to_string()
        } else {
            format!("import placed no files: {}", summarize(&errors))
        };

        self.ledger.transition(
            &record.id,
            &[AcquisitionStatus::Importing],
            AcquisitionStatus::Failed,
            Some(&summary),
        )?;
        metrics::IMPORTS.with_label_values(&["failed"]).inc();
        metrics::ACQUISITIONS.with_label_values(&["failed"]).inc();
        warn!(record_id = %record.id, error = %summary, "Import failed");
        self.events.publish(DomainEvent::AcquisitionFailed {
            acquisition_id: record.id.clone(),
            metadata: EventMetadata::default()
                .with_provider(&record.provider)
                .with_client(&record.client_name)
                .with_error(summary),
        });

        Ok(ImportReport {
            record_id: record.id.clone(),
            outcome: ImportOutcome::Failed,
            placed: Vec::new(),
            errors,
        })
    }

    async fn load_item(&self, id: &str) -> Result<MediaItem, ImportError> {
        self.metadata
            .item(id)
            .await
            .map_err(|e| ImportError::Unresolvable(e.to_string()))
    }

    async fn load_sub_item(&self, id: &str) -> Result<SubItem, ImportError> {
        self.metadata
            .sub_item(id)
            .await
            .map_err(|e| ImportError::Unresolvable(e.to_string()))
    }
}

/// Sample clips, by file name or by a `Sample` folder inside the content.
fn is_sample(content: &Path, path: &Path) -> bool {
    let rel = path.strip_prefix(content).unwrap_or(path);
    rel.components()
        .any(|c| SAMPLE.is_match(&c.as_os_str().to_string_lossy()))
}

fn describe_episode(info: &ReleaseInfo) -> String {
    match (info.season, info.episode()) {
        (Some(s), Some(e)) => format!("S{:02}E{:02}", s, e),
        (Some(s), None) => format!("season {}", s),
        _ => "an unidentified episode".to_string(),
    }
}
