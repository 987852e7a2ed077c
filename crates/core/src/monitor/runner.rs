//! Acquisition monitor implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::client::{ClientRegistry, ClientState, ClientStatusSnapshot, DownloadClient, ListOptions};
use crate::events::{DomainEvent, EventBus, EventMetadata};
use crate::import::ImportJob;
use crate::ledger::{AcquisitionRecord, AcquisitionStatus, LedgerFilter, LedgerStore};
use crate::metrics;

use super::config::MonitorConfig;
use super::types::{MonitorError, MonitorStatus, PollReport};

const TRACKED: [AcquisitionStatus; 2] = [AcquisitionStatus::Pending, AcquisitionStatus::Active];

/// Synthetic error stored on records that vanished from their client.
pub(crate) const EXTERNALLY_REMOVED: &str = "removed from client externally";

/// Upper bound on records read per poll.
const POLL_BATCH: i64 = 10_000;

type ClientPoll = (
    Arc<dyn DownloadClient>,
    Vec<AcquisitionRecord>,
    Result<Vec<ClientStatusSnapshot>, MonitorError>,
);

/// Reconciles ledger records against live client state.
pub struct AcquisitionMonitor {
    config: MonitorConfig,
    ledger: Arc<dyn LedgerStore>,
    clients: ClientRegistry,
    importer: Arc<ImportJob>,
    events: EventBus,
    import_slots: Arc<Semaphore>,

    // Runtime state
    running: Arc<AtomicBool>,
    imports: Mutex<Vec<JoinHandle<()>>>,
    poll_loop: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl AcquisitionMonitor {
    pub fn new(
        config: MonitorConfig,
        ledger: Arc<dyn LedgerStore>,
        clients: ClientRegistry,
        importer: Arc<ImportJob>,
        events: EventBus,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let import_slots = Arc::new(Semaphore::new(importer.config().max_concurrent.max(1)));

        Self {
            config,
            ledger,
            clients,
            importer,
            events,
            import_slots,
            running: Arc::new(AtomicBool::new(false)),
            imports: Mutex::new(Vec::new()),
            poll_loop: Mutex::new(None),
            shutdown_tx,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Recover interrupted imports and spawn the poll loop.
    pub async fn start(self: &Arc<Self>) -> Result<(), MonitorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Monitor already running");
            return Ok(());
        }

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            "Starting acquisition monitor"
        );

        let reset = self.ledger.reset_interrupted_imports()?;
        if !reset.is_empty() {
            info!(count = reset.len(), "Recovered interrupted imports");
        }
        self.dispatch_imports()?;

        let monitor = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let interval = Duration::from_millis(self.config.poll_interval_ms);

        let handle = tokio::spawn(async move {
            info!("Poll loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Poll loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !monitor.running.load(Ordering::Relaxed) {
                            break;
                        }
                        match monitor.poll_once().await {
                            Ok(report) => {
                                if report.polled > 0 || report.imports_dispatched > 0 {
                                    debug!(?report, "Poll finished");
                                }
                            }
                            Err(e) => error!(error = %e, "Poll failed"),
                        }
                    }
                }
            }
            info!("Poll loop stopped");
        });
        *self.poll_loop.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);

        Ok(())
    }

    /// Stop polling and wait for in-flight imports.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Monitor not running");
            return;
        }

        info!("Stopping acquisition monitor");
        let _ = self.shutdown_tx.send(());

        let handle = self
            .poll_loop
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        let drained = self.drain_imports().await;
        info!(imports_awaited = drained, "Acquisition monitor stopped");
    }

    pub fn status(&self) -> MonitorStatus {
        let count = |status: AcquisitionStatus| {
            self.ledger
                .list(
                    &LedgerFilter::new()
                        .with_statuses(&[status])
                        .with_limit(POLL_BATCH),
                )
                .map(|records| records.len())
                .unwrap_or(0)
        };

        MonitorStatus {
            running: self.is_running(),
            pending: count(AcquisitionStatus::Pending),
            active: count(AcquisitionStatus::Active),
            completed: count(AcquisitionStatus::Completed),
            importing: count(AcquisitionStatus::Importing),
            imports_in_flight: self.prune_imports(),
        }
    }

    /// One reconciliation pass, then dispatch of claimable imports.
    pub async fn poll_once(&self) -> Result<PollReport, MonitorError> {
        let _timer = metrics::POLL_DURATION.start_timer();
        let mut report = PollReport::default();

        let records = self.ledger.list(
            &LedgerFilter::new()
                .with_statuses(&TRACKED)
                .with_limit(POLL_BATCH),
        )?;
        report.polled = records.len();

        let mut by_client: HashMap<String, Vec<AcquisitionRecord>> = HashMap::new();
        for record in records {
            by_client
                .entry(record.client_name.clone())
                .or_default()
                .push(record);
        }

        let mut polls = Vec::new();
        for (name, records) in by_client {
            match self.clients.get(&name) {
                Some(client) => polls.push((client, records)),
                None => {
                    for record in records {
                        let orphaned = MonitorError::RecordOrphaned {
                            id: record.id.clone(),
                            client: name.clone(),
                        };
                        warn!(record_id = %record.id, error = %orphaned, "Orphaned record");
                        if self.fail(&record, AcquisitionStatus::Failed, &orphaned.to_string())? {
                            report.failed += 1;
                        }
                    }
                }
            }
        }

        let timeout = Duration::from_secs(self.config.client_timeout_secs);
        let futures: Vec<_> = polls
            .into_iter()
            .map(|(client, records)| async move {
                let ids = records.iter().map(|r| r.client_id.clone()).collect();
                let opts = ListOptions {
                    ids: Some(ids),
                    category: None,
                };
                let result = match tokio::time::timeout(timeout, client.list(&opts)).await {
                    Ok(Ok(snapshots)) => Ok(snapshots),
                    Ok(Err(e)) => Err(MonitorError::ClientUnreachable {
                        client: client.name().to_string(),
                        reason: e.to_string(),
                    }),
                    Err(_) => Err(MonitorError::ClientUnreachable {
                        client: client.name().to_string(),
                        reason: format!("no response within {}s", timeout.as_secs()),
                    }),
                };
                (client, records, result)
            })
            .collect();
        let results: Vec<ClientPoll> = stream::iter(futures)
            .buffer_unordered(self.config.max_concurrent_polls.max(1))
            .collect()
            .await;

        for (client, records, result) in results {
            let snapshots = match result {
                Ok(snapshots) => snapshots,
                Err(e) => {
                    metrics::CLIENT_POLL_FAILURES
                        .with_label_values(&[client.name()])
                        .inc();
                    warn!(client = %client.name(), error = %e, "Skipping client this poll");
                    report.unreachable_clients.push(client.name().to_string());
                    report.skipped += records.len();
                    continue;
                }
            };

            let by_id: HashMap<String, ClientStatusSnapshot> = snapshots
                .into_iter()
                .map(|s| (s.id.to_lowercase(), s))
                .collect();

            for record in &records {
                let snapshot = by_id.get(&record.client_id.to_lowercase());
                self.reconcile(record, snapshot, &mut report)?;
            }
        }

        report.imports_dispatched = self.dispatch_imports()?;
        Ok(report)
    }

    fn reconcile(
        &self,
        record: &AcquisitionRecord,
        snapshot: Option<&ClientStatusSnapshot>,
        report: &mut PollReport,
    ) -> Result<(), MonitorError> {
        match snapshot {
            Some(s) if s.state == ClientState::Error => {
                let message = s
                    .error
                    .clone()
                    .unwrap_or_else(|| "client reported an error".to_string());
                if self.fail(record, AcquisitionStatus::Failed, &message)? {
                    report.failed += 1;
                }
            }
            Some(s) if s.is_complete() => {
                if self.ledger.transition(
                    &record.id,
                    &TRACKED,
                    AcquisitionStatus::Completed,
                    None,
                )? {
                    report.completed += 1;
                    metrics::ACQUISITIONS.with_label_values(&["completed"]).inc();
                    info!(record_id = %record.id, title = %record.title, "Transfer completed");
                    self.events.publish(DomainEvent::AcquisitionCompleted {
                        acquisition_id: record.id.clone(),
                        metadata: EventMetadata::default()
                            .with_provider(&record.provider)
                            .with_client(&record.client_name),
                    });
                }
            }
            Some(_) => {
                if record.status == AcquisitionStatus::Pending {
                    if self.ledger.transition(
                        &record.id,
                        &[AcquisitionStatus::Pending],
                        AcquisitionStatus::Active,
                        None,
                    )? {
                        report.activated += 1;
                        debug!(record_id = %record.id, "Transfer active");
                    }
                } else if record.unseen_since.is_some() {
                    self.ledger.set_unseen_since(&record.id, None)?;
                }
            }
            None => match record.unseen_since {
                None => {
                    debug!(record_id = %record.id, "Transfer not reported by client");
                    self.ledger.set_unseen_since(&record.id, Some(Utc::now()))?;
                }
                Some(since) => {
                    let elapsed = Utc::now().signed_duration_since(since);
                    if elapsed.num_milliseconds() >= self.config.poll_interval_ms as i64
                        && self.fail(record, AcquisitionStatus::Missing, EXTERNALLY_REMOVED)?
                    {
                        report.missing += 1;
                    }
                }
            },
        }
        Ok(())
    }

    /// Move a tracked record to a terminal failure status.
    fn fail(
        &self,
        record: &AcquisitionRecord,
        to: AcquisitionStatus,
        message: &str,
    ) -> Result<bool, MonitorError> {
        let moved = self
            .ledger
            .transition(&record.id, &TRACKED, to, Some(message))?;
        if moved {
            metrics::ACQUISITIONS.with_label_values(&[to.as_str()]).inc();
            warn!(record_id = %record.id, status = %to, error = %message, "Acquisition failed");
            self.events.publish(DomainEvent::AcquisitionFailed {
                acquisition_id: record.id.clone(),
                metadata: EventMetadata::default()
                    .with_provider(&record.provider)
                    .with_client(&record.client_name)
                    .with_error(message),
            });
        }
        Ok(moved)
    }

    /// Claim every completed record and spawn its import.
    fn dispatch_imports(&self) -> Result<usize, MonitorError> {
        let completed = self.ledger.list(
            &LedgerFilter::new()
                .with_statuses(&[AcquisitionStatus::Completed])
                .with_limit(POLL_BATCH),
        )?;

        let mut dispatched = 0;
        for record in completed {
            if !self.ledger.claim_for_import(&record.id)? {
                continue;
            }
            let importer = Arc::clone(&self.importer);
            let slots = Arc::clone(&self.import_slots);
            let id = record.id.clone();

            let handle = tokio::spawn(async move {
                let _permit = match slots.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                match importer.run(&id).await {
                    Ok(report) if report.errors.is_empty() => debug!(
                        record_id = %id,
                        outcome = ?report.outcome,
                        placed = report.placed.len(),
                        "Import job done"
                    ),
                    Ok(report) => warn!(
                        record_id = %id,
                        outcome = ?report.outcome,
                        placed = report.placed.len(),
                        errors = report.errors.len(),
                        "Import job done with file errors"
                    ),
                    Err(e) => warn!(record_id = %id, error = %e, "Import job deferred"),
                }
            });
            self.imports
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(handle);
            dispatched += 1;
        }

        if dispatched > 0 {
            info!(count = dispatched, "Dispatched imports");
        }
        self.prune_imports();
        Ok(dispatched)
    }

    /// Drop finished import handles; returns how many are still running.
    fn prune_imports(&self) -> usize {
        let mut imports = self.imports.lock().unwrap_or_else(|e| e.into_inner());
        imports.retain(|h| !h.is_finished());
        imports.len()
    }

    /// Wait for every spawned import. Returns how many were awaited.
    pub async fn drain_imports(&self) -> usize {
        let handles = std::mem::take(&mut *self.imports.lock().unwrap_or_else(|e| e.into_inner()));
        let count = handles.len();
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Import task panicked");
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use crate::import::ImportConfig;
    use crate::ledger::{AcquisitionTarget, BatchTarget, NewAcquisition, SqliteLedger};
    use crate::library::{FileOwner, LibraryStore, SqliteLibrary};
    use crate::testing::{fixtures, MockClient};
    use tempfile::TempDir;

    const HASH: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    struct Harness {
        temp: TempDir,
        ledger: Arc<SqliteLedger>,
        library: Arc<SqliteLibrary>,
        client: Arc<MockClient>,
        events: EventBus,
        monitor: Arc<AcquisitionMonitor>,
    }

    fn harness(poll_interval_ms: u64) -> Harness {
        let temp = TempDir::new().unwrap();
        let ledger = Arc::new(SqliteLedger::in_memory().unwrap());
        let library = Arc::new(SqliteLibrary::in_memory().unwrap());
        let client = Arc::new(MockClient::new("qb"));
        let mut clients = ClientRegistry::new();
        clients.register(client.clone(), true, 0);
        let events = EventBus::new(64);

        let importer = Arc::new(ImportJob::new(
            ledger.clone(),
            library.clone(),
            Arc::new(fixtures::show_catalog()),
            clients.clone(),
            events.clone(),
            ImportConfig::new(temp.path().join("library")),
        ));
        let config = MonitorConfig {
            poll_interval_ms,
            ..MonitorConfig::default()
        };
        let monitor = Arc::new(AcquisitionMonitor::new(
            config,
            ledger.clone(),
            clients,
            importer,
            events.clone(),
        ));

        Harness {
            temp,
            ledger,
            library,
            client,
            events,
            monitor,
        }
    }

    fn insert(ledger: &SqliteLedger, client: &str, client_id: &str) -> AcquisitionRecord {
        ledger
            .insert(NewAcquisition {
                target: AcquisitionTarget::sub_item("show-s01e02"),
                provider: "jackett".into(),
                title: "Show.S01E02.1080p.WEB-DL-GRP".into(),
                reference: format!("magnet:?xt=urn:btih:{}", client_id),
                info_hash: Some(client_id.to_string()),
                client_name: client.into(),
                client_id: client_id.into(),
                batch: BatchTarget::Single,
            })
            .unwrap()
    }

    fn status(ledger: &SqliteLedger, id: &str) -> AcquisitionStatus {
        ledger.get(id).unwrap().unwrap().status
    }

    #[tokio::test]
    async fn test_full_lifecycle_imports_and_deletes_record() {
        let h = harness(1000);
        let record = insert(&h.ledger, "qb", HASH);
        let mut rx = h.events.subscribe();

        // Client knows the transfer under an uppercase id.
        h.client.insert_transfer(
            &HASH.to_uppercase(),
            "Show.S01E02.1080p.WEB-DL-GRP",
            ClientState::Transferring,
            0.4,
        );
        let report = h.monitor.poll_once().await.unwrap();
        assert_eq!(report.activated, 1);
        assert_eq!(status(&h.ledger, &record.id), AcquisitionStatus::Active);

        let content = h.temp.path().join("dl/Show.S01E02.1080p.mkv");
        std::fs::create_dir_all(content.parent().unwrap()).unwrap();
        std::fs::write(&content, b"video").unwrap();
        h.client
            .set_state(&HASH.to_uppercase(), ClientState::Seeding, 1.0);
        h.client
            .set_content_path(&HASH.to_uppercase(), &content.to_string_lossy());

        let report = h.monitor.poll_once().await.unwrap();
        assert_eq!(report.completed, 1);
        assert_eq!(report.imports_dispatched, 1);
        assert_eq!(rx.recv().await.unwrap().kind(), "acquisition_completed");

        assert_eq!(h.monitor.drain_imports().await, 1);
        assert!(h.ledger.get(&record.id).unwrap().is_none());
        let files = h
            .library
            .find_by_owner(&FileOwner::SubItem {
                sub_item_id: "show-s01e02".into(),
            })
            .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(
            files[0].relative_path,
            "Show/Season 01/Show - S01E02 - Episode Title - 1080p.mkv"
        );

        // Nothing left to do.
        let report = h.monitor.poll_once().await.unwrap();
        assert_eq!(report, PollReport::default());
    }

    #[tokio::test]
    async fn test_client_error_fails_record_with_message() {
        let h = harness(1000);
        let record = insert(&h.ledger, "qb", HASH);
        h.client
            .insert_transfer(HASH, "x", ClientState::Error, 0.1);
        h.client.set_error(HASH, "tracker returned 404");

        let report = h.monitor.poll_once().await.unwrap();
        assert_eq!(report.failed, 1);
        let stored = h.ledger.get(&record.id).unwrap().unwrap();
        assert_eq!(stored.status, AcquisitionStatus::Failed);
        assert_eq!(stored.last_error.as_deref(), Some("tracker returned 404"));
    }

    #[tokio::test]
    async fn test_missing_needs_two_polls_an_interval_apart() {
        let h = harness(50);
        let record = insert(&h.ledger, "qb", HASH);

        h.monitor.poll_once().await.unwrap();
        let stored = h.ledger.get(&record.id).unwrap().unwrap();
        assert_eq!(stored.status, AcquisitionStatus::Pending);
        assert!(stored.unseen_since.is_some());

        // Too soon.
        h.monitor.poll_once().await.unwrap();
        assert_eq!(status(&h.ledger, &record.id), AcquisitionStatus::Pending);

        tokio::time::sleep(Duration::from_millis(80)).await;
        let report = h.monitor.poll_once().await.unwrap();
        assert_eq!(report.missing, 1);
        let stored = h.ledger.get(&record.id).unwrap().unwrap();
        assert_eq!(stored.status, AcquisitionStatus::Missing);
        assert_eq!(stored.last_error.as_deref(), Some(EXTERNALLY_REMOVED));
    }

    #[tokio::test]
    async fn test_reappearing_transfer_clears_unseen() {
        let h = harness(50);
        let record = insert(&h.ledger, "qb", HASH);
        h.monitor.poll_once().await.unwrap();

        h.client
            .insert_transfer(HASH, "x", ClientState::Transferring, 0.2);
        tokio::time::sleep(Duration::from_millis(80)).await;
        h.monitor.poll_once().await.unwrap();

        let stored = h.ledger.get(&record.id).unwrap().unwrap();
        assert_eq!(stored.status, AcquisitionStatus::Active);
        assert!(stored.unseen_since.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_client_leaves_records_untouched() {
        let h = harness(50);
        let record = insert(&h.ledger, "qb", HASH);
        h.client
            .fail_with(ClientError::ConnectionFailed("refused".into()));

        let report = h.monitor.poll_once().await.unwrap();
        assert_eq!(report.unreachable_clients, vec!["qb".to_string()]);
        assert_eq!(report.skipped, 1);
        let stored = h.ledger.get(&record.id).unwrap().unwrap();
        assert_eq!(stored.status, AcquisitionStatus::Pending);
        assert!(stored.unseen_since.is_none());
    }

    #[tokio::test]
    async fn test_orphaned_record_fails() {
        let h = harness(1000);
        let record = insert(&h.ledger, "removed-client", HASH);

        let report = h.monitor.poll_once().await.unwrap();
        assert_eq!(report.failed, 1);
        let stored = h.ledger.get(&record.id).unwrap().unwrap();
        assert_eq!(stored.status, AcquisitionStatus::Failed);
        assert!(stored.last_error.unwrap().contains("removed-client"));
    }

    #[tokio::test]
    async fn test_start_recovers_interrupted_import() {
        let h = harness(60_000);
        let record = insert(&h.ledger, "qb", HASH);
        h.ledger
            .transition(
                &record.id,
                &[AcquisitionStatus::Pending],
                AcquisitionStatus::Completed,
                None,
            )
            .unwrap();
        h.ledger.claim_for_import(&record.id).unwrap();

        let content = h.temp.path().join("dl/Show.S01E02.1080p.mkv");
        std::fs::create_dir_all(content.parent().unwrap()).unwrap();
        std::fs::write(&content, b"video").unwrap();
        h.client
            .insert_transfer(HASH, "Show.S01E02.1080p", ClientState::Done, 1.0);
        h.client.set_content_path(HASH, &content.to_string_lossy());

        h.monitor.start().await.unwrap();
        assert!(h.monitor.is_running());
        h.monitor.stop().await;

        assert!(!h.monitor.is_running());
        assert!(h.ledger.get(&record.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_status_counts() {
        let h = harness(1000);
        insert(&h.ledger, "qb", HASH);
        let status = h.monitor.status();
        assert!(!status.running);
        assert_eq!(status.pending, 1);
        assert_eq!(status.imports_in_flight, 0);
    }
}
