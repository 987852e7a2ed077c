use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::pick::{best_pick, PickCriteria};
use super::ServiceError;
use crate::batch::{BatchPlanner, PlannedSearch};
use crate::client::{AddInput, AddOptions, ClientError, ClientRegistry, DownloadClient};
use crate::events::{DomainEvent, EventBus, EventMetadata};
use crate::indexer::{MediaType, SearchResult};
use crate::ledger::{
    AcquisitionRecord, AcquisitionStatus, AcquisitionTarget, BatchTarget, LedgerFilter,
    LedgerStore, NewAcquisition,
};
use crate::library::{FileOwner, LibraryFile, LibraryFilter, LibraryStore};
use crate::metadata::{MediaKind, MetadataProvider};
use crate::metrics;
use crate::search::{AggregateResult, SearchAggregator, SearchRequest};
use crate::torrent::info_hash_from_magnet;

const TERMINAL: [AcquisitionStatus; 3] = [
    AcquisitionStatus::Failed,
    AcquisitionStatus::Missing,
    AcquisitionStatus::Cancelled,
];

/// What happened to one planned search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AcquireOutcome {
    Initiated {
        query: String,
        acquisition_id: String,
        title: String,
    },
    NoMatch {
        query: String,
        candidates: usize,
    },
    Failed {
        query: String,
        error: String,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AcquireReport {
    pub item_id: String,
    pub outcomes: Vec<AcquireOutcome>,
}

impl AcquireReport {
    pub fn initiated(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, AcquireOutcome::Initiated { .. }))
            .count()
    }
}

/// Entry point for everything a caller can do with acquisitions.
pub struct AcquisitionService {
    aggregator: Arc<SearchAggregator>,
    clients: ClientRegistry,
    ledger: Arc<dyn LedgerStore>,
    library: Arc<dyn LibraryStore>,
    metadata: Arc<dyn MetadataProvider>,
    planner: BatchPlanner,
    events: EventBus,
}

impl AcquisitionService {
    pub fn new(
        aggregator: Arc<SearchAggregator>,
        clients: ClientRegistry,
        ledger: Arc<dyn LedgerStore>,
        library: Arc<dyn LibraryStore>,
        metadata: Arc<dyn MetadataProvider>,
        planner: BatchPlanner,
        events: EventBus,
    ) -> Self {
        Self {
            aggregator,
            clients,
            ledger,
            library,
            metadata,
            planner,
            events,
        }
    }

    pub fn aggregator(&self) -> &SearchAggregator {
        &self.aggregator
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<AggregateResult, ServiceError> {
        Ok(self.aggregator.search(request).await?)
    }

    /// Hand `result` to a client and start tracking it.
    ///
    /// `pinned` names the client to use; otherwise the highest-priority
    /// enabled one is chosen.
    pub async fn initiate(
        &self,
        result: &SearchResult,
        target: AcquisitionTarget,
        pinned: Option<&str>,
        batch: BatchTarget,
    ) -> Result<AcquisitionRecord, ServiceError> {
        if result.reference.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "result has no acquisition reference".to_string(),
            ));
        }
        if let BatchTarget::Batch { sub_item_ids } = &batch {
            if sub_item_ids.is_empty() {
                return Err(ServiceError::InvalidInput(
                    "batch has no sub-items".to_string(),
                ));
            }
        }
        self.check_target(&target).await?;

        let client = self.clients.select(pinned).map_err(|e| match e {
            ClientError::NotFound(what) => ServiceError::NotFound(format!("client {}", what)),
            e => ServiceError::Client(e),
        })?;

        let new = NewAcquisition {
            target,
            provider: result.indexer.clone(),
            title: result.title.clone(),
            reference: result.reference.clone(),
            info_hash: result.info_hash.clone(),
            client_name: String::new(),
            client_id: String::new(),
            batch,
        };
        self.start(client, new).await
    }

    /// Add the transfer, then write the record. A failed write takes the
    /// transfer back out of the client.
    async fn start(
        &self,
        client: Arc<dyn DownloadClient>,
        mut new: NewAcquisition,
    ) -> Result<AcquisitionRecord, ServiceError> {
        let input = AddInput::from_reference(&new.reference);
        let client_id = client.add(input, &AddOptions::default()).await?;

        new.client_name = client.name().to_string();
        new.info_hash = new
            .info_hash
            .or_else(|| info_hash_from_magnet(&new.reference))
            .or_else(|| Some(client_id.clone()));
        new.client_id = client_id.clone();

        let record = match self.ledger.insert(new) {
            Ok(record) => record,
            Err(e) => {
                warn!(client = %client.name(), error = %e, "Ledger write failed, removing transfer");
                if let Err(remove_err) = client.remove(&client_id, true).await {
                    warn!(client = %client.name(), error = %remove_err, "Failed to remove orphaned transfer");
                }
                return Err(e.into());
            }
        };

        metrics::ACQUISITIONS.with_label_values(&["initiated"]).inc();
        info!(
            record_id = %record.id,
            client = %record.client_name,
            title = %record.title,
            "Acquisition initiated"
        );
        self.events.publish(DomainEvent::AcquisitionInitiated {
            acquisition_id: record.id.clone(),
            target: record.target.clone(),
            title: record.title.clone(),
            metadata: EventMetadata::default()
                .with_provider(&record.provider)
                .with_client(&record.client_name),
        });
        Ok(record)
    }

    async fn check_target(&self, target: &AcquisitionTarget) -> Result<(), ServiceError> {
        match target {
            AcquisitionTarget::Item { item_id } => {
                self.metadata.item(item_id).await?;
            }
            AcquisitionTarget::SubItem { sub_item_id } => {
                self.metadata.sub_item(sub_item_id).await?;
            }
        }
        Ok(())
    }

    /// Stop a pending or active acquisition and drop its transfer.
    pub async fn cancel(&self, id: &str) -> Result<AcquisitionRecord, ServiceError> {
        let record = self.ledger.cancel(id)?;

        match self.clients.get(&record.client_name) {
            Some(client) => match client.remove(&record.client_id, true).await {
                Ok(()) | Err(ClientError::NotFound(_)) => {}
                Err(e) => warn!(
                    record_id = %record.id,
                    client = %record.client_name,
                    error = %e,
                    "Cancelled, but the transfer could not be removed"
                ),
            },
            None => warn!(
                record_id = %record.id,
                client = %record.client_name,
                "Cancelled record references an unknown client"
            ),
        }

        metrics::ACQUISITIONS.with_label_values(&["cancelled"]).inc();
        info!(record_id = %record.id, "Acquisition cancelled");
        self.events.publish(DomainEvent::AcquisitionCancelled {
            acquisition_id: record.id.clone(),
            metadata: EventMetadata::default()
                .with_provider(&record.provider)
                .with_client(&record.client_name),
        });
        Ok(record)
    }

    /// Re-initiate a failed, missing or cancelled acquisition from its
    /// stored reference. The new record replaces the old one.
    pub async fn retry(&self, id: &str) -> Result<AcquisitionRecord, ServiceError> {
        let old = self.get(id)?;
        if !old.status.is_retryable() {
            return Err(ServiceError::InvalidState(format!(
                "cannot retry acquisition {}: current status is {}",
                id, old.status
            )));
        }

        // Same client when it is still configured.
        let pinned = self
            .clients
            .get(&old.client_name)
            .map(|_| old.client_name.as_str());
        let client = self.clients.select(pinned)?;

        if client.name() == old.client_name {
            match client.remove(&old.client_id, false).await {
                Ok(()) => debug!(record_id = %old.id, "Removed stale transfer before retry"),
                Err(ClientError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        let record = self.start(client, old.to_new()).await?;
        self.ledger.delete(&old.id)?;
        info!(old_id = %old.id, new_id = %record.id, "Acquisition retried");
        Ok(record)
    }

    /// Delete one record in a terminal status.
    pub fn purge(&self, id: &str) -> Result<(), ServiceError> {
        let record = self.get(id)?;
        if !TERMINAL.contains(&record.status) {
            return Err(ServiceError::InvalidState(format!(
                "cannot purge acquisition {}: current status is {}",
                id, record.status
            )));
        }
        self.ledger.delete(id)?;
        Ok(())
    }

    /// Delete every failed, missing and cancelled record.
    pub fn purge_terminal(&self) -> Result<usize, ServiceError> {
        let records = self
            .ledger
            .list(&LedgerFilter::new().with_statuses(&TERMINAL).with_limit(i64::MAX))?;
        let mut purged = 0;
        for record in records {
            if self.ledger.delete(&record.id)? {
                purged += 1;
            }
        }
        info!(count = purged, "Purged terminal acquisitions");
        Ok(purged)
    }

    pub fn get(&self, id: &str) -> Result<AcquisitionRecord, ServiceError> {
        self.ledger
            .get(id)?
            .ok_or_else(|| ServiceError::NotFound(format!("acquisition {}", id)))
    }

    pub fn list(&self, filter: &LedgerFilter) -> Result<Vec<AcquisitionRecord>, ServiceError> {
        Ok(self.ledger.list(filter)?)
    }

    pub fn library_files(&self, filter: &LibraryFilter) -> Result<Vec<LibraryFile>, ServiceError> {
        Ok(self.library.list(filter)?)
    }

    /// Search for and initiate whatever `item_id` lacks in the library.
    ///
    /// Series go through batch resolution per season; movies get one search
    /// when no file is owned by the item. A failing search or an
    /// unmatched result never stops the remaining ones.
    pub async fn acquire_missing(
        &self,
        item_id: &str,
        season: Option<u32>,
        pinned: Option<&str>,
    ) -> Result<AcquireReport, ServiceError> {
        let item = self.metadata.item(item_id).await?;
        let mut report = AcquireReport {
            item_id: item.id.clone(),
            outcomes: Vec::new(),
        };

        let planned: Vec<(PlannedSearch, PickCriteria, MediaType)> = match item.kind {
            MediaKind::Series => self
                .planner
                .plan(item_id, season, &self.in_flight_sub_items()?)
                .await?
                .into_iter()
                .flat_map(|plan| plan.searches)
                .map(|search| {
                    let criteria = match search.episode {
                        Some(episode) => PickCriteria::Episode {
                            title: item.title.clone(),
                            season: search.season,
                            episode,
                        },
                        None => PickCriteria::SeasonPack {
                            title: item.title.clone(),
                            season: search.season,
                        },
                    };
                    (search, criteria, MediaType::Tv)
                })
                .collect(),
            MediaKind::Movie => {
                let owner = FileOwner::Item {
                    item_id: item.id.clone(),
                };
                if self.library.find_by_owner(&owner)?.is_empty()
                    && !self.item_in_flight(&item.id)?
                {
                    let query = match item.year {
                        Some(year) => format!("{} {}", item.title, year),
                        None => item.title.clone(),
                    };
                    let search = PlannedSearch {
                        query,
                        season: 0,
                        episode: None,
                        target: AcquisitionTarget::item(item.id.clone()),
                        batch: BatchTarget::Single,
                    };
                    let criteria = PickCriteria::Movie {
                        title: item.title.clone(),
                        year: item.year,
                    };
                    vec![(search, criteria, MediaType::Movie)]
                } else {
                    Vec::new()
                }
            }
        };

        for (search, criteria, media_type) in planned {
            let outcome = self.acquire_one(search, &criteria, media_type, pinned).await;
            report.outcomes.push(outcome);
        }

        info!(
            item_id = %item.id,
            searches = report.outcomes.len(),
            initiated = report.initiated(),
            "Missing content requested"
        );
        Ok(report)
    }

    fn in_flight_records(&self) -> Result<Vec<AcquisitionRecord>, ServiceError> {
        let statuses: Vec<AcquisitionStatus> = AcquisitionStatus::ALL
            .into_iter()
            .filter(AcquisitionStatus::is_in_flight)
            .collect();
        Ok(self
            .ledger
            .list(&LedgerFilter::new().with_statuses(&statuses).with_limit(i64::MAX))?)
    }

    /// Sub-items targeted by, or bundled into, a record that has not failed.
    fn in_flight_sub_items(&self) -> Result<HashSet<String>, ServiceError> {
        Ok(self
            .in_flight_records()?
            .iter()
            .flat_map(|record| record.sub_item_ids())
            .map(str::to_string)
            .collect())
    }

    fn item_in_flight(&self, item_id: &str) -> Result<bool, ServiceError> {
        Ok(self.in_flight_records()?.iter().any(|record| {
            matches!(&record.target, AcquisitionTarget::Item { item_id: id } if id == item_id)
        }))
    }

    async fn acquire_one(
        &self,
        search: PlannedSearch,
        criteria: &PickCriteria,
        media_type: MediaType,
        pinned: Option<&str>,
    ) -> AcquireOutcome {
        let query = search.query.clone();
        let request = SearchRequest::new(&query).with_media_type(media_type);
        let found = match self.aggregator.search(&request).await {
            Ok(found) => found,
            Err(e) => {
                warn!(query = %query, error = %e, "Search for missing content failed");
                return AcquireOutcome::Failed {
                    query,
                    error: e.to_string(),
                };
            }
        };

        let Some(pick) = best_pick(&found.results, criteria) else {
            debug!(query = %query, candidates = found.results.len(), "No matching release");
            return AcquireOutcome::NoMatch {
                query,
                candidates: found.results.len(),
            };
        };

        match self
            .initiate(pick, search.target, pinned, search.batch)
            .await
        {
            Ok(record) => AcquireOutcome::Initiated {
                query,
                acquisition_id: record.id,
                title: record.title,
            },
            Err(e) => {
                warn!(query = %query, error = %e, "Failed to initiate acquisition");
                AcquireOutcome::Failed {
                    query,
                    error: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchConfig;
    use crate::client::ClientState;
    use crate::indexer::IndexerRegistry;
    use crate::ledger::SqliteLedger;
    use crate::library::{NewLibraryFile, SqliteLibrary};
    use crate::release::Quality;
    use crate::search::SearchConfig;
    use crate::testing::fixtures::{self, hashed_result, result};
    use crate::testing::{MockClient, MockIndexer};

    struct Harness {
        ledger: Arc<SqliteLedger>,
        library: Arc<SqliteLibrary>,
        client: Arc<MockClient>,
        indexer: Arc<MockIndexer>,
        service: AcquisitionService,
    }

    fn harness(indexer: MockIndexer) -> Harness {
        let ledger = Arc::new(SqliteLedger::in_memory().unwrap());
        let library = Arc::new(SqliteLibrary::in_memory().unwrap());
        let client = Arc::new(MockClient::new("qb"));
        let mut clients = ClientRegistry::new();
        clients.register(client.clone(), true, 0);

        let indexer = Arc::new(indexer);
        let mut indexers = IndexerRegistry::new();
        indexers.register(indexer.clone(), true, 0);
        let aggregator = Arc::new(SearchAggregator::new(
            indexers,
            SearchConfig {
                indexer_timeout_ms: 500,
                ..Default::default()
            },
        ));

        let catalog = fixtures::show_catalog();
        catalog.insert_item(fixtures::movie("heat", "Heat", 1995));
        let metadata: Arc<dyn MetadataProvider> = Arc::new(catalog);
        let planner = BatchPlanner::new(BatchConfig::default(), metadata.clone(), library.clone());

        let service = AcquisitionService::new(
            aggregator,
            clients,
            ledger.clone(),
            library.clone(),
            metadata,
            planner,
            EventBus::default(),
        );
        Harness {
            ledger,
            library,
            client,
            indexer,
            service,
        }
    }

    fn own_episode(library: &SqliteLibrary, episode: u32) {
        library
            .upsert(NewLibraryFile {
                root: "/lib".into(),
                relative_path: format!("Show/Season 01/Show - S01E{:02}.mkv", episode),
                size_bytes: 1,
                quality: Quality::default(),
                owner: FileOwner::SubItem {
                    sub_item_id: format!("show-s01e{:02}", episode),
                },
                release_group: None,
                source_name: None,
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_initiate_adds_and_records() {
        let h = harness(MockIndexer::new("idx"));
        let mut events = h.service.events().subscribe();
        let picked = hashed_result("Show.S01E02.1080p", 10);

        let record = h
            .service
            .initiate(&picked, AcquisitionTarget::sub_item("show-s01e02"), None, BatchTarget::Single)
            .await
            .unwrap();

        assert_eq!(record.status, AcquisitionStatus::Pending);
        assert_eq!(record.client_name, "qb");
        assert_eq!(record.client_id, fixtures::fake_hash("Show.S01E02.1080p"));
        assert_eq!(h.client.added().len(), 1);
        assert_eq!(events.recv().await.unwrap().kind(), "acquisition_initiated");
    }

    #[tokio::test]
    async fn test_initiate_rejects_unknown_target_and_client() {
        let h = harness(MockIndexer::new("idx"));
        let picked = result("Show.S01E02.1080p", 10);

        let err = h
            .service
            .initiate(&picked, AcquisitionTarget::sub_item("nope"), None, BatchTarget::Single)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let err = h
            .service
            .initiate(
                &picked,
                AcquisitionTarget::sub_item("show-s01e02"),
                Some("missing-client"),
                BatchTarget::Single,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert!(h.client.added().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_removes_transfer() {
        let h = harness(MockIndexer::new("idx"));
        let picked = result("Show.S01E02.1080p", 10);
        let record = h
            .service
            .initiate(&picked, AcquisitionTarget::sub_item("show-s01e02"), None, BatchTarget::Single)
            .await
            .unwrap();

        let cancelled = h.service.cancel(&record.id).await.unwrap();
        assert_eq!(cancelled.status, AcquisitionStatus::Cancelled);
        assert_eq!(h.client.removed(), vec![(record.client_id.clone(), true)]);

        let err = h.service.cancel(&record.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_importing_record_cannot_be_cancelled() {
        let h = harness(MockIndexer::new("idx"));
        let picked = result("Show.S01E02.1080p", 10);
        let record = h
            .service
            .initiate(&picked, AcquisitionTarget::sub_item("show-s01e02"), None, BatchTarget::Single)
            .await
            .unwrap();
        h.ledger
            .transition(&record.id, &[AcquisitionStatus::Pending], AcquisitionStatus::Completed, None)
            .unwrap();
        h.ledger.claim_for_import(&record.id).unwrap();

        assert!(matches!(
            h.service.cancel(&record.id).await,
            Err(ServiceError::InvalidState(_))
        ));
        assert!(h.client.removed().is_empty());
    }

    #[tokio::test]
    async fn test_retry_replaces_failed_record() {
        let h = harness(MockIndexer::new("idx"));
        let picked = result("Show.S01E02.1080p", 10);
        let record = h
            .service
            .initiate(&picked, AcquisitionTarget::sub_item("show-s01e02"), None, BatchTarget::Single)
            .await
            .unwrap();

        let err = h.service.retry(&record.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        h.client.set_error(&record.client_id, "tracker down");
        h.ledger
            .transition(
                &record.id,
                &[AcquisitionStatus::Pending],
                AcquisitionStatus::Failed,
                Some("tracker down"),
            )
            .unwrap();

        let retried = h.service.retry(&record.id).await.unwrap();
        assert_ne!(retried.id, record.id);
        assert_eq!(retried.reference, record.reference);
        assert_eq!(retried.target, record.target);
        assert_eq!(retried.status, AcquisitionStatus::Pending);
        assert!(h.ledger.get(&record.id).unwrap().is_none());
        assert_eq!(h.client.added().len(), 2);
    }

    #[tokio::test]
    async fn test_purge_only_terminal() {
        let h = harness(MockIndexer::new("idx"));
        let picked = result("Show.S01E02.1080p", 10);
        let record = h
            .service
            .initiate(&picked, AcquisitionTarget::sub_item("show-s01e02"), None, BatchTarget::Single)
            .await
            .unwrap();
        assert!(matches!(
            h.service.purge(&record.id),
            Err(ServiceError::InvalidState(_))
        ));

        h.service.cancel(&record.id).await.unwrap();
        assert_eq!(h.service.purge_terminal().unwrap(), 1);
        assert!(matches!(h.service.get(&record.id), Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_acquire_missing_mostly_missing_season_uses_one_pack() {
        let indexer = MockIndexer::new("idx").with_results(vec![
            result("Show.S01E05.2160p.WEB-DL", 90),
            result("Show.S01.1080p.BluRay", 40),
        ]);
        let h = harness(indexer);
        own_episode(&h.library, 1);
        own_episode(&h.library, 2);

        let report = h.service.acquire_missing("show", None, None).await.unwrap();

        assert_eq!(h.indexer.queries(), vec!["Show S01".to_string()]);
        assert_eq!(report.initiated(), 1);
        let records = h.ledger.list(&LedgerFilter::new()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Show.S01.1080p.BluRay");
        assert_eq!(records[0].target, AcquisitionTarget::item("show"));
        match &records[0].batch {
            BatchTarget::Batch { sub_item_ids } => assert_eq!(sub_item_ids.len(), 8),
            other => panic!("unexpected batch marker: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_acquire_missing_few_missing_searches_each() {
        let indexer = MockIndexer::new("idx").with_results(vec![
            result("Show.S01E03.1080p", 10),
            result("Show.S01E07.720p", 10),
        ]);
        let h = harness(indexer);
        for e in [1, 2, 4, 5, 6, 8, 9, 10] {
            own_episode(&h.library, e);
        }

        let report = h.service.acquire_missing("show", Some(1), None).await.unwrap();

        assert_eq!(
            h.indexer.queries(),
            vec!["Show S01E03".to_string(), "Show S01E07".to_string()]
        );
        assert_eq!(report.initiated(), 2);
        let targets: Vec<_> = h
            .ledger
            .list(&LedgerFilter::new())
            .unwrap()
            .into_iter()
            .map(|r| r.target)
            .collect();
        assert!(targets.contains(&AcquisitionTarget::sub_item("show-s01e03")));
        assert!(targets.contains(&AcquisitionTarget::sub_item("show-s01e07")));
    }

    #[tokio::test]
    async fn test_acquire_missing_skips_sub_items_in_flight() {
        let indexer = MockIndexer::new("idx").with_results(vec![
            result("Show.S01E03.1080p", 10),
            result("Show.S01E07.720p", 10),
        ]);
        let h = harness(indexer);
        for e in [1, 2, 4, 5, 6, 8, 9, 10] {
            own_episode(&h.library, e);
        }

        let first = h.service.acquire_missing("show", Some(1), None).await.unwrap();
        assert_eq!(first.initiated(), 2);

        let second = h.service.acquire_missing("show", Some(1), None).await.unwrap();
        assert_eq!(second.initiated(), 0);
        assert!(second.outcomes.is_empty());
        assert_eq!(h.indexer.queries().len(), 2);
        assert_eq!(h.ledger.list(&LedgerFilter::new()).unwrap().len(), 2);

        // A cancelled acquisition no longer covers its sub-item.
        let records = h.ledger.list(&LedgerFilter::new()).unwrap();
        let e03 = records
            .iter()
            .find(|r| r.target == AcquisitionTarget::sub_item("show-s01e03"))
            .unwrap();
        h.service.cancel(&e03.id).await.unwrap();
        let third = h.service.acquire_missing("show", Some(1), None).await.unwrap();
        assert_eq!(third.initiated(), 1);
        assert_eq!(h.indexer.queries().last().unwrap(), "Show S01E03");
    }

    #[tokio::test]
    async fn test_acquire_missing_skips_episodes_bundled_in_a_pack() {
        let indexer =
            MockIndexer::new("idx").with_results(vec![result("Show.S01.1080p.BluRay", 40)]);
        let h = harness(indexer);

        let first = h.service.acquire_missing("show", Some(1), None).await.unwrap();
        assert_eq!(first.initiated(), 1);

        let second = h.service.acquire_missing("show", Some(1), None).await.unwrap();
        assert!(second.outcomes.is_empty());
        assert_eq!(h.ledger.list(&LedgerFilter::new()).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_acquire_missing_movie_without_match() {
        let indexer = MockIndexer::new("idx").with_results(vec![result("Heat.2030.1080p", 10)]);
        let h = harness(indexer);

        let report = h.service.acquire_missing("heat", None, None).await.unwrap();
        assert_eq!(h.indexer.queries(), vec!["Heat 1995".to_string()]);
        assert!(matches!(
            report.outcomes[0],
            AcquireOutcome::NoMatch { candidates: 1, .. }
        ));
        assert!(h.client.added().is_empty());
    }

    #[tokio::test]
    async fn test_client_state_after_initiate_is_queued() {
        let h = harness(MockIndexer::new("idx"));
        let picked = result("Show.S01E02.1080p", 10);
        let record = h
            .service
            .initiate(&picked, AcquisitionTarget::sub_item("show-s01e02"), None, BatchTarget::Single)
            .await
            .unwrap();
        let snapshot = h.client.get_status(&record.client_id).await.unwrap();
        assert_eq!(snapshot.state, ClientState::Queued);
    }
}
