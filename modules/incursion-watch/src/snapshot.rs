//! Incursion list with a staleness window and in-place enrichment.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use esi_client::{EsiIncursion, RemoteFetcher};
use tracing::{debug, info, warn};

use crate::cache::EntityCache;
use crate::store::KvStore;

const INCURSIONS_PATH: &str = "/latest/incursions";

/// Store key holding the last enriched incursion list.
pub const INCURSIONS_KEY: &str = "incursions";

/// Minimum time between remote fetches of the incursion list.
pub const DEFAULT_STALENESS_SECS: i64 = 300;

/// Result of `SnapshotService::get_snapshot`.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub incursions: Vec<EsiIncursion>,
    /// True only when this call performed a successful remote fetch.
    pub refreshed: bool,
}

impl Snapshot {
    fn cached(incursions: Vec<EsiIncursion>) -> Self {
        Self {
            incursions,
            refreshed: false,
        }
    }
}

pub struct SnapshotService {
    fetcher: Arc<dyn RemoteFetcher>,
    cache: Arc<EntityCache>,
    store: Arc<dyn KvStore>,
    /// Route origin for the jump count.
    reference_system_id: i64,
    staleness: Duration,
    retained: Vec<EsiIncursion>,
    last_fetch: Option<DateTime<Utc>>,
}

impl SnapshotService {
    pub fn new(
        fetcher: Arc<dyn RemoteFetcher>,
        cache: Arc<EntityCache>,
        store: Arc<dyn KvStore>,
        reference_system_id: i64,
    ) -> Self {
        Self {
            fetcher,
            cache,
            store,
            reference_system_id,
            staleness: Duration::seconds(DEFAULT_STALENESS_SECS),
            retained: Vec::new(),
            last_fetch: None,
        }
    }

    pub fn with_staleness(mut self, staleness: Duration) -> Self {
        self.staleness = staleness;
        self
    }

    pub fn last_fetch(&self) -> Option<DateTime<Utc>> {
        self.last_fetch
    }

    pub async fn get_snapshot(&mut self) -> Snapshot {
        self.get_snapshot_at(Utc::now()).await
    }

    /// Within the staleness window the retained list is returned without a
    /// network call. A failed fetch returns an empty, unrefreshed snapshot and
    /// leaves `last_fetch` untouched so the next call retries immediately.
    pub async fn get_snapshot_at(&mut self, now: DateTime<Utc>) -> Snapshot {
        if let Some(last) = self.last_fetch {
            if now - last < self.staleness {
                debug!(age_secs = (now - last).num_seconds(), "Serving cached incursions");
                return Snapshot::cached(self.retained.clone());
            }
        }

        let bytes = match self.fetcher.get_bytes(INCURSIONS_PATH).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Failed to fetch incursions");
                return Snapshot::default();
            }
        };

        let mut incursions: Vec<EsiIncursion> = match serde_json::from_slice(&bytes) {
            Ok(incursions) => incursions,
            Err(e) => {
                warn!(error = %e, "Malformed incursions response");
                return Snapshot::default();
            }
        };

        self.enrich(&mut incursions).await;

        self.retained = incursions.clone();
        self.last_fetch = Some(now);
        self.persist(&incursions).await;

        info!(count = incursions.len(), "Fetched incursions");
        Snapshot {
            incursions,
            refreshed: true,
        }
    }

    /// Fill names, staging system, region and route on every record.
    /// Already-populated fields are skipped, so running this twice is a no-op.
    pub async fn enrich(&self, incursions: &mut [EsiIncursion]) {
        let mut missing = Vec::new();
        for incursion in incursions.iter_mut() {
            if !self.apply_constellation_name(incursion).await {
                missing.push(incursion.constellation_id);
            }
        }

        if !missing.is_empty() {
            self.cache.fetch_names(&missing).await;
            for incursion in incursions.iter_mut() {
                self.apply_constellation_name(incursion).await;
            }
        }

        for incursion in incursions.iter_mut() {
            if incursion.staging_system.is_none() {
                incursion.staging_system = self
                    .cache
                    .ensure_system(incursion.staging_solar_system_id)
                    .await;
            }

            if incursion.region_name.is_empty() {
                if let Some(constellation) = self
                    .cache
                    .ensure_constellation(incursion.constellation_id)
                    .await
                {
                    incursion.region_name = constellation.region_name;
                }
            }

            if incursion.route.is_empty() {
                incursion.route = self
                    .cache
                    .ensure_route(self.reference_system_id, incursion.staging_solar_system_id)
                    .await
                    .unwrap_or_default();
            }
        }
    }

    /// Returns false when the name is still unknown after the lookup.
    async fn apply_constellation_name(&self, incursion: &mut EsiIncursion) -> bool {
        if !incursion.constellation_name.is_empty() {
            return true;
        }
        match self.cache.resolve_name(incursion.constellation_id).await {
            Some(name) => {
                incursion.constellation_name = name.name;
                true
            }
            None => false,
        }
    }

    async fn persist(&self, incursions: &[EsiIncursion]) {
        let bytes = match serde_json::to_vec(incursions) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Failed to serialize incursions");
                return;
            }
        };
        if let Err(e) = self.store.set(INCURSIONS_KEY, &bytes).await {
            warn!(error = %e, "Failed to persist incursions");
        }
    }

    /// Load the last persisted list and re-enrich it. Used once at startup to
    /// seed the diff engine without waiting out a staleness window.
    pub async fn restore(&self) -> Option<Vec<EsiIncursion>> {
        let bytes = match self.store.get(INCURSIONS_KEY).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                info!("No saved incursions to restore");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read saved incursions");
                return None;
            }
        };

        let mut incursions: Vec<EsiIncursion> = match serde_json::from_slice(&bytes) {
            Ok(incursions) => incursions,
            Err(e) => {
                warn!(error = %e, "Unable to parse saved incursions");
                return None;
            }
        };

        self.enrich(&mut incursions).await;
        info!(count = incursions.len(), "Restored saved incursions");
        Some(incursions)
    }
}
