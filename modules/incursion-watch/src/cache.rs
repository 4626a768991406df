//! Two-tier read-through cache for ESI reference data.
//!
//! Lookup order is in-process map, then the persistent store. `resolve_*`
//! never touches the network: a miss on both tiers returns `None` and the
//! caller decides whether to pay for a fetch (`fetch_*`, or `ensure_*` which
//! does resolve-then-fetch). Store hits are not copied into the map; the map
//! only warms as a side effect of a fetch.
//!
//! Nothing is negatively cached. A failed or malformed fetch caches nothing
//! and the next call goes back to the network.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock};

use esi_client::{EsiConstellation, EsiName, EsiSystem, RemoteFetcher};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::store::KvStore;

const NAMES_PATH: &str = "/latest/universe/names";

pub fn name_key(id: i64) -> String {
    format!("esi:names:{id}")
}

pub fn system_key(id: i64) -> String {
    format!("esi:systems:{id}")
}

pub fn constellation_key(id: i64) -> String {
    format!("esi:constellations:{id}")
}

pub fn route_key(src: i64, dst: i64) -> String {
    format!("esi:routes:{src}:{dst}")
}

/// De-duplicate ids, keeping the first occurrence order.
pub fn unique_ids(ids: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

type Map<K, V> = RwLock<HashMap<K, V>>;

/// Process-wide reference data cache. Constructed once and shared by `Arc`.
/// Entries are never evicted; names, systems and routes do not change.
pub struct EntityCache {
    fetcher: Arc<dyn RemoteFetcher>,
    store: Arc<dyn KvStore>,
    names: Map<i64, EsiName>,
    systems: Map<i64, EsiSystem>,
    constellations: Map<i64, EsiConstellation>,
    routes: Map<(i64, i64), Vec<i64>>,
}

impl EntityCache {
    pub fn new(fetcher: Arc<dyn RemoteFetcher>, store: Arc<dyn KvStore>) -> Self {
        Self {
            fetcher,
            store,
            names: RwLock::new(HashMap::new()),
            systems: RwLock::new(HashMap::new()),
            constellations: RwLock::new(HashMap::new()),
            routes: RwLock::new(HashMap::new()),
        }
    }

    // --- Names ---

    pub async fn resolve_name(&self, id: i64) -> Option<EsiName> {
        if let Some(name) = from_memory(&self.names, &id) {
            return Some(name);
        }
        self.from_store(&name_key(id)).await
    }

    /// Batched `/universe/names` lookup. Duplicate ids are collapsed before
    /// the request; each returned name populates both tiers.
    pub async fn fetch_names(&self, ids: &[i64]) -> Option<Vec<EsiName>> {
        let ids = unique_ids(ids);
        if ids.is_empty() {
            return Some(Vec::new());
        }

        let body = serde_json::json!(ids);
        let bytes = match self.fetcher.post_bytes(NAMES_PATH, &body).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, count = ids.len(), "Failed to fetch names");
                return None;
            }
        };

        let names: Vec<EsiName> = match serde_json::from_slice(&bytes) {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "Malformed names response");
                return None;
            }
        };

        for name in &names {
            self.populate(&self.names, name.id, &name_key(name.id), name)
                .await;
        }

        debug!(requested = ids.len(), resolved = names.len(), "Fetched names");
        Some(names)
    }

    // --- Systems ---

    pub async fn resolve_system(&self, id: i64) -> Option<EsiSystem> {
        if let Some(system) = from_memory(&self.systems, &id) {
            return Some(system);
        }
        self.from_store(&system_key(id)).await
    }

    pub async fn fetch_system(&self, id: i64) -> Option<EsiSystem> {
        let system: EsiSystem = self
            .fetch_json(&format!("/latest/universe/systems/{id}"))
            .await?;
        self.populate(&self.systems, id, &system_key(id), &system)
            .await;
        Some(system)
    }

    pub async fn ensure_system(&self, id: i64) -> Option<EsiSystem> {
        match self.resolve_system(id).await {
            Some(system) => Some(system),
            None => self.fetch_system(id).await,
        }
    }

    // --- Constellations ---

    pub async fn resolve_constellation(&self, id: i64) -> Option<EsiConstellation> {
        if let Some(constellation) = from_memory(&self.constellations, &id) {
            return Some(constellation);
        }
        self.from_store(&constellation_key(id)).await
    }

    /// Fetch a constellation and resolve its region name. An unresolvable
    /// region leaves `region_name` empty; the constellation is cached anyway.
    pub async fn fetch_constellation(&self, id: i64) -> Option<EsiConstellation> {
        let mut constellation: EsiConstellation = self
            .fetch_json(&format!("/latest/universe/constellations/{id}"))
            .await?;

        match self.region_name(constellation.region_id).await {
            Some(region) => constellation.region_name = region,
            None => warn!(
                constellation_id = id,
                region_id = constellation.region_id,
                "Could not resolve region name"
            ),
        }

        self.populate(
            &self.constellations,
            id,
            &constellation_key(id),
            &constellation,
        )
        .await;
        Some(constellation)
    }

    pub async fn ensure_constellation(&self, id: i64) -> Option<EsiConstellation> {
        match self.resolve_constellation(id).await {
            Some(constellation) => Some(constellation),
            None => self.fetch_constellation(id).await,
        }
    }

    async fn region_name(&self, region_id: i64) -> Option<String> {
        if let Some(name) = self.resolve_name(region_id).await {
            return Some(name.name);
        }
        self.fetch_names(&[region_id]).await?;
        self.resolve_name(region_id).await.map(|n| n.name)
    }

    // --- Routes ---

    pub async fn resolve_route(&self, src: i64, dst: i64) -> Option<Vec<i64>> {
        if let Some(route) = from_memory(&self.routes, &(src, dst)) {
            return Some(route);
        }
        self.from_store(&route_key(src, dst)).await
    }

    pub async fn fetch_route(&self, src: i64, dst: i64) -> Option<Vec<i64>> {
        let route: Vec<i64> = self
            .fetch_json(&format!("/latest/route/{src}/{dst}"))
            .await?;
        self.populate(&self.routes, (src, dst), &route_key(src, dst), &route)
            .await;
        Some(route)
    }

    pub async fn ensure_route(&self, src: i64, dst: i64) -> Option<Vec<i64>> {
        match self.resolve_route(src, dst).await {
            Some(route) => Some(route),
            None => self.fetch_route(src, dst).await,
        }
    }

    // --- Tier helpers ---

    async fn from_store<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        let bytes = match self.store.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "Store read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Undecodable store entry, treating as miss");
                None
            }
        }
    }

    async fn fetch_json<V: DeserializeOwned>(&self, path: &str) -> Option<V> {
        let bytes = match self.fetcher.get_bytes(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path, error = %e, "ESI request failed");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path, error = %e, "Malformed ESI response");
                None
            }
        }
    }

    async fn populate<K, V>(&self, map: &Map<K, V>, id: K, key: &str, value: &V)
    where
        K: Eq + Hash,
        V: Clone + Serialize,
    {
        map.write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, value.clone());

        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize cache entry");
                return;
            }
        };

        // Best-effort: the in-process tier is already warm.
        if let Err(e) = self.store.set(key, &bytes).await {
            warn!(key, error = %e, "Failed to write cache entry to store");
        }
    }
}

fn from_memory<K: Eq + Hash, V: Clone>(map: &Map<K, V>, id: &K) -> Option<V> {
    map.read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(id)
        .cloned()
}
