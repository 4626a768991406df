//! Shared fixtures: a scripted ESI fetcher and payload builders.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use esi_client::{EsiError, EsiName, RemoteFetcher};
use incursion_watch::{EntityCache, KvStore, MemoryStore, SnapshotService};
use serde_json::{json, Value};

pub const JITA: i64 = 30000142;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Get(String),
    Post(String, Value),
}

/// Scripted `RemoteFetcher`. GET paths answer with canned bodies; the names
/// endpoint answers with whichever requested ids are known. Every call is
/// recorded for assertions.
#[derive(Default)]
pub struct StubFetcher {
    responses: Mutex<HashMap<String, Vec<u8>>>,
    names: Mutex<HashMap<i64, EsiName>>,
    calls: Mutex<Vec<Call>>,
}

impl StubFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, path: &str, body: Value) {
        self.respond_raw(path, body.to_string().into_bytes());
    }

    pub fn respond_raw(&self, path: &str, body: Vec<u8>) {
        self.responses
            .lock()
            .unwrap()
            .insert(path.to_string(), body);
    }

    /// Make `path` fail with a network error.
    pub fn fail(&self, path: &str) {
        self.responses.lock().unwrap().remove(path);
    }

    pub fn name(&self, id: i64, category: &str, name: &str) {
        self.names.lock().unwrap().insert(
            id,
            EsiName {
                category: category.into(),
                id,
                name: name.into(),
            },
        );
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn gets_of(&self, path: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Get(p) if p == path))
            .count()
    }

    pub fn post_bodies(&self) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Post(_, body) => Some(body),
                Call::Get(_) => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl RemoteFetcher for StubFetcher {
    async fn get_bytes(&self, path: &str) -> esi_client::Result<Vec<u8>> {
        self.calls.lock().unwrap().push(Call::Get(path.to_string()));
        self.responses
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| EsiError::Network(format!("no stub for {path}")))
    }

    async fn post_bytes(&self, path: &str, body: &Value) -> esi_client::Result<Vec<u8>> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Post(path.to_string(), body.clone()));

        let ids: Vec<i64> = serde_json::from_value(body.clone())?;
        let names = self.names.lock().unwrap();
        let found: Vec<&EsiName> = ids.iter().filter_map(|id| names.get(id)).collect();
        Ok(serde_json::to_vec(&found)?)
    }
}

// --- Payload builders ---

pub fn raw_incursion(staging: i64, constellation: i64, state: &str) -> Value {
    json!({
        "constellation_id": constellation,
        "faction_id": 500019,
        "has_boss": false,
        "infested_solar_systems": [staging],
        "influence": 0.25,
        "staging_solar_system_id": staging,
        "state": state,
        "type": "Incursion"
    })
}

pub fn system(id: i64, name: &str, security: f32) -> Value {
    json!({
        "system_id": id,
        "name": name,
        "constellation_id": 20000001,
        "security_status": security,
        "security_class": "C"
    })
}

pub fn constellation(id: i64, name: &str, region_id: i64) -> Value {
    json!({
        "constellation_id": id,
        "name": name,
        "region_id": region_id,
        "systems": [30000001, 30000002]
    })
}

/// Stub out all reference data for one incursion staged at `staging`.
pub fn stub_world(
    fetcher: &StubFetcher,
    staging: i64,
    system_name: &str,
    security: f32,
    constellation_id: i64,
) {
    fetcher.respond(
        &format!("/latest/universe/systems/{staging}"),
        system(staging, system_name, security),
    );
    fetcher.respond(
        &format!("/latest/universe/constellations/{constellation_id}"),
        constellation(constellation_id, &format!("Const {constellation_id}"), 10000001),
    );
    fetcher.respond(
        &format!("/latest/route/{JITA}/{staging}"),
        json!([JITA, 30000144, staging]),
    );
    fetcher.name(constellation_id, "constellation", &format!("Const {constellation_id}"));
    fetcher.name(10000001, "region", "Pure Blind");
}

pub struct Harness {
    pub fetcher: Arc<StubFetcher>,
    pub store: Arc<MemoryStore>,
    pub cache: Arc<EntityCache>,
}

impl Harness {
    pub fn new() -> Self {
        let fetcher = StubFetcher::new();
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(EntityCache::new(fetcher.clone(), store.clone()));
        Self {
            fetcher,
            store,
            cache,
        }
    }

    pub fn snapshots(&self) -> SnapshotService {
        SnapshotService::new(
            self.fetcher.clone(),
            self.cache.clone(),
            self.store.clone() as Arc<dyn KvStore>,
            JITA,
        )
    }
}
