use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Reference data ---

/// Result of a `/universe/names` lookup. Ids are shared across regions,
/// constellations and systems, `category` tells them apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsiName {
    pub category: String,
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsiSystem {
    pub system_id: i64,
    pub name: String,
    pub constellation_id: i64,
    /// Roughly -1.0 (null sec) to 1.0 (high sec).
    pub security_status: f32,
    #[serde(default)]
    pub security_class: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsiConstellation {
    pub constellation_id: i64,
    pub name: String,
    pub region_id: i64,
    /// Not part of the ESI payload; filled from the names cache when fetched.
    #[serde(default)]
    pub region_name: String,
    #[serde(default)]
    pub systems: Vec<i64>,
}

// --- Incursions ---

/// An active incursion. Identified across polls by its staging system.
///
/// The raw ESI payload only carries the ids. `constellation_name`,
/// `region_name`, `staging_system` and `route` are enrichment filled in
/// after the fetch; they default to empty so freshly fetched and persisted
/// lists share one type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsiIncursion {
    pub constellation_id: i64,
    pub faction_id: i64,
    pub staging_solar_system_id: i64,
    #[serde(default)]
    pub has_boss: bool,
    #[serde(default)]
    pub infested_solar_systems: Vec<i64>,
    /// Fraction between 0.0 and 1.0.
    #[serde(default)]
    pub influence: f32,
    /// Lifecycle state: "established", "mobilizing", "withdrawing", ...
    pub state: String,
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub constellation_name: String,
    #[serde(default)]
    pub region_name: String,
    #[serde(default)]
    pub staging_system: Option<EsiSystem>,
    /// System ids from the reference system to the staging system, both ends included.
    #[serde(default)]
    pub route: Vec<i64>,
}

impl EsiIncursion {
    /// Jumps from the reference system. `None` until the route has been resolved.
    pub fn jump_count(&self) -> Option<usize> {
        self.route.len().checked_sub(1)
    }

    pub fn staging_security(&self) -> Option<f32> {
        self.staging_system.as_ref().map(|s| s.security_status)
    }
}

// --- Server status ---

#[derive(Debug, Clone, Deserialize)]
pub struct EsiStatus {
    pub players: i64,
    pub server_version: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub vip: Option<bool>,
}
