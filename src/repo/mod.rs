use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::domain::{Alert, AlertFilter, Building, PowerHistoryRecord};

pub mod memory;
#[cfg(feature = "db")]
pub mod pg;

pub use memory::MemoryStore;

/// Upper bound on rows returned by an alert query.
pub const ALERT_QUERY_LIMIT: usize = 100;

#[async_trait]
pub trait BuildingRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Building>>;
    async fn get(&self, id: &str) -> Result<Option<Building>>;
    /// Insert or replace by id.
    async fn upsert(&self, building: &Building) -> Result<()>;
}

#[async_trait]
pub trait PowerHistoryRepository: Send + Sync {
    async fn append(&self, record: &PowerHistoryRecord) -> Result<()>;
    /// Newest first, at most `limit` rows.
    async fn recent(&self, building_id: &str, limit: usize) -> Result<Vec<PowerHistoryRecord>>;
}

#[async_trait]
pub trait AlertRepository: Send + Sync {
    async fn insert(&self, alert: &Alert) -> Result<()>;
    /// Returns whether an alert with this id exists.
    async fn acknowledge(&self, id: &str, at: DateTime<Utc>) -> Result<bool>;
    /// Newest first, at most `limit` rows.
    async fn query(&self, filter: &AlertFilter, limit: usize) -> Result<Vec<Alert>>;
}

/// The three collections the service persists to.
#[derive(Clone)]
pub struct Repositories {
    pub buildings: Arc<dyn BuildingRepository>,
    pub history: Arc<dyn PowerHistoryRepository>,
    pub alerts: Arc<dyn AlertRepository>,
}

impl Repositories {
    pub async fn new(cfg: &Config) -> Result<Self> {
        #[cfg(feature = "db")]
        {
            let pg = Arc::new(crate::repo::pg::PgRepo::connect(&cfg.db.url).await?);
            info!("using postgres storage");
            return Ok(Self::from_store(pg));
        }

        #[cfg(not(feature = "db"))]
        {
            let _ = cfg;
            info!("using in-memory storage");
            return Ok(Self::in_memory());
        }
    }

    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(MemoryStore::default()))
    }

    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: BuildingRepository + PowerHistoryRepository + AlertRepository + 'static,
    {
        Self {
            buildings: store.clone(),
            history: store.clone(),
            alerts: store,
        }
    }

    /// Inserts `seed` when no buildings are stored yet. Returns how many were added.
    pub async fn seed_buildings_if_empty(&self, seed: Vec<Building>) -> Result<usize> {
        if !self.buildings.list().await?.is_empty() {
            return Ok(0);
        }
        let count = seed.len();
        for building in &seed {
            self.buildings.upsert(building).await?;
        }
        info!(count, "seeded buildings");
        Ok(count)
    }
}
