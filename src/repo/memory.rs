//! Process-local store, used when no database is configured and in tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{AlertRepository, BuildingRepository, PowerHistoryRepository};
use crate::domain::{Alert, AlertFilter, Building, PowerHistoryRecord};

#[derive(Default)]
pub struct MemoryStore {
    buildings: RwLock<Vec<Building>>,
    history: RwLock<Vec<PowerHistoryRecord>>,
    alerts: RwLock<Vec<Alert>>,
}

#[async_trait]
impl BuildingRepository for MemoryStore {
    async fn list(&self) -> Result<Vec<Building>> {
        Ok(self.buildings.read().await.clone())
    }

    async fn get(&self, id: &str) -> Result<Option<Building>> {
        Ok(self.buildings.read().await.iter().find(|b| b.id == id).cloned())
    }

    async fn upsert(&self, building: &Building) -> Result<()> {
        let mut buildings = self.buildings.write().await;
        match buildings.iter_mut().find(|b| b.id == building.id) {
            Some(existing) => *existing = building.clone(),
            None => buildings.push(building.clone()),
        }
        Ok(())
    }
}

#[async_trait]
impl PowerHistoryRepository for MemoryStore {
    async fn append(&self, record: &PowerHistoryRecord) -> Result<()> {
        self.history.write().await.push(record.clone());
        Ok(())
    }

    async fn recent(&self, building_id: &str, limit: usize) -> Result<Vec<PowerHistoryRecord>> {
        let history = self.history.read().await;
        let mut rows: Vec<_> = history
            .iter()
            .filter(|r| r.building_id == building_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        rows.truncate(limit);
        Ok(rows)
    }
}

#[async_trait]
impl AlertRepository for MemoryStore {
    async fn insert(&self, alert: &Alert) -> Result<()> {
        self.alerts.write().await.push(alert.clone());
        Ok(())
    }

    async fn acknowledge(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        let mut alerts = self.alerts.write().await;
        match alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                if !alert.acknowledged {
                    alert.acknowledged = true;
                    alert.acknowledged_at = Some(at);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn query(&self, filter: &AlertFilter, limit: usize) -> Result<Vec<Alert>> {
        let alerts = self.alerts.read().await;
        let mut rows: Vec<_> = alerts.iter().filter(|a| filter.matches(a)).cloned().collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        rows.truncate(limit);
        Ok(rows)
    }
}
