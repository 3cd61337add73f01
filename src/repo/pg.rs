#![cfg(feature = "db")]
//! Postgres storage. Each collection keeps the full document as JSONB plus
//! the columns it is queried by.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Postgres, QueryBuilder, Row};

use super::{AlertRepository, BuildingRepository, PowerHistoryRepository};
use crate::domain::{Alert, AlertFilter, Building, PowerHistoryRecord};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS buildings (
    id TEXT PRIMARY KEY,
    payload JSONB NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE IF NOT EXISTS power_history (
    id BIGSERIAL PRIMARY KEY,
    building_id TEXT NOT NULL,
    timestamp TIMESTAMPTZ NOT NULL,
    payload JSONB NOT NULL
);
CREATE INDEX IF NOT EXISTS power_history_building_ts ON power_history (building_id, timestamp DESC);
CREATE TABLE IF NOT EXISTS alerts (
    id TEXT PRIMARY KEY,
    building_id TEXT NOT NULL,
    severity TEXT NOT NULL,
    acknowledged BOOLEAN NOT NULL DEFAULT FALSE,
    acknowledged_at TIMESTAMPTZ,
    timestamp TIMESTAMPTZ NOT NULL,
    payload JSONB NOT NULL
);
CREATE INDEX IF NOT EXISTS alerts_building_ts ON alerts (building_id, timestamp DESC);
CREATE INDEX IF NOT EXISTS alerts_severity_ack ON alerts (severity, acknowledged);
"#;

pub struct PgRepo {
    pub pool: PgPool,
}

impl PgRepo {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .context("failed to connect to postgres")?;
        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .context("failed to apply schema")?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl BuildingRepository for PgRepo {
    async fn list(&self) -> Result<Vec<Building>> {
        let rows = sqlx::query("SELECT payload FROM buildings ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| -> Result<Building> { Ok(row.try_get::<Json<Building>, _>("payload")?.0) })
            .collect()
    }

    async fn get(&self, id: &str) -> Result<Option<Building>> {
        let row = sqlx::query("SELECT payload FROM buildings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| -> Result<Building> { Ok(r.try_get::<Json<Building>, _>("payload")?.0) })
            .transpose()
    }

    async fn upsert(&self, building: &Building) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO buildings (id, payload, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET payload = EXCLUDED.payload, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&building.id)
        .bind(Json(building))
        .bind(building.last_updated)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl PowerHistoryRepository for PgRepo {
    async fn append(&self, record: &PowerHistoryRecord) -> Result<()> {
        sqlx::query("INSERT INTO power_history (building_id, timestamp, payload) VALUES ($1, $2, $3)")
            .bind(&record.building_id)
            .bind(record.timestamp)
            .bind(Json(record))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn recent(&self, building_id: &str, limit: usize) -> Result<Vec<PowerHistoryRecord>> {
        let rows = sqlx::query(
            "SELECT payload FROM power_history WHERE building_id = $1 ORDER BY timestamp DESC LIMIT $2",
        )
        .bind(building_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| -> Result<PowerHistoryRecord> { Ok(row.try_get::<Json<PowerHistoryRecord>, _>("payload")?.0) })
            .collect()
    }
}

#[async_trait]
impl AlertRepository for PgRepo {
    async fn insert(&self, alert: &Alert) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO alerts (id, building_id, severity, acknowledged, acknowledged_at, timestamp, payload)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&alert.id)
        .bind(&alert.building_id)
        .bind(alert.severity.to_string())
        .bind(alert.acknowledged)
        .bind(alert.acknowledged_at)
        .bind(alert.timestamp)
        .bind(Json(alert))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn acknowledge(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE alerts
            SET acknowledged = TRUE, acknowledged_at = COALESCE(acknowledged_at, $2)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn query(&self, filter: &AlertFilter, limit: usize) -> Result<Vec<Alert>> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "SELECT payload, acknowledged, acknowledged_at FROM alerts WHERE TRUE",
        );
        if let Some(building_id) = &filter.building_id {
            qb.push(" AND building_id = ").push_bind(building_id.clone());
        }
        if let Some(acknowledged) = filter.acknowledged {
            qb.push(" AND acknowledged = ").push_bind(acknowledged);
        }
        if let Some(severity) = filter.severity {
            qb.push(" AND severity = ").push_bind(severity.to_string());
        }
        qb.push(" ORDER BY timestamp DESC LIMIT ").push_bind(limit as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| -> Result<Alert> {
                // acknowledgement lives in columns, the payload keeps the creation snapshot
                let mut alert = row.try_get::<Json<Alert>, _>("payload")?.0;
                alert.acknowledged = row.try_get("acknowledged")?;
                alert.acknowledged_at = row.try_get("acknowledged_at")?;
                Ok(alert)
            })
            .collect()
    }
}
