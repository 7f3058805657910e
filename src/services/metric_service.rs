use anyhow::Result;
use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::{CreateMetric, Metric};

/// Values must already be validated
pub async fn insert_metric(
    conn: &mut PgConnection,
    player_id: Uuid,
    metric: &CreateMetric,
) -> Result<Metric> {
    let metric = sqlx::query_as::<_, Metric>(
        "INSERT INTO metrics (id, player_id, recorded_at, exit_velocity, launch_angle, spin_rate)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING id, player_id, recorded_at, exit_velocity, launch_angle, spin_rate",
    )
    .bind(Uuid::new_v4())
    .bind(player_id)
    .bind(metric.recorded_at.unwrap_or_else(Utc::now))
    .bind(metric.exit_velocity)
    .bind(metric.launch_angle)
    .bind(metric.spin_rate)
    .fetch_one(conn)
    .await?;

    Ok(metric)
}

#[derive(Debug, Clone)]
pub struct MetricService {
    db: PgPool,
}

impl MetricService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn record_metric(&self, player_id: Uuid, metric: &CreateMetric) -> Result<Metric> {
        let mut conn = self.db.acquire().await?;
        let metric = insert_metric(&mut conn, player_id, metric).await?;

        tracing::info!(metric_id = %metric.id, player_id = %player_id, "recorded metric");
        Ok(metric)
    }

    /// Newest first
    pub async fn metrics_for_player(&self, player_id: Uuid) -> Result<Vec<Metric>> {
        let metrics = sqlx::query_as::<_, Metric>(
            "SELECT id, player_id, recorded_at, exit_velocity, launch_angle, spin_rate
             FROM metrics WHERE player_id = $1
             ORDER BY recorded_at DESC",
        )
        .bind(player_id)
        .fetch_all(&self.db)
        .await?;

        Ok(metrics)
    }

    pub async fn delete_metric(&self, metric_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM metrics WHERE id = $1")
            .bind(metric_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
