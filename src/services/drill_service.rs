use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{AssignedDrill, Drill, DrillAssignment, DrillChanges, DrillFields};

const DRILL_COLUMNS: &str = "id, title, description, video_url, created_at";

#[derive(Debug, Clone)]
pub struct DrillService {
    db: PgPool,
}

impl DrillService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_drill(&self, fields: &DrillFields) -> Result<Drill> {
        let drill = sqlx::query_as::<_, Drill>(&format!(
            "INSERT INTO drills (id, title, description, video_url, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            DRILL_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(&fields.video_url)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        tracing::info!(drill_id = %drill.id, "created drill");
        Ok(drill)
    }

    pub async fn get_drill(&self, drill_id: Uuid) -> Result<Option<Drill>> {
        let drill = sqlx::query_as::<_, Drill>(&format!(
            "SELECT {} FROM drills WHERE id = $1",
            DRILL_COLUMNS
        ))
        .bind(drill_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(drill)
    }

    pub async fn list_drills(&self) -> Result<Vec<Drill>> {
        let drills = sqlx::query_as::<_, Drill>(&format!(
            "SELECT {} FROM drills ORDER BY LOWER(title), created_at",
            DRILL_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(drills)
    }

    pub async fn update_drill(&self, drill_id: Uuid, changes: DrillChanges) -> Result<Option<Drill>> {
        let drill = sqlx::query_as::<_, Drill>(&format!(
            "UPDATE drills
             SET title = COALESCE($2, title),
                 description = CASE WHEN $3 THEN $4 ELSE description END,
                 video_url = CASE WHEN $5 THEN $6 ELSE video_url END
             WHERE id = $1
             RETURNING {}",
            DRILL_COLUMNS
        ))
        .bind(drill_id)
        .bind(changes.title)
        .bind(changes.description.is_some())
        .bind(changes.description.flatten())
        .bind(changes.video_url.is_some())
        .bind(changes.video_url.flatten())
        .fetch_optional(&self.db)
        .await?;

        Ok(drill)
    }

    /// Removing a drill also removes its assignments
    pub async fn delete_drill(&self, drill_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM drills WHERE id = $1")
            .bind(drill_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn assign_drill(
        &self,
        player_id: Uuid,
        instructor_id: Uuid,
        drill_id: Uuid,
        note: Option<&str>,
    ) -> Result<DrillAssignment> {
        let assignment = sqlx::query_as::<_, DrillAssignment>(
            "INSERT INTO drill_assignments (id, player_id, instructor_id, drill_id, note, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, player_id, instructor_id, drill_id, note, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(player_id)
        .bind(instructor_id)
        .bind(drill_id)
        .bind(note)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            assignment_id = %assignment.id,
            player_id = %player_id,
            drill_id = %drill_id,
            "assigned drill"
        );
        Ok(assignment)
    }

    pub async fn unassign(&self, assignment_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM drill_assignments WHERE id = $1")
            .bind(assignment_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Newest assignment first
    pub async fn assignments_for_player(&self, player_id: Uuid) -> Result<Vec<AssignedDrill>> {
        let assignments = sqlx::query_as::<_, AssignedDrill>(
            "SELECT a.id AS assignment_id, d.id AS drill_id, d.title, d.description, d.video_url,
                    a.note, a.created_at AS assigned_at
             FROM drill_assignments a
             JOIN drills d ON d.id = a.drill_id
             WHERE a.player_id = $1
             ORDER BY a.created_at DESC",
        )
        .bind(player_id)
        .fetch_all(&self.db)
        .await?;

        Ok(assignments)
    }
}
