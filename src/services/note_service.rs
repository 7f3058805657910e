use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Note;

const NOTE_COLUMNS: &str = "id, player_id, instructor_id, text, shared, created_at";

#[derive(Debug, Clone)]
pub struct NoteService {
    db: PgPool,
}

impl NoteService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_note(
        &self,
        player_id: Uuid,
        instructor_id: Uuid,
        text: &str,
        shared: bool,
    ) -> Result<Note> {
        let note = sqlx::query_as::<_, Note>(&format!(
            "INSERT INTO notes (id, player_id, instructor_id, text, shared, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            NOTE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(player_id)
        .bind(instructor_id)
        .bind(text)
        .bind(shared)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        Ok(note)
    }

    pub async fn get_note(&self, note_id: Uuid) -> Result<Option<Note>> {
        let note = sqlx::query_as::<_, Note>(&format!(
            "SELECT {} FROM notes WHERE id = $1",
            NOTE_COLUMNS
        ))
        .bind(note_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(note)
    }

    /// Every note, newest first
    pub async fn notes_for_player(&self, player_id: Uuid) -> Result<Vec<Note>> {
        self.query_notes(player_id, false).await
    }

    /// Only the notes the player may see, newest first
    pub async fn shared_notes_for_player(&self, player_id: Uuid) -> Result<Vec<Note>> {
        self.query_notes(player_id, true).await
    }

    async fn query_notes(&self, player_id: Uuid, shared_only: bool) -> Result<Vec<Note>> {
        let notes = sqlx::query_as::<_, Note>(&format!(
            "SELECT {} FROM notes
             WHERE player_id = $1 AND (NOT $2 OR shared)
             ORDER BY created_at DESC",
            NOTE_COLUMNS
        ))
        .bind(player_id)
        .bind(shared_only)
        .fetch_all(&self.db)
        .await?;

        Ok(notes)
    }

    pub async fn update_note(
        &self,
        note_id: Uuid,
        text: Option<&str>,
        shared: Option<bool>,
    ) -> Result<Option<Note>> {
        let note = sqlx::query_as::<_, Note>(&format!(
            "UPDATE notes SET text = COALESCE($2, text), shared = COALESCE($3, shared)
             WHERE id = $1
             RETURNING {}",
            NOTE_COLUMNS
        ))
        .bind(note_id)
        .bind(text)
        .bind(shared)
        .fetch_optional(&self.db)
        .await?;

        Ok(note)
    }

    pub async fn delete_note(&self, note_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notes WHERE id = $1")
            .bind(note_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
