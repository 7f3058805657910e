use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::validation::validate_note_text;

/// Coach note about a player; only shared notes are visible to the player
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Note {
    pub id: Uuid,
    pub player_id: Uuid,
    pub instructor_id: Option<Uuid>,
    pub text: String,
    pub shared: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateNote {
    pub text: String,
    #[serde(default)]
    pub shared: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateNote {
    pub text: Option<String>,
    pub shared: Option<bool>,
}

impl CreateNote {
    pub fn validated_text(&self) -> Result<String> {
        validate_note_text(&self.text)
    }
}

/// Validated note update
#[derive(Debug, Clone, PartialEq)]
pub struct NoteChanges {
    pub text: Option<String>,
    pub shared: Option<bool>,
}

impl UpdateNote {
    pub fn validate(&self) -> Result<NoteChanges> {
        if self.text.is_none() && self.shared.is_none() {
            return Err(anyhow!("Nothing to update; supply text or shared"));
        }

        Ok(NoteChanges {
            text: self.text.as_deref().map(validate_note_text).transpose()?,
            shared: self.shared,
        })
    }
}

/// What a player sees of a shared note
#[derive(Debug, Clone, Serialize)]
pub struct SharedNote {
    pub id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl From<Note> for SharedNote {
    fn from(note: Note) -> Self {
        Self {
            id: note.id,
            text: note.text,
            created_at: note.created_at,
        }
    }
}
