use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::validation::{validate_drill_title, validate_note_text, validate_video_url};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Drill {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// External URL or a path served by the deployment
    pub video_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDrill {
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
}

/// Partial update; an empty `description` or `video_url` clears the value
#[derive(Debug, Default, Deserialize)]
pub struct UpdateDrill {
    pub title: Option<String>,
    pub description: Option<String>,
    pub video_url: Option<String>,
}

fn optional_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn optional_video_url(raw: Option<&str>) -> Result<Option<String>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(url) => validate_video_url(url).map(Some),
    }
}

/// Validated drill fields
#[derive(Debug, Clone, PartialEq)]
pub struct DrillFields {
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
}

impl CreateDrill {
    pub fn validate(&self) -> Result<DrillFields> {
        Ok(DrillFields {
            title: validate_drill_title(&self.title)?,
            description: optional_text(self.description.as_deref()),
            video_url: optional_video_url(self.video_url.as_deref())?,
        })
    }
}

/// Validated partial drill update. `Some(None)` clears a nullable column.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DrillChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub video_url: Option<Option<String>>,
}

impl UpdateDrill {
    pub fn validate(&self) -> Result<DrillChanges> {
        Ok(DrillChanges {
            title: self.title.as_deref().map(validate_drill_title).transpose()?,
            description: self
                .description
                .as_deref()
                .map(|text| optional_text(Some(text))),
            video_url: match &self.video_url {
                Some(url) => Some(optional_video_url(Some(url.as_str()))?),
                None => None,
            },
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DrillAssignment {
    pub id: Uuid,
    pub player_id: Uuid,
    pub instructor_id: Option<Uuid>,
    pub drill_id: Uuid,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct AssignDrill {
    pub drill_id: Uuid,
    pub note: Option<String>,
}

impl AssignDrill {
    /// Validated assignment note, if any
    pub fn validated_note(&self) -> Result<Option<String>> {
        match self.note.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(note) => validate_note_text(note).map(Some),
        }
    }
}

/// An assignment joined with its drill
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AssignedDrill {
    pub assignment_id: Uuid,
    pub drill_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub note: Option<String>,
    pub assigned_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_drill_trims_and_drops_blank_fields() {
        let drill = CreateDrill {
            title: " Tee work ".to_string(),
            description: Some("   ".to_string()),
            video_url: Some("https://example.com/tee.mp4".to_string()),
        }
        .validate()
        .unwrap();

        assert_eq!(drill.title, "Tee work");
        assert_eq!(drill.description, None);
        assert_eq!(drill.video_url.as_deref(), Some("https://example.com/tee.mp4"));
    }

    #[test]
    fn test_update_drill_clears_video() {
        let changes = UpdateDrill {
            video_url: Some(String::new()),
            ..Default::default()
        }
        .validate()
        .unwrap();

        assert_eq!(changes.video_url, Some(None));
        assert_eq!(changes.title, None);
        assert!(UpdateDrill {
            video_url: Some("ftp://example.com".to_string()),
            ..Default::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_assignment_note() {
        let assign = AssignDrill {
            drill_id: Uuid::new_v4(),
            note: Some("  3 sets of 10 ".to_string()),
        };
        assert_eq!(assign.validated_note().unwrap().as_deref(), Some("3 sets of 10"));

        let blank = AssignDrill {
            drill_id: Uuid::new_v4(),
            note: Some(" ".to_string()),
        };
        assert_eq!(blank.validated_note().unwrap(), None);
    }
}
