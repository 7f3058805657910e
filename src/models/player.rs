use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::validation::{
    normalize_optional_phone, validate_age, validate_image_path, validate_name,
};

pub const AVATAR_PLACEHOLDER: &str = "/static/img/avatar-placeholder.png";
pub const DEFAULT_PLAYER_AGE: i32 = 12;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub age: i32,
    pub login_code: String,
    pub phone: Option<String>,
    pub image_path: Option<String>,
    pub instructor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Player {
    pub fn age_bucket(&self) -> AgeBucket {
        AgeBucket::from_age(self.age)
    }

    pub fn image_url(&self) -> String {
        self.image_path
            .clone()
            .filter(|path| !path.is_empty())
            .unwrap_or_else(|| AVATAR_PLACEHOLDER.to_string())
    }

    pub fn summary(&self, is_favorite: bool) -> PlayerSummary {
        PlayerSummary {
            id: self.id,
            name: self.name.clone(),
            age: self.age,
            age_bucket: self.age_bucket(),
            login_code: self.login_code.clone(),
            phone: self.phone.clone().unwrap_or_default(),
            image_url: self.image_url(),
            is_favorite,
        }
    }

    /// What the player sees about themselves
    pub fn profile(&self) -> PlayerProfile {
        PlayerProfile {
            id: self.id,
            name: self.name.clone(),
            age: self.age,
            age_bucket: self.age_bucket(),
            image_url: self.image_url(),
            has_phone: self.phone.is_some(),
        }
    }
}

/// Request body for adding a player
#[derive(Debug, Deserialize)]
pub struct CreatePlayer {
    pub name: String,
    pub age: Option<i32>,
    pub phone: Option<String>,
    pub image_path: Option<String>,
    /// Text the new login code to the player
    #[serde(default)]
    pub notify: bool,
}

/// Validated player ready for insertion
#[derive(Debug, Clone, PartialEq)]
pub struct NewPlayer {
    pub name: String,
    pub age: i32,
    pub phone: Option<String>,
    pub image_path: Option<String>,
    pub instructor_id: Option<Uuid>,
}

impl CreatePlayer {
    pub fn validate(&self, instructor_id: Option<Uuid>) -> Result<NewPlayer> {
        let age = self.age.unwrap_or(DEFAULT_PLAYER_AGE);
        validate_age(age)?;

        Ok(NewPlayer {
            name: validate_name(&self.name)?,
            age,
            phone: normalize_optional_phone(self.phone.as_deref())?,
            image_path: optional_image_path(self.image_path.as_deref())?,
            instructor_id,
        })
    }
}

fn optional_image_path(raw: Option<&str>) -> Result<Option<String>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(path) => validate_image_path(path).map(Some),
    }
}

/// Partial update; an empty `phone` or `image_path` clears the value
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePlayer {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub phone: Option<String>,
    pub image_path: Option<String>,
}

/// Validated partial update. `Some(None)` clears a nullable column.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PlayerChanges {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub phone: Option<Option<String>>,
    pub image_path: Option<Option<String>>,
}

impl UpdatePlayer {
    pub fn validate(&self) -> Result<PlayerChanges> {
        if let Some(age) = self.age {
            validate_age(age)?;
        }

        Ok(PlayerChanges {
            name: self.name.as_deref().map(validate_name).transpose()?,
            age: self.age,
            phone: match &self.phone {
                Some(phone) => Some(normalize_optional_phone(Some(phone.as_str()))?),
                None => None,
            },
            image_path: match &self.image_path {
                Some(path) => Some(optional_image_path(Some(path.as_str()))?),
                None => None,
            },
        })
    }
}

impl PlayerChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.age.is_none() && self.phone.is_none() && self.image_path.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerSummary {
    pub id: Uuid,
    pub name: String,
    pub age: i32,
    pub age_bucket: AgeBucket,
    pub login_code: String,
    pub phone: String,
    pub image_url: String,
    pub is_favorite: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerProfile {
    pub id: Uuid,
    pub name: String,
    pub age: i32,
    pub age_bucket: AgeBucket,
    pub image_url: String,
    pub has_phone: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlayerQuery {
    /// Case-insensitive substring of the player name
    pub search: Option<String>,
    pub bucket: Option<AgeBucket>,
    #[serde(default)]
    pub favorites_only: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Client grouping by age
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AgeBucket {
    #[serde(rename = "7-9")]
    SevenToNine,
    #[serde(rename = "10-12")]
    TenToTwelve,
    #[serde(rename = "13-15")]
    ThirteenToFifteen,
    #[serde(rename = "16-18")]
    SixteenToEighteen,
    #[serde(rename = "18+")]
    Adult,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl AgeBucket {
    pub const ALL: [AgeBucket; 6] = [
        AgeBucket::SevenToNine,
        AgeBucket::TenToTwelve,
        AgeBucket::ThirteenToFifteen,
        AgeBucket::SixteenToEighteen,
        AgeBucket::Adult,
        AgeBucket::Unknown,
    ];

    pub fn from_age(age: i32) -> Self {
        match age {
            7..=9 => AgeBucket::SevenToNine,
            10..=12 => AgeBucket::TenToTwelve,
            13..=15 => AgeBucket::ThirteenToFifteen,
            16..=18 => AgeBucket::SixteenToEighteen,
            a if a >= 19 => AgeBucket::Adult,
            _ => AgeBucket::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgeBucket::SevenToNine => "7-9",
            AgeBucket::TenToTwelve => "10-12",
            AgeBucket::ThirteenToFifteen => "13-15",
            AgeBucket::SixteenToEighteen => "16-18",
            AgeBucket::Adult => "18+",
            AgeBucket::Unknown => "Unknown",
        }
    }

    pub fn contains(&self, age: i32) -> bool {
        AgeBucket::from_age(age) == *self
    }
}

impl std::fmt::Display for AgeBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A client: the players of one age bucket
#[derive(Debug, Clone, Serialize)]
pub struct ClientGroup {
    pub bucket: AgeBucket,
    pub player_count: usize,
    pub players: Vec<PlayerSummary>,
}

/// Group players into clients in bucket order, names sorted within each group.
/// Empty buckets are left out.
pub fn group_into_clients(players: Vec<PlayerSummary>) -> Vec<ClientGroup> {
    let mut groups: Vec<ClientGroup> = AgeBucket::ALL
        .iter()
        .map(|bucket| ClientGroup {
            bucket: *bucket,
            player_count: 0,
            players: Vec::new(),
        })
        .collect();

    for player in players {
        let slot = AgeBucket::ALL
            .iter()
            .position(|bucket| *bucket == player.age_bucket)
            .unwrap_or(AgeBucket::ALL.len() - 1);
        groups[slot].players.push(player);
    }

    groups.retain(|group| !group.players.is_empty());
    for group in &mut groups {
        group
            .players
            .sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        group.player_count = group.players.len();
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::faker::name::en::Name;
    use fake::Fake;
    use pretty_assertions::assert_eq;

    fn summary(name: &str, age: i32) -> PlayerSummary {
        PlayerSummary {
            id: Uuid::new_v4(),
            name: name.to_string(),
            age,
            age_bucket: AgeBucket::from_age(age),
            login_code: "ABC123".to_string(),
            phone: String::new(),
            image_url: AVATAR_PLACEHOLDER.to_string(),
            is_favorite: false,
        }
    }

    #[test]
    fn test_age_buckets() {
        assert_eq!(AgeBucket::from_age(6), AgeBucket::Unknown);
        assert_eq!(AgeBucket::from_age(7), AgeBucket::SevenToNine);
        assert_eq!(AgeBucket::from_age(9), AgeBucket::SevenToNine);
        assert_eq!(AgeBucket::from_age(10), AgeBucket::TenToTwelve);
        assert_eq!(AgeBucket::from_age(12), AgeBucket::TenToTwelve);
        assert_eq!(AgeBucket::from_age(13), AgeBucket::ThirteenToFifteen);
        assert_eq!(AgeBucket::from_age(16), AgeBucket::SixteenToEighteen);
        assert_eq!(AgeBucket::from_age(18), AgeBucket::SixteenToEighteen);
        assert_eq!(AgeBucket::from_age(19), AgeBucket::Adult);
        assert_eq!(AgeBucket::from_age(-1), AgeBucket::Unknown);
    }

    #[test]
    fn test_bucket_serializes_as_label() {
        let json = serde_json::to_string(&AgeBucket::TenToTwelve).unwrap();
        assert_eq!(json, "\"10-12\"");

        let bucket: AgeBucket = serde_json::from_str("\"18+\"").unwrap();
        assert_eq!(bucket, AgeBucket::Adult);
        assert_eq!(bucket.to_string(), "18+");
    }

    #[test]
    fn test_grouping_orders_buckets_and_names() {
        let groups = group_into_clients(vec![
            summary("zoe", 11),
            summary("Adam", 16),
            summary("Bea", 10),
            summary("Cal", 8),
            summary("Tiny", 5),
        ]);

        let buckets: Vec<AgeBucket> = groups.iter().map(|g| g.bucket).collect();
        assert_eq!(
            buckets,
            vec![
                AgeBucket::SevenToNine,
                AgeBucket::TenToTwelve,
                AgeBucket::SixteenToEighteen,
                AgeBucket::Unknown
            ]
        );

        let ten_to_twelve: Vec<&str> = groups[1].players.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(ten_to_twelve, vec!["Bea", "zoe"]);
        assert_eq!(groups[1].player_count, 2);
    }

    #[test]
    fn test_grouping_keeps_every_player() {
        let players: Vec<PlayerSummary> = (0..50)
            .map(|i| summary(&Name().fake::<String>(), 5 + (i % 20)))
            .collect();

        let groups = group_into_clients(players);
        let total: usize = groups.iter().map(|g| g.player_count).sum();
        assert_eq!(total, 50);
        assert!(groups
            .iter()
            .all(|g| g.players.iter().all(|p| g.bucket.contains(p.age))));
    }

    #[test]
    fn test_create_player_validation() {
        let request = CreatePlayer {
            name: "  Casey ".to_string(),
            age: None,
            phone: Some("555 123 4567".to_string()),
            image_path: Some("".to_string()),
            notify: false,
        };

        let new_player = request.validate(None).unwrap();
        assert_eq!(
            new_player,
            NewPlayer {
                name: "Casey".to_string(),
                age: DEFAULT_PLAYER_AGE,
                phone: Some("+15551234567".to_string()),
                image_path: None,
                instructor_id: None,
            }
        );

        let bad_age = CreatePlayer {
            name: "Casey".to_string(),
            age: Some(2),
            phone: None,
            image_path: None,
            notify: false,
        };
        assert!(bad_age.validate(None).is_err());
    }

    #[test]
    fn test_update_player_distinguishes_clear_from_absent() {
        let clear_phone = UpdatePlayer {
            phone: Some(" ".to_string()),
            ..Default::default()
        };
        let changes = clear_phone.validate().unwrap();
        assert_eq!(changes.phone, Some(None));
        assert_eq!(changes.image_path, None);
        assert!(!changes.is_empty());

        assert!(UpdatePlayer::default().validate().unwrap().is_empty());
        assert!(UpdatePlayer {
            name: Some("".to_string()),
            ..Default::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_image_url_falls_back_to_placeholder() {
        let mut player = Player {
            id: Uuid::new_v4(),
            name: "Casey".to_string(),
            age: 12,
            login_code: "ABC123".to_string(),
            phone: None,
            image_path: None,
            instructor_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(player.image_url(), AVATAR_PLACEHOLDER);
        assert_eq!(player.summary(false).phone, "");

        player.image_path = Some("/static/img/casey.png".to_string());
        assert_eq!(player.image_url(), "/static/img/casey.png");
        assert!(!player.profile().has_phone);
    }
}
