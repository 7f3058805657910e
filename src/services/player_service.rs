use anyhow::{bail, Result};
use chrono::Utc;
use sqlx::{Connection, PgConnection, PgPool};
use uuid::Uuid;

use crate::auth::{allocate_login_code, is_unique_violation, CodeKind, MAX_CODE_ATTEMPTS};
use crate::models::{NewPlayer, Player, PlayerChanges, PlayerQuery, PlayerSummary};

const PLAYER_COLUMNS: &str =
    "id, name, age, login_code, phone, image_path, instructor_id, created_at, updated_at";

/// Insert a player under a freshly allocated login code.
///
/// Each attempt runs in a savepoint so a lost race on the unique index can be
/// retried without aborting an enclosing transaction.
pub async fn insert_player(conn: &mut PgConnection, new_player: &NewPlayer) -> Result<Player> {
    for _ in 0..MAX_CODE_ATTEMPTS {
        let code = allocate_login_code(&mut *conn, CodeKind::Player).await?;
        let now = Utc::now();

        let mut savepoint = conn.begin().await?;
        let inserted = sqlx::query_as::<_, Player>(&format!(
            "INSERT INTO players (id, name, age, login_code, phone, image_path, instructor_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
             RETURNING {}",
            PLAYER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new_player.name)
        .bind(new_player.age)
        .bind(&code)
        .bind(&new_player.phone)
        .bind(&new_player.image_path)
        .bind(new_player.instructor_id)
        .bind(now)
        .fetch_one(&mut *savepoint)
        .await;

        match inserted {
            Ok(player) => {
                savepoint.commit().await?;
                return Ok(player);
            }
            Err(err) if is_unique_violation(&err) => {
                savepoint.rollback().await?;
                tracing::debug!("login code taken concurrently, retrying insert");
            }
            Err(err) => return Err(err.into()),
        }
    }

    bail!("Could not store player with a unique login code")
}

#[derive(Debug, Clone)]
pub struct PlayerService {
    db: PgPool,
}

impl PlayerService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_player(&self, new_player: NewPlayer) -> Result<Player> {
        let mut conn = self.db.acquire().await?;
        let player = insert_player(&mut conn, &new_player).await?;

        tracing::info!(player_id = %player.id, "created player");
        Ok(player)
    }

    pub async fn get_player(&self, player_id: Uuid) -> Result<Option<Player>> {
        let player = sqlx::query_as::<_, Player>(&format!(
            "SELECT {} FROM players WHERE id = $1",
            PLAYER_COLUMNS
        ))
        .bind(player_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(player)
    }

    /// Players ordered by name, annotated with the instructor's favorites
    pub async fn list_players(
        &self,
        instructor_id: Uuid,
        query: &PlayerQuery,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PlayerSummary>> {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(&s.to_lowercase())));

        let (min_age, max_age) = match query.bucket {
            Some(bucket) => bucket_bounds(bucket),
            None => (i32::MIN, i32::MAX),
        };

        let rows = sqlx::query_as::<_, PlayerWithFavorite>(&format!(
            "SELECT {}, (f.id IS NOT NULL) AS is_favorite
             FROM players p
             LEFT JOIN instructor_favorites f
               ON f.player_id = p.id AND f.instructor_id = $1
             WHERE ($2::TEXT IS NULL OR LOWER(p.name) LIKE $2 ESCAPE '\\')
               AND p.age BETWEEN $3 AND $4
               AND (NOT $5 OR f.id IS NOT NULL)
             ORDER BY LOWER(p.name), p.created_at
             LIMIT $6 OFFSET $7",
            prefixed_columns("p")
        ))
        .bind(instructor_id)
        .bind(search)
        .bind(min_age)
        .bind(max_age)
        .bind(query.favorites_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| row.player.summary(row.is_favorite))
            .collect())
    }

    pub async fn all_players(&self, instructor_id: Uuid) -> Result<Vec<PlayerSummary>> {
        self.list_players(instructor_id, &PlayerQuery::default(), i64::MAX, 0)
            .await
    }

    pub async fn update_player(&self, player_id: Uuid, changes: PlayerChanges) -> Result<Option<Player>> {
        let player = sqlx::query_as::<_, Player>(&format!(
            "UPDATE players
             SET name = COALESCE($2, name),
                 age = COALESCE($3, age),
                 phone = CASE WHEN $4 THEN $5 ELSE phone END,
                 image_path = CASE WHEN $6 THEN $7 ELSE image_path END,
                 updated_at = $8
             WHERE id = $1
             RETURNING {}",
            PLAYER_COLUMNS
        ))
        .bind(player_id)
        .bind(changes.name)
        .bind(changes.age)
        .bind(changes.phone.is_some())
        .bind(changes.phone.flatten())
        .bind(changes.image_path.is_some())
        .bind(changes.image_path.flatten())
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await?;

        Ok(player)
    }

    /// Delete a player with all metrics, notes, assignments and favorites
    pub async fn delete_player(&self, player_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM players WHERE id = $1")
            .bind(player_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace the player's login code; the old code stops working at once
    pub async fn regenerate_login_code(&self, player_id: Uuid) -> Result<Option<Player>> {
        let mut conn = self.db.acquire().await?;

        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = allocate_login_code(&mut conn, CodeKind::Player).await?;

            let mut savepoint = conn.begin().await?;
            let updated = sqlx::query_as::<_, Player>(&format!(
                "UPDATE players SET login_code = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
                PLAYER_COLUMNS
            ))
            .bind(player_id)
            .bind(&code)
            .bind(Utc::now())
            .fetch_optional(&mut *savepoint)
            .await;

            match updated {
                Ok(player) => {
                    savepoint.commit().await?;
                    if let Some(player) = &player {
                        tracing::info!(player_id = %player.id, "regenerated login code");
                    }
                    return Ok(player);
                }
                Err(err) if is_unique_violation(&err) => {
                    savepoint.rollback().await?;
                }
                Err(err) => return Err(err.into()),
            }
        }

        bail!("Could not allocate a unique login code")
    }

    pub async fn add_favorite(&self, instructor_id: Uuid, player_id: Uuid) -> Result<()> {
        sqlx::query(
            "INSERT INTO instructor_favorites (id, instructor_id, player_id) VALUES ($1, $2, $3)
             ON CONFLICT (instructor_id, player_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(instructor_id)
        .bind(player_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    pub async fn remove_favorite(&self, instructor_id: Uuid, player_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM instructor_favorites WHERE instructor_id = $1 AND player_id = $2",
        )
        .bind(instructor_id)
        .bind(player_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_favorite(&self, instructor_id: Uuid, player_id: Uuid) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM instructor_favorites WHERE instructor_id = $1 AND player_id = $2)",
        )
        .bind(instructor_id)
        .bind(player_id)
        .fetch_one(&self.db)
        .await?;

        Ok(exists)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PlayerWithFavorite {
    #[sqlx(flatten)]
    player: Player,
    is_favorite: bool,
}

fn prefixed_columns(alias: &str) -> String {
    PLAYER_COLUMNS
        .split(", ")
        .map(|column| format!("{}.{}", alias, column))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Inclusive age range of a bucket
fn bucket_bounds(bucket: crate::models::AgeBucket) -> (i32, i32) {
    use crate::models::AgeBucket;

    match bucket {
        AgeBucket::SevenToNine => (7, 9),
        AgeBucket::TenToTwelve => (10, 12),
        AgeBucket::ThirteenToFifteen => (13, 15),
        AgeBucket::SixteenToEighteen => (16, 18),
        AgeBucket::Adult => (19, i32::MAX),
        AgeBucket::Unknown => (i32::MIN, 6),
    }
}

fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
