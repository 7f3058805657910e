use anyhow::{bail, Result};
use chrono::Utc;
use sqlx::{Connection, PgPool};
use uuid::Uuid;

use crate::auth::{allocate_login_code, code_in_use, is_unique_violation, CodeKind, MAX_CODE_ATTEMPTS};
use crate::models::Instructor;

#[derive(Debug, Clone)]
pub struct InstructorService {
    db: PgPool,
}

impl InstructorService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn get_instructor(&self, instructor_id: Uuid) -> Result<Option<Instructor>> {
        let instructor = sqlx::query_as::<_, Instructor>(
            "SELECT id, name, login_code, created_at FROM instructors WHERE id = $1",
        )
        .bind(instructor_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(instructor)
    }

    pub async fn count_instructors(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM instructors")
            .fetch_one(&self.db)
            .await?;

        Ok(count)
    }

    /// Add an instructor with a generated login code
    pub async fn create_instructor(&self, name: &str) -> Result<Instructor> {
        let mut conn = self.db.acquire().await?;

        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = allocate_login_code(&mut conn, CodeKind::Instructor).await?;

            let mut savepoint = conn.begin().await?;
            let inserted = insert(&mut savepoint, name, &code).await;

            match inserted {
                Ok(instructor) => {
                    savepoint.commit().await?;
                    tracing::info!(instructor_id = %instructor.id, "created instructor");
                    return Ok(instructor);
                }
                Err(err) if is_unique_violation(&err) => {
                    savepoint.rollback().await?;
                }
                Err(err) => return Err(err.into()),
            }
        }

        bail!("Could not allocate a unique instructor login code")
    }

    /// Add an instructor with a configured code, refusing codes held by anyone else
    pub async fn create_instructor_with_code(&self, name: &str, code: &str) -> Result<Instructor> {
        let mut conn = self.db.acquire().await?;

        if code_in_use(&mut conn, code).await? {
            bail!("Login code is already in use");
        }

        Ok(insert(&mut conn, name, code).await?)
    }
}

async fn insert(conn: &mut sqlx::PgConnection, name: &str, code: &str) -> Result<Instructor, sqlx::Error> {
    sqlx::query_as::<_, Instructor>(
        "INSERT INTO instructors (id, name, login_code, created_at) VALUES ($1, $2, $3, $4)
         RETURNING id, name, login_code, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(code)
    .bind(Utc::now())
    .fetch_one(conn)
    .await
}
