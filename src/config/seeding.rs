use anyhow::Result;
use sqlx::PgPool;

use crate::auth::{is_well_formed, normalize_code};
use crate::models::DEFAULT_INSTRUCTOR_NAME;
use crate::services::InstructorService;

pub struct DatabaseSeeder {
    pool: PgPool,
}

impl DatabaseSeeder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the first instructor when none exists. A configured code is used as-is;
    /// otherwise one is generated and logged once so the operator can sign in.
    pub async fn seed_default_instructor(&self, configured_code: Option<&str>) -> Result<bool> {
        let instructors = InstructorService::new(self.pool.clone());

        if instructors.count_instructors().await? > 0 {
            tracing::debug!("instructor already present, skipping seed");
            return Ok(false);
        }

        match configured_code.map(normalize_code) {
            Some(code) if !code.is_empty() => {
                if !is_well_formed(&code) {
                    anyhow::bail!("INSTRUCTOR_DEFAULT_CODE may only contain letters, digits, '-' and '_'");
                }
                let instructor = instructors
                    .create_instructor_with_code(DEFAULT_INSTRUCTOR_NAME, &code)
                    .await?;
                tracing::info!(instructor_id = %instructor.id, "seeded default instructor from configured code");
            }
            _ => {
                let instructor = instructors.create_instructor(DEFAULT_INSTRUCTOR_NAME).await?;
                tracing::warn!(
                    instructor_id = %instructor.id,
                    login_code = %instructor.login_code,
                    "seeded default instructor with generated code; set INSTRUCTOR_DEFAULT_CODE to choose one"
                );
            }
        }

        Ok(true)
    }
}
