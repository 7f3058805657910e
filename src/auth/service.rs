use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{
    is_well_formed, normalize_code, AccountInfo, AuthError, AuthResponse, JwtService, LoginRequest,
    MessageResponse, Role, Session,
};

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    name: String,
}

#[derive(Debug, Clone)]
pub struct AuthService {
    jwt_service: JwtService,
    db: PgPool,
}

impl AuthService {
    pub fn new(db: PgPool, secret_key: &str) -> Self {
        Self {
            jwt_service: JwtService::new(secret_key),
            db,
        }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt_service
    }

    /// Sign in with a login code. Instructor codes are matched first.
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        let code = normalize_code(&request.code);
        if !is_well_formed(&code) {
            return Err(AuthError::InvalidLoginCode);
        }

        let (account, role) = match self.find_account(&code).await? {
            Some(found) => found,
            None => {
                tracing::info!("login rejected: unknown code");
                return Err(AuthError::InvalidLoginCode);
            }
        };

        let access_token = self
            .jwt_service
            .create_token(account.id, &account.name, role)?;

        tracing::info!(account_id = %account.id, role = role.as_str(), "login succeeded");

        Ok(AuthResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.expires_in_seconds(),
            account: AccountInfo {
                id: account.id,
                name: account.name,
                role,
            },
        })
    }

    /// Revoke the presented token until it would have expired anyway.
    pub async fn logout(&self, token: &str) -> Result<MessageResponse, AuthError> {
        let session = self.validate_session(token).await?;

        self.blacklist_token(&session.jti, session.expires_at as i64)
            .await?;

        tracing::info!(account_id = %session.account_id, "logged out");

        Ok(MessageResponse {
            message: "Successfully logged out".to_string(),
        })
    }

    pub async fn is_token_blacklisted(&self, jti: &str) -> Result<bool, AuthError> {
        let result = sqlx::query("SELECT 1 FROM token_blacklist WHERE jti = $1 AND expires_at > NOW()")
            .bind(jti)
            .fetch_optional(&self.db)
            .await?;

        Ok(result.is_some())
    }

    pub async fn validate_session(&self, token: &str) -> Result<Session, AuthError> {
        let session = self.jwt_service.extract_session(token)?;

        if self.is_token_blacklisted(&session.jti).await? {
            return Err(AuthError::InvalidToken);
        }

        if !self.account_exists(session.account_id, session.role).await? {
            tracing::info!(account_id = %session.account_id, "token for a deleted account");
            return Err(AuthError::AccountNotFound);
        }

        Ok(session)
    }

    async fn account_exists(&self, id: Uuid, role: Role) -> Result<bool, AuthError> {
        let query = match role {
            Role::Instructor => "SELECT 1 FROM instructors WHERE id = $1",
            Role::Player => "SELECT 1 FROM players WHERE id = $1",
        };

        let row = sqlx::query(query).bind(id).fetch_optional(&self.db).await?;
        Ok(row.is_some())
    }

    async fn find_account(&self, code: &str) -> Result<Option<(AccountRow, Role)>, AuthError> {
        let instructor = sqlx::query_as::<_, AccountRow>(
            "SELECT id, name FROM instructors WHERE login_code = $1",
        )
        .bind(code)
        .fetch_optional(&self.db)
        .await?;

        if let Some(instructor) = instructor {
            return Ok(Some((instructor, Role::Instructor)));
        }

        let player = sqlx::query_as::<_, AccountRow>(
            "SELECT id, name FROM players WHERE login_code = $1",
        )
        .bind(code)
        .fetch_optional(&self.db)
        .await?;

        Ok(player.map(|player| (player, Role::Player)))
    }

    async fn blacklist_token(&self, jti: &str, exp: i64) -> Result<(), AuthError> {
        let expires_at = chrono::DateTime::from_timestamp(exp, 0).ok_or(AuthError::InvalidToken)?;

        sqlx::query(
            "INSERT INTO token_blacklist (jti, expires_at) VALUES ($1, $2)
             ON CONFLICT (jti) DO NOTHING",
        )
        .bind(jti)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        // Keep the table small; rows past expiry no longer matter
        sqlx::query("DELETE FROM token_blacklist WHERE expires_at <= NOW()")
            .execute(&self.db)
            .await?;

        Ok(())
    }
}
