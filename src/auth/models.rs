use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who is signed in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Instructor,
    Player,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Instructor => "instructor",
            Role::Player => "player",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "instructor" => Some(Role::Instructor),
            "player" => Some(Role::Player),
            _ => None,
        }
    }
}

/// JWT token claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,    // Account id (instructor or player)
    pub name: String,   // Display name
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
    pub jti: String,    // Token id, used for logout
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: usize,
    pub account: AccountInfo,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AccountInfo {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Authenticated caller, placed in request extensions by the JWT middleware
#[derive(Debug, Clone)]
pub struct Session {
    pub account_id: Uuid,
    pub name: String,
    pub role: Role,
    pub jti: String,
    pub expires_at: usize,
}

impl Session {
    pub fn from_claims(claims: &Claims) -> Result<Self, uuid::Error> {
        Ok(Self {
            account_id: Uuid::parse_str(&claims.sub)?,
            name: claims.name.clone(),
            role: claims.role,
            jti: claims.jti.clone(),
            expires_at: claims.exp,
        })
    }

    pub fn account(&self) -> AccountInfo {
        AccountInfo {
            id: self.account_id,
            name: self.name.clone(),
            role: self.role,
        }
    }
}
