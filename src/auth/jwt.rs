use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::{AuthError, Claims, Role, Session};

/// Signs and checks the bearer tokens handed out at login
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_expires_in: Duration,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("encoding_key", &"[REDACTED]")
            .field("decoding_key", &"[REDACTED]")
            .field("token_expires_in", &self.token_expires_in)
            .finish()
    }
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self::with_lifetime(secret, Duration::hours(12))
    }

    pub fn with_lifetime(secret: &str, token_expires_in: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_expires_in,
        }
    }

    pub fn create_token(&self, account_id: Uuid, name: &str, role: Role) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now + self.token_expires_in;

        let claims = Claims {
            sub: account_id.to_string(),
            name: name.to_string(),
            role,
            exp: exp.timestamp().max(0) as usize,
            iat: now.timestamp().max(0) as usize,
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(AuthError::Jwt)
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|token_data| token_data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })
    }

    pub fn extract_session(&self, token: &str) -> Result<Session, AuthError> {
        let claims = self.validate_token(token)?;
        Session::from_claims(&claims).map_err(|_| AuthError::InvalidToken)
    }

    pub fn expires_in_seconds(&self) -> usize {
        self.token_expires_in.num_seconds().max(0) as usize
    }
}

/// Extract bearer token from authorization header
pub fn extract_bearer_token(auth_header: &str) -> Result<&str, AuthError> {
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthHeaderFormat)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeaderFormat);
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_token_creation_and_validation() {
        let jwt_service = JwtService::new("test_secret");
        let player_id = Uuid::new_v4();

        let token = jwt_service
            .create_token(player_id, "Casey", Role::Player)
            .unwrap();
        let claims = jwt_service.validate_token(&token).unwrap();

        assert_eq!(claims.sub, player_id.to_string());
        assert_eq!(claims.name, "Casey");
        assert_eq!(claims.role, Role::Player);
        assert_eq!(claims.exp - claims.iat, 12 * 60 * 60);
    }

    #[test]
    fn test_session_extraction() {
        let jwt_service = JwtService::new("test_secret");
        let instructor_id = Uuid::new_v4();

        let token = jwt_service
            .create_token(instructor_id, "Coach", Role::Instructor)
            .unwrap();
        let session = jwt_service.extract_session(&token).unwrap();

        assert_eq!(session.account_id, instructor_id);
        assert_eq!(session.role, Role::Instructor);
        assert_eq!(session.account().name, "Coach");
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let issuer = JwtService::new("secret-a");
        let verifier = JwtService::new("secret-b");

        let token = issuer
            .create_token(Uuid::new_v4(), "Casey", Role::Player)
            .unwrap();

        assert_matches!(verifier.validate_token(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_expired_token_is_reported_as_expired() {
        let jwt_service = JwtService::with_lifetime("test_secret", Duration::seconds(-120));

        let token = jwt_service
            .create_token(Uuid::new_v4(), "Casey", Role::Player)
            .unwrap();

        assert_matches!(jwt_service.validate_token(&token), Err(AuthError::TokenExpired));
    }

    #[test]
    fn test_each_token_gets_its_own_jti() {
        let jwt_service = JwtService::new("test_secret");
        let id = Uuid::new_v4();

        let first = jwt_service.create_token(id, "Casey", Role::Player).unwrap();
        let second = jwt_service.create_token(id, "Casey", Role::Player).unwrap();

        let first_jti = jwt_service.validate_token(&first).unwrap().jti;
        let second_jti = jwt_service.validate_token(&second).unwrap().jti;
        assert_ne!(first_jti, second_jti);
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(extract_bearer_token("Bearer test_token").unwrap(), "test_token");
        assert!(extract_bearer_token("Basic dXNlcjpwYXNz").is_err());
        assert!(extract_bearer_token("Bearer ").is_err());
        assert!(extract_bearer_token("Bearer    ").is_err());
    }
}
