//! Login code generation and allocation.
//!
//! A login code is the only credential a player has, so every code must
//! identify exactly one account across both the `players` and
//! `instructors` tables. Codes are stored normalized (trimmed, upper case).

use anyhow::{bail, Result};
use rand::Rng;
use sqlx::PgConnection;

pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const MAX_CODE_LENGTH: usize = 64;
pub const MAX_CODE_ATTEMPTS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    Player,
    Instructor,
}

impl CodeKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            CodeKind::Player => "",
            CodeKind::Instructor => "I",
        }
    }

    pub fn length(&self) -> usize {
        match self {
            CodeKind::Player => 6,
            CodeKind::Instructor => 8,
        }
    }

    pub fn generate(&self) -> String {
        generate_code(self.prefix(), self.length())
    }
}

pub fn generate_code(prefix: &str, length: usize) -> String {
    generate_code_with(&mut rand::thread_rng(), prefix, length)
}

pub fn generate_code_with<R: Rng + ?Sized>(rng: &mut R, prefix: &str, length: usize) -> String {
    let core: String = (0..length)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect();

    format!("{}{}", prefix, core)
}

pub fn normalize_code(input: &str) -> String {
    input.trim().to_uppercase()
}

/// Codes accepted at login: non-empty, bounded, ASCII letters, digits, `-` or `_`.
pub fn is_well_formed(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= MAX_CODE_LENGTH
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub async fn code_in_use(conn: &mut PgConnection, code: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM players WHERE login_code = $1)
             OR EXISTS(SELECT 1 FROM instructors WHERE login_code = $1)",
    )
    .bind(code)
    .fetch_one(conn)
    .await
}

/// Generate a code that no player or instructor holds yet.
///
/// Runs on the caller's connection so that, inside a transaction, codes
/// inserted earlier in the same transaction are seen as taken. The unique
/// indexes remain the final guard against concurrent writers.
pub async fn allocate_login_code(conn: &mut PgConnection, kind: CodeKind) -> Result<String> {
    for _ in 0..MAX_CODE_ATTEMPTS {
        let code = kind.generate();
        if !code_in_use(&mut *conn, &code).await? {
            return Ok(code);
        }
        tracing::debug!("generated login code collided, retrying");
    }

    bail!("Could not allocate a unique login code after {} attempts", MAX_CODE_ATTEMPTS)
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}
