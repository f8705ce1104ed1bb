//! Password hashing, verification codes and opaque bearer tokens.
//!
//! Tokens are 32 random bytes encoded as base64url. Only their SHA-256 digest
//! is stored, so a leaked `api_tokens` table cannot be replayed.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::models::User;

/// Hashes a password into an Argon2id PHC string.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("hash password: {}", e))?;
    Ok(hash.to_string())
}

/// Checks `password` against a stored PHC string. Parameters come from the hash.
pub fn verify_password(password: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("parse password hash: {}", e))?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

/// Four-digit code mailed on registration and password recovery.
pub fn generate_verification_code() -> String {
    rand::thread_rng().gen_range(1000..=9999).to_string()
}

pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn token_digest(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: String,
}

/// Stores a fresh token for `user_id` and drops the user's expired ones.
pub async fn issue_token(db: &SqlitePool, user_id: i64, ttl_hours: i64) -> sqlx::Result<IssuedToken> {
    let token = generate_token();
    let expires_at = (chrono::Utc::now() + chrono::Duration::hours(ttl_hours))
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string();

    sqlx::query("DELETE FROM api_tokens WHERE user_id = ?1 AND expires_at <= strftime('%Y-%m-%dT%H:%M:%SZ','now')")
        .bind(user_id)
        .execute(db)
        .await?;
    sqlx::query("INSERT INTO api_tokens (user_id, token_hash, expires_at) VALUES (?1, ?2, ?3)")
        .bind(user_id)
        .bind(token_digest(&token))
        .bind(&expires_at)
        .execute(db)
        .await?;

    Ok(IssuedToken { token, expires_at })
}

/// Returns the owner of an unexpired token.
pub async fn resolve_token(db: &SqlitePool, token: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(
        "SELECT u.* FROM api_tokens t JOIN users u ON u.id = t.user_id
         WHERE t.token_hash = ?1 AND t.expires_at > strftime('%Y-%m-%dT%H:%M:%SZ','now')",
    )
    .bind(token_digest(token))
    .fetch_optional(db)
    .await
}

/// Deletes the token. Returns whether it existed.
pub async fn revoke_token(db: &SqlitePool, token: &str) -> sqlx::Result<bool> {
    let res = sqlx::query("DELETE FROM api_tokens WHERE token_hash = ?1")
        .bind(token_digest(token))
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}
