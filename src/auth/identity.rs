//! Account management and token issuance.
//!
//! Passwords are stored as `salt$sha256(salt + password)` in hex. Tokens are
//! HS256 JWTs whose subject is the user id; role travels in a custom claim so
//! handlers can gate admin surfaces without a second lookup.

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::info;

use crate::models::User;
use crate::types::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    pub role: String,
    /// Custom claims attached to the account.
    #[serde(default)]
    pub claims: serde_json::Map<String, serde_json::Value>,
    pub iat: i64,
    pub exp: i64,
}

pub struct Identity {
    pool: PgPool,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl_secs: i64,
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: uuid::Uuid,
    password_hash: String,
    role: String,
    claims: serde_json::Value,
}

fn hash_with_salt(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

pub(crate) fn hash_password(password: &str) -> String {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = hex::encode(salt_bytes);
    format!("{salt}${}", hash_with_salt(&salt, password))
}

pub(crate) fn verify_password(stored: &str, password: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, digest)) => hash_with_salt(salt, password) == digest,
        None => false,
    }
}

impl Identity {
    pub fn new(pool: PgPool, secret: &str, token_ttl_secs: i64) -> Self {
        Self {
            pool,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_ttl_secs,
        }
    }

    /// Register a new account; the first account in an empty deployment
    /// becomes an admin, everyone after that a regular user.
    pub async fn create_user(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> AppResult<User> {
        if password.len() < 8 {
            return Err(AppError::InvalidRequest(
                "password must be at least 8 characters".to_string(),
            ));
        }
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        let role = if existing == 0 { "admin" } else { "user" };

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, name, password_hash, role)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
            RETURNING id, name, email, role, created_at
            "#,
        )
        .bind(email)
        .bind(name)
        .bind(hash_password(password))
        .bind(role)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::InvalidRequest("email already registered".to_string()))?;

        info!(email, role, "created user");
        Ok(user)
    }

    /// Check credentials and mint a token carrying the account's role and
    /// custom claims.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<(String, String)> {
        let row = sqlx::query_as::<_, CredentialRow>(
            "SELECT id, password_hash, role, claims FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::Auth("invalid credentials".to_string()))?;

        if !verify_password(&row.password_hash, password) {
            return Err(AppError::Auth("invalid credentials".to_string()));
        }
        let custom = row.claims.as_object().cloned().unwrap_or_default();
        let token = self.issue_token(&row.id.to_string(), email, &row.role, custom)?;
        Ok((token, row.role))
    }

    /// Replace the custom claims on an account. New tokens carry the new
    /// claims; already-issued tokens keep the old ones until they expire.
    pub async fn set_custom_claims(
        &self,
        user_id: &str,
        claims: serde_json::Value,
    ) -> AppResult<()> {
        let id = uuid::Uuid::parse_str(user_id)
            .map_err(|_| AppError::InvalidRequest(format!("malformed user id {user_id}")))?;
        let done = sqlx::query("UPDATE users SET claims = $1 WHERE id = $2")
            .bind(claims)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("no user with id {user_id}")));
        }
        Ok(())
    }

    /// Change an account's role. The role column and the custom claims are
    /// both updated, so tokens minted by the next login carry the new role.
    pub async fn change_role(&self, user_id: &str, role: &str) -> AppResult<()> {
        if role != "admin" && role != "user" {
            return Err(AppError::InvalidRequest(format!("unknown role {role}")));
        }
        let id = uuid::Uuid::parse_str(user_id)
            .map_err(|_| AppError::InvalidRequest(format!("malformed user id {user_id}")))?;
        let done = sqlx::query("UPDATE users SET role = $1 WHERE id = $2")
            .bind(role)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("no user with id {user_id}")));
        }
        self.set_custom_claims(user_id, serde_json::json!({ "role": role }))
            .await?;
        info!(user_id, role, "changed role");
        Ok(())
    }

    pub async fn delete_user(&self, user_id: &str) -> AppResult<()> {
        let id = uuid::Uuid::parse_str(user_id)
            .map_err(|_| AppError::InvalidRequest(format!("malformed user id {user_id}")))?;
        let done = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("no user with id {user_id}")));
        }
        info!(user_id, "deleted user");
        Ok(())
    }

    pub fn issue_token(
        &self,
        user_id: &str,
        email: &str,
        role: &str,
        custom: serde_json::Map<String, serde_json::Value>,
    ) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            email_verified: true,
            role: role.to_string(),
            claims: custom,
            iat: now,
            exp: now + self.token_ttl_secs,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))
    }

    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        let claims = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| AppError::Auth(format!("invalid token: {e}")))?;
        if !claims.email_verified {
            return Err(AppError::Auth("email not verified".to_string()));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_verifies_against_its_own_hash() {
        let stored = hash_password("correct horse");
        assert!(verify_password(&stored, "correct horse"));
        assert!(!verify_password(&stored, "wrong horse"));
        assert!(!verify_password("not-a-hash", "anything"));
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    fn identity(secret: &str) -> Identity {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://unused@localhost/unused")
            .expect("lazy pool");
        Identity::new(pool, secret, 3600)
    }

    #[tokio::test]
    async fn tokens_round_trip() {
        let identity = identity("secret");
        let mut custom = serde_json::Map::new();
        custom.insert("local_id".to_string(), serde_json::json!("42"));
        let token = identity
            .issue_token("u1", "ada@example.org", "admin", custom)
            .unwrap();
        let claims = identity.verify_token(&token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.email, "ada@example.org");
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.claims["local_id"], "42");
    }

    #[tokio::test]
    async fn account_operations_reject_malformed_user_ids() {
        let identity = identity("secret");
        for result in [
            identity
                .set_custom_claims("not-a-uuid", serde_json::json!({"role": "admin"}))
                .await,
            identity.change_role("not-a-uuid", "admin").await,
            identity.delete_user("not-a-uuid").await,
        ] {
            assert!(matches!(result.unwrap_err(), AppError::InvalidRequest(_)));
        }
    }

    #[tokio::test]
    async fn unknown_roles_are_rejected() {
        let err = identity("secret")
            .change_role("u1", "superuser")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn tokens_signed_with_another_secret_are_rejected() {
        let token = identity("secret-a")
            .issue_token("u1", "ada@example.org", "user", Default::default())
            .unwrap();
        let err = identity("secret-b").verify_token(&token).unwrap_err();
        assert!(matches!(err, AppError::Auth(_)));
    }
}
