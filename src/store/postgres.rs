//! Postgres adapter for both store traits.
//!
//! Constraint violations are classified here by SQLSTATE; every other backend
//! error is logged and replaced by a fixed message naming the operation.
//! Every call, transactions included, runs under the configured deadline; a
//! call that outlives it is abandoned and reported as `Internal`.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{RefreshTokenStore, User, UserStore};
use crate::auth::{hash_token, RefreshTokenRecord};
use crate::error::AuthError;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    query_timeout: Duration,
}

impl PostgresStore {
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self { pool, query_timeout }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn violates(err: &sqlx::Error, code: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(code),
        _ => false,
    }
}

fn internal(err: sqlx::Error, operation: &'static str) -> AuthError {
    tracing::error!(error = %err, operation = operation, "Database error");
    AuthError::Internal(format!("failed to {}", operation))
}

/// Run one storage call under a deadline
///
/// Dropping an unfinished transaction rolls it back.
async fn with_deadline<T, F>(deadline: Duration, operation: &'static str, call: F) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, AuthError>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(
                operation = operation,
                timeout_ms = deadline.as_millis() as u64,
                "Database call timed out"
            );
            Err(AuthError::Internal(format!("timed out trying to {}", operation)))
        }
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn save_user(&self, email: &str, password_hash: &str) -> Result<i64, AuthError> {
        with_deadline(self.query_timeout, "save user", async {
            sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO users (email, password_hash)
                VALUES ($1, $2)
                RETURNING id
                "#,
            )
            .bind(email)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if violates(&e, UNIQUE_VIOLATION) {
                    AuthError::UserExists
                } else {
                    internal(e, "save user")
                }
            })
        })
        .await
    }

    async fn user_by_email(&self, email: &str) -> Result<User, AuthError> {
        with_deadline(self.query_timeout, "fetch user", async {
            sqlx::query_as::<_, User>(
                "SELECT id, email, password_hash, is_admin FROM users WHERE email = $1",
            )
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| internal(e, "fetch user"))?
            .ok_or(AuthError::UserNotFound)
        })
        .await
    }

    async fn is_admin(&self, user_id: i64) -> Result<bool, AuthError> {
        with_deadline(self.query_timeout, "check for admin user", async {
            sqlx::query_scalar::<_, bool>("SELECT is_admin FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| internal(e, "check for admin user"))?
                .ok_or(AuthError::UserNotFound)
        })
        .await
    }

    async fn delete_user(&self, user_id: i64) -> Result<(), AuthError> {
        with_deadline(self.query_timeout, "delete account", async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| internal(e, "begin transaction"))?;

            sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
                .bind(user_id)
                .execute(&mut tx)
                .await
                .map_err(|e| internal(e, "delete refresh tokens"))?;

            let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(user_id)
                .execute(&mut tx)
                .await
                .map_err(|e| internal(e, "delete user"))?
                .rows_affected();

            if deleted == 0 {
                // Dropping the transaction rolls it back.
                return Err(AuthError::UserNotFound);
            }

            tx.commit().await.map_err(|e| internal(e, "commit account deletion"))
        })
        .await
    }
}

#[async_trait]
impl RefreshTokenStore for PostgresStore {
    async fn store_refresh_token(
        &self,
        user_id: i64,
        raw_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        with_deadline(self.query_timeout, "store refresh token", async {
            sqlx::query(
                r#"
                INSERT INTO refresh_tokens (token_hash, user_id, expires_at)
                VALUES ($1, $2, $3)
                ON CONFLICT (token_hash) DO NOTHING
                "#,
            )
            .bind(hash_token(raw_token))
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if violates(&e, FOREIGN_KEY_VIOLATION) {
                    AuthError::UserNotFound
                } else {
                    internal(e, "store refresh token")
                }
            })?;

            Ok(())
        })
        .await
    }

    async fn get_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, AuthError> {
        with_deadline(self.query_timeout, "get refresh token", async {
            sqlx::query_as::<_, RefreshTokenRecord>(
                r#"
                SELECT rt.token_hash, rt.user_id, u.email, rt.expires_at, rt.created_at
                FROM refresh_tokens rt
                JOIN users u ON rt.user_id = u.id
                WHERE rt.token_hash = $1
                "#,
            )
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| internal(e, "get refresh token"))
        })
        .await
    }

    async fn delete_refresh_token(&self, token_hash: &str) -> Result<bool, AuthError> {
        with_deadline(self.query_timeout, "delete refresh token", async {
            let result = sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
                .bind(token_hash)
                .execute(&self.pool)
                .await
                .map_err(|e| internal(e, "delete refresh token"))?;

            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn delete_refresh_tokens_by_user_id(&self, user_id: i64) -> Result<u64, AuthError> {
        with_deadline(self.query_timeout, "delete refresh tokens by user ID", async {
            let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(|e| internal(e, "delete refresh tokens by user ID"))?;

            Ok(result.rows_affected())
        })
        .await
    }

    async fn delete_expired_refresh_tokens(&self) -> Result<u64, AuthError> {
        with_deadline(self.query_timeout, "delete expired refresh tokens", async {
            let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < NOW()")
                .execute(&self.pool)
                .await
                .map_err(|e| internal(e, "delete expired refresh tokens"))?;

            Ok(result.rows_affected())
        })
        .await
    }
}
