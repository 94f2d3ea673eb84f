//! In-memory store backing both traits behind one lock.
//!
//! Behaves like the Postgres schema: unique emails, unique token hashes,
//! refresh tokens referencing existing users. Used by the test suite.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{RefreshTokenStore, User, UserStore};
use crate::auth::{hash_token, RefreshTokenRecord};
use crate::error::AuthError;

#[derive(Default)]
struct State {
    next_user_id: i64,
    users: HashMap<i64, User>,
    tokens: HashMap<String, StoredToken>,
}

struct StoredToken {
    user_id: i64,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, AuthError> {
        self.state
            .lock()
            .map_err(|_| AuthError::Internal("store lock poisoned".to_string()))
    }

    pub fn user_count(&self) -> usize {
        self.state().map(|s| s.users.len()).unwrap_or(0)
    }

    /// Number of refresh records held for a user, expired ones included
    pub fn refresh_token_count(&self, user_id: i64) -> usize {
        self.state()
            .map(|s| s.tokens.values().filter(|t| t.user_id == user_id).count())
            .unwrap_or(0)
    }

    /// Grant or revoke the admin flag; there is no API for this
    pub fn set_admin(&self, user_id: i64, is_admin: bool) -> Result<(), AuthError> {
        let mut state = self.state()?;
        let user = state.users.get_mut(&user_id).ok_or(AuthError::UserNotFound)?;
        user.is_admin = is_admin;
        Ok(())
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn save_user(&self, email: &str, password_hash: &str) -> Result<i64, AuthError> {
        let mut state = self.state()?;
        if state.users.values().any(|u| u.email == email) {
            return Err(AuthError::UserExists);
        }

        state.next_user_id += 1;
        let id = state.next_user_id;
        state.users.insert(
            id,
            User {
                id,
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                is_admin: false,
            },
        );
        Ok(id)
    }

    async fn user_by_email(&self, email: &str) -> Result<User, AuthError> {
        self.state()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(AuthError::UserNotFound)
    }

    async fn is_admin(&self, user_id: i64) -> Result<bool, AuthError> {
        self.state()?
            .users
            .get(&user_id)
            .map(|u| u.is_admin)
            .ok_or(AuthError::UserNotFound)
    }

    async fn delete_user(&self, user_id: i64) -> Result<(), AuthError> {
        let mut state = self.state()?;
        if state.users.remove(&user_id).is_none() {
            return Err(AuthError::UserNotFound);
        }
        state.tokens.retain(|_, t| t.user_id != user_id);
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryStore {
    async fn store_refresh_token(
        &self,
        user_id: i64,
        raw_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let mut state = self.state()?;
        if !state.users.contains_key(&user_id) {
            return Err(AuthError::UserNotFound);
        }

        state.tokens.entry(hash_token(raw_token)).or_insert(StoredToken {
            user_id,
            expires_at,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn get_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let state = self.state()?;
        let record = state.tokens.get(token_hash).and_then(|t| {
            state.users.get(&t.user_id).map(|u| RefreshTokenRecord {
                token_hash: token_hash.to_string(),
                user_id: t.user_id,
                email: u.email.clone(),
                expires_at: t.expires_at,
                created_at: t.created_at,
            })
        });
        Ok(record)
    }

    async fn delete_refresh_token(&self, token_hash: &str) -> Result<bool, AuthError> {
        Ok(self.state()?.tokens.remove(token_hash).is_some())
    }

    async fn delete_refresh_tokens_by_user_id(&self, user_id: i64) -> Result<u64, AuthError> {
        let mut state = self.state()?;
        let before = state.tokens.len();
        state.tokens.retain(|_, t| t.user_id != user_id);
        Ok((before - state.tokens.len()) as u64)
    }

    async fn delete_expired_refresh_tokens(&self) -> Result<u64, AuthError> {
        let now = Utc::now();
        let mut state = self.state()?;
        let before = state.tokens.len();
        state.tokens.retain(|_, t| t.expires_at >= now);
        Ok((before - state.tokens.len()) as u64)
    }
}
