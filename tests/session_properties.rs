//! Lifecycle properties of `SessionManager` over the in-memory store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use linkify_auth::auth::{hash_token, RefreshTokenRecord};
use linkify_auth::configuration::JwtSettings;
use linkify_auth::error::{AuthError, TokenError};
use linkify_auth::session::SessionManager;
use linkify_auth::store::{InMemoryStore, RefreshTokenStore, UserStore};

struct TestSession {
    manager: Arc<SessionManager>,
    store: Arc<InMemoryStore>,
}

fn test_settings() -> JwtSettings {
    JwtSettings {
        // Distinct secret per case
        secret: format!("test-secret-{}", uuid::Uuid::new_v4()),
        access_token_expiry: 900,
        refresh_token_expiry: 604800,
        issuer: "linkify-auth-test".to_string(),
        password_cost: 4,
    }
}

fn session_with(settings: &JwtSettings) -> TestSession {
    let store = Arc::new(InMemoryStore::new());
    let manager = SessionManager::new(store.clone(), store.clone(), settings);
    TestSession {
        manager: Arc::new(manager),
        store,
    }
}

fn session() -> TestSession {
    session_with(&test_settings())
}

#[tokio::test]
async fn register_then_login_returns_two_distinct_tokens() {
    let s = session();

    let user_id = s.manager.register("a@b.com", "secret123").await.unwrap();
    assert!(user_id > 0);

    let pair = s.manager.login("a@b.com", "secret123").await.unwrap();
    assert!(!pair.access_token.is_empty());
    assert!(!pair.refresh_token.is_empty());
    assert_ne!(pair.access_token, pair.refresh_token);
    assert_eq!(s.store.refresh_token_count(user_id), 1);
}

#[tokio::test]
async fn wrong_password_creates_no_refresh_record() {
    let s = session();
    let user_id = s.manager.register("a@b.com", "secret123").await.unwrap();

    let result = s.manager.login("a@b.com", "wrong").await;

    assert_eq!(result, Err(AuthError::InvalidCredentials));
    assert_eq!(s.store.refresh_token_count(user_id), 0);
}

#[tokio::test]
async fn unknown_email_is_invalid_credentials() {
    let s = session();

    let result = s.manager.login("nobody@b.com", "secret123").await;

    assert_eq!(result, Err(AuthError::InvalidCredentials));
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let s = session();
    s.manager.register("a@b.com", "secret123").await.unwrap();

    let result = s.manager.register("a@b.com", "anything-else").await;

    assert_eq!(result, Err(AuthError::UserExists));
    assert_eq!(s.store.user_count(), 1);
}

#[tokio::test]
async fn rotation_invalidates_the_old_refresh_token() {
    let s = session();
    s.manager.register("a@b.com", "secret123").await.unwrap();
    let first = s.manager.login("a@b.com", "secret123").await.unwrap();

    let second = s.manager.refresh_tokens(&first.refresh_token).await.unwrap();
    assert_ne!(first.refresh_token, second.refresh_token);
    assert_ne!(first.access_token, second.access_token);

    assert_eq!(
        s.manager.refresh_tokens(&first.refresh_token).await,
        Err(AuthError::TokenNotFound)
    );
    assert!(s.manager.refresh_tokens(&second.refresh_token).await.is_ok());
}

#[tokio::test]
async fn rotated_tokens_belong_to_the_same_user() {
    let s = session();
    let user_id = s.manager.register("a@b.com", "secret123").await.unwrap();
    let first = s.manager.login("a@b.com", "secret123").await.unwrap();

    let second = s.manager.refresh_tokens(&first.refresh_token).await.unwrap();
    let claims = s.manager.validate_token(&second.access_token).unwrap();

    assert_eq!(claims.user_id().unwrap(), user_id);
    assert_eq!(claims.email, "a@b.com");
    assert_eq!(s.store.refresh_token_count(user_id), 1);
}

#[tokio::test]
async fn expired_record_is_rejected_before_the_sweep() {
    let s = session();
    let user_id = s.manager.register("a@b.com", "secret123").await.unwrap();
    s.store
        .store_refresh_token(user_id, "stale-refresh-token", Utc::now() - Duration::minutes(1))
        .await
        .unwrap();

    let result = s.manager.refresh_tokens("stale-refresh-token").await;

    assert_eq!(result, Err(AuthError::TokenExpired));
    // The row still physically exists.
    let record = s
        .store
        .get_refresh_token(&hash_token("stale-refresh-token"))
        .await
        .unwrap();
    assert!(record.is_some());
}

#[tokio::test]
async fn sweep_removes_only_expired_records() {
    let s = session();
    let user_id = s.manager.register("a@b.com", "secret123").await.unwrap();
    let live = s.manager.login("a@b.com", "secret123").await.unwrap();
    s.store
        .store_refresh_token(user_id, "stale-refresh-token", Utc::now() - Duration::minutes(1))
        .await
        .unwrap();

    assert_eq!(s.manager.sweep_expired_tokens().await.unwrap(), 1);
    assert_eq!(s.manager.sweep_expired_tokens().await.unwrap(), 0);

    assert_eq!(
        s.manager.refresh_tokens("stale-refresh-token").await,
        Err(AuthError::TokenNotFound)
    );
    assert!(s.manager.refresh_tokens(&live.refresh_token).await.is_ok());
}

#[tokio::test]
async fn second_logout_with_same_token_fails() {
    let s = session();
    s.manager.register("a@b.com", "secret123").await.unwrap();
    let pair = s.manager.login("a@b.com", "secret123").await.unwrap();

    assert_eq!(s.manager.logout(&pair.refresh_token).await, Ok(()));
    assert_eq!(
        s.manager.logout(&pair.refresh_token).await,
        Err(AuthError::TokenNotFound)
    );
    assert_eq!(
        s.manager.refresh_tokens(&pair.refresh_token).await,
        Err(AuthError::TokenNotFound)
    );
}

#[tokio::test]
async fn access_token_stays_valid_after_logout() {
    let s = session();
    let user_id = s.manager.register("a@b.com", "secret123").await.unwrap();
    let pair = s.manager.login("a@b.com", "secret123").await.unwrap();

    s.manager.logout(&pair.refresh_token).await.unwrap();

    // Validation is stateless: revocation only affects the refresh token.
    let claims = s.manager.validate_token(&pair.access_token).unwrap();
    assert_eq!(claims.user_id().unwrap(), user_id);
    assert_eq!(claims.email, "a@b.com");
}

#[tokio::test]
async fn access_token_stays_valid_after_account_deletion() {
    let s = session();
    let user_id = s.manager.register("a@b.com", "secret123").await.unwrap();
    let pair = s.manager.login("a@b.com", "secret123").await.unwrap();

    s.manager.delete_account(user_id).await.unwrap();

    assert!(s.manager.validate_token(&pair.access_token).is_ok());
    assert_eq!(
        s.manager.refresh_tokens(&pair.refresh_token).await,
        Err(AuthError::TokenNotFound)
    );
}

#[tokio::test]
async fn access_token_is_rejected_once_its_own_expiry_passes() {
    let mut settings = test_settings();
    settings.access_token_expiry = -5;
    let s = session_with(&settings);
    s.manager.register("a@b.com", "secret123").await.unwrap();

    let pair = s.manager.login("a@b.com", "secret123").await.unwrap();

    assert_eq!(s.manager.validate_token(&pair.access_token), Err(TokenError::Expired));
    // The refresh token lives on its own TTL.
    assert!(s.manager.validate_token(&pair.refresh_token).is_ok());
}

#[tokio::test]
async fn tokens_from_another_secret_are_rejected() {
    let a = session();
    let b = session();
    a.manager.register("a@b.com", "secret123").await.unwrap();
    let pair = a.manager.login("a@b.com", "secret123").await.unwrap();

    assert_eq!(
        b.manager.validate_token(&pair.access_token),
        Err(TokenError::InvalidSignature)
    );
}

#[tokio::test]
async fn delete_account_removes_user_and_every_session() {
    let s = session();
    let user_id = s.manager.register("a@b.com", "secret123").await.unwrap();
    let first = s.manager.login("a@b.com", "secret123").await.unwrap();
    let second = s.manager.login("a@b.com", "secret123").await.unwrap();
    assert_eq!(s.store.refresh_token_count(user_id), 2);

    s.manager.delete_account(user_id).await.unwrap();

    assert_eq!(s.store.user_count(), 0);
    assert_eq!(s.store.refresh_token_count(user_id), 0);
    assert_eq!(
        s.manager.login("a@b.com", "secret123").await,
        Err(AuthError::InvalidCredentials)
    );
    assert!(s.manager.refresh_tokens(&first.refresh_token).await.is_err());
    assert!(s.manager.refresh_tokens(&second.refresh_token).await.is_err());
    assert_eq!(
        s.manager.delete_account(user_id).await,
        Err(AuthError::InvalidCredentials)
    );
}

#[tokio::test]
async fn logout_everywhere_revokes_all_refresh_tokens() {
    let s = session();
    let user_id = s.manager.register("a@b.com", "secret123").await.unwrap();
    let first = s.manager.login("a@b.com", "secret123").await.unwrap();
    let second = s.manager.login("a@b.com", "secret123").await.unwrap();

    assert_eq!(s.manager.logout_everywhere(user_id).await.unwrap(), 2);

    assert!(s.manager.refresh_tokens(&first.refresh_token).await.is_err());
    assert!(s.manager.refresh_tokens(&second.refresh_token).await.is_err());
    // The account itself survives.
    assert!(s.manager.login("a@b.com", "secret123").await.is_ok());
}

#[tokio::test]
async fn is_admin_reads_through_to_the_store() {
    let s = session();
    let user_id = s.manager.register("a@b.com", "secret123").await.unwrap();

    assert_eq!(s.manager.is_admin(user_id).await, Ok(false));

    s.store.set_admin(user_id, true).unwrap();
    assert_eq!(s.manager.is_admin(user_id).await, Ok(true));

    assert_eq!(
        s.manager.is_admin(user_id + 100).await,
        Err(AuthError::InvalidCredentials)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_rotation_of_one_token_has_a_single_winner() {
    let s = session();
    let user_id = s.manager.register("a@b.com", "secret123").await.unwrap();
    let pair = s.manager.login("a@b.com", "secret123").await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = s.manager.clone();
        let token = pair.refresh_token.clone();
        handles.push(tokio::spawn(async move { manager.refresh_tokens(&token).await }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(e) => assert_eq!(e, AuthError::TokenNotFound),
        }
    }

    assert_eq!(successes, 1);
    // One logical token, one live session afterwards.
    assert_eq!(s.store.refresh_token_count(user_id), 1);
}

// --- Storage failures ---

#[derive(Clone, Copy, PartialEq)]
enum Fault {
    None,
    /// Writing a refresh record fails with a backend error
    BackendWrite,
    /// The owner is deleted right before a refresh record is written
    OwnerDeletedBeforeWrite,
    /// The owner is deleted right after a refresh record is read
    OwnerDeletedAfterRead,
}

/// Refresh-token store delegating to `InMemoryStore` with one injected fault
struct FaultyTokenStore {
    inner: Arc<InMemoryStore>,
    fault: Mutex<Fault>,
}

impl FaultyTokenStore {
    fn set_fault(&self, fault: Fault) {
        *self.fault.lock().unwrap() = fault;
    }

    fn fault(&self) -> Fault {
        *self.fault.lock().unwrap()
    }
}

#[async_trait]
impl RefreshTokenStore for FaultyTokenStore {
    async fn store_refresh_token(
        &self,
        user_id: i64,
        raw_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        match self.fault() {
            Fault::BackendWrite => {
                return Err(AuthError::Internal("failed to store refresh token".to_string()))
            }
            Fault::OwnerDeletedBeforeWrite => self.inner.delete_user(user_id).await?,
            _ => {}
        }
        self.inner.store_refresh_token(user_id, raw_token, expires_at).await
    }

    async fn get_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let record = self.inner.get_refresh_token(token_hash).await?;
        if let (Fault::OwnerDeletedAfterRead, Some(record)) = (self.fault(), &record) {
            self.inner.delete_user(record.user_id).await?;
        }
        Ok(record)
    }

    async fn delete_refresh_token(&self, token_hash: &str) -> Result<bool, AuthError> {
        self.inner.delete_refresh_token(token_hash).await
    }

    async fn delete_refresh_tokens_by_user_id(&self, user_id: i64) -> Result<u64, AuthError> {
        self.inner.delete_refresh_tokens_by_user_id(user_id).await
    }

    async fn delete_expired_refresh_tokens(&self) -> Result<u64, AuthError> {
        self.inner.delete_expired_refresh_tokens().await
    }
}

struct FaultySession {
    manager: SessionManager,
    store: Arc<InMemoryStore>,
    tokens: Arc<FaultyTokenStore>,
}

fn faulty_session() -> FaultySession {
    let store = Arc::new(InMemoryStore::new());
    let tokens = Arc::new(FaultyTokenStore {
        inner: store.clone(),
        fault: Mutex::new(Fault::None),
    });
    let manager = SessionManager::new(store.clone(), tokens.clone(), &test_settings());
    FaultySession { manager, store, tokens }
}

#[tokio::test]
async fn login_hands_out_no_tokens_when_the_refresh_record_cannot_be_stored() {
    let s = faulty_session();
    let user_id = s.manager.register("a@b.com", "secret123").await.unwrap();
    s.tokens.set_fault(Fault::BackendWrite);

    let result = s.manager.login("a@b.com", "secret123").await;

    assert!(matches!(result, Err(AuthError::Internal(_))));
    assert_eq!(s.store.refresh_token_count(user_id), 0);
}

#[tokio::test]
async fn failed_store_after_rotation_leaves_no_live_session() {
    let s = faulty_session();
    let user_id = s.manager.register("a@b.com", "secret123").await.unwrap();
    let pair = s.manager.login("a@b.com", "secret123").await.unwrap();
    s.tokens.set_fault(Fault::BackendWrite);

    let result = s.manager.refresh_tokens(&pair.refresh_token).await;

    assert!(matches!(result, Err(AuthError::Internal(_))));
    // The old record is gone and no new one was written: the user must log in again.
    assert_eq!(s.store.refresh_token_count(user_id), 0);
    s.tokens.set_fault(Fault::None);
    assert_eq!(
        s.manager.refresh_tokens(&pair.refresh_token).await,
        Err(AuthError::TokenNotFound)
    );
    assert!(s.manager.login("a@b.com", "secret123").await.is_ok());
}

#[tokio::test]
async fn owner_deleted_after_validation_is_token_processing() {
    let s = faulty_session();
    s.manager.register("a@b.com", "secret123").await.unwrap();
    let pair = s.manager.login("a@b.com", "secret123").await.unwrap();
    s.tokens.set_fault(Fault::OwnerDeletedAfterRead);

    let result = s.manager.refresh_tokens(&pair.refresh_token).await;

    assert_eq!(result, Err(AuthError::TokenProcessing));
    assert_eq!(s.store.user_count(), 0);
}

#[tokio::test]
async fn owner_deleted_before_new_record_is_written_is_token_processing() {
    let s = faulty_session();
    let user_id = s.manager.register("a@b.com", "secret123").await.unwrap();
    let pair = s.manager.login("a@b.com", "secret123").await.unwrap();
    s.tokens.set_fault(Fault::OwnerDeletedBeforeWrite);

    let result = s.manager.refresh_tokens(&pair.refresh_token).await;

    assert_eq!(result, Err(AuthError::TokenProcessing));
    assert_eq!(s.store.refresh_token_count(user_id), 0);
}
