use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{debug, info};

use bodylog_core::{Session, UserId};
use bodylog_store::auth::AuthProvider;
use bodylog_store::error::AuthError;

#[derive(Debug, Clone)]
struct Account {
    user_id: UserId,
    password: Option<String>,
}

/// In-memory [`AuthProvider`].
///
/// Magic links are recorded instead of mailed; [`follow_magic_link`] plays
/// the part of the user clicking the link and creates the account on first
/// use.
///
/// [`follow_magic_link`]: MemoryAuthProvider::follow_magic_link
#[derive(Debug)]
pub struct MemoryAuthProvider {
    accounts: DashMap<String, Account>,
    pending_links: DashMap<String, String>,
    session: Arc<watch::Sender<Option<Session>>>,
}

impl Default for MemoryAuthProvider {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            accounts: DashMap::new(),
            pending_links: DashMap::new(),
            session: Arc::new(tx),
        }
    }
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AuthError::InvalidEmail(email)),
    }
}

impl MemoryAuthProvider {
    /// Create a provider with no accounts and no session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a password account and return its user id.
    pub fn register(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
        let email = normalize_email(email)?;
        let mut account = self.accounts.entry(email).or_insert_with(|| Account {
            user_id: UserId::generate(),
            password: None,
        });
        account.password = Some(password.to_owned());
        Ok(account.user_id.clone())
    }

    /// The redirect URL of the link pending for `email`, if one was sent.
    pub fn pending_link(&self, email: &str) -> Option<String> {
        let email = normalize_email(email).ok()?;
        self.pending_links.get(&email).map(|r| r.value().clone())
    }

    /// Complete a magic-link sign-in for `email`.
    pub fn follow_magic_link(&self, email: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email)?;
        if self.pending_links.remove(&email).is_none() {
            return Err(AuthError::InvalidCredentials);
        }
        let user_id = self
            .accounts
            .entry(email.clone())
            .or_insert_with(|| Account {
                user_id: UserId::generate(),
                password: None,
            })
            .user_id
            .clone();
        let session = Session::new(user_id).with_email(email);
        self.session.send_replace(Some(session.clone()));
        info!(user_id = %session.user_id, "signed in via magic link");
        Ok(session)
    }
}

#[async_trait]
impl AuthProvider for MemoryAuthProvider {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let email = normalize_email(email)?;
        let account = self
            .accounts
            .get(&email)
            .map(|a| a.value().clone())
            .ok_or(AuthError::InvalidCredentials)?;
        if account.password.as_deref() != Some(password) {
            return Err(AuthError::InvalidCredentials);
        }
        let session = Session::new(account.user_id).with_email(email);
        self.session.send_replace(Some(session.clone()));
        info!(user_id = %session.user_id, "signed in with password");
        Ok(session)
    }

    async fn send_magic_link(&self, email: &str, redirect_to: &str) -> Result<(), AuthError> {
        let email = normalize_email(email)?;
        debug!(email = %email, redirect_to = %redirect_to, "recording magic link");
        self.pending_links.insert(email, redirect_to.to_owned());
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if self.session.send_replace(None).is_some() {
            info!("signed out");
        }
        Ok(())
    }

    async fn session(&self) -> Result<Option<Session>, AuthError> {
        Ok(self.session.borrow().clone())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn password_sign_in_publishes_session() {
        let auth = MemoryAuthProvider::new();
        let user_id = auth.register("Me@Example.com", "hunter2").unwrap();
        let mut rx = auth.subscribe();

        let session = auth
            .sign_in_with_password("me@example.com", "hunter2")
            .await
            .unwrap();
        assert_eq!(session.user_id, user_id);
        assert_eq!(session.email.as_deref(), Some("me@example.com"));

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref(), Some(&session));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let auth = MemoryAuthProvider::new();
        auth.register("me@example.com", "hunter2").unwrap();
        let result = auth.sign_in_with_password("me@example.com", "nope").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        assert!(auth.session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn magic_link_creates_account_on_follow() {
        let auth = MemoryAuthProvider::new();
        auth.send_magic_link("new@example.com", "http://localhost:3000")
            .await
            .unwrap();
        assert_eq!(
            auth.pending_link("new@example.com").as_deref(),
            Some("http://localhost:3000")
        );

        let session = auth.follow_magic_link("new@example.com").unwrap();
        assert_eq!(auth.session().await.unwrap(), Some(session));
        assert!(auth.pending_link("new@example.com").is_none());
        assert!(
            auth.follow_magic_link("new@example.com").is_err(),
            "a link can only be followed once"
        );
    }

    #[tokio::test]
    async fn invalid_email_is_rejected() {
        let auth = MemoryAuthProvider::new();
        let result = auth.send_magic_link("not-an-email", "http://x").await;
        assert!(matches!(result, Err(AuthError::InvalidEmail(_))));
    }

    #[tokio::test]
    async fn sign_out_publishes_none() {
        let auth = MemoryAuthProvider::new();
        auth.register("me@example.com", "pw").unwrap();
        auth.sign_in_with_password("me@example.com", "pw")
            .await
            .unwrap();
        let mut rx = auth.subscribe();

        auth.sign_out().await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());

        // Signing out again is harmless.
        auth.sign_out().await.unwrap();
    }
}
