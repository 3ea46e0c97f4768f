use async_trait::async_trait;
use tokio::sync::watch;

use bodylog_core::Session;

use crate::error::AuthError;

/// Identity and session management delegated to the backend.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Sign in with email and password, replacing any current session.
    async fn sign_in_with_password(&self, email: &str, password: &str)
    -> Result<Session, AuthError>;

    /// Send a passwordless sign-in link. Following the link signs the user in
    /// and is reported through [`subscribe`](Self::subscribe).
    async fn send_magic_link(&self, email: &str, redirect_to: &str) -> Result<(), AuthError>;

    /// End the current session. Signing out without a session is a no-op.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// The current session, if signed in.
    async fn session(&self) -> Result<Option<Session>, AuthError>;

    /// Watch channel that yields the session after every sign-in and `None`
    /// after every sign-out.
    fn subscribe(&self) -> watch::Receiver<Option<Session>>;
}
