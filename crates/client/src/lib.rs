//! bodylog client
//!
//! Keeps a signed-in user's body entries and prescription photos consistent
//! with the remote record store and object storage.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bodylog_client::BodyLog;
//! use bodylog_core::{EntryForm, Session, today_local};
//! use bodylog_store_memory::{MemoryObjectStorage, MemoryRecordStore};
//!
//! # async fn example() -> Result<(), bodylog_client::ClientError> {
//! let app = BodyLog::new(
//!     Arc::new(MemoryRecordStore::new()),
//!     Arc::new(MemoryObjectStorage::default()),
//! );
//! let session = Session::new("user-1");
//! app.on_session_change(Some(session.clone())).await?;
//!
//! let form = EntryForm {
//!     weight: "70.2".into(),
//!     ..EntryForm::blank(today_local())
//! };
//! app.entries().save(&session, &form, None).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Calls on a subsystem may overlap; its [`OperationGate`] decides which
//! result is applied.

pub mod confirm;
pub mod entries;
mod error;
pub mod gate;
pub mod photos;

pub use confirm::{AutoConfirm, ConfirmationGate};
pub use entries::{DeleteOutcome, EntryReconciler};
pub use error::ClientError;
pub use gate::{LoadOutcome, OperationGate, OperationTicket};
pub use photos::{PhotoDocuments, RemoveOutcome, UploadFailure, UploadFile, UploadReport};

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use bodylog_core::Session;
use bodylog_store::{AuthProvider, ObjectStorage, RecordStore};

/// Both subsystems plus the current session.
#[derive(Debug)]
pub struct BodyLog {
    session: RwLock<Option<Session>>,
    entries: EntryReconciler,
    photos: PhotoDocuments,
}

impl BodyLog {
    pub fn new(records: Arc<dyn RecordStore>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self::from_parts(
            EntryReconciler::new(records.clone()),
            PhotoDocuments::new(records, storage),
        )
    }

    /// Assemble from preconfigured subsystems.
    pub fn from_parts(entries: EntryReconciler, photos: PhotoDocuments) -> Self {
        Self {
            session: RwLock::new(None),
            entries,
            photos,
        }
    }

    pub fn entries(&self) -> &EntryReconciler {
        &self.entries
    }

    pub fn photos(&self) -> &PhotoDocuments {
        &self.photos
    }

    pub async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    /// The current session.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotSignedIn`] when nobody is signed in.
    pub async fn require_session(&self) -> Result<Session, ClientError> {
        self.session().await.ok_or(ClientError::NotSignedIn)
    }

    /// React to a sign-in or sign-out.
    ///
    /// Signing in loads entries and the photo document concurrently. Signing
    /// out clears all user data, including any edit session.
    ///
    /// # Errors
    ///
    /// Returns the first load error; the other load still completes.
    pub async fn on_session_change(&self, session: Option<Session>) -> Result<(), ClientError> {
        *self.session.write().await = session.clone();

        let Some(session) = session else {
            tokio::join!(self.entries.clear(), self.photos.clear());
            info!("signed out, user data cleared");
            return Ok(());
        };

        info!(user_id = %session.user_id, "session started");
        let (entries, photos) =
            tokio::join!(self.entries.refresh(&session), self.photos.load(&session));
        debug!(?entries, ?photos, "initial loads finished");
        entries?;
        photos?;
        Ok(())
    }

    /// Follow the auth provider's session channel until it closes.
    pub fn watch_auth(self: &Arc<Self>, auth: &dyn AuthProvider) -> JoinHandle<()> {
        let mut rx = auth.subscribe();
        let app = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let session = rx.borrow_and_update().clone();
                if let Err(e) = app.on_session_change(session).await {
                    warn!(error = %e, "failed to load data for new session");
                }
                if rx.changed().await.is_err() {
                    debug!("auth channel closed");
                    break;
                }
            }
        })
    }
}
