//! Turns the edited entry form into record store writes keyed by
//! `(owner, date)`.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use bodylog_core::{BodyEntry, EditingContext, EntryForm, NewEntry, Session, today_local};
use bodylog_store::RecordStore;

use crate::confirm::ConfirmationGate;
use crate::error::ClientError;
use crate::gate::{LoadOutcome, OperationGate};

/// Result of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The store had no such entry for this owner.
    Missing,
    /// The user declined the confirmation; nothing was sent.
    Declined,
}

#[derive(Debug)]
struct EntryState {
    entries: Vec<BodyEntry>,
    form: EntryForm,
    editing: Option<EditingContext>,
}

impl EntryState {
    fn reset_form(&mut self) {
        self.form = EntryForm::blank(today_local());
        self.editing = None;
    }
}

/// Owns the entry list, the form and the edit session for one signed-in user.
pub struct EntryReconciler {
    records: Arc<dyn RecordStore>,
    gate: OperationGate,
    state: Mutex<EntryState>,
}

impl std::fmt::Debug for EntryReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryReconciler")
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl EntryReconciler {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self {
            records,
            gate: OperationGate::new(),
            state: Mutex::new(EntryState {
                entries: Vec::new(),
                form: EntryForm::blank(today_local()),
                editing: None,
            }),
        }
    }

    /// The loaded entries, newest date first.
    pub async fn entries(&self) -> Vec<BodyEntry> {
        self.state.lock().await.entries.clone()
    }

    /// The most recent entry, if any.
    pub async fn latest(&self) -> Option<BodyEntry> {
        self.state.lock().await.entries.first().cloned()
    }

    pub async fn form(&self) -> EntryForm {
        self.state.lock().await.form.clone()
    }

    /// Replace the form contents, e.g. as the user types.
    pub async fn set_form(&self, form: EntryForm) {
        self.state.lock().await.form = form;
    }

    pub async fn editing(&self) -> Option<EditingContext> {
        self.state.lock().await.editing.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    /// Start editing `entry`: remember its key and seed the form from it.
    pub async fn start_edit(&self, entry: &BodyEntry) {
        let mut state = self.state.lock().await;
        state.form = EntryForm::from_entry(entry);
        state.editing = Some(EditingContext::for_entry(entry));
    }

    /// Drop the edit session and reset the form.
    pub async fn cancel_edit(&self) {
        self.state.lock().await.reset_form();
    }

    /// Forget all loaded data. Results of operations still in flight are
    /// discarded.
    pub async fn clear(&self) {
        let _ticket = self.gate.begin();
        let mut state = self.state.lock().await;
        state.entries.clear();
        state.reset_form();
    }

    /// Reload the owner's entries.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Store`] if listing fails.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn refresh(&self, session: &Session) -> Result<LoadOutcome, ClientError> {
        let ticket = self.gate.begin();
        let Some(result) = ticket
            .read(self.records.list_entries(&session.user_id))
            .await
        else {
            debug!(seq = ticket.sequence(), "entry load cancelled");
            return Ok(LoadOutcome::Superseded);
        };
        let entries = result?;

        let mut state = self.state.lock().await;
        if !ticket.is_current() {
            debug!(seq = ticket.sequence(), "discarding stale entry load");
            return Ok(LoadOutcome::Superseded);
        }
        debug!(count = entries.len(), "entries loaded");
        state.entries = entries;
        Ok(LoadOutcome::Applied)
    }

    /// Submit the current form under the current edit session.
    ///
    /// # Errors
    ///
    /// See [`save`](Self::save).
    pub async fn submit(&self, session: &Session) -> Result<BodyEntry, ClientError> {
        let (form, editing) = {
            let state = self.state.lock().await;
            (state.form.clone(), state.editing.clone())
        };
        self.save(session, &form, editing.as_ref()).await
    }

    /// Write `form` as the owner's entry for its date.
    ///
    /// When `editing` started from a different date, the original record is
    /// deleted first so the owner never keeps both. On success the form is
    /// reset, the edit session ends and the list is reloaded.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] without touching the store when the
    /// date is missing or malformed, and [`ClientError::Store`] when a remote
    /// call fails. Local state is left as it was on error.
    #[instrument(skip(self, session, form, editing), fields(user_id = %session.user_id, date = %form.date))]
    pub async fn save(
        &self,
        session: &Session,
        form: &EntryForm,
        editing: Option<&EditingContext>,
    ) -> Result<BodyEntry, ClientError> {
        let (date, fields) = form.normalize()?;
        let owner = &session.user_id;
        let ticket = self.gate.begin();

        if let Some(ctx) = editing.filter(|ctx| ctx.changes_key(date)) {
            let removed = self.records.delete_entry(owner, &ctx.entry_id).await?;
            debug!(
                entry_id = %ctx.entry_id,
                from = %ctx.original_date,
                to = %date,
                removed,
                "moved entry to a new date"
            );
        }

        let saved = self
            .records
            .upsert_entry(&NewEntry::new(owner.clone(), date, fields))
            .await?;
        info!(entry_id = %saved.id, "entry saved");

        self.state.lock().await.reset_form();
        drop(ticket);

        if let Err(e) = self.refresh(session).await {
            warn!(error = %e, "entry saved but reloading the list failed");
        }
        Ok(saved)
    }

    /// Delete `entry` after the user confirms.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Store`] if the delete fails.
    #[instrument(skip_all, fields(user_id = %session.user_id, entry_id = %entry.id))]
    pub async fn delete(
        &self,
        session: &Session,
        entry: &BodyEntry,
        confirmation: &dyn ConfirmationGate,
    ) -> Result<DeleteOutcome, ClientError> {
        let prompt = format!("Delete the entry for {}?", entry.date);
        if !confirmation.confirm(&prompt) {
            debug!("delete declined");
            return Ok(DeleteOutcome::Declined);
        }

        let ticket = self.gate.begin();
        let removed = self
            .records
            .delete_entry(&session.user_id, &entry.id)
            .await?;

        {
            let mut state = self.state.lock().await;
            if state
                .editing
                .as_ref()
                .is_some_and(|ctx| ctx.entry_id == entry.id)
            {
                state.reset_form();
            }
        }
        drop(ticket);

        if let Err(e) = self.refresh(session).await {
            warn!(error = %e, "entry deleted but reloading the list failed");
        }

        if removed {
            info!("entry deleted");
            Ok(DeleteOutcome::Deleted)
        } else {
            Ok(DeleteOutcome::Missing)
        }
    }
}
