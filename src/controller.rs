use crate::client::Backend;
use crate::constants::constants;
use crate::error::{ApiError, DeleteError, UploadError};
use crate::protocol::{DraftEntry, QuestionRecord};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::sleep;

/// Everything the dashboard renders. Mutated only through `SearchSyncController`.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ViewState {
    pub search_query: String,
    pub results: Vec<QuestionRecord>,
    pub loading: bool,
    pub dialog_open: bool,
    pub draft: DraftEntry,
}

/// How many records each kind of search asks for, and how long typing must pause
#[derive(Debug, Clone)]
pub struct SearchPolicy {
    pub default_k: usize,
    pub browse_k: usize,
    pub debounce: Duration,
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            default_k: constants::DEFAULT_SEARCH_K,
            browse_k: constants::DEFAULT_BROWSE_K,
            debounce: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The response was the latest one and now backs the view; holds the record count
    Committed(usize),
    /// Empty query: results cleared without a request
    Cleared,
    /// A newer search was issued first; this one changed nothing
    Superseded,
}

/// A confirmed delete that an older in-flight search must not bring back
struct Tombstone {
    index_id: String,
    ticket: u64,
}

#[derive(Default)]
struct Inner {
    view: ViewState,
    /// Ticket of the most recently issued search
    latest_ticket: u64,
    /// Bumped on every query edit, used by the debounce window
    edits: u64,
    tombstones: Vec<Tombstone>,
}

impl Inner {
    /// A new search reflects every delete confirmed so far, so older tombstones go
    fn issue_ticket(&mut self) -> u64 {
        self.latest_ticket += 1;
        self.tombstones.clear();
        self.latest_ticket
    }

    /// Drop records deleted while the search holding `ticket` was in flight
    fn apply_tombstones(&self, ticket: u64, records: &mut Vec<QuestionRecord>) {
        let deleted: Vec<&str> = self
            .tombstones
            .iter()
            .filter(|t| t.ticket == ticket)
            .map(|t| t.index_id.as_str())
            .collect();
        if deleted.is_empty() {
            return;
        }
        records.retain(|r| !deleted.contains(&r.index_id.as_str()));
    }
}

/// Keeps the local view consistent with the similarity backend across
/// overlapping searches, uploads and deletes.
///
/// Every search takes a ticket when issued and only the holder of the latest
/// ticket may write `results` or clear `loading`. The state lock is never held
/// across an `.await`.
pub struct SearchSyncController<B> {
    backend: B,
    policy: SearchPolicy,
    state: Mutex<Inner>,
}

impl<B: Backend> SearchSyncController<B> {
    pub fn new(backend: B, policy: SearchPolicy) -> Self {
        Self {
            backend,
            policy,
            state: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // No invariant spans a panic point, so a poisoned state is still usable
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current view state
    pub fn snapshot(&self) -> ViewState {
        self.lock().view.clone()
    }

    pub fn results(&self) -> Vec<QuestionRecord> {
        self.lock().view.results.clone()
    }

    /// Browse-all load, issued when the dashboard starts and on request.
    ///
    /// The search box is emptied first, and any debounced keystroke still
    /// waiting is dropped.
    pub async fn initialize(&self) -> Result<SearchOutcome, ApiError> {
        {
            let mut inner = self.lock();
            inner.view.search_query.clear();
            inner.edits += 1;
        }
        debug!("Loading initial results (k={})", self.policy.browse_k);
        self.search(constants::BROWSE_ALL_QUERY, self.policy.browse_k)
            .await
    }

    /// Record a change to the search box and search for it.
    ///
    /// With a non-zero debounce the search is only issued if no further edit
    /// arrives within the interval; otherwise this returns `Superseded`. An
    /// empty query never waits since it sends nothing.
    pub async fn set_search_query(&self, text: &str) -> Result<SearchOutcome, ApiError> {
        let edit = {
            let mut inner = self.lock();
            inner.view.search_query = text.to_string();
            inner.edits += 1;
            inner.edits
        };

        if !text.is_empty() && !self.policy.debounce.is_zero() {
            sleep(self.policy.debounce).await;
            if self.lock().edits != edit {
                debug!("Query {:?} replaced during debounce window", text);
                return Ok(SearchOutcome::Superseded);
            }
        }

        self.search(text, self.policy.default_k).await
    }

    /// Fetch the top-`k` records for `query` and make them the result set.
    ///
    /// An empty query clears the results without a request. A failed request
    /// also leaves the result set empty; the error is logged and returned.
    pub async fn search(&self, query: &str, k: usize) -> Result<SearchOutcome, ApiError> {
        let ticket = {
            let mut inner = self.lock();
            let ticket = inner.issue_ticket();
            if query.is_empty() {
                inner.view.results.clear();
                inner.view.loading = false;
                return Ok(SearchOutcome::Cleared);
            }
            inner.view.loading = true;
            ticket
        };

        debug!("Search #{} for {:?} (k={})", ticket, query, k);
        let response = self.backend.search(query, k).await;

        let mut inner = self.lock();
        if ticket != inner.latest_ticket {
            debug!(
                "Discarding response #{} for {:?}, #{} is newer",
                ticket, query, inner.latest_ticket
            );
            if let Err(e) = response {
                warn!("Superseded search for {:?} failed: {}", query, e);
            }
            return Ok(SearchOutcome::Superseded);
        }

        inner.view.loading = false;
        match response {
            Ok(mut records) => {
                inner.apply_tombstones(ticket, &mut records);
                let count = records.len();
                inner.view.results = records;
                Ok(SearchOutcome::Committed(count))
            }
            Err(e) => {
                error!("Error fetching data: {}", e);
                inner.view.results.clear();
                Err(e)
            }
        }
    }

    pub fn open_dialog(&self) {
        self.lock().view.dialog_open = true;
    }

    /// Close the create dialog and throw away whatever was typed
    pub fn cancel_dialog(&self) {
        let mut inner = self.lock();
        inner.view.dialog_open = false;
        inner.view.draft = DraftEntry::default();
    }

    pub fn set_draft_question(&self, question: &str) {
        self.lock().view.draft.question = question.to_string();
    }

    pub fn set_draft_sql(&self, sql_query: &str) {
        self.lock().view.draft.sql_query = sql_query.to_string();
    }

    /// Submit the dialog's current draft
    pub async fn submit_draft(&self) -> Result<(), UploadError> {
        let draft = self.lock().view.draft.clone();
        self.create_entry(&draft.question, &draft.sql_query).await
    }

    /// Upload a new question/SQL pair.
    ///
    /// On success the draft is cleared, the dialog closed, and an active
    /// search is re-run so the new entry can show up. On failure nothing
    /// local changes.
    pub async fn create_entry(&self, question: &str, sql_query: &str) -> Result<(), UploadError> {
        if question.trim().is_empty() {
            return Err(UploadError::MissingField("question"));
        }
        if sql_query.trim().is_empty() {
            return Err(UploadError::MissingField("sql_query"));
        }

        let entry = DraftEntry::new(question, sql_query);
        if let Err(e) = self.backend.upload(&entry).await {
            error!("Error uploading data: {}", e);
            return Err(e.into());
        }
        info!("Data uploaded successfully");

        let active_query = {
            let mut inner = self.lock();
            inner.view.draft = DraftEntry::default();
            inner.view.dialog_open = false;
            inner.view.search_query.clone()
        };

        if !active_query.is_empty() {
            // Refresh failures are logged by search and don't undo the upload
            if let Err(e) = self.search(&active_query, self.policy.default_k).await {
                debug!("Refresh after upload failed: {}", e);
            }
        }
        Ok(())
    }

    /// Delete a record on the backend, then drop it from the result set.
    ///
    /// Ids that are not currently displayed are fine: the local removal is a no-op.
    pub async fn delete_entry(&self, index_id: &str) -> Result<(), DeleteError> {
        debug!("Deleting index_id: {}", index_id);
        if let Err(e) = self.backend.delete(index_id).await {
            error!("Error deleting data: {}", e);
            return Err(e);
        }

        let mut inner = self.lock();
        inner.view.results.retain(|r| r.index_id != index_id);
        let ticket = inner.latest_ticket;
        inner.tombstones.push(Tombstone {
            index_id: index_id.to_string(),
            ticket,
        });
        Ok(())
    }
}
