//! Request ledger
//!
//! Maps a (requester, request id) key to a running or finished handle. At
//! most one handle lives under a key. The first poll that observes the
//! terminal result removes the entry, so later polls report the request as
//! unknown.
//!
//! Pollers of the same key are expected to be serialized by the caller. If
//! they race, exactly one of them receives the terminal result.

use crate::handle::{Poll, RequestHandle};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::distr::Alphanumeric;
use rand::Rng;
use reco_core::{RecoError, RecoResult};
use std::sync::Arc;

/// Identity of a request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    /// Who issued the request
    pub requester: String,
    /// Caller-chosen name or generated token
    pub request_id: String,
}

impl RequestKey {
    /// Key for `request_id` issued by `requester`
    pub fn new(requester: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            requester: requester.into(),
            request_id: request_id.into(),
        }
    }

    /// Error reported for a poll of an unknown key
    #[must_use]
    pub fn not_found(&self) -> RecoError {
        RecoError::RequestNotFound {
            requester: self.requester.clone(),
            request_id: self.request_id.clone(),
        }
    }
}

/// Shared handle stored in a ledger
pub type SharedHandle<T> = Arc<dyn RequestHandle<Output = T>>;

/// In-flight and finished requests producing `T`
pub struct RequestLedger<T> {
    entries: DashMap<RequestKey, SharedHandle<T>>,
}

impl<T: Send + 'static> RequestLedger<T> {
    /// Create an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Store `handle` under `key` and start it on its own task
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// `RecoError::DuplicateRequest` if `key` already has an entry; the
    /// existing handle is left in place and `handle` is not started.
    pub fn start_processing(&self, key: RequestKey, handle: SharedHandle<T>) -> RecoResult<()> {
        match self.entries.entry(key) {
            Entry::Occupied(entry) => {
                tracing::debug!("Request {} of {} already running", entry.key().request_id, entry.key().requester);
                return Err(RecoError::DuplicateRequest);
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&handle));
            }
        }
        tokio::spawn(async move { handle.start().await });
        Ok(())
    }

    /// Start `handle` under a fresh random id of `id_len` characters
    ///
    /// Ids colliding with a live entry are regenerated.
    pub fn start_with_new_id(&self, requester: &str, handle: SharedHandle<T>, id_len: usize) -> String {
        loop {
            let request_id = generate_request_id(id_len, &mut rand::rng());
            let key = RequestKey::new(requester, request_id.clone());
            if self.start_processing(key, Arc::clone(&handle)).is_ok() {
                return request_id;
            }
            tracing::debug!("Request id collision for {}, retrying", requester);
        }
    }

    /// Current response for `key`, `None` if there is no such request
    ///
    /// A terminal response removes the entry before it is returned.
    pub fn get_response(&self, key: &RequestKey) -> Option<Poll<T>> {
        let handle = Arc::clone(self.entries.get(key)?.value());
        let response = handle.response();
        if response.is_done() {
            // another poller may have consumed it already
            self.entries.remove_if(key, |_, stored| Arc::ptr_eq(stored, &handle))?;
        }
        Some(response)
    }

    /// Whether `key` has an entry
    #[must_use]
    pub fn contains(&self, key: &RequestKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Send + 'static> Default for RequestLedger<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Random alphanumeric request id
pub fn generate_request_id<R: Rng>(len: usize, rng: &mut R) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len.max(1))
        .map(char::from)
        .collect()
}
