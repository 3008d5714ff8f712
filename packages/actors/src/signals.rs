//! In-process cancellation signals.
//!
//! The `is_canceled` column stays the source of truth. A token per live job
//! lets workers running in this process react without polling the store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use jobs_core::JobId;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct CancelSignals {
    tokens: Arc<Mutex<HashMap<JobId, CancellationToken>>>,
}

impl CancelSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the token for a freshly dispatched job.
    pub fn register(&self, id: JobId) -> CancellationToken {
        let token = CancellationToken::new();
        self.lock().insert(id, token.clone());
        token
    }

    pub fn get(&self, id: JobId) -> Option<CancellationToken> {
        self.lock().get(&id).cloned()
    }

    /// Trip the token. Returns false if the job has no token here.
    pub fn trip(&self, id: JobId) -> bool {
        match self.lock().get(&id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_tripped(&self, id: JobId) -> bool {
        self.lock()
            .get(&id)
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Forget the token once the job can no longer change.
    pub fn remove(&self, id: JobId) {
        self.lock().remove(&id);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, CancellationToken>> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
