//! Session-scoped lock registry
//!
//! Serializes the operations that read or write a whole session's worth of
//! prediction and result state: scoring, ingestion, and prediction writes
//! on an already-scored session. One async mutex per session id, created
//! lazily.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use prediapp_common::{Error, Result};

/// Registry of per-session async mutexes
#[derive(Clone, Default)]
pub struct SessionLocks {
    inner: Arc<Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, session_id: i64) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(session_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Wait for exclusive access to a session
    pub async fn acquire(&self, session_id: i64) -> OwnedMutexGuard<()> {
        self.entry(session_id).lock_owned().await
    }

    /// Fail fast with `Conflict` when the session is already being worked on
    pub fn try_acquire(&self, session_id: i64) -> Result<OwnedMutexGuard<()>> {
        self.entry(session_id).try_lock_owned().map_err(|_| {
            Error::Conflict(format!(
                "session {session_id} is already being ingested or scored"
            ))
        })
    }
}
