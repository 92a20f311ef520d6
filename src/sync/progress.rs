//! Per-book progress record with debounced writes.

use super::debounce::{Coalesce, Debouncer};
use crate::client::BooksService;
use crate::config::SyncConfig;
use crate::error::Result;
use crate::models::{ProgressPatch, ProgressRecord};
use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Local error state, readable by the UI.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncFailure {
    /// Loading the record failed.
    #[error("Failed to load progress: {0}")]
    Fetch(String),

    /// Writing progress failed.
    #[error("Failed to save progress: {0}")]
    Write(String),
}

/// Platform signals that end or suspend a reading session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// The view became visible again.
    Visible,
    /// The view was hidden.
    Hidden,
    /// The process or page is about to go away.
    Unloading,
}

/// Coalesced fields not yet sent, tagged with the local revision they bring
/// the record to.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingWrite {
    patch: ProgressPatch,
    revision: u64,
}

impl Coalesce for PendingWrite {
    fn coalesce(&mut self, newer: Self) {
        self.patch.merge(newer.patch);
        self.revision = newer.revision;
    }
}

#[derive(Debug, Default)]
struct ProgressState {
    record: Option<ProgressRecord>,
    loading: bool,
    error: Option<SyncFailure>,
    /// Bumped by every local change.
    revision: u64,
}

/// State shared with the debounce timer task.
struct Shared {
    book_id: Option<String>,
    service: Arc<dyn BooksService>,
    state: RwLock<ProgressState>,
    /// Held across each write so the server sees them in call order.
    write_gate: tokio::sync::Mutex<()>,
}

impl Shared {
    /// Merge a patch into the local record and return the new revision.
    ///
    /// An empty patch changes nothing and keeps the current revision.
    fn apply_local(&self, patch: &ProgressPatch) -> u64 {
        let mut state = self.state.write();
        if patch.is_empty() {
            return state.revision;
        }
        state.revision += 1;
        if let Some(record) = state.record.as_mut() {
            patch.apply_to(record);
        }
        state.revision
    }

    /// Write a patch. Errors are recorded locally and returned.
    ///
    /// Waits for any earlier write of this instance to finish first.
    async fn send(&self, patch: ProgressPatch, revision: u64) -> Result<()> {
        let Some(book_id) = self.book_id.as_deref() else {
            return Ok(());
        };

        let _gate = self.write_gate.lock().await;
        match self.service.write_progress(book_id, &patch).await {
            Ok(stored) => {
                let mut state = self.state.write();
                if state.revision == revision {
                    state.record = Some(stored);
                } else if let Some(record) = state.record.as_mut() {
                    // Newer local changes exist; keep them.
                    record.last_read_at = stored.last_read_at;
                }
                state.error = None;
                tracing::debug!(
                    book_id,
                    page = ?patch.current_page,
                    status = ?patch.status,
                    "Progress saved"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(book_id, error = %e, "Failed to save progress");
                self.state.write().error = Some(SyncFailure::Write(e.user_message()));
                Err(e)
            }
        }
    }
}

/// Owns the reading progress of one book for one viewing session.
///
/// Local changes are visible immediately. Debounced changes are merged and
/// written once the configured quiet period passes; immediate changes are
/// written right away together with anything still pending. Whatever is
/// pending when the session ends is flushed by [`ProgressSync::close`],
/// [`ProgressSync::notify`] or on drop.
///
/// Without a book ID the instance holds no record and never calls the
/// service.
pub struct ProgressSync {
    shared: Arc<Shared>,
    writer: Debouncer<PendingWrite>,
    closed: bool,
}

impl ProgressSync {
    /// Create an instance without fetching anything.
    pub fn new(
        service: Arc<dyn BooksService>,
        book_id: Option<String>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                book_id,
                service,
                state: RwLock::new(ProgressState::default()),
                write_gate: tokio::sync::Mutex::new(()),
            }),
            writer: Debouncer::new(config.debounce()),
            closed: false,
        }
    }

    /// Create an instance and fetch the current record once.
    ///
    /// A failed fetch leaves the record unset and exposes the error through
    /// [`ProgressSync::error`].
    pub async fn open(
        service: Arc<dyn BooksService>,
        book_id: Option<String>,
        config: &SyncConfig,
    ) -> Self {
        let sync = Self::new(service, book_id, config);
        let _ = sync.refresh().await;
        sync
    }

    /// Book this instance tracks.
    pub fn book_id(&self) -> Option<&str> {
        self.shared.book_id.as_deref()
    }

    /// Current local record.
    pub fn record(&self) -> Option<ProgressRecord> {
        self.shared.state.read().record.clone()
    }

    /// Whether a fetch is running.
    pub fn is_loading(&self) -> bool {
        self.shared.state.read().loading
    }

    /// Last fetch or write failure, cleared by the next success.
    pub fn error(&self) -> Option<SyncFailure> {
        self.shared.state.read().error.clone()
    }

    /// Whether debounced changes are waiting to be written.
    pub fn has_pending(&self) -> bool {
        self.writer.is_pending()
    }

    /// Fetch the record from the server.
    ///
    /// Skipped while changes are pending so local state never reverts to an
    /// older server value.
    pub async fn refresh(&self) -> Result<()> {
        let Some(book_id) = self.shared.book_id.as_deref() else {
            return Ok(());
        };
        if self.writer.is_pending() {
            tracing::debug!(book_id, "Refresh skipped, progress pending");
            return Ok(());
        }

        let revision = {
            let mut state = self.shared.state.write();
            state.loading = true;
            state.revision
        };

        let fetched = self.shared.service.fetch_progress(book_id).await;
        let pending = self.writer.peek();

        let mut state = self.shared.state.write();
        state.loading = false;
        match fetched {
            Ok(mut record) => {
                if state.revision == revision {
                    state.record = Some(record);
                } else if state.record.is_none() {
                    if let Some(pending) = pending {
                        pending.patch.apply_to(&mut record);
                    }
                    state.record = Some(record);
                }
                state.error = None;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(book_id, error = %e, "Failed to load progress");
                state.error = Some(SyncFailure::Fetch(e.user_message()));
                Err(e)
            }
        }
    }

    /// Merge fields into the record and schedule or perform the write.
    ///
    /// The local record changes before anything is sent. With `immediate`
    /// the pending changes are absorbed into this write, which is awaited and
    /// whose error is returned. Otherwise the write is debounced and its
    /// errors only show up through [`ProgressSync::error`].
    pub async fn update(&self, patch: ProgressPatch, immediate: bool) -> Result<()> {
        let Some(book_id) = self.shared.book_id.as_deref() else {
            return Ok(());
        };
        if patch.is_empty() && !immediate {
            return Ok(());
        }

        let revision = self.shared.apply_local(&patch);

        if immediate {
            let mut payload = self
                .writer
                .take()
                .map(|pending| pending.patch)
                .unwrap_or_default();
            payload.merge(patch);
            if payload.is_empty() {
                return Ok(());
            }
            tracing::debug!(book_id, "Writing progress immediately");
            return self.shared.send(payload, revision).await;
        }

        let shared = Arc::clone(&self.shared);
        self.writer
            .push(PendingWrite { patch, revision }, move |pending| async move {
                let _ = shared.send(pending.patch, pending.revision).await;
            });
        tracing::trace!(book_id, delay = ?self.writer.delay(), "Progress write scheduled");
        Ok(())
    }

    /// Move to a page.
    pub async fn set_current_page(&self, page: u32, immediate: bool) -> Result<()> {
        self.update(ProgressPatch::page(page), immediate).await
    }

    /// Send pending changes now without waiting for the result.
    ///
    /// The returned handle may be dropped; the write still runs.
    pub fn flush(&self) -> Option<JoinHandle<()>> {
        let pending = self.writer.take()?;

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                book_id = self.book_id().unwrap_or_default(),
                "No runtime available, dropping unsent progress"
            );
            return None;
        };

        tracing::debug!(book_id = self.book_id().unwrap_or_default(), "Flushing progress");
        let shared = Arc::clone(&self.shared);
        Some(runtime.spawn(async move {
            let _ = shared.send(pending.patch, pending.revision).await;
        }))
    }

    /// React to a platform lifecycle signal.
    pub fn notify(&self, signal: Lifecycle) -> Option<JoinHandle<()>> {
        match signal {
            Lifecycle::Hidden | Lifecycle::Unloading => self.flush(),
            Lifecycle::Visible => None,
        }
    }

    /// End the session, flushing anything pending.
    pub fn close(mut self) -> Option<JoinHandle<()>> {
        let handle = self.flush();
        self.closed = true;
        handle
    }
}

impl Drop for ProgressSync {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.flush();
        }
    }
}
