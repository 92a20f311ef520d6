//! Sequential batch uploads with per-file outcome classification.

use crate::client::BooksService;
use crate::error::Result;
use crate::library::{LibraryCache, UploadFile};
use crate::models::{BookRecord, UploadStatus, UploadSummary, UploadTask};
use std::sync::Arc;

/// Error text stored on files the server already had.
pub const DUPLICATE_MESSAGE: &str = "Duplicate file";

/// Error text used when a failure carries no message.
pub const FALLBACK_MESSAGE: &str = "Upload failed";

/// Uploads book files one at a time.
pub struct BatchUploader {
    service: Arc<dyn BooksService>,
    cache: Arc<LibraryCache>,
}

impl BatchUploader {
    /// Create an uploader that refreshes `cache` after uploads.
    pub fn new(service: Arc<dyn BooksService>, cache: Arc<LibraryCache>) -> Self {
        Self { service, cache }
    }

    /// Upload a single file, returning the server's error as is.
    pub async fn upload_one(&self, file: &UploadFile) -> Result<BookRecord> {
        let book = self.service.upload_file(file).await?;
        tracing::info!(file = %file.name, book_id = %book.id, "Uploaded book");
        self.cache.invalidate();
        Ok(book)
    }

    /// Upload files in order, one at a time.
    ///
    /// `on_progress` receives the whole task list and the index of the file
    /// that changed: first with every file pending (index 0), then once when
    /// each file starts and once when it settles.
    /// Failures never stop the batch and are never returned as errors: each
    /// file ends as success, skipped (duplicate) or failed. The listing cache
    /// is invalidated when the batch ends, whatever the outcome.
    pub async fn upload_many<F>(&self, files: &[UploadFile], mut on_progress: F) -> Vec<UploadTask>
    where
        F: FnMut(&[UploadTask], usize),
    {
        if files.is_empty() {
            return Vec::new();
        }

        let mut tasks: Vec<UploadTask> = files
            .iter()
            .map(|f| UploadTask::pending(f.name.clone()))
            .collect();

        on_progress(&tasks, 0);

        tracing::info!(files = files.len(), "Starting batch upload");
        let start = std::time::Instant::now();

        for (index, file) in files.iter().enumerate() {
            tasks[index].status = UploadStatus::Uploading;
            on_progress(&tasks, index);

            let task = &mut tasks[index];
            match self.service.upload_file(file).await {
                Ok(book) => {
                    tracing::debug!(file = %file.name, book_id = %book.id, "Uploaded");
                    task.status = UploadStatus::Success;
                }
                Err(e) if e.is_conflict() => {
                    tracing::debug!(file = %file.name, "Skipped duplicate");
                    task.status = UploadStatus::Skipped;
                    task.error = Some(DUPLICATE_MESSAGE.to_string());
                }
                Err(e) => {
                    tracing::warn!(file = %file.name, error = %e, "Upload failed");
                    let message = e.user_message();
                    task.status = UploadStatus::Failed;
                    task.error = Some(if message.is_empty() {
                        FALLBACK_MESSAGE.to_string()
                    } else {
                        message
                    });
                }
            }

            on_progress(&tasks, index);
        }

        let summary = UploadSummary::from_tasks(&tasks);
        tracing::info!(
            uploaded = summary.uploaded,
            skipped = summary.skipped,
            failed = summary.failed,
            elapsed = ?start.elapsed(),
            "Batch upload complete"
        );

        self.cache.invalidate();
        tasks
    }
}
