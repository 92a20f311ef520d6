//! Network boundary to the book service.

mod http;

pub use http::HttpBooksService;

use crate::error::Result;
use crate::library::UploadFile;
use crate::models::{BookRecord, ProgressRecord, ProgressPatch};
use async_trait::async_trait;

/// Operations the sync and upload components need from the book service.
///
/// Implementations must be safe to call concurrently; the components
/// serialise their own calls.
#[async_trait]
pub trait BooksService: Send + Sync {
    /// Fetch the stored progress of a book.
    async fn fetch_progress(&self, book_id: &str) -> Result<ProgressRecord>;

    /// Write a partial progress update and return the stored record.
    ///
    /// Writing the same patch twice must leave the same state.
    async fn write_progress(&self, book_id: &str, patch: &ProgressPatch)
    -> Result<ProgressRecord>;

    /// Upload a book file.
    ///
    /// Fails with [`crate::AppError::Conflict`] when the server already has it.
    async fn upload_file(&self, file: &UploadFile) -> Result<BookRecord>;

    /// List the books stored on the server.
    async fn list_books(&self) -> Result<Vec<BookRecord>>;
}
