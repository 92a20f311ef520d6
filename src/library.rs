//! Book listing cache and local file discovery.

pub mod book;

pub use book::UploadFile;

use crate::client::BooksService;
use crate::config::BookFormat;
use crate::error::Result;
use crate::models::BookRecord;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cached listing of the books stored on the server.
///
/// Uploads call [`LibraryCache::invalidate`] so the next read refetches.
pub struct LibraryCache {
    service: Arc<dyn BooksService>,
    books: parking_lot::RwLock<Vec<BookRecord>>,
    loaded: AtomicBool,
}

impl LibraryCache {
    /// Create an empty cache backed by a service.
    pub fn new(service: Arc<dyn BooksService>) -> Self {
        Self {
            service,
            books: parking_lot::RwLock::new(Vec::new()),
            loaded: AtomicBool::new(false),
        }
    }

    /// Get the book listing, fetching it if the cache is stale.
    pub async fn books(&self) -> Result<Vec<BookRecord>> {
        if self.loaded.load(Ordering::Acquire) {
            return Ok(self.books.read().clone());
        }

        let start = std::time::Instant::now();
        let books = self.service.list_books().await?;
        tracing::debug!(books = books.len(), elapsed = ?start.elapsed(), "Loaded book listing");

        *self.books.write() = books.clone();
        self.loaded.store(true, Ordering::Release);
        Ok(books)
    }

    /// Mark the listing stale.
    pub fn invalidate(&self) {
        if self.loaded.swap(false, Ordering::AcqRel) {
            tracing::debug!("Book listing invalidated");
        }
    }

    /// Whether a fresh listing is cached.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }
}

/// Collect uploadable files from a list of files and directories.
///
/// Argument order is kept; directory entries are sorted by path. Files
/// given explicitly are kept only if their format is supported.
pub fn collect_files(paths: &[PathBuf], recursive: bool) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = walkdir::WalkDir::new(path)
                .follow_links(true)
                .max_depth(if recursive { usize::MAX } else { 1 })
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .map(|e| e.into_path())
                .filter(|p| is_supported(p))
                .collect();
            found.sort();
            files.extend(found);
        } else if is_supported(path) {
            files.push(path.clone());
        } else {
            tracing::warn!(path = %path.display(), "Skipping unsupported file");
        }
    }

    files
}

fn is_supported(path: &Path) -> bool {
    BookFormat::from_path(path).is_some()
}
