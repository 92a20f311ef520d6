//! shelf-sync: reading progress sync and batch uploads for a personal ebook library.
//!
//! This crate is the client side of a book service: it keeps the reading
//! position of the open book in sync with the server without flooding it
//! with writes, and uploads book files one at a time while reporting
//! progress.
//!
//! # Features
//!
//! - Debounced progress writes with immediate bypass
//! - Flush of pending progress on close, drop and lifecycle signals
//! - Sequential batch uploads with duplicate detection
//! - Cached book listing refreshed after uploads
//! - HTTP client for the book service

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Book service boundary and HTTP client.
pub mod client;
/// Configuration and CLI.
pub mod config;
/// Error types.
pub mod error;
/// Book listing cache and local files.
pub mod library;
/// Data model.
pub mod models;
/// Progress synchronisation.
pub mod sync;
/// Batch uploads.
pub mod upload;


pub use client::{BooksService, HttpBooksService};
pub use config::{Cli, Command, Config};
pub use error::{AppError, Result};
pub use sync::{Lifecycle, ProgressSync, SyncFailure};
pub use upload::BatchUploader;
