//! Local book file prepared for upload.

use crate::config::BookFormat;
use crate::error::{AppError, Result};
use std::path::Path;

/// A book file read from disk, ready to be sent to the server.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// File name sent to the server.
    pub name: String,

    /// File format.
    pub format: BookFormat,

    /// File contents.
    pub data: Vec<u8>,
}

impl UploadFile {
    /// Create an upload from in-memory contents.
    pub fn new(name: impl Into<String>, format: BookFormat, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            format,
            data,
        }
    }

    /// Read a file from disk and detect its format.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let format = BookFormat::from_path(path).ok_or_else(|| {
            AppError::InvalidFormat(format!("Unsupported file type: {}", path.display()))
        })?;

        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        Ok(Self {
            name,
            format,
            data,
        })
    }

    /// File size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Title derived from the file name.
    pub fn title(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Unknown")
    }
}
