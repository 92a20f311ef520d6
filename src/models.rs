use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reading state of a book.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReadingStatus {
    /// Not opened yet.
    #[default]
    Unread,
    /// Currently being read.
    Reading,
    /// Read to the end.
    Finished,
}

impl std::str::FromStr for ReadingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unread" => Ok(ReadingStatus::Unread),
            "reading" => Ok(ReadingStatus::Reading),
            "finished" | "done" => Ok(ReadingStatus::Finished),
            other => Err(format!("unknown reading status: {}", other)),
        }
    }
}

impl std::fmt::Display for ReadingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReadingStatus::Unread => "unread",
            ReadingStatus::Reading => "reading",
            ReadingStatus::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// Reading progress for a book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    /// Current page number (1-based).
    pub current_page: u32,
    /// Reading status.
    #[serde(default)]
    pub status: ReadingStatus,
    /// Last time the server recorded a read. Owned by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_read_at: Option<DateTime<Utc>>,
}

impl Default for ProgressRecord {
    fn default() -> Self {
        Self {
            current_page: 1,
            status: ReadingStatus::Unread,
            last_read_at: None,
        }
    }
}

/// Sparse set of progress fields waiting to be written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPatch {
    /// New current page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_page: Option<u32>,
    /// New reading status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ReadingStatus>,
}

impl ProgressPatch {
    /// Patch that only moves the current page.
    pub fn page(page: u32) -> Self {
        Self {
            current_page: Some(page.max(1)),
            status: None,
        }
    }

    /// Patch that only changes the status.
    pub fn status(status: ReadingStatus) -> Self {
        Self {
            current_page: None,
            status: Some(status),
        }
    }

    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        self.current_page.is_none() && self.status.is_none()
    }

    /// Merge a newer patch over this one, last value wins per field.
    pub fn merge(&mut self, newer: ProgressPatch) {
        if newer.current_page.is_some() {
            self.current_page = newer.current_page;
        }
        if newer.status.is_some() {
            self.status = newer.status;
        }
    }

    /// Apply the set fields to a record.
    pub fn apply_to(&self, record: &mut ProgressRecord) {
        if let Some(page) = self.current_page {
            record.current_page = page.max(1);
        }
        if let Some(status) = self.status {
            record.status = status;
        }
    }
}

/// Book as stored on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRecord {
    /// Unique book ID.
    pub id: String,
    /// Book title.
    pub title: String,
    /// Author, if known.
    #[serde(default)]
    pub author: Option<String>,
    /// File format (extension).
    #[serde(default)]
    pub format: Option<String>,
    /// File size in bytes.
    #[serde(default)]
    pub file_size: u64,
    /// Number of pages, if known.
    #[serde(default)]
    pub page_count: Option<u32>,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// State of one file within a batch upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// Waiting for its turn.
    Pending,
    /// Currently in flight.
    Uploading,
    /// Stored on the server.
    Success,
    /// Server already had this file.
    Skipped,
    /// Upload failed.
    Failed,
}

impl UploadStatus {
    /// Whether the file reached a final state.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            UploadStatus::Success | UploadStatus::Skipped | UploadStatus::Failed
        )
    }
}

/// One file of a batch upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTask {
    /// File display name.
    pub file: String,
    /// Current state.
    pub status: UploadStatus,
    /// Error text for skipped or failed files.
    pub error: Option<String>,
}

impl UploadTask {
    /// New pending task.
    pub fn pending(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            status: UploadStatus::Pending,
            error: None,
        }
    }
}

/// Aggregate counts of a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UploadSummary {
    /// Files stored on the server.
    pub uploaded: usize,
    /// Duplicates skipped.
    pub skipped: usize,
    /// Files that failed.
    pub failed: usize,
}

impl UploadSummary {
    /// Count the settled states of a task list.
    pub fn from_tasks(tasks: &[UploadTask]) -> Self {
        tasks
            .iter()
            .fold(Self::default(), |mut acc, task| {
                match task.status {
                    UploadStatus::Success => acc.uploaded += 1,
                    UploadStatus::Skipped => acc.skipped += 1,
                    UploadStatus::Failed => acc.failed += 1,
                    UploadStatus::Pending | UploadStatus::Uploading => {}
                }
                acc
            })
    }

    /// Total number of settled files.
    pub fn total(&self) -> usize {
        self.uploaded + self.skipped + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_serializes_only_set_fields() {
        let json = serde_json::to_string(&ProgressPatch::page(20)).unwrap();
        assert_eq!(json, r#"{"currentPage":20}"#);

        let json = serde_json::to_string(&ProgressPatch::status(ReadingStatus::Reading)).unwrap();
        assert_eq!(json, r#"{"status":"READING"}"#);
    }

    #[test]
    fn patch_merge_last_value_wins() {
        let mut patch = ProgressPatch::page(5);
        patch.merge(ProgressPatch::status(ReadingStatus::Reading));
        patch.merge(ProgressPatch::page(9));
        assert_eq!(patch.current_page, Some(9));
        assert_eq!(patch.status, Some(ReadingStatus::Reading));
    }

    #[test]
    fn page_patch_clamps_to_first_page() {
        assert_eq!(ProgressPatch::page(0).current_page, Some(1));
    }

    #[test]
    fn record_deserializes_server_payload() {
        let json = r#"{"currentPage":42,"status":"FINISHED","lastReadAt":"2024-05-01T10:00:00Z"}"#;
        let record: ProgressRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.current_page, 42);
        assert_eq!(record.status, ReadingStatus::Finished);
        assert!(record.last_read_at.is_some());
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("READING".parse::<ReadingStatus>(), Ok(ReadingStatus::Reading));
        assert!("paused".parse::<ReadingStatus>().is_err());
    }

    #[test]
    fn summary_counts_settled_states() {
        let tasks = vec![
            UploadTask {
                file: "a.pdf".into(),
                status: UploadStatus::Success,
                error: None,
            },
            UploadTask {
                file: "b.pdf".into(),
                status: UploadStatus::Skipped,
                error: Some("Duplicate file".into()),
            },
            UploadTask {
                file: "c.pdf".into(),
                status: UploadStatus::Failed,
                error: Some("Server down".into()),
            },
            UploadTask::pending("d.pdf"),
        ];
        let summary = UploadSummary::from_tasks(&tasks);
        assert_eq!(summary.uploaded, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total(), 3);
    }
}
