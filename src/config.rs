use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Reading progress sync and uploads for a personal ebook library.
#[derive(Parser, Debug, Clone)]
#[command(name = "shelf-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "SHELF_SYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Override the server base URL.
    #[arg(long, env = "SHELF_SYNC_URL", global = true)]
    pub server: Option<String>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a default config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },

    /// Upload book files or directories.
    Upload {
        /// Files or directories to upload.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Descend into subdirectories.
        #[arg(short, long)]
        recursive: bool,
    },

    /// Reading progress commands.
    Progress {
        /// Progress subcommand action.
        #[command(subcommand)]
        action: ProgressCommand,
    },

    /// Follow a reading session: page numbers are read from stdin, one per line.
    Read {
        /// Book ID.
        book_id: String,
    },

    /// List books on the server.
    Books,
}

/// Progress subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum ProgressCommand {
    /// Show the stored progress of a book.
    Show {
        /// Book ID.
        book_id: String,
    },

    /// Write progress right away.
    Set {
        /// Book ID.
        book_id: String,
        /// Current page.
        #[arg(short, long)]
        page: Option<u32>,
        /// Reading status (unread, reading, finished).
        #[arg(short, long)]
        status: Option<String>,
    },
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Client identity.
    #[serde(default)]
    pub client: ClientConfig,

    /// Progress sync configuration.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Upload configuration.
    #[serde(default)]
    pub upload: UploadConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the book service.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token.
    #[serde(default)]
    pub token: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Client identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Device ID sent with every request.
    #[serde(default)]
    pub device_id: Option<String>,
}

/// Progress sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Quiet period before coalesced progress is written, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    2000
}

impl SyncConfig {
    /// Debounce delay.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Upload configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Descend into subdirectories by default.
    #[serde(default)]
    pub recursive: bool,
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &PathBuf) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to parse config file: {}", e))
        })
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("shelf-sync.toml"),
            dirs::config_dir()
                .map(|p| p.join("shelf-sync").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/shelf-sync/config.toml"),
        ];

        candidates.into_iter().find(|p| p.exists())
    }

    /// Check values that would only fail later at request time.
    pub fn validate(&self) -> crate::error::Result<()> {
        let url = self.server.base_url.trim();
        if url.is_empty() {
            return Err(crate::error::AppError::Config(
                "server.base_url is missing".to_string(),
            ));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(crate::error::AppError::Config(format!(
                "server.base_url must start with http:// or https://: {}",
                url
            )));
        }
        if self.sync.debounce_ms == 0 {
            return Err(crate::error::AppError::Config(
                "sync.debounce_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Generate default config file content.
    pub fn generate_default(device_id: &str) -> String {
        format!(
            r#"# shelf-sync configuration

[server]
base_url = "http://localhost:8080"
# token = "changeme"
timeout_seconds = 30

[client]
device_id = "{device_id}"

[sync]
# Quiet period before page turns are written, in milliseconds
debounce_ms = 2000

[upload]
# Descend into subdirectories when uploading a directory
recursive = false
"#
        )
    }
}

/// Supported book formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookFormat {
    /// PDF format (Portable Document Format).
    Pdf,
    /// EPUB format (Electronic Publication).
    Epub,
}

impl BookFormat {
    /// Get the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            BookFormat::Pdf => "application/pdf",
            BookFormat::Epub => "application/epub+zip",
        }
    }

    /// Try to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(BookFormat::Pdf),
            "epub" => Some(BookFormat::Epub),
            _ => None,
        }
    }

    /// Detect format from a path's extension.
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips() {
        let config: Config = toml::from_str(&Config::generate_default("dev-1")).unwrap();
        assert_eq!(config.server.base_url, "http://localhost:8080");
        assert_eq!(config.client.device_id.as_deref(), Some("dev-1"));
        assert_eq!(config.sync.debounce(), Duration::from_millis(2000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config: Config = toml::from_str("[server]\nbase_url = \"https://books.lan\"\n").unwrap();
        assert_eq!(config.server.timeout_seconds, 30);
        assert_eq!(config.sync.debounce_ms, 2000);
        assert!(!config.upload.recursive);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = Config::default();
        config.server.base_url = "books.lan".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sync.debounce_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(BookFormat::from_extension("PDF"), Some(BookFormat::Pdf));
        assert_eq!(BookFormat::from_extension("epub"), Some(BookFormat::Epub));
        assert_eq!(BookFormat::from_extension("cbz"), None);
        assert_eq!(
            BookFormat::from_path(std::path::Path::new("/books/a.pdf")),
            Some(BookFormat::Pdf)
        );
    }
}
