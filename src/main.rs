//! shelf-sync command-line entry point.

use clap::Parser;
use shelf_sync::{
    BatchUploader, HttpBooksService, Lifecycle, ProgressSync,
    client::BooksService,
    config::{Cli, Command, Config, ProgressCommand},
    library::{self, LibraryCache, UploadFile},
    models::{ProgressPatch, ReadingStatus, UploadStatus, UploadSummary},
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shelf_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Find or load config
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    let mut config = if let Some(ref path) = config_path {
        Config::load(path)?
    } else {
        Config::default()
    };

    if let Some(server) = cli.server {
        config.server.base_url = server;
    }

    if let Command::Init { force } = cli.command {
        return cmd_init(force);
    }

    config.validate()?;
    let service: Arc<dyn BooksService> = Arc::new(HttpBooksService::from_config(&config)?);

    tracing::debug!(
        server = %config.server.base_url,
        config = ?config_path,
        "Configured book service"
    );

    match cli.command {
        Command::Init { .. } => Ok(()),
        Command::Upload { paths, recursive } => {
            cmd_upload(service, &paths, recursive || config.upload.recursive).await
        }
        Command::Progress { action } => cmd_progress(service, action, &config).await,
        Command::Read { book_id } => cmd_read(service, book_id, &config).await,
        Command::Books => cmd_books(service).await,
    }
}

/// Write a default config file.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let device_id = uuid::Uuid::new_v4().to_string();
    std::fs::write(&config_path, Config::generate_default(&device_id))?;
    println!("Created config file: {}", config_path.display());
    println!("\nEdit config.toml to point at your server.");
    println!("Then run: shelf-sync upload /path/to/books");

    Ok(())
}

/// Upload files and directories.
async fn cmd_upload(
    service: Arc<dyn BooksService>,
    paths: &[PathBuf],
    recursive: bool,
) -> anyhow::Result<()> {
    let found = library::collect_files(paths, recursive);
    if found.is_empty() {
        println!("No book files found.");
        return Ok(());
    }

    let mut files = Vec::with_capacity(found.len());
    for path in &found {
        match UploadFile::from_path(path).await {
            Ok(file) => files.push(file),
            Err(e) => eprintln!("Cannot read {}: {}", path.display(), e),
        }
    }

    let cache = Arc::new(LibraryCache::new(Arc::clone(&service)));
    let uploader = BatchUploader::new(service, cache);

    if let [file] = files.as_slice() {
        let book = uploader.upload_one(file).await?;
        println!("Uploaded: {} (id: {})", file.name, book.id);
        return Ok(());
    }

    let total = files.len();
    let tasks = uploader
        .upload_many(&files, |tasks, index| {
            let task = &tasks[index];
            match task.status {
                UploadStatus::Uploading => {
                    println!("[{}/{}] Uploading {}", index + 1, total, task.file)
                }
                UploadStatus::Success => println!("[{}/{}] Done", index + 1, total),
                UploadStatus::Skipped | UploadStatus::Failed => println!(
                    "[{}/{}] {:?}: {}",
                    index + 1,
                    total,
                    task.status,
                    task.error.as_deref().unwrap_or_default()
                ),
                UploadStatus::Pending => {}
            }
        })
        .await;

    let summary = UploadSummary::from_tasks(&tasks);
    println!(
        "\nUploaded: {}  Skipped: {}  Failed: {}",
        summary.uploaded, summary.skipped, summary.failed
    );

    if summary.failed > 0 {
        anyhow::bail!("{} of {} uploads failed", summary.failed, total);
    }
    Ok(())
}

/// Progress commands.
async fn cmd_progress(
    service: Arc<dyn BooksService>,
    action: ProgressCommand,
    config: &Config,
) -> anyhow::Result<()> {
    match action {
        ProgressCommand::Show { book_id } => {
            let sync = ProgressSync::open(service, Some(book_id.clone()), &config.sync).await;
            if let Some(error) = sync.error() {
                anyhow::bail!("{}", error);
            }
            match sync.record() {
                Some(record) => {
                    let last_read = record
                        .last_read_at
                        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "never".to_string());
                    println!("{:<12} {}", "BOOK", book_id);
                    println!("{:<12} {}", "PAGE", record.current_page);
                    println!("{:<12} {}", "STATUS", record.status);
                    println!("{:<12} {}", "LAST READ", last_read);
                }
                None => println!("No progress for: {}", book_id),
            }
        }

        ProgressCommand::Set {
            book_id,
            page,
            status,
        } => {
            let status = status
                .map(|s| s.parse::<ReadingStatus>())
                .transpose()
                .map_err(anyhow::Error::msg)?;
            let patch = ProgressPatch {
                current_page: page,
                status,
            };
            if patch.is_empty() {
                anyhow::bail!("Nothing to set: pass --page and/or --status");
            }

            let sync = ProgressSync::new(service, Some(book_id.clone()), &config.sync);
            sync.update(patch, true).await?;
            if let Some(record) = sync.record() {
                println!(
                    "Saved: {} page {} ({})",
                    book_id, record.current_page, record.status
                );
            } else {
                println!("Saved: {}", book_id);
            }
            let _ = sync.close();
        }
    }

    Ok(())
}

/// Follow a reading session from stdin.
async fn cmd_read(
    service: Arc<dyn BooksService>,
    book_id: String,
    config: &Config,
) -> anyhow::Result<()> {
    let sync = ProgressSync::open(service, Some(book_id.clone()), &config.sync).await;
    if let Some(error) = sync.error() {
        eprintln!("{}", error);
    }
    if let Some(record) = sync.record() {
        println!("Resuming {} at page {}", book_id, record.current_page);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!(book_id = %book_id, "Interrupted, flushing progress");
                if let Some(handle) = sync.notify(Lifecycle::Unloading) {
                    let _ = handle.await;
                }
                return Ok(());
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Ok(status) = line.parse::<ReadingStatus>() {
                    if let Err(e) = sync.update(ProgressPatch::status(status), true).await {
                        eprintln!("{}", e);
                    }
                    continue;
                }
                match line.parse::<u32>() {
                    Ok(page) => {
                        let _ = sync.set_current_page(page, false).await;
                    }
                    Err(_) => eprintln!("Not a page number or status: {}", line),
                }
            }
        }
    }

    if let Some(handle) = sync.close() {
        let _ = handle.await;
    }
    Ok(())
}

/// List books on the server.
async fn cmd_books(service: Arc<dyn BooksService>) -> anyhow::Result<()> {
    let cache = LibraryCache::new(service);
    let books = cache.books().await?;

    if books.is_empty() {
        println!("No books found.");
        return Ok(());
    }

    println!("{:<36} {:<40} {:<8} PAGES", "ID", "TITLE", "FORMAT");
    println!("{}", "-".repeat(92));
    for book in books {
        println!(
            "{:<36} {:<40} {:<8} {}",
            book.id,
            book.title,
            book.format.as_deref().unwrap_or("-"),
            book.page_count
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }

    Ok(())
}
