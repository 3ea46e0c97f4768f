use std::path::{Path, PathBuf};

use anyhow::Context;
use bytes::Bytes;
use clap::{Args, Subcommand};

use bodylog_client::{BodyLog, RemoveOutcome, UploadFile};
use bodylog_core::Session;

use crate::OutputFormat;
use crate::commands::confirmation;

#[derive(Args, Debug)]
pub struct PhotosArgs {
    #[command(subcommand)]
    pub command: PhotosCommand,
}

#[derive(Subcommand, Debug)]
pub enum PhotosCommand {
    /// Show the prescription document and signed links to its photos.
    Show,
    /// Upload photos into the document.
    Upload {
        /// Files to upload.
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Document title to save with the upload.
        #[arg(long)]
        title: Option<String>,
        /// Content type for every file, instead of guessing from the extension.
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Remove one photo by its storage path.
    Remove {
        /// Storage path as shown by `photos show`.
        path: String,
    },
}

/// Content type from a file extension; unknown extensions are sent as
/// opaque bytes.
fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

fn read_files(paths: &[PathBuf], content_type: Option<&str>) -> anyhow::Result<Vec<UploadFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let data =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = content_type.unwrap_or_else(|| content_type_for(path));
        files.push(UploadFile::new(name, content_type, Bytes::from(data)));
    }
    Ok(files)
}

async fn print_document(app: &BodyLog, format: &OutputFormat) -> anyhow::Result<()> {
    let Some(doc) = app.photos().document().await else {
        println!("No document loaded.");
        return Ok(());
    };
    let urls = app.photos().urls().await;
    match format {
        OutputFormat::Json => {
            let body = serde_json::json!({ "document": doc, "urls": urls });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Text => {
            println!(
                "{} ({} photo(s))",
                doc.title.as_deref().unwrap_or("(untitled)"),
                doc.file_paths.len()
            );
            for path in &doc.file_paths {
                match urls.get(path) {
                    Some(url) => println!("  {path}\n    {url}"),
                    None => println!("  {path}\n    (no link available)"),
                }
            }
        }
    }
    Ok(())
}

pub async fn run(
    app: &BodyLog,
    session: &Session,
    args: &PhotosArgs,
    format: &OutputFormat,
    assume_yes: bool,
) -> anyhow::Result<()> {
    app.photos().load(session).await?;

    match &args.command {
        PhotosCommand::Show => print_document(app, format).await?,
        PhotosCommand::Upload {
            files,
            title,
            content_type,
        } => {
            if let Some(title) = title {
                app.photos().set_title(title.clone()).await;
            }
            let files = read_files(files, content_type.as_deref())?;
            let report = app.photos().upload(session, files).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Text => {
                    println!("{}", report.summary());
                    for failure in &report.failed {
                        println!("  {}: {}", failure.name, failure.error);
                    }
                }
            }
            if !report.is_complete() {
                anyhow::bail!("{} file(s) failed to upload", report.failed.len());
            }
        }
        PhotosCommand::Remove { path } => {
            let gate = confirmation(assume_yes);
            match app.photos().remove_file(session, path, gate.as_ref()).await? {
                RemoveOutcome::Removed => println!("Removed {path}."),
                RemoveOutcome::Declined => println!("Cancelled."),
            }
        }
    }
    Ok(())
}
