//! get command - Download a resource from a repository
//!
//! With `--if-newer-than` the download only happens when the remote copy
//! changed after the given instant.

use std::path::PathBuf;

use clap::Args;
use jiff::Timestamp;
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;

/// Download a resource from a repository
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Repository URL (s3://bucket/dir, gs://bucket/dir, gsutil:gs://bucket/dir)
    pub repository: String,

    /// Resource name relative to the repository, e.g. com/acme/acme-1.0.jar
    pub resource: String,

    /// Local destination file
    pub dest: PathBuf,

    /// Only download if the resource changed after this instant (RFC 3339)
    #[arg(long, value_name = "TIMESTAMP")]
    pub if_newer_than: Option<Timestamp>,
}

#[derive(Debug, Serialize)]
struct GetOutput {
    repository: String,
    resource: String,
    dest: String,
    downloaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_human: Option<String>,
}

/// Execute the get command
pub async fn execute(args: GetArgs, ctx: &Context) -> ExitCode {
    let transport = match ctx.transport(&args.repository) {
        Ok(t) => t,
        Err(code) => return code,
    };
    let progress = ctx.progress();
    transport.add_listener(progress.clone());

    let result = match args.if_newer_than {
        Some(since) => transport.get_if_newer(&args.resource, &args.dest, since).await,
        None => transport
            .get(&args.resource, &args.dest)
            .await
            .map(|()| true),
    };
    progress.finish();
    transport.close().await;

    let downloaded = match result {
        Ok(downloaded) => downloaded,
        Err(e) => return ctx.fail(&e),
    };

    // The copy tool reports a failed get as an event, so the file may be absent
    let size = if downloaded {
        tokio::fs::metadata(&args.dest).await.ok().map(|m| m.len())
    } else {
        None
    };

    let formatter = &ctx.formatter;
    if formatter.is_json() {
        formatter.json(&GetOutput {
            repository: args.repository,
            resource: args.resource,
            dest: args.dest.display().to_string(),
            downloaded,
            size_bytes: size,
            size_human: size.map(|s| humansize::format_size(s, humansize::BINARY)),
        });
    } else if !downloaded {
        formatter.println(&format!(
            "{} is up to date",
            formatter.style_file(&args.resource)
        ));
    } else {
        let size = size
            .map(|s| format!(" ({})", humansize::format_size(s, humansize::BINARY)))
            .unwrap_or_default();
        formatter.success(&format!(
            "{} -> {}{}",
            formatter.style_file(&args.resource),
            args.dest.display(),
            formatter.style_size(&size)
        ));
    }

    ExitCode::Success
}
