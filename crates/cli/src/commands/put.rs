//! put command - Upload a local file to a repository

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;

/// Upload a local file to a repository
#[derive(Args, Debug)]
pub struct PutArgs {
    /// Repository URL (s3://bucket/dir, gs://bucket/dir, gsutil:gs://bucket/dir)
    pub repository: String,

    /// Local file to upload
    pub source: PathBuf,

    /// Resource name relative to the repository, e.g. com/acme/acme-1.0.jar
    pub resource: String,
}

#[derive(Debug, Serialize)]
struct PutOutput {
    source: String,
    repository: String,
    resource: String,
    location: String,
    size_bytes: u64,
    size_human: String,
}

/// Execute the put command
pub async fn execute(args: PutArgs, ctx: &Context) -> ExitCode {
    let transport = match ctx.transport(&args.repository) {
        Ok(t) => t,
        Err(code) => return code,
    };
    let progress = ctx.progress();
    transport.add_listener(progress.clone());

    let result = transport.put(&args.source, &args.resource).await;
    progress.finish();
    transport.close().await;

    if let Err(e) = result {
        return ctx.fail(&e);
    }

    let size = tokio::fs::metadata(&args.source)
        .await
        .map(|m| m.len())
        .unwrap_or(0);
    let location = transport.locator().resource_url(&args.resource);

    let formatter = &ctx.formatter;
    if formatter.is_json() {
        formatter.json(&PutOutput {
            source: args.source.display().to_string(),
            repository: args.repository,
            resource: args.resource,
            location,
            size_bytes: size,
            size_human: humansize::format_size(size, humansize::BINARY),
        });
    } else {
        formatter.success(&format!(
            "{} -> {} ({})",
            args.source.display(),
            formatter.style_url(&location),
            formatter.style_size(&humansize::format_size(size, humansize::BINARY))
        ));
    }

    ExitCode::Success
}
