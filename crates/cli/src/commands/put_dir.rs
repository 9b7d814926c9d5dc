//! put-dir command - Upload a directory tree in one copy

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;

/// Upload a local directory tree under a repository directory
#[derive(Args, Debug)]
pub struct PutDirArgs {
    /// Repository URL; only gsutil: repositories copy directories
    pub repository: String,

    /// Local directory to upload
    pub source: PathBuf,

    /// Destination directory relative to the repository
    #[arg(default_value = "")]
    pub dir: String,
}

#[derive(Debug, Serialize)]
struct PutDirOutput {
    source: String,
    repository: String,
    location: String,
}

/// Execute the put-dir command
pub async fn execute(args: PutDirArgs, ctx: &Context) -> ExitCode {
    let transport = match ctx.transport(&args.repository) {
        Ok(t) => t,
        Err(code) => return code,
    };

    if !transport.supports_directory_copy() {
        ctx.formatter.warning(&format!(
            "The {} transport does not copy directories",
            transport.variant()
        ));
    }

    let progress = ctx.progress();
    transport.add_listener(progress.clone());

    let result = transport.put_directory(&args.source, &args.dir).await;
    progress.finish();
    transport.close().await;

    if let Err(e) = result {
        return ctx.fail(&e);
    }

    let location = transport.locator().resource_url(&args.dir);
    let formatter = &ctx.formatter;
    if formatter.is_json() {
        formatter.json(&PutDirOutput {
            source: args.source.display().to_string(),
            repository: args.repository,
            location,
        });
    } else {
        formatter.success(&format!(
            "{} -> {}",
            args.source.display(),
            formatter.style_url(&location)
        ));
    }

    ExitCode::Success
}
