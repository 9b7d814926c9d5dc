//! ls command - List a repository directory
//!
//! Directories come back from the transport with a trailing `/`, whether
//! the backend reported them as common prefixes or they were inferred from
//! deeper keys.

use clap::Args;
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;

/// List the entries of a repository directory
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Repository URL
    pub repository: String,

    /// Directory relative to the repository (default: repository root)
    #[arg(default_value = "")]
    pub dir: String,

    /// Only show entries matching this glob pattern
    #[arg(short = 'P', long)]
    pub pattern: Option<String>,
}

#[derive(Debug, Serialize)]
struct LsEntry {
    name: String,
    is_dir: bool,
}

#[derive(Debug, Serialize)]
struct LsOutput {
    repository: String,
    directory: String,
    entries: Vec<LsEntry>,
    total_count: usize,
}

fn to_entries(names: Vec<String>, pattern: Option<&glob::Pattern>) -> Vec<LsEntry> {
    names
        .into_iter()
        .filter(|name| {
            pattern.is_none_or(|p| p.matches(name.trim_end_matches('/')))
        })
        .map(|name| LsEntry {
            is_dir: name.ends_with('/'),
            name,
        })
        .collect()
}

/// Execute the ls command
pub async fn execute(args: LsArgs, ctx: &Context) -> ExitCode {
    let pattern = match args.pattern.as_deref().map(glob::Pattern::new).transpose() {
        Ok(pattern) => pattern,
        Err(e) => {
            ctx.formatter.error(&format!("Invalid pattern: {e}"));
            return ExitCode::UsageError;
        }
    };

    let transport = match ctx.transport(&args.repository) {
        Ok(t) => t,
        Err(code) => return code,
    };

    let result = transport.file_list(&args.dir).await;
    transport.close().await;

    let names = match result {
        Ok(names) => names,
        Err(e) => return ctx.fail(&e),
    };
    let entries = to_entries(names, pattern.as_ref());

    let formatter = &ctx.formatter;
    if formatter.is_json() {
        formatter.json(&LsOutput {
            repository: args.repository,
            directory: args.dir,
            total_count: entries.len(),
            entries,
        });
        return ExitCode::Success;
    }

    for entry in &entries {
        if entry.is_dir {
            formatter.println(&formatter.style_dir(&entry.name));
        } else {
            formatter.println(&formatter.style_file(&entry.name));
        }
    }
    if entries.is_empty() {
        formatter.warning(&format!("No entries under '{}'", args.dir));
    }

    ExitCode::Success
}
