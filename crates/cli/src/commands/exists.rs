//! exists command - Check for a resource
//!
//! Exits with the not-found status when the resource is absent, so the
//! command can be used directly in shell conditionals.

use clap::Args;
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;

/// Check whether a resource exists
#[derive(Args, Debug)]
pub struct ExistsArgs {
    /// Repository URL
    pub repository: String,

    /// Resource name relative to the repository
    pub resource: String,
}

#[derive(Debug, Serialize)]
struct ExistsOutput {
    repository: String,
    resource: String,
    exists: bool,
}

/// Execute the exists command
pub async fn execute(args: ExistsArgs, ctx: &Context) -> ExitCode {
    let transport = match ctx.transport(&args.repository) {
        Ok(t) => t,
        Err(code) => return code,
    };

    let result = transport.resource_exists(&args.resource).await;
    transport.close().await;

    let exists = match result {
        Ok(exists) => exists,
        Err(e) => return ctx.fail(&e),
    };

    let formatter = &ctx.formatter;
    if formatter.is_json() {
        formatter.json(&ExistsOutput {
            repository: args.repository,
            resource: args.resource.clone(),
            exists,
        });
    } else if exists {
        formatter.println(&format!("{} exists", formatter.style_file(&args.resource)));
    } else {
        formatter.println(&format!(
            "{} does not exist",
            formatter.style_file(&args.resource)
        ));
    }

    if exists {
        ExitCode::Success
    } else {
        ExitCode::NotFound
    }
}
