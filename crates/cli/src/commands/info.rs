//! info command - Show how a repository URL resolves
//!
//! Purely local: parses the URL and builds the transport without
//! contacting the backend.

use clap::Args;
use comfy_table::{ContentArrangement, Table, presets::UTF8_BORDERS_ONLY};
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;

/// Show how a repository URL resolves
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Repository URL
    pub repository: String,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    repository: String,
    scheme: String,
    variant: String,
    bucket: String,
    base_dir: String,
    key_prefix: String,
    supports_directory_copy: bool,
}

impl InfoOutput {
    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Repository", self.repository.clone()),
            ("Scheme", self.scheme.clone()),
            ("Transport", self.variant.clone()),
            ("Bucket", self.bucket.clone()),
            ("Base dir", self.base_dir.clone()),
            ("Key prefix", self.key_prefix.clone()),
            (
                "Directory copy",
                if self.supports_directory_copy { "yes" } else { "no" }.to_string(),
            ),
        ]
    }
}

/// Execute the info command
pub async fn execute(args: InfoArgs, ctx: &Context) -> ExitCode {
    let transport = match ctx.transport(&args.repository) {
        Ok(t) => t,
        Err(code) => return code,
    };

    let locator = transport.locator();
    let info = InfoOutput {
        repository: locator.raw().to_string(),
        scheme: locator.scheme().to_string(),
        variant: transport.variant().to_string(),
        bucket: locator.host().to_string(),
        base_dir: locator.basedir().to_string(),
        key_prefix: locator.prefix().to_string(),
        supports_directory_copy: transport.supports_directory_copy(),
    };

    let formatter = &ctx.formatter;
    if formatter.is_json() {
        formatter.json(&info);
        return ExitCode::Success;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .set_content_arrangement(ContentArrangement::Dynamic);
    for (key, value) in info.rows() {
        let value = match key {
            "Bucket" => formatter.style_name(&value),
            "Repository" => formatter.style_url(&value),
            _ => value,
        };
        table.add_row(vec![formatter.style_key(key), value]);
    }
    formatter.println(&table.to_string());

    ExitCode::Success
}
