//! Human-readable and JSON rendering for command results
//!
//! Results go to stdout; errors, warnings and progress go to stderr so that
//! `--json` output stays machine-readable.

use console::Style;
use serde::Serialize;
use serde_json::json;

use super::OutputConfig;

/// Styles for the parts of repository output
#[derive(Debug, Clone)]
struct Palette {
    dir: Style,
    resource: Style,
    size: Style,
    label: Style,
    url: Style,
    bucket: Style,
    ok: Style,
    failed: Style,
    caution: Style,
}

impl Palette {
    fn colored() -> Self {
        Self {
            dir: Style::new().blue().bold(),
            resource: Style::new(),
            size: Style::new().green(),
            label: Style::new().cyan(),
            url: Style::new().cyan().underlined(),
            bucket: Style::new().bold(),
            ok: Style::new().green(),
            failed: Style::new().red(),
            caution: Style::new().yellow(),
        }
    }

    fn plain() -> Self {
        let none = Style::new();
        Self {
            dir: none.clone(),
            resource: none.clone(),
            size: none.clone(),
            label: none.clone(),
            url: none.clone(),
            bucket: none.clone(),
            ok: none.clone(),
            failed: none.clone(),
            caution: none,
        }
    }
}

fn paint(style: &Style, text: &str) -> String {
    style.apply_to(text).to_string()
}

/// JSON body written to stderr for a failed command
fn error_document(message: &str, kind: Option<&str>) -> serde_json::Value {
    match kind {
        Some(kind) => json!({ "error": message, "kind": kind }),
        None => json!({ "error": message }),
    }
}

/// Output sink shared by every command
#[derive(Debug, Clone)]
pub struct Formatter {
    config: OutputConfig,
    palette: Palette,
}

impl Formatter {
    pub fn new(config: OutputConfig) -> Self {
        let palette = if config.no_color || config.json {
            Palette::plain()
        } else {
            Palette::colored()
        };
        Self { config, palette }
    }

    pub fn is_json(&self) -> bool {
        self.config.json
    }

    pub fn is_quiet(&self) -> bool {
        self.config.quiet
    }

    /// Directory entry in a listing
    pub fn style_dir(&self, text: &str) -> String {
        paint(&self.palette.dir, text)
    }

    /// Resource name
    pub fn style_file(&self, text: &str) -> String {
        paint(&self.palette.resource, text)
    }

    pub fn style_size(&self, text: &str) -> String {
        paint(&self.palette.size, text)
    }

    /// Row label in `info`
    pub fn style_key(&self, text: &str) -> String {
        paint(&self.palette.label, text)
    }

    pub fn style_url(&self, text: &str) -> String {
        paint(&self.palette.url, text)
    }

    /// Bucket name
    pub fn style_name(&self, text: &str) -> String {
        paint(&self.palette.bucket, text)
    }

    /// Completed transfer. Silent in JSON mode, where the document and the
    /// exit status carry the result.
    pub fn success(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }
        println!("{} {message}", paint(&self.palette.ok, "✓"));
    }

    /// Print an error. Never suppressed by `--quiet`.
    pub fn error(&self, message: &str) {
        self.error_with_kind(message, None);
    }

    /// Print an error tagged with its kind (`not_found`, `auth`, ...)
    pub fn error_with_kind(&self, message: &str, kind: Option<&str>) {
        if self.config.json {
            let document = error_document(message, kind);
            match serde_json::to_string_pretty(&document) {
                Ok(text) => eprintln!("{text}"),
                Err(_) => eprintln!("{message}"),
            }
        } else {
            eprintln!("{} {message}", paint(&self.palette.failed, "✗"));
        }
    }

    pub fn warning(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }
        eprintln!("{} {message}", paint(&self.palette.caution, "⚠"));
    }

    /// Write a command's JSON document to stdout
    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{text}"),
            Err(e) => self.error(&format!("Failed to serialize output: {e}")),
        }
    }

    /// Print a line of human output unless `--quiet`
    pub fn println(&self, message: &str) {
        if !self.config.quiet {
            println!("{message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatter(json: bool, no_color: bool) -> Formatter {
        Formatter::new(OutputConfig {
            json,
            no_color,
            quiet: false,
        })
    }

    #[test]
    fn test_json_mode_renders_unstyled() {
        let f = formatter(true, false);
        assert!(f.is_json());
        assert_eq!(f.style_dir("com/"), "com/");
        assert_eq!(f.style_url("s3://bucket/repo"), "s3://bucket/repo");
    }

    #[test]
    fn test_no_color_renders_unstyled() {
        let f = formatter(false, true);
        assert!(!f.is_json());
        assert_eq!(f.style_name("bucket"), "bucket");
        assert_eq!(f.style_size("2 KiB"), "2 KiB");
    }

    #[test]
    fn test_error_document_shape() {
        assert_eq!(
            error_document("Resource does not exist: repo/a.jar", Some("not_found")),
            json!({ "error": "Resource does not exist: repo/a.jar", "kind": "not_found" })
        );
        assert_eq!(error_document("bad", None), json!({ "error": "bad" }));
    }
}
