//! Output formatting
//!
//! Human-readable output uses the console theme; `--json` switches every
//! command to strict JSON on stdout.

mod formatter;

pub use formatter::Formatter;

/// Output settings from the global flags
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    pub json: bool,
    pub no_color: bool,
    pub quiet: bool,
}
