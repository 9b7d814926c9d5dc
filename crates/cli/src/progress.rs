//! Progress display driven by transfer events

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use wagon_core::{EventKind, RequestType, TransferEvent, TransferListener};

/// Spinner that follows one transfer at a time
pub struct ProgressListener {
    bar: ProgressBar,
}

impl ProgressListener {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{elapsed}]")
                .expect("Valid template"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// Listener that draws nothing, for `--json` and `--quiet`
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressListener {
    fn default() -> Self {
        Self::new()
    }
}

fn describe(event: &TransferEvent) -> String {
    let verb = match event.request {
        RequestType::Get => "Downloading",
        RequestType::Put => "Uploading",
    };
    match event.resource.content_length {
        Some(len) => format!(
            "{verb} {} ({})",
            event.resource.name,
            humansize::format_size(len, humansize::BINARY)
        ),
        None => format!("{verb} {}", event.resource.name),
    }
}

impl TransferListener for ProgressListener {
    fn transfer_event(&self, event: &TransferEvent) {
        match event.kind {
            EventKind::Initiated | EventKind::Started => self.bar.set_message(describe(event)),
            EventKind::Completed => self.bar.set_message(format!("Finished {}", event.resource.name)),
            EventKind::Error => {
                let error = event.error.as_deref().unwrap_or("unknown error");
                tracing::warn!(resource = %event.resource.name, error, "Transfer failed");
            }
        }
    }

    fn session_debug(&self, message: &str) {
        tracing::debug!(target: "wagon::session", "{message}");
    }
}
