//! Copy-tool transport
//!
//! Delegates every transfer to an external copy command
//! (`<executable> -m cp -n -r <source> <target>`), such as `gsutil`.
//! Nothing is bound: the tool resolves its own credentials on each run.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;

use crate::error::{BackendError, BackendResult, Error, Result};
use crate::events::{EventKind, EventSupport, RequestType, Resource, TransferListener};
use crate::locator::RepositoryLocator;
use crate::transport::{
    CONDITIONAL_GET_UNSUPPORTED, Transport, create_parent_dirs, source_resource,
};

/// Executable used when none is configured
pub const DEFAULT_EXECUTABLE: &str = "gsutil";

const COPY_ARGS: [&str; 4] = ["-m", "cp", "-n", "-r"];

/// External copy command
#[derive(Debug, Clone)]
pub struct CopyTool {
    executable: PathBuf,
}

impl Default for CopyTool {
    fn default() -> Self {
        Self::new(DEFAULT_EXECUTABLE)
    }
}

impl CopyTool {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Arguments passed to the executable for one copy
    pub fn args(source: &str, target: &str) -> Vec<String> {
        COPY_ARGS
            .iter()
            .map(|a| a.to_string())
            .chain([source.to_string(), target.to_string()])
            .collect()
    }

    /// Run one copy, reporting the command and its output as session debug.
    ///
    /// A non-zero exit becomes `BackendError::Command("Exit code N - <stderr>")`.
    pub async fn copy(&self, source: &str, target: &str, events: &EventSupport) -> BackendResult<()> {
        let args = Self::args(source, target);
        events.session_debug(&format!(
            "Executing command: {} {}",
            self.executable.display(),
            args.join(" ")
        ));

        let output = tokio::process::Command::new(&self.executable)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for stream in [stdout.trim_end(), stderr.trim_end()] {
            if !stream.is_empty() {
                events.session_debug(stream);
            }
        }

        if output.status.success() {
            return Ok(());
        }

        let code = output
            .status
            .code()
            .map_or_else(|| "none".to_string(), |c| c.to_string());
        Err(BackendError::Command(format!(
            "Exit code {code} - {}",
            stderr.trim_end()
        )))
    }
}

fn local_arg(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

/// Transport that shells out to a [`CopyTool`]
pub struct CopyToolTransport {
    locator: RepositoryLocator,
    tool: CopyTool,
    events: EventSupport,
}

impl CopyToolTransport {
    pub fn new(locator: RepositoryLocator, tool: CopyTool) -> Self {
        Self {
            locator,
            tool,
            events: EventSupport::default(),
        }
    }

    pub fn tool(&self) -> &CopyTool {
        &self.tool
    }
}

#[async_trait]
impl Transport for CopyToolTransport {
    fn variant(&self) -> &'static str {
        "copy-tool"
    }

    fn locator(&self) -> &RepositoryLocator {
        &self.locator
    }

    fn add_listener(&self, listener: Arc<dyn TransferListener>) {
        self.events.add_listener(listener);
    }

    async fn open(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) {}

    async fn get(&self, name: &str, dest: &Path) -> Result<()> {
        let resource = Resource::new(name);
        self.events
            .fire(EventKind::Initiated, RequestType::Get, &resource, dest);
        if let Err(e) = create_parent_dirs(dest).await {
            self.events
                .fire_error(RequestType::Get, &resource, dest, &e);
            return Err(e);
        }
        self.events
            .fire(EventKind::Started, RequestType::Get, &resource, dest);

        let source = self.locator.resource_url(name);
        match self.tool.copy(&source, &local_arg(dest), &self.events).await {
            Ok(()) => {
                self.events
                    .fire(EventKind::Completed, RequestType::Get, &resource, dest);
            }
            // Reported to listeners only; the caller sees success
            Err(e) => {
                tracing::warn!(source = %source, error = %e, "Copy tool download failed");
                self.events
                    .fire_error(RequestType::Get, &resource, dest, &e);
            }
        }
        Ok(())
    }

    async fn get_if_newer(&self, name: &str, dest: &Path, _since: Timestamp) -> Result<bool> {
        tracing::warn!(
            repository = %self.locator,
            resource = name,
            "Conditional get unsupported, downloading unconditionally"
        );
        self.events.session_debug(CONDITIONAL_GET_UNSUPPORTED);
        self.get(name, dest).await?;
        Ok(true)
    }

    async fn put(&self, source: &Path, name: &str) -> Result<()> {
        let resource = source_resource(source, name).await?;
        self.events
            .fire(EventKind::Initiated, RequestType::Put, &resource, source);
        self.events
            .fire(EventKind::Started, RequestType::Put, &resource, source);

        let target = self.locator.resource_url(name);
        match self.tool.copy(&local_arg(source), &target, &self.events).await {
            Ok(()) => {
                self.events
                    .fire(EventKind::Completed, RequestType::Put, &resource, source);
                Ok(())
            }
            Err(e) => {
                self.events
                    .fire_error(RequestType::Put, &resource, source, &e);
                Err(Error::Transfer {
                    context: format!("{} -> {target}", source.display()),
                    source: Some(e),
                })
            }
        }
    }

    async fn put_directory(&self, source: &Path, name: &str) -> Result<()> {
        if !tokio::fs::try_exists(source).await.unwrap_or(false) {
            return Err(Error::NotFound(source.display().to_string()));
        }

        let target = self.locator.resource_url(name);
        self.tool
            .copy(&local_arg(source), &target, &self.events)
            .await
            .map_err(|e| Error::Transfer {
                context: e.to_string(),
                source: Some(e),
            })
    }

    async fn resource_exists(&self, name: &str) -> Result<bool> {
        Err(Error::Unsupported(format!(
            "copy tool cannot check for {name}"
        )))
    }

    async fn file_list(&self, dir: &str) -> Result<Vec<String>> {
        Err(Error::Unsupported(format!("copy tool cannot list {dir}")))
    }

    fn supports_directory_copy(&self) -> bool {
        true
    }
}
