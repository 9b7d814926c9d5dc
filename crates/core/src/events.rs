//! Transfer progress events
//!
//! Purely observational: listeners see what a transport is doing, but no
//! transport behaviour depends on them.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use jiff::Timestamp;
use serde::Serialize;

/// Direction of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Get,
    Put,
}

/// Stage of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Initiated,
    Started,
    Completed,
    Error,
}

/// The repository resource being transferred
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,
}

impl Resource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content_length: None,
            last_modified: None,
        }
    }
}

/// One transfer notification
#[derive(Debug, Clone, Serialize)]
pub struct TransferEvent {
    pub kind: EventKind,
    pub request: RequestType,
    pub resource: Resource,
    pub local_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Receiver of transfer notifications
pub trait TransferListener: Send + Sync {
    fn transfer_event(&self, event: &TransferEvent);

    /// Free-form diagnostic from the transport session
    fn session_debug(&self, _message: &str) {}
}

/// Fan-out of events to registered listeners
#[derive(Default)]
pub struct EventSupport {
    listeners: RwLock<Vec<Arc<dyn TransferListener>>>,
}

impl EventSupport {
    pub fn add_listener(&self, listener: Arc<dyn TransferListener>) {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.push(listener);
        }
    }

    pub fn fire(
        &self,
        kind: EventKind,
        request: RequestType,
        resource: &Resource,
        local_path: &Path,
    ) {
        self.dispatch(TransferEvent {
            kind,
            request,
            resource: resource.clone(),
            local_path: local_path.to_path_buf(),
            error: None,
        });
    }

    pub fn fire_error(
        &self,
        request: RequestType,
        resource: &Resource,
        local_path: &Path,
        error: &dyn std::error::Error,
    ) {
        self.dispatch(TransferEvent {
            kind: EventKind::Error,
            request,
            resource: resource.clone(),
            local_path: local_path.to_path_buf(),
            error: Some(error.to_string()),
        });
    }

    pub fn session_debug(&self, message: &str) {
        tracing::debug!("{message}");
        if let Ok(listeners) = self.listeners.read() {
            for listener in listeners.iter() {
                listener.session_debug(message);
            }
        }
    }

    fn dispatch(&self, event: TransferEvent) {
        if let Ok(listeners) = self.listeners.read() {
            for listener in listeners.iter() {
                listener.transfer_event(&event);
            }
        }
    }
}

/// Listener that records everything it sees
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: std::sync::Mutex<Vec<TransferEvent>>,
    debug: std::sync::Mutex<Vec<String>>,
}

#[cfg(any(test, feature = "test-util"))]
impl RecordingListener {
    pub fn events(&self) -> Vec<TransferEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Event kinds in order of arrival
    pub fn kinds(&self) -> Vec<(RequestType, EventKind)> {
        self.events()
            .iter()
            .map(|e| (e.request, e.kind))
            .collect()
    }

    pub fn debug_messages(&self) -> Vec<String> {
        self.debug.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[cfg(any(test, feature = "test-util"))]
impl TransferListener for RecordingListener {
    fn transfer_event(&self, event: &TransferEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }

    fn session_debug(&self, message: &str) {
        if let Ok(mut debug) = self.debug.lock() {
            debug.push(message.to_string());
        }
    }
}
