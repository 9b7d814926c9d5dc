//! wagon-core: Core library for bucket-wagon repository transports
//!
//! This crate provides everything that does not depend on a storage SDK:
//! - Repository locator and object key resolution
//! - Lazy connection lifecycle over a [`Connector`]
//! - Transfer operations with directory emulation
//! - Error taxonomy and translation of backend failures
//! - Transfer events, content-type probing and configuration
//! - The copy-tool transport
//! - An in-memory backend and a recording listener for tests, behind the
//!   `test-util` feature
//!
//! SDK backends implement [`ObjectBackend`] and [`Connector`] in their own
//! crates.

pub mod backend;
pub mod config;
pub mod connection;
pub mod content_type;
pub mod copy_tool;
pub mod error;
pub mod events;
pub mod key;
pub mod listing;
pub mod locator;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod staging;
pub mod transport;

pub use backend::{
    BackendCapabilities, Connector, DEFAULT_CHUNK_SIZE, DirectoryInference, ListedObject,
    ObjectBackend, ObjectMeta,
};
pub use config::{Config, ConfigManager};
pub use connection::{ConnectionManager, ConnectionPhase};
pub use content_type::{ContentTypeDetector, ContentTypeProbe, ExtensionDetector, SignatureDetector};
pub use copy_tool::{CopyTool, CopyToolTransport};
pub use error::{BackendError, BackendResult, Error, Phase, Result, Translate};
pub use events::{EventKind, RequestType, Resource, TransferEvent, TransferListener};
pub use key::ObjectKeyResolver;
pub use locator::{RepositoryDescriptor, RepositoryLocator};
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryConnector;
pub use transport::{ObjectStoreTransport, Transport};
