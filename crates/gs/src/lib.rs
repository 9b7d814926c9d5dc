//! wagon-gs: Google Cloud Storage backend for bucket-wagon
//!
//! Implements the [`wagon_core::Connector`] and [`wagon_core::ObjectBackend`]
//! seams on top of `google-cloud-storage`, using application default
//! credentials unless anonymous access is configured.

mod client;

pub use client::{GsBucket, GsConnector};
