//! wagon-s3: S3 backend for bucket-wagon
//!
//! Implements the [`wagon_core::Connector`] and [`wagon_core::ObjectBackend`]
//! seams on top of `aws-sdk-s3`. Credentials and region come from the AWS
//! default provider chains unless the configuration overrides them.

mod client;

pub use client::{S3Bucket, S3Connector};
