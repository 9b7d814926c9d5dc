//! Transport registry
//!
//! Maps the scheme of a repository URL onto a transport variant and hands
//! the SDK-backed variants their content-type detectors.

use std::sync::Arc;

use wagon_core::{
    Config, ContentTypeDetector, ContentTypeProbe, CopyTool, CopyToolTransport, Error,
    ExtensionDetector, ObjectStoreTransport, RepositoryLocator, Result, SignatureDetector,
    Transport,
};
use wagon_gs::GsConnector;
use wagon_s3::S3Connector;

/// Registered schemes and what serves them
pub const SCHEMES: &[(&str, &str)] = &[
    ("s3", "Amazon S3 and compatible services"),
    ("gs", "Google Cloud Storage"),
    ("gsutil", "gsutil copy tool, e.g. gsutil:gs://bucket/repo"),
];

/// Content-type detectors in the order they are consulted
pub fn detectors() -> ContentTypeProbe {
    let detectors: Vec<Arc<dyn ContentTypeDetector>> =
        vec![Arc::new(ExtensionDetector), Arc::new(SignatureDetector)];
    ContentTypeProbe::new(detectors)
}

/// Build the transport for a repository URL. Nothing is contacted until the
/// first operation.
pub fn transport(repository: &str, config: &Config) -> Result<Box<dyn Transport>> {
    let locator = RepositoryLocator::parse(repository)?;
    let chunk_size = config.transfer.chunk_size;

    let transport: Box<dyn Transport> = match locator.scheme() {
        "s3" => {
            let connector = S3Connector::new(config.s3.clone()).with_chunk_size(chunk_size);
            Box::new(ObjectStoreTransport::new(connector, locator).with_probe(detectors()))
        }
        "gs" => {
            let connector = GsConnector::new(config.gs.clone()).with_chunk_size(chunk_size);
            Box::new(ObjectStoreTransport::new(connector, locator).with_probe(detectors()))
        }
        "gsutil" => {
            let tool = CopyTool::new(&config.copy_tool.executable);
            Box::new(CopyToolTransport::new(locator, tool))
        }
        other => {
            let known: Vec<&str> = SCHEMES.iter().map(|(scheme, _)| *scheme).collect();
            return Err(Error::Config(format!(
                "No transport for scheme '{other}' (expected one of: {})",
                known.join(", ")
            )));
        }
    };

    tracing::debug!(
        repository,
        variant = transport.variant(),
        "Created transport"
    );
    Ok(transport)
}
