//! Content-type probing
//!
//! A [`ContentTypeProbe`] asks an ordered list of detectors for the MIME type
//! of a local file and returns the first answer. The list is supplied by the
//! caller; this crate only ships a few detectors to choose from.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

/// A single content-type detector
pub trait ContentTypeDetector: Send + Sync {
    /// Name used in diagnostics
    fn name(&self) -> &str;

    /// Detect the MIME type of `path`, `Ok(None)` if this detector has no opinion
    fn probe(&self, path: &Path) -> io::Result<Option<String>>;
}

/// Ordered chain of detectors
#[derive(Clone, Default)]
pub struct ContentTypeProbe {
    detectors: Vec<Arc<dyn ContentTypeDetector>>,
}

impl ContentTypeProbe {
    pub fn new(detectors: Vec<Arc<dyn ContentTypeDetector>>) -> Self {
        Self { detectors }
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// First content type reported by the chain.
    ///
    /// A detector failing with an I/O error counts as no answer.
    pub fn probe(&self, path: &Path) -> Option<String> {
        for detector in &self.detectors {
            match detector.probe(path) {
                Ok(Some(content_type)) => return Some(content_type),
                Ok(None) => continue,
                Err(e) => {
                    tracing::debug!(
                        detector = detector.name(),
                        path = %path.display(),
                        error = %e,
                        "Content type detector failed, skipping"
                    );
                }
            }
        }
        None
    }
}

impl fmt::Debug for ContentTypeProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.detectors.iter().map(|d| d.name()))
            .finish()
    }
}

/// Detects by file extension using the `mime_guess` database
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionDetector;

impl ContentTypeDetector for ExtensionDetector {
    fn name(&self) -> &str {
        "extension"
    }

    fn probe(&self, path: &Path) -> io::Result<Option<String>> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        // Repository artifacts mime_guess does not know or gets wrong
        let known = match ext.as_deref() {
            Some("pom") => Some("application/xml"),
            Some("jar") | Some("war") | Some("ear") => Some("application/java-archive"),
            Some("sha1") | Some("sha256") | Some("sha512") | Some("md5") => Some("text/plain"),
            Some("asc") => Some("application/pgp-signature"),
            _ => None,
        };
        if let Some(ct) = known {
            return Ok(Some(ct.to_string()));
        }

        Ok(mime_guess::from_path(path)
            .first()
            .map(|mime| mime.essence_str().to_string()))
    }
}

/// Detects from the leading bytes of the file
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureDetector;

const SIGNATURES: &[(&[u8], &str)] = &[
    (b"PK\x03\x04", "application/zip"),
    (b"\x1f\x8b", "application/gzip"),
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"%PDF-", "application/pdf"),
    (b"<?xml", "application/xml"),
];

impl ContentTypeDetector for SignatureDetector {
    fn name(&self) -> &str {
        "signature"
    }

    fn probe(&self, path: &Path) -> io::Result<Option<String>> {
        let mut header = [0u8; 8];
        let mut file = File::open(path)?;
        let mut filled = 0;
        while filled < header.len() {
            let n = file.read(&mut header[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        let header = &header[..filled];

        Ok(SIGNATURES
            .iter()
            .find(|(magic, _)| header.starts_with(magic))
            .map(|(_, ct)| (*ct).to_string()))
    }
}
