//! The content-hydration seam.
//!
//! A fenced block whose attributes name a `src` gets its inline content
//! replaced by the fetched payload at compile time. The compiler only ever
//! talks to the [`Fetcher`] trait; the filesystem implementation ships here,
//! and an HTTP(S) implementation is available behind the `remote-content`
//! feature. Fetch failures are always recoverable: the compiler logs them
//! and keeps the inline content.

use std::path::Path;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

/// Fetched bytes, decoded or not depending on the `binary` flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchPayload {
    Text(String),
    Binary(Vec<u8>),
}

impl FetchPayload {
    /// Text view of the payload; binary payloads are decoded lossily.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            FetchPayload::Text(s) => s,
            FetchPayload::Binary(b) => String::from_utf8_lossy(&b).into_owned(),
        }
    }
}

/// Why a fetch failed.
#[derive(Debug, Error, Diagnostic)]
pub enum FetchError {
    #[error("failed to read '{source_path}'")]
    #[diagnostic(code(botmark::fetch::io))]
    Io {
        source_path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("fetching '{source_path}' exceeded {timeout:?}")]
    #[diagnostic(code(botmark::fetch::timeout))]
    Timeout {
        source_path: String,
        timeout: Duration,
    },

    #[error("this fetcher does not handle '{source_path}'")]
    #[diagnostic(
        code(botmark::fetch::unsupported),
        help("remote URLs need a fetcher built with the `remote-content` feature")
    )]
    Unsupported { source_path: String },

    #[error("HTTP request for '{source_path}' failed: {message}")]
    #[diagnostic(code(botmark::fetch::http))]
    Http {
        source_path: String,
        message: String,
    },
}

/// Resolves a local path or URL to its content within a time budget.
pub trait Fetcher: Send + Sync {
    fn fetch(
        &self,
        source_path: &str,
        timeout: Duration,
        binary: bool,
    ) -> Result<FetchPayload, FetchError>;
}

fn is_remote(source_path: &str) -> bool {
    source_path.starts_with("http://") || source_path.starts_with("https://")
}

/// Local-filesystem fetcher. Remote URLs are rejected as unsupported.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsFetcher;

impl Fetcher for FsFetcher {
    fn fetch(
        &self,
        source_path: &str,
        _timeout: Duration,
        binary: bool,
    ) -> Result<FetchPayload, FetchError> {
        if is_remote(source_path) {
            return Err(FetchError::Unsupported {
                source_path: source_path.to_string(),
            });
        }
        let path = Path::new(source_path);
        if binary {
            std::fs::read(path)
                .map(FetchPayload::Binary)
                .map_err(|source| FetchError::Io {
                    source_path: source_path.to_string(),
                    source,
                })
        } else {
            std::fs::read_to_string(path)
                .map(FetchPayload::Text)
                .map_err(|source| FetchError::Io {
                    source_path: source_path.to_string(),
                    source,
                })
        }
    }
}

/// HTTP(S) fetcher with filesystem fallback for local paths.
///
/// Uses a blocking client because compilation is synchronous; do not call
/// from inside an async runtime thread.
#[cfg(feature = "remote-content")]
#[derive(Clone, Debug, Default)]
pub struct HttpFetcher;

#[cfg(feature = "remote-content")]
impl Fetcher for HttpFetcher {
    fn fetch(
        &self,
        source_path: &str,
        timeout: Duration,
        binary: bool,
    ) -> Result<FetchPayload, FetchError> {
        if !is_remote(source_path) {
            return FsFetcher.fetch(source_path, timeout, binary);
        }
        let http_error = |message: String| FetchError::Http {
            source_path: source_path.to_string(),
            message,
        };
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| http_error(e.to_string()))?;
        let response = client
            .get(source_path)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout {
                        source_path: source_path.to_string(),
                        timeout,
                    }
                } else {
                    http_error(e.to_string())
                }
            })?;
        if binary {
            response
                .bytes()
                .map(|b| FetchPayload::Binary(b.to_vec()))
                .map_err(|e| http_error(e.to_string()))
        } else {
            response
                .text()
                .map(FetchPayload::Text)
                .map_err(|e| http_error(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn fs_fetcher_reads_text() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "hello from disk").expect("write");

        let payload = FsFetcher
            .fetch(
                file.path().to_str().expect("utf-8 path"),
                Duration::from_secs(1),
                false,
            )
            .expect("fetch");
        assert_eq!(payload.into_text(), "hello from disk");
    }

    #[test]
    fn fs_fetcher_missing_file_errors() {
        let err = FsFetcher
            .fetch("/definitely/not/here.txt", Duration::from_secs(1), false)
            .unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
    }

    #[test]
    fn fs_fetcher_rejects_remote() {
        let err = FsFetcher
            .fetch("https://example.com/x", Duration::from_secs(1), false)
            .unwrap_err();
        assert!(matches!(err, FetchError::Unsupported { .. }));
    }
}
