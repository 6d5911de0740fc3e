//! Load errors: fetching bytes and decoding them
//!
//! Errors carry their reason as text so a failed load can be stored in the
//! selector state, cloned to hooks and compared in tests.

use std::fmt;
use std::path::PathBuf;

/// Failure resolving a source to bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Transport failure (DNS, TLS, connection reset, ...)
    Network(String),
    /// Server answered with a non-success status
    Status { url: String, status: u16, text: String },
    /// Body exceeded the configured limit
    TooLarge { url: String, limit: usize },
    /// Asset missing from the bundle or key rejected
    Asset { key: String, reason: String },
    /// File could not be read
    Io { path: PathBuf, reason: String },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Network(e) => write!(f, "Network error: {}", e),
            FetchError::Status { url, status, text } => {
                write!(f, "HTTP {} {} for {}", status, text, url)
            }
            FetchError::TooLarge { url, limit } => {
                write!(f, "Response body for {} exceeds {} bytes", url, limit)
            }
            FetchError::Asset { key, reason } => write!(f, "Asset '{}': {}", key, reason),
            FetchError::Io { path, reason } => write!(f, "Failed to read {}: {}", path.display(), reason),
        }
    }
}

impl std::error::Error for FetchError {}

/// Failure turning bytes into frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    Image(String),
    UnsupportedFormat(String),
    /// Decoder finished without producing a frame
    NoFrames,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Image(e) => write!(f, "Image error: {}", e),
            DecodeError::UnsupportedFormat(e) => write!(f, "Unsupported format: {}", e),
            DecodeError::NoFrames => write!(f, "Image contains no frames"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<image::ImageError> for DecodeError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::Unsupported(u) => DecodeError::UnsupportedFormat(u.to_string()),
            other => DecodeError::Image(other.to_string()),
        }
    }
}

/// Any failure of the fetch-and-decode unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    Fetch(FetchError),
    Decode(DecodeError),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Fetch(e) => write!(f, "Fetch failed: {}", e),
            LoadError::Decode(e) => write!(f, "Decode failed: {}", e),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Fetch(e) => Some(e),
            LoadError::Decode(e) => Some(e),
        }
    }
}

impl From<FetchError> for LoadError {
    fn from(e: FetchError) -> Self {
        LoadError::Fetch(e)
    }
}

impl From<DecodeError> for LoadError {
    fn from(e: DecodeError) -> Self {
        LoadError::Decode(e)
    }
}
