//! Source descriptors and cache key derivation
//!
//! A descriptor names where the bytes of an animated image come from. Its
//! key is what FrameCache is indexed by, so two descriptors that must share
//! decoded frames have to derive the same key.
//!
//! # Key format
//!
//! `<variant>:<identity>`. The prefix keeps variants apart: an asset named
//! like a URL never collides with that URL.
//!
//! - Network: `net:<url>` (request headers are not part of the identity)
//! - Asset:   `asset:<bundle key>`
//! - File:    `file:<canonical path>`
//! - Memory:  `mem:<blake3 hex of the bytes>`

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Cache key derived from a [`SourceDescriptor`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceKey(String);

impl SourceKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Where the bytes of an animated image come from
#[derive(Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    /// HTTP(S) GET with extra request headers
    Network {
        url: String,
        headers: Vec<(String, String)>,
    },
    /// Named entry of an asset bundle, optionally scoped to a package
    Asset {
        name: String,
        package: Option<String>,
    },
    /// File on local disk
    File { path: PathBuf },
    /// Bytes already in memory
    Memory { bytes: Arc<[u8]> },
}

impl SourceDescriptor {
    pub fn network(url: impl Into<String>) -> Self {
        SourceDescriptor::Network {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn network_with_headers(url: impl Into<String>, headers: Vec<(String, String)>) -> Self {
        SourceDescriptor::Network {
            url: url.into(),
            headers,
        }
    }

    pub fn asset(name: impl Into<String>) -> Self {
        SourceDescriptor::Asset {
            name: name.into(),
            package: None,
        }
    }

    pub fn package_asset(name: impl Into<String>, package: impl Into<String>) -> Self {
        SourceDescriptor::Asset {
            name: name.into(),
            package: Some(package.into()),
        }
    }

    pub fn file(path: impl AsRef<Path>) -> Self {
        SourceDescriptor::File {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn memory(bytes: impl Into<Arc<[u8]>>) -> Self {
        SourceDescriptor::Memory {
            bytes: bytes.into(),
        }
    }

    /// Short variant name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            SourceDescriptor::Network { .. } => "network",
            SourceDescriptor::Asset { .. } => "asset",
            SourceDescriptor::File { .. } => "file",
            SourceDescriptor::Memory { .. } => "memory",
        }
    }

    /// Derive the cache key
    ///
    /// File paths are canonicalized so `./a.gif` and `/abs/a.gif` share an
    /// entry; a path that cannot be canonicalized (missing file) keys on the
    /// path as given.
    pub fn key(&self) -> SourceKey {
        match self {
            SourceDescriptor::Network { url, .. } => SourceKey(format!("net:{}", url)),
            SourceDescriptor::Asset { name, package } => {
                SourceKey(format!("asset:{}", bundle_key(name, package.as_deref())))
            }
            SourceDescriptor::File { path } => {
                let path = dunce::canonicalize(path).unwrap_or_else(|_| path.clone());
                SourceKey(format!("file:{}", path.display()))
            }
            SourceDescriptor::Memory { bytes } => {
                SourceKey(format!("mem:{}", blake3::hash(bytes).to_hex()))
            }
        }
    }
}

/// Resolve an asset name to its key inside the bundle
pub fn bundle_key(name: &str, package: Option<&str>) -> String {
    match package {
        Some(pkg) => format!("packages/{}/{}", pkg, name),
        None => name.to_string(),
    }
}

impl fmt::Debug for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceDescriptor::Network { url, headers } => f
                .debug_struct("Network")
                .field("url", url)
                .field("headers", &headers.len())
                .finish(),
            SourceDescriptor::Asset { name, package } => f
                .debug_struct("Asset")
                .field("name", name)
                .field("package", package)
                .finish(),
            SourceDescriptor::File { path } => f.debug_struct("File").field("path", path).finish(),
            // Bytes can be megabytes, show the size only
            SourceDescriptor::Memory { bytes } => {
                f.debug_struct("Memory").field("len", &bytes.len()).finish()
            }
        }
    }
}
