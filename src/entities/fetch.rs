//! Byte fetch strategies, one per source variant
//!
//! - Network: blocking HTTP GET (`ehttp`) with default + caller headers
//! - Asset:   lookup in an [`AssetBundle`] by resolved bundle key
//! - File:    full read from disk
//! - Memory:  passthrough
//!
//! Fetchers run on worker threads, so every strategy is allowed to block.

use log::{debug, trace};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use super::errors::FetchError;
use super::source::{SourceDescriptor, bundle_key};
use super::traits::{AssetBundle, ByteFetcher};

/// Default body limit for network sources (20 MiB), checked after download
pub const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Fetcher dispatching on the descriptor variant
pub struct DefaultFetcher {
    bundle: Arc<dyn AssetBundle>,
    default_headers: Vec<(String, String)>,
    max_body_bytes: usize,
}

impl DefaultFetcher {
    pub fn new(bundle: Arc<dyn AssetBundle>) -> Self {
        Self {
            bundle,
            default_headers: Vec::new(),
            max_body_bytes: MAX_BODY_BYTES,
        }
    }

    /// Headers sent with every network request, before the caller's own
    pub fn with_default_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.default_headers = headers;
        self
    }

    /// Reject network bodies larger than `limit` bytes
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Blocking GET.
    ///
    /// `ehttp::fetch_blocking` buffers the whole body, so the size limit is
    /// enforced once the response is in memory: a declared `Content-Length`
    /// over the limit and an actual body over the limit are both rejected,
    /// but neither stops the transfer itself.
    fn fetch_network(&self, url: &str, headers: &[(String, String)]) -> Result<Vec<u8>, FetchError> {
        let headers = merge_headers(&self.default_headers, headers);
        let mut request = ehttp::Request::get(url);
        for (name, value) in &headers {
            request.headers.insert(name, value);
        }

        debug!("GET {} ({} headers)", url, headers.len());
        let response = ehttp::fetch_blocking(&request).map_err(FetchError::Network)?;

        if !response.ok {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status,
                text: response.status_text,
            });
        }

        let declared = response
            .headers
            .get("content-length")
            .and_then(|len| len.trim().parse::<usize>().ok());
        if declared.is_some_and(|len| len > self.max_body_bytes)
            || response.bytes.len() > self.max_body_bytes
        {
            return Err(FetchError::TooLarge {
                url: url.to_string(),
                limit: self.max_body_bytes,
            });
        }

        trace!("GET {}: {} bytes", url, response.bytes.len());
        Ok(response.bytes)
    }
}

impl ByteFetcher for DefaultFetcher {
    fn fetch(&self, source: &SourceDescriptor) -> Result<Vec<u8>, FetchError> {
        match source {
            SourceDescriptor::Network { url, headers } => self.fetch_network(url, headers),
            SourceDescriptor::Asset { name, package } => {
                self.bundle.load(&bundle_key(name, package.as_deref()))
            }
            SourceDescriptor::File { path } => read_file(path),
            SourceDescriptor::Memory { bytes } => Ok(bytes.to_vec()),
        }
    }
}

/// Defaults first, then the caller's headers. A caller header replaces every
/// default of the same name (case-insensitive).
fn merge_headers(defaults: &[(String, String)], headers: &[(String, String)]) -> Vec<(String, String)> {
    defaults
        .iter()
        .filter(|(name, _)| !headers.iter().any(|(own, _)| own.eq_ignore_ascii_case(name)))
        .chain(headers)
        .cloned()
        .collect()
}

fn read_file(path: &Path) -> Result<Vec<u8>, FetchError> {
    std::fs::read(path).map_err(|e| FetchError::Io {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Asset bundle backed by a directory on disk
#[derive(Debug, Clone)]
pub struct DirBundle {
    root: PathBuf,
}

impl DirBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetBundle for DirBundle {
    fn load(&self, key: &str) -> Result<Vec<u8>, FetchError> {
        let rel = Path::new(key);
        // Keys must stay inside the bundle root
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if key.is_empty() || escapes {
            return Err(FetchError::Asset {
                key: key.to_string(),
                reason: "key must be a relative path inside the bundle".to_string(),
            });
        }

        let path = self.root.join(rel);
        std::fs::read(&path).map_err(|e| FetchError::Asset {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Asset bundle held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryBundle {
    entries: HashMap<String, Arc<[u8]>>,
}

impl MemoryBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        self.entries.insert(key.into(), bytes.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AssetBundle for MemoryBundle {
    fn load(&self, key: &str) -> Result<Vec<u8>, FetchError> {
        self.entries
            .get(key)
            .map(|b| b.to_vec())
            .ok_or_else(|| FetchError::Asset {
                key: key.to_string(),
                reason: "not in bundle".to_string(),
            })
    }
}
