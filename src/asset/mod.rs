/// Skin and cape asset pipeline
///
/// Validates uploaded or fetched images and stores them content-addressed,
/// so identical images share one blob.

pub mod disk;
pub mod fetch;
pub mod pipeline;
pub mod validate;

pub use disk::DiskAssetBackend;
pub use fetch::RemoteFetcher;
pub use pipeline::AssetPipeline;
pub use validate::{ValidImage, ValidationRules};

use crate::error::YggResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which kind of texture an asset is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Skin,
    Cape,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Skin => "skin",
            AssetKind::Cape => "cape",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "skin" => Some(AssetKind::Skin),
            "cape" => Some(AssetKind::Cape),
            _ => None,
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the bytes of a new skin or cape come from
#[derive(Debug, Clone)]
pub enum AssetSource {
    /// Direct upload
    Upload(Vec<u8>),
    /// Remote URL, fetched as an untrusted byte source
    Url(String),
}

/// Whether `hash` looks like a content hash produced by the pipeline
pub fn is_content_hash(hash: &str) -> bool {
    hash.len() == 64 && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Asset storage backend trait
///
/// Implementations store blobs keyed by kind and content hash.
#[async_trait]
pub trait AssetBackend: Send + Sync {
    /// Store a blob unless one with this hash already exists
    async fn put(&self, kind: AssetKind, hash: &str, data: Vec<u8>) -> YggResult<()>;

    /// Retrieve a blob
    async fn get(&self, kind: AssetKind, hash: &str) -> YggResult<Option<Vec<u8>>>;

    /// Delete a blob; deleting a missing blob is not an error
    async fn delete(&self, kind: AssetKind, hash: &str) -> YggResult<()>;

    /// Check if a blob exists
    async fn exists(&self, kind: AssetKind, hash: &str) -> YggResult<bool>;
}
