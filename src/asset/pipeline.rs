/// Asset pipeline
///
/// Ingests skin/cape bytes from an upload or URL, validates them, and
/// stores them keyed by content hash.
use crate::{
    asset::{
        validate::{validate_image, ValidImage, ValidationRules},
        AssetBackend, AssetKind, AssetSource, RemoteFetcher,
    },
    db::account::Account,
    error::{YggError, YggResult},
};
use std::sync::Arc;

/// Main asset pipeline
#[derive(Clone)]
pub struct AssetPipeline {
    backend: Arc<dyn AssetBackend>,
    fetcher: RemoteFetcher,
    rules: ValidationRules,
}

impl AssetPipeline {
    pub fn new(backend: Arc<dyn AssetBackend>, fetcher: RemoteFetcher, rules: ValidationRules) -> Self {
        Self {
            backend,
            fetcher,
            rules,
        }
    }

    pub fn fetcher(&self) -> &RemoteFetcher {
        &self.fetcher
    }

    /// Read bytes from `source` and validate them as `kind`
    ///
    /// Nothing is stored; a fetch failure stays an `ExternalFetch` error.
    pub async fn ingest(&self, kind: AssetKind, source: AssetSource) -> YggResult<ValidImage> {
        let data = match source {
            AssetSource::Upload(data) => data,
            AssetSource::Url(url) => self.fetcher.fetch(kind.as_str(), &url).await?,
        };

        self.validate(kind, data).await
    }

    /// Validate on the blocking pool
    pub async fn validate(&self, kind: AssetKind, data: Vec<u8>) -> YggResult<ValidImage> {
        let rules = self.rules;
        tokio::task::spawn_blocking(move || validate_image(kind, &data, &rules))
            .await
            .map_err(|e| YggError::Internal(format!("Image validation task failed: {}", e)))?
    }

    /// Store a validated image, returning its content hash
    ///
    /// An existing blob with the same hash is reused as is.
    pub async fn store(&self, image: &ValidImage) -> YggResult<String> {
        let hash = image.content_hash();

        if self.backend.exists(image.kind, &hash).await? {
            tracing::debug!("Reusing existing {} {}", image.kind, hash);
            return Ok(hash);
        }

        self.backend
            .put(image.kind, &hash, image.bytes().to_vec())
            .await?;
        tracing::info!("Stored {} {} ({}x{})", image.kind, hash, image.width, image.height);

        Ok(hash)
    }

    /// Point the in-memory account at a stored blob
    ///
    /// The caller persists the account.
    pub fn set_on_account(account: &mut Account, kind: AssetKind, hash: String) {
        match kind {
            AssetKind::Skin => account.skin_hash = Some(hash),
            AssetKind::Cape => account.cape_hash = Some(hash),
        }
    }

    /// Remove a blob without checking for other referrers
    pub async fn delete(&self, kind: AssetKind, hash: &str) -> YggResult<()> {
        self.backend.delete(kind, hash).await?;
        tracing::debug!("Deleted {} {}", kind, hash);
        Ok(())
    }

    /// Fetch stored blob bytes
    pub async fn get(&self, kind: AssetKind, hash: &str) -> YggResult<Option<Vec<u8>>> {
        self.backend.get(kind, hash).await
    }

    /// Public URL a stored blob is served at
    pub fn texture_url(base_url: &str, kind: AssetKind, hash: &str) -> String {
        format!("{}/texture/{}/{}.png", base_url.trim_end_matches('/'), kind, hash)
    }
}
