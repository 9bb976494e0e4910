/// Service signing key management
///
/// A single RSA keypair is generated on first start and persisted as a
/// PKCS#8 DER file. Every later start loads it unchanged.
use crate::error::{YggError, YggResult};
use rsa::{
    pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey},
    Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey,
};
use sha1::{Digest, Sha1};
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Modulus size for newly generated keys
pub const KEY_BITS: usize = 4096;

/// File name of the persisted key inside the state directory
pub const KEY_FILE_NAME: &str = "key.pkcs8";

/// Length of a key fingerprint in bytes
pub const FINGERPRINT_LEN: usize = 64;

/// The process-wide signing keypair
#[derive(Clone)]
pub struct SigningKey {
    key: RsaPrivateKey,
    der: Vec<u8>,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("fingerprint", &self.fingerprint_hex())
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    /// Decode a key from PKCS#8 DER
    pub fn from_der(der: &[u8]) -> YggResult<Self> {
        let key = RsaPrivateKey::from_pkcs8_der(der)
            .map_err(|e| YggError::Key(format!("Failed to decode signing key: {}", e)))?;

        Ok(Self {
            key,
            der: der.to_vec(),
        })
    }

    /// Generate a new key with the given modulus size
    pub fn generate(bits: usize) -> YggResult<Self> {
        let mut rng = rand::rngs::OsRng;
        let key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| YggError::Key(format!("Failed to generate signing key: {}", e)))?;
        let der = key
            .to_pkcs8_der()
            .map_err(|e| YggError::Key(format!("Failed to encode signing key: {}", e)))?
            .as_bytes()
            .to_vec();

        Ok(Self { key, der })
    }

    /// Canonical PKCS#8 DER encoding of the private key
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// 512-bit BLAKE3 digest of the canonical encoding
    ///
    /// For identification and display only.
    pub fn fingerprint(&self) -> [u8; FINGERPRINT_LEN] {
        let mut out = [0u8; FINGERPRINT_LEN];
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.der);
        hasher.finalize_xof().fill(&mut out);
        out
    }

    pub fn fingerprint_hex(&self) -> String {
        hex::encode(self.fingerprint())
    }

    pub fn public_key(&self) -> RsaPublicKey {
        RsaPublicKey::from(&self.key)
    }

    /// SubjectPublicKeyInfo DER of the public half
    pub fn public_key_der(&self) -> YggResult<Vec<u8>> {
        self.public_key()
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| YggError::Key(format!("Failed to encode public key: {}", e)))
    }

    /// RSASSA-PKCS1-v1_5 signature over the SHA-1 digest of `data`
    pub fn sign(&self, data: &[u8]) -> YggResult<Vec<u8>> {
        let digest = Sha1::digest(data);
        self.key
            .sign(Pkcs1v15Sign::new::<Sha1>(), &digest)
            .map_err(|e| YggError::Key(format!("Signing failed: {}", e)))
    }
}

/// Load the key from `state_dir`, generating and persisting one if absent
pub async fn ensure_key(state_dir: &Path) -> YggResult<SigningKey> {
    load_or_generate(&state_dir.join(KEY_FILE_NAME), KEY_BITS).await
}

/// Load the key at `path`, or generate a `bits`-sized key and write it there
/// with owner-only permissions
pub async fn load_or_generate(path: &Path, bits: usize) -> YggResult<SigningKey> {
    match tokio::fs::read(path).await {
        Ok(der) => {
            let key = SigningKey::from_der(&der)?;
            tracing::info!("Loaded signing key from {}", path.display());
            return Ok(key);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(YggError::Key(format!(
                "Failed to read signing key {}: {}",
                path.display(),
                e
            )))
        }
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            YggError::Key(format!("Failed to create state directory {:?}: {}", parent, e))
        })?;
    }

    tracing::info!("No signing key found, generating a {}-bit RSA key", bits);
    let key = tokio::task::spawn_blocking(move || SigningKey::generate(bits))
        .await
        .map_err(|e| YggError::Key(format!("Key generation task failed: {}", e)))??;

    write_key_file(path, key.der()).await?;
    tracing::info!("Wrote signing key to {}", path.display());

    Ok(key)
}

async fn write_key_file(path: &Path, der: &[u8]) -> YggResult<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await.map_err(|e| {
        YggError::Key(format!("Failed to create signing key {}: {}", path.display(), e))
    })?;
    file.write_all(der).await?;
    file.sync_all().await?;

    Ok(())
}
