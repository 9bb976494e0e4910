/// Challenge skins for existing-player migration
///
/// A player proves they own an upstream account by wearing a skin only
/// this server can produce for their name. The skin is derived from the
/// signing key fingerprint, so it is stable across restarts and different
/// on every installation.
use crate::{
    crypto::SigningKey,
    error::{YggError, YggResult},
};
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;

/// Challenge skins are classic 64x64 skins
pub const CHALLENGE_SIZE: u32 = 64;

fn challenge_pixels(key: &SigningKey, username: &str) -> RgbaImage {
    let fingerprint = key.fingerprint();
    let mut hash_key = [0u8; 32];
    hash_key.copy_from_slice(&fingerprint[..32]);

    let mut hasher = blake3::Hasher::new_keyed(&hash_key);
    hasher.update(username.as_bytes());
    let mut reader = hasher.finalize_xof();

    let mut pixels = vec![0u8; (CHALLENGE_SIZE * CHALLENGE_SIZE * 4) as usize];
    reader.fill(&mut pixels);
    // Fully opaque so upstream skin processing keeps every pixel
    for alpha in pixels.iter_mut().skip(3).step_by(4) {
        *alpha = 0xff;
    }

    RgbaImage::from_raw(CHALLENGE_SIZE, CHALLENGE_SIZE, pixels)
        .unwrap_or_else(|| RgbaImage::new(CHALLENGE_SIZE, CHALLENGE_SIZE))
}

/// PNG bytes of the challenge skin for `username`
pub fn challenge_skin(key: &SigningKey, username: &str) -> YggResult<Vec<u8>> {
    let mut buf = Vec::new();
    challenge_pixels(key, username)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| YggError::Internal(format!("Failed to encode challenge skin: {}", e)))?;
    Ok(buf)
}

/// Whether `data` shows the challenge skin for `username`
///
/// Compares decoded pixels, so any lossless re-encoding still matches.
pub fn matches_challenge(key: &SigningKey, username: &str, data: &[u8]) -> bool {
    let Ok(decoded) = image::load_from_memory_with_format(data, ImageFormat::Png) else {
        return false;
    };

    decoded.to_rgba8() == challenge_pixels(key, username)
}
