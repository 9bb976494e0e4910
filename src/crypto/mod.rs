/// Cryptography module for the service signing key
///
/// Handles RSA key persistence, fingerprints and protocol signatures

pub mod signing_key;

pub use signing_key::{ensure_key, SigningKey};
