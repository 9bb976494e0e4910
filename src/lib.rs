/// Ygg Identity - account, session and skin/cape core of a
/// Minecraft-compatible identity service
///
/// Holds the service signing key, salted password credentials, browser
/// sessions, content-addressed skins and capes, and the policy that gates
/// registration and login.

pub mod account;
pub mod api;
pub mod asset;
pub mod auth;
pub mod config;
pub mod context;
pub mod credentials;
pub mod crypto;
pub mod db;
pub mod error;
pub mod identity;
pub mod policy;
pub mod rate_limit;
pub mod server;
pub mod validation;
