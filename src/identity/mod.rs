/// Upstream identity provider support
///
/// Account lookups against an upstream API server and the challenge skins
/// used to prove ownership of an upstream account during migration.

pub mod challenge;
pub mod upstream;

pub use challenge::{challenge_skin, matches_challenge};
pub use upstream::{UpstreamClient, UpstreamProfile};
