/// Account management system
///
/// Handles registration, login, profile updates, deletion and the browser
/// sessions that go with them.

mod manager;
pub mod session;

pub use manager::AccountManager;
pub use session::{IssuedSession, SessionManager};

use crate::{
    asset::{AssetKind, AssetPipeline, AssetSource},
    db::account::{Account, SkinModel},
};
use serde::{Deserialize, Serialize};

/// Registration request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    /// UUID the player asks for, when the policy allows choosing one
    #[serde(default)]
    pub chosen_uuid: Option<String>,
    /// Migrate an account that exists on the upstream provider
    #[serde(default)]
    pub existing_player: bool,
}

/// Login request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Profile update; every field left as `None` is kept as is
#[derive(Debug, Clone, Default)]
pub struct UpdateProfileRequest {
    pub player_name: Option<String>,
    pub preferred_language: Option<String>,
    /// New password; empty means unchanged
    pub password: Option<String>,
    pub skin_model: Option<String>,
    pub skin: Option<AssetSource>,
    pub cape: Option<AssetSource>,
}

/// Result of a successful register or login
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub account: Account,
    pub session: IssuedSession,
}

/// Public view of an account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub uuid: String,
    pub username: String,
    pub player_name: String,
    pub preferred_language: String,
    pub skin_model: SkinModel,
    pub skin_url: Option<String>,
    pub cape_url: Option<String>,
}

impl ProfileView {
    pub fn new(account: &Account, base_url: &str) -> Self {
        let url = |kind, hash: &Option<String>| {
            hash.as_deref()
                .map(|h| AssetPipeline::texture_url(base_url, kind, h))
        };

        Self {
            uuid: account.uuid.clone(),
            username: account.username.clone(),
            player_name: account.player_name.clone(),
            preferred_language: account.preferred_language.clone(),
            skin_model: account.skin_model,
            skin_url: url(AssetKind::Skin, &account.skin_hash),
            cape_url: url(AssetKind::Cape, &account.cape_hash),
        }
    }
}
