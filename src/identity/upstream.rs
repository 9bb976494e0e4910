/// Client for an upstream identity provider
///
/// Used when migrating an existing player: the account API maps a name to
/// a UUID and the session API exposes the player's current skin.
use crate::error::{YggError, YggResult};
use base64::Engine;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;

/// Profile as returned by the account API
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamProfile {
    /// UUID without dashes
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct SessionProfile {
    #[serde(default)]
    properties: Vec<ProfileProperty>,
}

#[derive(Debug, Deserialize)]
struct ProfileProperty {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct TexturesValue {
    #[serde(default)]
    textures: HashMap<String, TextureEntry>,
}

#[derive(Debug, Deserialize)]
struct TextureEntry {
    url: String,
}

#[derive(Clone)]
pub struct UpstreamClient {
    http_client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// Look up a player by name on the account API
    ///
    /// Returns `None` when the upstream has no such player.
    pub async fn lookup_profile(
        &self,
        account_url: &str,
        username: &str,
    ) -> YggResult<Option<UpstreamProfile>> {
        let url = format!(
            "{}/users/profiles/minecraft/{}",
            account_url.trim_end_matches('/'),
            urlencoding::encode(username)
        );

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| YggError::ExternalFetch(format!("Failed to reach account API: {}", e)))?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => {
                return Err(YggError::ExternalFetch(format!(
                    "Account API returned {}",
                    status
                )))
            }
            _ => {}
        }

        let profile: UpstreamProfile = response
            .json()
            .await
            .map_err(|e| YggError::ExternalFetch(format!("Invalid account API response: {}", e)))?;

        Ok(Some(profile))
    }

    /// URL of the skin the player currently wears, if any
    pub async fn skin_url(&self, session_url: &str, uuid: &str) -> YggResult<Option<String>> {
        let url = format!(
            "{}/session/minecraft/profile/{}",
            session_url.trim_end_matches('/'),
            uuid.replace('-', "")
        );

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| YggError::ExternalFetch(format!("Failed to reach session API: {}", e)))?;

        if !response.status().is_success() {
            return Err(YggError::ExternalFetch(format!(
                "Session API returned {}",
                response.status()
            )));
        }

        let profile: SessionProfile = response
            .json()
            .await
            .map_err(|e| YggError::ExternalFetch(format!("Invalid session API response: {}", e)))?;

        let Some(textures) = profile.properties.iter().find(|p| p.name == "textures") else {
            return Ok(None);
        };

        decode_skin_url(&textures.value)
    }
}

/// Pull the SKIN url out of a base64 textures property
fn decode_skin_url(value: &str) -> YggResult<Option<String>> {
    let raw = base64::engine::general_purpose::STANDARD
        .decode(value)
        .map_err(|e| YggError::ExternalFetch(format!("Invalid textures property: {}", e)))?;
    let textures: TexturesValue = serde_json::from_slice(&raw)
        .map_err(|e| YggError::ExternalFetch(format!("Invalid textures property: {}", e)))?;

    Ok(textures.textures.get("SKIN").map(|t| t.url.clone()))
}
