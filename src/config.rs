/// Configuration management for the identity service
use crate::error::{YggError, YggResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main server configuration
///
/// Decoded from a TOML file over [`ServerConfig::default`], so a file only
/// needs to name the settings it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub instance_name: String,
    pub application_owner: String,
    pub domain: String,
    pub base_url: String,
    pub listen_address: String,
    pub state_directory: PathBuf,
    pub data_directory: PathBuf,
    pub log_requests: bool,
    pub hide_listen_address: bool,
    /// Skip the server-side 24h session expiry check
    pub disable_token_expiry: bool,
    pub default_preferred_language: String,
    /// Maximum skin/cape width in pixels
    pub skin_size_limit: u32,
    /// Maximum encoded skin/cape size in bytes
    pub asset_byte_limit: usize,
    pub allow_changing_player_name: bool,
    pub min_password_length: usize,
    /// Timeout for outbound skin/cape and upstream API requests
    pub fetch_timeout_secs: u64,
    /// Let skin/cape URLs point at loopback, private and link-local addresses
    pub allow_private_asset_hosts: bool,
    pub rate_limit: RateLimitConfig,
    pub body_size: BodySizeConfig,
    pub fallback_api_servers: Vec<FallbackApiServer>,
    pub anonymous_login: AnonymousLoginConfig,
    pub registration_new_player: NewPlayerConfig,
    pub registration_existing_player: ExistingPlayerConfig,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_second: f64,
}

/// Request body size limiting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BodySizeConfig {
    pub enabled: bool,
    /// Size such as "512K", "2M" or a plain byte count
    pub size_limit: String,
}

/// An upstream API server players may come from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackApiServer {
    pub nickname: String,
    pub session_url: String,
    pub account_url: String,
    pub skin_domain: String,
}

/// Anonymous login policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnonymousLoginConfig {
    pub allow: bool,
    pub username_regex: String,
    pub password: String,
}

/// New player registration policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewPlayerConfig {
    pub allow: bool,
    pub allow_choosing_uuid: bool,
}

/// Existing player migration policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExistingPlayerConfig {
    pub allow: bool,
    pub nickname: String,
    pub session_url: String,
    pub account_url: String,
    pub set_skin_url: String,
    pub require_skin_verification: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            instance_name: "Ygg Identity".to_string(),
            application_owner: "Anonymous".to_string(),
            domain: "ygg.example.com".to_string(),
            base_url: "https://ygg.example.com".to_string(),
            listen_address: "0.0.0.0:9090".to_string(),
            state_directory: PathBuf::from("/var/lib/ygg-identity"),
            data_directory: PathBuf::from("/var/lib/ygg-identity/data"),
            log_requests: true,
            hide_listen_address: false,
            disable_token_expiry: false,
            default_preferred_language: "en".to_string(),
            skin_size_limit: 128,
            asset_byte_limit: 1024 * 1024,
            allow_changing_player_name: true,
            min_password_length: 1,
            fetch_timeout_secs: 10,
            allow_private_asset_hosts: false,
            rate_limit: RateLimitConfig::default(),
            body_size: BodySizeConfig::default(),
            fallback_api_servers: vec![FallbackApiServer {
                nickname: "Mojang".to_string(),
                session_url: "https://sessionserver.mojang.com".to_string(),
                account_url: "https://api.mojang.com".to_string(),
                skin_domain: "textures.minecraft.net".to_string(),
            }],
            anonymous_login: AnonymousLoginConfig::default(),
            registration_new_player: NewPlayerConfig::default(),
            registration_existing_player: ExistingPlayerConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 10.0,
        }
    }
}

impl Default for BodySizeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            size_limit: "1M".to_string(),
        }
    }
}

impl Default for NewPlayerConfig {
    fn default() -> Self {
        Self {
            allow: true,
            allow_choosing_uuid: false,
        }
    }
}

impl Default for ExistingPlayerConfig {
    fn default() -> Self {
        Self {
            allow: true,
            nickname: "Mojang".to_string(),
            session_url: "https://sessionserver.mojang.com".to_string(),
            account_url: "https://api.mojang.com".to_string(),
            set_skin_url: "https://www.minecraft.net/msaprofile/mygames/editskin".to_string(),
            require_skin_verification: true,
        }
    }
}

impl ServerConfig {
    /// Load configuration from `path`, writing the defaults there first if
    /// the file does not exist yet
    pub fn read_or_create(path: &Path) -> YggResult<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let defaults = toml::to_string_pretty(&ServerConfig::default())
                .map_err(|e| YggError::Config(format!("Failed to encode defaults: {}", e)))?;
            std::fs::write(path, defaults)?;
            tracing::info!("Wrote default configuration to {}", path.display());
        }

        let content = std::fs::read_to_string(path)?;
        let config: ServerConfig = toml::from_str(&content).map_err(|e| {
            YggError::Config(format!("Failed to decode {}: {}", path.display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> YggResult<()> {
        if self.instance_name.is_empty() {
            return Err(YggError::Config("Instance name cannot be empty".to_string()));
        }

        if self.rate_limit.enabled && !(self.rate_limit.requests_per_second > 0.0) {
            return Err(YggError::Config(
                "Rate limit requests_per_second must be positive".to_string(),
            ));
        }

        if self.body_size.enabled {
            self.body_size_limit()?;
        }

        if self.skin_size_limit == 0 {
            return Err(YggError::Config("Skin size limit must be positive".to_string()));
        }

        if self.anonymous_login.allow {
            regex::Regex::new(&self.anonymous_login.username_regex).map_err(|e| {
                YggError::Config(format!("Invalid anonymous login username regex: {}", e))
            })?;
        }

        Ok(())
    }

    /// Configured request body limit in bytes, if enabled
    pub fn body_size_limit(&self) -> YggResult<Option<usize>> {
        if !self.body_size.enabled {
            return Ok(None);
        }
        parse_size(&self.body_size.size_limit).map(Some)
    }

    /// Path of the account database
    pub fn database_path(&self) -> PathBuf {
        self.state_directory.join("ygg-identity.db")
    }
}

/// Parse a size such as "512K", "2M", "1G" or "4096" into bytes
pub fn parse_size(value: &str) -> YggResult<usize> {
    let value = value.trim();
    let invalid = || YggError::Config(format!("Invalid size: {:?}", value));

    let (digits, multiplier) = match value.chars().last().map(|c| c.to_ascii_uppercase()) {
        Some('K') => (&value[..value.len() - 1], 1024),
        Some('M') => (&value[..value.len() - 1], 1024 * 1024),
        Some('G') => (&value[..value.len() - 1], 1024 * 1024 * 1024),
        Some(c) if c.is_ascii_digit() => (value, 1),
        _ => return Err(invalid()),
    };

    let count: usize = digits.trim().parse().map_err(|_| invalid())?;
    count.checked_mul(multiplier).ok_or_else(invalid)
}
