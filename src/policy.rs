/// Registration and login policy
///
/// Pure decisions over the loaded configuration. Nothing here touches
/// storage or the network.
use crate::{
    config::ServerConfig,
    error::{YggError, YggResult},
};
use regex::Regex;
use std::sync::Arc;

/// Whether and how accounts may be migrated from an upstream provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationRule {
    Disabled,
    Allowed {
        nickname: String,
        session_url: String,
        account_url: String,
        set_skin_url: String,
        require_skin_verification: bool,
    },
}

/// Policy engine
#[derive(Clone)]
pub struct PolicyEngine {
    config: Arc<ServerConfig>,
    anonymous_username: Option<Regex>,
}

impl PolicyEngine {
    pub fn new(config: Arc<ServerConfig>) -> YggResult<Self> {
        let anonymous_username = if config.anonymous_login.allow {
            // Anchored so the pattern has to cover the whole username
            let pattern = format!("^(?:{})$", config.anonymous_login.username_regex);
            Some(Regex::new(&pattern).map_err(|e| {
                YggError::Config(format!("Invalid anonymous login username regex: {}", e))
            })?)
        } else {
            None
        };

        Ok(Self {
            config,
            anonymous_username,
        })
    }

    /// Whether a new player may register, optionally choosing their UUID
    pub fn can_register_new(&self, uuid_requested: bool) -> bool {
        self.check_register_new(uuid_requested).is_ok()
    }

    /// Like [`can_register_new`](Self::can_register_new), with the reason
    pub fn check_register_new(&self, uuid_requested: bool) -> YggResult<()> {
        let rule = &self.config.registration_new_player;
        if !rule.allow {
            return Err(YggError::Forbidden("Registration is disabled.".to_string()));
        }
        if uuid_requested && !rule.allow_choosing_uuid {
            return Err(YggError::Forbidden("Choosing a UUID is not allowed.".to_string()));
        }
        Ok(())
    }

    /// Whether `username` may log in anonymously
    pub fn can_login_anonymously(&self, username: &str) -> bool {
        self.anonymous_username
            .as_ref()
            .is_some_and(|re| re.is_match(username))
    }

    /// Shared password anonymous players log in with
    pub fn anonymous_password(&self) -> &str {
        &self.config.anonymous_login.password
    }

    pub fn can_migrate_existing(&self) -> MigrationRule {
        let rule = &self.config.registration_existing_player;
        if !rule.allow {
            return MigrationRule::Disabled;
        }

        MigrationRule::Allowed {
            nickname: rule.nickname.clone(),
            session_url: rule.session_url.trim_end_matches('/').to_string(),
            account_url: rule.account_url.trim_end_matches('/').to_string(),
            set_skin_url: rule.set_skin_url.clone(),
            require_skin_verification: rule.require_skin_verification,
        }
    }

    /// Whether a player may rename from `old` to `new`
    ///
    /// Keeping the same name is always allowed.
    pub fn can_change_player_name(&self, old: &str, new: &str) -> bool {
        old == new || self.config.allow_changing_player_name
    }
}
