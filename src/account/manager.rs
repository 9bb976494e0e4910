/// Account manager
///
/// Composes credentials, sessions, assets and policy into the four account
/// flows. Every collaborator failure is classified here before it reaches
/// the caller; uniqueness is left to the storage layer.
use crate::{
    account::{
        IssuedSession, LoginRequest, RegisterRequest, SessionManager, SessionOutcome,
        UpdateProfileRequest,
    },
    asset::{AssetKind, AssetPipeline},
    config::ServerConfig,
    credentials::CredentialService,
    crypto::SigningKey,
    db::{
        account::{Account, NewAccount, SkinModel},
        AccountStore,
    },
    error::{YggError, YggResult},
    identity::{matches_challenge, UpstreamClient},
    policy::{MigrationRule, PolicyEngine},
    validation,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Account manager service
#[derive(Clone)]
pub struct AccountManager {
    config: Arc<ServerConfig>,
    store: AccountStore,
    credentials: CredentialService,
    sessions: SessionManager,
    assets: AssetPipeline,
    policy: PolicyEngine,
    upstream: UpstreamClient,
    signing_key: Arc<SigningKey>,
}

fn auth_failed() -> YggError {
    YggError::Authentication("Incorrect username or password.".to_string())
}

fn conflict_as(message: &str) -> impl FnOnce(YggError) -> YggError + '_ {
    move |e| match e {
        YggError::Conflict(_) => YggError::Conflict(message.to_string()),
        other => other,
    }
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(
        config: Arc<ServerConfig>,
        store: AccountStore,
        credentials: CredentialService,
        assets: AssetPipeline,
        policy: PolicyEngine,
        upstream: UpstreamClient,
        signing_key: Arc<SigningKey>,
    ) -> Self {
        let sessions = SessionManager::new(store.clone(), !config.disable_token_expiry);

        Self {
            config,
            store,
            credentials,
            sessions,
            assets,
            policy,
            upstream,
            signing_key,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    /// Register a new account and log it in
    pub async fn register(&self, req: RegisterRequest) -> YggResult<SessionOutcome> {
        validation::validate_username(&req.username)?;
        if req.password.is_empty() {
            return Err(YggError::validation("password", "password can't be blank"));
        }
        self.check_password(&req.password)?;

        let uuid = if req.existing_player {
            self.migrate_existing(&req.username).await?
        } else {
            self.policy.check_register_new(req.chosen_uuid.is_some())?;
            match &req.chosen_uuid {
                Some(chosen) => validation::parse_uuid("chosenUuid", chosen)?,
                None => uuid::Uuid::new_v4().to_string(),
            }
        };

        let outcome = self
            .create_account(&req.username, &req.password, uuid)
            .await
            .map_err(conflict_as("That username is taken."))?;

        tracing::info!(
            "Registered account {} ({})",
            outcome.account.username,
            outcome.account.uuid
        );
        Ok(outcome)
    }

    /// Check credentials and issue a fresh session
    ///
    /// An unknown username that matches the anonymous login rule and
    /// presents the shared password is registered on the spot.
    pub async fn login(&self, req: LoginRequest) -> YggResult<SessionOutcome> {
        if req.username.is_empty() || req.password.is_empty() {
            return Err(auth_failed());
        }

        let account = match self.store.get_by_username(&req.username).await? {
            Some(account) => account,
            None if self.is_anonymous_login(&req) => {
                let uuid = uuid::Uuid::new_v4().to_string();
                match self.create_account(&req.username, &req.password, uuid).await {
                    Ok(outcome) => {
                        tracing::info!("Registered anonymous account {}", req.username);
                        return Ok(outcome);
                    }
                    // Lost a race with another anonymous login for this name
                    Err(YggError::Conflict(_)) => self
                        .store
                        .get_by_username(&req.username)
                        .await?
                        .ok_or_else(auth_failed)?,
                    Err(e) => return Err(e),
                }
            }
            None => return Err(auth_failed()),
        };

        let valid = self
            .credentials
            .verify_async(&req.password, &account.password_salt, &account.password_hash)
            .await?;
        if !valid {
            tracing::debug!("Failed login for {}", req.username);
            return Err(auth_failed());
        }

        let mut account = account;
        let session = self.sessions.issue(&mut account).await?;
        Ok(SessionOutcome { account, session })
    }

    /// Apply a profile update to the session's account
    ///
    /// All fields are validated and both textures ingested before anything
    /// is stored, so a failure leaves the account untouched. Replaced
    /// textures are not deleted.
    pub async fn update_profile(
        &self,
        account: &Account,
        req: UpdateProfileRequest,
    ) -> YggResult<Account> {
        let mut updated = account.clone();

        if let Some(player_name) = req.player_name {
            validation::validate_player_name(&player_name)?;
            if !self
                .policy
                .can_change_player_name(&account.player_name, &player_name)
            {
                return Err(YggError::Forbidden(
                    "Changing your player name is not allowed.".to_string(),
                ));
            }
            updated.player_name = player_name;
        }

        if let Some(language) = req.preferred_language {
            validation::validate_preferred_language(&language)?;
            updated.preferred_language = language;
        }

        if let Some(skin_model) = req.skin_model {
            updated.skin_model = validation::parse_skin_model(&skin_model)?;
        }

        let new_password = req.password.filter(|p| !p.is_empty());
        if let Some(password) = &new_password {
            self.check_password(password)?;
        }

        let skin = match req.skin {
            Some(source) => Some(self.assets.ingest(AssetKind::Skin, source).await?),
            None => None,
        };
        let cape = match req.cape {
            Some(source) => Some(self.assets.ingest(AssetKind::Cape, source).await?),
            None => None,
        };

        if let Some(password) = new_password {
            let (salt, hash) = self.credentials.new_credentials(&password).await?;
            updated.password_salt = salt;
            updated.password_hash = hash;
        }

        if let Some(image) = skin {
            let hash = self.assets.store(&image).await?;
            AssetPipeline::set_on_account(&mut updated, AssetKind::Skin, hash);
        }
        if let Some(image) = cape {
            let hash = self.assets.store(&image).await?;
            AssetPipeline::set_on_account(&mut updated, AssetKind::Cape, hash);
        }

        self.store
            .save(&updated)
            .await
            .map_err(conflict_as("That player name is taken."))?;

        tracing::debug!("Updated profile of {}", updated.username);
        Ok(updated)
    }

    /// End the account's browser session
    pub async fn logout(&self, account: &mut Account) -> YggResult<()> {
        self.sessions.revoke(account).await
    }

    /// Delete the account and the textures it referenced
    ///
    /// Texture removal runs after the row is gone; a failure there is
    /// reported but the account stays deleted.
    pub async fn delete_account(&self, mut account: Account) -> YggResult<()> {
        self.sessions.revoke(&mut account).await?;

        let skin_hash = account.skin_hash.take();
        let cape_hash = account.cape_hash.take();

        self.store.delete(account.id).await?;
        tracing::info!("Deleted account {} ({})", account.username, account.uuid);

        let mut result = Ok(());
        for (kind, hash) in [(AssetKind::Skin, skin_hash), (AssetKind::Cape, cape_hash)] {
            let Some(hash) = hash else { continue };
            if let Err(e) = self.assets.delete(kind, &hash).await {
                tracing::warn!("Failed to delete {} {}: {}", kind, hash, e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        result
    }

    fn check_password(&self, password: &str) -> YggResult<()> {
        if !self.credentials.is_valid_password(password) {
            return Err(YggError::validation(
                "password",
                format!(
                    "password must be at least {} characters",
                    self.credentials.min_password_length().max(1)
                ),
            ));
        }
        Ok(())
    }

    fn is_anonymous_login(&self, req: &LoginRequest) -> bool {
        if !self.policy.can_login_anonymously(&req.username) {
            return false;
        }

        let expected = self.policy.anonymous_password().as_bytes();
        !expected.is_empty() && bool::from(req.password.as_bytes().ct_eq(expected))
    }

    /// Resolve the UUID of an upstream account, verifying ownership when
    /// the migration rule requires it
    async fn migrate_existing(&self, username: &str) -> YggResult<String> {
        let MigrationRule::Allowed {
            nickname,
            session_url,
            account_url,
            require_skin_verification,
            ..
        } = self.policy.can_migrate_existing()
        else {
            return Err(YggError::Forbidden(
                "Registration from an existing account is disabled.".to_string(),
            ));
        };

        let profile = self
            .upstream
            .lookup_profile(&account_url, username)
            .await?
            .ok_or_else(|| {
                YggError::Authentication(format!("Couldn't find your account on {}.", nickname))
            })?;

        if require_skin_verification {
            let not_verified =
                || YggError::Authentication("Couldn't verify your skin, maybe try again?".to_string());

            let skin_url = self
                .upstream
                .skin_url(&session_url, &profile.id)
                .await?
                .ok_or_else(not_verified)?;
            let skin = self.assets.fetcher().fetch("skin", &skin_url).await?;

            if !matches_challenge(&self.signing_key, username, &skin) {
                return Err(not_verified());
            }
        }

        uuid::Uuid::parse_str(&profile.id)
            .map(|u| u.hyphenated().to_string())
            .map_err(|_| YggError::ExternalFetch(format!("{} returned an invalid UUID", nickname)))
    }

    async fn create_account(
        &self,
        username: &str,
        password: &str,
        uuid: String,
    ) -> YggResult<SessionOutcome> {
        let (password_salt, password_hash) = self.credentials.new_credentials(password).await?;
        let session = IssuedSession::mint();

        let account = self
            .store
            .create(NewAccount {
                uuid,
                username: username.to_string(),
                player_name: username.to_string(),
                password_salt,
                password_hash,
                preferred_language: self.config.default_preferred_language.clone(),
                skin_model: SkinModel::Classic,
                session_token: Some(session.token.clone()),
                session_expires_at: Some(session.expires_at),
            })
            .await?;

        Ok(SessionOutcome { account, session })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        asset::{
            validate::test_png, AssetBackend, AssetSource, DiskAssetBackend, RemoteFetcher,
            ValidationRules,
        },
        credentials::test_params,
        db::create_memory_pool,
        identity::challenge_skin,
    };
    use async_trait::async_trait;
    use std::{
        path::Path,
        sync::Mutex,
        time::Duration,
    };
    use tempfile::TempDir;

    struct TestEnv {
        manager: AccountManager,
        assets: AssetPipeline,
        store: AccountStore,
        _dir: TempDir,
    }

    async fn setup_with(configure: impl FnOnce(&mut ServerConfig)) -> TestEnv {
        setup_keyed(configure, Arc::new(SigningKey::generate(1024).unwrap())).await
    }

    async fn setup_keyed(
        configure: impl FnOnce(&mut ServerConfig),
        signing_key: Arc<SigningKey>,
    ) -> TestEnv {
        setup_env(configure, signing_key, |dir| {
            Arc::new(DiskAssetBackend::new(dir.to_path_buf()))
        })
        .await
    }

    async fn setup_env(
        configure: impl FnOnce(&mut ServerConfig),
        signing_key: Arc<SigningKey>,
        backend: impl FnOnce(&Path) -> Arc<dyn AssetBackend>,
    ) -> TestEnv {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::default();
        config.data_directory = dir.path().to_path_buf();
        configure(&mut config);
        let config = Arc::new(config);

        let store = AccountStore::new(create_memory_pool().await.unwrap());
        let fetcher = RemoteFetcher::new(Duration::from_secs(5), config.asset_byte_limit)
            .unwrap()
            .with_private_hosts(true);
        let upstream = UpstreamClient::new(fetcher.client().clone());
        let assets = AssetPipeline::new(
            backend(dir.path()),
            fetcher,
            ValidationRules {
                size_limit: config.skin_size_limit,
                byte_limit: config.asset_byte_limit,
            },
        );
        let manager = AccountManager::new(
            config.clone(),
            store.clone(),
            CredentialService::with_params(config.min_password_length, test_params()),
            assets.clone(),
            PolicyEngine::new(config.clone()).unwrap(),
            upstream,
            signing_key.clone(),
        );

        TestEnv {
            manager,
            assets,
            store,
            _dir: dir,
        }
    }

    async fn setup() -> TestEnv {
        setup_with(|_| {}).await
    }

    fn register_request(username: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
            ..Default::default()
        }
    }

    fn login_request(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_and_duplicate() {
        let env = setup().await;

        let outcome = env
            .manager
            .register(register_request("alice", "secret1"))
            .await
            .unwrap();
        assert_eq!(outcome.account.player_name, "alice");
        assert_eq!(outcome.account.skin_model, SkinModel::Classic);
        assert_eq!(outcome.account.preferred_language, "en");
        assert_eq!(outcome.session.token.len(), 64);

        // Session is active straight away
        let resolved = env
            .manager
            .sessions()
            .resolve(&outcome.session.token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.id, outcome.account.id);

        match env.manager.register(register_request("alice", "other")).await {
            Err(YggError::Conflict(message)) => assert_eq!(message, "That username is taken."),
            other => panic!("Expected Conflict error, got {:?}", other.map(|o| o.account)),
        }
    }

    #[tokio::test]
    async fn test_register_rejects_blank_fields() {
        let env = setup().await;

        assert!(matches!(
            env.manager.register(register_request("", "secret1")).await,
            Err(YggError::Validation { ref field, .. }) if field == "username"
        ));
        assert!(matches!(
            env.manager.register(register_request("alice", "")).await,
            Err(YggError::Validation { ref field, .. }) if field == "password"
        ));
    }

    #[tokio::test]
    async fn test_register_policy() {
        let env = setup_with(|c| c.registration_new_player.allow = false).await;
        assert!(matches!(
            env.manager.register(register_request("alice", "secret1")).await,
            Err(YggError::Forbidden(_))
        ));

        let env = setup().await;
        let mut req = register_request("alice", "secret1");
        req.chosen_uuid = Some(uuid::Uuid::new_v4().to_string());
        assert!(matches!(env.manager.register(req).await, Err(YggError::Forbidden(_))));

        let env = setup_with(|c| c.registration_new_player.allow_choosing_uuid = true).await;
        let chosen = uuid::Uuid::new_v4().to_string();
        let mut req = register_request("alice", "secret1");
        req.chosen_uuid = Some(chosen.clone());
        let outcome = env.manager.register(req).await.unwrap();
        assert_eq!(outcome.account.uuid, chosen);
    }

    #[tokio::test]
    async fn test_concurrent_registration_has_one_winner() {
        let env = setup().await;

        let (a, b) = tokio::join!(
            env.manager.register(register_request("alice", "secret1")),
            env.manager.register(register_request("alice", "secret2")),
        );

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(YggError::Conflict(_))))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_login() {
        let env = setup().await;
        let registered = env
            .manager
            .register(register_request("alice", "secret1"))
            .await
            .unwrap();

        assert!(matches!(
            env.manager.login(login_request("alice", "wrong")).await,
            Err(YggError::Authentication(_))
        ));
        assert!(matches!(
            env.manager.login(login_request("bob", "secret1")).await,
            Err(YggError::Authentication(_))
        ));

        let outcome = env
            .manager
            .login(login_request("alice", "secret1"))
            .await
            .unwrap();
        assert_ne!(outcome.session.token, registered.session.token);

        // The registration session no longer resolves
        let sessions = env.manager.sessions();
        assert!(sessions
            .resolve(&registered.session.token)
            .await
            .unwrap()
            .is_none());
        assert!(sessions.resolve(&outcome.session.token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_anonymous_login() {
        let env = setup_with(|c| {
            c.anonymous_login.allow = true;
            c.anonymous_login.username_regex = "guest[0-9]+".to_string();
            c.anonymous_login.password = "letmein".to_string();
        })
        .await;

        let first = env
            .manager
            .login(login_request("guest1", "letmein"))
            .await
            .unwrap();
        assert_eq!(first.account.username, "guest1");

        // Second time around it is an ordinary login
        let second = env
            .manager
            .login(login_request("guest1", "letmein"))
            .await
            .unwrap();
        assert_eq!(second.account.id, first.account.id);

        assert!(matches!(
            env.manager.login(login_request("guest2", "wrong")).await,
            Err(YggError::Authentication(_))
        ));
        assert!(matches!(
            env.manager.login(login_request("alice", "letmein")).await,
            Err(YggError::Authentication(_))
        ));
    }

    #[tokio::test]
    async fn test_update_profile_fields() {
        let env = setup().await;
        let outcome = env
            .manager
            .register(register_request("alice", "secret1"))
            .await
            .unwrap();

        let updated = env
            .manager
            .update_profile(
                &outcome.account,
                UpdateProfileRequest {
                    player_name: Some("Alice".to_string()),
                    preferred_language: Some("fr".to_string()),
                    password: Some("secret2".to_string()),
                    skin_model: Some("slim".to_string()),
                    skin: Some(AssetSource::Upload(test_png(64, 64, [10, 20, 30, 255]))),
                    cape: Some(AssetSource::Upload(test_png(64, 32, [40, 50, 60, 255]))),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.player_name, "Alice");
        assert_eq!(updated.preferred_language, "fr");
        assert_eq!(updated.skin_model, SkinModel::Slim);
        assert_ne!(updated.password_salt, outcome.account.password_salt);

        let stored = env.store.get_by_id(updated.id).await.unwrap().unwrap();
        let skin_hash = stored.skin_hash.unwrap();
        let cape_hash = stored.cape_hash.unwrap();
        assert!(env.assets.get(AssetKind::Skin, &skin_hash).await.unwrap().is_some());
        assert!(env.assets.get(AssetKind::Cape, &cape_hash).await.unwrap().is_some());

        // Only the new password works now
        assert!(env.manager.login(login_request("alice", "secret1")).await.is_err());
        assert!(env.manager.login(login_request("alice", "secret2")).await.is_ok());
    }

    #[tokio::test]
    async fn test_oversized_skin_leaves_account_unchanged() {
        let env = setup().await;
        let outcome = env
            .manager
            .register(register_request("alice", "secret1"))
            .await
            .unwrap();

        let with_skin = env
            .manager
            .update_profile(
                &outcome.account,
                UpdateProfileRequest {
                    skin: Some(AssetSource::Upload(test_png(64, 64, [1, 2, 3, 255]))),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let original_hash = with_skin.skin_hash.clone();
        assert!(original_hash.is_some());

        let err = env
            .manager
            .update_profile(
                &with_skin,
                UpdateProfileRequest {
                    player_name: Some("Alice".to_string()),
                    skin: Some(AssetSource::Upload(test_png(256, 256, [0; 4]))),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, YggError::Validation { ref field, .. } if field == "skin"));

        let stored = env.store.get_by_id(with_skin.id).await.unwrap().unwrap();
        assert_eq!(stored.skin_hash, original_hash);
        assert_eq!(stored.player_name, "alice");
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_fields() {
        let env = setup().await;
        let account = env
            .manager
            .register(register_request("alice", "secret1"))
            .await
            .unwrap()
            .account;

        let cases = [
            (
                UpdateProfileRequest {
                    player_name: Some("x".repeat(17)),
                    ..Default::default()
                },
                "playerName",
            ),
            (
                UpdateProfileRequest {
                    preferred_language: Some("klingon".to_string()),
                    ..Default::default()
                },
                "preferredLanguage",
            ),
            (
                UpdateProfileRequest {
                    skin_model: Some("wide".to_string()),
                    ..Default::default()
                },
                "skinModel",
            ),
        ];

        for (req, expected) in cases {
            match env.manager.update_profile(&account, req).await {
                Err(YggError::Validation { field, .. }) => assert_eq!(field, expected),
                other => panic!("Expected Validation error, got {:?}", other.map(|a| a.id)),
            }
        }
    }

    #[tokio::test]
    async fn test_player_name_conflict_and_policy() {
        let env = setup().await;
        env.manager
            .register(register_request("alice", "secret1"))
            .await
            .unwrap();
        let bob = env
            .manager
            .register(register_request("bob", "secret1"))
            .await
            .unwrap()
            .account;

        let rename = |name: &str| UpdateProfileRequest {
            player_name: Some(name.to_string()),
            ..Default::default()
        };

        match env.manager.update_profile(&bob, rename("alice")).await {
            Err(YggError::Conflict(message)) => assert_eq!(message, "That player name is taken."),
            other => panic!("Expected Conflict error, got {:?}", other.map(|a| a.id)),
        }

        let env = setup_with(|c| c.allow_changing_player_name = false).await;
        let carol = env
            .manager
            .register(register_request("carol", "secret1"))
            .await
            .unwrap()
            .account;
        assert!(matches!(
            env.manager.update_profile(&carol, rename("caroline")).await,
            Err(YggError::Forbidden(_))
        ));
        assert!(env.manager.update_profile(&carol, rename("carol")).await.is_ok());
    }

    #[tokio::test]
    async fn test_logout() {
        let env = setup().await;
        let mut outcome = env
            .manager
            .register(register_request("alice", "secret1"))
            .await
            .unwrap();

        env.manager.logout(&mut outcome.account).await.unwrap();
        assert!(env
            .manager
            .sessions()
            .resolve(&outcome.session.token)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_account_removes_textures() {
        let env = setup().await;
        let outcome = env
            .manager
            .register(register_request("alice", "secret1"))
            .await
            .unwrap();
        let account = env
            .manager
            .update_profile(
                &outcome.account,
                UpdateProfileRequest {
                    skin: Some(AssetSource::Upload(test_png(64, 64, [9, 8, 7, 255]))),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let skin_hash = account.skin_hash.clone().unwrap();

        env.manager.delete_account(account.clone()).await.unwrap();

        assert!(env.store.get_by_id(account.id).await.unwrap().is_none());
        assert!(env.assets.get(AssetKind::Skin, &skin_hash).await.unwrap().is_none());
        assert!(env
            .manager
            .sessions()
            .resolve(&outcome.session.token)
            .await
            .unwrap()
            .is_none());

        // The username is free again
        env.manager
            .register(register_request("alice", "secret1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_stale_update_keeps_newer_session() {
        let env = setup().await;
        let registered = env
            .manager
            .register(register_request("alice", "secret1"))
            .await
            .unwrap();
        let snapshot = env
            .manager
            .sessions()
            .resolve(&registered.session.token)
            .await
            .unwrap()
            .unwrap();

        // Another device logs in while the update is in flight
        let login = env
            .manager
            .login(login_request("alice", "secret1"))
            .await
            .unwrap();

        env.manager
            .update_profile(
                &snapshot,
                UpdateProfileRequest {
                    preferred_language: Some("fr".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let sessions = env.manager.sessions();
        assert!(sessions
            .resolve(&registered.session.token)
            .await
            .unwrap()
            .is_none());
        let current = sessions.resolve(&login.session.token).await.unwrap().unwrap();
        assert_eq!(current.preferred_language, "fr");
    }

    /// Disk backend whose skin deletions fail; records every delete call
    struct FailingSkinDelete {
        inner: DiskAssetBackend,
        deleted: Arc<Mutex<Vec<AssetKind>>>,
    }

    #[async_trait]
    impl AssetBackend for FailingSkinDelete {
        async fn put(&self, kind: AssetKind, hash: &str, data: Vec<u8>) -> YggResult<()> {
            self.inner.put(kind, hash, data).await
        }

        async fn get(&self, kind: AssetKind, hash: &str) -> YggResult<Option<Vec<u8>>> {
            self.inner.get(kind, hash).await
        }

        async fn delete(&self, kind: AssetKind, hash: &str) -> YggResult<()> {
            self.deleted.lock().unwrap().push(kind);
            match kind {
                AssetKind::Skin => Err(YggError::AssetStorage("disk unavailable".to_string())),
                AssetKind::Cape => self.inner.delete(kind, hash).await,
            }
        }

        async fn exists(&self, kind: AssetKind, hash: &str) -> YggResult<bool> {
            self.inner.exists(kind, hash).await
        }
    }

    #[tokio::test]
    async fn test_delete_account_reports_texture_failure() {
        let deleted = Arc::new(Mutex::new(Vec::new()));
        let calls = deleted.clone();
        let env = setup_env(|_| {}, Arc::new(SigningKey::generate(1024).unwrap()), move |dir| {
            Arc::new(FailingSkinDelete {
                inner: DiskAssetBackend::new(dir.to_path_buf()),
                deleted: calls,
            })
        })
        .await;

        let outcome = env
            .manager
            .register(register_request("alice", "secret1"))
            .await
            .unwrap();
        let account = env
            .manager
            .update_profile(
                &outcome.account,
                UpdateProfileRequest {
                    skin: Some(AssetSource::Upload(test_png(64, 64, [1, 2, 3, 255]))),
                    cape: Some(AssetSource::Upload(test_png(64, 32, [4, 5, 6, 255]))),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let cape_hash = account.cape_hash.clone().unwrap();

        match env.manager.delete_account(account.clone()).await {
            Err(YggError::AssetStorage(_)) => {}
            other => panic!("Expected AssetStorage error, got {:?}", other),
        }

        // The row is gone even though a texture could not be removed
        assert!(env.store.get_by_id(account.id).await.unwrap().is_none());
        assert_eq!(*deleted.lock().unwrap(), vec![AssetKind::Skin, AssetKind::Cape]);
        assert!(env.assets.get(AssetKind::Cape, &cape_hash).await.unwrap().is_none());
    }

    mod migration {
        use super::*;
        use axum::{extract::Path, http::StatusCode, routing::get, Json, Router};
        use base64::Engine;
        use serde_json::json;

        const NOTCH_ID: &str = "069a79f444e94726a5befca90e38aaf5";

        /// Upstream that knows one player wearing `skin`
        async fn upstream(skin: Vec<u8>) -> String {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base = format!("http://{}", listener.local_addr().unwrap());

            let textures = json!({ "textures": { "SKIN": { "url": format!("{}/skin.png", base) } } });
            let textures = base64::engine::general_purpose::STANDARD.encode(textures.to_string());

            let router = Router::new()
                .route(
                    "/users/profiles/minecraft/:name",
                    get(|Path(name): Path<String>| async move {
                        if name == "Notch" {
                            Ok(Json(json!({ "id": NOTCH_ID, "name": "Notch" })))
                        } else {
                            Err(StatusCode::NOT_FOUND)
                        }
                    }),
                )
                .route(
                    "/session/minecraft/profile/:uuid",
                    get(move || {
                        let textures = textures.clone();
                        async move {
                            Json(json!({
                                "id": NOTCH_ID,
                                "name": "Notch",
                                "properties": [{ "name": "textures", "value": textures }]
                            }))
                        }
                    }),
                )
                .route(
                    "/skin.png",
                    get(move || {
                        let skin = skin.clone();
                        async move { skin }
                    }),
                );

            tokio::spawn(async move {
                axum::serve(listener, router).await.unwrap();
            });
            base
        }

        fn existing(username: &str) -> RegisterRequest {
            RegisterRequest {
                existing_player: true,
                ..register_request(username, "secret1")
            }
        }

        async fn setup_against(base: String, signing_key: Arc<SigningKey>) -> TestEnv {
            setup_keyed(
                move |c| {
                    c.registration_existing_player.account_url = base.clone();
                    c.registration_existing_player.session_url = base;
                },
                signing_key,
            )
            .await
        }

        #[tokio::test]
        async fn test_migration_with_challenge_skin() {
            let signing_key = Arc::new(SigningKey::generate(1024).unwrap());
            let skin = challenge_skin(&signing_key, "Notch").unwrap();
            let env = setup_against(upstream(skin).await, signing_key).await;

            let outcome = env.manager.register(existing("Notch")).await.unwrap();
            assert_eq!(outcome.account.uuid, "069a79f4-44e9-4726-a5be-fca90e38aaf5");
            assert_eq!(outcome.account.player_name, "Notch");
        }

        #[tokio::test]
        async fn test_migration_rejects_wrong_skin() {
            let signing_key = Arc::new(SigningKey::generate(1024).unwrap());
            let other_key = SigningKey::generate(1024).unwrap();
            let skin = challenge_skin(&other_key, "Notch").unwrap();
            let env = setup_against(upstream(skin).await, signing_key).await;

            assert!(matches!(
                env.manager.register(existing("Notch")).await,
                Err(YggError::Authentication(_))
            ));
            assert!(env.store.get_by_username("Notch").await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_migration_without_verification() {
            let base = upstream(Vec::new()).await;
            let env = setup_with(move |c| {
                c.registration_existing_player.account_url = base.clone();
                c.registration_existing_player.session_url = base;
                c.registration_existing_player.require_skin_verification = false;
            })
            .await;

            let outcome = env.manager.register(existing("Notch")).await.unwrap();
            assert_eq!(outcome.account.uuid, "069a79f4-44e9-4726-a5be-fca90e38aaf5");

            assert!(matches!(
                env.manager.register(existing("Nobody")).await,
                Err(YggError::Authentication(_))
            ));
        }

        #[tokio::test]
        async fn test_migration_disabled() {
            let env = setup_with(|c| c.registration_existing_player.allow = false).await;
            assert!(matches!(
                env.manager.register(existing("Notch")).await,
                Err(YggError::Forbidden(_))
            ));
        }

        #[tokio::test]
        async fn test_unreachable_upstream() {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            let base = format!("http://{}", listener.local_addr().unwrap());
            drop(listener);

            let env = setup_against(base, Arc::new(SigningKey::generate(1024).unwrap())).await;
            assert!(matches!(
                env.manager.register(existing("Notch")).await,
                Err(YggError::ExternalFetch(_))
            ));
        }
    }
}
