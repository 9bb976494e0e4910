/// Application context and dependency injection
use crate::{
    account::{AccountManager, SessionManager},
    asset::{AssetPipeline, DiskAssetBackend, RemoteFetcher, ValidationRules},
    config::ServerConfig,
    credentials::CredentialService,
    crypto::SigningKey,
    db::{self, AccountStore},
    error::YggResult,
    identity::UpstreamClient,
    policy::PolicyEngine,
    rate_limit::RateLimiter,
};
use sqlx::SqlitePool;
use std::{sync::Arc, time::Duration};

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub signing_key: Arc<SigningKey>,
    pub account_manager: Arc<AccountManager>,
    pub assets: AssetPipeline,
    /// `None` when rate limiting is disabled
    pub rate_limiter: Option<RateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig, signing_key: SigningKey) -> YggResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let db = db::create_pool(&config.database_path(), db::DatabaseOptions::default()).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        let credentials = CredentialService::new(config.min_password_length);
        Self::from_parts(config, signing_key, db, credentials)
    }

    /// Assemble the services over an already migrated pool
    pub fn from_parts(
        config: ServerConfig,
        signing_key: SigningKey,
        db: SqlitePool,
        credentials: CredentialService,
    ) -> YggResult<Self> {
        let config = Arc::new(config);
        let signing_key = Arc::new(signing_key);

        let fetcher = RemoteFetcher::new(
            Duration::from_secs(config.fetch_timeout_secs),
            config.asset_byte_limit,
        )?
        .with_private_hosts(config.allow_private_asset_hosts);
        let upstream = UpstreamClient::new(fetcher.client().clone());

        let assets = AssetPipeline::new(
            Arc::new(DiskAssetBackend::new(config.data_directory.clone())),
            fetcher,
            ValidationRules {
                size_limit: config.skin_size_limit,
                byte_limit: config.asset_byte_limit,
            },
        );

        let policy = PolicyEngine::new(config.clone())?;

        let account_manager = Arc::new(AccountManager::new(
            config.clone(),
            AccountStore::new(db.clone()),
            credentials,
            assets.clone(),
            policy,
            upstream,
            signing_key.clone(),
        ));

        let rate_limiter = if config.rate_limit.enabled {
            Some(RateLimiter::new(config.rate_limit.requests_per_second)?)
        } else {
            None
        };

        Ok(Self {
            config,
            db,
            signing_key,
            account_manager,
            assets,
            rate_limiter,
        })
    }

    pub fn sessions(&self) -> &SessionManager {
        self.account_manager.sessions()
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> YggResult<()> {
        for dir in [&config.state_directory, &config.data_directory] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }
}
