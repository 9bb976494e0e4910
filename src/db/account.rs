/// Account database models and operations
///
/// This is the storage collaborator for account records. Uniqueness of
/// `username`, `player_name`, `uuid` and `session_token` is enforced by the
/// schema; violations come back as [`YggError::Conflict`] so callers never
/// inspect engine-specific error text.
use crate::error::{YggError, YggResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::fmt;

/// Player model variant used when rendering a skin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkinModel {
    #[default]
    Classic,
    Slim,
}

impl SkinModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkinModel::Classic => "classic",
            SkinModel::Slim => "slim",
        }
    }
}

impl fmt::Display for SkinModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown skin model name
#[derive(Debug, thiserror::Error)]
#[error("unknown skin model {0:?}")]
pub struct UnknownSkinModel(pub String);

impl TryFrom<String> for SkinModel {
    type Error = UnknownSkinModel;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "classic" => Ok(SkinModel::Classic),
            "slim" => Ok(SkinModel::Slim),
            _ => Err(UnknownSkinModel(value)),
        }
    }
}

/// Protocol access/client token pair carried on an account
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub client_token: String,
    pub valid: bool,
    pub created_at: DateTime<Utc>,
}

/// Account record in the database
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub uuid: String,
    pub username: String,
    pub player_name: String,
    #[serde(skip)]
    pub password_salt: Vec<u8>,
    #[serde(skip)]
    pub password_hash: Vec<u8>,
    pub preferred_language: String,
    #[sqlx(try_from = "String")]
    pub skin_model: SkinModel,
    pub skin_hash: Option<String>,
    pub cape_hash: Option<String>,
    #[serde(skip)]
    pub session_token: Option<String>,
    pub session_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(skip)]
    pub token_pairs: Vec<TokenPair>,
}

/// Fields of an account that has not been persisted yet
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub uuid: String,
    pub username: String,
    pub player_name: String,
    pub password_salt: Vec<u8>,
    pub password_hash: Vec<u8>,
    pub preferred_language: String,
    pub skin_model: SkinModel,
    pub session_token: Option<String>,
    pub session_expires_at: Option<DateTime<Utc>>,
}

const ACCOUNT_COLUMNS: &str = "id, uuid, username, player_name, password_salt, password_hash,
    preferred_language, skin_model, skin_hash, cape_hash, session_token, session_expires_at,
    created_at";

/// Classify a write failure, turning constraint violations into conflicts
fn classify_write_error(e: sqlx::Error) -> YggError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            YggError::Conflict("Account already exists".to_string())
        }
        _ => YggError::Storage(e),
    }
}

/// Typed access to the `account` table
#[derive(Clone)]
pub struct AccountStore {
    db: SqlitePool,
}

impl AccountStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Insert a new account, returning it with its assigned id
    pub async fn create(&self, new: NewAccount) -> YggResult<Account> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO account (uuid, username, player_name, password_salt, password_hash,
                                  preferred_language, skin_model, session_token, session_expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&new.uuid)
        .bind(&new.username)
        .bind(&new.player_name)
        .bind(&new.password_salt)
        .bind(&new.password_hash)
        .bind(&new.preferred_language)
        .bind(new.skin_model.as_str())
        .bind(&new.session_token)
        .bind(new.session_expires_at)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(classify_write_error)?;

        Ok(Account {
            id: result.last_insert_rowid(),
            uuid: new.uuid,
            username: new.username,
            player_name: new.player_name,
            password_salt: new.password_salt,
            password_hash: new.password_hash,
            preferred_language: new.preferred_language,
            skin_model: new.skin_model,
            skin_hash: None,
            cape_hash: None,
            session_token: new.session_token,
            session_expires_at: new.session_expires_at,
            created_at: now,
            token_pairs: Vec::new(),
        })
    }

    /// Persist the profile fields of `account`
    ///
    /// Session columns are left alone; only `set_session` and
    /// `clear_session` write them.
    pub async fn save(&self, account: &Account) -> YggResult<()> {
        let result = sqlx::query(
            "UPDATE account
             SET player_name = ?1, password_salt = ?2, password_hash = ?3, preferred_language = ?4,
                 skin_model = ?5, skin_hash = ?6, cape_hash = ?7
             WHERE id = ?8",
        )
        .bind(&account.player_name)
        .bind(&account.password_salt)
        .bind(&account.password_hash)
        .bind(&account.preferred_language)
        .bind(account.skin_model.as_str())
        .bind(&account.skin_hash)
        .bind(&account.cape_hash)
        .bind(account.id)
        .execute(&self.db)
        .await
        .map_err(classify_write_error)?;

        if result.rows_affected() == 0 {
            return Err(YggError::NotFound("Account not found".to_string()));
        }

        Ok(())
    }

    /// Store or replace the session token of an account
    pub async fn set_session(
        &self,
        id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> YggResult<()> {
        let result = sqlx::query(
            "UPDATE account SET session_token = ?1, session_expires_at = ?2 WHERE id = ?3",
        )
        .bind(token)
        .bind(expires_at)
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(classify_write_error)?;

        if result.rows_affected() == 0 {
            return Err(YggError::NotFound("Account not found".to_string()));
        }

        Ok(())
    }

    /// Clear the session token of an account
    pub async fn clear_session(&self, id: i64) -> YggResult<()> {
        sqlx::query("UPDATE account SET session_token = NULL, session_expires_at = NULL WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Delete an account; its token pairs go with it
    pub async fn delete(&self, id: i64) -> YggResult<()> {
        let result = sqlx::query("DELETE FROM account WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(YggError::NotFound("Account not found".to_string()));
        }

        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> YggResult<Option<Account>> {
        let query = format!("SELECT {} FROM account WHERE id = ?1", ACCOUNT_COLUMNS);
        let account = sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        self.with_token_pairs(account).await
    }

    pub async fn get_by_username(&self, username: &str) -> YggResult<Option<Account>> {
        let query = format!("SELECT {} FROM account WHERE username = ?1", ACCOUNT_COLUMNS);
        let account = sqlx::query_as::<_, Account>(&query)
            .bind(username)
            .fetch_optional(&self.db)
            .await?;

        self.with_token_pairs(account).await
    }

    pub async fn get_by_session_token(&self, token: &str) -> YggResult<Option<Account>> {
        let query = format!("SELECT {} FROM account WHERE session_token = ?1", ACCOUNT_COLUMNS);
        let account = sqlx::query_as::<_, Account>(&query)
            .bind(token)
            .fetch_optional(&self.db)
            .await?;

        self.with_token_pairs(account).await
    }

    async fn with_token_pairs(&self, account: Option<Account>) -> YggResult<Option<Account>> {
        let Some(mut account) = account else {
            return Ok(None);
        };

        account.token_pairs = sqlx::query_as::<_, TokenPair>(
            "SELECT access_token, client_token, valid, created_at
             FROM token_pair WHERE account_id = ?1 ORDER BY created_at, rowid",
        )
        .bind(account.id)
        .fetch_all(&self.db)
        .await?;

        Ok(Some(account))
    }
}
