/// Browser session tokens
///
/// One live token per account: issuing a new one replaces (and so
/// invalidates) whatever was stored before.
use crate::{
    db::{account::Account, AccountStore},
    error::YggResult,
};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;

/// Session lifetime attached to the client cookie and checked on resolve
pub const SESSION_LIFETIME_HOURS: i64 = 24;

/// Random bytes in a session token before hex encoding
const TOKEN_BYTES: usize = 32;

/// A freshly issued session token
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl IssuedSession {
    /// Mint a new token without storing it anywhere
    pub fn mint() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);

        Self {
            token: hex::encode(bytes),
            expires_at: Utc::now() + Duration::hours(SESSION_LIFETIME_HOURS),
        }
    }
}

/// Session manager service
#[derive(Clone)]
pub struct SessionManager {
    store: AccountStore,
    enforce_expiry: bool,
}

impl SessionManager {
    pub fn new(store: AccountStore, enforce_expiry: bool) -> Self {
        Self {
            store,
            enforce_expiry,
        }
    }

    /// Issue a new token for `account`, replacing any previous one
    pub async fn issue(&self, account: &mut Account) -> YggResult<IssuedSession> {
        let session = IssuedSession::mint();
        self.store
            .set_session(account.id, &session.token, session.expires_at)
            .await?;

        account.session_token = Some(session.token.clone());
        account.session_expires_at = Some(session.expires_at);

        tracing::debug!("Issued session for account {}", account.id);
        Ok(session)
    }

    /// Find the account a presented token belongs to
    ///
    /// Unknown and expired tokens resolve to `None`.
    pub async fn resolve(&self, token: &str) -> YggResult<Option<Account>> {
        if token.is_empty() {
            return Ok(None);
        }

        let Some(account) = self.store.get_by_session_token(token).await? else {
            return Ok(None);
        };

        if self.enforce_expiry {
            let expired = account
                .session_expires_at
                .map_or(true, |expires_at| Utc::now() >= expires_at);
            if expired {
                tracing::debug!("Rejected expired session for account {}", account.id);
                return Ok(None);
            }
        }

        Ok(Some(account))
    }

    /// End the session of `account` unconditionally
    pub async fn revoke(&self, account: &mut Account) -> YggResult<()> {
        self.store.clear_session(account.id).await?;
        account.session_token = None;
        account.session_expires_at = None;

        tracing::debug!("Revoked session for account {}", account.id);
        Ok(())
    }
}
