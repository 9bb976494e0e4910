/// Browser session extraction
use crate::{context::AppContext, db::account::Account, error::YggError};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "browserToken";

/// Authenticated context - the account behind the session cookie
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub account: Account,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = YggError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| YggError::Authentication("Not logged in.".to_string()))?;

        let account = state
            .sessions()
            .resolve(&token)
            .await?
            .ok_or_else(|| YggError::Authentication("Session expired, log in again.".to_string()))?;

        Ok(AuthContext { account })
    }
}

/// `Set-Cookie` value handing `token` to the browser until `expires_at`
pub fn session_cookie(token: &str, expires_at: DateTime<Utc>) -> String {
    format!(
        "{}={}; Path=/; Expires={}; HttpOnly; SameSite=Lax",
        SESSION_COOKIE,
        token,
        expires_at.format("%a, %d %b %Y %H:%M:%S GMT")
    )
}

/// `Set-Cookie` value clearing the session cookie
pub fn cleared_cookie() -> String {
    format!(
        "{}=; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Lax",
        SESSION_COOKIE
    )
}
