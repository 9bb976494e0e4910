/// Rate Limiting System
///
/// Requests are limited per client IP before they reach any handler.
use crate::error::{YggError, YggResult};
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};
use tokio::task::JoinHandle;

const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Per-client rate limiter
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<DefaultKeyedRateLimiter<IpAddr>>,
}

impl RateLimiter {
    /// Allow `requests_per_second` per client, with bursts of up to one
    /// second's worth
    pub fn new(requests_per_second: f64) -> YggResult<Self> {
        if !(requests_per_second > 0.0) || !requests_per_second.is_finite() {
            return Err(YggError::Config(format!(
                "Invalid requests_per_second: {}",
                requests_per_second
            )));
        }

        let period = Duration::from_secs_f64(1.0 / requests_per_second);
        let burst = NonZeroU32::new(requests_per_second.ceil() as u32).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(period)
            .ok_or_else(|| YggError::Config("Rate limit period is zero".to_string()))?
            .allow_burst(burst);

        Ok(Self {
            limiter: Arc::new(DefaultKeyedRateLimiter::keyed(quota)),
        })
    }

    /// Check rate limit for a client
    pub fn check(&self, client: IpAddr) -> YggResult<()> {
        self.limiter
            .check_key(&client)
            .map_err(|_| YggError::RateLimitExceeded)
    }

    /// Forget clients whose quota has fully replenished
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of clients currently tracked
    pub fn len(&self) -> usize {
        self.limiter.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiter.is_empty()
    }

    /// Prune idle clients periodically for the life of the process
    pub fn spawn_pruner(&self) -> JoinHandle<()> {
        let limiter = self.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PRUNE_INTERVAL);

            loop {
                interval.tick().await;
                let before = limiter.len();
                limiter.prune();
                let pruned = before.saturating_sub(limiter.len());
                tracing::debug!("Rate limiter pruned {} idle clients", pruned);
            }
        })
    }
}

/// Rate limiting middleware
///
/// Requests without connection info share one bucket.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if let Err(e) = limiter.check(client) {
        tracing::debug!("Rate limited {}", client);
        return e.into_response();
    }

    next.run(request).await
}
