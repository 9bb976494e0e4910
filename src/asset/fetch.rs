/// Remote skin/cape downloads
///
/// Remote URLs are untrusted: the body is streamed with a byte cap and the
/// whole request is bounded by the client timeout.
use crate::error::{YggError, YggResult};
use reqwest::Url;
use std::{net::IpAddr, time::Duration};

/// HTTP fetcher for user-supplied texture URLs
#[derive(Clone)]
pub struct RemoteFetcher {
    client: reqwest::Client,
    byte_limit: usize,
    allow_private_hosts: bool,
}

impl RemoteFetcher {
    /// Create a fetcher with the given request timeout and body cap
    pub fn new(timeout: Duration, byte_limit: usize) -> YggResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ygg-identity/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| YggError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            byte_limit,
            allow_private_hosts: false,
        })
    }

    /// Allow URLs that resolve to loopback, private or link-local addresses
    pub fn with_private_hosts(mut self, allow: bool) -> Self {
        self.allow_private_hosts = allow;
        self
    }

    /// Underlying HTTP client, shared with the upstream identity client
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Download `url` for the form field `field`
    ///
    /// Malformed URLs and oversized bodies are validation errors on `field`;
    /// connection failures and non-2xx responses are external fetch errors.
    pub async fn fetch(&self, field: &str, url: &str) -> YggResult<Vec<u8>> {
        let url = Url::parse(url.trim())
            .map_err(|e| YggError::validation(field, format!("invalid URL: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(YggError::validation(field, "URL must use http or https"));
        }
        if !self.allow_private_hosts {
            check_public_host(field, &url).await?;
        }

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| YggError::ExternalFetch(format!("Failed to fetch {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(YggError::ExternalFetch(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        if let Some(length) = response.content_length() {
            if length > self.byte_limit as u64 {
                return Err(self.too_large(field));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| YggError::ExternalFetch(format!("Failed to read {}: {}", url, e)))?
        {
            if body.len() + chunk.len() > self.byte_limit {
                return Err(self.too_large(field));
            }
            body.extend_from_slice(&chunk);
        }

        tracing::debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }

    fn too_large(&self, field: &str) -> YggError {
        YggError::validation(field, format!("image must be {} bytes or less", self.byte_limit))
    }
}

/// Reject URLs whose host resolves to a non-public address
///
/// The client resolves the name again when connecting, so a host that
/// changes its records in between is not caught here.
async fn check_public_host(field: &str, url: &Url) -> YggResult<()> {
    let host = url
        .host_str()
        .ok_or_else(|| YggError::validation(field, "URL has no host"))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let port = url.port_or_known_default().unwrap_or(80);

    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| YggError::ExternalFetch(format!("Failed to resolve {}: {}", host, e)))?;

    for addr in addrs {
        if !is_public(addr.ip()) {
            tracing::debug!("Refusing to fetch {} ({})", url, addr.ip());
            return Err(YggError::validation(field, "URL must point to a public host"));
        }
    }

    Ok(())
}

fn is_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            !(v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                || (a == 100 && (b & 0xc0) == 64))
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_public(IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            !(v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80)
        }
    }
}
