//! Access tokens for Azure Resource Manager.
//!
//! Supports a service principal with a client secret (OAuth2 client
//! credentials against Microsoft Entra ID) and managed identity through the
//! instance metadata endpoint. Tokens are cached and refreshed shortly before
//! they expire.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use url::Url;

use super::error::ArmError;

/// Refresh tokens this long before they expire.
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Used when the token response carries no usable lifetime.
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Default instance metadata token endpoint.
pub const DEFAULT_MSI_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

/// How the provider proves its identity.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// A service principal authenticating with a client secret.
    ClientSecret {
        /// Entra ID authority, e.g. `https://login.microsoftonline.com/`.
        authority_host: Url,
        /// Directory (tenant) ID.
        tenant_id: String,
        /// Application (client) ID.
        client_id: String,
        /// Client secret.
        client_secret: String,
    },
    /// A managed identity exposed through a metadata endpoint.
    ManagedIdentity {
        /// Token endpoint.
        endpoint: Url,
        /// Client ID of a user assigned identity; system assigned when unset.
        client_id: Option<String>,
    },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientSecret {
                authority_host,
                tenant_id,
                client_id,
                ..
            } => f
                .debug_struct("ClientSecret")
                .field("authority_host", &authority_host.as_str())
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .finish(),
            Self::ManagedIdentity {
                endpoint,
                client_id,
            } => f
                .debug_struct("ManagedIdentity")
                .field("endpoint", &endpoint.as_str())
                .field("client_id", client_id)
                .finish(),
        }
    }
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// Expiry with the refresh buffer already applied.
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Seconds arrive as a number from Entra ID and as a string from IMDS.
#[derive(Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(u64),
    Text(String),
}

impl Seconds {
    fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Number(n) => Some(Duration::from_secs(*n)),
            Self::Text(s) => s.parse().ok().map(Duration::from_secs),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<Seconds>,
}

/// Hands out bearer tokens for one ARM audience.
#[derive(Clone)]
pub struct TokenProvider {
    http: Client,
    credential: Credential,
    /// ARM endpoint the token is for, e.g. `https://management.azure.com/`.
    audience: Url,
    cache: Arc<RwLock<Option<CachedToken>>>,
}

impl TokenProvider {
    /// Create a token provider for the given ARM endpoint.
    pub fn new(http: Client, credential: Credential, audience: Url) -> Self {
        Self {
            http,
            credential,
            audience,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    /// A bearer token, from cache when still valid.
    pub async fn token(&self) -> Result<String, ArmError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching a new one");
            }
        }

        let mut cache = self.cache.write().await;
        // Another task may have refreshed while we waited for the write lock.
        if let Some(cached) = cache.as_ref().filter(|c| c.is_valid()) {
            return Ok(cached.token.clone());
        }

        let response = self.fetch().await?;
        let ttl = response
            .expires_in
            .as_ref()
            .and_then(Seconds::as_duration)
            .unwrap_or(DEFAULT_TOKEN_TTL);
        let expires_at = Instant::now() + ttl.saturating_sub(TOKEN_EXPIRY_BUFFER);

        tracing::debug!(ttl_secs = ttl.as_secs(), "Access token refreshed");
        *cache = Some(CachedToken {
            token: response.access_token.clone(),
            expires_at,
        });
        Ok(response.access_token)
    }

    async fn fetch(&self) -> Result<TokenResponse, ArmError> {
        let audience = self.audience.as_str().trim_end_matches('/');
        let request = match &self.credential {
            Credential::ClientSecret {
                authority_host,
                tenant_id,
                client_id,
                client_secret,
            } => {
                let url = authority_host
                    .join(&format!("{}/oauth2/v2.0/token", tenant_id))
                    .map_err(|e| ArmError::Auth(format!("building token URL: {}", e)))?;
                let scope = format!("{}/.default", audience);
                self.http.post(url).form(&[
                    ("grant_type", "client_credentials"),
                    ("client_id", client_id.as_str()),
                    ("client_secret", client_secret.as_str()),
                    ("scope", scope.as_str()),
                ])
            },
            Credential::ManagedIdentity {
                endpoint,
                client_id,
            } => {
                let resource = format!("{}/", audience);
                let mut query =
                    vec![("api-version", "2018-02-01"), ("resource", resource.as_str())];
                if let Some(client_id) = client_id {
                    query.push(("client_id", client_id.as_str()));
                }
                let url = Url::parse_with_params(endpoint.as_str(), &query)
                    .map_err(|e| ArmError::Auth(format!("building token URL: {}", e)))?;
                self.http.get(url).header("Metadata", "true")
            },
        };

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            // Token endpoints echo request details; keep only the error code.
            let reason = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or_else(|| status.to_string());
            return Err(ArmError::Auth(format!(
                "token endpoint returned {}: {}",
                status.as_u16(),
                reason
            )));
        }
        serde_json::from_str(&body)
            .map_err(|e| ArmError::Auth(format!("decoding token response: {}", e)))
    }
}
