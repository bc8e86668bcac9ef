//! JSON over HTTPS against Azure Resource Manager.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use super::auth::{Credential, TokenProvider};
use super::error::ArmError;

/// Maximum length of a response body written to the log.
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Truncate a response body for logging and strip control characters.
fn sanitize_for_log(body: &str) -> String {
    let truncated: String = body.chars().take(MAX_LOG_BODY_LENGTH).collect();
    let mut sanitized: String = truncated
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .collect();
    if body.chars().count() > MAX_LOG_BODY_LENGTH {
        sanitized.push_str(&format!("... [truncated, {} bytes total]", body.len()));
    }
    sanitized
}

/// A raw ARM response.
#[derive(Debug, Clone)]
pub struct ArmResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers (polling URLs, `Retry-After`).
    pub headers: HeaderMap,
    /// Parsed JSON body, `None` when empty.
    pub body: Option<Value>,
}

impl ArmResponse {
    /// A header value as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `Retry-After` delay in seconds, when present.
    pub fn retry_after(&self) -> Option<Duration> {
        self.header("Retry-After")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

/// An authenticated ARM client.
#[derive(Clone)]
pub struct ArmClient {
    http: Client,
    endpoint: Url,
    tokens: TokenProvider,
    poll_interval: Duration,
}

impl ArmClient {
    /// Create a client for `endpoint` (e.g. `https://management.azure.com/`).
    pub fn new(
        endpoint: Url,
        credential: Credential,
        poll_interval: Duration,
    ) -> Result<Self, ArmError> {
        let http = Client::builder()
            .user_agent(concat!("hemmer-provider-azurerm/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let tokens = TokenProvider::new(http.clone(), credential, endpoint.clone());
        Ok(Self {
            http,
            endpoint,
            tokens,
            poll_interval,
        })
    }

    /// Default delay between polls of a long running operation.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Resolve an ARM path (`/subscriptions/...`) with its `api-version`.
    pub fn url(&self, path: &str, api_version: &str) -> Result<Url, ArmError> {
        let mut url = self.endpoint.join(path.trim_start_matches('/'))?;
        url.query_pairs_mut().append_pair("api-version", api_version);
        Ok(url)
    }

    /// Send a request and fail on any non-2xx status.
    pub async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<ArmResponse, ArmError> {
        tracing::debug!(method = %method, url = %url, "ARM request");

        let token = self.tokens.token().await?;
        let mut request = self.http.request(method.clone(), url.clone()).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let text = response.text().await?;

        if !(200..300).contains(&status) {
            if status != 404 {
                tracing::debug!(
                    method = %method,
                    url = %url,
                    status,
                    body = %sanitize_for_log(&text),
                    "ARM request failed"
                );
            }
            return Err(ArmError::from_response(status, &text));
        }

        let body = if text.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(&text)?)
        };
        Ok(ArmResponse {
            status,
            headers,
            body,
        })
    }

    /// GET a resource; `None` when ARM answers 404.
    pub async fn get(&self, path: &str, api_version: &str) -> Result<Option<Value>, ArmError> {
        let url = self.url(path, api_version)?;
        match self.send::<Value>(Method::GET, url, None).await {
            Ok(response) => Ok(Some(response.body.unwrap_or(Value::Null))),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// GET an absolute URL, such as a polling URL handed out by ARM.
    pub async fn get_url(&self, url: &str) -> Result<ArmResponse, ArmError> {
        let url = Url::parse(url)?;
        self.send::<Value>(Method::GET, url, None).await
    }

    /// PUT a resource without waiting for provisioning to finish.
    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        api_version: &str,
        body: &B,
    ) -> Result<ArmResponse, ArmError> {
        let url = self.url(path, api_version)?;
        self.send(Method::PUT, url, Some(body)).await
    }

    /// PUT a resource and wait for the operation to finish.
    pub async fn put_and_wait<B: Serialize + ?Sized>(
        &self,
        path: &str,
        api_version: &str,
        body: &B,
    ) -> Result<Option<Value>, ArmError> {
        let response = self.put(path, api_version, body).await?;
        super::lro::wait(self, Method::PUT, path, api_version, response).await
    }

    /// PATCH a resource and wait for the operation to finish.
    pub async fn patch_and_wait<B: Serialize + ?Sized>(
        &self,
        path: &str,
        api_version: &str,
        body: &B,
    ) -> Result<Option<Value>, ArmError> {
        let url = self.url(path, api_version)?;
        let response = self.send(Method::PATCH, url, Some(body)).await?;
        super::lro::wait(self, Method::PATCH, path, api_version, response).await
    }

    /// POST an action (e.g. `listKeys`) and return its body.
    pub async fn post(
        &self,
        path: &str,
        api_version: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, ArmError> {
        let url = self.url(path, api_version)?;
        let response = self.send(Method::POST, url, body).await?;
        super::lro::wait(self, Method::POST, path, api_version, response).await
    }

    /// DELETE a resource without waiting.
    pub async fn delete(&self, path: &str, api_version: &str) -> Result<ArmResponse, ArmError> {
        let url = self.url(path, api_version)?;
        self.send::<Value>(Method::DELETE, url, None).await
    }

    /// DELETE a resource and wait for the operation to finish.
    ///
    /// A resource that is already gone counts as deleted.
    pub async fn delete_and_wait(&self, path: &str, api_version: &str) -> Result<(), ArmError> {
        let response = match self.delete(path, api_version).await {
            Ok(response) => response,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err),
        };
        match super::lro::wait(self, Method::DELETE, path, api_version, response).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) async fn client_for(server: &MockServer) -> ArmClient {
        Mock::given(method("POST"))
            .and(path("/tenant/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "token",
                "expires_in": 3600
            })))
            .mount(server)
            .await;
        let base = Url::parse(&format!("{}/", server.uri())).unwrap();
        ArmClient::new(
            base.clone(),
            Credential::ClientSecret {
                authority_host: base,
                tenant_id: "tenant".into(),
                client_id: "client".into(),
                client_secret: "secret".into(),
            },
            Duration::ZERO,
        )
        .unwrap()
    }

    #[test]
    fn test_sanitize_for_log() {
        assert_eq!(sanitize_for_log("short\nbody"), "shortbody");
        let long = "x".repeat(300);
        let sanitized = sanitize_for_log(&long);
        assert!(sanitized.starts_with(&"x".repeat(200)));
        assert!(sanitized.ends_with("[truncated, 300 bytes total]"));
    }

    #[tokio::test]
    async fn test_get_sends_bearer_and_api_version() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("GET"))
            .and(path("/subscriptions/sub/resourceGroups/rg"))
            .and(query_param("api-version", "2024-01-01"))
            .and(header("Authorization", "Bearer token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"name": "rg"})),
            )
            .mount(&server)
            .await;

        let body = client
            .get("/subscriptions/sub/resourceGroups/rg", "2024-01-01")
            .await
            .unwrap();
        assert_eq!(body, Some(serde_json::json!({"name": "rg"})));
    }

    #[tokio::test]
    async fn test_get_not_found_is_none() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": {"code": "ResourceNotFound", "message": "not found"}
            })))
            .mount(&server)
            .await;

        assert_eq!(client.get("/subscriptions/sub", "2024-01-01").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_error_envelope_is_surfaced() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"code": "InvalidSku", "message": "sku is invalid"}
            })))
            .mount(&server)
            .await;

        let err = client
            .put("/subscriptions/sub/x", "2024-01-01", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert!(err.to_string().contains("InvalidSku: sku is invalid"));
    }

    #[tokio::test]
    async fn test_delete_missing_resource_succeeds() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        client.delete_and_wait("/subscriptions/sub/x", "2024-01-01").await.unwrap();
    }
}
