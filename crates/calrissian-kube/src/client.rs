//! Main client implementation.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use url::Url;

use crate::api::{BatchV1Api, CoreV1Api, CustomObjectsApi};
use crate::error::{Error, Result};
use crate::types::Status;

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Kubernetes API client.
///
/// Talks to the API server over its REST interface, authenticating with a
/// bearer token and trusting an optional cluster CA.
///
/// # Example
///
/// ```no_run
/// use calrissian_kube::KubeClient;
///
/// # async fn example() -> calrissian_kube::Result<()> {
/// let client = KubeClient::builder()
///     .base_url("https://10.0.0.1:6443")
///     .bearer_token("token")
///     .build()?;
///
/// let job = client.batch_v1("calrissian").read_job_status("job-123").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct KubeClient {
    inner: Arc<ClientInner>,
}

/// Inner client state (shared across clones).
pub(crate) struct ClientInner {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: Url,
    pub(crate) timeout: Duration,
}

impl std::fmt::Debug for KubeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}

impl KubeClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Get the API server URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Access the core/v1 API scoped to a namespace.
    pub fn core_v1(&self, namespace: &str) -> CoreV1Api {
        CoreV1Api::new(self.clone(), namespace)
    }

    /// Access the batch/v1 API scoped to a namespace.
    pub fn batch_v1(&self, namespace: &str) -> BatchV1Api {
        BatchV1Api::new(self.clone(), namespace)
    }

    /// Access namespaced custom resources.
    pub fn custom_objects(&self) -> CustomObjectsApi {
        CustomObjectsApi::new(self.clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal HTTP methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Build a URL for an API path.
    pub(crate) fn url(&self, path: &str) -> Result<Url> {
        let path = path.trim_start_matches('/');
        self.inner.base_url.join(path).map_err(Error::from)
    }

    /// Make a GET request.
    pub(crate) async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        tracing::debug!(%url, "GET");
        let response = self
            .inner
            .http
            .get(url)
            .timeout(self.inner.timeout)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Make a GET request with query parameters.
    pub(crate) async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        let url = self.url(path)?;
        tracing::debug!(%url, "GET");
        let response = self
            .inner
            .http
            .get(url)
            .query(query)
            .timeout(self.inner.timeout)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Make a GET request returning a plain-text body (pod logs).
    pub(crate) async fn get_text<Q>(&self, path: &str, query: &Q) -> Result<String>
    where
        Q: serde::Serialize + ?Sized,
    {
        let url = self.url(path)?;
        tracing::debug!(%url, "GET (text)");
        let response = self
            .inner
            .http
            .get(url)
            .query(query)
            .header(ACCEPT, "*/*")
            .timeout(self.inner.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.extract_error(response).await);
        }

        Ok(response.text().await?)
    }

    /// Make a POST request.
    pub(crate) async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let url = self.url(path)?;
        tracing::debug!(%url, "POST");
        let response = self
            .inner
            .http
            .post(url)
            .json(body)
            .timeout(self.inner.timeout)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Make a PUT request.
    pub(crate) async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let url = self.url(path)?;
        tracing::debug!(%url, "PUT");
        let response = self
            .inner
            .http
            .put(url)
            .json(body)
            .timeout(self.inner.timeout)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Make a DELETE request with a `DeleteOptions` body.
    pub(crate) async fn delete<B>(&self, path: &str, body: &B) -> Result<()>
    where
        B: serde::Serialize + ?Sized,
    {
        let url = self.url(path)?;
        tracing::debug!(%url, "DELETE");
        let response = self
            .inner
            .http
            .delete(url)
            .json(body)
            .timeout(self.inner.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.extract_error(response).await);
        }

        Ok(())
    }

    /// Handle a response, extracting the body or error.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(self.extract_error(response).await)
        }
    }

    /// Extract an error from a failed response.
    async fn extract_error(&self, response: reqwest::Response) -> Error {
        let status = response.status().as_u16();

        // The API server answers with a `Status` object; proxies may not.
        let body = response.json::<Status>().await.unwrap_or_default();
        let message = body.message.unwrap_or_else(|| format!("HTTP {}", status));

        match status {
            404 => Error::NotFound(message),
            409 => Error::Conflict(message),
            _ => Error::Api {
                status,
                reason: body.reason.unwrap_or_else(|| "Unknown".to_string()),
                message,
            },
        }
    }
}

/// Builder for creating a KubeClient.
#[derive(Debug)]
pub struct ClientBuilder {
    base_url: Option<String>,
    bearer_token: Option<String>,
    ca_certificate: Option<Vec<u8>>,
    client_identity: Option<Vec<u8>>,
    accept_invalid_certs: bool,
    timeout: Duration,
    user_agent: Option<String>,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: None,
            bearer_token: None,
            ca_certificate: None,
            client_identity: None,
            accept_invalid_certs: false,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
        }
    }

    /// Set the API server URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the bearer token.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Trust an additional PEM-encoded CA certificate.
    pub fn ca_certificate(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.ca_certificate = Some(pem.into());
        self
    }

    /// Authenticate with a client certificate: PEM holding the certificate
    /// chain and its private key.
    pub fn client_identity(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.client_identity = Some(pem.into());
        self
    }

    /// Skip TLS verification (`insecure-skip-tls-verify`).
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<KubeClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Config("base_url is required".to_string()))?;

        // Parse and normalize base URL
        let mut base_url = Url::parse(&base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = &self.bearer_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| Error::Config("Invalid bearer token".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("calrissian/{}", env!("CARGO_PKG_VERSION")));

        let mut http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .danger_accept_invalid_certs(self.accept_invalid_certs);

        if let Some(pem) = &self.ca_certificate {
            let cert = reqwest::Certificate::from_pem(pem)
                .map_err(|e| Error::Config(format!("Invalid CA certificate: {}", e)))?;
            http = http.add_root_certificate(cert);
        }

        if let Some(pem) = &self.client_identity {
            let identity = reqwest::Identity::from_pem(pem)
                .map_err(|e| Error::Config(format!("Invalid client certificate: {}", e)))?;
            http = http.identity(identity);
        }

        Ok(KubeClient {
            inner: Arc::new(ClientInner {
                http: http.build()?,
                base_url,
                timeout: self.timeout,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_base_url() {
        let result = ClientBuilder::new().build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_rejects_identity_without_key() {
        let result = ClientBuilder::new()
            .base_url("https://10.0.0.1:6443")
            .client_identity(b"not a pem bundle".to_vec())
            .build();
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("client certificate")));
    }

    #[test]
    fn test_builder_normalizes_trailing_slash() {
        let client = ClientBuilder::new()
            .base_url("https://10.0.0.1:6443")
            .build()
            .unwrap();
        assert_eq!(client.base_url().as_str(), "https://10.0.0.1:6443/");
    }

    #[test]
    fn test_url_building_keeps_server_prefix() {
        let client = ClientBuilder::new()
            .base_url("https://rancher.example.com/k8s/clusters/c-1")
            .build()
            .unwrap();

        let url = client.url("/api/v1/namespaces/ns").unwrap();
        assert_eq!(
            url.as_str(),
            "https://rancher.example.com/k8s/clusters/c-1/api/v1/namespaces/ns"
        );
    }
}
