use std::sync::Arc;

use reqwest::Url;
use verdant_core::{ClientConfig, ClientError};

use crate::transport::{ApiRequest, ApiResponse, CredentialProvider, StaticCredentials, Transport, TransportFuture};

/// [`Transport`] over `reqwest`.
///
/// Requests are resolved below `api.url`; authenticated requests carry the
/// provider's token as a bearer credential and fail with `Auth` before
/// anything is sent when no token is available.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Transport(format!("Failed to build HTTP client: {e}")))?;
        let credentials: Arc<dyn CredentialProvider> = match &config.api_token {
            Some(token) => Arc::new(StaticCredentials::new(token.clone())),
            None => Arc::new(StaticCredentials::none()),
        };
        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            credentials,
        })
    }

    /// Replace the credential source (typically the identity provider).
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `request` below the base URL, percent-encoding each segment.
    pub fn url_for(&self, request: &ApiRequest) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Transport(format!("{} cannot be used as an API origin", self.base_url)))?
            .pop_if_empty()
            .extend(&request.segments);
        Ok(url)
    }

    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let url = self.url_for(&request)?;
        let mut builder = self.client.request(request.method.clone(), url);
        if request.authenticated {
            let token = self
                .credentials
                .token()
                .ok_or_else(|| ClientError::Auth("No credentials for a protected request".into()))?;
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(method = %request.method, path = %request.path, error = %e, "request failed");
            ClientError::Transport(e.to_string())
        })?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::Transport(format!("Failed to read response body: {e}")))?;
        tracing::debug!(method = %request.method, path = %request.path, status, "request completed");
        Ok(ApiResponse { status, body })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
        Box::pin(self.execute(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(url: &str) -> HttpTransport {
        HttpTransport::new(&ClientConfig::new(url.parse().unwrap())).unwrap()
    }

    #[test]
    fn joins_below_origin() {
        let t = transport("http://localhost:5000");
        assert_eq!(t.url_for(&ApiRequest::get("plants")).unwrap().as_str(), "http://localhost:5000/plants");
        assert_eq!(
            t.url_for(&ApiRequest::get("/plants").segment("42")).unwrap().as_str(),
            "http://localhost:5000/plants/42"
        );
    }

    #[test]
    fn keeps_base_path() {
        let t = transport("https://api.example.com/v1/");
        assert_eq!(
            t.url_for(&ApiRequest::get("users/role").segment("a@x.com")).unwrap().as_str(),
            "https://api.example.com/v1/users/role/a@x.com"
        );
    }

    #[test]
    fn encodes_segments() {
        let t = transport("http://localhost:5000");
        let request = ApiRequest::get("users/role").segment("a b/c@x.com");
        assert_eq!(
            t.url_for(&request).unwrap().as_str(),
            "http://localhost:5000/users/role/a%20b%2Fc@x.com"
        );
    }
}
