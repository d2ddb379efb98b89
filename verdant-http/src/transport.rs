use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use verdant_core::ClientError;

/// A request relative to the configured API origin.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path segments below the API origin, unencoded.
    pub segments: Vec<String>,
    /// Readable form of `segments`, e.g. `plants/64f1c0`. A `/` or `%`
    /// inside a segment is shown percent-encoded.
    pub path: String,
    pub body: Option<Value>,
    /// Whether the bearer credential must be attached.
    pub authenticated: bool,
}

impl ApiRequest {
    /// `route` is a fixed path such as `users/role`; dynamic parts are
    /// appended with [`segment`](Self::segment).
    pub fn get(route: &str) -> Self {
        Self::new(Method::GET, route, None)
    }

    pub fn post(route: &str, body: Value) -> Self {
        Self::new(Method::POST, route, Some(body))
    }

    fn new(method: Method, route: &str, body: Option<Value>) -> Self {
        let mut request = Self {
            method,
            segments: Vec::new(),
            path: String::new(),
            body,
            authenticated: false,
        };
        for part in route.split('/').filter(|part| !part.is_empty()) {
            request = request.segment(part);
        }
        request
    }

    /// Append one path segment. The value is never split, whatever it contains.
    pub fn segment(mut self, value: &str) -> Self {
        if !self.path.is_empty() {
            self.path.push('/');
        }
        self.path.push_str(&value.replace('%', "%25").replace('/', "%2F"));
        self.segments.push(value.to_string());
        self
    }

    pub fn authenticated(mut self) -> Self {
        self.authenticated = true;
        self
    }
}

/// Raw response: status plus undecoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json_body(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Map a non-2xx status to the matching [`ClientError`]: 401 and 403
    /// become `Auth`, anything else `Server`.
    pub fn error_for_status(self) -> Result<Self, ClientError> {
        if self.is_success() {
            return Ok(self);
        }
        let message = error_message(&self.body, self.status);
        match self.status {
            401 | 403 => Err(ClientError::Auth(message)),
            status => Err(ClientError::Server { status, message }),
        }
    }

    /// Decode the body. A body that does not match `T` is a server fault.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_slice(&self.body).map_err(|e| ClientError::Server {
            status: self.status,
            message: format!("Malformed response body: {e}"),
        })
    }
}

fn error_message(body: &[u8], status: u16) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
        for field in ["message", "error"] {
            if let Some(Value::String(msg)) = map.get(field) {
                return msg.clone();
            }
        }
    }
    match std::str::from_utf8(body).map(str::trim) {
        Ok(text) if !text.is_empty() => text.to_string(),
        _ => reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown status")
            .to_string(),
    }
}

pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<ApiResponse, ClientError>> + Send + 'a>>;

/// Sends [`ApiRequest`]s to the remote API.
///
/// Implementations return every HTTP response as `Ok`, whatever its status;
/// only failures to obtain a response (and missing credentials on an
/// authenticated request) are errors.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: ApiRequest) -> TransportFuture<'_>;
}

/// Source of the bearer credential for authenticated requests.
pub trait CredentialProvider: Send + Sync + 'static {
    fn token(&self) -> Option<String>;
}

/// A fixed credential, e.g. `api.token` from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials(Option<String>);

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl CredentialProvider for StaticCredentials {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn segments_are_kept_whole() {
        let request = ApiRequest::get("/users/role/").segment("a/b@x.com");
        assert_eq!(request.segments, ["users", "role", "a/b@x.com"]);
        assert_eq!(request.path, "users/role/a%2Fb@x.com");
    }

    #[test]
    fn auth_statuses_map_to_auth_errors() {
        let err = ApiResponse::json_body(401, &json!({"message": "unauthorized access"}))
            .error_for_status()
            .unwrap_err();
        assert_eq!(err, ClientError::Auth("unauthorized access".into()));

        let err = ApiResponse::new(403, "").error_for_status().unwrap_err();
        assert_eq!(err, ClientError::Auth("Forbidden".into()));
    }

    #[test]
    fn other_statuses_map_to_server_errors() {
        let err = ApiResponse::new(502, "upstream down").error_for_status().unwrap_err();
        assert_eq!(
            err,
            ClientError::Server { status: 502, message: "upstream down".into() }
        );
    }

    #[test]
    fn success_passes_through() {
        let response = ApiResponse::new(201, "{}");
        assert_eq!(response.clone().error_for_status(), Ok(response));
    }

    #[test]
    fn malformed_body_is_a_server_error() {
        let err = ApiResponse::new(200, "<html>").json::<Vec<u32>>().unwrap_err();
        assert!(matches!(err, ClientError::Server { status: 200, .. }));
    }
}
