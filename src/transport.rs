//! HTTP request/response values and the transport seam.
//!
//! Requests are plain values so bundles can prepare them without touching the
//! network. The session hands them to a [`Transport`], which is `ureq` in
//! production and a scripted mock in tests.

use std::fmt;
use std::time::Duration;

use log::debug;
use serde_json::Value;

use crate::error::{CslError, HttpError, Result};

/// Name of the cookie carrying the authenticated session.
pub const SESSION_COOKIE: &str = "session-id";

/// HTTP verbs used by the database API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Bytes { content_type: String, data: Vec<u8> },
}

/// A prepared request. Building one never performs I/O.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// API path such as `/api/tracks`, or an absolute URL.
    pub target: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::Get, target)
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::Post, target)
    }

    pub fn put(target: impl Into<String>) -> Self {
        Self::new(Method::Put, target)
    }

    pub fn delete(target: impl Into<String>) -> Self {
        Self::new(Method::Delete, target)
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn with_bytes(mut self, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        self.body = RequestBody::Bytes {
            content_type: content_type.into(),
            data,
        };
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Returns true when `target` is a full URL rather than an API path.
    pub fn is_absolute(&self) -> bool {
        self.target.starts_with("http://") || self.target.starts_with("https://")
    }

    /// JSON body, if any.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            RequestBody::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Value of a query parameter, if present.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Resolves the request target against a base URL.
    pub fn url(&self, base_url: &str) -> String {
        if self.is_absolute() {
            return self.target.clone();
        }
        format!(
            "{}/{}",
            base_url.trim().trim_end_matches('/'),
            self.target.trim_start_matches('/')
        )
    }

    /// Full URL including the encoded query string.
    pub fn url_with_query(&self, base_url: &str) -> String {
        let url = self.url(base_url);
        if self.query.is_empty() {
            return url;
        }
        let query: Vec<String> = self
            .query
            .iter()
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(key),
                    urlencoding::encode(value)
                )
            })
            .collect();
        format!("{url}?{}", query.join("&"))
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.target)
    }
}

/// A received response. Non-2xx statuses are responses, not errors.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
    pub set_cookies: Vec<String>,
    /// `METHOD target` of the request that produced this response.
    pub origin: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            set_cookies: Vec::new(),
            origin: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses the body as JSON. An empty body is `null`.
    pub fn json(&self) -> Result<Value> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&self.body).map_err(|err| CslError::MalformedResponse {
            entity: "json",
            reason: format!("{} response is not JSON: {err}", self.origin),
            payload: Value::String(self.body.clone()),
        })
    }

    /// Converts a non-2xx response into a status error.
    pub fn error_for_status(self) -> std::result::Result<Self, HttpError> {
        if self.is_success() {
            return Ok(self);
        }
        let (method, url) = self
            .origin
            .split_once(' ')
            .map(|(method, url)| (method.to_string(), url.to_string()))
            .unwrap_or_else(|| (String::new(), self.origin.clone()));
        Err(HttpError::Status {
            method,
            url,
            status: self.status,
            body: self.body,
        })
    }

    /// Value of a cookie set by this response.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.set_cookies.iter().find_map(|header| {
            let pair = header.split(';').next()?;
            let (key, value) = pair.split_once('=')?;
            (key.trim() == name).then(|| value.trim().to_string())
        })
    }

    /// First entry of the server's `errors.generalErrors` array.
    pub fn general_error(&self) -> Option<String> {
        let payload = self.json().ok()?;
        payload
            .get("errors")
            .and_then(|errors| errors.get("generalErrors"))
            .and_then(|general| general.get(0))
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
    }
}

/// Interface implemented by concrete request executors.
pub trait Transport {
    /// Sends one request and waits for its response.
    fn send(&mut self, request: &ApiRequest) -> std::result::Result<ApiResponse, HttpError>;

    /// Sends several requests; results keep request order.
    fn send_all(
        &mut self,
        requests: &[ApiRequest],
    ) -> Vec<std::result::Result<ApiResponse, HttpError>> {
        requests.iter().map(|request| self.send(request)).collect()
    }

    /// Releases the underlying connection.
    fn close(&mut self) {}
}

/// Production transport backed by `ureq`.
pub struct UreqTransport {
    /// `None` once the transport has been closed.
    http_client: Option<ureq::Agent>,
    base_url: String,
}

impl UreqTransport {
    /// Creates a transport rooted at `base_url`.
    pub fn new(base_url: &str, connect_timeout: Duration, read_timeout: Duration) -> Self {
        let http_client = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(read_timeout)
            .timeout_write(read_timeout)
            .build();
        Self {
            http_client: Some(http_client),
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_closed(&self) -> bool {
        self.http_client.is_none()
    }

    fn closed_error(&self, request: &ApiRequest) -> HttpError {
        HttpError::Transport {
            method: request.method.to_string(),
            url: request.url(&self.base_url),
            reason: "transport is closed".to_string(),
        }
    }

    fn execute(
        http_client: &ureq::Agent,
        base_url: &str,
        request: &ApiRequest,
    ) -> std::result::Result<ApiResponse, HttpError> {
        let url = request.url(base_url);
        let origin = format!("{} {}", request.method, url);
        let mut call = http_client.request(request.method.as_str(), &url);
        for (key, value) in &request.query {
            call = call.query(key, value);
        }
        for (key, value) in &request.headers {
            call = call.set(key, value);
        }
        debug!("Sending {} {}", request.method, request.url_with_query(base_url));
        let outcome = match &request.body {
            RequestBody::Empty => call.call(),
            RequestBody::Json(body) => call.send_json(body),
            RequestBody::Bytes { content_type, data } => {
                call.set("Content-Type", content_type).send_bytes(data)
            }
        };
        let response = match outcome {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(transport)) => {
                return Err(HttpError::Transport {
                    method: request.method.to_string(),
                    url,
                    reason: transport.to_string(),
                })
            }
        };
        let status = response.status();
        let set_cookies: Vec<String> = response
            .all("set-cookie")
            .into_iter()
            .map(ToOwned::to_owned)
            .collect();
        let body = response
            .into_string()
            .map_err(|err| HttpError::Transport {
                method: request.method.to_string(),
                url: url.clone(),
                reason: format!("failed to read response body: {err}"),
            })?;
        Ok(ApiResponse {
            status,
            body,
            set_cookies,
            origin,
        })
    }
}

impl Transport for UreqTransport {
    fn send(&mut self, request: &ApiRequest) -> std::result::Result<ApiResponse, HttpError> {
        match &self.http_client {
            Some(http_client) => Self::execute(http_client, &self.base_url, request),
            None => Err(self.closed_error(request)),
        }
    }

    fn send_all(
        &mut self,
        requests: &[ApiRequest],
    ) -> Vec<std::result::Result<ApiResponse, HttpError>> {
        if requests.len() <= 1 {
            return requests.iter().map(|request| self.send(request)).collect();
        }
        let Some(http_client) = &self.http_client else {
            return requests
                .iter()
                .map(|request| Err(self.closed_error(request)))
                .collect();
        };
        let base_url = self.base_url.as_str();
        std::thread::scope(|scope| {
            let handles: Vec<_> = requests
                .iter()
                .map(|request| scope.spawn(move || Self::execute(http_client, base_url, request)))
                .collect();
            handles
                .into_iter()
                .zip(requests)
                .map(|(handle, request)| {
                    handle.join().unwrap_or_else(|_| {
                        Err(HttpError::Transport {
                            method: request.method.to_string(),
                            url: request.url(base_url),
                            reason: "request worker panicked".to_string(),
                        })
                    })
                })
                .collect()
        })
    }

    fn close(&mut self) {
        if self.http_client.take().is_some() {
            debug!("Released connection pool for {}", self.base_url);
        }
    }
}
