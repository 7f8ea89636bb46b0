//! Transport trait and the reqwest implementation
//!
//! The client core never talks to reqwest directly; it hands a fully
//! prepared `ApiRequest` to a `Transport`. This keeps the interceptor
//! pipeline testable with a scripted transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;

/// Errors where no HTTP response was received
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("request could not be built: {0}")]
    Request(String),
}

/// Request body variants
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(MultipartForm),
}

/// A multipart form (text fields plus file parts)
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    pub text: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

/// A file attached to a multipart form
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.text.push((name.into(), value.into()));
        self
    }

    pub fn file(mut self, part: FilePart) -> Self {
        self.files.push(part);
        self
    }

    /// Value of a text field
    pub fn text_value(&self, name: &str) -> Option<&str> {
        self.text
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn into_reqwest(self) -> Result<reqwest::multipart::Form, TransportError> {
        let mut form = reqwest::multipart::Form::new();
        for (name, value) in self.text {
            form = form.text(name, value);
        }
        for file in self.files {
            let mut part =
                reqwest::multipart::Part::bytes(file.bytes).file_name(file.file_name);
            if let Some(content_type) = file.content_type {
                part = part
                    .mime_str(&content_type)
                    .map_err(|e| TransportError::Request(e.to_string()))?;
            }
            form = form.part(file.field, part);
        }
        Ok(form)
    }
}

/// An outgoing request
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: RequestBody,
    /// Attach the bearer token and send cookies
    pub with_credentials: bool,
    /// Skip the global failure notification; the caller reports instead
    pub silent: bool,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            with_credentials: true,
            silent: false,
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    /// Send without credentials (no bearer token, no cookies)
    pub fn anonymous(mut self) -> Self {
        self.with_credentials = false;
        self
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Value of a query parameter
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A received response, before envelope decoding
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport trait for executing requests
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute a request and return the raw response
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError>;
}

/// Transport backed by reqwest.
///
/// Holds two clients: credentialed requests go through one with a cookie
/// store, anonymous requests through one without.
pub struct ReqwestTransport {
    credentialed: reqwest::Client,
    anonymous: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with an optional request timeout
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut credentialed = reqwest::Client::builder().cookie_store(true);
        let mut anonymous = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            credentialed = credentialed.timeout(timeout);
            anonymous = anonymous.timeout(timeout);
        }

        Ok(Self {
            credentialed: credentialed
                .build()
                .map_err(|e| TransportError::Request(e.to_string()))?,
            anonymous: anonymous
                .build()
                .map_err(|e| TransportError::Request(e.to_string()))?,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        let client = if request.with_credentials {
            &self.credentialed
        } else {
            &self.anonymous
        };

        let mut builder = client
            .request(request.method, &request.url)
            .headers(request.headers);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(form) => builder.multipart(form.into_reqwest()?),
        };

        let response = builder.send().await.map_err(map_transport_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_transport_error)?;

        Ok(RawResponse {
            status,
            body: body.to_vec(),
        })
    }
}

fn map_transport_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_builder() {
        TransportError::Request(error.to_string())
    } else {
        TransportError::Connect(error.to_string())
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted {
        delay: Duration,
        result: Result<RawResponse, TransportError>,
    }

    /// Scripted transport for testing.
    ///
    /// Responses are handed out in the order requests arrive. When the
    /// script runs dry every request fails with a connection error.
    #[derive(Default)]
    pub struct MockTransport {
        script: Mutex<VecDeque<Scripted>>,
        requests: Mutex<Vec<ApiRequest>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_json(&self, status: u16, body: Value) {
            self.push_delayed_json(Duration::ZERO, status, body);
        }

        pub fn push_delayed_json(&self, delay: Duration, status: u16, body: Value) {
            self.script.lock().unwrap().push_back(Scripted {
                delay,
                result: Ok(RawResponse {
                    status,
                    body: serde_json::to_vec(&body).unwrap(),
                }),
            });
        }

        pub fn push_raw(&self, status: u16, body: &str) {
            self.script.lock().unwrap().push_back(Scripted {
                delay: Duration::ZERO,
                result: Ok(RawResponse {
                    status,
                    body: body.as_bytes().to_vec(),
                }),
            });
        }

        pub fn push_error(&self, error: TransportError) {
            self.script.lock().unwrap().push_back(Scripted {
                delay: Duration::ZERO,
                result: Err(error),
            });
        }

        pub fn requests(&self) -> Vec<ApiRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn last_request(&self) -> Option<ApiRequest> {
            self.requests.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
            self.requests.lock().unwrap().push(request);
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(scripted) => {
                    if !scripted.delay.is_zero() {
                        tokio::time::sleep(scripted.delay).await;
                    }
                    scripted.result
                }
                None => Err(TransportError::Connect("no scripted response".into())),
            }
        }
    }
}
