//! HTTP client core
//!
//! `ApiClient` is the single shared request executor. Every call runs
//! through the same pipeline:
//!
//! 1. request stage: attach `Authorization: Bearer <token>` when a
//!    credential exists, default `Content-Type` to JSON
//! 2. transport
//! 3. response stage: success passes through; a failure is classified,
//!    announced once through the notifier, its side effect applied, and
//!    then returned to the caller
//!
//! The client is built once at startup and shared by `Arc`.

mod envelope;
pub mod transport;

pub use envelope::{normalize_page, Envelope, Page};
pub use transport::{
    ApiRequest, FilePart, MultipartForm, RawResponse, RequestBody, ReqwestTransport, Transport,
    TransportError,
};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::classifier::{self, Classification, ClassifierPolicy, Failure, SideEffect};
use crate::config::ApiConfig;
use crate::credentials::CredentialStore;
use crate::notify::{Notice, Notifier};
use crate::storage::StorageError;

/// Errors returned by the client core
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("no response: {0}")]
    NoResponse(#[from] TransportError),

    #[error("server returned HTTP {status}")]
    Status {
        status: u16,
        message: Option<String>,
    },

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    Request(String),

    #[error("credential storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ApiError {
    pub(crate) fn from_status(status: u16, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<Value>(body)
            .ok()
            .and_then(|v| classifier::server_message(&v));
        Self::Status { status, message }
    }

    /// The classifier's view of this error, if it is a request failure
    pub fn failure(&self) -> Option<Failure<'_>> {
        match self {
            Self::NoResponse(_) => Some(Failure::NoResponse),
            Self::Status { status, message } => Some(Failure::Status {
                status: *status,
                server_message: message.as_deref(),
            }),
            Self::Decode(_) | Self::Request(_) | Self::Storage(_) => None,
        }
    }

    /// HTTP status, if a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Message the server attached to an error response
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

/// Decrements the in-flight counter when dropped
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Session-aware API client
pub struct ApiClient {
    base_url: String,
    transport: Arc<dyn Transport>,
    credentials: Arc<CredentialStore>,
    notifier: Arc<dyn Notifier>,
    policy: ClassifierPolicy,
    in_flight: AtomicUsize,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        transport: Arc<dyn Transport>,
        credentials: Arc<CredentialStore>,
        notifier: Arc<dyn Notifier>,
        policy: ClassifierPolicy,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            transport,
            credentials,
            notifier,
            policy,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Build a client from the `[api]` config section
    pub fn from_config(
        config: &ApiConfig,
        transport: Arc<dyn Transport>,
        credentials: Arc<CredentialStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::new(
            config.base_url.clone(),
            transport,
            credentials,
            notifier,
            ClassifierPolicy {
                clear_credentials_on_auth_failure: config.clear_credentials_on_auth_failure,
            },
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Whether any request is currently in flight
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Absolute URL for an API path
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// Start a request against an API path
    pub fn request(&self, method: Method, path: &str) -> ApiRequest {
        ApiRequest::new(method, self.url(path))
    }

    /// Run a request through the pipeline and decode the envelope
    pub async fn send<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<Envelope<T>, ApiError> {
        let raw = self.dispatch(request).await?;
        serde_json::from_slice(&raw.body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Run a request through the pipeline without decoding
    pub async fn dispatch(&self, request: ApiRequest) -> Result<RawResponse, ApiError> {
        let silent = request.silent;
        let request = self.prepare(request)?;

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            authorized = request.headers.contains_key(AUTHORIZATION),
            "dispatching request"
        );

        let result = {
            let _guard = InFlight::enter(&self.in_flight);
            match self.transport.send(request).await {
                Ok(raw) if raw.is_success() => Ok(raw),
                Ok(raw) => Err(ApiError::from_status(raw.status, &raw.body)),
                Err(e) => Err(ApiError::NoResponse(e)),
            }
        };

        if let Err(err) = &result {
            if !silent {
                self.report_failure(err);
            }
        }

        result
    }

    /// Response failure stage: classify, notify, apply the side effect.
    ///
    /// Returns `None` for errors that are not request failures (decode or
    /// local errors), which are left to the caller.
    pub fn report_failure(&self, err: &ApiError) -> Option<Classification> {
        self.handle_failure(err, true)
    }

    /// Failure stage with the notification optional; the side effect is
    /// always applied.
    pub fn handle_failure(&self, err: &ApiError, announce: bool) -> Option<Classification> {
        let failure = err.failure()?;
        let classification = classifier::classify(&failure, &self.policy);

        tracing::warn!(
            error = %err,
            status = ?err.status(),
            message = %classification.message,
            announce,
            "request failed"
        );
        if announce {
            self.notifier.notify(&Notice::error(classification.message.clone()));
        }

        if let Some(SideEffect::ClearSession) = classification.side_effect {
            match self.credentials.clear() {
                Ok(()) => tracing::info!("credentials cleared after auth failure"),
                Err(e) => tracing::error!(error = %e, "failed to clear credentials"),
            }
        }

        Some(classification)
    }

    /// Request stage
    fn prepare(&self, mut request: ApiRequest) -> Result<ApiRequest, ApiError> {
        if request.with_credentials {
            if let Some(token) = self.credentials.get()? {
                let bearer = format!("Bearer {}", token.expose_secret());
                let mut value = HeaderValue::from_str(&bearer).map_err(|_| {
                    ApiError::Request("token is not a valid header value".into())
                })?;
                value.set_sensitive(true);
                request.headers.insert(AUTHORIZATION, value);
            }
        }

        let multipart = matches!(request.body, RequestBody::Multipart(_));
        if !multipart && !request.headers.contains_key(CONTENT_TYPE) {
            request
                .headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        Ok(request)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Envelope<T>, ApiError> {
        let request = with_query(self.request(Method::GET, path), query);
        self.send(request).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Envelope<T>, ApiError> {
        let request = self.request(Method::POST, path).json(to_body(body)?);
        self.send(request).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<Envelope<T>, ApiError> {
        let request = with_query(self.request(Method::PUT, path), query).json(to_body(body)?);
        self.send(request).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Envelope<T>, ApiError> {
        let request = with_query(self.request(Method::DELETE, path), query);
        self.send(request).await
    }
}

fn with_query(mut request: ApiRequest, query: &[(&str, String)]) -> ApiRequest {
    for (key, value) in query {
        request = request.query(*key, value);
    }
    request
}

fn to_body<B: Serialize + ?Sized>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::Request(e.to_string()))
}
