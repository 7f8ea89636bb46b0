//! Login and logout

use std::sync::Arc;

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::credentials::Persistence;
use crate::http::ApiClient;
use crate::AdminError;

pub const LOGIN_FAILED: &str = "Login failed";
pub const LOGIN_NETWORK_ERROR: &str = "Network error. Try again.";

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginData {
    token: Option<String>,
}

/// Current session as seen from local storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub logged_in: bool,
    pub persistence: Option<PersistenceLabel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceLabel {
    Durable,
    Session,
}

impl From<Persistence> for PersistenceLabel {
    fn from(p: Persistence) -> Self {
        match p {
            Persistence::Durable => Self::Durable,
            Persistence::Session => Self::Session,
        }
    }
}

/// Login form controller
pub struct AuthController {
    client: Arc<ApiClient>,
}

impl AuthController {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    /// Exchange email and password for a bearer token.
    ///
    /// The token goes to the durable tier when `remember_me` is set and to
    /// the session tier otherwise. The request goes through the usual
    /// pipeline, so a failed call is also announced globally; the returned
    /// error is the form's own message.
    pub async fn login(
        &self,
        email: &str,
        password: &SecretString,
        remember_me: bool,
    ) -> crate::Result<Persistence> {
        let body = serde_json::to_value(LoginBody {
            email: email.trim(),
            password: password.expose_secret(),
        })?;
        let request = self
            .client
            .request(Method::POST, "/auth/login")
            .json(body);

        let envelope = match self.client.send::<Value>(request).await {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(email = %email, error = %err, "login request failed");
                return Err(match err.server_message() {
                    Some(message) => AdminError::Rejected(message.to_string()),
                    None => AdminError::Rejected(LOGIN_NETWORK_ERROR.to_string()),
                });
            }
        };

        let message = envelope.message_or(LOGIN_FAILED);
        let success = envelope.success;
        let token = envelope
            .decode::<LoginData>()
            .ok()
            .and_then(|e| e.data)
            .and_then(|d| d.token)
            .filter(|t| !t.trim().is_empty());

        let token = match token {
            Some(token) if success => token,
            _ => {
                tracing::info!(email = %email, "login rejected");
                return Err(AdminError::Rejected(message));
            }
        };

        self.client.credentials().set(&token, remember_me)?;
        let persistence = Persistence::from_remember_me(remember_me);
        tracing::info!(email = %email, persistence = ?persistence, "logged in");
        Ok(persistence)
    }

    /// Forget the stored token
    pub fn logout(&self) -> crate::Result<()> {
        self.client.credentials().clear()?;
        tracing::info!("logged out");
        Ok(())
    }

    pub fn status(&self) -> crate::Result<SessionStatus> {
        let persistence = self.client.credentials().persistence()?;
        Ok(SessionStatus {
            logged_in: persistence.is_some(),
            persistence: persistence.map(PersistenceLabel::from),
        })
    }
}
