//! Bearer token storage
//!
//! A token lives in exactly one of two tiers, chosen when it is written:
//! the durable tier ("remember me") or the session tier. Reads prefer the
//! durable tier. Tokens are opaque; there is no expiry tracking or refresh.

use std::sync::Arc;

use secrecy::SecretString;

use crate::storage::{KeyValueStore, StorageError};

/// Fixed key the token is stored under in both tiers
pub const TOKEN_KEY: &str = "token";

/// Which tier holds a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    /// Survives restarts
    Durable,
    /// Cleared when the process exits
    Session,
}

impl Persistence {
    /// Pick the tier from a "remember me" flag
    pub fn from_remember_me(remember_me: bool) -> Self {
        if remember_me {
            Self::Durable
        } else {
            Self::Session
        }
    }
}

/// Two-tier credential store
pub struct CredentialStore {
    durable: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(durable: Arc<dyn KeyValueStore>, session: Arc<dyn KeyValueStore>) -> Self {
        Self { durable, session }
    }

    /// Current token, durable tier first
    pub fn get(&self) -> Result<Option<SecretString>, StorageError> {
        Ok(self.lookup()?.map(|(token, _)| token))
    }

    /// Tier currently holding the token
    pub fn persistence(&self) -> Result<Option<Persistence>, StorageError> {
        Ok(self.lookup()?.map(|(_, tier)| tier))
    }

    /// Store a token in the durable tier if `durable`, else the session tier
    pub fn set(&self, token: &str, durable: bool) -> Result<(), StorageError> {
        let persistence = Persistence::from_remember_me(durable);
        let (target, other) = match persistence {
            Persistence::Durable => (&self.durable, &self.session),
            Persistence::Session => (&self.session, &self.durable),
        };

        target.set(TOKEN_KEY, token)?;
        // A stale token in the other tier would shadow or outlive this one
        other.remove(TOKEN_KEY)?;

        tracing::debug!(persistence = ?persistence, "stored credential");
        Ok(())
    }

    /// Remove the token from both tiers
    pub fn clear(&self) -> Result<(), StorageError> {
        self.durable.remove(TOKEN_KEY)?;
        self.session.remove(TOKEN_KEY)?;
        tracing::debug!("cleared credentials");
        Ok(())
    }

    fn lookup(&self) -> Result<Option<(SecretString, Persistence)>, StorageError> {
        let tiers = [
            (&self.durable, Persistence::Durable),
            (&self.session, Persistence::Session),
        ];
        for (store, tier) in tiers {
            if let Some(token) = store.get(TOKEN_KEY)?.filter(|t| !t.trim().is_empty()) {
                return Ok(Some((SecretString::from(token.trim().to_string()), tier)));
            }
        }
        Ok(None)
    }
}
