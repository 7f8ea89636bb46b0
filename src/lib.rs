//! HOK Admin - storefront administration client
//!
//! This library provides the request/session layer used by the admin
//! tooling: a credential store with durable and session tiers, an HTTP
//! client with request/response interceptors, an error classifier that
//! turns failures into notifications, a revalidating fetch cache, and the
//! CRUD controllers for the catalog, orders, customers and transactions.

pub mod admin;
pub mod classifier;
pub mod config;
pub mod credentials;
pub mod fetch;
pub mod http;
pub mod notify;
pub mod storage;
pub mod upload;

use thiserror::Error;

/// Main error type for admin operations
#[derive(Error, Debug)]
pub enum AdminError {
    #[error(transparent)]
    Api(#[from] http::ApiError),

    #[error("upload failed: {0}")]
    Upload(#[from] upload::UploadError),

    #[error("storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Rejected(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for admin operations
pub type Result<T> = std::result::Result<T, AdminError>;
