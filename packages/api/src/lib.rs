#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! HTTP client for the EMIS dashboard REST API.
//!
//! The API is owned by a separate backend service; this crate is the one
//! place its JSON enters the workspace. Every response is parsed into the
//! typed models of `emis_*_models` here, and every failure is classified
//! into an [`ApiError`] so callers can tell "no data for this filter"
//! ([`ApiError::NotFound`]) apart from real failures.

pub mod client;
pub mod config;
pub mod retry;

pub use client::DashboardClient;
pub use config::ApiConfig;
pub use retry::RetryPolicy;

/// Errors returned by the dashboard API client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not valid JSON.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The API has no data for the requested filter (HTTP 404).
    #[error("No data at {url}")]
    NotFound {
        /// Requested URL.
        url: String,
    },

    /// The API answered with a non-success status.
    #[error("HTTP {status} from {url}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
        /// Start of the response body.
        body: String,
    },

    /// The API reported that it cannot reach its database.
    #[error("The dashboard database is unavailable (reported by {url})")]
    DatabaseUnavailable {
        /// Requested URL.
        url: String,
    },

    /// The response was JSON but not the expected shape.
    #[error("Unexpected response from {url}: {message}")]
    Parse {
        /// Requested URL.
        url: String,
        /// What was wrong.
        message: String,
    },

    /// A request could not be built from the given arguments.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// What was wrong.
        message: String,
    },

    /// Client configuration is missing or invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// What was wrong.
        message: String,
    },
}

impl ApiError {
    /// `true` when the API has no data for the request, as opposed to a
    /// failure.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// `true` when the whole dashboard should show its "database
    /// connection issue" screen rather than a per-widget error.
    #[must_use]
    pub const fn is_database_unavailable(&self) -> bool {
        matches!(self, Self::DatabaseUnavailable { .. })
    }
}
