//! DX dataset directory API client.
//!
//! Async HTTP client using `reqwest` with bearer token authentication. Covers
//! the calls a snapshot sync needs: identity check, installation listing,
//! dataset lookup and creation, and upload URL acquisition.

pub mod client;
pub mod credentials;

pub use client::{Client, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use credentials::{Credentials, format_private_key};

/// Errors from the DX client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(&'static str),

    #[error("private key is malformed")]
    MalformedPrivateKey,
}
