//! PUT transport used by the uploaders.
//!
//! [`RangeTransport`] keeps the upload protocol independent of the HTTP stack
//! so it can be driven by a scripted mock in tests. [`HttpTransport`] is the
//! `reqwest` implementation.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::{CONTENT_RANGE, CONTENT_TYPE};

/// One PUT of raw bytes to a signed URL.
#[derive(Debug, Clone, Copy)]
pub struct PutRequest<'a> {
    pub url: &'a str,
    /// `Content-Range` header value; `None` for single-shot uploads.
    pub content_range: Option<&'a str>,
    pub content_type: &'a str,
    pub body: &'a [u8],
}

/// Status and body text of a PUT response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutResponse {
    pub status: u16,
    pub body: String,
}

/// Classification of a failure where no HTTP status was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Could not connect, or the connection dropped mid-request.
    Connect,
    /// The request did not complete within the timeout.
    Timeout,
    /// Anything else (bad URL, TLS setup, builder errors).
    Other,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportErrorKind::Connect => f.write_str("connection error"),
            TransportErrorKind::Timeout => f.write_str("timeout"),
            TransportErrorKind::Other => f.write_str("request error"),
        }
    }
}

/// Network-level failure of a PUT.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// Whether repeating the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::Connect | TransportErrorKind::Timeout
        )
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() || is_connection_drop(&err) {
            TransportErrorKind::Connect
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, err.to_string())
    }
}

/// Walks the error chain looking for an I/O error that means the peer went away.
fn is_connection_drop(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            return matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            );
        }
        current = e.source();
    }
    false
}

/// Sends PUT requests.
///
/// Implementations must only return `Err` when no HTTP status was received;
/// every status, including errors, is reported through [`PutResponse`].
pub trait RangeTransport: Send + Sync {
    fn put<'a>(
        &'a self,
        request: PutRequest<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<PutResponse, TransportError>> + Send + 'a>>;
}

/// `reqwest`-backed transport.
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport whose requests time out after `timeout`.
    ///
    /// Redirects are not followed: 308 is the resumable protocol's
    /// "keep going" answer, not a redirect.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { http })
    }
}

impl RangeTransport for HttpTransport {
    fn put<'a>(
        &'a self,
        request: PutRequest<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<PutResponse, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            let mut builder = self
                .http
                .put(request.url)
                .header(CONTENT_TYPE, request.content_type)
                .body(request.body.to_vec());
            if let Some(range) = request.content_range {
                builder = builder.header(CONTENT_RANGE, range);
            }

            let resp = builder.send().await?;
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            Ok(PutResponse { status, body })
        })
    }
}
