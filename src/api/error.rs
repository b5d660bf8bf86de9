use thiserror::Error;

/// Errors surfaced by the backend client.
///
/// Transport problems (connection refused, timeout, non-2xx status) and
/// body decoding problems both come out of reqwest and collapse into
/// `Transport`. `Backend` carries the server's own error message for
/// responses that arrived fine but report `success: false`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("{0}")]
    Backend(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}
