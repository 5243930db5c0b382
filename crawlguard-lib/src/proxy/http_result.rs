use http::StatusCode;
use thiserror::Error;

/// HTTP result type, T is typically a hyper::Response
/// HttpError is used to generate a synthetic error response
pub type HttpResult<T> = std::result::Result<T, HttpError>;

/// Describes things that can go wrong in the forwarder
#[derive(Debug, Error, Clone)]
pub enum HttpError {
    #[error("Failed to get response from backend: {0}")]
    FailedToGetResponseFromBackend(String),

    #[error("Invalid URI: {0}")]
    InvalidUri(String),
}

impl HttpError {
    pub fn error_type(&self) -> &'static str {
        match self {
            HttpError::FailedToGetResponseFromBackend(_) => "backend_unreachable",
            HttpError::InvalidUri(_) => "invalid_uri",
        }
    }
}

impl From<&HttpError> for StatusCode {
    fn from(e: &HttpError) -> StatusCode {
        match e {
            HttpError::FailedToGetResponseFromBackend(_) => StatusCode::BAD_GATEWAY,
            HttpError::InvalidUri(_) => StatusCode::BAD_REQUEST,
        }
    }
}
