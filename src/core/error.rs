use axum::BoxError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Database migration error: {0}")]
    DatabaseMigration(#[from] sqlx::migrate::MigrateError),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("Reqwest error: {0}")]
    HTTPClient(#[from] reqwest::Error),
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No bearer token provided")]
    MissingToken,
    #[error("Malformed bearer token")]
    MalformedToken,
    #[error("Unsupported signing algorithm")]
    UnsupportedAlgorithm,
    #[error("Token signed with unknown key")]
    UnknownSigningKey,
    #[error("Invalid token signature")]
    InvalidSignature,
    #[error("Expired token")]
    TokenExpired,
    #[error("Token issuer mismatch")]
    IssuerMismatch,
    #[error("Token audience mismatch")]
    AudienceMismatch,
    #[error("Forbidden")]
    Forbidden,
    #[error("Validation error: {0}")]
    Validation(&'static str),
    #[error("Record not found")]
    RecordNotFound,
    #[error("Upstream call timed out")]
    UpstreamTimeout,
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("Reqwest error: {0}")]
    HTTPClient(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        tracing::error!("{:?}", self);

        // Token and role failures collapse to generic bodies so a caller
        // cannot tell a bad signature from a missing role, and record
        // existence leaks only after authorization has passed.
        let (status, message) = match self {
            Error::MissingToken
            | Error::MalformedToken
            | Error::UnsupportedAlgorithm
            | Error::UnknownSigningKey
            | Error::InvalidSignature
            | Error::TokenExpired
            | Error::IssuerMismatch
            | Error::AudienceMismatch
            | Error::Jwt(_) => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            Error::Forbidden => (StatusCode::FORBIDDEN, "Forbidden"),
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "Invalid request payload"),
            Error::RecordNotFound => (StatusCode::NOT_FOUND, "Record not found"),
            Error::UpstreamTimeout => (StatusCode::GATEWAY_TIMEOUT, "Upstream timeout"),
            Error::Sql(_) => (StatusCode::SERVICE_UNAVAILABLE, "Record store unavailable"),
            Error::HTTPClient(_) | Error::Serialize(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Authorization unavailable")
            }
        };

        (status, message).into_response()
    }
}

pub(crate) async fn handle_middleware_errors(err: BoxError) -> (StatusCode, &'static str) {
    tracing::error!("Unhandled error: {:?}", err);
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}
