use thiserror::Error;

/// Service-level errors.
///
/// Malformed feed content is recovered inside the parse and expansion
/// stages and never reaches this type; only transport failures surface,
/// and those stop at the cache fallback in the query layer.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected HTTP status: {0}")]
    Status(u16),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
