use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Status codes exposed at the library boundary.
///
/// Mirrors the primitives-layer taxonomy so that callers see one set of
/// codes no matter which layer produced the failure.
#[derive(Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error("operation failed")]
    Fail,
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("out of memory")]
    NoMemory,
    #[error("buffer too small: {needed} bytes required")]
    BufferTooSmall { needed: usize },
    #[error("data corrupted")]
    DataCorrupt,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("operation not supported")]
    NotSupported,
    #[error("crypto backend: {0}")]
    CryptoBackend(String),
}

impl From<ecconnect::Error> for Error {
    fn from(e: ecconnect::Error) -> Self {
        match e {
            ecconnect::Error::Fail => Error::Fail,
            ecconnect::Error::InvalidParameter => Error::InvalidParameter,
            ecconnect::Error::NoMemory => Error::NoMemory,
            ecconnect::Error::BufferTooSmall { needed } => Error::BufferTooSmall { needed },
            ecconnect::Error::DataCorrupt => Error::DataCorrupt,
            ecconnect::Error::InvalidSignature => Error::InvalidSignature,
            ecconnect::Error::NotSupported => Error::NotSupported,
            ecconnect::Error::CryptoBackend(msg) => Error::CryptoBackend(msg),
            _ => Error::Fail,
        }
    }
}
