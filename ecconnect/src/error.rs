use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Status codes exposed at the library boundary.
///
/// Verification failures are always reported as `InvalidSignature`, never as
/// a backend error, so callers can distinguish "cryptographically wrong" from
/// "could not even try".
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
