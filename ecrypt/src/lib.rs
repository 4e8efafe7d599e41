pub mod auth_token;
pub mod error;
pub mod secure_cell;
pub mod secure_session;

pub use error::{Error, Result};
pub use secure_cell::{SecureCellContextImprint, SecureCellSeal, SecureCellTokenProtect};
pub use secure_session::{SecureSession, SessionState, SessionTransport};
