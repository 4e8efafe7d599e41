pub mod alg;
pub mod asym_cipher;
pub mod container;
pub mod crc32;
pub mod ec_key_pair_gen;
pub mod error;
pub mod kdf;
pub mod key;
pub mod rand;
pub mod rsa_key_pair_gen;
pub mod sign;
pub mod sym;
pub mod wipe;

pub use error::{Error, Result};
