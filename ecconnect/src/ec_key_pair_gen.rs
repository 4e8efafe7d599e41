
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;

use crate::container::Container;
use crate::error::{Error, Result};
use crate::key::{ec_priv_key_tag, ec_pub_key_tag, EcCurve};

#[derive(Debug)]
enum EcKeyPair {
    P256(Box<p256::SecretKey>),
    P384(Box<p384::SecretKey>),
}

/// Freshly generated EC keypair, exportable as key containers.
///
/// Private keys are exported in canonical form (a bare field element),
/// public keys as compressed SEC1 points.
#[derive(Debug)]
pub struct EcKeyPairGen {
    curve: EcCurve,
    keypair: EcKeyPair,
}

impl EcKeyPairGen {
    pub fn new(curve: EcCurve) -> Result<EcKeyPairGen> {
        let keypair = match curve {
            EcCurve::P256 => EcKeyPair::P256(Box::new(p256::SecretKey::random(&mut OsRng))),
            EcCurve::P384 => EcKeyPair::P384(Box::new(p384::SecretKey::random(&mut OsRng))),
            EcCurve::P521 => return Err(Error::NotSupported),
        };
        Ok(EcKeyPairGen { curve, keypair })
    }

    pub fn curve(&self) -> EcCurve {
        self.curve
    }

    pub fn export_private_key(&self) -> Result<Vec<u8>> {
        let scalar = match &self.keypair {
            EcKeyPair::P256(key) => key.to_bytes().to_vec(),
            EcKeyPair::P384(key) => key.to_bytes().to_vec(),
        };
        Container::new(ec_priv_key_tag(self.curve), scalar).serialize()
    }

    pub fn export_public_key(&self) -> Result<Vec<u8>> {
        let point = match &self.keypair {
            EcKeyPair::P256(key) => key.public_key().to_encoded_point(true).as_bytes().to_vec(),
            EcKeyPair::P384(key) => key.public_key().to_encoded_point(true).as_bytes().to_vec(),
        };
        Container::new(ec_pub_key_tag(self.curve), point).serialize()
    }
}
