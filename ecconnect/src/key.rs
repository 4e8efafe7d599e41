
use crate::container::Container;
use crate::error::{Error, Result};

pub const RSA_PRIV_KEY_PREF: &[u8; 3] = b"RRA";
pub const RSA_PUB_KEY_PREF: &[u8; 3] = b"URA";
pub const EC_PRIV_KEY_PREF: &[u8; 3] = b"REC";
pub const EC_PUB_KEY_PREF: &[u8; 3] = b"UEC";

pub const EC_SIZE_TAG_256: u8 = b'0';
pub const EC_SIZE_TAG_384: u8 = b'1';
pub const EC_SIZE_TAG_521: u8 = b'2';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcCurve {
    P256,
    P384,
    P521,
}

impl EcCurve {
    pub fn field_bytes(self) -> usize {
        match self {
            EcCurve::P256 => 32,
            EcCurve::P384 => 48,
            EcCurve::P521 => 66,
        }
    }

    /// SEC1 compressed point: sign byte plus the field element.
    pub fn compressed_point_bytes(self) -> usize {
        1 + self.field_bytes()
    }

    /// SEC1 uncompressed point: type byte plus both coordinates.
    pub fn uncompressed_point_bytes(self) -> usize {
        1 + 2 * self.field_bytes()
    }

    pub fn size_tag(self) -> u8 {
        match self {
            EcCurve::P256 => EC_SIZE_TAG_256,
            EcCurve::P384 => EC_SIZE_TAG_384,
            EcCurve::P521 => EC_SIZE_TAG_521,
        }
    }

    fn from_size_tag(tag: u8) -> Result<EcCurve> {
        match tag {
            EC_SIZE_TAG_256 => Ok(EcCurve::P256),
            EC_SIZE_TAG_384 => Ok(EcCurve::P384),
            EC_SIZE_TAG_521 => Ok(EcCurve::P521),
            _ => Err(Error::InvalidParameter),
        }
    }
}

const RSA_SIZE_TAGS: [u8; 4] = [b'1', b'2', b'4', b'8'];

/// Kind of key stored in a container, decided by one parse instead of
/// tag-byte dispatch scattered over call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    RsaPrivate,
    RsaPublic,
    EcPrivate(EcCurve),
    EcPublic(EcCurve),
}

impl KeyKind {
    /// Classifies a verified container and validates the payload length
    /// against the key-length policy for EC keys.
    pub fn parse(container: &Container) -> Result<KeyKind> {
        let tag = container.tag();
        let prefix: &[u8; 3] = tag[..3].try_into().map_err(|_| Error::InvalidParameter)?;
        match prefix {
            _ if prefix == RSA_PRIV_KEY_PREF => {
                check_rsa_size_tag(tag[3])?;
                Ok(KeyKind::RsaPrivate)
            }
            _ if prefix == RSA_PUB_KEY_PREF => {
                check_rsa_size_tag(tag[3])?;
                Ok(KeyKind::RsaPublic)
            }
            _ if prefix == EC_PRIV_KEY_PREF => {
                let curve = EcCurve::from_size_tag(tag[3])?;
                check_ec_priv_key_length(curve, container.data_size())?;
                Ok(KeyKind::EcPrivate(curve))
            }
            _ if prefix == EC_PUB_KEY_PREF => {
                let curve = EcCurve::from_size_tag(tag[3])?;
                check_ec_pub_key_length(curve, container.data_size())?;
                Ok(KeyKind::EcPublic(curve))
            }
            _ => Err(Error::InvalidParameter),
        }
    }
}

fn check_rsa_size_tag(tag: u8) -> Result<()> {
    if RSA_SIZE_TAGS.contains(&tag) {
        Ok(())
    } else {
        Err(Error::InvalidParameter)
    }
}

/// Public keys are accepted in both compressed and uncompressed form:
/// exporters here produce compressed points, but newer stacks serialize
/// uncompressed ones.
fn check_ec_pub_key_length(curve: EcCurve, payload_length: usize) -> Result<()> {
    if payload_length == curve.compressed_point_bytes()
        || payload_length == curve.uncompressed_point_bytes()
    {
        Ok(())
    } else {
        Err(Error::InvalidParameter)
    }
}

/// Due to a historical mistake, EC private keys used to be exported with the
/// same length as compressed public keys. That is one byte more than a field
/// element and the extra byte is always zero. Canonical serialization is a
/// bare field element; both are accepted.
fn check_ec_priv_key_length(curve: EcCurve, payload_length: usize) -> Result<()> {
    if payload_length == curve.field_bytes()
        || payload_length == curve.compressed_point_bytes()
    {
        Ok(())
    } else {
        Err(Error::InvalidParameter)
    }
}

/// Returns the scalar bytes of an EC private key container, normalizing the
/// legacy zero-padded form.
pub fn ec_private_scalar(curve: EcCurve, payload: &[u8]) -> Result<&[u8]> {
    let field = curve.field_bytes();
    if payload.len() == field {
        return Ok(payload);
    }
    if payload.len() == field + 1 && payload[field] == 0 {
        return Ok(&payload[..field]);
    }
    Err(Error::InvalidParameter)
}

/// Parses raw container bytes into a key container, verifying the checksum.
pub fn parse_key_container(raw: &[u8]) -> Result<(KeyKind, Container)> {
    let container = Container::parse(raw)?;
    let kind = KeyKind::parse(&container)?;
    Ok((kind, container))
}

pub fn ec_priv_key_tag(curve: EcCurve) -> [u8; 4] {
    [
        EC_PRIV_KEY_PREF[0],
        EC_PRIV_KEY_PREF[1],
        EC_PRIV_KEY_PREF[2],
        curve.size_tag(),
    ]
}

pub fn ec_pub_key_tag(curve: EcCurve) -> [u8; 4] {
    [
        EC_PUB_KEY_PREF[0],
        EC_PUB_KEY_PREF[1],
        EC_PUB_KEY_PREF[2],
        curve.size_tag(),
    ]
}
