use byteorder::{BigEndian, ByteOrder};
use hmac::{Hmac, Mac};
use p256::ecdh::EphemeralSecret;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::PublicKey;
use rand::rngs::OsRng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use ecconnect::container::Container;
use ecconnect::sign::{SignContext, VerifyContext};

use super::{SecureSession, Stage};
use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

pub(crate) const CONNECT_REQUEST_TAG: [u8; 4] = *b"TSCR";
pub(crate) const CONNECT_ACCEPT_TAG: [u8; 4] = *b"TSCA";
pub(crate) const CONNECT_FINISH_TAG: [u8; 4] = *b"TSCF";

const SESSION_MASTER_LABEL: &str = "Ecrypt secure session master key";
const HANDSHAKE_MAC_LENGTH: usize = 32;

fn write_field(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
}

fn read_u32(input: &[u8], offset: &mut usize) -> Result<u32> {
    let end = offset.checked_add(4).ok_or(Error::InvalidParameter)?;
    if input.len() < end {
        return Err(Error::InvalidParameter);
    }
    let value = BigEndian::read_u32(&input[*offset..end]);
    *offset = end;
    Ok(value)
}

fn read_field<'a>(input: &'a [u8], offset: &mut usize) -> Result<&'a [u8]> {
    let length = read_u32(input, offset)? as usize;
    let end = offset.checked_add(length).ok_or(Error::InvalidParameter)?;
    if input.len() < end {
        return Err(Error::InvalidParameter);
    }
    let bytes = &input[*offset..end];
    *offset = end;
    Ok(bytes)
}

fn finish_parse(input: &[u8], offset: usize) -> Result<()> {
    if offset != input.len() {
        return Err(Error::InvalidParameter);
    }
    Ok(())
}

fn encode_public_key(key: &PublicKey) -> Vec<u8> {
    key.to_encoded_point(false).as_bytes().to_vec()
}

impl SecureSession {
    fn signing_context(&self) -> Result<SignContext> {
        let key = self.signing_key.as_ref().ok_or(Error::InvalidParameter)?;
        Ok(SignContext::from_key_container(key)?)
    }

    fn peer_verify_context(&self) -> Result<VerifyContext> {
        let key = self
            .transport
            .get_public_key_for_id(self.session_id)
            .ok_or(Error::InvalidParameter)?;
        Ok(VerifyContext::from_key_container(&key)?)
    }

    /// Computes the post-handshake master key from the ECDH shared secret
    /// and the handshake transcript.
    fn compute_master_key(
        &mut self,
        shared_secret: &[u8],
        client_pub: &[u8],
        server_pub: &[u8],
    ) -> Result<()> {
        let session_id = self.session_id.to_be_bytes();
        let master = ecconnect::kdf::kdf(
            shared_secret,
            SESSION_MASTER_LABEL,
            &[&session_id, client_pub, server_pub],
            super::SESSION_MASTER_KEY_LENGTH,
        )?;
        self.master_key.copy_from_slice(&master);
        Ok(())
    }

    /// Key-confirmation MAC over the handshake transcript, bound to the
    /// role that emits it so the two directions can never be confused.
    fn handshake_mac(
        &self,
        client_pub: &[u8],
        server_pub: &[u8],
        role: &[u8],
    ) -> Result<[u8; HANDSHAKE_MAC_LENGTH]> {
        let mut mac = HmacSha256::new_from_slice(self.master_key.as_ref())
            .map_err(|_| Error::InvalidParameter)?;
        mac.update(&self.session_id.to_be_bytes());
        mac.update(client_pub);
        mac.update(server_pub);
        mac.update(role);
        let mut out = [0u8; HANDSHAKE_MAC_LENGTH];
        out.copy_from_slice(&mac.finalize().into_bytes());
        Ok(out)
    }

    /// Starts the handshake as a client: emits a connect request carrying
    /// the session id, a fresh ephemeral ECDH public key and a signature
    /// over both under the long-term signing key.
    pub fn connect(&mut self) -> Result<()> {
        if !matches!(self.stage, Stage::Idle) {
            return Err(Error::InvalidParameter);
        }

        let secret = EphemeralSecret::random(&mut OsRng);
        let eph_pub = encode_public_key(&secret.public_key());

        let mut signer = self.signing_context()?;
        signer.update(&self.session_id.to_be_bytes());
        signer.update(&eph_pub);
        let signature = signer.finalize()?;

        let mut payload = Vec::new();
        payload.extend_from_slice(&self.session_id.to_be_bytes());
        write_field(&mut payload, &eph_pub);
        write_field(&mut payload, &signature);
        let message = Container::new(CONNECT_REQUEST_TAG, payload).serialize()?;

        self.is_client = true;
        self.set_stage(Stage::AwaitResponse { secret, eph_pub });
        self.transport.send(&message)?;
        log::debug!("session {:#010x}: connect request sent", self.session_id);
        Ok(())
    }

    /// Feeds one handshake message to the state machine, sending any reply
    /// through the transport. This is the single dispatch point for the
    /// whole negotiation.
    pub fn negotiate(&mut self, wire: &[u8]) -> Result<()> {
        let container = Container::parse(wire)?;
        match *container.tag() {
            CONNECT_REQUEST_TAG => self.process_connect_request(container.data()),
            CONNECT_ACCEPT_TAG => self.process_connect_accept(container.data()),
            CONNECT_FINISH_TAG => self.process_connect_finish(container.data()),
            _ => Err(Error::InvalidParameter),
        }
    }

    /// Server side: validates the client's connect request, performs its
    /// half of the key agreement and replies with its ephemeral key, a
    /// signature and a key-confirmation MAC.
    fn process_connect_request(&mut self, payload: &[u8]) -> Result<()> {
        if !matches!(self.stage, Stage::Idle) {
            return Err(Error::InvalidParameter);
        }

        let mut offset = 0;
        let session_id = read_u32(payload, &mut offset)?;
        let client_pub = read_field(payload, &mut offset)?.to_vec();
        let signature = read_field(payload, &mut offset)?.to_vec();
        finish_parse(payload, offset)?;

        if session_id != self.session_id {
            return Err(Error::InvalidParameter);
        }

        let mut verifier = self.peer_verify_context()?;
        verifier.update(&session_id.to_be_bytes());
        verifier.update(&client_pub);
        verifier.finalize(&signature)?;

        let client_point =
            PublicKey::from_sec1_bytes(&client_pub).map_err(|_| Error::DataCorrupt)?;
        let secret = EphemeralSecret::random(&mut OsRng);
        let server_pub = encode_public_key(&secret.public_key());
        let shared = secret.diffie_hellman(&client_point);

        self.is_client = false;
        self.compute_master_key(shared.raw_secret_bytes(), &client_pub, &server_pub)?;
        self.derive_message_keys()?;

        let mut signer = self.signing_context()?;
        signer.update(&self.session_id.to_be_bytes());
        signer.update(&client_pub);
        signer.update(&server_pub);
        let signature = signer.finalize()?;
        let mac = self.handshake_mac(&client_pub, &server_pub, b"server")?;
        let expected_mac = self.handshake_mac(&client_pub, &server_pub, b"client")?;

        let mut reply = Vec::new();
        reply.extend_from_slice(&self.session_id.to_be_bytes());
        write_field(&mut reply, &server_pub);
        write_field(&mut reply, &signature);
        write_field(&mut reply, &mac);
        let message = Container::new(CONNECT_ACCEPT_TAG, reply).serialize()?;

        self.out_seq = 0;
        self.in_seq = 0;
        self.set_stage(Stage::AwaitConfirmation { expected_mac });
        self.transport.send(&message)?;
        log::debug!("session {:#010x}: connect request accepted", self.session_id);
        Ok(())
    }

    /// Client side: authenticates the server's reply, completes the key
    /// agreement and confirms the session keys.
    fn process_connect_accept(&mut self, payload: &[u8]) -> Result<()> {
        let client_pub = match &self.stage {
            Stage::AwaitResponse { eph_pub, .. } => eph_pub.clone(),
            _ => return Err(Error::InvalidParameter),
        };

        let mut offset = 0;
        let session_id = read_u32(payload, &mut offset)?;
        let server_pub = read_field(payload, &mut offset)?.to_vec();
        let signature = read_field(payload, &mut offset)?.to_vec();
        let mac = read_field(payload, &mut offset)?.to_vec();
        finish_parse(payload, offset)?;

        if session_id != self.session_id {
            return Err(Error::InvalidParameter);
        }

        let mut verifier = self.peer_verify_context()?;
        verifier.update(&session_id.to_be_bytes());
        verifier.update(&client_pub);
        verifier.update(&server_pub);
        verifier.finalize(&signature)?;

        let server_point =
            PublicKey::from_sec1_bytes(&server_pub).map_err(|_| Error::DataCorrupt)?;

        // The ephemeral secret is consumed by the key agreement; from here
        // on any failure tears the session down.
        let secret = match std::mem::replace(&mut self.stage, Stage::Terminated) {
            Stage::AwaitResponse { secret, .. } => secret,
            _ => return Err(Error::InvalidParameter),
        };
        let shared = secret.diffie_hellman(&server_point);

        self.compute_master_key(shared.raw_secret_bytes(), &client_pub, &server_pub)?;

        let expected = self.handshake_mac(&client_pub, &server_pub, b"server")?;
        if expected.ct_eq(&mac[..]).unwrap_u8() != 1 {
            self.terminate();
            return Err(Error::InvalidSignature);
        }

        self.derive_message_keys()?;

        let confirmation = self.handshake_mac(&client_pub, &server_pub, b"client")?;
        let mut reply = Vec::new();
        write_field(&mut reply, &confirmation);
        let message = Container::new(CONNECT_FINISH_TAG, reply).serialize()?;

        self.out_seq = 0;
        self.in_seq = 0;
        self.set_stage(Stage::Established);
        self.transport.send(&message)?;
        log::debug!("session {:#010x}: established (client)", self.session_id);
        Ok(())
    }

    /// Server side: checks the client's key confirmation and goes live.
    fn process_connect_finish(&mut self, payload: &[u8]) -> Result<()> {
        let expected_mac = match &self.stage {
            Stage::AwaitConfirmation { expected_mac } => *expected_mac,
            _ => return Err(Error::InvalidParameter),
        };

        let mut offset = 0;
        let mac = read_field(payload, &mut offset)?.to_vec();
        finish_parse(payload, offset)?;

        if expected_mac.ct_eq(&mac[..]).unwrap_u8() != 1 {
            self.terminate();
            return Err(Error::InvalidSignature);
        }

        self.set_stage(Stage::Established);
        log::debug!("session {:#010x}: established (server)", self.session_id);
        Ok(())
    }
}
