#[cfg(test)]
mod secure_session_test;

mod handshake;
mod serialize;

use std::time::{SystemTime, UNIX_EPOCH};

use byteorder::{BigEndian, ByteOrder};
use zeroize::Zeroizing;

use ecconnect::alg;
use ecconnect::kdf::kdf;
use ecconnect::rand::gen_random_bytes;
use ecconnect::sign::SignContext;
use ecconnect::sym::{AeadDecrypter, AeadEncrypter, AEAD_IV_LENGTH, AEAD_TAG_LENGTH};
use ecconnect::wipe::wipe;

use crate::error::{Error, Result};

pub use serialize::SESSION_CONTEXT_TAG;

pub const SESSION_MASTER_KEY_LENGTH: usize = 32;
/* TODO: for now session keys are same length as the master key */
pub const SESSION_MESSAGE_KEY_LENGTH: usize = SESSION_MASTER_KEY_LENGTH;

/// Fixed per-message overhead: IV, sequence number, timestamp and auth tag.
pub const WRAP_AUX_DATA: usize = AEAD_IV_LENGTH + 4 + 8 + AEAD_TAG_LENGTH;

const SESSION_CLIENT_KEY_LABEL: &str = "Ecrypt secure session client key";
const SESSION_SERVER_KEY_LABEL: &str = "Ecrypt secure session server key";

const SEQ_OFFSET: usize = AEAD_IV_LENGTH;
const TS_OFFSET: usize = SEQ_OFFSET + 4;
const PAYLOAD_OFFSET: usize = TS_OFFSET + 8;

/// Externally visible lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Negotiating,
    Accepting,
    Established,
    Terminated,
}

/// Collaborator interface supplied by the session user.
///
/// The session core never touches a socket: handshake replies go out through
/// `send`, and `get_public_key_for_id` resolves the peer identity announced
/// in a handshake message to its certified public key container.
pub trait SessionTransport {
    fn get_public_key_for_id(&self, session_id: u32) -> Option<Vec<u8>>;
    fn send(&mut self, data: &[u8]) -> Result<()>;
    fn receive(&mut self) -> Result<Vec<u8>>;
    fn state_changed(&mut self, _state: SessionState) {}
}

pub(crate) enum Stage {
    /// Fresh session: becomes a client on `connect`, a server on the first
    /// incoming connect request.
    Idle,
    /// Client sent its connect request.
    AwaitResponse {
        secret: p256::ecdh::EphemeralSecret,
        eph_pub: Vec<u8>,
    },
    /// Server replied and waits for the client's key confirmation.
    AwaitConfirmation { expected_mac: [u8; 32] },
    Established,
    Terminated,
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Idle => f.write_str("Stage::Idle"),
            Stage::AwaitResponse { .. } => f.write_str("Stage::AwaitResponse"),
            Stage::AwaitConfirmation { .. } => f.write_str("Stage::AwaitConfirmation"),
            Stage::Established => f.write_str("Stage::Established"),
            Stage::Terminated => f.write_str("Stage::Terminated"),
        }
    }
}

/// A stateful secure channel with strictly ordered, sequence-numbered
/// messages.
///
/// Not safe for concurrent use from multiple threads; distinct sessions are
/// fully independent.
pub struct SecureSession {
    session_id: u32,
    is_client: bool,
    stage: Stage,
    master_key: Zeroizing<[u8; SESSION_MASTER_KEY_LENGTH]>,
    out_key: Zeroizing<[u8; SESSION_MESSAGE_KEY_LENGTH]>,
    in_key: Zeroizing<[u8; SESSION_MESSAGE_KEY_LENGTH]>,
    out_seq: u32,
    in_seq: u32,
    signing_key: Option<Zeroizing<Vec<u8>>>,
    transport: Box<dyn SessionTransport>,
}

impl std::fmt::Debug for SecureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureSession")
            .field("session_id", &self.session_id)
            .field("is_client", &self.is_client)
            .field("stage", &self.stage)
            .field("out_seq", &self.out_seq)
            .field("in_seq", &self.in_seq)
            .finish()
    }
}

impl SecureSession {
    /// Creates a session with a long-term signing key container and user
    /// callbacks. The session is passive until `connect` is called or a
    /// connect request arrives via `negotiate`.
    pub fn new(
        session_id: u32,
        signing_key: &[u8],
        transport: Box<dyn SessionTransport>,
    ) -> Result<SecureSession> {
        // Fail early on unusable identity keys.
        SignContext::from_key_container(signing_key)?;
        Ok(SecureSession {
            session_id,
            is_client: false,
            stage: Stage::Idle,
            master_key: Zeroizing::new([0u8; SESSION_MASTER_KEY_LENGTH]),
            out_key: Zeroizing::new([0u8; SESSION_MESSAGE_KEY_LENGTH]),
            in_key: Zeroizing::new([0u8; SESSION_MESSAGE_KEY_LENGTH]),
            out_seq: 0,
            in_seq: 0,
            signing_key: Some(Zeroizing::new(signing_key.to_vec())),
            transport,
        })
    }

    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    pub fn is_client(&self) -> bool {
        self.is_client
    }

    pub fn state(&self) -> SessionState {
        match self.stage {
            Stage::Idle => SessionState::Accepting,
            Stage::AwaitResponse { .. } => SessionState::Negotiating,
            Stage::AwaitConfirmation { .. } => SessionState::Accepting,
            Stage::Established => SessionState::Established,
            Stage::Terminated => SessionState::Terminated,
        }
    }

    pub fn is_established(&self) -> bool {
        matches!(self.stage, Stage::Established)
    }

    fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
        let state = self.state();
        self.transport.state_changed(state);
    }

    /// Tears the session down, wiping all key material.
    pub fn terminate(&mut self) {
        wipe(self.master_key.as_mut());
        wipe(self.out_key.as_mut());
        wipe(self.in_key.as_mut());
        self.out_seq = 0;
        self.in_seq = 0;
        self.set_stage(Stage::Terminated);
    }

    /// Derives the directional message keys from the master key.
    ///
    /// The client's outgoing key is the server's incoming key and vice
    /// versa: both are bound to the session id and to the role that writes
    /// under them.
    pub(crate) fn derive_message_keys(&mut self) -> Result<()> {
        let context = self.session_id.to_be_bytes();
        let (out_label, in_label) = if self.is_client {
            (SESSION_CLIENT_KEY_LABEL, SESSION_SERVER_KEY_LABEL)
        } else {
            (SESSION_SERVER_KEY_LABEL, SESSION_CLIENT_KEY_LABEL)
        };
        let out = kdf(
            self.master_key.as_ref(),
            out_label,
            &[&context],
            SESSION_MESSAGE_KEY_LENGTH,
        )?;
        let inn = kdf(
            self.master_key.as_ref(),
            in_label,
            &[&context],
            SESSION_MESSAGE_KEY_LENGTH,
        )?;
        self.out_key.copy_from_slice(&out);
        self.in_key.copy_from_slice(&inn);
        Ok(())
    }

    fn frame_aad(&self, seq: u32, timestamp: u64) -> [u8; 16] {
        let mut aad = [0u8; 16];
        BigEndian::write_u32(&mut aad[..4], self.session_id);
        BigEndian::write_u32(&mut aad[4..8], seq);
        BigEndian::write_u64(&mut aad[8..], timestamp);
        aad
    }

    /// Encrypts an outgoing message.
    ///
    /// Output layout: `iv[12] || seq:u32 || ts:u64 || ciphertext || tag[16]`,
    /// exactly `WRAP_AUX_DATA` bytes longer than the input. The session id is
    /// not transmitted; it is bound through the associated data instead.
    pub fn wrap(&mut self, message: &[u8]) -> Result<Vec<u8>> {
        if !self.is_established() {
            return Err(Error::InvalidParameter);
        }
        if message.is_empty() {
            return Err(Error::InvalidParameter);
        }
        let seq = self.out_seq;
        let Some(next_seq) = seq.checked_add(1) else {
            // Sequence number exhaustion is fatal for the session.
            self.terminate();
            return Err(Error::Fail);
        };

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| Error::Fail)?
            .as_secs();

        let mut iv = [0u8; AEAD_IV_LENGTH];
        gen_random_bytes(&mut iv)?;

        let mut encrypter = AeadEncrypter::new(alg::AUTH_SYM_ALG, self.out_key.as_ref(), &iv)?;
        encrypter.set_aad(&self.frame_aad(seq, timestamp))?;
        encrypter.update(message);
        let (ciphertext, tag) = encrypter.finalize()?;

        let mut out = Vec::with_capacity(message.len() + WRAP_AUX_DATA);
        out.extend_from_slice(&iv);
        out.extend_from_slice(&seq.to_be_bytes());
        out.extend_from_slice(&timestamp.to_be_bytes());
        out.extend_from_slice(&ciphertext);
        out.extend_from_slice(&tag);

        self.out_seq = next_seq;
        log::trace!(
            "session {:#010x}: wrapped {} bytes, seq {}",
            self.session_id,
            message.len(),
            seq
        );
        Ok(out)
    }

    /// Pulls one message from the transport's `receive` callback and
    /// processes it: handshake messages advance the negotiation (returning
    /// an empty vector), data frames are unwrapped and returned.
    pub fn receive(&mut self) -> Result<Vec<u8>> {
        let wire = self.transport.receive()?;
        if self.is_established() {
            self.unwrap(&wire)
        } else {
            self.negotiate(&wire)?;
            Ok(Vec::new())
        }
    }

    /// Decrypts an incoming message.
    ///
    /// Delivery is strictly in order: the frame's sequence number must equal
    /// the expected incoming sequence number. A mismatched sequence number or
    /// a failed tag check leaves the session usable so the caller may retry
    /// with the correct frame.
    pub fn unwrap(&mut self, wrapped: &[u8]) -> Result<Vec<u8>> {
        if !self.is_established() {
            return Err(Error::InvalidParameter);
        }
        if wrapped.len() <= WRAP_AUX_DATA {
            return Err(Error::InvalidParameter);
        }

        let iv = &wrapped[..AEAD_IV_LENGTH];
        let seq = BigEndian::read_u32(&wrapped[SEQ_OFFSET..TS_OFFSET]);
        let timestamp = BigEndian::read_u64(&wrapped[TS_OFFSET..PAYLOAD_OFFSET]);
        let ciphertext = &wrapped[PAYLOAD_OFFSET..wrapped.len() - AEAD_TAG_LENGTH];
        let tag = &wrapped[wrapped.len() - AEAD_TAG_LENGTH..];

        if seq != self.in_seq {
            log::debug!(
                "session {:#010x}: frame seq {} does not match expected {}",
                self.session_id,
                seq,
                self.in_seq
            );
            return Err(Error::InvalidSignature);
        }

        let mut decrypter = AeadDecrypter::new(alg::AUTH_SYM_ALG, self.in_key.as_ref(), iv)?;
        decrypter.set_aad(&self.frame_aad(seq, timestamp))?;
        decrypter.update(ciphertext);
        let message = decrypter.finalize(tag)?;

        let Some(next_seq) = self.in_seq.checked_add(1) else {
            self.terminate();
            return Err(Error::Fail);
        };
        self.in_seq = next_seq;
        Ok(message)
    }
}
