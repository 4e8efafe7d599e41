use byteorder::{BigEndian, ByteOrder};
use zeroize::Zeroizing;

use ecconnect::container::{Container, CONTAINER_HEADER_LENGTH};

use super::{SecureSession, SessionTransport, Stage, SESSION_MASTER_KEY_LENGTH};
use crate::error::{Error, Result};

pub const SESSION_CONTEXT_TAG: [u8; 4] = *b"TSSC";

/* | session_id | is_client | master_key | out_seq | in_seq | */
const SESSION_CTX_SERIALIZED_SIZE: usize = 4 + 4 + SESSION_MASTER_KEY_LENGTH + 4 + 4;

impl SecureSession {
    fn to_container(&self) -> Result<Container> {
        if !matches!(self.stage, Stage::Established) {
            /* Key agreement is not complete. We cannot save session state at this stage. */
            return Err(Error::InvalidParameter);
        }

        let mut payload = Zeroizing::new(vec![0u8; SESSION_CTX_SERIALIZED_SIZE]);
        BigEndian::write_u32(&mut payload[..4], self.session_id);
        BigEndian::write_u32(&mut payload[4..8], u32::from(self.is_client));
        payload[8..8 + SESSION_MASTER_KEY_LENGTH].copy_from_slice(self.master_key.as_ref());
        let seq_base = 8 + SESSION_MASTER_KEY_LENGTH;
        BigEndian::write_u32(&mut payload[seq_base..seq_base + 4], self.out_seq);
        BigEndian::write_u32(&mut payload[seq_base + 4..], self.in_seq);

        Ok(Container::new(SESSION_CONTEXT_TAG, payload.to_vec()))
    }

    /// Serializes an established session, master key and sequence numbers
    /// included. The output must be stored as carefully as a key.
    pub fn save(&self) -> Result<Vec<u8>> {
        Ok(self.to_container()?.serialize()?)
    }

    /// Serializes into a caller-provided buffer, reporting the required
    /// size when it is too short.
    pub fn save_into(&self, out: &mut [u8]) -> Result<usize> {
        let needed = CONTAINER_HEADER_LENGTH + SESSION_CTX_SERIALIZED_SIZE;
        if out.len() < needed {
            return Err(Error::BufferTooSmall { needed });
        }
        Ok(self.to_container()?.write_into(out)?)
    }

    /// Restores a previously saved session. Callbacks are never persisted:
    /// they are reattached from the `transport` argument.
    pub fn load(raw: &[u8], transport: Box<dyn SessionTransport>) -> Result<SecureSession> {
        let container = Container::parse(raw)?;
        if *container.tag() != SESSION_CONTEXT_TAG {
            return Err(Error::InvalidParameter);
        }
        let payload = container.data();
        if payload.len() != SESSION_CTX_SERIALIZED_SIZE {
            return Err(Error::InvalidParameter);
        }

        let session_id = BigEndian::read_u32(&payload[..4]);
        let is_client = match BigEndian::read_u32(&payload[4..8]) {
            0 => false,
            1 => true,
            _ => return Err(Error::InvalidParameter),
        };
        let mut master_key = Zeroizing::new([0u8; SESSION_MASTER_KEY_LENGTH]);
        master_key.copy_from_slice(&payload[8..8 + SESSION_MASTER_KEY_LENGTH]);

        let mut session = SecureSession {
            session_id,
            is_client,
            stage: Stage::Established,
            master_key,
            out_key: Zeroizing::new([0u8; super::SESSION_MESSAGE_KEY_LENGTH]),
            in_key: Zeroizing::new([0u8; super::SESSION_MESSAGE_KEY_LENGTH]),
            out_seq: 0,
            in_seq: 0,
            signing_key: None,
            transport,
        };

        // Message keys must be derived before the sequence numbers are
        // assigned.
        session.derive_message_keys()?;

        let seq_base = 8 + SESSION_MASTER_KEY_LENGTH;
        session.out_seq = BigEndian::read_u32(&payload[seq_base..seq_base + 4]);
        session.in_seq = BigEndian::read_u32(&payload[seq_base + 4..]);

        Ok(session)
    }
}
