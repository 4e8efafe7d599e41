use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use ecconnect::container::CONTAINER_HEADER_LENGTH;
use ecconnect::ec_key_pair_gen::EcKeyPairGen;
use ecconnect::key::EcCurve;

use super::*;

const SESSION_ID: u32 = 0x0102_0304;

type Wire = Rc<RefCell<VecDeque<Vec<u8>>>>;
type StateLog = Rc<RefCell<Vec<SessionState>>>;

struct TestTransport {
    peer_public_key: Option<Vec<u8>>,
    outbox: Wire,
    inbox: Wire,
    states: StateLog,
}

impl SessionTransport for TestTransport {
    fn get_public_key_for_id(&self, session_id: u32) -> Option<Vec<u8>> {
        if session_id != SESSION_ID {
            return None;
        }
        self.peer_public_key.clone()
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.outbox.borrow_mut().push_back(data.to_vec());
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<u8>> {
        self.inbox.borrow_mut().pop_front().ok_or(Error::Fail)
    }

    fn state_changed(&mut self, state: SessionState) {
        self.states.borrow_mut().push(state);
    }
}

struct Harness {
    client: SecureSession,
    server: SecureSession,
    client_to_server: Wire,
    server_to_client: Wire,
    client_states: StateLog,
    server_states: StateLog,
}

fn harness() -> Harness {
    let client_keys = EcKeyPairGen::new(EcCurve::P256).unwrap();
    let server_keys = EcKeyPairGen::new(EcCurve::P256).unwrap();

    let client_to_server: Wire = Rc::default();
    let server_to_client: Wire = Rc::default();
    let client_states: StateLog = Rc::default();
    let server_states: StateLog = Rc::default();

    let client = SecureSession::new(
        SESSION_ID,
        &client_keys.export_private_key().unwrap(),
        Box::new(TestTransport {
            peer_public_key: Some(server_keys.export_public_key().unwrap()),
            outbox: client_to_server.clone(),
            inbox: server_to_client.clone(),
            states: client_states.clone(),
        }),
    )
    .unwrap();

    let server = SecureSession::new(
        SESSION_ID,
        &server_keys.export_private_key().unwrap(),
        Box::new(TestTransport {
            peer_public_key: Some(client_keys.export_public_key().unwrap()),
            outbox: server_to_client.clone(),
            inbox: client_to_server.clone(),
            states: server_states.clone(),
        }),
    )
    .unwrap();

    Harness {
        client,
        server,
        client_to_server,
        server_to_client,
        client_states,
        server_states,
    }
}

fn establish(harness: &mut Harness) {
    harness.client.connect().unwrap();
    harness.server.receive().unwrap();
    harness.client.receive().unwrap();
    harness.server.receive().unwrap();
    assert!(harness.client.is_established());
    assert!(harness.server.is_established());
}

fn fresh_transport(peer_public_key: Option<Vec<u8>>) -> Box<TestTransport> {
    Box::new(TestTransport {
        peer_public_key,
        outbox: Rc::default(),
        inbox: Rc::default(),
        states: Rc::default(),
    })
}

#[test]
fn test_handshake_establishes_both_sides() {
    let mut harness = harness();
    establish(&mut harness);

    assert!(harness.client.is_client());
    assert!(!harness.server.is_client());
    assert_eq!(harness.client.state(), SessionState::Established);
    assert_eq!(harness.server.state(), SessionState::Established);

    assert_eq!(
        *harness.client_states.borrow(),
        vec![SessionState::Negotiating, SessionState::Established]
    );
    assert_eq!(
        *harness.server_states.borrow(),
        vec![SessionState::Accepting, SessionState::Established]
    );

    // No handshake traffic left in flight.
    assert!(harness.client_to_server.borrow().is_empty());
    assert!(harness.server_to_client.borrow().is_empty());
}

#[test]
fn test_wrap_overhead_is_exact() {
    let mut harness = harness();
    establish(&mut harness);

    let wrapped = harness.client.wrap(b"ping").unwrap();
    assert_eq!(wrapped.len(), 4 + WRAP_AUX_DATA);
    assert_eq!(wrapped.len(), 44);

    assert_eq!(harness.server.in_seq, 0);
    assert_eq!(harness.server.unwrap(&wrapped).unwrap(), b"ping");
    assert_eq!(harness.server.in_seq, 1);
}

#[test]
fn test_sequence_numbers_advance_in_lockstep() {
    let mut harness = harness();
    establish(&mut harness);

    for i in 0..5u32 {
        assert_eq!(harness.client.out_seq, i);
        let wrapped = harness.client.wrap(format!("msg {i}").as_bytes()).unwrap();
        assert_eq!(
            harness.server.unwrap(&wrapped).unwrap(),
            format!("msg {i}").as_bytes()
        );
    }
    assert_eq!(harness.client.out_seq, 5);
    assert_eq!(harness.server.in_seq, 5);
}

#[test]
fn test_both_directions() {
    let mut harness = harness();
    establish(&mut harness);

    let to_server = harness.client.wrap(b"from client").unwrap();
    assert_eq!(harness.server.unwrap(&to_server).unwrap(), b"from client");

    let to_client = harness.server.wrap(b"from server").unwrap();
    assert_eq!(harness.client.unwrap(&to_client).unwrap(), b"from server");
}

#[test]
fn test_out_of_order_frame_fails_and_session_survives() {
    let mut harness = harness();
    establish(&mut harness);

    let first = harness.client.wrap(b"first").unwrap();
    let second = harness.client.wrap(b"second").unwrap();

    assert_eq!(
        harness.server.unwrap(&second).unwrap_err(),
        Error::InvalidSignature
    );
    assert_eq!(harness.server.in_seq, 0);
    assert!(harness.server.is_established());

    // Retrying in the right order still works.
    assert_eq!(harness.server.unwrap(&first).unwrap(), b"first");
    assert_eq!(harness.server.unwrap(&second).unwrap(), b"second");
}

#[test]
fn test_replayed_frame_fails() {
    let mut harness = harness();
    establish(&mut harness);

    let wrapped = harness.client.wrap(b"once").unwrap();
    assert_eq!(harness.server.unwrap(&wrapped).unwrap(), b"once");
    assert_eq!(
        harness.server.unwrap(&wrapped).unwrap_err(),
        Error::InvalidSignature
    );
}

#[test]
fn test_tampered_frame_fails() {
    let mut harness = harness();
    establish(&mut harness);

    let wrapped = harness.client.wrap(b"payload").unwrap();
    for i in 0..wrapped.len() {
        let mut tampered = wrapped.clone();
        tampered[i] ^= 0x01;
        assert_eq!(
            harness.server.unwrap(&tampered).unwrap_err(),
            Error::InvalidSignature,
            "flip at byte {i} went undetected"
        );
        assert_eq!(harness.server.in_seq, 0);
    }

    // The untampered frame still unwraps after all those failures.
    assert_eq!(harness.server.unwrap(&wrapped).unwrap(), b"payload");
}

#[test]
fn test_wrap_and_unwrap_require_established_session() {
    let mut harness = harness();
    assert_eq!(
        harness.client.wrap(b"data").unwrap_err(),
        Error::InvalidParameter
    );
    assert_eq!(
        harness.client.unwrap(&[0u8; 64]).unwrap_err(),
        Error::InvalidParameter
    );
}

#[test]
fn test_wrap_rejects_empty_message() {
    let mut harness = harness();
    establish(&mut harness);
    assert_eq!(harness.client.wrap(&[]).unwrap_err(), Error::InvalidParameter);
}

#[test]
fn test_unwrap_rejects_short_frames() {
    let mut harness = harness();
    establish(&mut harness);
    assert_eq!(
        harness.server.unwrap(&[0u8; WRAP_AUX_DATA]).unwrap_err(),
        Error::InvalidParameter
    );
}

#[test]
fn test_save_load_continues_the_session() {
    let mut harness = harness();
    establish(&mut harness);

    // Advance the sequence numbers a little before saving.
    let wrapped = harness.client.wrap(b"before save").unwrap();
    assert_eq!(harness.server.unwrap(&wrapped).unwrap(), b"before save");
    let note = harness.server.wrap(b"noted").unwrap();
    assert_eq!(harness.client.unwrap(&note).unwrap(), b"noted");

    let saved = harness.client.save().unwrap();
    assert_eq!(saved.len(), CONTAINER_HEADER_LENGTH + 48);

    let mut restored = SecureSession::load(&saved, fresh_transport(None)).unwrap();
    assert!(restored.is_established());
    assert!(restored.is_client());
    assert_eq!(restored.session_id(), SESSION_ID);
    assert_eq!(restored.out_seq, harness.client.out_seq);
    assert_eq!(restored.in_seq, harness.client.in_seq);

    // The restored context keeps talking to the old peer in both directions.
    let wrapped = restored.wrap(b"after load").unwrap();
    assert_eq!(harness.server.unwrap(&wrapped).unwrap(), b"after load");
    let reply = harness.server.wrap(b"ack").unwrap();
    assert_eq!(restored.unwrap(&reply).unwrap(), b"ack");
}

#[test]
fn test_save_requires_established_session() {
    let mut harness = harness();
    assert_eq!(harness.client.save().unwrap_err(), Error::InvalidParameter);

    harness.client.connect().unwrap();
    assert_eq!(harness.client.save().unwrap_err(), Error::InvalidParameter);

    harness.server.receive().unwrap();
    assert_eq!(harness.server.save().unwrap_err(), Error::InvalidParameter);
}

#[test]
fn test_save_into_reports_required_size() {
    let mut harness = harness();
    establish(&mut harness);

    let mut small = [0u8; 32];
    assert_eq!(
        harness.client.save_into(&mut small).unwrap_err(),
        Error::BufferTooSmall {
            needed: CONTAINER_HEADER_LENGTH + 48
        }
    );

    let mut exact = vec![0u8; CONTAINER_HEADER_LENGTH + 48];
    let written = harness.client.save_into(&mut exact).unwrap();
    assert_eq!(written, exact.len());
    assert_eq!(exact, harness.client.save().unwrap());
}

#[test]
fn test_load_rejects_corrupted_state() {
    let mut harness = harness();
    establish(&mut harness);

    let saved = harness.client.save().unwrap();
    for i in 0..saved.len() {
        let mut corrupted = saved.clone();
        corrupted[i] ^= 0x01;
        assert_eq!(
            SecureSession::load(&corrupted, fresh_transport(None)).unwrap_err(),
            Error::InvalidParameter,
            "corruption at byte {i} went undetected"
        );
    }
}

#[test]
fn test_unknown_peer_id_aborts_handshake() {
    let mut harness = harness();

    // Server that cannot resolve the client's identity.
    let server_keys = EcKeyPairGen::new(EcCurve::P256).unwrap();
    let mut server = SecureSession::new(
        SESSION_ID,
        &server_keys.export_private_key().unwrap(),
        fresh_transport(None),
    )
    .unwrap();

    harness.client.connect().unwrap();
    let request = harness.client_to_server.borrow_mut().pop_front().unwrap();
    assert_eq!(server.negotiate(&request).unwrap_err(), Error::InvalidParameter);
}

#[test]
fn test_wrong_identity_key_fails_signature_check() {
    let mut harness = harness();

    // Server resolves the session id to an unrelated public key.
    let server_keys = EcKeyPairGen::new(EcCurve::P256).unwrap();
    let unrelated = EcKeyPairGen::new(EcCurve::P256).unwrap();
    let mut server = SecureSession::new(
        SESSION_ID,
        &server_keys.export_private_key().unwrap(),
        fresh_transport(Some(unrelated.export_public_key().unwrap())),
    )
    .unwrap();

    harness.client.connect().unwrap();
    let request = harness.client_to_server.borrow_mut().pop_front().unwrap();
    assert_eq!(
        server.negotiate(&request).unwrap_err(),
        Error::InvalidSignature
    );
}

#[test]
fn test_negotiate_rejects_garbage() {
    let mut harness = harness();
    assert_eq!(
        harness.server.negotiate(b"not a container").unwrap_err(),
        Error::InvalidParameter
    );
}
