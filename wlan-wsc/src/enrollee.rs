// Copyright 2020 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The enrollee side of the registration protocol: a strict linear state
//! machine over the M1..M8 exchange.
//!
//! The machine is transport-agnostic. The caller feeds it captured EAPOL
//! frames; it pushes outbound frames and the terminal credential set into
//! an update sink, exactly like the supplicant machines elsewhere in this
//! stack. Any validation failure is terminal: the caller tears the session
//! down and may start a fresh exchange.

use log::{debug, warn};

use crate::credential::{self, Credential};
use crate::crypto_utils::{self, dh, SessionKeys, NONCE_LEN};
use crate::device::DeviceDetail;
use crate::message;
use crate::tlv;
use crate::{attr, pin, Error};

use eapol::{EapCode, MacAddr, OpCode};

/// How the device password is established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    PushButton,
    Pin(String),
}

/// Messages from the enrollee to its caller.
#[derive(Debug, PartialEq)]
pub enum Update {
    /// A frame ready for transmission to the registrar.
    TxEapolFrame(Vec<u8>),
    /// Terminal success: credentials recovered from M8.
    Complete(Vec<Credential>),
}

pub type UpdateSink = Vec<Update>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    /// EAPOL-Start sent; identity and WSC-Start exchange pending.
    Started,
    M1Sent,
    M3Sent,
    M5Sent,
    M7Sent,
    Done,
    Failed,
    Aborted,
    TimedOut,
}

impl State {
    /// The registrar message this state is waiting for, if any.
    fn expected_msg(&self) -> Option<u8> {
        match self {
            State::M1Sent => Some(attr::msg::M2),
            State::M3Sent => Some(attr::msg::M4),
            State::M5Sent => Some(attr::msg::M6),
            State::M7Sent => Some(attr::msg::M8),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Done | State::Failed | State::Aborted | State::TimedOut)
    }
}

pub struct Enrollee {
    mode: Mode,
    password: Vec<u8>,
    device: DeviceDetail,
    rf_bands: u8,
    own_mac: MacAddr,
    peer_mac: MacAddr,
    uuid_e: [u8; 16],
    state: State,
    eap_id: u8,

    dh: Option<dh::KeyPair>,
    enrollee_nonce: [u8; NONCE_LEN],
    registrar_nonce: [u8; NONCE_LEN],
    registrar_uuid: Option<[u8; 16]>,
    peer_public_key: Vec<u8>,
    keys: Option<SessionKeys>,
    psk1: [u8; 16],
    psk2: [u8; 16],
    e_snonce1: [u8; NONCE_LEN],
    e_snonce2: [u8; NONCE_LEN],
    r_hash1: [u8; 32],
    r_hash2: [u8; 32],

    /// The last message we sent, chained into each authenticator.
    last_tx_msg: Vec<u8>,
}

impl Enrollee {
    /// Validates the configuration and prepares a fresh exchange. PIN mode
    /// requires an 8-digit checksum-valid numeric PIN.
    pub fn new(
        mode: Mode,
        device: DeviceDetail,
        own_mac: MacAddr,
        peer_mac: MacAddr,
        rf_bands: u8,
    ) -> Result<Enrollee, Error> {
        let password = match &mode {
            Mode::PushButton => pin::PBC_PASSWORD.to_vec(),
            Mode::Pin(p) => {
                if !pin::is_valid(p) {
                    return Err(Error::BadArgument("PIN must be 8 digits with a valid checksum"));
                }
                p.as_bytes().to_vec()
            }
        };
        let mut uuid_e = [0u8; 16];
        uuid_e.copy_from_slice(&crypto_utils::sha256(&own_mac)[..16]);
        Ok(Enrollee {
            mode,
            password,
            device,
            rf_bands,
            own_mac,
            peer_mac,
            uuid_e,
            state: State::Idle,
            eap_id: 0,
            dh: None,
            enrollee_nonce: [0; NONCE_LEN],
            registrar_nonce: [0; NONCE_LEN],
            registrar_uuid: None,
            peer_public_key: vec![],
            keys: None,
            psk1: [0; 16],
            psk2: [0; 16],
            e_snonce1: [0; NONCE_LEN],
            e_snonce2: [0; NONCE_LEN],
            r_hash1: [0; 32],
            r_hash2: [0; 32],
            last_tx_msg: vec![],
        })
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Generates the per-exchange secrets and opens the EAPOL conversation.
    pub fn start(&mut self, update_sink: &mut UpdateSink) -> Result<(), Error> {
        if self.state != State::Idle {
            return Err(Error::BadArgument("exchange already started"));
        }
        self.dh = Some(dh::KeyPair::generate());
        self.enrollee_nonce = crypto_utils::random_nonce();
        update_sink
            .push(Update::TxEapolFrame(eapol::write_eapol_start(&self.peer_mac, &self.own_mac)));
        self.state = State::Started;
        Ok(())
    }

    /// Moves the exchange to its aborted terminal state and releases all
    /// secret material.
    pub fn abort(&mut self) {
        if !self.state.is_terminal() {
            self.state = State::Aborted;
            self.wipe();
        }
    }

    /// Marks the exchange timed out; the caller owns the deadline policy.
    pub fn timed_out(&mut self) {
        if !self.state.is_terminal() {
            self.state = State::TimedOut;
            self.wipe();
        }
    }

    /// Processes one captured frame from the EAPOL port. On a protocol
    /// failure the exchange transitions to `Failed`, a NACK is emitted when
    /// the session is far enough along to address one, and the error is
    /// returned to the caller.
    pub fn on_eapol_frame(&mut self, update_sink: &mut UpdateSink, frame: &[u8]) -> Result<(), Error> {
        if self.state.is_terminal() {
            debug!("dropping frame received after terminal WSC state");
            return Ok(());
        }
        match self.handle_frame(update_sink, frame) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("WSC exchange failed: {}", e);
                self.fail(update_sink, &e);
                Err(e)
            }
        }
    }

    fn handle_frame(&mut self, update_sink: &mut UpdateSink, frame: &[u8]) -> Result<(), Error> {
        let parsed = match eapol::parse(frame) {
            Some(parsed) => parsed,
            // Not WSC-related; unrelated EAPOL traffic is dropped silently.
            None => return Ok(()),
        };
        match parsed {
            eapol::Frame::IdentityRequest { eap_id } => {
                self.eap_id = eap_id;
                update_sink.push(Update::TxEapolFrame(eapol::write_identity_response(
                    &self.peer_mac,
                    &self.own_mac,
                    eap_id,
                    eapol::WSC_ENROLLEE_IDENTITY,
                )));
                Ok(())
            }
            eapol::Frame::EapFailure => {
                if self.state == State::Done {
                    // The registrar closes a successful exchange with
                    // EAP-Failure after WSC_Done.
                    Ok(())
                } else {
                    Err(Error::ReceivedEapFail)
                }
            }
            eapol::Frame::EapSuccess => Ok(()),
            eapol::Frame::Wsc(wsc) => {
                self.eap_id = wsc.eap_id;
                match wsc.op_code {
                    OpCode::Start => self.handle_wsc_start(update_sink),
                    OpCode::Msg => {
                        let payload = wsc.payload.to_vec();
                        self.handle_msg(update_sink, &payload)
                    }
                    OpCode::Nack => self.handle_nack(wsc.payload),
                    OpCode::Ack | OpCode::Done | OpCode::FragAck => Ok(()),
                }
            }
        }
    }

    fn handle_wsc_start(&mut self, update_sink: &mut UpdateSink) -> Result<(), Error> {
        if self.state != State::Started {
            debug!("ignoring duplicate WSC-Start");
            return Ok(());
        }
        let password_id = match self.mode {
            Mode::PushButton => attr::password_id::PUSH_BUTTON,
            Mode::Pin(_) => attr::password_id::DEFAULT_PIN,
        };
        let dh = self.dh.as_ref().expect("DH keypair exists after start()");
        let m1 = message::build_m1(
            &self.uuid_e,
            &self.own_mac,
            &self.enrollee_nonce,
            dh.public_key(),
            &self.device,
            password_id,
            self.rf_bands,
        );
        self.send_msg(update_sink, OpCode::Msg, &m1)?;
        self.last_tx_msg = m1;
        self.state = State::M1Sent;
        Ok(())
    }

    fn handle_msg(&mut self, update_sink: &mut UpdateSink, payload: &[u8]) -> Result<(), Error> {
        let msg_type = message::message_type(payload)?;
        message::check_version(payload)?;
        match (self.state, msg_type) {
            (State::M1Sent, t) if t == attr::msg::M2 => self.handle_m2(update_sink, payload),
            (State::M1Sent, t) if t == attr::msg::M2D => self.handle_m2d(update_sink, payload),
            (State::M3Sent, t) if t == attr::msg::M4 => self.handle_m4(update_sink, payload),
            (State::M5Sent, t) if t == attr::msg::M6 => self.handle_m6(update_sink, payload),
            (State::M7Sent, t) if t == attr::msg::M8 => self.handle_m8(update_sink, payload),
            (state, got) => Err(Error::IncorrectMessage {
                expected: state.expected_msg().unwrap_or(attr::msg::M2),
                got,
            }),
        }
    }

    /// M2D: the registrar is present but not yet ready for us. Acknowledge
    /// and keep waiting; the caller's deadline bounds the wait.
    fn handle_m2d(&mut self, update_sink: &mut UpdateSink, payload: &[u8]) -> Result<(), Error> {
        let uuid_r = tlv::read_bytes::<16>(payload, attr::UUID_R)?;
        self.note_registrar(&uuid_r)?;
        let registrar_nonce = tlv::read_bytes::<16>(payload, attr::REGISTRAR_NONCE)?;
        let mut ack = message::start_message(attr::msg::WSC_ACK);
        tlv::write_value(&mut ack, attr::ENROLLEE_NONCE, tlv::TlvValue::Bytes(&self.enrollee_nonce));
        tlv::write_value(&mut ack, attr::REGISTRAR_NONCE, tlv::TlvValue::Bytes(&registrar_nonce));
        message::append_vendor_extension(&mut ack);
        self.send_msg(update_sink, OpCode::Ack, &ack)
    }

    fn handle_m2(&mut self, update_sink: &mut UpdateSink, payload: &[u8]) -> Result<(), Error> {
        let echoed = tlv::read_bytes::<NONCE_LEN>(payload, attr::ENROLLEE_NONCE)?;
        if echoed != self.enrollee_nonce {
            return Err(Error::EnrolleeNonceMismatch);
        }
        let uuid_r = tlv::read_bytes::<16>(payload, attr::UUID_R)?;
        self.note_registrar(&uuid_r)?;

        self.registrar_nonce = tlv::read_bytes::<NONCE_LEN>(payload, attr::REGISTRAR_NONCE)?;
        self.peer_public_key = tlv::find_tlv16(payload, attr::PUBLIC_KEY)
            .ok_or(Error::MissingTlv(attr::PUBLIC_KEY))?
            .to_vec();

        // The DH shared secret is known once M2's public value arrives;
        // derive the session keys here and reuse them for the rest of the
        // exchange.
        let dh = self.dh.as_ref().expect("DH keypair exists after start()");
        let dh_key = dh.dh_key(&self.peer_public_key)?;
        let keys = crypto_utils::derive_session_keys(
            &dh_key,
            &self.enrollee_nonce,
            &self.own_mac,
            &self.registrar_nonce,
        );
        message::verify_authenticator(&keys.auth_key, &self.last_tx_msg, payload)?;

        let (psk1, psk2) = crypto_utils::psk_halves(&keys.auth_key, &self.password);
        self.psk1 = psk1;
        self.psk2 = psk2;
        self.e_snonce1 = crypto_utils::random_nonce();
        self.e_snonce2 = crypto_utils::random_nonce();
        let pk_e = self.dh.as_ref().expect("DH keypair exists after start()").public_key().to_vec();
        let e_hash1 = crypto_utils::hmac_sha256(
            &keys.auth_key,
            &[&self.e_snonce1, &self.psk1, &pk_e, &self.peer_public_key],
        );
        let e_hash2 = crypto_utils::hmac_sha256(
            &keys.auth_key,
            &[&self.e_snonce2, &self.psk2, &pk_e, &self.peer_public_key],
        );

        let m3 = message::build_m3(
            &self.registrar_nonce,
            &e_hash1,
            &e_hash2,
            &keys.auth_key,
            payload,
        );
        self.keys = Some(keys);
        self.send_msg(update_sink, OpCode::Msg, &m3)?;
        self.last_tx_msg = m3;
        self.state = State::M3Sent;
        Ok(())
    }

    fn handle_m4(&mut self, update_sink: &mut UpdateSink, payload: &[u8]) -> Result<(), Error> {
        self.check_inbound(payload)?;
        self.r_hash1 = tlv::read_bytes::<32>(payload, attr::R_HASH1)?;
        self.r_hash2 = tlv::read_bytes::<32>(payload, attr::R_HASH2)?;
        let r_snonce1 = self.decrypt_secret_nonce(payload, attr::R_SNONCE1)?;
        self.verify_registrar_proof(&r_snonce1, &self.psk1, &self.r_hash1)?;

        let keys = self.keys.as_ref().expect("session keys exist past M2");
        let m5 = message::build_proof_message(
            attr::msg::M5,
            &self.registrar_nonce,
            attr::E_SNONCE1,
            &self.e_snonce1,
            keys,
            payload,
        )?;
        self.send_msg(update_sink, OpCode::Msg, &m5)?;
        self.last_tx_msg = m5;
        self.state = State::M5Sent;
        Ok(())
    }

    fn handle_m6(&mut self, update_sink: &mut UpdateSink, payload: &[u8]) -> Result<(), Error> {
        self.check_inbound(payload)?;
        let r_snonce2 = self.decrypt_secret_nonce(payload, attr::R_SNONCE2)?;
        self.verify_registrar_proof(&r_snonce2, &self.psk2, &self.r_hash2)?;

        let keys = self.keys.as_ref().expect("session keys exist past M2");
        let m7 = message::build_proof_message(
            attr::msg::M7,
            &self.registrar_nonce,
            attr::E_SNONCE2,
            &self.e_snonce2,
            keys,
            payload,
        )?;
        self.send_msg(update_sink, OpCode::Msg, &m7)?;
        self.last_tx_msg = m7;
        self.state = State::M7Sent;
        Ok(())
    }

    fn handle_m8(&mut self, update_sink: &mut UpdateSink, payload: &[u8]) -> Result<(), Error> {
        self.check_inbound(payload)?;
        let keys = self.keys.as_ref().expect("session keys exist past M2");
        let value = tlv::find_tlv16(payload, attr::ENCRYPTED_SETTINGS)
            .ok_or(Error::MissingTlv(attr::ENCRYPTED_SETTINGS))?;
        let mut settings = message::unwrap_encrypted_settings(keys, value)?;
        let result = credential::parse_all(&settings);
        crypto_utils::zero(&mut settings);
        let credentials = result?;
        if credentials.len() > 2 {
            return Err(Error::ReceivedInvalidCredentials);
        }

        let done = message::build_done(&self.enrollee_nonce, &self.registrar_nonce);
        self.send_msg(update_sink, OpCode::Done, &done)?;
        self.state = State::Done;
        self.wipe();
        update_sink.push(Update::Complete(credentials));
        Ok(())
    }

    fn handle_nack(&mut self, payload: &[u8]) -> Result<(), Error> {
        if self.keys.is_some() {
            let nonce = tlv::read_bytes::<NONCE_LEN>(payload, attr::REGISTRAR_NONCE)?;
            if nonce != self.registrar_nonce {
                return Err(Error::RegistrarNonceMismatch);
            }
        }
        let config_error = tlv::read_u16(payload, attr::CONFIG_ERROR).unwrap_or(0);
        Err(Error::Nack(config_error))
    }

    /// Records the registrar identity; under push-button mode a second
    /// registrar claiming the session is a PBC overlap.
    fn note_registrar(&mut self, uuid_r: &[u8; 16]) -> Result<(), Error> {
        match &self.registrar_uuid {
            Some(known) if known != uuid_r && self.mode == Mode::PushButton => {
                Err(Error::PbcOverlap)
            }
            Some(_) => Ok(()),
            None => {
                self.registrar_uuid = Some(*uuid_r);
                Ok(())
            }
        }
    }

    /// Checks the attributes every post-M2 registrar message must satisfy:
    /// our nonce echoed back and a valid authenticator chained over the
    /// previous message.
    fn check_inbound(&self, payload: &[u8]) -> Result<(), Error> {
        let echoed = tlv::read_bytes::<NONCE_LEN>(payload, attr::ENROLLEE_NONCE)?;
        if echoed != self.enrollee_nonce {
            return Err(Error::EnrolleeNonceMismatch);
        }
        let keys = self.keys.as_ref().expect("session keys exist past M2");
        message::verify_authenticator(&keys.auth_key, &self.last_tx_msg, payload)
    }

    fn decrypt_secret_nonce(&self, payload: &[u8], id: u16) -> Result<[u8; NONCE_LEN], Error> {
        let keys = self.keys.as_ref().expect("session keys exist past M2");
        let value = tlv::find_tlv16(payload, attr::ENCRYPTED_SETTINGS)
            .ok_or(Error::MissingTlv(attr::ENCRYPTED_SETTINGS))?;
        let mut settings = message::unwrap_encrypted_settings(keys, value)?;
        let nonce = tlv::read_bytes::<NONCE_LEN>(&settings, id);
        crypto_utils::zero(&mut settings);
        nonce
    }

    /// Verifies the registrar's knowledge of the device password: the
    /// revealed secret nonce must hash back to its earlier commitment.
    fn verify_registrar_proof(
        &self,
        r_snonce: &[u8; NONCE_LEN],
        psk: &[u8; 16],
        committed: &[u8; 32],
    ) -> Result<(), Error> {
        let keys = self.keys.as_ref().expect("session keys exist past M2");
        let pk_e = self.dh.as_ref().expect("DH keypair exists after start()").public_key();
        let proof = crypto_utils::hmac_sha256(
            &keys.auth_key,
            &[r_snonce, psk, pk_e, &self.peer_public_key],
        );
        if &proof != committed {
            return Err(Error::SecretNonceMismatch);
        }
        Ok(())
    }

    fn send_msg(
        &self,
        update_sink: &mut UpdateSink,
        op_code: OpCode,
        payload: &[u8],
    ) -> Result<(), Error> {
        let frame = eapol::write_wsc_frame(
            &self.peer_mac,
            &self.own_mac,
            EapCode::Response,
            self.eap_id,
            op_code,
            payload,
        )?;
        update_sink.push(Update::TxEapolFrame(frame));
        Ok(())
    }

    fn fail(&mut self, update_sink: &mut UpdateSink, error: &Error) {
        if self.keys.is_some() {
            let nack = message::build_nack(
                &self.enrollee_nonce,
                &self.registrar_nonce,
                config_error_for(error),
            );
            // Best effort; the exchange is failed regardless.
            let _ = self.send_msg(update_sink, OpCode::Nack, &nack);
        }
        self.state = State::Failed;
        self.wipe();
    }

    /// Zeroes every piece of secret material. Runs on all terminal
    /// transitions and again on drop.
    fn wipe(&mut self) {
        crypto_utils::zero(&mut self.password);
        crypto_utils::zero(&mut self.psk1);
        crypto_utils::zero(&mut self.psk2);
        crypto_utils::zero(&mut self.e_snonce1);
        crypto_utils::zero(&mut self.e_snonce2);
        crypto_utils::zero(&mut self.enrollee_nonce);
        crypto_utils::zero(&mut self.registrar_nonce);
        self.keys = None;
        self.dh = None;
    }
}

impl Drop for Enrollee {
    fn drop(&mut self) {
        self.wipe();
    }
}

/// Configuration Error code reported in a NACK for a terminal failure.
/// Wi-Fi Simple Configuration Technical Specification v2.0.7, Table 36.
fn config_error_for(error: &Error) -> u16 {
    match error {
        Error::Crypto | Error::EncryptedTlvHmacFail => 2, // decryption CRC failure
        Error::PbcOverlap => 12,                          // multiple PBC sessions
        Error::Timeout => 16,                             // message timeout
        Error::HmacCheckFail
        | Error::SecretNonceMismatch
        | Error::EnrolleeNonceMismatch
        | Error::RegistrarNonceMismatch => 18, // device password auth failure
        _ => 0,
    }
}
