// Copyright 2020 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! A fake registrar for exercising the enrollee against the real crypto
//! from the peer side of the exchange.

use crate::crypto_utils::{self, dh, SessionKeys, NONCE_LEN};
use crate::message;
use crate::tlv::{self, TlvValue};
use crate::attr;

use eapol::{EapCode, MacAddr, OpCode};

pub const ENROLLEE_MAC: MacAddr = [0x02, 0x11, 0x22, 0x33, 0x44, 0x55];
pub const REGISTRAR_MAC: MacAddr = [0x02, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE];
pub const FAKE_SSID: &[u8] = b"FakeNetwork";
pub const FAKE_SSID_5G: &[u8] = b"FakeNetwork5G";
pub const FAKE_KEY: &[u8] = b"setec astronomy";

const REGISTRAR_EAP_ID: u8 = 10;

/// Builds a registrar-side EAP Request/Identity frame.
pub fn identity_request() -> Vec<u8> {
    let mut frame = vec![];
    frame.extend_from_slice(&ENROLLEE_MAC);
    frame.extend_from_slice(&REGISTRAR_MAC);
    frame.extend_from_slice(&eapol::ETH_P_EAPOL.to_be_bytes());
    frame.extend_from_slice(&[eapol::EAPOL_VERSION, 0, 0, 5]);
    frame.extend_from_slice(&[EapCode::Request as u8, 1, 0, 5, eapol::EAP_TYPE_IDENTITY]);
    frame
}

pub fn wsc_start() -> Vec<u8> {
    eapol::write_wsc_frame(
        &ENROLLEE_MAC,
        &REGISTRAR_MAC,
        EapCode::Request,
        REGISTRAR_EAP_ID,
        OpCode::Start,
        &[],
    )
    .expect("empty payload fits the MTU")
}

pub fn wsc_msg(payload: &[u8]) -> Vec<u8> {
    eapol::write_wsc_frame(
        &ENROLLEE_MAC,
        &REGISTRAR_MAC,
        EapCode::Request,
        REGISTRAR_EAP_ID,
        OpCode::Msg,
        payload,
    )
    .expect("payload fits the MTU")
}

pub fn wsc_nack(payload: &[u8]) -> Vec<u8> {
    eapol::write_wsc_frame(
        &ENROLLEE_MAC,
        &REGISTRAR_MAC,
        EapCode::Request,
        REGISTRAR_EAP_ID,
        OpCode::Nack,
        payload,
    )
    .expect("payload fits the MTU")
}

pub fn eap_failure() -> Vec<u8> {
    let mut frame = vec![];
    frame.extend_from_slice(&ENROLLEE_MAC);
    frame.extend_from_slice(&REGISTRAR_MAC);
    frame.extend_from_slice(&eapol::ETH_P_EAPOL.to_be_bytes());
    frame.extend_from_slice(&[eapol::EAPOL_VERSION, 0, 0, 4]);
    frame.extend_from_slice(&[EapCode::Failure as u8, 1, 0, 4]);
    frame
}

pub struct FakeRegistrar {
    pub uuid_r: [u8; 16],
    pub dual_band: bool,
    pub corrupt_key_wrap: bool,
    pub wep_credential: bool,

    password: Vec<u8>,
    dh: dh::KeyPair,
    registrar_nonce: [u8; NONCE_LEN],
    r_snonce1: [u8; NONCE_LEN],
    r_snonce2: [u8; NONCE_LEN],
    enrollee_mac: MacAddr,
    enrollee_nonce: [u8; NONCE_LEN],
    peer_public_key: Vec<u8>,
    keys: Option<SessionKeys>,
    psk1: [u8; 16],
    psk2: [u8; 16],
    e_hash1: [u8; 32],
    e_hash2: [u8; 32],
    last_tx_msg: Vec<u8>,
}

impl FakeRegistrar {
    pub fn new(password: &[u8]) -> FakeRegistrar {
        FakeRegistrar {
            uuid_r: [0xCC; 16],
            dual_band: false,
            corrupt_key_wrap: false,
            wep_credential: false,
            password: password.to_vec(),
            dh: dh::KeyPair::generate(),
            registrar_nonce: crypto_utils::random_nonce(),
            r_snonce1: crypto_utils::random_nonce(),
            r_snonce2: crypto_utils::random_nonce(),
            enrollee_mac: [0; 6],
            enrollee_nonce: [0; NONCE_LEN],
            peer_public_key: vec![],
            keys: None,
            psk1: [0; 16],
            psk2: [0; 16],
            e_hash1: [0; 32],
            e_hash2: [0; 32],
            last_tx_msg: vec![],
        }
    }

    fn keys(&self) -> &SessionKeys {
        self.keys.as_ref().expect("registrar keys derived after M1")
    }

    pub fn build_m2d(&self) -> Vec<u8> {
        let mut m2d = message::start_message(attr::msg::M2D);
        tlv::write_value(&mut m2d, attr::REGISTRAR_NONCE, TlvValue::Bytes(&self.registrar_nonce));
        tlv::write_value(&mut m2d, attr::UUID_R, TlvValue::Bytes(&self.uuid_r));
        m2d
    }

    pub fn build_m2(&mut self, m1: &[u8]) -> Vec<u8> {
        self.enrollee_nonce =
            tlv::read_bytes::<NONCE_LEN>(m1, attr::ENROLLEE_NONCE).expect("M1 carries a nonce");
        self.enrollee_mac =
            tlv::read_bytes::<6>(m1, attr::MAC_ADDRESS).expect("M1 carries a MAC");
        self.peer_public_key =
            tlv::find_tlv16(m1, attr::PUBLIC_KEY).expect("M1 carries a public key").to_vec();

        let dh_key = self.dh.dh_key(&self.peer_public_key).expect("valid enrollee public key");
        let keys = crypto_utils::derive_session_keys(
            &dh_key,
            &self.enrollee_nonce,
            &self.enrollee_mac,
            &self.registrar_nonce,
        );
        let (psk1, psk2) = crypto_utils::psk_halves(&keys.auth_key, &self.password);
        self.psk1 = psk1;
        self.psk2 = psk2;

        let mut m2 = message::start_message(attr::msg::M2);
        tlv::write_value(&mut m2, attr::ENROLLEE_NONCE, TlvValue::Bytes(&self.enrollee_nonce));
        tlv::write_value(&mut m2, attr::REGISTRAR_NONCE, TlvValue::Bytes(&self.registrar_nonce));
        tlv::write_value(&mut m2, attr::UUID_R, TlvValue::Bytes(&self.uuid_r));
        tlv::write_value(&mut m2, attr::PUBLIC_KEY, TlvValue::Bytes(self.dh.public_key()));
        tlv::write_value(&mut m2, attr::AUTH_TYPE_FLAGS, TlvValue::U16(attr::auth::WPA2_PSK));
        tlv::write_value(&mut m2, attr::ENCR_TYPE_FLAGS, TlvValue::U16(attr::encr::AES));
        tlv::write_value(&mut m2, attr::CONN_TYPE_FLAGS, TlvValue::U8(attr::CONN_TYPE_ESS));
        tlv::write_value(&mut m2, attr::CONFIG_METHODS, TlvValue::U16(0x0080));
        tlv::write_value(
            &mut m2,
            attr::DEVICE_PASSWORD_ID,
            TlvValue::U16(attr::password_id::PUSH_BUTTON),
        );
        message::append_vendor_extension(&mut m2);
        message::append_authenticator(&mut m2, &keys.auth_key, m1);
        self.keys = Some(keys);
        self.last_tx_msg = m2.clone();
        m2
    }

    pub fn build_m4(&mut self, m3: &[u8]) -> Vec<u8> {
        message::verify_authenticator(&self.keys().auth_key, &self.last_tx_msg, m3)
            .expect("enrollee M3 authenticator verifies");
        self.e_hash1 = tlv::read_bytes::<32>(m3, attr::E_HASH1).expect("M3 carries E-Hash1");
        self.e_hash2 = tlv::read_bytes::<32>(m3, attr::E_HASH2).expect("M3 carries E-Hash2");

        let r_hash1 = crypto_utils::hmac_sha256(
            &self.keys().auth_key,
            &[&self.r_snonce1, &self.psk1, &self.peer_public_key, self.dh.public_key()],
        );
        let r_hash2 = crypto_utils::hmac_sha256(
            &self.keys().auth_key,
            &[&self.r_snonce2, &self.psk2, &self.peer_public_key, self.dh.public_key()],
        );

        let mut m4 = message::start_message(attr::msg::M4);
        tlv::write_value(&mut m4, attr::ENROLLEE_NONCE, TlvValue::Bytes(&self.enrollee_nonce));
        tlv::write_value(&mut m4, attr::R_HASH1, TlvValue::Bytes(&r_hash1));
        tlv::write_value(&mut m4, attr::R_HASH2, TlvValue::Bytes(&r_hash2));
        let mut inner = vec![];
        tlv::write_value(&mut inner, attr::R_SNONCE1, TlvValue::Bytes(&self.r_snonce1));
        self.append_settings(&mut m4, inner);
        message::append_vendor_extension(&mut m4);
        message::append_authenticator(&mut m4, &self.keys().auth_key, m3);
        self.last_tx_msg = m4.clone();
        m4
    }

    pub fn build_m6(&mut self, m5: &[u8]) -> Vec<u8> {
        message::verify_authenticator(&self.keys().auth_key, &self.last_tx_msg, m5)
            .expect("enrollee M5 authenticator verifies");
        let e_snonce1 = self.decrypt_nonce(m5, attr::E_SNONCE1);
        let proof = crypto_utils::hmac_sha256(
            &self.keys().auth_key,
            &[&e_snonce1, &self.psk1, &self.peer_public_key, self.dh.public_key()],
        );
        assert_eq!(proof, self.e_hash1, "enrollee proof must match its commitment");

        let mut m6 = message::start_message(attr::msg::M6);
        tlv::write_value(&mut m6, attr::ENROLLEE_NONCE, TlvValue::Bytes(&self.enrollee_nonce));
        let mut inner = vec![];
        tlv::write_value(&mut inner, attr::R_SNONCE2, TlvValue::Bytes(&self.r_snonce2));
        self.append_settings(&mut m6, inner);
        message::append_vendor_extension(&mut m6);
        message::append_authenticator(&mut m6, &self.keys().auth_key, m5);
        self.last_tx_msg = m6.clone();
        m6
    }

    pub fn build_m8(&mut self, m7: &[u8]) -> Vec<u8> {
        message::verify_authenticator(&self.keys().auth_key, &self.last_tx_msg, m7)
            .expect("enrollee M7 authenticator verifies");
        let e_snonce2 = self.decrypt_nonce(m7, attr::E_SNONCE2);
        let proof = crypto_utils::hmac_sha256(
            &self.keys().auth_key,
            &[&e_snonce2, &self.psk2, &self.peer_public_key, self.dh.public_key()],
        );
        assert_eq!(proof, self.e_hash2, "enrollee proof must match its commitment");

        let encr_type =
            if self.wep_credential { attr::encr::WEP } else { attr::encr::AES };
        let mut inner = credential_attr(FAKE_SSID, attr::auth::WPA2_PSK, encr_type, FAKE_KEY);
        if self.dual_band {
            inner.extend(credential_attr(FAKE_SSID_5G, attr::auth::WPA2_PSK, encr_type, FAKE_KEY));
        }
        let mut m8 = message::start_message(attr::msg::M8);
        tlv::write_value(&mut m8, attr::ENROLLEE_NONCE, TlvValue::Bytes(&self.enrollee_nonce));
        self.append_settings(&mut m8, inner);
        message::append_vendor_extension(&mut m8);
        message::append_authenticator(&mut m8, &self.keys().auth_key, m7);
        self.last_tx_msg = m8.clone();
        m8
    }

    fn append_settings(&self, buf: &mut Vec<u8>, inner: Vec<u8>) {
        let before = buf.len();
        message::append_encrypted_settings(buf, self.keys(), inner)
            .expect("settings encrypt");
        if self.corrupt_key_wrap {
            // Flip one ciphertext byte past the attribute header and IV; the
            // enrollee must reject the settings.
            let at = before + tlv::TLV16_HDR_LEN + crypto_utils::IV_LEN;
            buf[at] ^= 0x01;
        }
    }

    fn decrypt_nonce(&self, msg: &[u8], id: u16) -> [u8; NONCE_LEN] {
        let value = tlv::find_tlv16(msg, attr::ENCRYPTED_SETTINGS)
            .expect("message carries encrypted settings");
        let settings = message::unwrap_encrypted_settings(self.keys(), value)
            .expect("enrollee settings decrypt");
        tlv::read_bytes::<NONCE_LEN>(&settings, id).expect("secret nonce present")
    }
}

/// A serialized Credential attribute with the given contents.
fn credential_attr(ssid: &[u8], auth: u16, encr: u16, key: &[u8]) -> Vec<u8> {
    let mut inner = vec![];
    tlv::write_value(&mut inner, attr::NETWORK_INDEX, TlvValue::U8(1));
    tlv::write_value(&mut inner, attr::SSID, TlvValue::Bytes(ssid));
    tlv::write_value(&mut inner, attr::AUTH_TYPE, TlvValue::U16(auth));
    tlv::write_value(&mut inner, attr::ENCR_TYPE, TlvValue::U16(encr));
    tlv::write_value(&mut inner, attr::NETWORK_KEY, TlvValue::Bytes(key));
    let mut buf = vec![];
    tlv::write_header(&mut buf, attr::CREDENTIAL, inner.len() as u16);
    buf.extend_from_slice(&inner);
    buf
}
