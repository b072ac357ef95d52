// Copyright 2020 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! WSC message construction and the integrity layers shared by M1..M8.
//!
//! Two HMAC layers protect the exchange. The Authenticator attribute closes
//! every registration message after M1: the first 8 bytes of
//! HMAC-SHA-256_AuthKey(previous message || current message without the
//! authenticator attribute). Encrypted Settings carry a second, inner Key
//! Wrap Authenticator over the decrypted attribute stream.

use crate::crypto_utils::{self, SessionKeys, IV_LEN, NONCE_LEN};
use crate::device::DeviceDetail;
use crate::tlv::{self, TlvValue};
use crate::{attr, Error};

/// Wire length of the truncated HMAC in both authenticator attributes.
pub const AUTHENTICATOR_LEN: usize = 8;

/// A trailing authenticator record: 4 header bytes plus the 8-byte HMAC.
const AUTHENTICATOR_RECORD_LEN: usize = tlv::TLV16_HDR_LEN + AUTHENTICATOR_LEN;

/// Attribute limits, Wi-Fi Simple Configuration Technical Specification
/// v2.0.7, Section 12, Table 28.
const DEVICE_NAME_MAX_LEN: usize = 32;
const MANUFACTURER_MAX_LEN: usize = 64;
const MODEL_NAME_MAX_LEN: usize = 32;
const MODEL_NUMBER_MAX_LEN: usize = 32;
const SERIAL_NUMBER_MAX_LEN: usize = 32;

/// A message too short to even hold its version and type attributes.
const MIN_MESSAGE_LEN: usize = 10;

fn truncated(s: &str, max: usize) -> &[u8] {
    &s.as_bytes()[..s.len().min(max)]
}

/// Starts a message buffer with the attributes every message leads with.
pub fn start_message(msg_type: u8) -> Vec<u8> {
    let mut buf = vec![];
    tlv::write_value(&mut buf, attr::VERSION, TlvValue::U8(attr::VERSION_1_0));
    tlv::write_value(&mut buf, attr::MESSAGE_TYPE, TlvValue::U8(msg_type));
    buf
}

/// Appends the WFA vendor extension advertising version 2.0.
pub fn append_vendor_extension(buf: &mut Vec<u8>) {
    let mut ext = vec![];
    ext.extend_from_slice(&attr::WFA_VENDOR_EXT_ID);
    ext.push(attr::VENDOR_EXT_VERSION2);
    ext.push(1);
    ext.push(attr::VERSION_2_0);
    tlv::write_value(buf, attr::VENDOR_EXTENSION, TlvValue::Bytes(&ext));
}

/// Reads the Message Type attribute; a buffer too short to carry the
/// leading attributes is classified as a runt rather than a missing TLV.
pub fn message_type(payload: &[u8]) -> Result<u8, Error> {
    if payload.len() < MIN_MESSAGE_LEN {
        return Err(Error::RuntPacket);
    }
    tlv::read_u8(payload, attr::MESSAGE_TYPE)
}

/// Validates the Version attribute. Registrars advertise 0x10 or, for
/// WSC 2.0, 0x20 in the deprecated field; anything else is rejected.
pub fn check_version(payload: &[u8]) -> Result<(), Error> {
    let version = tlv::read_u8(payload, attr::VERSION)?;
    match version {
        attr::VERSION_1_0 | attr::VERSION_2_0 => Ok(()),
        other => Err(Error::VersionMismatch(other)),
    }
}

/// Appends the closing Authenticator attribute over `prev_msg || buf`.
pub fn append_authenticator(buf: &mut Vec<u8>, auth_key: &[u8; 32], prev_msg: &[u8]) {
    let mac = crypto_utils::hmac_sha256(auth_key, &[prev_msg, buf]);
    tlv::write_value(buf, attr::AUTHENTICATOR, TlvValue::Bytes(&mac[..AUTHENTICATOR_LEN]));
}

/// Verifies the trailing Authenticator attribute of `msg` against the
/// previous message. The attribute must be present and must be the last
/// record of the stream.
pub fn verify_authenticator(auth_key: &[u8; 32], prev_msg: &[u8], msg: &[u8]) -> Result<(), Error> {
    if msg.len() < AUTHENTICATOR_RECORD_LEN {
        return Err(Error::RuntPacket);
    }
    let (body, record) = msg.split_at(msg.len() - AUTHENTICATOR_RECORD_LEN);
    let claimed = tlv::find_tlv16(record, attr::AUTHENTICATOR)
        .ok_or(Error::MissingTlv(attr::AUTHENTICATOR))?;
    if claimed.len() != AUTHENTICATOR_LEN {
        return Err(Error::MissingTlv(attr::AUTHENTICATOR));
    }
    let expected = crypto_utils::hmac_sha256(auth_key, &[prev_msg, body]);
    if claimed != &expected[..AUTHENTICATOR_LEN] {
        return Err(Error::HmacCheckFail);
    }
    Ok(())
}

/// Appends an Encrypted Settings attribute: `inner` gains a Key Wrap
/// Authenticator, is AES-CBC encrypted under the key wrap key with a fresh
/// random IV, and travels as IV || ciphertext.
pub fn append_encrypted_settings(
    buf: &mut Vec<u8>,
    keys: &SessionKeys,
    mut inner: Vec<u8>,
) -> Result<(), Error> {
    let kwa = crypto_utils::hmac_sha256(&keys.auth_key, &[&inner]);
    tlv::write_value(&mut inner, attr::KEY_WRAP_AUTHENTICATOR, TlvValue::Bytes(&kwa[..AUTHENTICATOR_LEN]));
    let iv = crypto_utils::random_iv();
    let ciphertext = crypto_utils::aes_cbc_encrypt(&keys.key_wrap_key, &iv, &inner)?;
    crypto_utils::zero(&mut inner);
    let mut value = Vec::with_capacity(IV_LEN + ciphertext.len());
    value.extend_from_slice(&iv);
    value.extend_from_slice(&ciphertext);
    tlv::write_value(buf, attr::ENCRYPTED_SETTINGS, TlvValue::Bytes(&value));
    Ok(())
}

/// Decrypts an Encrypted Settings value and verifies its Key Wrap
/// Authenticator; returns the plaintext attribute stream without the KWA.
pub fn unwrap_encrypted_settings(keys: &SessionKeys, value: &[u8]) -> Result<Vec<u8>, Error> {
    if value.len() <= IV_LEN {
        return Err(Error::RuntPacket);
    }
    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(&value[..IV_LEN]);
    let mut plaintext = crypto_utils::aes_cbc_decrypt(&keys.key_wrap_key, &iv, &value[IV_LEN..])?;
    if plaintext.len() < AUTHENTICATOR_RECORD_LEN {
        crypto_utils::zero(&mut plaintext);
        return Err(Error::EncryptedTlvHmacFail);
    }
    let body_len = plaintext.len() - AUTHENTICATOR_RECORD_LEN;
    let claimed = match tlv::find_tlv16(&plaintext[body_len..], attr::KEY_WRAP_AUTHENTICATOR) {
        Some(v) if v.len() == AUTHENTICATOR_LEN => v,
        _ => {
            crypto_utils::zero(&mut plaintext);
            return Err(Error::EncryptedTlvHmacFail);
        }
    };
    let expected = crypto_utils::hmac_sha256(&keys.auth_key, &[&plaintext[..body_len]]);
    if claimed != &expected[..AUTHENTICATOR_LEN] {
        crypto_utils::zero(&mut plaintext);
        return Err(Error::EncryptedTlvHmacFail);
    }
    plaintext.truncate(body_len);
    Ok(plaintext)
}

/// Builds M1. Wi-Fi Simple Configuration Technical Specification v2.0.7,
/// 8.3.1: the enrollee announces its identity, nonce, DH public value, and
/// capabilities.
#[allow(clippy::too_many_arguments)]
pub fn build_m1(
    uuid_e: &[u8; 16],
    mac: &[u8; 6],
    enrollee_nonce: &[u8; NONCE_LEN],
    public_key: &[u8],
    device: &DeviceDetail,
    password_id: u16,
    rf_bands: u8,
) -> Vec<u8> {
    let mut buf = start_message(attr::msg::M1);
    tlv::write_value(&mut buf, attr::UUID_E, TlvValue::Bytes(uuid_e));
    tlv::write_value(&mut buf, attr::MAC_ADDRESS, TlvValue::Bytes(mac));
    tlv::write_value(&mut buf, attr::ENROLLEE_NONCE, TlvValue::Bytes(enrollee_nonce));
    tlv::write_value(&mut buf, attr::PUBLIC_KEY, TlvValue::Bytes(public_key));
    tlv::write_value(&mut buf, attr::AUTH_TYPE_FLAGS, TlvValue::U16(device.authentication_type_flags));
    tlv::write_value(&mut buf, attr::ENCR_TYPE_FLAGS, TlvValue::U16(device.encryption_type_flags));
    tlv::write_value(&mut buf, attr::CONN_TYPE_FLAGS, TlvValue::U8(attr::CONN_TYPE_ESS));
    tlv::write_value(&mut buf, attr::CONFIG_METHODS, TlvValue::U16(device.config_methods));
    tlv::write_value(&mut buf, attr::SIMPLE_CONFIG_STATE, TlvValue::U8(attr::SIMPLE_CONFIG_STATE_UNCONFIGURED));
    tlv::write_value(&mut buf, attr::MANUFACTURER, TlvValue::Bytes(truncated(&device.manufacturer, MANUFACTURER_MAX_LEN)));
    tlv::write_value(&mut buf, attr::MODEL_NAME, TlvValue::Bytes(truncated(&device.model_name, MODEL_NAME_MAX_LEN)));
    tlv::write_value(&mut buf, attr::MODEL_NUMBER, TlvValue::Bytes(truncated(&device.model_number, MODEL_NUMBER_MAX_LEN)));
    tlv::write_value(&mut buf, attr::SERIAL_NUMBER, TlvValue::Bytes(truncated(&device.serial_number, SERIAL_NUMBER_MAX_LEN)));
    let mut primary = vec![];
    primary.extend_from_slice(&(device.category as u16).to_be_bytes());
    primary.extend_from_slice(&attr::PRIMARY_DEVICE_OUI);
    primary.extend_from_slice(&device.sub_category.to_be_bytes());
    tlv::write_value(&mut buf, attr::PRIMARY_DEVICE_TYPE, TlvValue::Bytes(&primary));
    tlv::write_value(&mut buf, attr::DEVICE_NAME, TlvValue::Bytes(truncated(&device.device_name, DEVICE_NAME_MAX_LEN)));
    tlv::write_value(&mut buf, attr::RF_BANDS, TlvValue::U8(rf_bands));
    tlv::write_value(&mut buf, attr::ASSOCIATION_STATE, TlvValue::U16(attr::ASSOC_STATE_NOT_ASSOCIATED));
    tlv::write_value(&mut buf, attr::DEVICE_PASSWORD_ID, TlvValue::U16(password_id));
    tlv::write_value(&mut buf, attr::CONFIG_ERROR, TlvValue::U16(attr::CONFIG_ERROR_NONE));
    tlv::write_value(&mut buf, attr::OS_VERSION, TlvValue::U32(device.os_version | 0x8000_0000));
    append_vendor_extension(&mut buf);
    buf
}

/// Builds M3: the enrollee's hash commitments to its secret nonces.
pub fn build_m3(
    registrar_nonce: &[u8; NONCE_LEN],
    e_hash1: &[u8; 32],
    e_hash2: &[u8; 32],
    auth_key: &[u8; 32],
    prev_msg: &[u8],
) -> Vec<u8> {
    let mut buf = start_message(attr::msg::M3);
    tlv::write_value(&mut buf, attr::REGISTRAR_NONCE, TlvValue::Bytes(registrar_nonce));
    tlv::write_value(&mut buf, attr::E_HASH1, TlvValue::Bytes(e_hash1));
    tlv::write_value(&mut buf, attr::E_HASH2, TlvValue::Bytes(e_hash2));
    append_vendor_extension(&mut buf);
    append_authenticator(&mut buf, auth_key, prev_msg);
    buf
}

/// Builds M5 or M7: proof messages revealing one secret nonce under the key
/// wrap key.
pub fn build_proof_message(
    msg_type: u8,
    registrar_nonce: &[u8; NONCE_LEN],
    secret_nonce_attr: u16,
    secret_nonce: &[u8; NONCE_LEN],
    keys: &SessionKeys,
    prev_msg: &[u8],
) -> Result<Vec<u8>, Error> {
    let mut buf = start_message(msg_type);
    tlv::write_value(&mut buf, attr::REGISTRAR_NONCE, TlvValue::Bytes(registrar_nonce));
    let mut inner = vec![];
    tlv::write_value(&mut inner, secret_nonce_attr, TlvValue::Bytes(secret_nonce));
    append_encrypted_settings(&mut buf, keys, inner)?;
    append_vendor_extension(&mut buf);
    append_authenticator(&mut buf, &keys.auth_key, prev_msg);
    Ok(buf)
}

/// Builds WSC_Done, closing a successful exchange.
pub fn build_done(enrollee_nonce: &[u8; NONCE_LEN], registrar_nonce: &[u8; NONCE_LEN]) -> Vec<u8> {
    let mut buf = start_message(attr::msg::WSC_DONE);
    tlv::write_value(&mut buf, attr::ENROLLEE_NONCE, TlvValue::Bytes(enrollee_nonce));
    tlv::write_value(&mut buf, attr::REGISTRAR_NONCE, TlvValue::Bytes(registrar_nonce));
    append_vendor_extension(&mut buf);
    buf
}

/// Builds WSC_NACK carrying a Configuration Error code.
pub fn build_nack(
    enrollee_nonce: &[u8; NONCE_LEN],
    registrar_nonce: &[u8; NONCE_LEN],
    config_error: u16,
) -> Vec<u8> {
    let mut buf = start_message(attr::msg::WSC_NACK);
    tlv::write_value(&mut buf, attr::ENROLLEE_NONCE, TlvValue::Bytes(enrollee_nonce));
    tlv::write_value(&mut buf, attr::REGISTRAR_NONCE, TlvValue::Bytes(registrar_nonce));
    tlv::write_value(&mut buf, attr::CONFIG_ERROR, TlvValue::U16(config_error));
    append_vendor_extension(&mut buf);
    buf
}
