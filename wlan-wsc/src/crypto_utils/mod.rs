// Copyright 2020 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Cryptographic capability for the WSC exchange: SHA-256, HMAC-SHA-256,
//! AES-CBC with PKCS#7 padding, and the WSC key derivation chain.

pub mod dh;

use aes::{Aes128, Aes256};
use block_modes::block_padding::Pkcs7;
use block_modes::{BlockMode, Cbc};
use hmac::{Hmac, Mac, NewMac};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::Error;

type HmacSha256 = Hmac<Sha256>;

/// Personalization label of the WSC key derivation function.
/// Wi-Fi Simple Configuration Technical Specification v2.0.7, 7.5.
const KDF_LABEL: &[u8] = b"Wi-Fi Easy and Secure Key Derivation";

/// Total bits produced by the KDF: AuthKey || KeyWrapKey || EMSK.
const KDF_OUTPUT_BITS: u32 = 640;

pub const NONCE_LEN: usize = 16;
pub const IV_LEN: usize = 16;

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

/// HMAC-SHA-256 over the concatenation of `parts`.
pub fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut mac =
        HmacSha256::new_from_slice(key).expect("HMAC-SHA-256 accepts keys of any length");
    for part in parts {
        mac.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// AES-CBC encryption with PKCS#7 padding; the key width (128 or 256 bits)
/// selects the cipher. An exact multiple of the block size gains a full pad
/// block, matching the wire behavior registrars expect.
pub fn aes_cbc_encrypt(key: &[u8], iv: &[u8; IV_LEN], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
    match key.len() {
        16 => {
            let cipher =
                Cbc::<Aes128, Pkcs7>::new_from_slices(key, iv).map_err(|_| Error::Crypto)?;
            Ok(cipher.encrypt_vec(plaintext))
        }
        32 => {
            let cipher =
                Cbc::<Aes256, Pkcs7>::new_from_slices(key, iv).map_err(|_| Error::Crypto)?;
            Ok(cipher.encrypt_vec(plaintext))
        }
        _ => Err(Error::Crypto),
    }
}

/// AES-CBC decryption; strips the PKCS#7 pad. Empty, unaligned, or badly
/// padded ciphertexts fail with `Error::Crypto` and are never retried.
pub fn aes_cbc_decrypt(key: &[u8], iv: &[u8; IV_LEN], ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
    if ciphertext.is_empty() || ciphertext.len() % 16 != 0 {
        return Err(Error::Crypto);
    }
    match key.len() {
        16 => {
            let cipher =
                Cbc::<Aes128, Pkcs7>::new_from_slices(key, iv).map_err(|_| Error::Crypto)?;
            cipher.decrypt_vec(ciphertext).map_err(|_| Error::Crypto)
        }
        32 => {
            let cipher =
                Cbc::<Aes256, Pkcs7>::new_from_slices(key, iv).map_err(|_| Error::Crypto)?;
            cipher.decrypt_vec(ciphertext).map_err(|_| Error::Crypto)
        }
        _ => Err(Error::Crypto),
    }
}

pub fn random_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

pub fn random_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    iv
}

/// Overwrites secret material in place before it is released.
pub fn zero(bytes: &mut [u8]) {
    for b in bytes.iter_mut() {
        *b = 0;
    }
}

/// Session keys derived once per exchange, after M2's DH public value is
/// known, and reused for every subsequent message. Zeroed on drop.
pub struct SessionKeys {
    pub auth_key: [u8; 32],
    pub key_wrap_key: [u8; 16],
    pub emsk: [u8; 32],
}

impl Drop for SessionKeys {
    fn drop(&mut self) {
        zero(&mut self.auth_key);
        zero(&mut self.key_wrap_key);
        zero(&mut self.emsk);
    }
}

/// Derives the session keys from the DH-derived key and both nonces:
///   KDK  = HMAC-SHA-256_DHKey(N1 || EnrolleeMAC || N2)
///   keys = kdf(KDK, label, 640 bits) = AuthKey(256) || KeyWrapKey(128) ||
///          EMSK(256)
pub fn derive_session_keys(
    dh_key: &[u8; 32],
    enrollee_nonce: &[u8; NONCE_LEN],
    enrollee_mac: &[u8; 6],
    registrar_nonce: &[u8; NONCE_LEN],
) -> SessionKeys {
    let kdk = hmac_sha256(dh_key, &[enrollee_nonce, enrollee_mac, registrar_nonce]);
    let stream = kdf(&kdk, KDF_OUTPUT_BITS);

    let mut keys = SessionKeys { auth_key: [0; 32], key_wrap_key: [0; 16], emsk: [0; 32] };
    keys.auth_key.copy_from_slice(&stream[0..32]);
    keys.key_wrap_key.copy_from_slice(&stream[32..48]);
    keys.emsk.copy_from_slice(&stream[48..80]);
    keys
}

/// The WSC 640-bit key expansion: each 256-bit block i is
/// HMAC-SHA-256_key(be32(i) || label || be32(total_bits)).
fn kdf(key: &[u8; 32], bits: u32) -> Vec<u8> {
    let iterations = (bits + 255) / 256;
    let mut out = Vec::with_capacity((iterations * 32) as usize);
    for i in 1..=iterations {
        let block = hmac_sha256(key, &[&i.to_be_bytes(), KDF_LABEL, &bits.to_be_bytes()]);
        out.extend_from_slice(&block);
    }
    out.truncate((bits / 8) as usize);
    out
}

/// PSK1/PSK2: the first 128 bits of HMAC_AuthKey over each half of the
/// device password. An odd-length password puts the longer half first.
pub fn psk_halves(auth_key: &[u8; 32], password: &[u8]) -> ([u8; 16], [u8; 16]) {
    let split = (password.len() + 1) / 2;
    let h1 = hmac_sha256(auth_key, &[&password[..split]]);
    let h2 = hmac_sha256(auth_key, &[&password[split..]]);
    let mut psk1 = [0u8; 16];
    let mut psk2 = [0u8; 16];
    psk1.copy_from_slice(&h1[..16]);
    psk2.copy_from_slice(&h2[..16]);
    (psk1, psk2)
}
