// Copyright 2020 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Diffie-Hellman key agreement over the 1536-bit MODP group.
//!
//! WSC fixes the group to RFC 3526 group 5 with generator 2. Public values
//! travel as 192-byte big-endian strings, left-padded with zeros; the
//! derived DHKey is SHA-256 of the 192-byte shared secret.

use num::bigint::{BigUint, RandBigInt};
use num::{One, Zero};

use super::sha256;
use crate::Error;

/// Byte length of the group: public keys and shared secrets are exchanged
/// as exactly this many big-endian bytes.
pub const KEY_LEN: usize = 192;

const GENERATOR: u32 = 2;

/// RFC 3526, section 2: the 1536-bit MODP group prime.
const MODP_1536_PRIME_HEX: &[u8] = b"\
FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74\
020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437\
4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF05\
98DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB\
9ED529077096966D670C354E4ABC9804F1746C08CA237327FFFFFFFFFFFFFFFF";

fn prime() -> BigUint {
    BigUint::parse_bytes(MODP_1536_PRIME_HEX, 16).expect("the group prime is a valid hex literal")
}

fn to_be_key(n: &BigUint) -> [u8; KEY_LEN] {
    let bytes = n.to_bytes_be();
    let mut out = [0u8; KEY_LEN];
    out[KEY_LEN - bytes.len()..].copy_from_slice(&bytes);
    out
}

/// A fresh private/public value pair, generated once per exchange.
pub struct KeyPair {
    private: BigUint,
    public: [u8; KEY_LEN],
}

impl KeyPair {
    pub fn generate() -> KeyPair {
        let p = prime();
        let mut rng = rand::thread_rng();
        let one = BigUint::one();
        let private = loop {
            let candidate = rng.gen_biguint_below(&p);
            if candidate > one {
                break candidate;
            }
        };
        let public = BigUint::from(GENERATOR).modpow(&private, &p);
        KeyPair { private, public: to_be_key(&public) }
    }

    pub fn public_key(&self) -> &[u8; KEY_LEN] {
        &self.public
    }

    /// Computes DHKey = SHA-256(peer^private mod p). The peer value must be
    /// exactly 192 bytes and lie strictly between 1 and p-1; degenerate
    /// values would fix the shared secret and are rejected.
    pub fn dh_key(&self, peer_public: &[u8]) -> Result<[u8; 32], Error> {
        if peer_public.len() != KEY_LEN {
            return Err(Error::Crypto);
        }
        let p = prime();
        let peer = BigUint::from_bytes_be(peer_public);
        let one = BigUint::one();
        if peer <= one || peer >= &p - &one {
            return Err(Error::Crypto);
        }
        let shared = peer.modpow(&self.private, &p);
        if shared.is_zero() {
            return Err(Error::Crypto);
        }
        Ok(sha256(&to_be_key(&shared)))
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        // Best effort: BigUint offers no in-place wipe, so release the
        // private exponent eagerly and clear the owned buffer.
        self.private = BigUint::zero();
        super::zero(&mut self.public);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_sides_agree_on_the_shared_key() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let k_ab = a.dh_key(b.public_key()).unwrap();
        let k_ba = b.dh_key(a.public_key()).unwrap();
        assert_eq!(k_ab, k_ba);
    }

    #[test]
    fn public_keys_are_full_width_and_fresh() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        assert_eq!(a.public_key().len(), KEY_LEN);
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn degenerate_peer_values_are_rejected() {
        let a = KeyPair::generate();
        let mut zero_key = [0u8; KEY_LEN];
        assert_eq!(a.dh_key(&zero_key), Err(Error::Crypto));
        zero_key[KEY_LEN - 1] = 1;
        assert_eq!(a.dh_key(&zero_key), Err(Error::Crypto));
        assert_eq!(a.dh_key(&[0u8; 191]), Err(Error::Crypto));
        let p_minus_1 = prime() - BigUint::one();
        assert_eq!(a.dh_key(&to_be_key(&p_minus_1)), Err(Error::Crypto));
    }
}
