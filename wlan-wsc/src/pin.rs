// Copyright 2020 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! WPS PIN generation and validation.
//!
//! An 8-digit PIN carries 7 random digits and a trailing checksum digit
//! computed with alternating 3/1 weights (Wi-Fi Simple Configuration
//! Technical Specification v2.0.7, 7.4.3).

use rand::Rng;

pub const PIN_LEN: usize = 8;

/// The fixed device password of push-button mode.
pub const PBC_PASSWORD: &[u8] = b"00000000";

/// Checksum digit for the leading 7 digits.
fn checksum_digit(digits: &[u8]) -> u8 {
    let mut accum = 0u32;
    for (i, d) in digits.iter().enumerate() {
        let weight = if i % 2 == 0 { 3 } else { 1 };
        accum += weight * u32::from(*d);
    }
    ((10 - accum % 10) % 10) as u8
}

/// Generates a checksum-valid 8-digit PIN string.
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    let mut digits = [0u8; PIN_LEN];
    for d in digits.iter_mut().take(PIN_LEN - 1) {
        *d = rng.gen_range(0..10);
    }
    digits[PIN_LEN - 1] = checksum_digit(&digits[..PIN_LEN - 1]);
    digits.iter().map(|d| char::from(b'0' + d)).collect()
}

/// Accepts exactly 8 ASCII digits whose trailing digit satisfies the
/// checksum.
pub fn is_valid(pin: &str) -> bool {
    if pin.len() != PIN_LEN || !pin.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let digits: Vec<u8> = pin.bytes().map(|b| b - b'0').collect();
    checksum_digit(&digits[..PIN_LEN - 1]) == digits[PIN_LEN - 1]
}
