// Copyright 2020 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Wi-Fi Simple Configuration (WSC, also marketed as WPS) enrollee engine.
//!
//! The enrollee obtains network credentials from a registrar over an
//! EAP-WSC exchange (M1..M8). This crate owns the protocol: TLV attribute
//! codec, Diffie-Hellman key agreement and the derived session keys,
//! message construction/validation, and the linear enrollee state machine.
//! Transport (association, EAPOL tx/rx, timeouts) belongs to the caller.

use thiserror::Error;

pub mod attr;
pub mod credential;
pub mod crypto_utils;
pub mod device;
pub mod enrollee;
pub mod message;
pub mod pin;
pub mod tlv;

#[cfg(test)]
mod test_util;

pub use credential::Credential;
pub use device::{DeviceCategory, DeviceDetail};
pub use enrollee::{Enrollee, Mode, State, Update, UpdateSink};

/// Terminal failures of a WSC exchange. None of these are retried
/// internally; the caller tears down and may start a fresh exchange.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("exchange timed out")]
    Timeout,
    #[error("exchange aborted")]
    Aborted,
    #[error("bad argument: {0}")]
    BadArgument(&'static str),
    #[error("PBC session overlap: multiple active registrars")]
    PbcOverlap,
    #[error("message authenticator check failed")]
    HmacCheckFail,
    #[error("encrypted settings key wrap authenticator check failed")]
    EncryptedTlvHmacFail,
    #[error("registrar proof does not match its hash commitment")]
    SecretNonceMismatch,
    #[error("enrollee nonce mismatch")]
    EnrolleeNonceMismatch,
    #[error("registrar nonce mismatch")]
    RegistrarNonceMismatch,
    #[error("unsupported protocol version {0:#04x}")]
    VersionMismatch(u8),
    #[error("cryptographic operation failed")]
    Crypto,
    #[error("required attribute {0:#06x} missing or malformed")]
    MissingTlv(u16),
    #[error("expected message {expected:#04x}, received {got:#04x}")]
    IncorrectMessage { expected: u8, got: u8 },
    #[error("runt WSC packet")]
    RuntPacket,
    #[error("received EAP-Failure from registrar")]
    ReceivedEapFail,
    #[error("registrar aborted with NACK, configuration error {0}")]
    Nack(u16),
    #[error("received WEP credentials, rejected as insecure")]
    ReceivedWepCredentials,
    #[error("received invalid credentials")]
    ReceivedInvalidCredentials,
    #[error("error framing EAPOL packet")]
    CreatingEapolPacket,
}

impl From<eapol::Error> for Error {
    fn from(_: eapol::Error) -> Self {
        Error::CreatingEapolPacket
    }
}
