// Copyright 2020 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Credentials recovered from the registrar's final message.

use crate::{attr, tlv, Error};

pub const MAX_SSID_LEN: usize = 32;
pub const MAX_KEY_LEN: usize = 64;

/// One provisioned network: a dual-band registrar may deliver two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub ssid: Vec<u8>,
    /// Authentication Type attribute value (attr::auth bits).
    pub auth_type: u16,
    /// Encryption Type attribute value (attr::encr bits).
    pub encr_type: u16,
    /// The network key; empty for open networks.
    pub network_key: Vec<u8>,
}

impl Credential {
    pub fn is_open(&self) -> bool {
        self.auth_type == attr::auth::OPEN && self.encr_type & attr::encr::WEP == 0
    }

    fn is_wep(&self) -> bool {
        self.encr_type & attr::encr::WEP != 0 || self.auth_type == attr::auth::SHARED
    }

    /// Parses one Credential attribute value (a nested TLV stream).
    fn parse(value: &[u8]) -> Result<Credential, Error> {
        let ssid = tlv::find_tlv16(value, attr::SSID)
            .ok_or(Error::MissingTlv(attr::SSID))?
            .to_vec();
        let auth_type = tlv::read_u16(value, attr::AUTH_TYPE)?;
        let encr_type = tlv::read_u16(value, attr::ENCR_TYPE)?;
        // The key may be legitimately absent for open networks.
        let network_key =
            tlv::find_tlv16(value, attr::NETWORK_KEY).map(|k| k.to_vec()).unwrap_or_default();

        let credential = Credential { ssid, auth_type, encr_type, network_key };
        credential.validate()?;
        Ok(credential)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.is_wep() {
            return Err(Error::ReceivedWepCredentials);
        }
        if self.ssid.is_empty() || self.ssid.len() > MAX_SSID_LEN {
            return Err(Error::ReceivedInvalidCredentials);
        }
        if self.network_key.len() > MAX_KEY_LEN {
            return Err(Error::ReceivedInvalidCredentials);
        }
        if !self.is_open() && self.network_key.is_empty() {
            return Err(Error::ReceivedInvalidCredentials);
        }
        Ok(())
    }

}

impl Drop for Credential {
    fn drop(&mut self) {
        crate::crypto_utils::zero(&mut self.network_key);
    }
}

/// Extracts the ordered credential list from a decrypted settings stream.
/// Registrars send one Credential attribute per provisioned band.
pub fn parse_all(settings: &[u8]) -> Result<Vec<Credential>, Error> {
    let mut credentials = vec![];
    let mut rest = settings;
    while !rest.is_empty() {
        let hdr = rest.get(..tlv::TLV16_HDR_LEN).ok_or(Error::RuntPacket)?;
        let rec_type = u16::from_be_bytes([hdr[0], hdr[1]]);
        let rec_len = u16::from_be_bytes([hdr[2], hdr[3]]) as usize;
        let value = rest
            .get(tlv::TLV16_HDR_LEN..tlv::TLV16_HDR_LEN + rec_len)
            .ok_or(Error::RuntPacket)?;
        if rec_type == attr::CREDENTIAL {
            credentials.push(Credential::parse(value)?);
        }
        rest = &rest[tlv::TLV16_HDR_LEN + rec_len..];
    }
    if credentials.is_empty() {
        return Err(Error::MissingTlv(attr::CREDENTIAL));
    }
    Ok(credentials)
}
