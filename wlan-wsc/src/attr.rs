// Copyright 2020 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! WSC attribute identifiers and enumerated values.
//!
//! Wi-Fi Simple Configuration Technical Specification v2.0.7, Section 12,
//! Table 28 (attributes) and Table 34 (message types).

pub const AP_CHANNEL: u16 = 0x1001;
pub const ASSOCIATION_STATE: u16 = 0x1002;
pub const AUTH_TYPE: u16 = 0x1003;
pub const AUTH_TYPE_FLAGS: u16 = 0x1004;
pub const AUTHENTICATOR: u16 = 0x1005;
pub const CONFIG_METHODS: u16 = 0x1008;
pub const CONFIG_ERROR: u16 = 0x1009;
pub const CONN_TYPE_FLAGS: u16 = 0x100D;
pub const CREDENTIAL: u16 = 0x100E;
pub const ENCR_TYPE: u16 = 0x100F;
pub const ENCR_TYPE_FLAGS: u16 = 0x1010;
pub const DEVICE_NAME: u16 = 0x1011;
pub const DEVICE_PASSWORD_ID: u16 = 0x1012;
pub const E_HASH1: u16 = 0x1014;
pub const E_HASH2: u16 = 0x1015;
pub const E_SNONCE1: u16 = 0x1016;
pub const E_SNONCE2: u16 = 0x1017;
pub const ENCRYPTED_SETTINGS: u16 = 0x1018;
pub const ENROLLEE_NONCE: u16 = 0x101A;
pub const KEY_WRAP_AUTHENTICATOR: u16 = 0x101E;
pub const MAC_ADDRESS: u16 = 0x1020;
pub const MANUFACTURER: u16 = 0x1021;
pub const MESSAGE_TYPE: u16 = 0x1022;
pub const MODEL_NAME: u16 = 0x1023;
pub const MODEL_NUMBER: u16 = 0x1024;
pub const NETWORK_INDEX: u16 = 0x1026;
pub const NETWORK_KEY: u16 = 0x1027;
pub const NETWORK_KEY_INDEX: u16 = 0x1028;
pub const OS_VERSION: u16 = 0x102D;
pub const PUBLIC_KEY: u16 = 0x1032;
pub const REGISTRAR_NONCE: u16 = 0x1039;
pub const REQUEST_TYPE: u16 = 0x103A;
pub const RESPONSE_TYPE: u16 = 0x103B;
pub const RF_BANDS: u16 = 0x103C;
pub const R_HASH1: u16 = 0x103D;
pub const R_HASH2: u16 = 0x103E;
pub const R_SNONCE1: u16 = 0x103F;
pub const R_SNONCE2: u16 = 0x1040;
pub const SELECTED_REGISTRAR: u16 = 0x1041;
pub const SERIAL_NUMBER: u16 = 0x1042;
pub const SIMPLE_CONFIG_STATE: u16 = 0x1044;
pub const SSID: u16 = 0x1045;
pub const UUID_E: u16 = 0x1047;
pub const UUID_R: u16 = 0x1048;
pub const VENDOR_EXTENSION: u16 = 0x1049;
pub const VERSION: u16 = 0x104A;
pub const PRIMARY_DEVICE_TYPE: u16 = 0x1054;

/// Version attribute value: 0x10 means 1.0. Version 2.x is signalled via the
/// Version2 subelement of the WFA vendor extension instead.
pub const VERSION_1_0: u8 = 0x10;
pub const VERSION_2_0: u8 = 0x20;

/// WFA vendor extension: 3-byte id followed by 8-bit subelements.
pub const WFA_VENDOR_EXT_ID: [u8; 3] = [0x00, 0x37, 0x2A];
pub const VENDOR_EXT_VERSION2: u8 = 0x00;

/// Message Type values, Table 34.
pub mod msg {
    pub const M1: u8 = 0x04;
    pub const M2: u8 = 0x05;
    pub const M2D: u8 = 0x06;
    pub const M3: u8 = 0x07;
    pub const M4: u8 = 0x08;
    pub const M5: u8 = 0x09;
    pub const M6: u8 = 0x0A;
    pub const M7: u8 = 0x0B;
    pub const M8: u8 = 0x0C;
    pub const WSC_ACK: u8 = 0x0D;
    pub const WSC_NACK: u8 = 0x0E;
    pub const WSC_DONE: u8 = 0x0F;
}

/// Authentication Type(-Flags) bits, Table 32.
pub mod auth {
    pub const OPEN: u16 = 0x0001;
    pub const WPA_PSK: u16 = 0x0002;
    pub const SHARED: u16 = 0x0004;
    pub const WPA: u16 = 0x0008;
    pub const WPA2: u16 = 0x0010;
    pub const WPA2_PSK: u16 = 0x0020;
    pub const WPA2_WPA_PSK_MIXED: u16 = 0x0022;
}

/// Encryption Type(-Flags) bits, Table 33.
pub mod encr {
    pub const NONE: u16 = 0x0001;
    pub const WEP: u16 = 0x0002;
    pub const TKIP: u16 = 0x0004;
    pub const AES: u16 = 0x0008;
    pub const MIXED: u16 = 0x000C;
}

/// Device Password ID values, Table 37.
pub mod password_id {
    pub const DEFAULT_PIN: u16 = 0x0000;
    pub const USER_SPECIFIED: u16 = 0x0001;
    pub const PUSH_BUTTON: u16 = 0x0004;
}

/// Connection Type flags: ESS only for a station enrollee.
pub const CONN_TYPE_ESS: u8 = 0x01;

/// Association/configuration states advertised in M1.
pub const ASSOC_STATE_NOT_ASSOCIATED: u16 = 0x0000;
pub const CONFIG_ERROR_NONE: u16 = 0x0000;
pub const SIMPLE_CONFIG_STATE_UNCONFIGURED: u8 = 0x01;

/// RF Bands bits.
pub const RF_BAND_2_4GHZ: u8 = 0x01;
pub const RF_BAND_5GHZ: u8 = 0x02;

/// OUI used inside the Primary Device Type attribute.
pub const PRIMARY_DEVICE_OUI: [u8; 4] = [0x00, 0x50, 0xF2, 0x04];
