// Copyright 2020 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Static descriptor of the enrollee device, advertised in M1.

/// Wi-Fi Simple Configuration Technical Specification v2.0.7, Table 41.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCategory {
    Computer = 1,
    Input = 2,
    PrintScanFaxCopy = 3,
    Camera = 4,
    Storage = 5,
    NetworkInfrastructure = 6,
    Display = 7,
    Multimedia = 8,
    Gaming = 9,
    Telephone = 10,
    Audio = 11,
    Dock = 12,
    Other = 0xFF,
}

/// Config Methods bits, Table 35. A device advertises the union of the
/// methods it supports.
pub mod config_methods {
    pub const USBA: u16 = 0x0001;
    pub const ETHERNET: u16 = 0x0002;
    pub const LABEL: u16 = 0x0004;
    pub const DISPLAY: u16 = 0x0008;
    pub const EXTERNAL_NFC_TOKEN: u16 = 0x0010;
    pub const INTEGRATED_NFC_TOKEN: u16 = 0x0020;
    pub const NFC_INTERFACE: u16 = 0x0040;
    pub const PUSH_BUTTON: u16 = 0x0080;
    pub const KEYPAD: u16 = 0x0100;
    pub const VIRTUAL_PUSH_BUTTON: u16 = 0x0280;
    pub const PHYSICAL_PUSH_BUTTON: u16 = 0x0480;
    pub const VIRTUAL_DISPLAY_PIN: u16 = 0x2008;
    pub const PHYSICAL_DISPLAY_PIN: u16 = 0x4008;
}

/// Manufacturing details of this device carried in M1. Strings longer than
/// their attribute limits are truncated at build time.
#[derive(Debug, Clone)]
pub struct DeviceDetail {
    pub category: DeviceCategory,
    pub sub_category: u16,
    pub device_name: String,
    pub manufacturer: String,
    pub model_name: String,
    pub model_number: String,
    pub serial_number: String,
    pub config_methods: u16,
    pub os_version: u32,
    pub authentication_type_flags: u16,
    pub encryption_type_flags: u16,
}

impl Default for DeviceDetail {
    fn default() -> Self {
        DeviceDetail {
            category: DeviceCategory::Computer,
            sub_category: 1,
            device_name: "embedded".to_string(),
            manufacturer: "unknown".to_string(),
            model_name: "unknown".to_string(),
            model_number: "0".to_string(),
            serial_number: "0".to_string(),
            config_methods: config_methods::VIRTUAL_PUSH_BUTTON
                | config_methods::VIRTUAL_DISPLAY_PIN,
            os_version: 0x8000_0000,
            authentication_type_flags: crate::attr::auth::OPEN
                | crate::attr::auth::WPA_PSK
                | crate::attr::auth::WPA2_PSK,
            encryption_type_flags: crate::attr::encr::NONE
                | crate::attr::encr::TKIP
                | crate::attr::encr::AES,
        }
    }
}
