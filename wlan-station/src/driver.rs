// Copyright 2020 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The seam between the connection manager and its external collaborators:
//! the radio driver firmware interface and the host IP stack.
//!
//! Both are capability traits owned by the manager. Collaborator failures
//! cross the seam as opaque `anyhow::Error`s; the manager maps them onto
//! its own error space. Asynchronous driver callbacks never touch manager
//! state directly: they post events through an [`EventSink`], and the
//! manager's serialized worker applies them one at a time in arrival order.

use std::net::Ipv4Addr;

use crate::sink::UnboundedSink;
use crate::{Band, MacAddr, ScanFilter, ScanResult, SecurityType, Ssid, StaticIpSettings};

/// Driver-side security constants, the station's view of the firmware's
/// security encoding. Every [`SecurityType`] maps onto its own distinct
/// constant here; see `to_driver_security`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverSecurity {
    Open,
    WepPsk,
    WepShared,
    WpaTkipPsk,
    WpaAesPsk,
    WpaMixedPsk,
    Wpa2AesPsk,
    Wpa2TkipPsk,
    Wpa2MixedPsk,
    Wpa2FbtPsk,
    Wpa3Sae,
    Wpa3Wpa2Psk,
    IbssOpen,
    WpsSecure,
}

/// Maps the public security selection onto the driver constant. Each PSK
/// variant keeps its own mapping; collapsing them loses the cipher
/// selection the firmware needs for key plumbing.
pub fn to_driver_security(security: SecurityType) -> Option<DriverSecurity> {
    match security {
        SecurityType::Open => Some(DriverSecurity::Open),
        SecurityType::WepPsk => Some(DriverSecurity::WepPsk),
        SecurityType::WepShared => Some(DriverSecurity::WepShared),
        SecurityType::WpaTkipPsk => Some(DriverSecurity::WpaTkipPsk),
        SecurityType::WpaAesPsk => Some(DriverSecurity::WpaAesPsk),
        SecurityType::WpaMixedPsk => Some(DriverSecurity::WpaMixedPsk),
        SecurityType::Wpa2AesPsk => Some(DriverSecurity::Wpa2AesPsk),
        SecurityType::Wpa2TkipPsk => Some(DriverSecurity::Wpa2TkipPsk),
        SecurityType::Wpa2MixedPsk => Some(DriverSecurity::Wpa2MixedPsk),
        SecurityType::Wpa2FbtPsk => Some(DriverSecurity::Wpa2FbtPsk),
        SecurityType::Wpa3Sae => Some(DriverSecurity::Wpa3Sae),
        SecurityType::Wpa3Wpa2Psk => Some(DriverSecurity::Wpa3Wpa2Psk),
        SecurityType::IbssOpen => Some(DriverSecurity::IbssOpen),
        SecurityType::WpsSecure => Some(DriverSecurity::WpsSecure),
        SecurityType::Unknown => None,
    }
}

/// Link events reported by the driver firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// WLC_E_LINK with the link flag up or down.
    Link { up: bool },
    DeauthInd,
    DisassocInd,
    /// WLC_E_PSK_SUP: supplicant key-exchange progress.
    PskSup { status: SupStatus, reason: SupReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupStatus {
    /// WLC_SUP_KEYED: pairwise and group keys are plumbed.
    Keyed,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupReason {
    /// WLC_E_SUP_OTHER: unqualified success.
    SupOther,
    /// WLC_E_SUP_MSG3_TOO_MANY_IE: the firmware disassociates internally
    /// and will not retry; the host must re-join.
    Msg3TooManyIe,
    Other,
}

/// Progress of an in-flight scan, one event per discovered network.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanUpdate {
    Result(ScanResult),
    Complete,
    Aborted,
}

/// Everything the driver and IP stack report back into the worker.
#[derive(Debug, PartialEq)]
pub enum DriverEvent {
    Link(LinkEvent),
    Scan(ScanUpdate),
    IpChanged,
}

pub(crate) enum Work {
    Driver(DriverEvent),
    Shutdown,
}

/// The sink handed to collaborators for event delivery. Events are queued
/// and applied by the serialized worker in FIFO order.
#[derive(Clone)]
pub struct EventSink {
    sink: UnboundedSink<Work>,
}

impl EventSink {
    pub(crate) fn new(sink: UnboundedSink<Work>) -> Self {
        EventSink { sink }
    }

    pub fn send(&self, event: DriverEvent) {
        self.sink.send(Work::Driver(event));
    }
}

/// Token returned by link-event registration, passed back to deregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHandlerId(pub u32);

/// The radio driver firmware interface: scan/join/leave primitives, event
/// subscription, and the EAPOL port used by the WPS exchange.
pub trait WifiDriver: Send + Sync {
    fn scan(&self, filter: &ScanFilter, events: EventSink) -> Result<(), anyhow::Error>;
    fn stop_scan(&self) -> Result<(), anyhow::Error>;

    fn set_band(&self, band: Band) -> Result<(), anyhow::Error>;
    /// Whether the platform radio supports the 5 GHz band.
    fn supports_5ghz(&self) -> Result<bool, anyhow::Error>;

    /// Directed join by SSID; the band preference was applied beforehand
    /// through `set_band`.
    fn join(&self, ssid: &Ssid, security: DriverSecurity, key: &[u8]) -> Result<(), anyhow::Error>;
    /// Join a specific BSS by BSSID.
    fn join_specific(
        &self,
        ssid: &Ssid,
        bssid: &MacAddr,
        security: DriverSecurity,
        key: &[u8],
    ) -> Result<(), anyhow::Error>;
    fn leave(&self) -> Result<(), anyhow::Error>;

    fn mac_address(&self) -> Result<MacAddr, anyhow::Error>;
    /// SSID of the currently associated BSS, if any.
    fn current_ssid(&self) -> Result<Option<Ssid>, anyhow::Error>;

    fn register_link_events(&self, events: EventSink) -> Result<EventHandlerId, anyhow::Error>;
    fn deregister_link_events(&self, id: EventHandlerId) -> Result<(), anyhow::Error>;

    fn send_eapol(&self, frame: &[u8]) -> Result<(), anyhow::Error>;
    fn register_eapol_rx(&self, frames: UnboundedSink<Vec<u8>>) -> Result<(), anyhow::Error>;
    fn deregister_eapol_rx(&self);
}

/// The host TCP/IP stack: interface lifecycle, address assignment, and
/// address-change notification.
pub trait NetworkStack: Send + Sync {
    /// Attaches the station interface, configured statically when
    /// `static_ip` is given, for DHCP otherwise.
    fn add_interface(&self, static_ip: Option<&StaticIpSettings>) -> Result<(), anyhow::Error>;
    fn remove_interface(&self) -> Result<(), anyhow::Error>;
    fn bring_up(&self) -> Result<(), anyhow::Error>;
    fn bring_down(&self) -> Result<(), anyhow::Error>;
    fn dhcp_renew(&self) -> Result<(), anyhow::Error>;
    /// The interface's current IPv4 address, once bound.
    fn ip_address(&self) -> Option<Ipv4Addr>;
    /// Subscribes the worker to address-change notifications.
    fn register_ip_change(&self, events: EventSink);
}
