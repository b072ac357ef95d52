// Copyright 2020 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The station link state machine.
//!
//! All methods here run either under the session mutex (public API) or on
//! the serialized worker (driver events and timers), never concurrently.

pub mod scan;
pub mod wps;

#[cfg(test)]
pub(crate) mod test_utils;

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::driver::{
    self, DriverEvent, EventHandlerId, EventSink, LinkEvent, NetworkStack, SupReason, SupStatus,
    WifiDriver,
};
use crate::timer::{EventId, Timer};
use crate::{
    Band, ConnectParams, Error, EventListener, SecurityType, Ssid, StationEvent, StaticIpSettings,
    MAX_EVENT_SUBSCRIBERS, MAX_PASSPHRASE_LEN, MAX_SSID_LEN,
};

use self::scan::ScanSession;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(3000);
const JOIN_RETRY_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF_BASE: Duration = Duration::from_millis(1000);
const RETRY_BACKOFF_MAX: Duration = Duration::from_millis(32000);
const DHCP_POLL_INTERVAL: Duration = Duration::from_millis(100);
const DHCP_WAIT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkState {
    Down,
    Joining,
    Handshaking,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimeoutEvent {
    HandshakeTimeout,
    RetryBackoff,
}

/// AP details snapshotted on a successful connect, reused by the re-join
/// burst. The credential bytes are wiped when the snapshot is released.
#[derive(Clone)]
struct ApSnapshot {
    ssid: Ssid,
    bssid: Option<crate::MacAddr>,
    band: Band,
    security: SecurityType,
    key: Vec<u8>,
    static_ip: Option<StaticIpSettings>,
}

impl Drop for ApSnapshot {
    fn drop(&mut self) {
        wlan_wsc::crypto_utils::zero(&mut self.key);
    }
}

/// How link-up events are classified for a given security selection.
enum SecurityClass {
    /// No key exchange follows association; link-up is immediate.
    NoKeyExchange,
    /// A WPA-family key exchange must confirm before the link is up.
    KeyExchange,
    Unknown,
}

fn classify(security: SecurityType) -> SecurityClass {
    match security {
        SecurityType::Open
        | SecurityType::IbssOpen
        | SecurityType::WpsSecure
        | SecurityType::WepPsk
        | SecurityType::WepShared => SecurityClass::NoKeyExchange,
        SecurityType::WpaTkipPsk
        | SecurityType::WpaAesPsk
        | SecurityType::WpaMixedPsk
        | SecurityType::Wpa2AesPsk
        | SecurityType::Wpa2TkipPsk
        | SecurityType::Wpa2MixedPsk
        | SecurityType::Wpa2FbtPsk
        | SecurityType::Wpa3Sae
        | SecurityType::Wpa3Wpa2Psk => SecurityClass::KeyExchange,
        SecurityType::Unknown => SecurityClass::Unknown,
    }
}

pub struct Station {
    wifi: Arc<dyn WifiDriver>,
    netstack: Arc<dyn NetworkStack>,
    event_sink: EventSink,

    link_state: LinkState,
    security: SecurityType,
    snapshot: Option<ApSnapshot>,
    network_up: bool,
    link_event_handler: Option<EventHandlerId>,
    link_up_event_received: bool,
    too_many_ie_error: bool,
    retry_backoff: Duration,
    handshake_timer: Option<EventId>,
    retry_timer: Option<EventId>,
    pub(crate) timer: Timer<TimeoutEvent>,
    listeners: [Option<Arc<dyn EventListener>>; MAX_EVENT_SUBSCRIBERS],
    pub(crate) scan: ScanSession,

    /// Shrunk by tests; the contract is a 100 ms poll with a 60 s ceiling.
    dhcp_wait: Duration,

    wps_active: bool,
    wps_abort: Arc<AtomicBool>,
}

impl Station {
    pub(crate) fn new(
        wifi: Arc<dyn WifiDriver>,
        netstack: Arc<dyn NetworkStack>,
        event_sink: EventSink,
    ) -> Station {
        Station {
            wifi,
            netstack,
            event_sink,
            link_state: LinkState::Down,
            security: SecurityType::Unknown,
            snapshot: None,
            network_up: false,
            link_event_handler: None,
            link_up_event_received: false,
            too_many_ie_error: false,
            retry_backoff: RETRY_BACKOFF_BASE,
            handshake_timer: None,
            retry_timer: None,
            timer: Timer::new(),
            listeners: Default::default(),
            scan: ScanSession::new(),
            dhcp_wait: DHCP_WAIT,
            wps_active: false,
            wps_abort: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn wifi(&self) -> &Arc<dyn WifiDriver> {
        &self.wifi
    }

    // ---- public API paths (run under the session mutex) ----

    pub(crate) fn connect(&mut self, params: &ConnectParams) -> Result<Ipv4Addr, Error> {
        check_ap_credentials(params)?;
        if self.is_connected_to_same_ap(params) {
            info!("already connected to the requested AP");
            return Ok(self.netstack.ip_address().unwrap_or(Ipv4Addr::UNSPECIFIED));
        }
        if self.link_state == LinkState::Up {
            // A live session to a different AP must come down first; a
            // failure here is a disconnect error, not a silent fallthrough.
            self.disconnect().map_err(|_| Error::StaDisconnectError)?;
        }

        let security =
            driver::to_driver_security(params.security).ok_or(Error::SecurityNotSupported)?;
        self.link_state = LinkState::Joining;
        if let Err(e) = self.join_ap(
            &params.ssid,
            params.bssid.as_ref(),
            params.band,
            security,
            &params.passphrase,
        ) {
            self.link_state = LinkState::Down;
            return Err(e);
        }
        self.security = params.security;

        let ip = if !self.network_up {
            if let Err(e) = self.bring_network_up(params.static_ip.as_ref()) {
                let _ = self.wifi.leave();
                self.link_state = LinkState::Down;
                return Err(e);
            }
            match self.wait_for_dhcp() {
                Ok(ip) => ip,
                Err(_) => {
                    error!("DHCP timed out; tearing the session down");
                    if self.disconnect_internal().is_err() {
                        return Err(Error::StaDisconnectError);
                    }
                    return Err(Error::DhcpTimeout);
                }
            }
        } else {
            self.netstack.ip_address().unwrap_or(Ipv4Addr::UNSPECIFIED)
        };

        match self.wifi.register_link_events(self.event_sink.clone()) {
            Ok(id) => self.link_event_handler = Some(id),
            Err(e) => warn!("link event registration failed: {}", e),
        }
        self.snapshot = Some(ApSnapshot {
            ssid: params.ssid.clone(),
            bssid: params.bssid,
            band: params.band,
            security: params.security,
            key: params.passphrase.clone(),
            static_ip: params.static_ip,
        });
        self.link_state = LinkState::Up;
        Ok(ip)
    }

    pub(crate) fn disconnect(&mut self) -> Result<(), Error> {
        if self.link_state == LinkState::Down {
            self.clear_session();
            return Ok(());
        }
        self.disconnect_internal()
    }

    fn disconnect_internal(&mut self) -> Result<(), Error> {
        if let Some(id) = self.link_event_handler.take() {
            if let Err(e) = self.wifi.deregister_link_events(id) {
                warn!("link event deregistration failed: {}", e);
            }
        }
        self.network_down();
        let result = self.wifi.leave();
        self.clear_session();
        match result {
            Ok(()) => {
                self.link_state = LinkState::Down;
                Ok(())
            }
            Err(e) => {
                error!("driver leave failed: {}", e);
                Err(Error::StaDisconnectError)
            }
        }
    }

    /// Clears the snapshotted AP details (wiping the credential bytes),
    /// cancels the retry machinery, and resets backoff to its floor.
    fn clear_session(&mut self) {
        self.snapshot = None;
        if let Some(id) = self.handshake_timer.take() {
            self.timer.cancel_event(id);
        }
        if let Some(id) = self.retry_timer.take() {
            self.timer.cancel_event(id);
        }
        self.retry_backoff = RETRY_BACKOFF_BASE;
        self.link_up_event_received = false;
        self.too_many_ie_error = false;
    }

    pub(crate) fn ip_address(&self) -> Result<Ipv4Addr, Error> {
        if !self.network_up {
            return Err(Error::NetworkDown);
        }
        match self.netstack.ip_address() {
            Some(ip) if !ip.is_unspecified() => Ok(ip),
            _ => Err(Error::NetworkDown),
        }
    }

    pub(crate) fn register_listener(
        &mut self,
        listener: Arc<dyn EventListener>,
    ) -> Result<(), Error> {
        for slot in self.listeners.iter_mut() {
            if slot.is_none() {
                *slot = Some(listener);
                return Ok(());
            }
        }
        error!("event listener capacity of {} exhausted", MAX_EVENT_SUBSCRIBERS);
        Err(Error::OutOfMemory)
    }

    pub(crate) fn deregister_listener(
        &mut self,
        listener: &Arc<dyn EventListener>,
    ) -> Result<(), Error> {
        for slot in self.listeners.iter_mut() {
            if let Some(existing) = slot {
                if Arc::ptr_eq(existing, listener) {
                    *slot = None;
                    return Ok(());
                }
            }
        }
        warn!("listener to deregister was never registered");
        Err(Error::BadArg)
    }

    pub(crate) fn begin_wps(&mut self) -> Result<Arc<AtomicBool>, Error> {
        if self.wps_active {
            return Err(Error::WpsAlreadyStarted);
        }
        self.wps_active = true;
        self.wps_abort.store(false, Ordering::SeqCst);
        Ok(Arc::clone(&self.wps_abort))
    }

    pub(crate) fn end_wps(&mut self) {
        self.wps_active = false;
    }

    pub(crate) fn wps_abort(&mut self) -> Result<(), Error> {
        if !self.wps_active {
            return Err(Error::BadArg);
        }
        self.wps_abort.store(true, Ordering::SeqCst);
        Ok(())
    }

    // ---- worker paths (serialized event handling) ----

    pub(crate) fn on_driver_event(&mut self, event: DriverEvent) {
        match event {
            DriverEvent::Link(link_event) => self.on_link_event(link_event),
            DriverEvent::Scan(update) => self.on_scan_update(update),
            DriverEvent::IpChanged => self.on_ip_change(),
        }
    }

    pub(crate) fn on_timer(&mut self, now: Instant) {
        for event in self.timer.take_fired(now) {
            match event {
                TimeoutEvent::HandshakeTimeout => {
                    debug!("no key confirmation within the handshake timeout");
                    self.handshake_timer = None;
                    self.handle_handshake_error();
                }
                TimeoutEvent::RetryBackoff => {
                    self.retry_timer = None;
                    self.handle_handshake_error();
                }
            }
        }
    }

    fn on_link_event(&mut self, event: LinkEvent) {
        debug!("link event: {:?}", event);
        match event {
            LinkEvent::Link { up: true } => match classify(self.security) {
                SecurityClass::NoKeyExchange => self.link_up(),
                SecurityClass::KeyExchange => {
                    self.link_up_event_received = true;
                    if self.link_state != LinkState::Up {
                        self.link_state = LinkState::Handshaking;
                    }
                    if let Some(id) = self.handshake_timer.take() {
                        self.timer.cancel_event(id);
                    }
                    self.handshake_timer = Some(
                        self.timer.schedule_event(HANDSHAKE_TIMEOUT, TimeoutEvent::HandshakeTimeout),
                    );
                }
                SecurityClass::Unknown => error!("link up with unclassifiable security type"),
            },
            LinkEvent::Link { up: false } => {
                if self.too_many_ie_error {
                    // The firmware disassociated over an oversized IE set;
                    // re-attempt the stored join instead of reporting a
                    // link loss.
                    self.too_many_ie_error = false;
                    self.handle_handshake_error();
                } else {
                    self.cancel_retry_machinery();
                    self.link_down();
                }
            }
            LinkEvent::DeauthInd | LinkEvent::DisassocInd => self.link_down(),
            LinkEvent::PskSup { status, reason } => {
                if status == SupStatus::Keyed
                    && reason == SupReason::SupOther
                    && self.link_up_event_received
                {
                    // Key exchange confirmed.
                    self.cancel_retry_machinery();
                    self.link_up();
                    self.link_up_event_received = false;
                } else if reason == SupReason::Msg3TooManyIe {
                    self.too_many_ie_error = true;
                }
            }
        }
    }

    fn cancel_retry_machinery(&mut self) {
        if let Some(id) = self.handshake_timer.take() {
            self.timer.cancel_event(id);
        }
        if let Some(id) = self.retry_timer.take() {
            self.timer.cancel_event(id);
        }
        self.retry_backoff = RETRY_BACKOFF_BASE;
    }

    fn link_up(&mut self) {
        if self.link_state != LinkState::Up {
            if let Err(e) = self.netstack.bring_up() {
                error!("network bring-up on link up failed: {}", e);
            }
            self.network_up = true;
            self.link_state = LinkState::Up;
            info!("link is up again");
            self.notify(&StationEvent::Reconnected);
        } else {
            // Reconnected under the application's feet; refresh the lease.
            debug!("renewing DHCP after silent reconnect");
            if let Err(e) = self.netstack.dhcp_renew() {
                error!("DHCP renew failed: {}", e);
            }
        }
    }

    fn link_down(&mut self) {
        if self.link_state == LinkState::Down {
            return;
        }
        if let Err(e) = self.netstack.bring_down() {
            error!("network bring-down on link down failed: {}", e);
        }
        self.network_up = false;
        self.link_state = LinkState::Down;
        info!("link is down");
        self.notify(&StationEvent::Disconnected);
    }

    /// The key exchange did not confirm: leave, burst up to three immediate
    /// re-joins from the snapshot, then fall back to the backoff timer.
    /// Backoff doubles after every exhausted burst (capped) and resets only
    /// on success.
    fn handle_handshake_error(&mut self) {
        if let Some(id) = self.retry_timer.take() {
            self.timer.cancel_event(id);
        }
        let snapshot = match &self.snapshot {
            Some(snapshot) => snapshot.clone(),
            None => return,
        };
        let security = match driver::to_driver_security(snapshot.security) {
            Some(security) => security,
            None => return,
        };
        if let Some(id) = self.link_event_handler.take() {
            let _ = self.wifi.deregister_link_events(id);
        }
        let _ = self.wifi.leave();

        for _ in 0..JOIN_RETRY_ATTEMPTS {
            if self
                .join_ap(&snapshot.ssid, snapshot.bssid.as_ref(), snapshot.band, security, &snapshot.key)
                .is_ok()
            {
                self.security = snapshot.security;
                self.link_up();
                match self.wifi.register_link_events(self.event_sink.clone()) {
                    Ok(id) => self.link_event_handler = Some(id),
                    Err(e) => warn!("link event re-registration failed: {}", e),
                }
                self.retry_backoff = RETRY_BACKOFF_BASE;
                return;
            }
        }

        debug!("re-join burst exhausted; retrying in {:?}", self.retry_backoff);
        self.retry_timer =
            Some(self.timer.schedule_event(self.retry_backoff, TimeoutEvent::RetryBackoff));
        self.retry_backoff = (self.retry_backoff * 2).min(RETRY_BACKOFF_MAX);
    }

    fn on_ip_change(&mut self) {
        if self.link_state != LinkState::Up {
            return;
        }
        if let Some(ip) = self.netstack.ip_address() {
            if !ip.is_unspecified() {
                info!("address changed to {}", ip);
                self.notify(&StationEvent::IpChanged(ip));
            }
        }
    }

    /// Synchronous fan-out to every registered listener, in slot order.
    fn notify(&self, event: &StationEvent) {
        for listener in self.listeners.iter().flatten() {
            listener.on_event(event);
        }
    }

    // ---- helpers ----

    fn is_connected_to_same_ap(&self, params: &ConnectParams) -> bool {
        if self.link_state != LinkState::Up {
            return false;
        }
        match self.wifi.current_ssid() {
            Ok(Some(ssid)) => ssid == params.ssid,
            _ => false,
        }
    }

    fn join_ap(
        &self,
        ssid: &Ssid,
        bssid: Option<&crate::MacAddr>,
        band: Band,
        security: driver::DriverSecurity,
        key: &[u8],
    ) -> Result<(), Error> {
        match bssid {
            Some(bssid) => {
                // With the target BSS pinned there is no band to choose.
                self.wifi.set_band(Band::Any)?;
                self.wifi.join_specific(ssid, bssid, security, key)?;
            }
            None => {
                match band {
                    Band::Band5Ghz => {
                        if !self.wifi.supports_5ghz()? {
                            error!("5 GHz requested on a 2.4 GHz-only platform");
                            return Err(Error::BandNotSupported);
                        }
                        self.wifi.set_band(Band::Band5Ghz)?;
                    }
                    Band::Band2_4Ghz => self.wifi.set_band(Band::Band2_4Ghz)?,
                    Band::Any => self.wifi.set_band(Band::Any)?,
                }
                self.wifi.join(ssid, security, key)?;
            }
        }
        Ok(())
    }

    fn bring_network_up(&mut self, static_ip: Option<&StaticIpSettings>) -> Result<(), Error> {
        self.netstack.add_interface(static_ip).map_err(|e| {
            error!("failed to add the network interface: {}", e);
            Error::NetworkStackError
        })?;
        self.netstack.bring_up().map_err(|e| {
            error!("failed to bring up the network stack: {}", e);
            Error::NetworkStackError
        })?;
        self.network_up = true;
        Ok(())
    }

    fn network_down(&mut self) {
        if let Err(e) = self.netstack.bring_down() {
            warn!("network bring-down failed: {}", e);
        }
        if let Err(e) = self.netstack.remove_interface() {
            warn!("interface removal failed: {}", e);
        }
        self.network_up = false;
    }

    /// Bounded wait for an address: a 100 ms poll against the stack, up to
    /// the configured ceiling. Static configurations satisfy the first
    /// probe immediately.
    fn wait_for_dhcp(&self) -> Result<Ipv4Addr, Error> {
        let deadline = Instant::now() + self.dhcp_wait;
        loop {
            if let Some(ip) = self.netstack.ip_address() {
                if !ip.is_unspecified() {
                    info!("address {} assigned", ip);
                    return Ok(ip);
                }
            }
            if Instant::now() >= deadline {
                return Err(Error::DhcpTimeout);
            }
            thread::sleep(DHCP_POLL_INTERVAL);
        }
    }
}

fn check_ap_credentials(params: &ConnectParams) -> Result<(), Error> {
    if params.ssid.is_empty() || params.ssid.len() > MAX_SSID_LEN {
        error!("SSID length {} out of range", params.ssid.len());
        return Err(Error::BadSsidLen);
    }
    if driver::to_driver_security(params.security).is_none() {
        error!("unsupported security selection");
        return Err(Error::SecurityNotSupported);
    }
    if params.security != SecurityType::Open
        && (params.passphrase.is_empty() || params.passphrase.len() > MAX_PASSPHRASE_LEN)
    {
        error!("passphrase length {} out of range", params.passphrase.len());
        return Err(Error::BadPassphraseLen);
    }
    Ok(())
}
