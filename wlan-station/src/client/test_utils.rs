// Copyright 2020 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Fake driver and IP stack for exercising the station state machine.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{mpsc, Mutex};

use anyhow::format_err;

use crate::driver::{
    DriverEvent, DriverSecurity, EventHandlerId, EventSink, ScanUpdate, WifiDriver, Work,
};
use crate::sink::UnboundedSink;
use crate::{Band, MacAddr, ScanFilter, ScanResult, Ssid, StaticIpSettings};

pub const TEST_IP: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 10);

pub fn fake_event_sink() -> (EventSink, mpsc::Receiver<Work>) {
    let (sender, receiver) = mpsc::channel();
    (EventSink::new(UnboundedSink::new(sender)), receiver)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Scan,
    StopScan,
    SetBand(Band),
    Join(Ssid),
    JoinSpecific(Ssid, MacAddr),
    Leave,
    RegisterLinkEvents,
    DeregisterLinkEvents,
    SendEapol,
}

pub struct FakeDriver {
    calls: Mutex<Vec<Call>>,
    join_should_fail: AtomicBool,
    supports_5ghz: AtomicBool,
    current_ssid: Mutex<Option<Ssid>>,
    scan_results: Mutex<Vec<ScanResult>>,
    eapol_sink: Mutex<Option<UnboundedSink<Vec<u8>>>>,
    next_handler_id: AtomicU32,
    mac: MacAddr,
}

impl FakeDriver {
    pub fn new() -> FakeDriver {
        FakeDriver {
            calls: Mutex::new(vec![]),
            join_should_fail: AtomicBool::new(false),
            supports_5ghz: AtomicBool::new(true),
            current_ssid: Mutex::new(None),
            scan_results: Mutex::new(vec![]),
            eapol_sink: Mutex::new(None),
            next_handler_id: AtomicU32::new(0),
            mac: [0x02, 0x00, 0x00, 0x00, 0x00, 0x01],
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn fail_joins(&self, fail: bool) {
        self.join_should_fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_supports_5ghz(&self, supported: bool) {
        self.supports_5ghz.store(supported, Ordering::SeqCst);
    }

    /// Networks the next scan will report, in order.
    pub fn set_scan_results(&self, results: Vec<ScanResult>) {
        *self.scan_results.lock().unwrap() = results;
    }

    pub fn eapol_sink(&self) -> Option<UnboundedSink<Vec<u8>>> {
        self.eapol_sink.lock().unwrap().clone()
    }
}

impl WifiDriver for FakeDriver {
    fn scan(&self, _filter: &ScanFilter, events: EventSink) -> Result<(), anyhow::Error> {
        self.record(Call::Scan);
        for result in self.scan_results.lock().unwrap().iter() {
            events.send(DriverEvent::Scan(ScanUpdate::Result(result.clone())));
        }
        events.send(DriverEvent::Scan(ScanUpdate::Complete));
        Ok(())
    }

    fn stop_scan(&self) -> Result<(), anyhow::Error> {
        self.record(Call::StopScan);
        Ok(())
    }

    fn set_band(&self, band: Band) -> Result<(), anyhow::Error> {
        self.record(Call::SetBand(band));
        Ok(())
    }

    fn supports_5ghz(&self) -> Result<bool, anyhow::Error> {
        Ok(self.supports_5ghz.load(Ordering::SeqCst))
    }

    fn join(&self, ssid: &Ssid, _security: DriverSecurity, _key: &[u8]) -> Result<(), anyhow::Error> {
        self.record(Call::Join(ssid.clone()));
        if self.join_should_fail.load(Ordering::SeqCst) {
            return Err(format_err!("join refused"));
        }
        *self.current_ssid.lock().unwrap() = Some(ssid.clone());
        Ok(())
    }

    fn join_specific(
        &self,
        ssid: &Ssid,
        bssid: &MacAddr,
        _security: DriverSecurity,
        _key: &[u8],
    ) -> Result<(), anyhow::Error> {
        self.record(Call::JoinSpecific(ssid.clone(), *bssid));
        if self.join_should_fail.load(Ordering::SeqCst) {
            return Err(format_err!("join refused"));
        }
        *self.current_ssid.lock().unwrap() = Some(ssid.clone());
        Ok(())
    }

    fn leave(&self) -> Result<(), anyhow::Error> {
        self.record(Call::Leave);
        *self.current_ssid.lock().unwrap() = None;
        Ok(())
    }

    fn mac_address(&self) -> Result<MacAddr, anyhow::Error> {
        Ok(self.mac)
    }

    fn current_ssid(&self) -> Result<Option<Ssid>, anyhow::Error> {
        Ok(self.current_ssid.lock().unwrap().clone())
    }

    fn register_link_events(&self, _events: EventSink) -> Result<EventHandlerId, anyhow::Error> {
        self.record(Call::RegisterLinkEvents);
        let id = self.next_handler_id.fetch_add(1, Ordering::SeqCst);
        Ok(EventHandlerId(id))
    }

    fn deregister_link_events(&self, _id: EventHandlerId) -> Result<(), anyhow::Error> {
        self.record(Call::DeregisterLinkEvents);
        Ok(())
    }

    fn send_eapol(&self, _frame: &[u8]) -> Result<(), anyhow::Error> {
        self.record(Call::SendEapol);
        Ok(())
    }

    fn register_eapol_rx(&self, frames: UnboundedSink<Vec<u8>>) -> Result<(), anyhow::Error> {
        *self.eapol_sink.lock().unwrap() = Some(frames);
        Ok(())
    }

    fn deregister_eapol_rx(&self) {
        *self.eapol_sink.lock().unwrap() = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetCall {
    AddInterface { static_ip: bool },
    RemoveInterface,
    BringUp,
    BringDown,
    DhcpRenew,
}

pub struct FakeNetStack {
    calls: Mutex<Vec<NetCall>>,
    ip: Mutex<Option<Ipv4Addr>>,
    ip_change_sink: Mutex<Option<EventSink>>,
}

impl FakeNetStack {
    pub fn new() -> FakeNetStack {
        FakeNetStack {
            calls: Mutex::new(vec![]),
            ip: Mutex::new(None),
            ip_change_sink: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> Vec<NetCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: NetCall) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn set_ip(&self, ip: Option<Ipv4Addr>) {
        *self.ip.lock().unwrap() = ip;
    }
}

impl crate::driver::NetworkStack for FakeNetStack {
    fn add_interface(&self, static_ip: Option<&StaticIpSettings>) -> Result<(), anyhow::Error> {
        self.record(NetCall::AddInterface { static_ip: static_ip.is_some() });
        Ok(())
    }

    fn remove_interface(&self) -> Result<(), anyhow::Error> {
        self.record(NetCall::RemoveInterface);
        Ok(())
    }

    fn bring_up(&self) -> Result<(), anyhow::Error> {
        self.record(NetCall::BringUp);
        Ok(())
    }

    fn bring_down(&self) -> Result<(), anyhow::Error> {
        self.record(NetCall::BringDown);
        Ok(())
    }

    fn dhcp_renew(&self) -> Result<(), anyhow::Error> {
        self.record(NetCall::DhcpRenew);
        Ok(())
    }

    fn ip_address(&self) -> Option<Ipv4Addr> {
        *self.ip.lock().unwrap()
    }

    fn register_ip_change(&self, events: EventSink) {
        *self.ip_change_sink.lock().unwrap() = Some(events);
    }
}

/// A plain infrastructure scan result with the given identity.
pub fn fake_scan_result(ssid: &[u8], bssid: MacAddr, signal_strength: i16) -> ScanResult {
    ScanResult {
        ssid: ssid.to_vec(),
        bssid,
        signal_strength,
        security: crate::SecurityType::Wpa2AesPsk,
        band: Band::Band2_4Ghz,
        bss_type: crate::BssType::Infrastructure,
        channel: 6,
        ccode: *b"US",
        ies: vec![],
    }
}
