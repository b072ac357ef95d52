// Copyright 2020 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Station-mode Wi-Fi connection manager.
//!
//! One owned [`ConnectionManager`] drives a single station interface:
//! connect/disconnect with retry and exponential backoff, scanning,
//! link-event monitoring with handshake-timeout detection, event fan-out to
//! registered listeners, and WPS enrollee provisioning through the
//! `wlan-wsc` engine.
//!
//! Concurrency model: public API calls serialize on a session mutex with a
//! bounded wait; driver and IP-stack callbacks post events into a single
//! serialized worker which applies all event-driven state transitions in
//! arrival order. No transition ever races another.

use std::net::Ipv4Addr;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::error;
use parking_lot::Mutex;
use thiserror::Error;

pub mod client;
pub mod driver;
pub mod sink;
pub mod timer;

use client::Station;
use driver::{EventSink, WifiDriver, Work};
use sink::UnboundedSink;

pub use client::wps::{WpsConfig, WpsCredential, WpsMode};
pub use driver::{DriverEvent, LinkEvent, NetworkStack, ScanUpdate, SupReason, SupStatus};
pub use wlan_wsc::{DeviceCategory, DeviceDetail};

pub type MacAddr = [u8; 6];
pub type Ssid = Vec<u8>;

pub const MAX_SSID_LEN: usize = 32;
pub const MAX_PASSPHRASE_LEN: usize = 64;
/// Fixed capacity of the event-listener registry.
pub const MAX_EVENT_SUBSCRIBERS: usize = 5;

/// Bounded wait for the session mutex before a call fails instead of
/// deadlocking.
const MAX_MUTEX_WAIT: Duration = Duration::from_secs(120);

/// Worker sleep when no timer is armed.
const IDLE_WORKER_WAIT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceType {
    Station,
    AccessPoint,
    ApSta,
}

/// Configuration for [`ConnectionManager::new`]. Only the station
/// interface is supported.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub interface: InterfaceType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityType {
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
    /// Reported by scans for networks this platform cannot classify. Not
    /// accepted by `connect`.
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Any,
    Band2_4Ghz,
    Band5Ghz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BssType {
    Infrastructure,
    Adhoc,
    Any,
    Mesh,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticIpSettings {
    pub ip_address: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub netmask: Ipv4Addr,
}

/// Parameters of a connect request.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    pub ssid: Ssid,
    pub passphrase: Vec<u8>,
    pub security: SecurityType,
    /// Directed join when given; otherwise the join goes by SSID with the
    /// band preference applied.
    pub bssid: Option<MacAddr>,
    pub band: Band,
    /// Absence implies DHCP.
    pub static_ip: Option<StaticIpSettings>,
}

/// One discovered network.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub ssid: Ssid,
    pub bssid: MacAddr,
    pub signal_strength: i16,
    pub security: SecurityType,
    pub band: Band,
    pub bss_type: BssType,
    pub channel: u8,
    pub ccode: [u8; 2],
    /// Raw information elements from the beacon or probe response.
    pub ies: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanFilter {
    None,
    Ssid(Ssid),
    Bssid(MacAddr),
    Band(Band),
    /// Results below this RSSI floor (dBm) are suppressed.
    RssiRange(i16),
}

/// Events fanned out to registered listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationEvent {
    Reconnected,
    Disconnected,
    IpChanged(Ipv4Addr),
}

/// Application-side sink for link events. Invoked synchronously on the
/// serialized worker, in registration-slot order; handlers must stay fast
/// and non-blocking.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &StationEvent);
}

/// Application-side sink for scan progress: one `on_result` per discovered
/// network, then exactly one `on_complete`.
pub trait ScanObserver: Send + Sync {
    fn on_result(&self, result: &ScanResult);
    fn on_complete(&self);
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("timed out waiting for the session mutex")]
    WaitTimeout,
    #[error("SSID length must be between 1 and {} bytes", MAX_SSID_LEN)]
    BadSsidLen,
    #[error("security type not supported")]
    SecurityNotSupported,
    #[error("passphrase length must be between 1 and {} bytes", MAX_PASSPHRASE_LEN)]
    BadPassphraseLen,
    #[error("bad argument")]
    BadArg,
    #[error("interface type not supported")]
    InterfaceNotSupported,
    #[error("station disconnect failed")]
    StaDisconnectError,
    #[error("network is down")]
    NetworkDown,
    #[error("no scan is running")]
    NoActiveScan,
    #[error("a scan is already in progress")]
    ScanInProgress,
    #[error("scan failed to start")]
    ScanError,
    #[error("scan failed to stop")]
    StopScanError,
    #[error("requested band not supported on this platform")]
    BandNotSupported,
    #[error("out of capacity")]
    OutOfMemory,
    #[error("DHCP did not assign an address in time")]
    DhcpTimeout,
    #[error("network stack bring-up failed")]
    NetworkStackError,
    #[error("WPS is already running")]
    WpsAlreadyStarted,
    #[error("no WPS registrar found")]
    WpsNoRegistrar,
    #[error("WPS PBC session overlap")]
    WpsPbcOverlap,
    #[error("WPS delivered WEP credentials")]
    WpsReceivedWepCredentials,
    #[error("WPS exchange failed: {0}")]
    WpsFailed(#[source] wlan_wsc::Error),
    #[error(transparent)]
    Driver(#[from] anyhow::Error),
}

/// The single station interface, owned. The "at most one live session"
/// invariant is carried by ownership: constructing a manager consumes the
/// driver and stack handles, and no second session type exists.
pub struct ConnectionManager {
    station: Arc<Mutex<Station>>,
    work_sink: UnboundedSink<Work>,
    worker: Option<thread::JoinHandle<()>>,
}

impl ConnectionManager {
    /// Validates the configuration, spawns the serialized worker, and
    /// subscribes to IP-stack address changes.
    pub fn new(
        config: Config,
        wifi: Arc<dyn WifiDriver>,
        netstack: Arc<dyn NetworkStack>,
    ) -> Result<ConnectionManager, Error> {
        if config.interface != InterfaceType::Station {
            return Err(Error::InterfaceNotSupported);
        }
        let (sender, receiver) = mpsc::channel();
        let work_sink = UnboundedSink::new(sender);
        let event_sink = EventSink::new(work_sink.clone());
        netstack.register_ip_change(event_sink.clone());

        let station = Arc::new(Mutex::new(Station::new(wifi, netstack, event_sink)));
        let worker = {
            let station = Arc::clone(&station);
            thread::Builder::new()
                .name("wlan-station-worker".to_string())
                .spawn(move || worker_loop(station, receiver))
                .expect("worker thread spawns")
        };
        Ok(ConnectionManager { station, work_sink, worker: Some(worker) })
    }

    fn lock(&self) -> Result<parking_lot::MutexGuard<'_, Station>, Error> {
        self.station.try_lock_for(MAX_MUTEX_WAIT).ok_or(Error::WaitTimeout)
    }

    /// Connects to an access point and returns the bound IPv4 address.
    /// Blocking: covers the join and the DHCP wait (bounded).
    pub fn connect(&self, params: &ConnectParams) -> Result<Ipv4Addr, Error> {
        self.lock()?.connect(params)
    }

    /// Disconnects from the current access point. Success when already
    /// disconnected.
    pub fn disconnect(&self) -> Result<(), Error> {
        self.lock()?.disconnect()
    }

    /// Starts a scan; progress is delivered through `observer`. Only one
    /// scan may run at a time.
    pub fn start_scan(
        &self,
        observer: Arc<dyn ScanObserver>,
        filter: ScanFilter,
    ) -> Result<(), Error> {
        self.lock()?.start_scan(observer, filter)
    }

    /// Cancels the scan in flight.
    pub fn stop_scan(&self) -> Result<(), Error> {
        self.lock()?.stop_scan()
    }

    /// Registers a link-event listener; capacity is fixed at
    /// [`MAX_EVENT_SUBSCRIBERS`].
    pub fn register_event_callback(&self, listener: Arc<dyn EventListener>) -> Result<(), Error> {
        self.lock()?.register_listener(listener)
    }

    pub fn deregister_event_callback(
        &self,
        listener: &Arc<dyn EventListener>,
    ) -> Result<(), Error> {
        self.lock()?.deregister_listener(listener)
    }

    /// The station's bound IPv4 address; `NetworkDown` before any binding.
    pub fn ip_address(&self, interface: InterfaceType) -> Result<Ipv4Addr, Error> {
        if interface != InterfaceType::Station {
            return Err(Error::InterfaceNotSupported);
        }
        self.lock()?.ip_address()
    }

    pub fn mac_address(&self, interface: InterfaceType) -> Result<MacAddr, Error> {
        if interface != InterfaceType::Station {
            return Err(Error::InterfaceNotSupported);
        }
        let station = self.lock()?;
        Ok(station.wifi().mac_address()?)
    }

    /// Runs a WPS enrollee exchange against a nearby active registrar and
    /// returns the recovered credentials (one per band, at most two).
    /// Blocking, bounded by the WPS registration deadline.
    pub fn wps_enrollee(
        &self,
        config: &WpsConfig,
        detail: &DeviceDetail,
    ) -> Result<Vec<WpsCredential>, Error> {
        client::wps::enrollee_exchange(self, config, detail, client::wps::WPS_TOTAL_TIMEOUT)
    }

    /// Aborts an in-flight WPS exchange.
    pub fn wps_abort(&self) -> Result<(), Error> {
        self.lock()?.wps_abort()
    }

    /// Generates a checksum-valid 8-digit WPS PIN.
    pub fn wps_generate_pin() -> String {
        wlan_wsc::pin::generate()
    }

    /// Disconnects if connected, cancels any scan, and stops the worker.
    pub fn shutdown(&mut self) -> Result<(), Error> {
        let mut result = Ok(());
        {
            let mut station = self.lock()?;
            if let Err(e) = station.disconnect() {
                error!("disconnect during shutdown failed: {}", e);
                result = Err(Error::StaDisconnectError);
            }
            match station.stop_scan() {
                Ok(()) | Err(Error::NoActiveScan) => {}
                Err(e) => error!("stopping scan during shutdown failed: {}", e),
            }
        }
        self.work_sink.send(Work::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        result
    }

    pub(crate) fn lock_station(&self) -> Result<parking_lot::MutexGuard<'_, Station>, Error> {
        self.lock()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.shutdown();
        }
    }
}

/// The serialized worker: applies driver/stack events one at a time in
/// FIFO order and services the timer, so no event-driven transition ever
/// overlaps another or a public API call.
fn worker_loop(station: Arc<Mutex<Station>>, receiver: mpsc::Receiver<Work>) {
    loop {
        let wait = {
            match station.try_lock_for(MAX_MUTEX_WAIT) {
                Some(station) => match station.timer.next_deadline() {
                    Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                    None => IDLE_WORKER_WAIT,
                },
                None => {
                    error!("worker could not acquire the session mutex");
                    IDLE_WORKER_WAIT
                }
            }
        };
        match receiver.recv_timeout(wait) {
            Ok(Work::Shutdown) | Err(mpsc::RecvTimeoutError::Disconnected) => return,
            Ok(Work::Driver(event)) => match station.try_lock_for(MAX_MUTEX_WAIT) {
                Some(mut station) => station.on_driver_event(event),
                None => error!("worker dropped an event: session mutex unavailable"),
            },
            Err(mpsc::RecvTimeoutError::Timeout) => match station.try_lock_for(MAX_MUTEX_WAIT) {
                Some(mut station) => station.on_timer(Instant::now()),
                None => error!("worker missed a timer tick: session mutex unavailable"),
            },
        }
    }
}
