// Copyright 2020 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! WPS enrollee provisioning: find an active registrar, associate to it,
//! and drive the `wlan-wsc` exchange over the driver's EAPOL port.
//!
//! The exchange itself never retries; any terminal failure is handed back
//! to the caller, who may invoke the operation again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, error, info};

use wlan_wsc as wsc;
use wlan_wsc::attr;

use crate::driver::{DriverSecurity, WifiDriver};
use crate::sink::UnboundedSink;
use crate::{
    Band, ConnectionManager, DeviceDetail, Error, ScanFilter, ScanObserver, ScanResult,
    SecurityType, Ssid,
};

/// Overall ceiling of one enrollee run, covering discovery, association,
/// and the registration protocol.
pub(crate) const WPS_TOTAL_TIMEOUT: Duration = Duration::from_secs(120);

/// How long the registrar discovery scan may take.
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Granularity of the abort-flag poll while waiting for frames.
const ABORT_POLL: Duration = Duration::from_millis(100);

/// 802.11 vendor-specific information element id.
const VENDOR_IE_ID: u8 = 0xDD;

/// Microsoft OUI + type 4: the WPS information element.
const WPS_IE_OUI: [u8; 4] = [0x00, 0x50, 0xF2, 0x04];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WpsMode {
    PushButton,
    /// The 8-digit numeric PIN entered at the registrar.
    Pin(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WpsConfig {
    pub mode: WpsMode,
}

/// One provisioned network recovered from the registrar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WpsCredential {
    pub ssid: Ssid,
    pub security: SecurityType,
    pub passphrase: Vec<u8>,
}

pub(crate) fn enrollee_exchange(
    manager: &ConnectionManager,
    config: &WpsConfig,
    detail: &DeviceDetail,
    deadline: Duration,
) -> Result<Vec<WpsCredential>, Error> {
    let mode = match &config.mode {
        WpsMode::PushButton => wsc::Mode::PushButton,
        WpsMode::Pin(pin) => {
            if !wsc::pin::is_valid(pin) {
                error!("WPS PIN failed validation");
                return Err(Error::BadArg);
            }
            wsc::Mode::Pin(pin.clone())
        }
    };

    let (abort, wifi) = {
        let mut station = manager.lock_station()?;
        let abort = station.begin_wps()?;
        (abort, Arc::clone(station.wifi()))
    };
    let result = run_exchange(manager, &wifi, mode, detail, deadline, &abort);
    if let Ok(mut station) = manager.lock_station() {
        station.end_wps();
    }
    result
}

fn run_exchange(
    manager: &ConnectionManager,
    wifi: &Arc<dyn WifiDriver>,
    mode: wsc::Mode,
    detail: &DeviceDetail,
    deadline: Duration,
    abort: &AtomicBool,
) -> Result<Vec<WpsCredential>, Error> {
    let deadline_at = Instant::now() + deadline;
    let target = discover_registrar(manager, &mode)?;
    info!("WPS registrar found on {:02x?}", target.bssid);

    {
        let station = manager.lock_station()?;
        station.wifi().set_band(Band::Any)?;
        station.wifi().join_specific(
            &target.ssid,
            &target.bssid,
            DriverSecurity::WpsSecure,
            &[],
        )?;
    }

    let own_mac = wifi.mac_address()?;
    let rf_bands = match target.band {
        Band::Band5Ghz => attr::RF_BAND_5GHZ,
        _ => attr::RF_BAND_2_4GHZ,
    };
    let mut enrollee = wsc::Enrollee::new(mode, detail.clone(), own_mac, target.bssid, rf_bands)
        .map_err(map_wsc_error)?;

    let (sender, receiver) = mpsc::channel();
    wifi.register_eapol_rx(UnboundedSink::new(sender))?;
    let result = pump(wifi.as_ref(), &mut enrollee, &receiver, deadline_at, abort);
    wifi.deregister_eapol_rx();
    let _ = wifi.leave();
    result
}

/// Feeds captured EAPOL frames into the enrollee and its outbound frames
/// into the driver until a terminal state, the deadline, or an abort.
fn pump(
    wifi: &dyn WifiDriver,
    enrollee: &mut wsc::Enrollee,
    receiver: &mpsc::Receiver<Vec<u8>>,
    deadline_at: Instant,
    abort: &AtomicBool,
) -> Result<Vec<WpsCredential>, Error> {
    let mut updates = wsc::UpdateSink::default();
    enrollee.start(&mut updates).map_err(map_wsc_error)?;
    loop {
        for update in updates.drain(..) {
            match update {
                wsc::Update::TxEapolFrame(frame) => wifi.send_eapol(&frame)?,
                wsc::Update::Complete(credentials) => {
                    return credentials.iter().map(convert_credential).collect();
                }
            }
        }
        if abort.load(Ordering::SeqCst) {
            info!("WPS exchange aborted");
            enrollee.abort();
            return Err(Error::WpsFailed(wsc::Error::Aborted));
        }
        let now = Instant::now();
        if now >= deadline_at {
            info!("WPS exchange timed out");
            enrollee.timed_out();
            return Err(Error::WpsFailed(wsc::Error::Timeout));
        }
        match receiver.recv_timeout(ABORT_POLL.min(deadline_at - now)) {
            Ok(frame) => {
                if let Err(e) = enrollee.on_eapol_frame(&mut updates, &frame) {
                    // Flush the NACK the failure queued, then report.
                    for update in updates.drain(..) {
                        if let wsc::Update::TxEapolFrame(frame) = update {
                            let _ = wifi.send_eapol(&frame);
                        }
                    }
                    return Err(map_wsc_error(e));
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                enrollee.timed_out();
                return Err(Error::WpsFailed(wsc::Error::Timeout));
            }
        }
    }
}

/// Scans for an access point advertising an active registrar. Push-button
/// mode additionally monitors for session overlap: two distinct APs in
/// active PBC is an unrecoverable ambiguity.
fn discover_registrar(
    manager: &ConnectionManager,
    mode: &wsc::Mode,
) -> Result<ScanResult, Error> {
    let (sender, receiver) = mpsc::channel();
    let collector = Arc::new(ScanCollector { sink: Mutex::new(UnboundedSink::new(sender)) });
    manager.start_scan(collector, ScanFilter::None)?;

    let mut results = vec![];
    let scan_deadline = Instant::now() + DISCOVERY_TIMEOUT;
    loop {
        let now = Instant::now();
        if now >= scan_deadline {
            let _ = manager.stop_scan();
            break;
        }
        match receiver.recv_timeout(scan_deadline - now) {
            Ok(Some(result)) => results.push(result),
            Ok(None) => break,
            Err(_) => {
                let _ = manager.stop_scan();
                break;
            }
        }
    }

    let candidates: Vec<ScanResult> =
        results.into_iter().filter(|r| registrar_ready(r, mode)).collect();
    if matches!(mode, wsc::Mode::PushButton) {
        let mut bssids: Vec<_> = candidates.iter().map(|c| c.bssid).collect();
        bssids.sort_unstable();
        bssids.dedup();
        if bssids.len() > 1 {
            error!("multiple active push-button registrars in range");
            return Err(Error::WpsPbcOverlap);
        }
    }
    candidates
        .into_iter()
        .max_by_key(|c| c.signal_strength)
        .ok_or(Error::WpsNoRegistrar)
}

/// Whether a scan result advertises a registrar ready for this mode.
fn registrar_ready(result: &ScanResult, mode: &wsc::Mode) -> bool {
    let wps = match wps_ie(&result.ies) {
        Some(wps) => wps,
        None => return false,
    };
    match wsc::tlv::read_u8(wps, attr::SELECTED_REGISTRAR) {
        Ok(1) => (),
        _ => return false,
    }
    match mode {
        wsc::Mode::PushButton => {
            wsc::tlv::read_u16(wps, attr::DEVICE_PASSWORD_ID)
                == Ok(attr::password_id::PUSH_BUTTON)
        }
        // Any selected registrar will accept a PIN.
        wsc::Mode::Pin(_) => true,
    }
}

/// Locates the WPS vendor IE inside a beacon/probe-response IE stream and
/// returns its attribute payload.
fn wps_ie(ies: &[u8]) -> Option<&[u8]> {
    let mut rest = ies;
    while !rest.is_empty() {
        let header = rest.get(..2)?;
        let body = rest.get(2..2 + header[1] as usize)?;
        if header[0] == VENDOR_IE_ID && body.len() >= WPS_IE_OUI.len() && body[..4] == WPS_IE_OUI {
            return Some(&body[4..]);
        }
        rest = &rest[2 + body.len()..];
    }
    None
}

struct ScanCollector {
    sink: Mutex<UnboundedSink<Option<ScanResult>>>,
}

impl ScanObserver for ScanCollector {
    fn on_result(&self, result: &ScanResult) {
        self.sink.lock().unwrap().send(Some(result.clone()));
    }

    fn on_complete(&self) {
        self.sink.lock().unwrap().send(None);
    }
}

fn map_wsc_error(error: wsc::Error) -> Error {
    debug!("WSC engine reported: {}", error);
    match error {
        wsc::Error::PbcOverlap => Error::WpsPbcOverlap,
        wsc::Error::ReceivedWepCredentials => Error::WpsReceivedWepCredentials,
        wsc::Error::BadArgument(_) => Error::BadArg,
        other => Error::WpsFailed(other),
    }
}

/// Maps a recovered credential's auth/encr selection onto the manager's
/// security space.
fn convert_credential(credential: &wsc::Credential) -> Result<WpsCredential, Error> {
    let security = credential_security(credential.auth_type, credential.encr_type)
        .ok_or(Error::WpsFailed(wsc::Error::ReceivedInvalidCredentials))?;
    Ok(WpsCredential {
        ssid: credential.ssid.clone(),
        security,
        passphrase: credential.network_key.clone(),
    })
}

fn credential_security(auth_type: u16, encr_type: u16) -> Option<SecurityType> {
    match (auth_type, encr_type) {
        (attr::auth::OPEN, attr::encr::NONE) => Some(SecurityType::Open),
        (attr::auth::WPA_PSK, attr::encr::TKIP) => Some(SecurityType::WpaTkipPsk),
        (attr::auth::WPA_PSK, attr::encr::AES) => Some(SecurityType::WpaAesPsk),
        (attr::auth::WPA_PSK, attr::encr::MIXED) => Some(SecurityType::WpaMixedPsk),
        (attr::auth::WPA2_PSK, attr::encr::TKIP) => Some(SecurityType::Wpa2TkipPsk),
        (attr::auth::WPA2_PSK, attr::encr::AES) => Some(SecurityType::Wpa2AesPsk),
        (attr::auth::WPA2_PSK, attr::encr::MIXED) => Some(SecurityType::Wpa2MixedPsk),
        (attr::auth::WPA2_WPA_PSK_MIXED, _) => Some(SecurityType::Wpa2MixedPsk),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use super::*;
    use crate::driver::NetworkStack;
    use crate::{Config, InterfaceType};
    use wlan_wsc::tlv::TlvValue;

    fn wps_ready_ies(password_id: u16) -> Vec<u8> {
        let mut wps = vec![];
        wsc::tlv::write_value(&mut wps, attr::VERSION, TlvValue::U8(attr::VERSION_1_0));
        wsc::tlv::write_value(&mut wps, attr::SELECTED_REGISTRAR, TlvValue::U8(1));
        wsc::tlv::write_value(&mut wps, attr::DEVICE_PASSWORD_ID, TlvValue::U16(password_id));
        let mut ies = vec![];
        // An unrelated IE in front exercises the walk.
        ies.extend_from_slice(&[0x00, 0x04, b'F', b'a', b'k', b'e']);
        ies.push(VENDOR_IE_ID);
        ies.push((WPS_IE_OUI.len() + wps.len()) as u8);
        ies.extend_from_slice(&WPS_IE_OUI);
        ies.extend_from_slice(&wps);
        ies
    }

    fn wps_ready_ap(ssid: &[u8], bssid: crate::MacAddr, password_id: u16) -> crate::ScanResult {
        let mut result = fake_scan_result(ssid, bssid, -40);
        result.security = SecurityType::WpsSecure;
        result.ies = wps_ready_ies(password_id);
        result
    }

    fn make_manager() -> (ConnectionManager, Arc<FakeDriver>, Arc<FakeNetStack>) {
        let wifi = Arc::new(FakeDriver::new());
        let netstack = Arc::new(FakeNetStack::new());
        let manager = ConnectionManager::new(
            Config { interface: InterfaceType::Station },
            wifi.clone(),
            netstack.clone() as Arc<dyn NetworkStack>,
        )
        .expect("station manager constructs");
        (manager, wifi, netstack)
    }

    fn pbc_config() -> WpsConfig {
        WpsConfig { mode: WpsMode::PushButton }
    }

    #[test]
    fn wps_ie_parsing_finds_the_payload() {
        let ies = wps_ready_ies(attr::password_id::PUSH_BUTTON);
        let wps = wps_ie(&ies).expect("WPS IE present");
        assert_eq!(wsc::tlv::read_u8(wps, attr::SELECTED_REGISTRAR), Ok(1));
        assert_eq!(wps_ie(&[]), None);
        assert_eq!(wps_ie(&[0xDD, 0x03, 0x00, 0x50, 0xF2]), None);
        // Truncated IE length never reads out of bounds.
        assert_eq!(wps_ie(&[0xDD, 0x30, 0x00]), None);
    }

    #[test]
    fn invalid_pin_is_rejected_before_any_network_action() {
        let (manager, wifi, _netstack) = make_manager();
        let config = WpsConfig { mode: WpsMode::Pin("12345678".to_string()) };
        let result = manager.wps_enrollee(&config, &DeviceDetail::default());
        assert!(matches!(result, Err(Error::BadArg)));
        assert!(wifi.calls().is_empty());
    }

    #[test]
    fn no_registrar_in_range_fails_cleanly() {
        let (manager, wifi, _netstack) = make_manager();
        wifi.set_scan_results(vec![fake_scan_result(b"Plain", [9; 6], -50)]);
        let result = enrollee_exchange(
            &manager,
            &pbc_config(),
            &DeviceDetail::default(),
            Duration::from_millis(500),
        );
        assert!(matches!(result, Err(Error::WpsNoRegistrar)));
    }

    #[test]
    fn two_active_pbc_registrars_are_an_overlap() {
        let (manager, wifi, _netstack) = make_manager();
        wifi.set_scan_results(vec![
            wps_ready_ap(b"ApOne", [1; 6], attr::password_id::PUSH_BUTTON),
            wps_ready_ap(b"ApTwo", [2; 6], attr::password_id::PUSH_BUTTON),
        ]);
        let result = enrollee_exchange(
            &manager,
            &pbc_config(),
            &DeviceDetail::default(),
            Duration::from_millis(500),
        );
        assert!(matches!(result, Err(Error::WpsPbcOverlap)));
    }

    #[test]
    fn silent_registrar_times_out_with_no_credentials() {
        let (manager, wifi, _netstack) = make_manager();
        wifi.set_scan_results(vec![wps_ready_ap(
            b"Registrar",
            [3; 6],
            attr::password_id::PUSH_BUTTON,
        )]);
        let result = enrollee_exchange(
            &manager,
            &pbc_config(),
            &DeviceDetail::default(),
            Duration::from_millis(300),
        );
        assert!(matches!(result, Err(Error::WpsFailed(wsc::Error::Timeout))));

        let calls = wifi.calls();
        assert!(
            calls.iter().any(|c| matches!(c, Call::JoinSpecific(_, bssid) if *bssid == [3; 6])),
            "the registrar AP must be joined"
        );
        assert!(calls.contains(&Call::SendEapol), "the exchange must at least open with EAPOL");
        assert!(calls.contains(&Call::Leave), "the AP is left after a failed exchange");
    }

    #[test]
    fn abort_terminates_a_waiting_exchange() {
        let (manager, wifi, _netstack) = make_manager();
        wifi.set_scan_results(vec![wps_ready_ap(
            b"Registrar",
            [4; 6],
            attr::password_id::PUSH_BUTTON,
        )]);
        std::thread::scope(|scope| {
            let manager_ref = &manager;
            scope.spawn(move || {
                // Give the exchange time to reach its waiting loop.
                std::thread::sleep(Duration::from_millis(150));
                loop {
                    match manager_ref.wps_abort() {
                        Ok(()) => break,
                        Err(_) => std::thread::sleep(Duration::from_millis(20)),
                    }
                }
            });
            let result = enrollee_exchange(
                manager_ref,
                &pbc_config(),
                &DeviceDetail::default(),
                Duration::from_secs(30),
            );
            assert!(matches!(result, Err(Error::WpsFailed(wsc::Error::Aborted))));
        });
    }

    #[test]
    fn concurrent_wps_is_rejected() {
        let (manager, wifi, _netstack) = make_manager();
        wifi.set_scan_results(vec![wps_ready_ap(
            b"Registrar",
            [5; 6],
            attr::password_id::PUSH_BUTTON,
        )]);
        {
            let mut station = manager.lock_station().unwrap();
            let _abort = station.begin_wps().unwrap();
        }
        let result = enrollee_exchange(
            &manager,
            &pbc_config(),
            &DeviceDetail::default(),
            Duration::from_millis(200),
        );
        assert!(matches!(result, Err(Error::WpsAlreadyStarted)));
    }

    #[test]
    fn credential_security_mapping() {
        assert_eq!(
            credential_security(attr::auth::WPA2_PSK, attr::encr::AES),
            Some(SecurityType::Wpa2AesPsk)
        );
        assert_eq!(
            credential_security(attr::auth::OPEN, attr::encr::NONE),
            Some(SecurityType::Open)
        );
        assert_eq!(
            credential_security(attr::auth::WPA2_WPA_PSK_MIXED, attr::encr::MIXED),
            Some(SecurityType::Wpa2MixedPsk)
        );
        assert_eq!(credential_security(attr::auth::SHARED, attr::encr::WEP), None);
    }
}
