// Copyright 2020 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The scan session: one at a time, results routed through the worker.

use std::sync::Arc;

use log::{debug, error};

use super::Station;
use crate::driver::ScanUpdate;
use crate::{Band, Error, ScanFilter, ScanObserver};

pub(crate) struct ScanSession {
    active: Option<ActiveScan>,
}

struct ActiveScan {
    observer: Arc<dyn ScanObserver>,
    filter: ScanFilter,
}

impl ScanSession {
    pub(crate) fn new() -> ScanSession {
        ScanSession { active: None }
    }

    pub(crate) fn is_scanning(&self) -> bool {
        self.active.is_some()
    }
}

impl Station {
    pub(crate) fn start_scan(
        &mut self,
        observer: Arc<dyn ScanObserver>,
        filter: ScanFilter,
    ) -> Result<(), Error> {
        if self.scan.is_scanning() {
            return Err(Error::ScanInProgress);
        }
        // A band filter narrows the radio before the scan starts; SSID and
        // BSSID filters are pushed down into the driver request, and the
        // RSSI floor is applied as results come back.
        match &filter {
            ScanFilter::Band(band) => {
                if *band == Band::Band5Ghz && !self.wifi().supports_5ghz()? {
                    error!("band scan filter not supported on this platform");
                    return Err(Error::BandNotSupported);
                }
                self.wifi().set_band(*band)?;
            }
            _ => self.wifi().set_band(Band::Any)?,
        }
        if let Err(e) = self.wifi().scan(&filter, self.event_sink.clone()) {
            error!("driver scan failed to start: {}", e);
            return Err(Error::ScanError);
        }
        self.scan.active = Some(ActiveScan { observer, filter });
        Ok(())
    }

    pub(crate) fn stop_scan(&mut self) -> Result<(), Error> {
        if self.scan.active.take().is_none() {
            return Err(Error::NoActiveScan);
        }
        if let Err(e) = self.wifi().stop_scan() {
            error!("driver scan failed to stop: {}", e);
            return Err(Error::StopScanError);
        }
        Ok(())
    }

    pub(crate) fn on_scan_update(&mut self, update: ScanUpdate) {
        let active = match &self.scan.active {
            Some(active) => active,
            None => {
                debug!("dropping scan update without an active session");
                return;
            }
        };
        match update {
            ScanUpdate::Result(result) => {
                if let ScanFilter::RssiRange(floor) = &active.filter {
                    if result.signal_strength < *floor {
                        return;
                    }
                }
                active.observer.on_result(&result);
            }
            ScanUpdate::Complete => {
                let active = self.scan.active.take().expect("session checked above");
                active.observer.on_complete();
            }
            ScanUpdate::Aborted => {
                // The driver gave up; the session ends without a completion
                // callback.
                self.scan.active = None;
            }
        }
    }
}
