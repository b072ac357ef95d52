// Copyright 2020 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Timeout bookkeeping for the serialized worker.
//!
//! The worker loop owns one `Timer`: it sleeps on its event channel until
//! `next_deadline` and collects due events with `take_fired`. Cancelling an
//! event that already fired is a no-op, so handlers never observe stale
//! timeouts.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(PartialEq, Eq, Hash, Debug, Copy, Clone)]
pub struct EventId(u64);

pub struct Timer<E> {
    next_id: u64,
    events: HashMap<EventId, (Instant, E)>,
}

impl<E> Timer<E> {
    pub fn new() -> Self {
        Timer { next_id: 0, events: HashMap::new() }
    }

    pub fn schedule_event(&mut self, timeout: Duration, event: E) -> EventId {
        self.next_id += 1;
        let id = EventId(self.next_id);
        self.events.insert(id, (Instant::now() + timeout, event));
        id
    }

    pub fn cancel_event(&mut self, event_id: EventId) {
        self.events.remove(&event_id);
    }

    pub fn cancel_all(&mut self) {
        self.events.clear();
    }

    /// The earliest pending deadline, if any event is scheduled.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.events.values().map(|(deadline, _)| *deadline).min()
    }

    /// Removes and returns every event due at `now`, earliest first.
    pub fn take_fired(&mut self, now: Instant) -> Vec<E> {
        let mut due: Vec<EventId> = self
            .events
            .iter()
            .filter(|(_, (deadline, _))| *deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        due.sort_by_key(|id| self.events[id].0);
        due.into_iter()
            .map(|id| self.events.remove(&id).expect("due event still present").1)
            .collect()
    }
}
