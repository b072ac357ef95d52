// Copyright 2020 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::sync::mpsc;

/// A send-only handle to an unbounded channel. Sending never blocks; a
/// receiver that has gone away simply swallows the message, since the
/// sender can still function without it.
#[derive(Debug)]
pub struct UnboundedSink<T> {
    sink: mpsc::Sender<T>,
}

impl<T> Clone for UnboundedSink<T> {
    fn clone(&self) -> Self {
        UnboundedSink { sink: self.sink.clone() }
    }
}

impl<T> UnboundedSink<T> {
    pub fn new(sink: mpsc::Sender<T>) -> Self {
        UnboundedSink { sink }
    }

    pub fn send(&self, msg: T) {
        let _ = self.sink.send(msg);
    }
}
