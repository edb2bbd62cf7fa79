//! Draw-call contract between guest programs and a rendering host.
//!
//! The bridge does not render. It forwards each draw import to a
//! [`Canvas`] supplied by the caller, in guest coordinates.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// A single draw request from the guest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawCall {
    Circle { x: f32, y: f32, r: f32 },
}

/// Receiver of guest draw calls.
pub trait Canvas {
    fn draw(&mut self, call: DrawCall);
}

/// Canvas that records calls; clones share the same record.
#[derive(Debug, Default, Clone)]
pub struct RecordingCanvas {
    calls: Arc<Mutex<Vec<DrawCall>>>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<DrawCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Drop recorded calls, e.g. between frames.
    pub fn clear(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }
}

impl Canvas for RecordingCanvas {
    fn draw(&mut self, call: DrawCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}
