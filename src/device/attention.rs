//! Attention sequence played on a freshly connected controller
//!
//! Alternates right and left haptic pulses on a fixed interval. The sequence
//! is a plain state value stepped by elapsed time; it never sleeps, so polling
//! and mode application keep running while it plays.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{DeviceId, PadSide};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttentionSettings {
    /// Number of right+left pulse pairs
    pub cycles: u32,
    pub pulse_interval_ms: u64,
    pub intensity: u16,
}

impl Default for AttentionSettings {
    fn default() -> Self {
        Self {
            cycles: 4,
            pulse_interval_ms: 100,
            intensity: u16::MAX,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HapticPulse {
    pub device: DeviceId,
    pub side: PadSide,
    pub intensity: u16,
}

#[derive(Clone, Debug)]
pub struct AttentionSequence {
    device: DeviceId,
    total_pulses: u32,
    emitted: u32,
    interval: Duration,
    intensity: u16,
    // Time since the last emitted pulse
    elapsed: Duration,
}

impl AttentionSequence {
    pub fn new(device: DeviceId, settings: &AttentionSettings) -> Self {
        Self {
            device,
            total_pulses: settings.cycles.saturating_mul(2),
            emitted: 0,
            interval: Duration::from_millis(settings.pulse_interval_ms),
            intensity: settings.intensity,
            elapsed: Duration::ZERO,
        }
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn is_finished(&self) -> bool {
        self.emitted >= self.total_pulses
    }

    /// Steps the sequence by `dt` and returns the pulses that became due.
    ///
    /// The first pulse is due immediately; each following pulse is due one
    /// interval after the previous one.
    pub fn advance(&mut self, dt: Duration) -> Vec<HapticPulse> {
        let mut due = Vec::new();
        if self.is_finished() {
            return due;
        }

        if self.emitted == 0 {
            due.push(self.next_pulse());
        }
        self.elapsed += dt;

        while !self.is_finished() && self.elapsed >= self.interval {
            self.elapsed -= self.interval;
            due.push(self.next_pulse());
        }
        due
    }

    fn next_pulse(&mut self) -> HapticPulse {
        let side = if self.emitted % 2 == 0 {
            PadSide::Right
        } else {
            PadSide::Left
        };
        self.emitted += 1;
        HapticPulse {
            device: self.device,
            side,
            intensity: self.intensity,
        }
    }
}
