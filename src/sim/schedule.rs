//! Cooperative timers and tweens
//!
//! Everything here is advanced explicitly by the tick with the elapsed
//! milliseconds. Nothing runs on its own.

use serde::{Deserialize, Serialize};

use crate::{lerp, sine_in_out, sine_out};

/// A looping timer that can be paused and resumed.
///
/// Changing the interval means building a new timer; the old one is dropped
/// along with any progress it had, so it can never fire again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Periodic {
    interval_ms: f32,
    elapsed_ms: f32,
    paused: bool,
}

impl Periodic {
    pub fn new(interval_ms: f32, paused: bool) -> Self {
        Self {
            interval_ms: interval_ms.max(1.0),
            elapsed_ms: 0.0,
            paused,
        }
    }

    pub fn interval_ms(&self) -> f32 {
        self.interval_ms
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Advance by `dt_ms`; returns how many times the timer fired
    pub fn advance(&mut self, dt_ms: f32) -> u32 {
        if self.paused || dt_ms <= 0.0 {
            return 0;
        }
        self.elapsed_ms += dt_ms;
        let mut fired = 0;
        while self.elapsed_ms >= self.interval_ms {
            self.elapsed_ms -= self.interval_ms;
            fired += 1;
        }
        fired
    }
}

/// Easing curves used by the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Easing {
    Linear,
    SineOut,
    SineInOut,
}

impl Easing {
    pub fn apply(self, t: f32) -> f32 {
        match self {
            Easing::Linear => t.clamp(0.0, 1.0),
            Easing::SineOut => sine_out(t),
            Easing::SineInOut => sine_in_out(t),
        }
    }
}

/// One-shot interpolation between two values over a fixed duration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tween {
    pub from: f32,
    pub to: f32,
    duration_ms: f32,
    elapsed_ms: f32,
    easing: Easing,
}

impl Tween {
    pub fn new(from: f32, to: f32, duration_ms: f32, easing: Easing) -> Self {
        Self {
            from,
            to,
            duration_ms: duration_ms.max(0.0),
            elapsed_ms: 0.0,
            easing,
        }
    }

    /// Current value without advancing
    pub fn value(&self) -> f32 {
        if self.duration_ms <= 0.0 {
            return self.to;
        }
        let t = self.elapsed_ms / self.duration_ms;
        lerp(self.from, self.to, self.easing.apply(t))
    }

    /// Advance and return the new value
    pub fn advance(&mut self, dt_ms: f32) -> f32 {
        self.elapsed_ms = (self.elapsed_ms + dt_ms.max(0.0)).min(self.duration_ms);
        self.value()
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed_ms >= self.duration_ms
    }
}
