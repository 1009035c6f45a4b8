//! Offline protocol analysis of captured bus waveforms.

pub mod spi;

pub use spi::{SpiDecoder, SpiFrame, SpiWord};

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SampleRate(pub f64); // Hz

impl SampleRate {
    pub fn seconds(self, sample: usize) -> f64 {
        sample as f64 / self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeSpan {
    pub start_s: f64,
    pub end_s: f64,
}

impl TimeSpan {
    pub fn duration_s(&self) -> f64 {
        self.end_s - self.start_s
    }
}
