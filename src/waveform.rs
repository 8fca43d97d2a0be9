//! Per-channel sample buffer. A thin newtype over `Vec<i16>` so the two
//! sample-rate-aware length rules (§3) live in one place instead of being
//! recomputed at every call site.

use serde::{Deserialize, Serialize};

/// PMTs sample at 40 MHz, SiPMs at 1 MHz; a SiPM waveform covering the same
/// trigger window as a PMT waveform is accordingly 40x shorter.
pub const SIPM_DECIMATION: u32 = 40;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waveform(pub Vec<i16>);

impl Waveform {
    /// A zero-filled waveform of the given length, created lazily on first
    /// mention of an electronics ID in a channel mask.
    pub fn zeroed(len: usize) -> Self {
        Waveform(vec![0i16; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn samples(&self) -> &[i16] {
        &self.0
    }

    pub fn samples_mut(&mut self) -> &mut [i16] {
        &mut self.0
    }

    /// Waveform length for a PMT channel: one sample per buffer slot.
    pub fn pmt_len(buffer_samples: u32) -> usize {
        buffer_samples as usize
    }

    /// Waveform length for a SiPM channel: decimated by the 40:1 sample
    /// rate ratio between PMT and SiPM front ends.
    pub fn sipm_len(buffer_samples: u32) -> usize {
        (buffer_samples / SIPM_DECIMATION) as usize
    }
}
