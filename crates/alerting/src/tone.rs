//! Alarm tone generation
//!
//! Produces the two-tone siren used by [`crate::CommandAlarm`] as a
//! mono 16-bit PCM WAV file.

use std::f32::consts::PI;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::SinkError;

/// Siren parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SirenSpec {
    pub sample_rate: u32,
    pub duration_secs: f32,
    pub low_hz: f32,
    pub high_hz: f32,
    /// Time spent on each tone before switching
    pub switch_secs: f32,
    /// Linear fade in and out to avoid clicks
    pub fade_secs: f32,
    /// Peak amplitude as a fraction of full scale
    pub volume: f32,
}

impl Default for SirenSpec {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            duration_secs: 3.0,
            low_hz: 800.0,
            high_hz: 1200.0,
            switch_secs: 0.5,
            fade_secs: 0.1,
            volume: 0.5,
        }
    }
}

/// Render the siren as signed 16-bit samples
pub fn siren_samples(spec: &SirenSpec) -> Vec<i16> {
    let total = (spec.sample_rate as f32 * spec.duration_secs) as usize;
    let fade = ((spec.sample_rate as f32 * spec.fade_secs) as usize).min(total / 2);
    let rate = spec.sample_rate as f32;

    (0..total)
        .map(|i| {
            let t = i as f32 / rate;
            let freq = if ((t / spec.switch_secs) as usize) % 2 == 0 {
                spec.low_hz
            } else {
                spec.high_hz
            };

            let envelope = if fade > 0 && i < fade {
                i as f32 / fade as f32
            } else if fade > 0 && i >= total - fade {
                (total - 1 - i) as f32 / fade as f32
            } else {
                1.0
            };

            let value = (2.0 * PI * freq * t).sin() * envelope * spec.volume;
            (value * i16::MAX as f32) as i16
        })
        .collect()
}

/// Wrap PCM samples in a RIFF/WAVE container
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    const CHANNELS: u16 = 1;
    const BITS: u16 = 16;
    let block_align = CHANNELS * BITS / 8;
    let byte_rate = sample_rate * block_align as u32;
    let data_len = (samples.len() * 2) as u32;

    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&CHANNELS.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

/// Write the siren to `path`
pub fn write_siren(path: &Path, spec: &SirenSpec) -> Result<(), SinkError> {
    let wav = encode_wav(&siren_samples(spec), spec.sample_rate);
    fs::write(path, &wav)?;
    info!("Alarm sound saved as {} ({} bytes)", path.display(), wav.len());
    Ok(())
}
