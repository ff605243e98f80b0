//! Raw FIFO bytes to timestamped physical samples

use std::fmt;
use std::time::Instant;

use tracing::warn;

use crate::bridge::RawBlock;
use crate::config::{BitDepth, Scale};

/// Standard gravity in m/s²
pub const STANDARD_GRAVITY: f32 = 9.80665;

/// Decode one axis register pair into a signed count
///
/// 14-bit samples are left-justified across MSB/LSB; 8-bit fast-read samples
/// use the MSB alone and `lsb` is ignored.
///
/// # Example
/// ```
/// use mma8451_acquisition::config::BitDepth;
/// use mma8451_acquisition::decoder::decode_axis;
///
/// assert_eq!(decode_axis(0x40, 0x00, BitDepth::Bits14), 4096);
/// assert_eq!(decode_axis(0xFF, 0xFC, BitDepth::Bits14), -1);
/// assert_eq!(decode_axis(0xC0, 0x00, BitDepth::Bits8), -64);
/// ```
pub fn decode_axis(msb: u8, lsb: u8, depth: BitDepth) -> i16 {
    match depth {
        BitDepth::Bits14 => {
            let raw = (((msb as u16) << 8) | lsb as u16) >> 2;
            if raw > 8191 {
                raw as i16 - 16384
            } else {
                raw as i16
            }
        }
        BitDepth::Bits8 => {
            let raw = msb as i16;
            if raw > 127 {
                raw - 256
            } else {
                raw
            }
        }
    }
}

/// Register bytes for a signed count, inverse of [`decode_axis`]
///
/// Returns `[msb, lsb]`; the LSB is zero in 8-bit mode. Counts outside the
/// precision's range wrap like the hardware register would.
pub fn encode_axis(counts: i16, depth: BitDepth) -> [u8; 2] {
    match depth {
        BitDepth::Bits14 => {
            let word = ((counts as u16) & 0x3FFF) << 2;
            word.to_be_bytes()
        }
        BitDepth::Bits8 => [counts as u8, 0],
    }
}

/// Split a burst of output-register bytes into per-sample counts
///
/// Trailing bytes that do not form a whole sample are ignored.
pub fn decode_counts(bytes: &[u8], depth: BitDepth) -> Vec<[i16; 3]> {
    let stride = depth.bytes_per_sample();
    bytes
        .chunks_exact(stride)
        .map(|chunk| match depth {
            BitDepth::Bits14 => [
                decode_axis(chunk[0], chunk[1], depth),
                decode_axis(chunk[2], chunk[3], depth),
                decode_axis(chunk[4], chunk[5], depth),
            ],
            BitDepth::Bits8 => [
                decode_axis(chunk[0], 0, depth),
                decode_axis(chunk[1], 0, depth),
                decode_axis(chunk[2], 0, depth),
            ],
        })
        .collect()
}

/// Units of decoded samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Units {
    #[default]
    G,
    MetersPerSecondSquared,
    /// Raw signed counts, unscaled
    Counts,
}

impl Units {
    pub fn label(self) -> &'static str {
        match self {
            Units::G => "g",
            Units::MetersPerSecondSquared => "m/s^2",
            Units::Counts => "counts",
        }
    }

    pub fn convert(self, counts: i16, scale: &Scale) -> f32 {
        match self {
            Units::G => scale.to_g(counts),
            Units::MetersPerSecondSquared => scale.to_g(counts) * STANDARD_GRAVITY,
            Units::Counts => counts as f32,
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One decoded acceleration triple
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Seconds since acquisition start
    pub timestamp: f64,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Sample {
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Converts raw blocks into samples
///
/// Precision and range come from the block's own [`Scale`] snapshot, never
/// from the live device configuration.
#[derive(Debug, Clone)]
pub struct Decoder {
    units: Units,
    epoch: Instant,
}

impl Decoder {
    pub fn new(units: Units, epoch: Instant) -> Self {
        Self { units, epoch }
    }

    pub fn units(&self) -> Units {
        self.units
    }

    /// Decode a block, oldest sample first
    ///
    /// The last sample is stamped with the block's capture time and earlier
    /// ones are spaced backwards by the sample period.
    pub fn decode(&self, block: &RawBlock) -> Vec<Sample> {
        let stride = block.scale.bytes_per_sample();
        if block.bytes.len() % stride != 0 {
            warn!(
                sequence = block.sequence,
                len = block.bytes.len(),
                stride,
                "raw block is not a whole number of samples"
            );
        }

        let counts = decode_counts(&block.bytes, block.scale.bit_depth);
        let end = block.captured_at.saturating_duration_since(self.epoch).as_secs_f64();
        let dt = block.sample_period.as_secs_f64();
        let n = counts.len();

        counts
            .iter()
            .enumerate()
            .map(|(i, [x, y, z])| Sample {
                timestamp: end - (n - 1 - i) as f64 * dt,
                x: self.units.convert(*x, &block.scale),
                y: self.units.convert(*y, &block.scale),
                z: self.units.convert(*z, &block.scale),
            })
            .collect()
    }
}
