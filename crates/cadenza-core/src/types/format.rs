//! Output audio format descriptor.

use serde::{Deserialize, Serialize};

/// PCM sample representation delivered to the renderer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    #[default]
    F32,
    I16,
    I32,
}

impl SampleFormat {
    /// Size in bytes of one sample.
    pub const fn bytes_per_sample(self) -> u32 {
        match self {
            Self::I16 => 2,
            Self::F32 | Self::I32 => 4,
        }
    }
}

/// Describes the PCM layout a decoded entry is converted to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
    pub interleaved: bool,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            sample_format: SampleFormat::F32,
            interleaved: false,
        }
    }
}

impl OutputFormat {
    /// Bytes occupied by one frame (one sample per channel).
    pub const fn bytes_per_frame(&self) -> u32 {
        self.sample_format.bytes_per_sample() * self.channels as u32
    }

    /// Convert a frame count to seconds.
    #[allow(clippy::cast_precision_loss)]
    pub fn frames_to_seconds(&self, frames: u64) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        frames as f64 / f64::from(self.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bytes_per_frame() {
        let format = OutputFormat::default();
        assert_eq!(format.bytes_per_frame(), 8);

        let pcm16 = OutputFormat {
            sample_format: SampleFormat::I16,
            ..OutputFormat::default()
        };
        assert_eq!(pcm16.bytes_per_frame(), 4);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_frames_to_seconds() {
        let format = OutputFormat::default();
        assert_eq!(format.frames_to_seconds(44_100), 1.0);

        let broken = OutputFormat {
            sample_rate: 0,
            ..OutputFormat::default()
        };
        assert_eq!(broken.frames_to_seconds(10), 0.0);
    }

    proptest! {
        #[test]
        fn prop_frames_to_seconds_monotonic(
            a in 0u64..1_000_000_000,
            b in 0u64..1_000_000_000,
            rate in 1u32..384_000,
        ) {
            let format = OutputFormat {
                sample_rate: rate,
                ..OutputFormat::default()
            };
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(format.frames_to_seconds(lo) <= format.frames_to_seconds(hi));
        }
    }
}
