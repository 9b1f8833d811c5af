//! Transaction mortality
//!
//! A mortal era is valid for `period` blocks starting at the block whose
//! number is congruent to `phase` modulo `period`.

use crate::codec::decode_u8;
use crate::error::{CodecError, CodecResult};
use std::fmt;
use std::io::Cursor;

const MIN_PERIOD: u64 = 4;
const MAX_PERIOD: u64 = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Era {
    Immortal,
    Mortal { period: u64, phase: u64 },
}

impl Era {
    /// Era starting at `current`, lasting about `period` blocks
    ///
    /// The period is rounded up to a power of two in `4..=65536` and the
    /// phase is quantized so that it fits the two-byte encoding.
    pub fn mortal(period: u64, current: u64) -> Self {
        let period = period
            .checked_next_power_of_two()
            .unwrap_or(MAX_PERIOD)
            .clamp(MIN_PERIOD, MAX_PERIOD);
        let phase = current % period;
        let quantize_factor = (period >> 12).max(1);
        Era::Mortal {
            period,
            phase: phase / quantize_factor * quantize_factor,
        }
    }

    pub fn is_immortal(&self) -> bool {
        matches!(self, Era::Immortal)
    }

    /// First block in which a transaction with this era is valid
    pub fn birth(&self, current: u64) -> u64 {
        match *self {
            Era::Immortal => 0,
            Era::Mortal { period, phase } => {
                (current.max(phase) - phase) / period * period + phase
            }
        }
    }

    /// First block in which it is no longer valid
    pub fn death(&self, current: u64) -> u64 {
        match *self {
            Era::Immortal => u64::MAX,
            Era::Mortal { period, .. } => self.birth(current) + period,
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        match *self {
            Era::Immortal => out.push(0),
            Era::Mortal { period, phase } => {
                let quantize_factor = (period >> 12).max(1);
                let low = (period.trailing_zeros().saturating_sub(1)).clamp(1, 15) as u16;
                let high = ((phase / quantize_factor) << 4) as u16;
                out.extend_from_slice(&(low | high).to_le_bytes());
            }
        }
    }

    pub fn decode(cursor: &mut Cursor<&[u8]>) -> CodecResult<Self> {
        let first = decode_u8(cursor)?;
        if first == 0 {
            return Ok(Era::Immortal);
        }
        let encoded = u64::from(first) | (u64::from(decode_u8(cursor)?) << 8);
        let period = 2u64 << (encoded % 16);
        let quantize_factor = (period >> 12).max(1);
        let phase = (encoded >> 4) * quantize_factor;
        if period >= MIN_PERIOD && phase < period {
            Ok(Era::Mortal { period, phase })
        } else {
            Err(CodecError::Other(format!(
                "invalid era: period {period}, phase {phase}"
            )))
        }
    }
}

impl fmt::Display for Era {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Era::Immortal => f.write_str("immortal"),
            Era::Mortal { period, phase } => write!(f, "mortal({period}, {phase})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encoded(era: Era) -> Vec<u8> {
        let mut out = Vec::new();
        era.encode(&mut out);
        out
    }

    #[test]
    fn test_mortal_encoding() {
        let era = Era::mortal(64, 42);
        assert_eq!(era, Era::Mortal { period: 64, phase: 42 });
        assert_eq!(encoded(era), vec![5 + 42 % 16 * 16, 42 / 16]);
        assert_eq!(encoded(Era::Immortal), vec![0]);
    }

    #[test]
    fn test_quantized_and_clamped() {
        assert_eq!(
            Era::mortal(1_000_000, 1_000_000),
            Era::Mortal { period: 65_536, phase: 1_000_000 % 65_536 / 16 * 16 }
        );
        assert_eq!(Era::mortal(1, 7), Era::Mortal { period: 4, phase: 3 });
        assert_eq!(Era::mortal(50, 10), Era::Mortal { period: 64, phase: 10 });
    }

    #[test]
    fn test_birth_and_death() {
        let era = Era::mortal(64, 1_000);
        assert_eq!(era.birth(1_000), 1_000);
        assert_eq!(era.birth(1_010), 1_000);
        assert_eq!(era.death(1_010), 1_064);
        assert_eq!(Era::Immortal.birth(5), 0);
    }

    #[test]
    fn test_rejects_phase_beyond_period() {
        // period 4 (low bits 1), phase 15
        let bytes = [0xf1u8, 0x00];
        assert!(Era::decode(&mut Cursor::new(&bytes[..])).is_err());
    }

    proptest! {
        #[test]
        fn prop_mortal_decodes(period in 1u64..200_000, current in 0u64..10_000_000) {
            let era = Era::mortal(period, current);
            let bytes = encoded(era);
            prop_assert_eq!(bytes.len(), 2);
            prop_assert_eq!(Era::decode(&mut Cursor::new(&bytes[..])).unwrap(), era);
        }
    }
}
