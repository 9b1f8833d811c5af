//! SCALE compact integers
//!
//! The low two bits of the first byte select the mode:
//!
//! | mode | range | width |
//! |---|---|---|
//! | `0b00` | `< 2^6` | 1 byte |
//! | `0b01` | `< 2^14` | 2 bytes LE |
//! | `0b10` | `< 2^30` | 4 bytes LE |
//! | `0b11` | `>= 2^30` | 1 length byte + 4..=16 bytes LE |

use crate::error::{CodecError, CodecResult};
use std::io::Cursor;

const SINGLE_BYTE_MAX: u128 = (1 << 6) - 1;
const TWO_BYTE_MAX: u128 = (1 << 14) - 1;
const FOUR_BYTE_MAX: u128 = (1 << 30) - 1;

/// A decoded compact integer and the number of bytes it occupied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactDecoded {
    pub value: u128,
    pub bytes_read: usize,
}

/// Append the compact encoding of `value`
pub fn encode_compact(value: u128, out: &mut Vec<u8>) {
    if value <= SINGLE_BYTE_MAX {
        out.push((value as u8) << 2);
    } else if value <= TWO_BYTE_MAX {
        out.extend_from_slice(&(((value as u16) << 2) | 0b01).to_le_bytes());
    } else if value <= FOUR_BYTE_MAX {
        out.extend_from_slice(&(((value as u32) << 2) | 0b10).to_le_bytes());
    } else {
        let le = value.to_le_bytes();
        let byte_count = (16 - value.leading_zeros() as usize / 8).max(4);
        out.push((((byte_count - 4) as u8) << 2) | 0b11);
        out.extend_from_slice(&le[..byte_count]);
    }
}

pub fn compact_to_vec(value: u128) -> Vec<u8> {
    let mut out = Vec::with_capacity(compact_len(value));
    encode_compact(value, &mut out);
    out
}

/// Encoded width of `value` in bytes
pub fn compact_len(value: u128) -> usize {
    if value <= SINGLE_BYTE_MAX {
        1
    } else if value <= TWO_BYTE_MAX {
        2
    } else if value <= FOUR_BYTE_MAX {
        4
    } else {
        1 + (16 - value.leading_zeros() as usize / 8).max(4)
    }
}

/// Decode a compact integer from the start of `bytes`
///
/// Trailing bytes are left alone; `bytes_read` tells the caller where the
/// next field starts. Non-canonical encodings (a value that fits a narrower
/// mode) are rejected.
pub fn decode_compact(bytes: &[u8]) -> CodecResult<CompactDecoded> {
    let first = *bytes.first().ok_or(CodecError::UnexpectedEnd {
        needed: 1,
        available: 0,
    })?;

    let (value, bytes_read, minimum) = match first & 0b11 {
        0b00 => (u128::from(first >> 2), 1, 0),
        0b01 => {
            let raw = u16::from_le_bytes(take::<2>(bytes)?);
            (u128::from(raw >> 2), 2, SINGLE_BYTE_MAX + 1)
        }
        0b10 => {
            let raw = u32::from_le_bytes(take::<4>(bytes)?);
            (u128::from(raw >> 2), 4, TWO_BYTE_MAX + 1)
        }
        _ => {
            let byte_count = usize::from(first >> 2) + 4;
            if byte_count > 16 {
                return Err(CodecError::InvalidCompact(format!(
                    "{byte_count}-byte integers exceed 128 bits"
                )));
            }
            let end = 1 + byte_count;
            if bytes.len() < end {
                return Err(CodecError::UnexpectedEnd {
                    needed: end,
                    available: bytes.len(),
                });
            }
            let mut le = [0u8; 16];
            le[..byte_count].copy_from_slice(&bytes[1..end]);
            let value = u128::from_le_bytes(le);
            if bytes[end - 1] == 0 && byte_count > 4 {
                return Err(CodecError::InvalidCompact(
                    "big-integer mode with a redundant high byte".to_string(),
                ));
            }
            (value, end, FOUR_BYTE_MAX + 1)
        }
    };

    if value < minimum {
        return Err(CodecError::InvalidCompact(format!(
            "{value} is not canonically encoded in {bytes_read} bytes"
        )));
    }

    Ok(CompactDecoded { value, bytes_read })
}

/// Decode a compact integer at the cursor position and advance past it
pub fn decode_compact_from(cursor: &mut Cursor<&[u8]>) -> CodecResult<u128> {
    let position = (cursor.position() as usize).min(cursor.get_ref().len());
    let decoded = decode_compact(&cursor.get_ref()[position..])?;
    cursor.set_position((position + decoded.bytes_read) as u64);
    Ok(decoded.value)
}

/// Decode a compact length prefix as `usize`
pub fn decode_compact_len(cursor: &mut Cursor<&[u8]>) -> CodecResult<usize> {
    let value = decode_compact_from(cursor)?;
    usize::try_from(value)
        .map_err(|_| CodecError::InvalidCompact(format!("length {value} does not fit in usize")))
}

fn take<const N: usize>(bytes: &[u8]) -> CodecResult<[u8; N]> {
    bytes
        .get(..N)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(CodecError::UnexpectedEnd {
            needed: N,
            available: bytes.len(),
        })
}
