//! Variable-length integers
//!
//! Three unrelated encodings live here:
//! - Solana compact-u16 ("short vec"): 7 bits per byte, at most 3 bytes
//! - Bitcoin CompactSize: `< 0xfd` inline, else a `0xfd`/`0xfe`/`0xff` marker
//!   followed by a 2/4/8-byte little-endian integer
//! - protobuf varint: 7 bits per byte, little-endian groups, up to 10 bytes

use super::{decode_array, decode_bytes, decode_u8};
use crate::error::{CodecError, CodecResult};
use std::io::Cursor;

/// Compact-u16 encoding (variable-length encoding used by Solana)
pub fn encode_compact_u16(value: u16, writer: &mut Vec<u8>) {
    if value <= 0x7f {
        writer.push(value as u8);
    } else if value <= 0x3fff {
        writer.extend_from_slice(&[((value & 0x7f) | 0x80) as u8, (value >> 7) as u8]);
    } else {
        writer.extend_from_slice(&[
            ((value & 0x7f) | 0x80) as u8,
            (((value >> 7) & 0x7f) | 0x80) as u8,
            (value >> 14) as u8,
        ]);
    }
}

/// Encoded width of a compact-u16
pub fn compact_u16_len(value: u16) -> usize {
    if value <= 0x7f {
        1
    } else if value <= 0x3fff {
        2
    } else {
        3
    }
}

/// Decode compact-u16
pub fn decode_compact_u16(cursor: &mut Cursor<&[u8]>) -> CodecResult<u16> {
    let mut value: u32 = 0;

    for i in 0..3 {
        let byte = decode_u8(cursor)?;
        if i == 2 && byte > 0x03 {
            return Err(CodecError::InvalidCompact("compact-u16 overflow".to_string()));
        }
        value |= u32::from(byte & 0x7f) << (i * 7);

        if byte & 0x80 == 0 {
            if byte == 0 && i > 0 {
                return Err(CodecError::InvalidCompact(
                    "compact-u16 with a redundant trailing byte".to_string(),
                ));
            }
            return Ok(value as u16);
        }
    }

    Err(CodecError::InvalidCompact(
        "compact-u16 longer than 3 bytes".to_string(),
    ))
}

/// Length-prefixed byte array with a compact-u16 length
pub fn encode_short_vec_bytes(data: &[u8], writer: &mut Vec<u8>) {
    encode_compact_u16(data.len() as u16, writer);
    writer.extend_from_slice(data);
}

pub fn decode_short_vec_bytes(cursor: &mut Cursor<&[u8]>) -> CodecResult<Vec<u8>> {
    let length = decode_compact_u16(cursor)? as usize;
    Ok(decode_bytes(cursor, length)?.to_vec())
}

/// Bitcoin CompactSize
pub fn write_var_int(value: u64, writer: &mut Vec<u8>) {
    match value {
        0..=0xfc => writer.push(value as u8),
        0xfd..=0xffff => {
            writer.push(0xfd);
            writer.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            writer.push(0xfe);
            writer.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            writer.push(0xff);
            writer.extend_from_slice(&value.to_le_bytes());
        }
    }
}

pub fn var_int_len(value: u64) -> usize {
    match value {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

pub fn read_var_int(cursor: &mut Cursor<&[u8]>) -> CodecResult<u64> {
    let (value, minimum) = match decode_u8(cursor)? {
        0xfd => (u64::from(u16::from_le_bytes(decode_array(cursor)?)), 0xfd),
        0xfe => (u64::from(u32::from_le_bytes(decode_array(cursor)?)), 0x1_0000),
        0xff => (u64::from_le_bytes(decode_array(cursor)?), 0x1_0000_0000),
        small => return Ok(u64::from(small)),
    };
    if value < minimum {
        return Err(CodecError::InvalidCompact(format!(
            "non-canonical CompactSize for {value}"
        )));
    }
    Ok(value)
}

/// CompactSize-prefixed byte string (scripts, witness items)
pub fn write_var_bytes(data: &[u8], writer: &mut Vec<u8>) {
    write_var_int(data.len() as u64, writer);
    writer.extend_from_slice(data);
}

pub fn read_var_bytes(cursor: &mut Cursor<&[u8]>) -> CodecResult<Vec<u8>> {
    let length = usize::try_from(read_var_int(cursor)?)
        .map_err(|_| CodecError::InvalidCompact("length does not fit in usize".to_string()))?;
    Ok(decode_bytes(cursor, length)?.to_vec())
}

/// protobuf base-128 varint
pub fn write_uvarint(mut value: u64, writer: &mut Vec<u8>) {
    while value >= 0x80 {
        writer.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    writer.push(value as u8);
}

pub fn read_uvarint(cursor: &mut Cursor<&[u8]>) -> CodecResult<u64> {
    let mut value: u64 = 0;
    for i in 0..10 {
        let byte = decode_u8(cursor)?;
        if i == 9 && byte > 0x01 {
            return Err(CodecError::InvalidProtobuf("varint overflows u64".to_string()));
        }
        value |= u64::from(byte & 0x7f) << (i * 7);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(CodecError::InvalidProtobuf("varint longer than 10 bytes".to_string()))
}
