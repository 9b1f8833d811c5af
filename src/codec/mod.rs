//! Low-level byte codecs shared by every ecosystem
//!
//! This module provides cursor-based decoding helpers, the byte-level
//! serialization traits and the chain-agnostic primitives: base58, SCALE compact
//! integers, DER signatures, variable-length integers, RLP and protobuf.

pub mod base58;
pub mod compact;
pub mod der;
pub mod protobuf;
pub mod rlp;
pub mod varint;

use crate::error::{CodecError, CodecResult};
use std::io::Cursor;

/// Trait for types that can be serialized at the byte level
pub trait ByteSerialize {
    fn serialize_bytes(&self, writer: &mut Vec<u8>);

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.serialize_bytes(&mut bytes);
        bytes
    }
}

/// Trait for types that can be deserialized from bytes
pub trait ByteDeserialize: Sized {
    fn deserialize_bytes(cursor: &mut Cursor<&[u8]>) -> CodecResult<Self>;
}

/// Take the next `len` bytes from the cursor
pub fn decode_bytes<'a>(cursor: &mut Cursor<&'a [u8]>, len: usize) -> CodecResult<&'a [u8]> {
    let position = cursor.position() as usize;
    let data: &'a [u8] = *cursor.get_ref();
    let end = position.checked_add(len).ok_or(CodecError::UnexpectedEnd {
        needed: usize::MAX,
        available: data.len(),
    })?;

    if end > data.len() {
        return Err(CodecError::UnexpectedEnd {
            needed: end,
            available: data.len(),
        });
    }

    cursor.set_position(end as u64);
    Ok(&data[position..end])
}

/// Decode a fixed-size array (public keys, hashes, signatures)
pub fn decode_array<const N: usize>(cursor: &mut Cursor<&[u8]>) -> CodecResult<[u8; N]> {
    let mut out = [0u8; N];
    out.copy_from_slice(decode_bytes(cursor, N)?);
    Ok(out)
}

/// Decode a u8
pub fn decode_u8(cursor: &mut Cursor<&[u8]>) -> CodecResult<u8> {
    Ok(decode_array::<1>(cursor)?[0])
}

/// Decode a u16 in little-endian format
pub fn decode_u16_le(cursor: &mut Cursor<&[u8]>) -> CodecResult<u16> {
    Ok(u16::from_le_bytes(decode_array(cursor)?))
}

/// Decode a u32 in little-endian format
pub fn decode_u32_le(cursor: &mut Cursor<&[u8]>) -> CodecResult<u32> {
    Ok(u32::from_le_bytes(decode_array(cursor)?))
}

/// Decode a u64 in little-endian format
pub fn decode_u64_le(cursor: &mut Cursor<&[u8]>) -> CodecResult<u64> {
    Ok(u64::from_le_bytes(decode_array(cursor)?))
}

/// Everything left in the cursor
pub fn remaining<'a>(cursor: &mut Cursor<&'a [u8]>) -> &'a [u8] {
    let data: &'a [u8] = *cursor.get_ref();
    let position = (cursor.position() as usize).min(data.len());
    cursor.set_position(data.len() as u64);
    &data[position..]
}

/// Fail if the cursor has unread bytes
pub fn ensure_consumed(cursor: &Cursor<&[u8]>) -> CodecResult<()> {
    let left = cursor.get_ref().len().saturating_sub(cursor.position() as usize);
    if left > 0 {
        return Err(CodecError::TrailingBytes(left));
    }
    Ok(())
}

/// Decode a hex string, with or without a `0x` prefix
pub fn decode_hex(value: &str) -> CodecResult<Vec<u8>> {
    let trimmed = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    Ok(hex::decode(trimmed)?)
}

/// Decode a hex string into a fixed-size array
pub fn decode_hex_array<const N: usize>(value: &str) -> CodecResult<[u8; N]> {
    let bytes = decode_hex(value)?;
    bytes.as_slice().try_into().map_err(|_| CodecError::InvalidLength {
        expected: N,
        actual: bytes.len(),
    })
}

/// Strip leading zero bytes of a big-endian integer
pub fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().take_while(|&&b| b == 0).count();
    &bytes[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_width_decoding() {
        let bytes = [0x01, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0xEF, 0xCD, 0xAB, 0x90, 0x78, 0x56, 0x34, 0x12];
        let mut cursor = Cursor::new(&bytes[..]);

        assert_eq!(decode_u8(&mut cursor).unwrap(), 0x01);
        assert_eq!(decode_u16_le(&mut cursor).unwrap(), 0x1234);
        assert_eq!(decode_u32_le(&mut cursor).unwrap(), 0x12345678);
        assert_eq!(decode_u64_le(&mut cursor).unwrap(), 0x1234567890ABCDEF);
        ensure_consumed(&cursor).unwrap();
    }

    #[test]
    fn test_buffer_too_small() {
        let bytes = [0u8; 31];
        let mut cursor = Cursor::new(&bytes[..]);
        let err = decode_array::<32>(&mut cursor).unwrap_err();
        assert_eq!(err, CodecError::UnexpectedEnd { needed: 32, available: 31 });
    }

    #[test]
    fn test_trailing_bytes_detected() {
        let bytes = [1u8, 2, 3];
        let mut cursor = Cursor::new(&bytes[..]);
        decode_u8(&mut cursor).unwrap();
        assert_eq!(ensure_consumed(&cursor), Err(CodecError::TrailingBytes(2)));
        assert_eq!(remaining(&mut cursor), &[2, 3]);
        ensure_consumed(&cursor).unwrap();
    }

    #[test]
    fn test_hex_helpers() {
        assert_eq!(decode_hex("0xdeadbeef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(decode_hex("DEADBEEF").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert!(decode_hex_array::<4>("0x0102").is_err());
        assert_eq!(trim_leading_zeros(&[0, 0, 7, 0]), &[7, 0]);
    }
}
