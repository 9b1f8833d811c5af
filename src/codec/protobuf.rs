//! Minimal protobuf wire format (Tron)
//!
//! Only the two wire types Tron transactions use are supported: varint (0)
//! and length-delimited (2). Fields are written in the order the caller emits
//! them, which must be ascending field number for canonical output.

use super::decode_bytes;
use super::varint::{read_uvarint, write_uvarint};
use crate::error::{CodecError, CodecResult};
use std::io::Cursor;

pub const WIRE_VARINT: u8 = 0;
pub const WIRE_LEN: u8 = 2;

fn write_key(field: u32, wire_type: u8, out: &mut Vec<u8>) {
    write_uvarint((u64::from(field) << 3) | u64::from(wire_type), out);
}

/// Varint field, omitted when zero (proto3 default)
pub fn write_varint_field(field: u32, value: u64, out: &mut Vec<u8>) {
    if value == 0 {
        return;
    }
    write_key(field, WIRE_VARINT, out);
    write_uvarint(value, out);
}

/// Signed int64 field, two's complement as a 10-byte varint when negative
pub fn write_int64_field(field: u32, value: i64, out: &mut Vec<u8>) {
    write_varint_field(field, value as u64, out);
}

/// Length-delimited field, omitted when empty (proto3 default)
pub fn write_bytes_field(field: u32, value: &[u8], out: &mut Vec<u8>) {
    if value.is_empty() {
        return;
    }
    write_key(field, WIRE_LEN, out);
    write_uvarint(value.len() as u64, out);
    out.extend_from_slice(value);
}

/// Value of one decoded field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Varint(u64),
    Bytes(&'a [u8]),
}

impl<'a> FieldValue<'a> {
    pub fn as_varint(&self, field: u32) -> CodecResult<u64> {
        match self {
            FieldValue::Varint(value) => Ok(*value),
            FieldValue::Bytes(_) => Err(CodecError::InvalidProtobuf(format!(
                "field {field}: expected varint, found length-delimited"
            ))),
        }
    }

    pub fn as_bytes(&self, field: u32) -> CodecResult<&'a [u8]> {
        match self {
            FieldValue::Bytes(value) => Ok(value),
            FieldValue::Varint(_) => Err(CodecError::InvalidProtobuf(format!(
                "field {field}: expected length-delimited, found varint"
            ))),
        }
    }
}

/// Iterates over the fields of one message
pub struct FieldReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> FieldReader<'a> {
    pub fn new(message: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(message),
        }
    }

    /// Next `(field number, value)`, or `None` at the end of the message
    pub fn next_field(&mut self) -> CodecResult<Option<(u32, FieldValue<'a>)>> {
        if self.cursor.position() as usize >= self.cursor.get_ref().len() {
            return Ok(None);
        }

        let key = read_uvarint(&mut self.cursor)?;
        let field = u32::try_from(key >> 3)
            .map_err(|_| CodecError::InvalidProtobuf(format!("field number {} too large", key >> 3)))?;
        if field == 0 {
            return Err(CodecError::InvalidProtobuf("field number 0".to_string()));
        }

        let value = match (key & 0x07) as u8 {
            WIRE_VARINT => FieldValue::Varint(read_uvarint(&mut self.cursor)?),
            WIRE_LEN => {
                let len = usize::try_from(read_uvarint(&mut self.cursor)?)
                    .map_err(|_| CodecError::InvalidProtobuf("length overflows usize".to_string()))?;
                FieldValue::Bytes(decode_bytes(&mut self.cursor, len)?)
            }
            other => {
                return Err(CodecError::InvalidProtobuf(format!(
                    "field {field}: unsupported wire type {other}"
                )))
            }
        };

        Ok(Some((field, value)))
    }
}
