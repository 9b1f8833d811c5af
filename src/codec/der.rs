//! DER encoding of 64-byte `r || s` ECDSA signatures
//!
//! `0x30 len 0x02 rlen r 0x02 slen s`, each integer minimally encoded and
//! prefixed with `0x00` when its high bit is set.

use crate::codec::trim_leading_zeros;
use crate::error::{CodecError, CodecResult};

const SEQUENCE: u8 = 0x30;
const INTEGER: u8 = 0x02;

/// Encode a compact `r || s` signature as DER
pub fn signature_to_der(signature: &[u8]) -> CodecResult<Vec<u8>> {
    if signature.len() != 64 {
        return Err(CodecError::InvalidLength {
            expected: 64,
            actual: signature.len(),
        });
    }

    let r = der_integer(&signature[..32]);
    let s = der_integer(&signature[32..]);

    let mut out = Vec::with_capacity(6 + r.len() + s.len());
    out.push(SEQUENCE);
    out.push((4 + r.len() + s.len()) as u8);
    out.push(INTEGER);
    out.push(r.len() as u8);
    out.extend_from_slice(&r);
    out.push(INTEGER);
    out.push(s.len() as u8);
    out.extend_from_slice(&s);
    Ok(out)
}

/// Decode a DER signature back into 32-byte `r` and `s` halves
pub fn signature_from_der(der: &[u8]) -> CodecResult<[u8; 64]> {
    let (&tag, rest) = der.split_first().ok_or_else(|| invalid("empty input"))?;
    if tag != SEQUENCE {
        return Err(invalid(format!("expected SEQUENCE tag, found {tag:#04x}")));
    }
    let (&len, body) = rest.split_first().ok_or_else(|| invalid("missing length"))?;
    if usize::from(len) != body.len() {
        return Err(invalid(format!(
            "sequence length {len} does not match {} remaining bytes",
            body.len()
        )));
    }

    let (r, body) = read_integer(body)?;
    let (s, body) = read_integer(body)?;
    if !body.is_empty() {
        return Err(CodecError::TrailingBytes(body.len()));
    }

    let mut out = [0u8; 64];
    out[32 - r.len()..32].copy_from_slice(r);
    out[64 - s.len()..].copy_from_slice(s);
    Ok(out)
}

fn der_integer(value: &[u8]) -> Vec<u8> {
    let trimmed = trim_leading_zeros(value);
    let trimmed = if trimmed.is_empty() { &[0u8][..] } else { trimmed };

    let mut out = Vec::with_capacity(trimmed.len() + 1);
    if trimmed[0] & 0x80 != 0 {
        out.push(0x00);
    }
    out.extend_from_slice(trimmed);
    out
}

/// Read one INTEGER, returning its magnitude without sign padding
fn read_integer(input: &[u8]) -> CodecResult<(&[u8], &[u8])> {
    match input {
        [INTEGER, len, rest @ ..] => {
            let len = usize::from(*len);
            if len == 0 || rest.len() < len {
                return Err(invalid("truncated integer"));
            }
            let (value, rest) = rest.split_at(len);
            if value[0] & 0x80 != 0 {
                return Err(invalid("negative integer"));
            }
            let magnitude = if value.len() > 1 && value[0] == 0 {
                if value[1] & 0x80 == 0 {
                    return Err(invalid("non-minimal integer padding"));
                }
                &value[1..]
            } else {
                value
            };
            if magnitude.len() > 32 {
                return Err(invalid("integer wider than 32 bytes"));
            }
            Ok((magnitude, rest))
        }
        _ => Err(invalid("expected INTEGER")),
    }
}

fn invalid(reason: impl Into<String>) -> CodecError {
    CodecError::InvalidDer(reason.into())
}
