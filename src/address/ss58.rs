//! SS58 addresses (Substrate)
//!
//! `base58(prefix || public_key || checksum)` where the checksum is the first
//! two bytes of `blake2b_512("SS58PRE" || prefix || public_key)`. Prefixes
//! below 64 take one byte, prefixes below 16384 take two bit-packed bytes.

use super::AddressCodec;
use crate::codec::base58::{decode_base58, encode_base58};
use crate::error::{CodecError, CodecResult};
use crate::hash::blake2b_512;

const CHECKSUM_TAG: &[u8] = b"SS58PRE";
const CHECKSUM_LEN: usize = 2;
const PUBLIC_KEY_LEN: usize = 32;
pub const MAX_PREFIX: u16 = 16383;

/// A decoded SS58 address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ss58Address {
    pub public_key: [u8; 32],
    pub prefix: u16,
}

/// SS58 codec, optionally pinned to a network prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ss58Codec {
    expected_prefix: Option<u16>,
}

impl Ss58Codec {
    pub fn new(prefix: u16) -> Self {
        Self {
            expected_prefix: Some(prefix),
        }
    }

    /// Accept any network prefix
    pub fn any_prefix() -> Self {
        Self {
            expected_prefix: None,
        }
    }
}

impl AddressCodec for Ss58Codec {
    type Payload = Ss58Address;

    fn encode(&self, payload: &Ss58Address) -> CodecResult<String> {
        encode_address(&payload.public_key, payload.prefix)
    }

    fn decode(&self, address: &str) -> CodecResult<Ss58Address> {
        let decoded = decode_address(address)?;
        match self.expected_prefix {
            Some(expected) if expected != decoded.prefix => Err(CodecError::Other(format!(
                "SS58 prefix {} does not match network prefix {expected}",
                decoded.prefix
            ))),
            _ => Ok(decoded),
        }
    }
}

fn prefix_bytes(prefix: u16) -> CodecResult<Vec<u8>> {
    match prefix {
        0..=63 => Ok(vec![prefix as u8]),
        64..=MAX_PREFIX => Ok(vec![
            (((prefix & 0x00fc) >> 2) as u8) | 0x40,
            ((prefix >> 8) as u8) | (((prefix & 0x0003) << 6) as u8),
        ]),
        _ => Err(CodecError::Other(format!(
            "SS58 prefix {prefix} exceeds {MAX_PREFIX}"
        ))),
    }
}

fn checksum(prefix: &[u8], public_key: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = blake2b_512(&[CHECKSUM_TAG, prefix, public_key]);
    [digest[0], digest[1]]
}

pub fn encode_address(public_key: &[u8], prefix: u16) -> CodecResult<String> {
    if public_key.len() != PUBLIC_KEY_LEN {
        return Err(CodecError::InvalidLength {
            expected: PUBLIC_KEY_LEN,
            actual: public_key.len(),
        });
    }

    let mut payload = prefix_bytes(prefix)?;
    let sum = checksum(&payload, public_key);
    payload.extend_from_slice(public_key);
    payload.extend_from_slice(&sum);
    Ok(encode_base58(&payload))
}

pub fn decode_address(address: &str) -> CodecResult<Ss58Address> {
    let data = decode_base58(address)?;
    let first = *data.first().ok_or(CodecError::UnexpectedEnd {
        needed: 1,
        available: 0,
    })?;

    let (prefix, prefix_len) = match first {
        0..=63 => (u16::from(first), 1),
        64..=127 => {
            let second = *data.get(1).ok_or(CodecError::UnexpectedEnd {
                needed: 2,
                available: data.len(),
            })?;
            let lower = ((first & 0x3f) << 2) | (second >> 6);
            let upper = second & 0x3f;
            ((u16::from(upper) << 8) | u16::from(lower), 2)
        }
        _ => {
            return Err(CodecError::Other(format!(
                "reserved SS58 prefix byte {first:#04x}"
            )))
        }
    };

    let expected_len = prefix_len + PUBLIC_KEY_LEN + CHECKSUM_LEN;
    if data.len() != expected_len {
        return Err(CodecError::InvalidLength {
            expected: expected_len,
            actual: data.len(),
        });
    }

    let (body, sum) = data.split_at(prefix_len + PUBLIC_KEY_LEN);
    let (prefix_raw, key) = body.split_at(prefix_len);
    if checksum(prefix_raw, key) != sum {
        return Err(CodecError::ChecksumMismatch);
    }

    let mut public_key = [0u8; PUBLIC_KEY_LEN];
    public_key.copy_from_slice(key);
    Ok(Ss58Address { public_key, prefix })
}

/// Decode-then-compare; never fails
pub fn is_valid_address(address: &str, expected_prefix: Option<u16>) -> bool {
    match decode_address(address) {
        Ok(decoded) => expected_prefix.map_or(true, |prefix| prefix == decoded.prefix),
        Err(_) => false,
    }
}
