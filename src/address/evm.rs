//! EVM addresses with EIP-55 mixed-case checksums

use super::AddressCodec;
use crate::error::{CodecError, CodecResult};
use crate::hash::keccak256;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvmAddressCodec;

impl AddressCodec for EvmAddressCodec {
    type Payload = [u8; 20];

    fn encode(&self, payload: &[u8; 20]) -> CodecResult<String> {
        Ok(to_checksum_address(payload))
    }

    fn decode(&self, address: &str) -> CodecResult<[u8; 20]> {
        parse_address(address)
    }
}

/// `0x`-prefixed EIP-55 representation
pub fn to_checksum_address(address: &[u8; 20]) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Parse a `0x`-prefixed address. All-lowercase and all-uppercase forms are
/// accepted as-is; mixed case must carry a valid checksum.
pub fn parse_address(address: &str) -> CodecResult<[u8; 20]> {
    let body = address
        .strip_prefix("0x")
        .ok_or_else(|| CodecError::Other("missing 0x prefix".to_string()))?;
    if body.len() != 40 {
        return Err(CodecError::InvalidLength {
            expected: 40,
            actual: body.len(),
        });
    }

    let mut bytes = [0u8; 20];
    hex::decode_to_slice(body, &mut bytes)?;

    let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = body.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && to_checksum_address(&bytes)[2..] != *body {
        return Err(CodecError::ChecksumMismatch);
    }

    Ok(bytes)
}

/// Address of an uncompressed secp256k1 public key (65 bytes, `0x04` prefix)
pub fn address_from_public_key(uncompressed: &[u8]) -> CodecResult<[u8; 20]> {
    if uncompressed.len() != 65 || uncompressed[0] != 0x04 {
        return Err(CodecError::InvalidLength {
            expected: 65,
            actual: uncompressed.len(),
        });
    }
    let hash = keccak256(&uncompressed[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&hash[12..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eip55_vectors() {
        for address in [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ] {
            let bytes = parse_address(address).unwrap();
            assert_eq!(to_checksum_address(&bytes), address);
        }
    }

    #[test]
    fn test_single_case_accepted_without_checksum() {
        let lower = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";
        let upper = "0x5AAEB6053F3E94C9B9A09F33669435E7EF1BEAED";
        assert_eq!(parse_address(lower).unwrap(), parse_address(upper).unwrap());
    }

    #[test]
    fn test_bad_checksum_and_shape() {
        assert_eq!(
            parse_address("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAeD"),
            Err(CodecError::ChecksumMismatch)
        );
        assert!(parse_address("5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").is_err());
        assert!(parse_address("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeA").is_err());
        assert!(!EvmAddressCodec.is_valid("0xzzAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"));
    }
}
