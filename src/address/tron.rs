//! Tron addresses: Base58Check of `0x41 || keccak-derived account hash`

use super::AddressCodec;
use crate::codec::base58::{decode_base58_check, encode_base58_check, Alphabet};
use crate::error::{CodecError, CodecResult};

/// Version byte of mainnet account addresses
pub const ADDRESS_PREFIX: u8 = 0x41;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TronAddressCodec;

impl AddressCodec for TronAddressCodec {
    /// The 20-byte account hash, shared with the EVM address of the same key
    type Payload = [u8; 20];

    fn encode(&self, payload: &[u8; 20]) -> CodecResult<String> {
        Ok(encode_base58_check(&to_raw(payload), Alphabet::BITCOIN))
    }

    fn decode(&self, address: &str) -> CodecResult<[u8; 20]> {
        let raw = decode_base58_check(address, Alphabet::BITCOIN)?;
        from_raw(&raw)
    }
}

/// 21-byte on-chain form used inside protobuf messages
pub fn to_raw(account: &[u8; 20]) -> [u8; 21] {
    let mut raw = [0u8; 21];
    raw[0] = ADDRESS_PREFIX;
    raw[1..].copy_from_slice(account);
    raw
}

pub fn from_raw(raw: &[u8]) -> CodecResult<[u8; 20]> {
    if raw.len() != 21 {
        return Err(CodecError::InvalidLength {
            expected: 21,
            actual: raw.len(),
        });
    }
    if raw[0] != ADDRESS_PREFIX {
        return Err(CodecError::Other(format!(
            "Tron address prefix {:#04x}, expected {ADDRESS_PREFIX:#04x}",
            raw[0]
        )));
    }
    let mut account = [0u8; 20];
    account.copy_from_slice(&raw[1..]);
    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;

    const USDT: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

    #[test]
    fn test_known_contract_address() {
        let account = TronAddressCodec.decode(USDT).unwrap();
        assert_eq!(
            hex::encode(to_raw(&account)),
            "41a614f803b6fd780986a42c78ec9c7f77e6ded13c"
        );
        assert_eq!(TronAddressCodec.encode(&account).unwrap(), USDT);
    }

    #[test]
    fn test_rejects_foreign_prefix_and_checksum() {
        assert!(from_raw(&[0x00; 21]).is_err());
        assert!(!TronAddressCodec.is_valid("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6u"));
        // a Bitcoin P2PKH address has a valid checksum but the wrong version byte
        assert!(!TronAddressCodec.is_valid("1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2"));
    }
}
