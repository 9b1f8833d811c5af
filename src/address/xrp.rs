//! XRP Ledger classic addresses: Base58Check with the Ripple alphabet

use super::AddressCodec;
use crate::codec::base58::{decode_base58_check, encode_base58_check, Alphabet};
use crate::error::{CodecError, CodecResult};

const ACCOUNT_ID_VERSION: u8 = 0x00;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XrpAddressCodec;

impl AddressCodec for XrpAddressCodec {
    /// 20-byte AccountID (`hash160` of the signing public key)
    type Payload = [u8; 20];

    fn encode(&self, payload: &[u8; 20]) -> CodecResult<String> {
        let mut raw = Vec::with_capacity(21);
        raw.push(ACCOUNT_ID_VERSION);
        raw.extend_from_slice(payload);
        Ok(encode_base58_check(&raw, Alphabet::RIPPLE))
    }

    fn decode(&self, address: &str) -> CodecResult<[u8; 20]> {
        let raw = decode_base58_check(address, Alphabet::RIPPLE)?;
        match raw.split_first() {
            Some((&ACCOUNT_ID_VERSION, account)) if account.len() == 20 => {
                let mut out = [0u8; 20];
                out.copy_from_slice(account);
                Ok(out)
            }
            Some((&ACCOUNT_ID_VERSION, account)) => Err(CodecError::InvalidLength {
                expected: 20,
                actual: account.len(),
            }),
            _ => Err(CodecError::Other("not an XRP account address".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_account() {
        let account = XrpAddressCodec
            .decode("rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh")
            .unwrap();
        assert_eq!(hex::encode(account), "b5f762798a53d543a014caf8b297cff8f2f937e8");
        assert_eq!(
            XrpAddressCodec.encode(&account).unwrap(),
            "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh"
        );
    }

    #[test]
    fn test_account_zero() {
        assert_eq!(
            XrpAddressCodec.encode(&[0u8; 20]).unwrap(),
            "rrrrrrrrrrrrrrrrrrrrrhoLvTp"
        );
    }

    #[test]
    fn test_bitcoin_alphabet_rejected() {
        assert!(!XrpAddressCodec.is_valid("1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2"));
        assert!(!XrpAddressCodec.is_valid("rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTi"));
    }
}
