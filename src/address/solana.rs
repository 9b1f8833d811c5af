//! Solana addresses: base58 of a 32-byte public key

use super::AddressCodec;
use crate::codec::base58::{decode_base58_array, encode_base58};
use crate::error::CodecResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolanaAddressCodec;

impl AddressCodec for SolanaAddressCodec {
    type Payload = [u8; 32];

    fn encode(&self, payload: &[u8; 32]) -> CodecResult<String> {
        Ok(encode_base58(payload))
    }

    fn decode(&self, address: &str) -> CodecResult<[u8; 32]> {
        decode_base58_array(address)
    }
}
