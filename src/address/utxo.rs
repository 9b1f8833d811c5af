//! Bitcoin-family addresses
//!
//! Legacy addresses are Base58Check with a per-chain version byte
//! (pay-to-pubkey-hash or pay-to-script-hash). Segwit addresses are bech32
//! (witness v0) or bech32m (witness v1+, Taproot) under the chain's HRP.

use super::AddressCodec;
use crate::chain::UtxoParams;
use crate::codec::base58::{decode_base58_check, encode_base58_check, Alphabet};
use crate::error::{CodecError, CodecResult};
use bech32::{FromBase32, ToBase32, Variant};

const OP_0: u8 = 0x00;
const OP_1: u8 = 0x51;
const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUAL: u8 = 0x87;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;

/// A decoded address, i.e. one standard output script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UtxoAddress {
    P2pkh([u8; 20]),
    P2sh([u8; 20]),
    P2wpkh([u8; 20]),
    P2wsh([u8; 32]),
    /// Taproot output key (x-only)
    P2tr([u8; 32]),
}

impl UtxoAddress {
    pub fn script_pubkey(&self) -> Vec<u8> {
        match self {
            UtxoAddress::P2pkh(hash) => {
                let mut script = vec![OP_DUP, OP_HASH160, 20];
                script.extend_from_slice(hash);
                script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
                script
            }
            UtxoAddress::P2sh(hash) => {
                let mut script = vec![OP_HASH160, 20];
                script.extend_from_slice(hash);
                script.push(OP_EQUAL);
                script
            }
            UtxoAddress::P2wpkh(hash) => witness_script(OP_0, hash),
            UtxoAddress::P2wsh(hash) => witness_script(OP_0, hash),
            UtxoAddress::P2tr(key) => witness_script(OP_1, key),
        }
    }

    /// Recognise a standard output script
    pub fn from_script_pubkey(script: &[u8]) -> Option<Self> {
        match script {
            [OP_DUP, OP_HASH160, 20, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG] if hash.len() == 20 => {
                hash.try_into().ok().map(UtxoAddress::P2pkh)
            }
            [OP_HASH160, 20, hash @ .., OP_EQUAL] if hash.len() == 20 => {
                hash.try_into().ok().map(UtxoAddress::P2sh)
            }
            [OP_0, 20, hash @ ..] if hash.len() == 20 => hash.try_into().ok().map(UtxoAddress::P2wpkh),
            [OP_0, 32, hash @ ..] if hash.len() == 32 => hash.try_into().ok().map(UtxoAddress::P2wsh),
            [OP_1, 32, key @ ..] if key.len() == 32 => key.try_into().ok().map(UtxoAddress::P2tr),
            _ => None,
        }
    }

    fn witness_program(&self) -> Option<(u8, &[u8])> {
        match self {
            UtxoAddress::P2wpkh(hash) => Some((0, &hash[..])),
            UtxoAddress::P2wsh(hash) => Some((0, &hash[..])),
            UtxoAddress::P2tr(key) => Some((1, &key[..])),
            _ => None,
        }
    }
}

fn witness_script(version_op: u8, program: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(2 + program.len());
    script.push(version_op);
    script.push(program.len() as u8);
    script.extend_from_slice(program);
    script
}

/// Address codec configured with one chain's prefixes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoAddressCodec {
    p2pkh_prefix: u8,
    p2sh_prefix: u8,
    hrp: Option<String>,
}

impl UtxoAddressCodec {
    pub fn new(params: &UtxoParams) -> Self {
        Self {
            p2pkh_prefix: params.p2pkh_prefix,
            p2sh_prefix: params.p2sh_prefix,
            hrp: params.bech32_hrp.clone(),
        }
    }

    /// Address of an output script, `None` for non-standard scripts
    pub fn address_of_script(&self, script: &[u8]) -> Option<String> {
        UtxoAddress::from_script_pubkey(script).and_then(|address| self.encode(&address).ok())
    }

    fn decode_segwit(&self, hrp: &str, address: &str) -> CodecResult<UtxoAddress> {
        let (decoded_hrp, data, variant) =
            bech32::decode(address).map_err(|e| CodecError::Other(e.to_string()))?;
        if decoded_hrp != hrp {
            return Err(CodecError::Other(format!(
                "bech32 prefix {decoded_hrp:?}, expected {hrp:?}"
            )));
        }
        let (version, program) = data
            .split_first()
            .ok_or_else(|| CodecError::Other("empty witness program".to_string()))?;
        let version = version.to_u8();
        let program =
            Vec::<u8>::from_base32(program).map_err(|e| CodecError::Other(e.to_string()))?;

        let expected_variant = if version == 0 { Variant::Bech32 } else { Variant::Bech32m };
        if variant != expected_variant {
            return Err(CodecError::Other(format!(
                "witness v{version} must use {expected_variant:?}"
            )));
        }

        match (version, program.len()) {
            (0, 20) => Ok(UtxoAddress::P2wpkh(fixed(&program)?)),
            (0, 32) => Ok(UtxoAddress::P2wsh(fixed(&program)?)),
            (1, 32) => Ok(UtxoAddress::P2tr(fixed(&program)?)),
            (version, len) => Err(CodecError::Other(format!(
                "unsupported witness program v{version} of {len} bytes"
            ))),
        }
    }
}

fn fixed<const N: usize>(bytes: &[u8]) -> CodecResult<[u8; N]> {
    bytes.try_into().map_err(|_| CodecError::InvalidLength {
        expected: N,
        actual: bytes.len(),
    })
}

impl AddressCodec for UtxoAddressCodec {
    type Payload = UtxoAddress;

    fn encode(&self, payload: &UtxoAddress) -> CodecResult<String> {
        match payload {
            UtxoAddress::P2pkh(hash) => {
                let mut raw = vec![self.p2pkh_prefix];
                raw.extend_from_slice(hash);
                Ok(encode_base58_check(&raw, Alphabet::BITCOIN))
            }
            UtxoAddress::P2sh(hash) => {
                let mut raw = vec![self.p2sh_prefix];
                raw.extend_from_slice(hash);
                Ok(encode_base58_check(&raw, Alphabet::BITCOIN))
            }
            segwit => {
                let hrp = self
                    .hrp
                    .as_deref()
                    .ok_or_else(|| CodecError::Other("chain has no segwit addresses".to_string()))?;
                let (version, program) = segwit
                    .witness_program()
                    .ok_or_else(|| CodecError::Other("not a witness output".to_string()))?;
                let variant = if version == 0 { Variant::Bech32 } else { Variant::Bech32m };
                let mut data = vec![bech32::u5::try_from_u8(version)
                    .map_err(|e| CodecError::Other(e.to_string()))?];
                data.extend(program.to_base32());
                bech32::encode(hrp, data, variant).map_err(|e| CodecError::Other(e.to_string()))
            }
        }
    }

    fn decode(&self, address: &str) -> CodecResult<UtxoAddress> {
        if let Some(hrp) = self.hrp.as_deref() {
            let separator = format!("{hrp}1");
            if address.to_ascii_lowercase().starts_with(&separator) {
                return self.decode_segwit(hrp, address);
            }
        }

        let raw = decode_base58_check(address, Alphabet::BITCOIN)?;
        let (version, hash) = raw
            .split_first()
            .ok_or_else(|| CodecError::Other("empty address".to_string()))?;
        let hash: [u8; 20] = fixed(hash)?;
        if *version == self.p2pkh_prefix {
            Ok(UtxoAddress::P2pkh(hash))
        } else if *version == self.p2sh_prefix {
            Ok(UtxoAddress::P2sh(hash))
        } else {
            Err(CodecError::Other(format!(
                "version byte {version:#04x} does not belong to this chain"
            )))
        }
    }
}
