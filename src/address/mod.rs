//! Per-ecosystem address codecs
//!
//! Every codec has the same shape: `encode(payload) -> address`,
//! `decode(address) -> payload` and a non-failing `is_valid`. Builders call
//! [`validate`] on every address argument before touching network state.

pub mod evm;
pub mod solana;
pub mod ss58;
pub mod tron;
pub mod utxo;
pub mod xrp;

use crate::chain::{ChainConfig, EcosystemParams};
use crate::error::{CodecResult, Result, TxError};

pub use evm::EvmAddressCodec;
pub use solana::SolanaAddressCodec;
pub use ss58::{Ss58Address, Ss58Codec};
pub use tron::TronAddressCodec;
pub use utxo::{UtxoAddress, UtxoAddressCodec};
pub use xrp::XrpAddressCodec;

/// Address encoding for one ecosystem
pub trait AddressCodec {
    /// What an address decodes to (key hash, public key, ...)
    type Payload;

    fn encode(&self, payload: &Self::Payload) -> CodecResult<String>;

    fn decode(&self, address: &str) -> CodecResult<Self::Payload>;

    fn is_valid(&self, address: &str) -> bool {
        self.decode(address).is_ok()
    }
}

/// Check `address` against the codec of `config`'s ecosystem
pub fn validate(config: &ChainConfig, address: &str) -> Result<()> {
    let outcome = match &config.params {
        EcosystemParams::Evm(_) => EvmAddressCodec.decode(address).map(drop),
        EcosystemParams::Svm(_) => SolanaAddressCodec.decode(address).map(drop),
        EcosystemParams::Utxo(params) => UtxoAddressCodec::new(params).decode(address).map(drop),
        EcosystemParams::Tvm(_) => TronAddressCodec.decode(address).map(drop),
        EcosystemParams::Xrp(_) => XrpAddressCodec.decode(address).map(drop),
        EcosystemParams::Substrate(params) => Ss58Codec::new(params.ss58_prefix)
            .decode(address)
            .map(drop),
    };

    outcome.map_err(|err| TxError::InvalidAddress {
        chain: config.alias,
        address: address.to_string(),
        reason: err.to_string(),
    })
}

pub fn is_valid_address(config: &ChainConfig, address: &str) -> bool {
    validate(config, address).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainAlias;

    #[test]
    fn test_validate_names_chain_and_address() {
        let config = ChainConfig::builtin(ChainAlias::Ethereum);
        let err = validate(&config, "0x1234").unwrap_err();
        match err {
            TxError::InvalidAddress { chain, address, .. } => {
                assert_eq!(chain, ChainAlias::Ethereum);
                assert_eq!(address, "0x1234");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_addresses_are_scoped_to_their_ecosystem() {
        let solana = ChainConfig::builtin(ChainAlias::Solana);
        let bitcoin = ChainConfig::builtin(ChainAlias::Bitcoin);
        let polkadot = ChainConfig::builtin(ChainAlias::Polkadot);
        let kusama = ChainConfig::builtin(ChainAlias::Kusama);

        let sol = "4Nd1mBQtrMJVYVfKf2PJy9NZUZdTAsp7D4xWLs4gDB4T";
        let btc = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
        let dot = "15oF4uVJwmo4TdGW7VfQxNLavjCXviqxT9S1MgbjMNHr6Sp5";

        assert!(is_valid_address(&solana, sol));
        assert!(!is_valid_address(&solana, btc));
        assert!(is_valid_address(&bitcoin, btc));
        assert!(!is_valid_address(&bitcoin, sol));
        assert!(is_valid_address(&polkadot, dot));
        assert!(!is_valid_address(&kusama, dot));
    }
}
