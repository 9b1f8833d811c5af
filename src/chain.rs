//! Chain aliases, ecosystems and chain configuration
//!
//! A [`ChainAlias`] names one concrete network and maps onto exactly one
//! [`Ecosystem`]. [`ChainConfig`] carries the per-network parameters the codecs
//! need (chain id, address prefixes, pallet indices, ...). Configurations are
//! plain serde records so they can be loaded from TOML.

use crate::error::{Result, TxError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Known chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChainAlias {
    Ethereum,
    Polygon,
    Arbitrum,
    Optimism,
    Base,
    Bsc,
    Avalanche,
    Solana,
    Bitcoin,
    BitcoinTestnet,
    Litecoin,
    Dogecoin,
    Tron,
    Xrp,
    Polkadot,
    Kusama,
    Westend,
}

impl ChainAlias {
    pub const ALL: [ChainAlias; 17] = [
        ChainAlias::Ethereum,
        ChainAlias::Polygon,
        ChainAlias::Arbitrum,
        ChainAlias::Optimism,
        ChainAlias::Base,
        ChainAlias::Bsc,
        ChainAlias::Avalanche,
        ChainAlias::Solana,
        ChainAlias::Bitcoin,
        ChainAlias::BitcoinTestnet,
        ChainAlias::Litecoin,
        ChainAlias::Dogecoin,
        ChainAlias::Tron,
        ChainAlias::Xrp,
        ChainAlias::Polkadot,
        ChainAlias::Kusama,
        ChainAlias::Westend,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChainAlias::Ethereum => "ethereum",
            ChainAlias::Polygon => "polygon",
            ChainAlias::Arbitrum => "arbitrum",
            ChainAlias::Optimism => "optimism",
            ChainAlias::Base => "base",
            ChainAlias::Bsc => "bsc",
            ChainAlias::Avalanche => "avalanche",
            ChainAlias::Solana => "solana",
            ChainAlias::Bitcoin => "bitcoin",
            ChainAlias::BitcoinTestnet => "bitcoin-testnet",
            ChainAlias::Litecoin => "litecoin",
            ChainAlias::Dogecoin => "dogecoin",
            ChainAlias::Tron => "tron",
            ChainAlias::Xrp => "xrp",
            ChainAlias::Polkadot => "polkadot",
            ChainAlias::Kusama => "kusama",
            ChainAlias::Westend => "westend",
        }
    }

    /// The ecosystem this chain belongs to
    pub fn ecosystem(&self) -> Ecosystem {
        match self {
            ChainAlias::Ethereum
            | ChainAlias::Polygon
            | ChainAlias::Arbitrum
            | ChainAlias::Optimism
            | ChainAlias::Base
            | ChainAlias::Bsc
            | ChainAlias::Avalanche => Ecosystem::Evm,
            ChainAlias::Solana => Ecosystem::Svm,
            ChainAlias::Bitcoin
            | ChainAlias::BitcoinTestnet
            | ChainAlias::Litecoin
            | ChainAlias::Dogecoin => Ecosystem::Utxo,
            ChainAlias::Tron => Ecosystem::Tvm,
            ChainAlias::Xrp => Ecosystem::Xrp,
            ChainAlias::Polkadot | ChainAlias::Kusama | ChainAlias::Westend => Ecosystem::Substrate,
        }
    }
}

impl fmt::Display for ChainAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainAlias {
    type Err = TxError;

    fn from_str(s: &str) -> Result<Self> {
        ChainAlias::ALL
            .iter()
            .copied()
            .find(|alias| alias.as_str() == s)
            .ok_or_else(|| TxError::Config(format!("unknown chain alias {s:?}")))
    }
}

/// A family of chains sharing one wire format and signature scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Evm,
    Svm,
    Utxo,
    Tvm,
    Xrp,
    Substrate,
}

impl Ecosystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Evm => "evm",
            Ecosystem::Svm => "svm",
            Ecosystem::Utxo => "utxo",
            Ecosystem::Tvm => "tvm",
            Ecosystem::Xrp => "xrp",
            Ecosystem::Substrate => "substrate",
        }
    }

    /// Signature algorithm used when the chain configuration does not pick one
    pub fn default_algorithm(&self) -> SignatureAlgorithm {
        match self {
            Ecosystem::Evm | Ecosystem::Utxo | Ecosystem::Tvm | Ecosystem::Xrp => {
                SignatureAlgorithm::Secp256k1Ecdsa
            }
            Ecosystem::Svm => SignatureAlgorithm::Ed25519,
            Ecosystem::Substrate => SignatureAlgorithm::Sr25519,
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signature algorithm a signer must use for a payload entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureAlgorithm {
    Secp256k1Ecdsa,
    Ed25519,
    Secp256k1Schnorr,
    Sr25519,
}

impl SignatureAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Secp256k1Ecdsa => "secp256k1-ecdsa",
            SignatureAlgorithm::Ed25519 => "ed25519",
            SignatureAlgorithm::Secp256k1Schnorr => "secp256k1-schnorr",
            SignatureAlgorithm::Sr25519 => "sr25519",
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Native asset of a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeAsset {
    pub symbol: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmParams {
    pub chain_id: u64,
    /// Build EIP-1559 transactions by default
    #[serde(default = "default_true")]
    pub eip1559: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolanaParams {
    #[serde(default = "default_max_transaction_size")]
    pub max_transaction_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoParams {
    /// Base58Check version byte of pay-to-pubkey-hash addresses
    pub p2pkh_prefix: u8,
    /// Base58Check version byte of pay-to-script-hash addresses
    pub p2sh_prefix: u8,
    /// Human readable part of segwit addresses, `None` for chains without segwit
    #[serde(default)]
    pub bech32_hrp: Option<String>,
    #[serde(default = "default_dust_limit")]
    pub dust_limit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TronParams {
    /// Fee limit (in sun) for smart contract calls
    #[serde(default = "default_tron_fee_limit")]
    pub default_fee_limit: i64,
    #[serde(default = "default_tron_expiration")]
    pub expiration_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XrpParams {
    /// Ledgers after the current one before the transaction expires
    #[serde(default = "default_ledger_offset")]
    pub ledger_offset: u32,
    /// Minimum fee in drops
    #[serde(default = "default_xrp_base_fee")]
    pub base_fee: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubstrateScheme {
    Sr25519,
    Ed25519,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstrateParams {
    pub ss58_prefix: u16,
    #[serde(default = "default_substrate_scheme")]
    pub signature_scheme: SubstrateScheme,
    pub balances_pallet_index: u8,
    /// Call index of `transfer_keep_alive` inside the balances pallet
    pub transfer_call_index: u8,
    /// Runtime has the `CheckMetadataHash` signed extension
    #[serde(default)]
    pub metadata_hash_check: bool,
    #[serde(default = "default_era_period")]
    pub default_era_period: u64,
}

/// Per-ecosystem parameters, tagged by ecosystem name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "ecosystem", rename_all = "lowercase")]
pub enum EcosystemParams {
    Evm(EvmParams),
    Svm(SolanaParams),
    Utxo(UtxoParams),
    Tvm(TronParams),
    Xrp(XrpParams),
    Substrate(SubstrateParams),
}

impl EcosystemParams {
    pub fn ecosystem(&self) -> Ecosystem {
        match self {
            EcosystemParams::Evm(_) => Ecosystem::Evm,
            EcosystemParams::Svm(_) => Ecosystem::Svm,
            EcosystemParams::Utxo(_) => Ecosystem::Utxo,
            EcosystemParams::Tvm(_) => Ecosystem::Tvm,
            EcosystemParams::Xrp(_) => Ecosystem::Xrp,
            EcosystemParams::Substrate(_) => Ecosystem::Substrate,
        }
    }
}

/// Configuration of one chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub alias: ChainAlias,
    pub native: NativeAsset,
    #[serde(default)]
    pub rpc_url: Option<String>,
    pub params: EcosystemParams,
}

impl ChainConfig {
    /// Mainnet preset for a known chain
    pub fn builtin(alias: ChainAlias) -> Self {
        let (symbol, decimals, params) = match alias {
            ChainAlias::Ethereum => ("ETH", 18, evm(1, true)),
            ChainAlias::Polygon => ("POL", 18, evm(137, true)),
            ChainAlias::Arbitrum => ("ETH", 18, evm(42161, true)),
            ChainAlias::Optimism => ("ETH", 18, evm(10, true)),
            ChainAlias::Base => ("ETH", 18, evm(8453, true)),
            ChainAlias::Bsc => ("BNB", 18, evm(56, false)),
            ChainAlias::Avalanche => ("AVAX", 18, evm(43114, true)),
            ChainAlias::Solana => (
                "SOL",
                9,
                EcosystemParams::Svm(SolanaParams {
                    max_transaction_size: default_max_transaction_size(),
                }),
            ),
            ChainAlias::Bitcoin => ("BTC", 8, utxo(0x00, 0x05, Some("bc"), 546)),
            ChainAlias::BitcoinTestnet => ("tBTC", 8, utxo(0x6f, 0xc4, Some("tb"), 546)),
            ChainAlias::Litecoin => ("LTC", 8, utxo(0x30, 0x32, Some("ltc"), 546)),
            ChainAlias::Dogecoin => ("DOGE", 8, utxo(0x1e, 0x16, None, 1_000_000)),
            ChainAlias::Tron => (
                "TRX",
                6,
                EcosystemParams::Tvm(TronParams {
                    default_fee_limit: default_tron_fee_limit(),
                    expiration_ms: default_tron_expiration(),
                }),
            ),
            ChainAlias::Xrp => (
                "XRP",
                6,
                EcosystemParams::Xrp(XrpParams {
                    ledger_offset: default_ledger_offset(),
                    base_fee: default_xrp_base_fee(),
                }),
            ),
            ChainAlias::Polkadot => ("DOT", 10, substrate(0, 5, true)),
            ChainAlias::Kusama => ("KSM", 12, substrate(2, 4, true)),
            ChainAlias::Westend => ("WND", 12, substrate(42, 4, true)),
        };

        Self {
            alias,
            native: NativeAsset {
                symbol: symbol.to_string(),
                decimals,
            },
            rpc_url: None,
            params,
        }
    }

    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = Some(url.into());
        self
    }

    pub fn ecosystem(&self) -> Ecosystem {
        self.alias.ecosystem()
    }

    /// Check that the parameters belong to the alias' ecosystem
    pub fn validate(&self) -> Result<()> {
        let declared = self.params.ecosystem();
        if declared != self.ecosystem() {
            return Err(TxError::Config(format!(
                "{} is a {} chain but was configured with {} parameters",
                self.alias,
                self.ecosystem(),
                declared
            )));
        }
        if self.native.decimals > 38 {
            return Err(TxError::Config(format!(
                "{}: {} decimals cannot be represented",
                self.alias, self.native.decimals
            )));
        }
        if let EcosystemParams::Substrate(params) = &self.params {
            if params.ss58_prefix >= 16384 {
                return Err(TxError::Config(format!(
                    "{}: SS58 prefix {} is out of range",
                    self.alias, params.ss58_prefix
                )));
            }
        }
        Ok(())
    }

    /// Parse and validate a single chain from TOML
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: ChainConfig =
            toml::from_str(source).map_err(|e| TxError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Signature algorithm used by default for this chain
    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        match &self.params {
            EcosystemParams::Evm(_)
            | EcosystemParams::Utxo(_)
            | EcosystemParams::Tvm(_)
            | EcosystemParams::Xrp(_) => SignatureAlgorithm::Secp256k1Ecdsa,
            EcosystemParams::Svm(_) => SignatureAlgorithm::Ed25519,
            EcosystemParams::Substrate(params) => match params.signature_scheme {
                SubstrateScheme::Sr25519 => SignatureAlgorithm::Sr25519,
                SubstrateScheme::Ed25519 => SignatureAlgorithm::Ed25519,
            },
        }
    }

    pub fn evm(&self) -> Result<&EvmParams> {
        match &self.params {
            EcosystemParams::Evm(params) => Ok(params),
            other => Err(self.params_mismatch(Ecosystem::Evm, other)),
        }
    }

    pub fn solana(&self) -> Result<&SolanaParams> {
        match &self.params {
            EcosystemParams::Svm(params) => Ok(params),
            other => Err(self.params_mismatch(Ecosystem::Svm, other)),
        }
    }

    pub fn utxo(&self) -> Result<&UtxoParams> {
        match &self.params {
            EcosystemParams::Utxo(params) => Ok(params),
            other => Err(self.params_mismatch(Ecosystem::Utxo, other)),
        }
    }

    pub fn tron(&self) -> Result<&TronParams> {
        match &self.params {
            EcosystemParams::Tvm(params) => Ok(params),
            other => Err(self.params_mismatch(Ecosystem::Tvm, other)),
        }
    }

    pub fn xrp(&self) -> Result<&XrpParams> {
        match &self.params {
            EcosystemParams::Xrp(params) => Ok(params),
            other => Err(self.params_mismatch(Ecosystem::Xrp, other)),
        }
    }

    pub fn substrate(&self) -> Result<&SubstrateParams> {
        match &self.params {
            EcosystemParams::Substrate(params) => Ok(params),
            other => Err(self.params_mismatch(Ecosystem::Substrate, other)),
        }
    }

    fn params_mismatch(&self, wanted: Ecosystem, found: &EcosystemParams) -> TxError {
        TxError::Config(format!(
            "{}: expected {} parameters, found {}",
            self.alias,
            wanted,
            found.ecosystem()
        ))
    }
}

/// Chain configurations keyed by alias
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: HashMap<ChainAlias, ChainConfig>,
}

#[derive(Deserialize)]
struct RegistryFile {
    #[serde(default)]
    chains: Vec<ChainConfig>,
}

impl ChainRegistry {
    /// Registry holding every built-in preset
    pub fn builtin() -> Self {
        let chains = ChainAlias::ALL
            .iter()
            .map(|alias| (*alias, ChainConfig::builtin(*alias)))
            .collect();
        Self { chains }
    }

    /// Load `[[chains]]` tables from TOML
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let file: RegistryFile =
            toml::from_str(source).map_err(|e| TxError::Config(e.to_string()))?;
        let mut registry = Self::default();
        for config in file.chains {
            registry.insert(config)?;
        }
        Ok(registry)
    }

    pub fn insert(&mut self, config: ChainConfig) -> Result<()> {
        config.validate()?;
        self.chains.insert(config.alias, config);
        Ok(())
    }

    pub fn get(&self, alias: ChainAlias) -> Result<&ChainConfig> {
        self.chains
            .get(&alias)
            .ok_or_else(|| TxError::Config(format!("chain {alias} is not configured")))
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

fn evm(chain_id: u64, eip1559: bool) -> EcosystemParams {
    EcosystemParams::Evm(EvmParams { chain_id, eip1559 })
}

fn utxo(p2pkh_prefix: u8, p2sh_prefix: u8, hrp: Option<&str>, dust_limit: u64) -> EcosystemParams {
    EcosystemParams::Utxo(UtxoParams {
        p2pkh_prefix,
        p2sh_prefix,
        bech32_hrp: hrp.map(str::to_string),
        dust_limit,
    })
}

fn substrate(ss58_prefix: u16, balances_pallet_index: u8, metadata_hash_check: bool) -> EcosystemParams {
    EcosystemParams::Substrate(SubstrateParams {
        ss58_prefix,
        signature_scheme: SubstrateScheme::Sr25519,
        balances_pallet_index,
        transfer_call_index: 3,
        metadata_hash_check,
        default_era_period: default_era_period(),
    })
}

fn default_true() -> bool {
    true
}

fn default_max_transaction_size() -> usize {
    1232
}

fn default_dust_limit() -> u64 {
    546
}

fn default_tron_fee_limit() -> i64 {
    100_000_000
}

fn default_tron_expiration() -> i64 {
    60_000
}

fn default_ledger_offset() -> u32 {
    20
}

fn default_xrp_base_fee() -> u64 {
    12
}

fn default_substrate_scheme() -> SubstrateScheme {
    SubstrateScheme::Sr25519
}

fn default_era_period() -> u64 {
    64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_maps_to_one_ecosystem() {
        for alias in ChainAlias::ALL {
            let config = ChainConfig::builtin(alias);
            assert_eq!(config.params.ecosystem(), alias.ecosystem(), "{alias}");
            config.validate().unwrap();
        }
    }

    #[test]
    fn test_alias_string_round_trip() {
        for alias in ChainAlias::ALL {
            assert_eq!(alias.as_str().parse::<ChainAlias>().unwrap(), alias);
        }
        assert!("dogechain".parse::<ChainAlias>().is_err());
    }

    #[test]
    fn test_mismatched_params_rejected() {
        let mut config = ChainConfig::builtin(ChainAlias::Solana);
        config.params = ChainConfig::builtin(ChainAlias::Ethereum).params;
        assert!(matches!(config.validate(), Err(TxError::Config(_))));
    }

    #[test]
    fn test_config_from_toml() {
        let source = r#"
            alias = "polygon"
            rpc_url = "https://polygon-rpc.example"

            [native]
            symbol = "POL"
            decimals = 18

            [params]
            ecosystem = "evm"
            chain_id = 137
        "#;
        let config = ChainConfig::from_toml_str(source).unwrap();
        assert_eq!(config.alias, ChainAlias::Polygon);
        assert_eq!(config.evm().unwrap().chain_id, 137);
        assert!(config.evm().unwrap().eip1559);
        assert!(config.solana().is_err());
    }

    #[test]
    fn test_registry_from_toml() {
        let source = r#"
            [[chains]]
            alias = "westend"
            native = { symbol = "WND", decimals = 12 }
            params = { ecosystem = "substrate", ss58_prefix = 42, balances_pallet_index = 4, transfer_call_index = 3 }

            [[chains]]
            alias = "dogecoin"
            native = { symbol = "DOGE", decimals = 8 }
            params = { ecosystem = "utxo", p2pkh_prefix = 30, p2sh_prefix = 22 }
        "#;
        let registry = ChainRegistry::from_toml_str(source).unwrap();
        assert_eq!(registry.len(), 2);

        let westend = registry.get(ChainAlias::Westend).unwrap();
        let params = westend.substrate().unwrap();
        assert_eq!(params.signature_scheme, SubstrateScheme::Sr25519);
        assert_eq!(params.default_era_period, 64);
        assert_eq!(westend.signature_algorithm(), SignatureAlgorithm::Sr25519);

        assert!(registry.get(ChainAlias::Ethereum).is_err());
    }
}
