//! Parse previously serialized transactions

use super::normalised::NormalisedTransaction;
use super::RawTransaction;
use crate::chain::ChainConfig;
use crate::error::{Result, TxError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeFormat {
    Raw,
    Normalised,
}

impl FromStr for DecodeFormat {
    type Err = TxError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "raw" => Ok(DecodeFormat::Raw),
            "normalised" | "normalized" => Ok(DecodeFormat::Normalised),
            other => Err(TxError::Config(format!("unknown decode format {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Raw(RawTransaction),
    Normalised(NormalisedTransaction),
}

impl Decoded {
    pub fn into_raw(self) -> Option<RawTransaction> {
        match self {
            Decoded::Raw(raw) => Some(raw),
            Decoded::Normalised(_) => None,
        }
    }

    pub fn into_normalised(self) -> Option<NormalisedTransaction> {
        match self {
            Decoded::Raw(_) => None,
            Decoded::Normalised(normalised) => Some(normalised),
        }
    }
}

/// Decode an unsigned or signed transaction of `config`'s ecosystem
///
/// Every failure is reported as [`TxError::Parse`] naming the ecosystem.
pub fn decode(config: &ChainConfig, serialized: &[u8], format: DecodeFormat) -> Result<Decoded> {
    let ecosystem = config.ecosystem();
    let as_parse_error = |err: TxError| match err {
        TxError::Parse { .. } => err,
        other => TxError::parse(ecosystem, other),
    };

    let raw = RawTransaction::decode(config, serialized).map_err(as_parse_error)?;
    match format {
        DecodeFormat::Raw => Ok(Decoded::Raw(raw)),
        DecodeFormat::Normalised => raw
            .normalise(config)
            .map(Decoded::Normalised)
            .map_err(as_parse_error),
    }
}

/// [`decode`] for hex input, with or without `0x`
pub fn decode_hex(config: &ChainConfig, serialized: &str, format: DecodeFormat) -> Result<Decoded> {
    let bytes = crate::codec::decode_hex(serialized)
        .map_err(|err| TxError::parse(config.ecosystem(), err))?;
    decode(config, &bytes, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainAlias, Ecosystem};

    #[test]
    fn test_garbage_is_a_parse_error_for_every_ecosystem() {
        for alias in [
            ChainAlias::Ethereum,
            ChainAlias::Solana,
            ChainAlias::Bitcoin,
            ChainAlias::Tron,
            ChainAlias::Xrp,
            ChainAlias::Polkadot,
        ] {
            let config = ChainConfig::builtin(alias);
            let err = decode(&config, &[0xff, 0x00, 0x13], DecodeFormat::Raw).unwrap_err();
            match err {
                TxError::Parse { ecosystem, .. } => assert_eq!(ecosystem, alias.ecosystem()),
                other => panic!("{alias}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_invalid_hex_is_a_parse_error() {
        let config = ChainConfig::builtin(ChainAlias::Ethereum);
        let err = decode_hex(&config, "0xzz", DecodeFormat::Raw).unwrap_err();
        assert!(matches!(err, TxError::Parse { ecosystem: Ecosystem::Evm, .. }));
    }

    #[test]
    fn test_format_names() {
        assert_eq!("raw".parse::<DecodeFormat>().unwrap(), DecodeFormat::Raw);
        assert_eq!("normalised".parse::<DecodeFormat>().unwrap(), DecodeFormat::Normalised);
        assert!("json".parse::<DecodeFormat>().is_err());
    }
}
