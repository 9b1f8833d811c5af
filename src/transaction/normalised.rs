//! Ecosystem-agnostic view of a transaction, for display and classification

use crate::chain::{ChainAlias, ChainConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionKind {
    NativeTransfer,
    TokenTransfer,
    ContractCall,
    Approval,
    ContractDeployment,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeInfo {
    /// Maximum fee in base units
    pub value: String,
    pub formatted_value: String,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransferInfo {
    pub token: String,
    pub to: String,
    /// Amount in the token's base units
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCallInfo {
    pub contract: String,
    /// Method selector or instruction discriminator, hex
    pub method: Option<String>,
    /// Full call data, hex
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputInfo {
    /// `None` for non-standard scripts
    pub address: Option<String>,
    pub value: String,
    pub formatted_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalisedTransaction {
    pub chain_alias: ChainAlias,
    pub to: Option<String>,
    pub from: Option<String>,
    /// Native value in base units
    pub value: String,
    pub formatted_value: String,
    pub symbol: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<FeeInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_transfer: Option<TokenTransferInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_call: Option<ContractCallInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<OutputInfo>>,
    pub metadata: BTreeMap<String, String>,
}

impl NormalisedTransaction {
    /// Empty projection carrying the chain's native symbol
    pub fn new(config: &ChainConfig, kind: TransactionKind) -> Self {
        Self {
            chain_alias: config.alias,
            to: None,
            from: None,
            value: "0".to_string(),
            formatted_value: "0".to_string(),
            symbol: config.native.symbol.clone(),
            kind,
            fee: None,
            token_transfer: None,
            contract_call: None,
            outputs: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, config: &ChainConfig, value: u128) -> Self {
        self.value = value.to_string();
        self.formatted_value = format_units(value, config.native.decimals);
        self
    }

    pub fn with_fee(mut self, config: &ChainConfig, fee: u128) -> Self {
        self.fee = Some(FeeInfo {
            value: fee.to_string(),
            formatted_value: format_units(fee, config.native.decimals),
            symbol: config.native.symbol.clone(),
        });
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

/// Render `value` base units with `decimals` fractional digits, trimming
/// trailing zeros: `format_units(1_500_000_000, 9) == "1.5"`
pub fn format_units(value: u128, decimals: u8) -> String {
    let digits = value.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }

    let padded = format!("{digits:0>width$}", width = decimals + 1);
    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(0, 18), "0");
        assert_eq!(format_units(1_000_000_000, 9), "1");
        assert_eq!(format_units(1_500_000_000, 9), "1.5");
        assert_eq!(format_units(1, 8), "0.00000001");
        assert_eq!(format_units(123, 0), "123");
        assert_eq!(format_units(u128::MAX, 18), "340282366920938463463.374607431768211455");
    }

    #[test]
    fn test_type_field_name() {
        let config = ChainConfig::builtin(ChainAlias::Ethereum);
        let normalised = NormalisedTransaction::new(&config, TransactionKind::ContractDeployment)
            .with_value(&config, 10u128.pow(18));
        let json = serde_json::to_value(&normalised).unwrap();
        assert_eq!(json["type"], "contract-deployment");
        assert_eq!(json["formattedValue"], "1");
        assert_eq!(json["symbol"], "ETH");
        assert!(json.get("fee").is_none());
    }
}
