use super::abi::Erc20Call;
use super::EvmTransaction;
use crate::address::evm::parse_address;
use crate::chain::ChainConfig;
use crate::error::{Result, TxError};
use crate::transaction::network::EvmState;
use crate::transaction::overrides::{EvmOverrides, EvmTxType};
use crate::transaction::TransactionRequest;
use tracing::debug;

/// Build an EVM transaction from a request and the account's network state
pub fn build(
    config: &ChainConfig,
    request: &TransactionRequest,
    state: &EvmState,
    overrides: &EvmOverrides,
) -> Result<EvmTransaction> {
    let params = config.evm()?;
    let address = |value: &str| {
        parse_address(value).map_err(|err| TxError::InvalidAddress {
            chain: config.alias,
            address: value.to_string(),
            reason: err.to_string(),
        })
    };

    let (to, value, data) = match request {
        TransactionRequest::NativeTransfer(transfer) => (
            Some(address(&transfer.to)?),
            transfer.amount,
            overrides.data.clone().unwrap_or_default(),
        ),
        TransactionRequest::TokenTransfer(transfer) => {
            let call = Erc20Call::Transfer {
                to: address(&transfer.to)?,
                amount: transfer.amount,
            };
            (Some(address(&transfer.token)?), 0, call.encode())
        }
        TransactionRequest::ContractCall(call) => (
            Some(address(&call.contract)?),
            call.value,
            overrides.data.clone().unwrap_or_else(|| call.data.clone()),
        ),
        TransactionRequest::ContractDeploy(deploy) => {
            if deploy.bytecode.is_empty() {
                return Err(TxError::invalid_transaction(config.alias, "empty contract bytecode"));
            }
            (None, deploy.value, deploy.bytecode.clone())
        }
    };

    let gas_limit = overrides.gas_limit.unwrap_or(state.gas_limit);
    if gas_limit == 0 {
        return Err(TxError::invalid_transaction(config.alias, "gas limit must be positive"));
    }

    let tx_type = overrides.tx_type.unwrap_or(if params.eip1559 {
        EvmTxType::Eip1559
    } else {
        EvmTxType::Legacy
    });

    let (gas_price, max_fee_per_gas, max_priority_fee_per_gas) = match tx_type {
        EvmTxType::Legacy => (Some(overrides.gas_price.unwrap_or(state.gas_price)), None, None),
        EvmTxType::Eip1559 => {
            let max_fee = overrides.max_fee_per_gas.unwrap_or(state.max_fee_per_gas);
            let priority = overrides
                .max_priority_fee_per_gas
                .unwrap_or(state.max_priority_fee_per_gas);
            if priority > max_fee {
                return Err(TxError::invalid_transaction(
                    config.alias,
                    format!("priority fee {priority} exceeds max fee {max_fee}"),
                ));
            }
            (None, Some(max_fee), Some(priority))
        }
    };

    let tx = EvmTransaction {
        tx_type,
        chain_id: params.chain_id,
        nonce: overrides.nonce.unwrap_or(state.nonce),
        gas_limit,
        gas_price,
        max_fee_per_gas,
        max_priority_fee_per_gas,
        to,
        value,
        data,
        access_list: Vec::new(),
        signature: None,
    };

    debug!(
        chain = %config.alias,
        nonce = tx.nonce,
        gas_limit = tx.gas_limit,
        max_fee = %tx.max_fee(),
        "built EVM transaction"
    );
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainAlias;
    use crate::transaction::{ContractDeploy, NativeTransfer, TokenTransfer};

    const FROM: &str = "0x9d8A62f656a8d1615C1294fd71e9CFb3E4855A4F";
    const TO: &str = "0x3535353535353535353535353535353535353535";
    const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";

    fn state() -> EvmState {
        EvmState {
            nonce: 4,
            gas_limit: 21_000,
            gas_price: 20_000_000_000,
            max_fee_per_gas: 30_000_000_000,
            max_priority_fee_per_gas: 1_000_000_000,
        }
    }

    #[test]
    fn test_native_transfer_defaults_to_eip1559() {
        let config = ChainConfig::builtin(ChainAlias::Ethereum);
        let request = NativeTransfer::new(FROM, TO, 5).into();
        let tx = build(&config, &request, &state(), &EvmOverrides::default()).unwrap();
        assert_eq!(tx.tx_type, EvmTxType::Eip1559);
        assert_eq!(tx.chain_id, 1);
        assert_eq!(tx.nonce, 4);
        assert_eq!(tx.max_fee_per_gas, Some(30_000_000_000));
        assert_eq!(tx.value, 5);
    }

    #[test]
    fn test_legacy_chain_uses_gas_price() {
        let config = ChainConfig::builtin(ChainAlias::Bsc);
        let request = NativeTransfer::new(FROM, TO, 5).into();
        let tx = build(&config, &request, &state(), &EvmOverrides::default()).unwrap();
        assert_eq!(tx.tx_type, EvmTxType::Legacy);
        assert_eq!(tx.gas_price, Some(20_000_000_000));
        assert_eq!(tx.chain_id, 56);
    }

    #[test]
    fn test_token_transfer_calls_contract() {
        let config = ChainConfig::builtin(ChainAlias::Ethereum);
        let request = TransactionRequest::TokenTransfer(TokenTransfer {
            from: FROM.to_string(),
            to: TO.to_string(),
            token: USDC.to_string(),
            amount: 2_500_000,
        });
        let tx = build(&config, &request, &state(), &EvmOverrides::default()).unwrap();
        assert_eq!(tx.value, 0);
        assert_eq!(hex::encode(tx.to.unwrap()), USDC.trim_start_matches("0x"));
        assert_eq!(
            Erc20Call::decode(&tx.data),
            Some(Erc20Call::Transfer {
                to: [0x35; 20],
                amount: 2_500_000
            })
        );
    }

    #[test]
    fn test_deploy_has_no_recipient() {
        let config = ChainConfig::builtin(ChainAlias::Ethereum);
        let request = TransactionRequest::ContractDeploy(ContractDeploy {
            from: FROM.to_string(),
            bytecode: vec![0x60, 0x80],
            value: 0,
        });
        let tx = build(&config, &request, &state(), &EvmOverrides::default()).unwrap();
        assert_eq!(tx.to, None);
        assert_eq!(tx.data, vec![0x60, 0x80]);
    }

    #[test]
    fn test_overrides_win_over_state() {
        let config = ChainConfig::builtin(ChainAlias::Ethereum);
        let request = NativeTransfer::new(FROM, TO, 5).into();
        let overrides = EvmOverrides {
            nonce: Some(10),
            tx_type: Some(EvmTxType::Legacy),
            gas_price: Some(7),
            ..Default::default()
        };
        let tx = build(&config, &request, &state(), &overrides).unwrap();
        assert_eq!(tx.nonce, 10);
        assert_eq!(tx.tx_type, EvmTxType::Legacy);
        assert_eq!(tx.gas_price, Some(7));
    }

    #[test]
    fn test_priority_fee_above_max_rejected() {
        let config = ChainConfig::builtin(ChainAlias::Ethereum);
        let request = NativeTransfer::new(FROM, TO, 5).into();
        let overrides = EvmOverrides {
            max_priority_fee_per_gas: Some(u128::MAX),
            ..Default::default()
        };
        assert!(build(&config, &request, &state(), &overrides).is_err());
    }
}
