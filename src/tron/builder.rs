use super::raw::{TronContract, TronRaw};
use super::TronTransaction;
use crate::address::tron::to_raw;
use crate::address::{AddressCodec, TronAddressCodec};
use crate::chain::ChainConfig;
use crate::error::{Result, TxError};
use crate::evm::abi::Erc20Call;
use crate::transaction::network::TronState;
use crate::transaction::overrides::TronOverrides;
use crate::transaction::{unsupported, TransactionRequest};
use tracing::debug;

/// Reference block fields taken from the latest block
pub fn reference_block(state: &TronState) -> ([u8; 2], [u8; 8]) {
    let number = state.block_number.to_be_bytes();
    let mut ref_block_bytes = [0u8; 2];
    ref_block_bytes.copy_from_slice(&number[6..8]);
    let mut ref_block_hash = [0u8; 8];
    ref_block_hash.copy_from_slice(&state.block_hash[8..16]);
    (ref_block_bytes, ref_block_hash)
}

/// Build a TRX transfer, TRC-20 transfer or contract call
pub fn build(
    config: &ChainConfig,
    request: &TransactionRequest,
    state: &TronState,
    overrides: &TronOverrides,
) -> Result<TronTransaction> {
    let params = config.tron()?;
    let account = |value: &str| {
        TronAddressCodec
            .decode(value)
            .map(|account| to_raw(&account))
            .map_err(|err| TxError::InvalidAddress {
                chain: config.alias,
                address: value.to_string(),
                reason: err.to_string(),
            })
    };
    let sun = |amount: u128| {
        i64::try_from(amount).map_err(|_| {
            TxError::invalid_transaction(config.alias, format!("amount {amount} exceeds int64"))
        })
    };
    let fee_limit = overrides.fee_limit.unwrap_or(params.default_fee_limit);

    let mut memo = Vec::new();
    let (contract, fee_limit) = match request {
        TransactionRequest::NativeTransfer(transfer) => {
            if let Some(text) = &transfer.memo {
                memo = text.as_bytes().to_vec();
            }
            (
                TronContract::Transfer {
                    owner: account(&transfer.from)?,
                    to: account(&transfer.to)?,
                    amount: sun(transfer.amount)?,
                },
                0,
            )
        }
        TransactionRequest::TokenTransfer(transfer) => {
            let recipient = TronAddressCodec.decode(&transfer.to).map_err(|err| {
                TxError::InvalidAddress {
                    chain: config.alias,
                    address: transfer.to.clone(),
                    reason: err.to_string(),
                }
            })?;
            let data = Erc20Call::Transfer {
                to: recipient,
                amount: transfer.amount,
            }
            .encode();
            (
                TronContract::TriggerSmartContract {
                    owner: account(&transfer.from)?,
                    contract: account(&transfer.token)?,
                    call_value: 0,
                    data,
                },
                fee_limit,
            )
        }
        TransactionRequest::ContractCall(call) => (
            TronContract::TriggerSmartContract {
                owner: account(&call.from)?,
                contract: account(&call.contract)?,
                call_value: sun(call.value)?,
                data: call.data.clone(),
            },
            fee_limit,
        ),
        TransactionRequest::ContractDeploy(_) => return Err(unsupported(config, request)),
    };

    let expiration = state
        .block_timestamp
        .checked_add(params.expiration_ms)
        .ok_or_else(|| {
            TxError::invalid_transaction(
                config.alias,
                format!("block timestamp {} overflows the expiration", state.block_timestamp),
            )
        })?;
    let (ref_block_bytes, ref_block_hash) = reference_block(state);
    let raw = TronRaw {
        ref_block_bytes,
        ref_block_hash,
        expiration,
        data: memo,
        contract,
        permission_id: overrides.permission_id.unwrap_or(0),
        timestamp: state.block_timestamp,
        fee_limit,
    };

    let tx = TronTransaction::new(raw);
    debug!(
        chain = %config.alias,
        tx_id = %tx.tx_id(),
        fee_limit,
        "built Tron transaction"
    );
    Ok(tx)
}
