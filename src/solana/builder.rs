use super::fees::compute_budget;
use super::instruction::{AccountMeta, Instruction, InstructionEncoder};
use super::message::MessageCompiler;
use super::programs::{
    advance_nonce, associated_token_address, create_associated_token_account, memo,
    system_transfer, transfer_checked, TOKEN_PROGRAM_ID,
};
use super::SolanaTransaction;
use crate::address::{AddressCodec, SolanaAddressCodec};
use crate::chain::ChainConfig;
use crate::codec::base58::decode_base58_array;
use crate::error::{Result, TxError};
use crate::transaction::network::SolanaState;
use crate::transaction::overrides::SolanaOverrides;
use crate::transaction::{unsupported, TransactionRequest};
use tracing::debug;

/// Build a Solana transaction from a request and a recent blockhash
pub fn build(
    config: &ChainConfig,
    request: &TransactionRequest,
    state: &SolanaState,
    overrides: &SolanaOverrides,
) -> Result<SolanaTransaction> {
    let params = config.solana()?;
    let key = |value: &str| {
        SolanaAddressCodec
            .decode(value)
            .map_err(|err| TxError::InvalidAddress {
                chain: config.alias,
                address: value.to_string(),
                reason: err.to_string(),
            })
    };
    let lamports = |amount: u128| {
        u64::try_from(amount).map_err(|_| {
            TxError::invalid_transaction(config.alias, format!("amount {amount} exceeds u64"))
        })
    };

    let payer = key(request.sender())?;
    let mut instructions: Vec<Instruction> = Vec::new();
    let mut recent_blockhash = state.recent_blockhash;

    if let Some(nonce) = &overrides.durable_nonce {
        recent_blockhash = decode_base58_array(&nonce.nonce_value).map_err(|err| {
            TxError::invalid_transaction(config.alias, format!("nonce value: {err}"))
        })?;
        instructions.push(advance_nonce(key(&nonce.nonce_account)?, key(&nonce.authority)?));
    }
    if let Some(units) = overrides.compute_unit_limit {
        instructions.push(compute_budget::set_compute_unit_limit(units));
    }
    if let Some(price) = overrides.compute_unit_price {
        instructions.push(compute_budget::set_compute_unit_price(price));
    }

    match request {
        TransactionRequest::NativeTransfer(transfer) => {
            instructions.push(system_transfer(
                payer,
                key(&transfer.to)?,
                lamports(transfer.amount)?,
            )?);
            if let Some(text) = &transfer.memo {
                instructions.push(memo(payer, text));
            }
        }
        TransactionRequest::TokenTransfer(transfer) => {
            let decimals = state.token_decimals.ok_or_else(|| {
                TxError::invalid_transaction(config.alias, "mint decimals are unknown")
            })?;
            let mint = key(&transfer.token)?;
            let recipient = key(&transfer.to)?;
            let token_program = state.token_program.unwrap_or(TOKEN_PROGRAM_ID);

            if !state.destination_token_account_exists {
                instructions.push(create_associated_token_account(
                    payer,
                    recipient,
                    mint,
                    token_program,
                ));
            }
            instructions.push(transfer_checked(
                token_program,
                associated_token_address(&payer, &mint, &token_program),
                mint,
                associated_token_address(&recipient, &mint, &token_program),
                payer,
                lamports(transfer.amount)?,
                decimals,
            )?);
        }
        TransactionRequest::ContractCall(call) => {
            if call.value != 0 {
                return Err(TxError::invalid_transaction(
                    config.alias,
                    "program calls cannot attach lamports; add a transfer instead",
                ));
            }
            let mut encoder = InstructionEncoder::new(key(&call.contract)?).data(call.data.clone());
            for account in &call.accounts {
                encoder = encoder.account(AccountMeta::new(
                    key(&account.address)?,
                    account.is_signer,
                    account.is_writable,
                ));
            }
            instructions.push(encoder.build());
        }
        TransactionRequest::ContractDeploy(_) => return Err(unsupported(config, request)),
    }

    let message = MessageCompiler::new()
        .payer(payer)
        .recent_blockhash(recent_blockhash)
        .add_instructions(instructions)
        .compile()
        .map_err(|err| TxError::invalid_transaction(config.alias, err.to_string()))?;

    let tx = SolanaTransaction::new_unsigned(message);
    let size = tx.wire_size();
    if size > params.max_transaction_size {
        return Err(TxError::invalid_transaction(
            config.alias,
            format!(
                "transaction is {size} bytes, limit is {}",
                params.max_transaction_size
            ),
        ));
    }

    debug!(
        chain = %config.alias,
        instructions = tx.message.instructions.len(),
        signers = tx.message.header.num_required_signatures,
        size,
        "built Solana transaction"
    );
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainAlias;
    use crate::solana::programs::{
        is_advance_nonce, parse_transfer_checked, ASSOCIATED_TOKEN_PROGRAM_ID,
        COMPUTE_BUDGET_PROGRAM_ID, MEMO_PROGRAM_ID,
    };
    use crate::transaction::overrides::DurableNonce;
    use crate::transaction::{ContractDeploy, NativeTransfer, TokenTransfer};
    use solana_sdk::pubkey::Pubkey;

    fn state() -> SolanaState {
        SolanaState {
            recent_blockhash: [7u8; 32],
            token_decimals: Some(6),
            token_program: None,
            destination_token_account_exists: false,
        }
    }

    fn address() -> String {
        Pubkey::new_unique().to_string()
    }

    #[test]
    fn test_native_transfer_with_memo_and_priority_fee() {
        let config = ChainConfig::builtin(ChainAlias::Solana);
        let request = NativeTransfer::new(address(), address(), 1_000_000)
            .with_memo("invoice 42")
            .into();
        let overrides = SolanaOverrides {
            compute_unit_price: Some(5_000),
            compute_unit_limit: Some(1_000),
            ..Default::default()
        };
        let tx = build(&config, &request, &state(), &overrides).unwrap();
        let message = &tx.message;

        let programs: Vec<_> = message
            .instructions
            .iter()
            .map(|ix| *message.program_id(ix).unwrap())
            .collect();
        assert_eq!(programs[0], COMPUTE_BUDGET_PROGRAM_ID);
        assert_eq!(programs[1], COMPUTE_BUDGET_PROGRAM_ID);
        assert_eq!(programs[3], MEMO_PROGRAM_ID);
        assert_eq!(message.instructions[3].data, b"invoice 42");
        assert_eq!(message.header.num_required_signatures, 1);
        assert_eq!(message.recent_blockhash, [7u8; 32]);
    }

    #[test]
    fn test_token_transfer_creates_destination_account() {
        let config = ChainConfig::builtin(ChainAlias::Solana);
        let request = TokenTransfer {
            from: address(),
            to: address(),
            token: address(),
            amount: 2_500_000,
        }
        .into();
        let tx = build(&config, &request, &state(), &SolanaOverrides::default()).unwrap();
        let message = &tx.message;
        assert_eq!(message.instructions.len(), 2);
        assert_eq!(
            message.program_id(&message.instructions[0]),
            Some(&ASSOCIATED_TOKEN_PROGRAM_ID)
        );
        let transfer = parse_transfer_checked(&message.instructions[1].data).unwrap();
        assert_eq!(transfer.amount, 2_500_000);
        assert_eq!(transfer.decimals, 6);

        let existing = SolanaState {
            destination_token_account_exists: true,
            ..state()
        };
        let tx = build(&config, &request, &existing, &SolanaOverrides::default()).unwrap();
        assert_eq!(tx.message.instructions.len(), 1);
    }

    #[test]
    fn test_token_transfer_needs_decimals() {
        let config = ChainConfig::builtin(ChainAlias::Solana);
        let request = TokenTransfer {
            from: address(),
            to: address(),
            token: address(),
            amount: 1,
        }
        .into();
        let unknown = SolanaState {
            token_decimals: None,
            ..state()
        };
        assert!(build(&config, &request, &unknown, &SolanaOverrides::default()).is_err());
    }

    #[test]
    fn test_durable_nonce_replaces_blockhash() {
        let config = ChainConfig::builtin(ChainAlias::Solana);
        let payer = address();
        let nonce_value = [9u8; 32];
        let overrides = SolanaOverrides {
            durable_nonce: Some(DurableNonce {
                nonce_account: address(),
                authority: payer.clone(),
                nonce_value: bs58::encode(nonce_value).into_string(),
            }),
            ..Default::default()
        };
        let request = NativeTransfer::new(payer, address(), 5).into();
        let tx = build(&config, &request, &state(), &overrides).unwrap();
        assert_eq!(tx.message.recent_blockhash, nonce_value);
        assert!(is_advance_nonce(&tx.message.instructions[0].data));
        assert_eq!(tx.message.header.num_required_signatures, 1);
    }

    #[test]
    fn test_separate_nonce_authority_adds_signer() {
        let config = ChainConfig::builtin(ChainAlias::Solana);
        let overrides = SolanaOverrides {
            durable_nonce: Some(DurableNonce {
                nonce_account: address(),
                authority: address(),
                nonce_value: bs58::encode([1u8; 32]).into_string(),
            }),
            ..Default::default()
        };
        let request = NativeTransfer::new(address(), address(), 5).into();
        let tx = build(&config, &request, &state(), &overrides).unwrap();
        assert_eq!(tx.message.header.num_required_signatures, 2);
    }

    #[test]
    fn test_deploy_unsupported() {
        let config = ChainConfig::builtin(ChainAlias::Solana);
        let request = ContractDeploy {
            from: address(),
            bytecode: vec![1, 2, 3],
            value: 0,
        }
        .into();
        let err = build(&config, &request, &state(), &SolanaOverrides::default()).unwrap_err();
        assert!(matches!(err, TxError::UnsupportedOperation { .. }));
    }

    #[test]
    fn test_oversized_transaction_rejected() {
        let config = ChainConfig::builtin(ChainAlias::Solana);
        let request = NativeTransfer::new(address(), address(), 5)
            .with_memo("x".repeat(2_000))
            .into();
        let err = build(&config, &request, &state(), &SolanaOverrides::default()).unwrap_err();
        assert!(matches!(err, TxError::InvalidTransaction { .. }));
    }
}
