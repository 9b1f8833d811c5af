//! Well-known program ids and the instructions the builder emits

use super::instruction::{AccountMeta, Instruction, InstructionEncoder};
use crate::error::{CodecError, CodecResult};
use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::pubkey::Pubkey;

pub const SYSTEM_PROGRAM_ID: [u8; 32] = [0u8; 32];

/// TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA
pub const TOKEN_PROGRAM_ID: [u8; 32] = [
    0x06, 0xdd, 0xf6, 0xe1, 0xd7, 0x65, 0xa1, 0x93, 0xd9, 0xcb, 0xe1, 0x46, 0xce, 0xeb, 0x79, 0xac,
    0x1c, 0xb4, 0x85, 0xed, 0x5f, 0x5b, 0x37, 0x91, 0x3a, 0x8c, 0xf5, 0x85, 0x7e, 0xff, 0x00, 0xa9,
];

/// TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb
pub const TOKEN_2022_PROGRAM_ID: [u8; 32] = [
    0x06, 0xdd, 0xf6, 0xe1, 0xee, 0x75, 0x8f, 0xde, 0x18, 0x42, 0x5d, 0xbc, 0xe4, 0x6c, 0xcd, 0xda,
    0xb6, 0x1a, 0xfc, 0x4d, 0x83, 0xb9, 0x0d, 0x27, 0xfe, 0xbd, 0xf9, 0x28, 0xd8, 0xa1, 0x8b, 0xfc,
];

/// ATokenGPvbdGVxr1b2hvZbsiqW7xWH25efTNsLJA8knL
pub const ASSOCIATED_TOKEN_PROGRAM_ID: [u8; 32] = [
    0x8c, 0x97, 0x25, 0x8f, 0x4e, 0x24, 0x89, 0xf1, 0xbb, 0x3d, 0x10, 0x29, 0x14, 0x8e, 0x0d, 0x83,
    0x0b, 0x5a, 0x13, 0xb1, 0xde, 0x0a, 0x22, 0x09, 0x72, 0x27, 0x09, 0x76, 0xed, 0x5d, 0xf8, 0x59,
];

/// ComputeBudget111111111111111111111111111111
pub const COMPUTE_BUDGET_PROGRAM_ID: [u8; 32] = [
    0x03, 0x06, 0x46, 0x6f, 0xe5, 0x21, 0x17, 0x32, 0xff, 0xec, 0xad, 0xba, 0x72, 0xc3, 0x9b, 0xe7,
    0xbc, 0x8c, 0xe5, 0xbb, 0xc5, 0xf7, 0x12, 0x6b, 0x2c, 0x43, 0x9b, 0x3a, 0x40, 0x00, 0x00, 0x00,
];

/// MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr
pub const MEMO_PROGRAM_ID: [u8; 32] = [
    0x05, 0x4a, 0x53, 0x5a, 0x99, 0x29, 0x21, 0x06, 0x4d, 0x24, 0xe8, 0x71, 0x60, 0xda, 0x38, 0x7c,
    0x7c, 0x35, 0xb5, 0xdd, 0xbc, 0x92, 0xbb, 0x81, 0xe4, 0x1f, 0xa8, 0x40, 0x41, 0x05, 0x44, 0x8d,
];

/// SysvarRecentB1ockHashes11111111111111111111
pub const RECENT_BLOCKHASHES_SYSVAR_ID: [u8; 32] = [
    0x06, 0xa7, 0xd5, 0x17, 0x19, 0x2c, 0x56, 0x8e, 0xe0, 0x8a, 0x84, 0x5f, 0x73, 0xd2, 0x97, 0x88,
    0xcf, 0x03, 0x5c, 0x31, 0x45, 0xb2, 0x1a, 0xb3, 0x44, 0xd8, 0x06, 0x2e, 0xa9, 0x40, 0x00, 0x00,
];

const SYSTEM_TRANSFER: u32 = 2;
const SYSTEM_ADVANCE_NONCE: u32 = 4;
const TOKEN_TRANSFER_CHECKED: u8 = 12;
const ATA_CREATE_IDEMPOTENT: u8 = 1;

/// Data of `SystemInstruction::Transfer`
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SystemTransferData {
    pub tag: u32,
    pub lamports: u64,
}

/// Data of `TokenInstruction::TransferChecked`
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TransferCheckedData {
    pub tag: u8,
    pub amount: u64,
    pub decimals: u8,
}

pub fn is_token_program(program_id: &[u8; 32]) -> bool {
    *program_id == TOKEN_PROGRAM_ID || *program_id == TOKEN_2022_PROGRAM_ID
}

/// Borsh bytes of an instruction's data
fn instruction_data<T: BorshSerialize>(data: &T) -> CodecResult<Vec<u8>> {
    borsh::to_vec(data).map_err(|err| CodecError::Other(format!("borsh instruction data: {err}")))
}

/// `SystemProgram::Transfer`: from (signer, writable), to (writable)
pub fn system_transfer(from: [u8; 32], to: [u8; 32], lamports: u64) -> CodecResult<Instruction> {
    let data = SystemTransferData {
        tag: SYSTEM_TRANSFER,
        lamports,
    };
    Ok(InstructionEncoder::new(SYSTEM_PROGRAM_ID)
        .signer(from, true)
        .writable(to, false)
        .data(instruction_data(&data)?)
        .build())
}

/// `SystemProgram::AdvanceNonceAccount`, must be the first instruction
pub fn advance_nonce(nonce_account: [u8; 32], authority: [u8; 32]) -> Instruction {
    InstructionEncoder::new(SYSTEM_PROGRAM_ID)
        .writable(nonce_account, false)
        .readonly(RECENT_BLOCKHASHES_SYSVAR_ID)
        .account(AccountMeta::new_readonly(authority, true))
        .append_u32(SYSTEM_ADVANCE_NONCE)
        .build()
}

/// SPL `TransferChecked`: source, mint, destination, owner
pub fn transfer_checked(
    token_program: [u8; 32],
    source: [u8; 32],
    mint: [u8; 32],
    destination: [u8; 32],
    owner: [u8; 32],
    amount: u64,
    decimals: u8,
) -> CodecResult<Instruction> {
    let data = TransferCheckedData {
        tag: TOKEN_TRANSFER_CHECKED,
        amount,
        decimals,
    };
    Ok(InstructionEncoder::new(token_program)
        .writable(source, false)
        .readonly(mint)
        .writable(destination, false)
        .account(AccountMeta::new_readonly(owner, true))
        .data(instruction_data(&data)?)
        .build())
}

/// Associated token account of `wallet` for `mint`
pub fn associated_token_address(
    wallet: &[u8; 32],
    mint: &[u8; 32],
    token_program: &[u8; 32],
) -> [u8; 32] {
    let (address, _bump) = Pubkey::find_program_address(
        &[wallet.as_ref(), token_program.as_ref(), mint.as_ref()],
        &Pubkey::new_from_array(ASSOCIATED_TOKEN_PROGRAM_ID),
    );
    address.to_bytes()
}

/// `CreateIdempotent` of the associated token program, paid by `payer`
pub fn create_associated_token_account(
    payer: [u8; 32],
    wallet: [u8; 32],
    mint: [u8; 32],
    token_program: [u8; 32],
) -> Instruction {
    let account = associated_token_address(&wallet, &mint, &token_program);
    InstructionEncoder::new(ASSOCIATED_TOKEN_PROGRAM_ID)
        .signer(payer, true)
        .writable(account, false)
        .readonly(wallet)
        .readonly(mint)
        .readonly(SYSTEM_PROGRAM_ID)
        .readonly(token_program)
        .append_u8(ATA_CREATE_IDEMPOTENT)
        .build()
}

/// Memo program instruction signed by `signer`
pub fn memo(signer: [u8; 32], text: &str) -> Instruction {
    InstructionEncoder::new(MEMO_PROGRAM_ID)
        .account(AccountMeta::new_readonly(signer, true))
        .append_data(text.as_bytes())
        .build()
}

/// Recognise `SystemProgram::Transfer` data
pub fn parse_system_transfer(data: &[u8]) -> Option<u64> {
    let parsed = SystemTransferData::try_from_slice(data).ok()?;
    (parsed.tag == SYSTEM_TRANSFER).then_some(parsed.lamports)
}

pub fn is_advance_nonce(data: &[u8]) -> bool {
    data == SYSTEM_ADVANCE_NONCE.to_le_bytes()
}

/// Recognise `TransferChecked` data
pub fn parse_transfer_checked(data: &[u8]) -> Option<TransferCheckedData> {
    let parsed = TransferCheckedData::try_from_slice(data).ok()?;
    (parsed.tag == TOKEN_TRANSFER_CHECKED).then_some(parsed)
}
