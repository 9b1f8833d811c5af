//! Message layout (legacy and v0) and the message compiler

use super::instruction::{decode_short_vec, encode_short_vec, CompiledInstruction, Instruction};
use crate::codec::varint::{decode_short_vec_bytes, encode_short_vec_bytes};
use crate::codec::{decode_array, decode_u8, ByteDeserialize, ByteSerialize};
use crate::error::{CodecError, CodecResult};
use std::collections::HashMap;
use std::io::Cursor;

/// High bit of the first message byte marks a versioned message
const VERSION_PREFIX: u8 = 0x80;

/// Message version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageVersion {
    Legacy,
    V0,
}

/// Message header containing account metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

impl MessageHeader {
    pub fn new(
        num_required_signatures: u8,
        num_readonly_signed_accounts: u8,
        num_readonly_unsigned_accounts: u8,
    ) -> Self {
        Self {
            num_required_signatures,
            num_readonly_signed_accounts,
            num_readonly_unsigned_accounts,
        }
    }
}

impl ByteSerialize for MessageHeader {
    fn serialize_bytes(&self, writer: &mut Vec<u8>) {
        writer.extend_from_slice(&[
            self.num_required_signatures,
            self.num_readonly_signed_accounts,
            self.num_readonly_unsigned_accounts,
        ]);
    }
}

impl ByteDeserialize for MessageHeader {
    fn deserialize_bytes(cursor: &mut Cursor<&[u8]>) -> CodecResult<Self> {
        Ok(Self::new(decode_u8(cursor)?, decode_u8(cursor)?, decode_u8(cursor)?))
    }
}

/// Address lookup table reference of a v0 message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAddressTableLookup {
    pub account_key: [u8; 32],
    pub writable_indexes: Vec<u8>,
    pub readonly_indexes: Vec<u8>,
}

impl ByteSerialize for MessageAddressTableLookup {
    fn serialize_bytes(&self, writer: &mut Vec<u8>) {
        writer.extend_from_slice(&self.account_key);
        encode_short_vec_bytes(&self.writable_indexes, writer);
        encode_short_vec_bytes(&self.readonly_indexes, writer);
    }
}

impl ByteDeserialize for MessageAddressTableLookup {
    fn deserialize_bytes(cursor: &mut Cursor<&[u8]>) -> CodecResult<Self> {
        Ok(Self {
            account_key: decode_array(cursor)?,
            writable_indexes: decode_short_vec_bytes(cursor)?,
            readonly_indexes: decode_short_vec_bytes(cursor)?,
        })
    }
}

struct AccountKey([u8; 32]);

impl ByteSerialize for AccountKey {
    fn serialize_bytes(&self, writer: &mut Vec<u8>) {
        writer.extend_from_slice(&self.0);
    }
}

impl ByteDeserialize for AccountKey {
    fn deserialize_bytes(cursor: &mut Cursor<&[u8]>) -> CodecResult<Self> {
        Ok(Self(decode_array(cursor)?))
    }
}

/// Compiled message ready for signing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub version: MessageVersion,
    pub header: MessageHeader,
    pub account_keys: Vec<[u8; 32]>,
    pub recent_blockhash: [u8; 32],
    pub instructions: Vec<CompiledInstruction>,
    /// Always empty for legacy messages
    pub address_table_lookups: Vec<MessageAddressTableLookup>,
}

impl Message {
    /// First account key, the fee payer
    pub fn fee_payer(&self) -> Option<&[u8; 32]> {
        self.account_keys.first()
    }

    /// Static key at `index`; `None` for keys loaded from lookup tables
    pub fn account_key(&self, index: u8) -> Option<&[u8; 32]> {
        self.account_keys.get(index as usize)
    }

    pub fn signer_keys(&self) -> &[[u8; 32]] {
        let count = (self.header.num_required_signatures as usize).min(self.account_keys.len());
        &self.account_keys[..count]
    }

    /// Program id of an instruction
    pub fn program_id(&self, instruction: &CompiledInstruction) -> Option<&[u8; 32]> {
        self.account_key(instruction.program_id_index)
    }

    /// Header and indices agree with the key list
    pub fn validate(&self) -> CodecResult<()> {
        let keys = self.account_keys.len();
        let loaded: usize = self
            .address_table_lookups
            .iter()
            .map(|lookup| lookup.writable_indexes.len() + lookup.readonly_indexes.len())
            .sum();
        let header = &self.header;

        if header.num_required_signatures == 0 {
            return Err(CodecError::Other("message requires no signatures".to_string()));
        }
        if usize::from(header.num_required_signatures)
            + usize::from(header.num_readonly_unsigned_accounts)
            > keys
        {
            return Err(CodecError::Other(format!(
                "header describes more accounts than the {keys} present"
            )));
        }
        if header.num_readonly_signed_accounts >= header.num_required_signatures {
            return Err(CodecError::Other("fee payer must be writable".to_string()));
        }
        if self.version == MessageVersion::Legacy && !self.address_table_lookups.is_empty() {
            return Err(CodecError::Other("legacy message with lookup tables".to_string()));
        }

        for instruction in &self.instructions {
            let in_range = |index: u8| usize::from(index) < keys + loaded;
            if usize::from(instruction.program_id_index) >= keys {
                return Err(CodecError::Other(format!(
                    "program id index {} out of range",
                    instruction.program_id_index
                )));
            }
            if let Some(index) = instruction.account_indices.iter().find(|&&i| !in_range(i)) {
                return Err(CodecError::Other(format!("account index {index} out of range")));
            }
        }
        Ok(())
    }
}

impl ByteSerialize for Message {
    fn serialize_bytes(&self, writer: &mut Vec<u8>) {
        if self.version == MessageVersion::V0 {
            writer.push(VERSION_PREFIX);
        }
        self.header.serialize_bytes(writer);

        let keys: Vec<AccountKey> = self.account_keys.iter().copied().map(AccountKey).collect();
        encode_short_vec(&keys, writer);
        writer.extend_from_slice(&self.recent_blockhash);
        encode_short_vec(&self.instructions, writer);

        if self.version == MessageVersion::V0 {
            encode_short_vec(&self.address_table_lookups, writer);
        }
    }
}

impl ByteDeserialize for Message {
    fn deserialize_bytes(cursor: &mut Cursor<&[u8]>) -> CodecResult<Self> {
        let first = decode_u8(cursor)?;
        let (version, header) = if first & VERSION_PREFIX != 0 {
            let version = first & !VERSION_PREFIX;
            if version != 0 {
                return Err(CodecError::Other(format!(
                    "unsupported message version {version}"
                )));
            }
            (MessageVersion::V0, MessageHeader::deserialize_bytes(cursor)?)
        } else {
            let header = MessageHeader::new(first, decode_u8(cursor)?, decode_u8(cursor)?);
            (MessageVersion::Legacy, header)
        };

        let account_keys = decode_short_vec::<AccountKey>(cursor)?
            .into_iter()
            .map(|key| key.0)
            .collect();
        let recent_blockhash = decode_array(cursor)?;
        let instructions = decode_short_vec(cursor)?;
        let address_table_lookups = match version {
            MessageVersion::V0 => decode_short_vec(cursor)?,
            MessageVersion::Legacy => Vec::new(),
        };

        let message = Message {
            version,
            header,
            account_keys,
            recent_blockhash,
            instructions,
            address_table_lookups,
        };
        message.validate()?;
        Ok(message)
    }
}

/// Compiles instructions into a message with the fee payer at index 0
pub struct MessageCompiler {
    instructions: Vec<Instruction>,
    payer: Option<[u8; 32]>,
    recent_blockhash: Option<[u8; 32]>,
    version: MessageVersion,
}

impl MessageCompiler {
    pub fn new() -> Self {
        Self {
            instructions: Vec::new(),
            payer: None,
            recent_blockhash: None,
            version: MessageVersion::Legacy,
        }
    }

    /// Set the fee payer
    pub fn payer(mut self, payer: [u8; 32]) -> Self {
        self.payer = Some(payer);
        self
    }

    pub fn recent_blockhash(mut self, blockhash: [u8; 32]) -> Self {
        self.recent_blockhash = Some(blockhash);
        self
    }

    /// Emit a v0 message (without lookup tables)
    pub fn version(mut self, version: MessageVersion) -> Self {
        self.version = version;
        self
    }

    pub fn add_instruction(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    pub fn add_instructions(mut self, instructions: impl IntoIterator<Item = Instruction>) -> Self {
        self.instructions.extend(instructions);
        self
    }

    /// Resolve accounts and indices
    ///
    /// Accounts are ordered writable signers, readonly signers, writable
    /// non-signers, readonly non-signers; the payer comes first and keys sort
    /// byte-wise within a group.
    pub fn compile(self) -> CodecResult<Message> {
        let payer = self
            .payer
            .ok_or_else(|| CodecError::Other("payer not set".to_string()))?;
        let recent_blockhash = self
            .recent_blockhash
            .ok_or_else(|| CodecError::Other("recent blockhash not set".to_string()))?;
        if self.instructions.is_empty() {
            return Err(CodecError::Other("no instructions provided".to_string()));
        }

        let mut flags: HashMap<[u8; 32], (bool, bool)> = HashMap::new();
        flags.insert(payer, (true, true));

        for instruction in &self.instructions {
            flags.entry(instruction.program_id).or_insert((false, false));
            for account in &instruction.accounts {
                let entry = flags.entry(account.pubkey).or_insert((false, false));
                entry.0 |= account.is_signer;
                entry.1 |= account.is_writable;
            }
        }

        let mut accounts: Vec<([u8; 32], bool, bool)> = flags
            .into_iter()
            .map(|(key, (is_signer, is_writable))| (key, is_signer, is_writable))
            .collect();

        accounts.sort_by_key(|(key, is_signer, is_writable)| {
            let priority = match (*is_signer, *is_writable) {
                (true, true) => 0,
                (true, false) => 1,
                (false, true) => 2,
                (false, false) => 3,
            };
            (*key != payer, priority, *key)
        });

        if accounts.len() > usize::from(u8::MAX) + 1 {
            return Err(CodecError::Other(format!(
                "{} accounts exceed the 256 a message can index",
                accounts.len()
            )));
        }

        let index_of: HashMap<[u8; 32], u8> = accounts
            .iter()
            .enumerate()
            .map(|(i, (key, _, _))| (*key, i as u8))
            .collect();

        let signers = accounts.iter().filter(|(_, s, _)| *s).count() as u8;
        let readonly_signers = accounts.iter().filter(|(_, s, w)| *s && !*w).count() as u8;
        let readonly_unsigned = accounts.iter().filter(|(_, s, w)| !*s && !*w).count() as u8;

        let instructions = self
            .instructions
            .iter()
            .map(|instruction| {
                let lookup = |key: &[u8; 32]| {
                    index_of
                        .get(key)
                        .copied()
                        .ok_or_else(|| CodecError::Other("account not found in message".to_string()))
                };
                Ok(CompiledInstruction {
                    program_id_index: lookup(&instruction.program_id)?,
                    account_indices: instruction
                        .accounts
                        .iter()
                        .map(|account| lookup(&account.pubkey))
                        .collect::<CodecResult<Vec<_>>>()?,
                    data: instruction.data.clone(),
                })
            })
            .collect::<CodecResult<Vec<_>>>()?;

        Ok(Message {
            version: self.version,
            header: MessageHeader::new(signers, readonly_signers, readonly_unsigned),
            account_keys: accounts.into_iter().map(|(key, _, _)| key).collect(),
            recent_blockhash,
            instructions,
            address_table_lookups: Vec::new(),
        })
    }
}

impl Default for MessageCompiler {
    fn default() -> Self {
        Self::new()
    }
}
