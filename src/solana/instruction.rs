//! Instruction construction and the compiled instruction wire form

use crate::codec::varint::{decode_compact_u16, decode_short_vec_bytes, encode_compact_u16, encode_short_vec_bytes};
use crate::codec::{decode_u8, ByteDeserialize, ByteSerialize};
use crate::error::CodecResult;
use std::io::Cursor;

/// Account metadata for an instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: [u8; 32],
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn new(pubkey: [u8; 32], is_signer: bool, is_writable: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable,
        }
    }

    pub fn new_readonly(pubkey: [u8; 32], is_signer: bool) -> Self {
        Self::new(pubkey, is_signer, false)
    }

}

/// An instruction before account keys are resolved to indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub program_id: [u8; 32],
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

impl Instruction {
    pub fn new(program_id: [u8; 32], accounts: Vec<AccountMeta>, data: Vec<u8>) -> Self {
        Self {
            program_id,
            accounts,
            data,
        }
    }
}

/// Builder for instructions with hand-assembled data
pub struct InstructionEncoder {
    program_id: [u8; 32],
    accounts: Vec<AccountMeta>,
    data: Vec<u8>,
}

impl InstructionEncoder {
    pub fn new(program_id: [u8; 32]) -> Self {
        Self {
            program_id,
            accounts: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn account(mut self, meta: AccountMeta) -> Self {
        self.accounts.push(meta);
        self
    }

    pub fn signer(mut self, pubkey: [u8; 32], is_writable: bool) -> Self {
        self.accounts.push(AccountMeta::new(pubkey, true, is_writable));
        self
    }

    pub fn writable(mut self, pubkey: [u8; 32], is_signer: bool) -> Self {
        self.accounts.push(AccountMeta::new(pubkey, is_signer, true));
        self
    }

    pub fn readonly(mut self, pubkey: [u8; 32]) -> Self {
        self.accounts.push(AccountMeta::new_readonly(pubkey, false));
        self
    }

    pub fn data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    pub fn append_data(mut self, data: &[u8]) -> Self {
        self.data.extend_from_slice(data);
        self
    }

    pub fn append_u8(mut self, value: u8) -> Self {
        self.data.push(value);
        self
    }

    /// Little-endian
    pub fn append_u32(mut self, value: u32) -> Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Little-endian
    pub fn append_u64(mut self, value: u64) -> Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn build(self) -> Instruction {
        Instruction::new(self.program_id, self.accounts, self.data)
    }
}

/// Compiled instruction with resolved account indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub account_indices: Vec<u8>,
    pub data: Vec<u8>,
}

impl CompiledInstruction {
    /// First 8 bytes of data (Anchor discriminator)
    pub fn discriminator(&self) -> Option<[u8; 8]> {
        self.data.get(..8).and_then(|prefix| prefix.try_into().ok())
    }
}

impl ByteSerialize for CompiledInstruction {
    fn serialize_bytes(&self, writer: &mut Vec<u8>) {
        writer.push(self.program_id_index);
        encode_short_vec_bytes(&self.account_indices, writer);
        encode_short_vec_bytes(&self.data, writer);
    }
}

impl ByteDeserialize for CompiledInstruction {
    fn deserialize_bytes(cursor: &mut Cursor<&[u8]>) -> CodecResult<Self> {
        let program_id_index = decode_u8(cursor)?;
        let account_indices = decode_short_vec_bytes(cursor)?;
        let data = decode_short_vec_bytes(cursor)?;
        Ok(Self {
            program_id_index,
            account_indices,
            data,
        })
    }
}

/// Encode a short-vec of serializable items
pub(crate) fn encode_short_vec<T: ByteSerialize>(items: &[T], writer: &mut Vec<u8>) {
    encode_compact_u16(items.len() as u16, writer);
    for item in items {
        item.serialize_bytes(writer);
    }
}

/// Decode a short-vec of deserializable items
pub(crate) fn decode_short_vec<T: ByteDeserialize>(cursor: &mut Cursor<&[u8]>) -> CodecResult<Vec<T>> {
    let len = decode_compact_u16(cursor)? as usize;
    let mut items = Vec::with_capacity(len.min(256));
    for _ in 0..len {
        items.push(T::deserialize_bytes(cursor)?);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_encoder_builder() {
        let program_id = [1u8; 32];
        let account = [2u8; 32];

        let instruction = InstructionEncoder::new(program_id)
            .signer(account, true)
            .append_u8(42)
            .append_u64(1000)
            .build();

        assert_eq!(instruction.program_id, program_id);
        assert_eq!(instruction.accounts, vec![AccountMeta::new(account, true, true)]);
        assert_eq!(instruction.data.len(), 9);
    }

    #[test]
    fn test_compiled_instruction_bytes() {
        let compiled = CompiledInstruction {
            program_id_index: 2,
            account_indices: vec![0, 1],
            data: vec![2, 0, 0, 0, 0xe8, 0x03, 0, 0, 0, 0, 0, 0],
        };
        let bytes = compiled.to_bytes();
        assert_eq!(&bytes[..4], &[2, 2, 0, 1]);
        assert_eq!(bytes[4], 12);

        let mut cursor = Cursor::new(&bytes[..]);
        assert_eq!(CompiledInstruction::deserialize_bytes(&mut cursor).unwrap(), compiled);
    }

    #[test]
    fn test_truncated_data_rejected() {
        // declares 5 data bytes, carries 2
        let bytes = [0u8, 0, 5, 1, 2];
        let mut cursor = Cursor::new(&bytes[..]);
        assert!(CompiledInstruction::deserialize_bytes(&mut cursor).is_err());
    }

    #[test]
    fn test_discriminator() {
        let compiled = CompiledInstruction {
            program_id_index: 0,
            account_indices: vec![],
            data: (0u8..10).collect(),
        };
        assert_eq!(compiled.discriminator(), Some([0, 1, 2, 3, 4, 5, 6, 7]));
    }
}
