//! Bitcoin transaction serialization (BIP-144)

use crate::codec::varint::{read_var_bytes, read_var_int, var_int_len, write_var_bytes, write_var_int};
use crate::codec::{decode_array, decode_u32_le, decode_u64_le, decode_u8, ByteDeserialize, ByteSerialize};
use crate::error::{CodecError, CodecResult};
use crate::hash::double_sha256;
use std::io::Cursor;

const SEGWIT_MARKER: u8 = 0x00;
const SEGWIT_FLAG: u8 = 0x01;

/// Reference to an output of a previous transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutPoint {
    /// Internal byte order (reversed display hex)
    pub txid: [u8; 32],
    pub vout: u32,
}

impl OutPoint {
    /// Parse a display-order txid
    pub fn from_display(txid: &str, vout: u32) -> CodecResult<Self> {
        let mut bytes = crate::codec::decode_hex_array::<32>(txid)?;
        bytes.reverse();
        Ok(Self { txid: bytes, vout })
    }

    pub fn display_txid(&self) -> String {
        let mut bytes = self.txid;
        bytes.reverse();
        hex::encode(bytes)
    }
}

impl ByteSerialize for OutPoint {
    fn serialize_bytes(&self, writer: &mut Vec<u8>) {
        writer.extend_from_slice(&self.txid);
        writer.extend_from_slice(&self.vout.to_le_bytes());
    }
}

impl ByteDeserialize for OutPoint {
    fn deserialize_bytes(cursor: &mut Cursor<&[u8]>) -> CodecResult<Self> {
        Ok(Self {
            txid: decode_array(cursor)?,
            vout: decode_u32_le(cursor)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    pub previous_output: OutPoint,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
    /// Witness stack, empty for legacy inputs
    pub witness: Vec<Vec<u8>>,
}

impl TxIn {
    pub fn new(previous_output: OutPoint, sequence: u32) -> Self {
        Self {
            previous_output,
            script_sig: Vec::new(),
            sequence,
            witness: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    pub value: u64,
    pub script_pubkey: Vec<u8>,
}

impl TxOut {
    pub fn serialized_len(&self) -> usize {
        8 + var_int_len(self.script_pubkey.len() as u64) + self.script_pubkey.len()
    }
}

impl ByteSerialize for TxOut {
    fn serialize_bytes(&self, writer: &mut Vec<u8>) {
        writer.extend_from_slice(&self.value.to_le_bytes());
        write_var_bytes(&self.script_pubkey, writer);
    }
}

impl ByteDeserialize for TxOut {
    fn deserialize_bytes(cursor: &mut Cursor<&[u8]>) -> CodecResult<Self> {
        Ok(Self {
            value: decode_u64_le(cursor)?,
            script_pubkey: read_var_bytes(cursor)?,
        })
    }
}

/// Witness stack: item count followed by length-prefixed items
pub fn write_witness(stack: &[Vec<u8>], writer: &mut Vec<u8>) {
    write_var_int(stack.len() as u64, writer);
    for item in stack {
        write_var_bytes(item, writer);
    }
}

pub fn read_witness(cursor: &mut Cursor<&[u8]>) -> CodecResult<Vec<Vec<u8>>> {
    let count = read_var_int(cursor)?;
    let mut stack = Vec::with_capacity((count as usize).min(16));
    for _ in 0..count {
        stack.push(read_var_bytes(cursor)?);
    }
    Ok(stack)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|input| !input.witness.is_empty())
    }

    /// Serialization with or without the segwit marker and witnesses
    pub fn encode(&self, include_witness: bool) -> Vec<u8> {
        let witness = include_witness && self.has_witness();
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());
        if witness {
            out.extend_from_slice(&[SEGWIT_MARKER, SEGWIT_FLAG]);
        }

        write_var_int(self.inputs.len() as u64, &mut out);
        for input in &self.inputs {
            input.previous_output.serialize_bytes(&mut out);
            write_var_bytes(&input.script_sig, &mut out);
            out.extend_from_slice(&input.sequence.to_le_bytes());
        }

        write_var_int(self.outputs.len() as u64, &mut out);
        for output in &self.outputs {
            output.serialize_bytes(&mut out);
        }

        if witness {
            for input in &self.inputs {
                write_witness(&input.witness, &mut out);
            }
        }
        out.extend_from_slice(&self.lock_time.to_le_bytes());
        out
    }

    /// Reversed double-SHA256 of the non-witness serialization, display hex
    pub fn txid(&self) -> String {
        let mut hash = double_sha256(&self.encode(false));
        hash.reverse();
        hex::encode(hash)
    }

    pub fn weight(&self) -> usize {
        let base = self.encode(false).len();
        let total = self.encode(true).len();
        base * 3 + total
    }

    pub fn vsize(&self) -> usize {
        self.weight().div_ceil(4)
    }

    /// Copy with every scriptSig and witness removed
    pub fn stripped(&self) -> Self {
        Self {
            inputs: self
                .inputs
                .iter()
                .map(|input| TxIn::new(input.previous_output, input.sequence))
                .collect(),
            ..self.clone()
        }
    }

    /// Parse one transaction from the cursor
    pub fn decode_from(cursor: &mut Cursor<&[u8]>) -> CodecResult<Self> {
        let version = i32::from_le_bytes(decode_array(cursor)?);

        let mut input_count = read_var_int(cursor)?;
        let mut segwit = false;
        if input_count == 0 {
            let flag = decode_u8(cursor)?;
            if flag != SEGWIT_FLAG {
                return Err(CodecError::Other(format!("unknown segwit flag {flag:#04x}")));
            }
            segwit = true;
            input_count = read_var_int(cursor)?;
        }
        if input_count == 0 {
            return Err(CodecError::Other("transaction has no inputs".to_string()));
        }

        let mut inputs = Vec::with_capacity((input_count as usize).min(256));
        for _ in 0..input_count {
            let previous_output = OutPoint::deserialize_bytes(cursor)?;
            let script_sig = read_var_bytes(cursor)?;
            let sequence = decode_u32_le(cursor)?;
            inputs.push(TxIn {
                previous_output,
                script_sig,
                sequence,
                witness: Vec::new(),
            });
        }

        let output_count = read_var_int(cursor)?;
        let mut outputs = Vec::with_capacity((output_count as usize).min(256));
        for _ in 0..output_count {
            outputs.push(TxOut::deserialize_bytes(cursor)?);
        }

        if segwit {
            for input in &mut inputs {
                input.witness = read_witness(cursor)?;
            }
            if inputs.iter().all(|input| input.witness.is_empty()) {
                return Err(CodecError::Other("segwit flag set without witnesses".to_string()));
            }
        }

        Ok(Self {
            version,
            inputs,
            outputs,
            lock_time: decode_u32_le(cursor)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ensure_consumed;

    /// Unsigned transaction from the BIP-143 native P2WPKH example
    const BIP143_UNSIGNED: &str = concat!(
        "0100000002fff7f7881a8099afa6940d42d1e7f6362bec38171ea3edf433541db4e4ad969f00000000",
        "00eeffffffef51e1b804cc89d182d279655c3aa89e815b1b309fe287d9b2b55d57b90ec68a01000000",
        "00ffffffff02202cb206000000001976a9148280b37df378db99f66f85c95a783a76ac7a6d5988ac90",
        "93510d000000001976a9143bde42dbee7e4dbe6a21b2d50ce2f0167faa815988ac11000000"
    );

    fn decode(hex_tx: &str) -> Transaction {
        let bytes = hex::decode(hex_tx).unwrap();
        let mut cursor = Cursor::new(&bytes[..]);
        let tx = Transaction::decode_from(&mut cursor).unwrap();
        ensure_consumed(&cursor).unwrap();
        tx
    }

    #[test]
    fn test_legacy_round_trip() {
        let tx = decode(BIP143_UNSIGNED);
        assert_eq!(tx.version, 1);
        assert_eq!(tx.inputs.len(), 2);
        assert_eq!(tx.inputs[0].sequence, 0xffffffee);
        assert_eq!(tx.outputs[0].value, 112_340_000);
        assert_eq!(tx.lock_time, 17);
        assert_eq!(hex::encode(tx.encode(true)), BIP143_UNSIGNED);
    }

    #[test]
    fn test_witness_round_trip_keeps_txid() {
        let mut tx = decode(BIP143_UNSIGNED);
        let txid = tx.txid();
        tx.inputs[1].witness = vec![vec![0x30; 71], vec![0x02; 33]];

        let wire = tx.encode(true);
        assert_eq!(&wire[4..6], &[0x00, 0x01]);
        let decoded = Transaction::decode_from(&mut Cursor::new(&wire[..])).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.txid(), txid);
        assert!(decoded.vsize() < wire.len());
    }

    #[test]
    fn test_outpoint_display_order() {
        let outpoint = OutPoint::from_display(
            "9f96ade4b41d5433f4eda31e1738ec2b36f6e7d1420d94a6af99801a88f7f7ff",
            0,
        )
        .unwrap();
        assert_eq!(outpoint, decode(BIP143_UNSIGNED).inputs[0].previous_output);
    }

    #[test]
    fn test_truncated_rejected() {
        let bytes = hex::decode(&BIP143_UNSIGNED[..40]).unwrap();
        assert!(Transaction::decode_from(&mut Cursor::new(&bytes[..])).is_err());
        assert!(Transaction::decode_from(&mut Cursor::new(&[0xffu8, 0x00, 0x13][..])).is_err());
    }
}
