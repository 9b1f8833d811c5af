//! BIP-174 partially signed transactions
//!
//! Only the fields this crate produces are interpreted; other keys are
//! skipped on decode and never written.

use super::tx::{read_witness, write_witness, Transaction, TxOut};
use crate::codec::varint::{read_var_bytes, write_var_bytes};
use crate::codec::{decode_array, decode_u32_le, ensure_consumed, ByteDeserialize, ByteSerialize};
use crate::error::{CodecError, CodecResult};
use std::io::Cursor;

pub const MAGIC: &[u8; 5] = b"psbt\xff";

const GLOBAL_UNSIGNED_TX: u8 = 0x00;
const IN_WITNESS_UTXO: u8 = 0x01;
const IN_SIGHASH_TYPE: u8 = 0x03;
const IN_REDEEM_SCRIPT: u8 = 0x04;
const IN_BIP32_DERIVATION: u8 = 0x06;
const IN_FINAL_SCRIPTSIG: u8 = 0x07;
const IN_FINAL_SCRIPTWITNESS: u8 = 0x08;

/// Per-input signing data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PsbtInput {
    /// Output being spent; `None` when decoded from a network transaction
    pub witness_utxo: Option<TxOut>,
    pub redeem_script: Option<Vec<u8>>,
    /// Compressed key that signs this input (ECDSA inputs)
    pub public_key: Option<Vec<u8>>,
    pub sighash_type: Option<u32>,
    pub final_script_sig: Option<Vec<u8>>,
    pub final_script_witness: Option<Vec<Vec<u8>>>,
}

impl PsbtInput {
    pub fn is_finalized(&self) -> bool {
        self.final_script_sig.is_some() || self.final_script_witness.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Psbt {
    /// Transaction with empty scriptSigs and witnesses
    pub unsigned_tx: Transaction,
    pub inputs: Vec<PsbtInput>,
}

fn write_pair(key: &[u8], value: &[u8], out: &mut Vec<u8>) {
    write_var_bytes(key, out);
    write_var_bytes(value, out);
}

/// Read key-value pairs up to the 0x00 separator
fn read_map(cursor: &mut Cursor<&[u8]>) -> CodecResult<Vec<(Vec<u8>, Vec<u8>)>> {
    let mut pairs = Vec::new();
    loop {
        let key = read_var_bytes(cursor)?;
        if key.is_empty() {
            return Ok(pairs);
        }
        let value = read_var_bytes(cursor)?;
        pairs.push((key, value));
    }
}

fn invalid(reason: impl Into<String>) -> CodecError {
    CodecError::Other(format!("invalid PSBT: {}", reason.into()))
}

impl Psbt {
    pub fn is_psbt(bytes: &[u8]) -> bool {
        bytes.starts_with(MAGIC)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        write_pair(&[GLOBAL_UNSIGNED_TX], &self.unsigned_tx.encode(false), &mut out);
        out.push(0x00);

        for input in &self.inputs {
            if let Some(utxo) = &input.witness_utxo {
                write_pair(&[IN_WITNESS_UTXO], &utxo.to_bytes(), &mut out);
            }
            if let Some(sighash) = input.sighash_type {
                write_pair(&[IN_SIGHASH_TYPE], &sighash.to_le_bytes(), &mut out);
            }
            if let Some(redeem) = &input.redeem_script {
                write_pair(&[IN_REDEEM_SCRIPT], redeem, &mut out);
            }
            if let Some(public_key) = &input.public_key {
                let mut key = vec![IN_BIP32_DERIVATION];
                key.extend_from_slice(public_key);
                // master fingerprint only, no derivation path
                write_pair(&key, &[0u8; 4], &mut out);
            }
            if let Some(script_sig) = &input.final_script_sig {
                write_pair(&[IN_FINAL_SCRIPTSIG], script_sig, &mut out);
            }
            if let Some(witness) = &input.final_script_witness {
                let mut value = Vec::new();
                write_witness(witness, &mut value);
                write_pair(&[IN_FINAL_SCRIPTWITNESS], &value, &mut out);
            }
            out.push(0x00);
        }

        for _ in &self.unsigned_tx.outputs {
            out.push(0x00);
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let mut cursor = Cursor::new(bytes);
        let magic: [u8; 5] = decode_array(&mut cursor)?;
        if &magic != MAGIC {
            return Err(invalid("missing magic bytes"));
        }

        let mut unsigned_tx = None;
        for (key, value) in read_map(&mut cursor)? {
            if key == [GLOBAL_UNSIGNED_TX] {
                let mut tx_cursor = Cursor::new(value.as_slice());
                let tx = Transaction::decode_from(&mut tx_cursor)?;
                ensure_consumed(&tx_cursor)?;
                unsigned_tx = Some(tx);
            }
        }
        let unsigned_tx = unsigned_tx.ok_or_else(|| invalid("no unsigned transaction"))?;
        if unsigned_tx
            .inputs
            .iter()
            .any(|input| !input.script_sig.is_empty() || !input.witness.is_empty())
        {
            return Err(invalid("unsigned transaction carries scripts"));
        }

        let mut inputs = Vec::with_capacity(unsigned_tx.inputs.len());
        for _ in &unsigned_tx.inputs {
            inputs.push(decode_input(read_map(&mut cursor)?)?);
        }
        for _ in &unsigned_tx.outputs {
            read_map(&mut cursor)?;
        }
        ensure_consumed(&cursor)?;

        Ok(Self {
            unsigned_tx,
            inputs,
        })
    }
}

fn decode_input(pairs: Vec<(Vec<u8>, Vec<u8>)>) -> CodecResult<PsbtInput> {
    let mut input = PsbtInput::default();
    for (key, value) in pairs {
        let (&key_type, key_data) = key
            .split_first()
            .ok_or_else(|| invalid("empty input key"))?;
        match key_type {
            IN_WITNESS_UTXO => {
                let mut cursor = Cursor::new(value.as_slice());
                input.witness_utxo = Some(TxOut::deserialize_bytes(&mut cursor)?);
                ensure_consumed(&cursor)?;
            }
            IN_SIGHASH_TYPE => {
                let mut cursor = Cursor::new(value.as_slice());
                input.sighash_type = Some(decode_u32_le(&mut cursor)?);
                ensure_consumed(&cursor)?;
            }
            IN_REDEEM_SCRIPT => input.redeem_script = Some(value),
            IN_BIP32_DERIVATION => {
                if key_data.len() != 33 {
                    return Err(invalid(format!("{}-byte derivation key", key_data.len())));
                }
                input.public_key = Some(key_data.to_vec());
            }
            IN_FINAL_SCRIPTSIG => input.final_script_sig = Some(value),
            IN_FINAL_SCRIPTWITNESS => {
                let mut cursor = Cursor::new(value.as_slice());
                input.final_script_witness = Some(read_witness(&mut cursor)?);
                ensure_consumed(&cursor)?;
            }
            _ => {}
        }
    }
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utxo::tx::{OutPoint, TxIn};

    fn sample() -> Psbt {
        let unsigned_tx = Transaction {
            version: 2,
            inputs: vec![
                TxIn::new(OutPoint { txid: [1u8; 32], vout: 0 }, 0xfffffffd),
                TxIn::new(OutPoint { txid: [2u8; 32], vout: 3 }, 0xfffffffd),
            ],
            outputs: vec![TxOut {
                value: 50_000,
                script_pubkey: vec![0x00, 0x14].into_iter().chain([9u8; 20]).collect(),
            }],
            lock_time: 0,
        };
        Psbt {
            unsigned_tx,
            inputs: vec![
                PsbtInput {
                    witness_utxo: Some(TxOut {
                        value: 80_000,
                        script_pubkey: vec![0x00, 0x14].into_iter().chain([7u8; 20]).collect(),
                    }),
                    public_key: Some([2u8; 33].to_vec()),
                    sighash_type: Some(1),
                    ..Default::default()
                },
                PsbtInput {
                    witness_utxo: Some(TxOut {
                        value: 20_000,
                        script_pubkey: vec![0x51, 0x20].into_iter().chain([5u8; 32]).collect(),
                    }),
                    sighash_type: Some(0),
                    final_script_witness: Some(vec![vec![0xaa; 64]]),
                    ..Default::default()
                },
            ],
        }
    }

    #[test]
    fn test_round_trip() {
        let psbt = sample();
        let bytes = psbt.encode();
        assert!(Psbt::is_psbt(&bytes));
        assert_eq!(Psbt::decode(&bytes).unwrap(), psbt);
        assert!(!psbt.inputs[0].is_finalized());
        assert!(psbt.inputs[1].is_finalized());
    }

    #[test]
    fn test_unknown_keys_skipped() {
        let psbt = sample();
        let mut bytes = MAGIC.to_vec();
        write_pair(&[GLOBAL_UNSIGNED_TX], &psbt.unsigned_tx.encode(false), &mut bytes);
        // global xpub-style entry
        write_pair(&[0x01, 0xde, 0xad], &[0xbe, 0xef], &mut bytes);
        bytes.push(0x00);
        for _ in 0..2 {
            write_pair(&[0xfc, 0x01], &[0x00], &mut bytes);
            bytes.push(0x00);
        }
        bytes.push(0x00);

        let decoded = Psbt::decode(&bytes).unwrap();
        assert_eq!(decoded.unsigned_tx, psbt.unsigned_tx);
        assert_eq!(decoded.inputs, vec![PsbtInput::default(), PsbtInput::default()]);
    }

    #[test]
    fn test_malformed_rejected() {
        let bytes = sample().encode();
        assert!(Psbt::decode(&bytes[..bytes.len() - 1]).is_err());
        assert!(Psbt::decode(b"psbu\xff\x00").is_err());

        let mut trailing = bytes.clone();
        trailing.push(0x00);
        assert!(Psbt::decode(&trailing).is_err());
    }
}
