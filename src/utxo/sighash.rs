//! Signature hashes: legacy, BIP-143 (segwit v0) and BIP-341 (taproot key path)
//!
//! Only `SIGHASH_ALL` (and the taproot default) are produced.

use super::script::{SIGHASH_ALL, SIGHASH_DEFAULT};
use super::tx::{Transaction, TxOut};
use crate::codec::varint::write_var_bytes;
use crate::codec::ByteSerialize;
use crate::error::{CodecError, CodecResult};
use crate::hash::{double_sha256, sha256, tagged_hash};

fn check_index(tx: &Transaction, index: usize) -> CodecResult<()> {
    if index >= tx.inputs.len() {
        return Err(CodecError::Other(format!(
            "input {index} out of range for {} inputs",
            tx.inputs.len()
        )));
    }
    Ok(())
}

fn require_all(sighash_type: u8) -> CodecResult<()> {
    if sighash_type != SIGHASH_ALL {
        return Err(CodecError::Other(format!(
            "sighash type {sighash_type:#04x} is not supported"
        )));
    }
    Ok(())
}

/// Pre-segwit digest: the transaction with only this input's scriptSig set
/// to `script_code`, followed by the 4-byte sighash type
pub fn legacy(
    tx: &Transaction,
    index: usize,
    script_code: &[u8],
    sighash_type: u8,
) -> CodecResult<[u8; 32]> {
    check_index(tx, index)?;
    require_all(sighash_type)?;

    let mut copy = tx.stripped();
    copy.inputs[index].script_sig = script_code.to_vec();
    let mut preimage = copy.encode(false);
    preimage.extend_from_slice(&u32::from(sighash_type).to_le_bytes());
    Ok(double_sha256(&preimage))
}

/// BIP-143 digest for a segwit v0 input
pub fn segwit_v0(
    tx: &Transaction,
    index: usize,
    script_code: &[u8],
    value: u64,
    sighash_type: u8,
) -> CodecResult<[u8; 32]> {
    check_index(tx, index)?;
    require_all(sighash_type)?;

    let mut prevouts = Vec::with_capacity(tx.inputs.len() * 36);
    let mut sequences = Vec::with_capacity(tx.inputs.len() * 4);
    for input in &tx.inputs {
        input.previous_output.serialize_bytes(&mut prevouts);
        sequences.extend_from_slice(&input.sequence.to_le_bytes());
    }
    let mut outputs = Vec::new();
    for output in &tx.outputs {
        output.serialize_bytes(&mut outputs);
    }

    let input = &tx.inputs[index];
    let mut preimage = Vec::with_capacity(160 + script_code.len());
    preimage.extend_from_slice(&tx.version.to_le_bytes());
    preimage.extend_from_slice(&double_sha256(&prevouts));
    preimage.extend_from_slice(&double_sha256(&sequences));
    input.previous_output.serialize_bytes(&mut preimage);
    write_var_bytes(script_code, &mut preimage);
    preimage.extend_from_slice(&value.to_le_bytes());
    preimage.extend_from_slice(&input.sequence.to_le_bytes());
    preimage.extend_from_slice(&double_sha256(&outputs));
    preimage.extend_from_slice(&tx.lock_time.to_le_bytes());
    preimage.extend_from_slice(&u32::from(sighash_type).to_le_bytes());
    Ok(double_sha256(&preimage))
}

/// BIP-341 key path digest; `prevouts` are the outputs spent by every input
pub fn taproot_key_path(
    tx: &Transaction,
    index: usize,
    prevouts: &[TxOut],
    sighash_type: u8,
) -> CodecResult<[u8; 32]> {
    check_index(tx, index)?;
    if sighash_type != SIGHASH_DEFAULT && sighash_type != SIGHASH_ALL {
        return Err(CodecError::Other(format!(
            "sighash type {sighash_type:#04x} is not supported"
        )));
    }
    if prevouts.len() != tx.inputs.len() {
        return Err(CodecError::InvalidLength {
            expected: tx.inputs.len(),
            actual: prevouts.len(),
        });
    }

    let mut outpoints = Vec::new();
    let mut amounts = Vec::new();
    let mut script_pubkeys = Vec::new();
    let mut sequences = Vec::new();
    for (input, prevout) in tx.inputs.iter().zip(prevouts) {
        input.previous_output.serialize_bytes(&mut outpoints);
        amounts.extend_from_slice(&prevout.value.to_le_bytes());
        write_var_bytes(&prevout.script_pubkey, &mut script_pubkeys);
        sequences.extend_from_slice(&input.sequence.to_le_bytes());
    }
    let mut outputs = Vec::new();
    for output in &tx.outputs {
        output.serialize_bytes(&mut outputs);
    }

    // epoch 0, then SigMsg
    let mut message = Vec::with_capacity(175);
    message.push(0x00);
    message.push(sighash_type);
    message.extend_from_slice(&tx.version.to_le_bytes());
    message.extend_from_slice(&tx.lock_time.to_le_bytes());
    message.extend_from_slice(&sha256(&outpoints));
    message.extend_from_slice(&sha256(&amounts));
    message.extend_from_slice(&sha256(&script_pubkeys));
    message.extend_from_slice(&sha256(&sequences));
    message.extend_from_slice(&sha256(&outputs));
    // spend type: key path, no annex
    message.push(0x00);
    message.extend_from_slice(&(index as u32).to_le_bytes());
    Ok(tagged_hash("TapSighash", &message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const BIP143_UNSIGNED: &str = concat!(
        "0100000002fff7f7881a8099afa6940d42d1e7f6362bec38171ea3edf433541db4e4ad969f00000000",
        "00eeffffffef51e1b804cc89d182d279655c3aa89e815b1b309fe287d9b2b55d57b90ec68a01000000",
        "00ffffffff02202cb206000000001976a9148280b37df378db99f66f85c95a783a76ac7a6d5988ac90",
        "93510d000000001976a9143bde42dbee7e4dbe6a21b2d50ce2f0167faa815988ac11000000"
    );

    fn bip143_tx() -> Transaction {
        let bytes = hex::decode(BIP143_UNSIGNED).unwrap();
        Transaction::decode_from(&mut Cursor::new(&bytes[..])).unwrap()
    }

    #[test]
    fn test_bip143_native_p2wpkh_vector() {
        let script_code =
            hex::decode("76a9141d0f172a0ecb48aee1be1f2687d2963ae33f71a188ac").unwrap();
        let digest = segwit_v0(&bip143_tx(), 1, &script_code, 600_000_000, SIGHASH_ALL).unwrap();
        assert_eq!(
            hex::encode(digest),
            "c37af31116d1b27caf68aae9e3ac82f1477929014d5b917657d0eb49478cb670"
        );
    }

    #[test]
    fn test_legacy_digest_commits_to_input() {
        let tx = bip143_tx();
        let script = tx.outputs[0].script_pubkey.clone();
        let first = legacy(&tx, 0, &script, SIGHASH_ALL).unwrap();
        let second = legacy(&tx, 1, &script, SIGHASH_ALL).unwrap();
        assert_ne!(first, second);
        assert!(legacy(&tx, 2, &script, SIGHASH_ALL).is_err());
        assert!(legacy(&tx, 0, &script, 0x81).is_err());
    }

    #[test]
    fn test_taproot_digest_commits_to_amounts() {
        let tx = bip143_tx();
        let prevouts = vec![
            TxOut {
                value: 625_000_000,
                script_pubkey: vec![0x51, 0x20].into_iter().chain([1u8; 32]).collect(),
            },
            TxOut {
                value: 600_000_000,
                script_pubkey: vec![0x00, 0x14].into_iter().chain([2u8; 20]).collect(),
            },
        ];
        let digest = taproot_key_path(&tx, 0, &prevouts, SIGHASH_DEFAULT).unwrap();

        let mut changed = prevouts.clone();
        changed[1].value += 1;
        assert_ne!(digest, taproot_key_path(&tx, 0, &changed, SIGHASH_DEFAULT).unwrap());
        assert_ne!(digest, taproot_key_path(&tx, 0, &prevouts, SIGHASH_ALL).unwrap());
        assert!(taproot_key_path(&tx, 0, &prevouts[..1], SIGHASH_DEFAULT).is_err());
    }
}
