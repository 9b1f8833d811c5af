//! Bitcoin-family transactions carried as PSBTs until finalized
//!
//! Each input yields one signing entry: ECDSA over the legacy or BIP-143
//! digest, Schnorr over the BIP-341 digest for Taproot key-path inputs.
//! Applying the signatures assembles every input's scriptSig and witness;
//! the signed form is the extracted BIP-144 network transaction.

mod builder;
pub mod psbt;
pub mod script;
pub mod sighash;
pub mod tx;

pub use builder::build;
pub use psbt::{Psbt, PsbtInput};
pub use script::InputKind;
pub use tx::{OutPoint, Transaction, TxIn, TxOut};

use crate::address::{UtxoAddress, UtxoAddressCodec};
use crate::chain::{ChainConfig, Ecosystem};
use crate::codec::der::signature_from_der;
use crate::codec::ensure_consumed;
use crate::error::{CodecError, CodecResult, Result, TxError};
use crate::hash::hash160;
use crate::transaction::normalised::OutputInfo;
use crate::transaction::{
    check_signatures, format_units, ChainTransaction, NormalisedTransaction, PayloadEntry,
    TransactionKind,
};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature, VerifyingKey};
use script::{finalize_input, p2wpkh_script_code};
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoTransaction {
    /// Transaction without scriptSigs or witnesses
    pub tx: Transaction,
    /// Signing data and final scripts, one per input
    pub inputs: Vec<PsbtInput>,
}

impl UtxoTransaction {
    pub fn new(tx: Transaction, inputs: Vec<PsbtInput>) -> Self {
        Self { tx, inputs }
    }

    pub fn to_psbt(&self) -> Psbt {
        Psbt {
            unsigned_tx: self.tx.clone(),
            inputs: self.inputs.clone(),
        }
    }

    pub fn from_psbt(psbt: Psbt) -> Self {
        Self {
            tx: psbt.unsigned_tx,
            inputs: psbt.inputs,
        }
    }

    /// Outputs spent by every input, when all are known
    pub fn prevouts(&self) -> Option<Vec<TxOut>> {
        self.inputs
            .iter()
            .map(|input| input.witness_utxo.clone())
            .collect()
    }

    /// Inputs minus outputs, when every input value is known
    pub fn fee(&self) -> Option<u64> {
        let spent: u64 = self.prevouts()?.iter().map(|prevout| prevout.value).sum();
        let paid: u64 = self.tx.outputs.iter().map(|output| output.value).sum();
        spent.checked_sub(paid)
    }

    /// Spend type of input `index`, from its previous output
    pub fn input_kind(&self, index: usize) -> CodecResult<InputKind> {
        let input = self
            .inputs
            .get(index)
            .ok_or_else(|| CodecError::Other(format!("no input {index}")))?;
        let prevout = input
            .witness_utxo
            .as_ref()
            .ok_or_else(|| CodecError::Other(format!("input {index} has no previous output")))?;
        InputKind::classify(&prevout.script_pubkey, input.redeem_script.as_deref())
    }

    fn sighash_type(&self, index: usize, kind: InputKind) -> CodecResult<u8> {
        match self.inputs[index].sighash_type {
            None => Ok(kind.default_sighash()),
            Some(value) => u8::try_from(value)
                .map_err(|_| CodecError::Other(format!("sighash type {value:#x} is not supported"))),
        }
    }

    /// Digest the signer signs for input `index`
    pub fn sighash(&self, index: usize) -> CodecResult<[u8; 32]> {
        let kind = self.input_kind(index)?;
        let sighash_type = self.sighash_type(index, kind)?;
        let input = &self.inputs[index];
        let public_key = || {
            input
                .public_key
                .as_deref()
                .ok_or_else(|| CodecError::Other(format!("input {index} has no public key")))
        };
        let prevout = input
            .witness_utxo
            .as_ref()
            .ok_or_else(|| CodecError::Other(format!("input {index} has no previous output")))?;

        match kind {
            InputKind::P2pkh => sighash::legacy(&self.tx, index, &prevout.script_pubkey, sighash_type),
            InputKind::P2wpkh | InputKind::P2shP2wpkh => sighash::segwit_v0(
                &self.tx,
                index,
                &p2wpkh_script_code(public_key()?),
                prevout.value,
                sighash_type,
            ),
            InputKind::P2tr => {
                let prevouts = self.prevouts().ok_or_else(|| {
                    CodecError::Other("taproot signing needs every previous output".to_string())
                })?;
                sighash::taproot_key_path(&self.tx, index, &prevouts, sighash_type)
            }
        }
    }

    /// Network transaction with the final scripts in place
    pub fn extract(&self) -> Transaction {
        let mut tx = self.tx.clone();
        for (txin, input) in tx.inputs.iter_mut().zip(&self.inputs) {
            txin.script_sig = input.final_script_sig.clone().unwrap_or_default();
            txin.witness = input.final_script_witness.clone().unwrap_or_default();
        }
        tx
    }

    /// Split a network transaction into the stripped form and its final scripts
    fn from_network(tx: Transaction) -> Self {
        let inputs = tx
            .inputs
            .iter()
            .map(|txin| PsbtInput {
                final_script_sig: (!txin.script_sig.is_empty()).then(|| txin.script_sig.clone()),
                final_script_witness: (!txin.witness.is_empty()).then(|| txin.witness.clone()),
                ..Default::default()
            })
            .collect();
        Self {
            tx: tx.stripped(),
            inputs,
        }
    }
}

/// First data push of a script
fn first_push(script: &[u8]) -> Option<&[u8]> {
    let (&len, rest) = script.split_first()?;
    match len {
        1..=75 => rest.get(..len as usize),
        0x4c => {
            let (&len, rest) = rest.split_first()?;
            rest.get(..len as usize)
        }
        _ => None,
    }
}

/// Second data push of a script
fn second_push(script: &[u8]) -> Option<&[u8]> {
    let first = first_push(script)?;
    let offset = if first.len() > 75 { 2 } else { 1 };
    first_push(script.get(offset + first.len()..)?)
}

/// Bare 64-byte signature from a DER signature with its sighash byte
fn strip_ecdsa(der_with_type: &[u8]) -> Option<Vec<u8>> {
    let (_, der) = der_with_type.split_last()?;
    signature_from_der(der).ok().map(|sig| sig.to_vec())
}

/// Signature recovered from the final scripts of one input
fn final_signature(input: &PsbtInput) -> Option<Vec<u8>> {
    match (&input.final_script_witness, &input.final_script_sig) {
        (Some(witness), _) if witness.len() == 1 => {
            let schnorr = &witness[0];
            matches!(schnorr.len(), 64 | 65).then(|| schnorr[..64].to_vec())
        }
        (Some(witness), _) if witness.len() == 2 => strip_ecdsa(&witness[0]),
        (None, Some(script_sig)) => strip_ecdsa(first_push(script_sig)?),
        _ => None,
    }
}

/// Output script the input spends, inferred from its final scripts
fn inferred_prevout_script(input: &PsbtInput) -> Option<Vec<u8>> {
    match (&input.final_script_witness, &input.final_script_sig) {
        (Some(witness), None) if witness.len() == 2 => {
            Some(UtxoAddress::P2wpkh(hash160(&witness[1])).script_pubkey())
        }
        (Some(witness), Some(script_sig)) if witness.len() == 2 => {
            let redeem = first_push(script_sig)?;
            Some(UtxoAddress::P2sh(hash160(redeem)).script_pubkey())
        }
        (None, Some(script_sig)) => {
            let public_key = second_push(script_sig)?;
            Some(UtxoAddress::P2pkh(hash160(public_key)).script_pubkey())
        }
        _ => None,
    }
}

impl ChainTransaction for UtxoTransaction {
    const ECOSYSTEM: Ecosystem = Ecosystem::Utxo;

    fn signing_payload(&self, config: &ChainConfig) -> Result<Vec<PayloadEntry>> {
        (0..self.inputs.len())
            .map(|index| {
                let kind = self.input_kind(index)?;
                Ok(PayloadEntry::new(kind.algorithm(), self.sighash(index)?))
            })
            .collect::<CodecResult<Vec<_>>>()
            .map_err(|err| TxError::invalid_transaction(config.alias, err.to_string()))
    }

    fn apply_signatures(
        &self,
        config: &ChainConfig,
        signatures: &[Vec<u8>],
        _sender: Option<&str>,
    ) -> Result<Self> {
        check_signatures(config, signatures, self.inputs.len(), 64)?;
        let failure = |index: usize, err: String| {
            TxError::signature(config.alias, format!("input {index}: {err}"))
        };

        let mut inputs = self.inputs.clone();
        for (index, (input, signature)) in inputs.iter_mut().zip(signatures).enumerate() {
            let kind = self.input_kind(index).map_err(|err| failure(index, err.to_string()))?;
            let sighash_type = self
                .sighash_type(index, kind)
                .map_err(|err| failure(index, err.to_string()))?;

            if kind != InputKind::P2tr {
                let digest = self.sighash(index).map_err(|err| failure(index, err.to_string()))?;
                let public_key = input.public_key.as_deref().unwrap_or_default();
                let verified = VerifyingKey::from_sec1_bytes(public_key)
                    .ok()
                    .zip(Signature::from_slice(signature).ok())
                    .map(|(key, sig)| key.verify_prehash(&digest, &sig).is_ok())
                    .unwrap_or(false);
                if !verified {
                    return Err(failure(index, "signature does not verify".to_string()));
                }
            }

            let finals = finalize_input(
                kind,
                signature,
                sighash_type,
                input.public_key.as_deref(),
                input.redeem_script.as_deref(),
            )
            .map_err(|err| failure(index, err.to_string()))?;
            input.final_script_sig = (!finals.script_sig.is_empty()).then_some(finals.script_sig);
            input.final_script_witness = (!finals.witness.is_empty()).then_some(finals.witness);
        }

        Ok(Self {
            tx: self.tx.clone(),
            inputs,
        })
    }

    fn is_signed(&self) -> bool {
        !self.inputs.is_empty() && self.inputs.iter().all(PsbtInput::is_finalized)
    }

    fn signatures(&self) -> Vec<Vec<u8>> {
        self.inputs.iter().filter_map(final_signature).collect()
    }

    fn serialize_unsigned(&self, _config: &ChainConfig) -> Result<Vec<u8>> {
        Ok(self.to_psbt().encode())
    }

    fn serialize_signed(&self, config: &ChainConfig) -> Result<Vec<u8>> {
        if !self.is_signed() {
            return Err(TxError::invalid_transaction(
                config.alias,
                "every input must be finalized",
            ));
        }
        Ok(self.extract().encode(true))
    }

    fn transaction_hash(&self, _config: &ChainConfig, _wire: &[u8]) -> Result<String> {
        Ok(self.tx.txid())
    }

    fn decode(config: &ChainConfig, bytes: &[u8]) -> Result<Self> {
        let parse = |err: CodecError| TxError::parse(config.ecosystem(), err);
        if Psbt::is_psbt(bytes) {
            return Ok(Self::from_psbt(Psbt::decode(bytes).map_err(parse)?));
        }
        let mut cursor = Cursor::new(bytes);
        let tx = Transaction::decode_from(&mut cursor).map_err(parse)?;
        ensure_consumed(&cursor).map_err(parse)?;
        Ok(Self::from_network(tx))
    }

    fn normalise(&self, config: &ChainConfig) -> Result<NormalisedTransaction> {
        let codec = UtxoAddressCodec::new(config.utxo()?);
        let decimals = config.native.decimals;

        let outputs: Vec<OutputInfo> = self
            .tx
            .outputs
            .iter()
            .map(|output| OutputInfo {
                address: codec.address_of_script(&output.script_pubkey),
                value: output.value.to_string(),
                formatted_value: format_units(u128::from(output.value), decimals),
            })
            .collect();

        let first_value = self.tx.outputs.first().map(|output| output.value).unwrap_or(0);
        let mut normalised = NormalisedTransaction::new(config, TransactionKind::NativeTransfer)
            .with_value(config, u128::from(first_value))
            .with_metadata("txid", self.tx.txid())
            .with_metadata("inputs", self.tx.inputs.len());
        if let Some(fee) = self.fee() {
            normalised = normalised.with_fee(config, u128::from(fee));
        }

        let vsize = if self.is_signed() {
            Some(self.extract().vsize())
        } else {
            (0..self.inputs.len())
                .map(|index| self.input_kind(index).ok())
                .collect::<Option<Vec<_>>>()
                .map(|kinds| builder::estimate_vsize(&kinds, &self.tx.outputs))
        };
        if let Some(vsize) = vsize {
            normalised = normalised.with_metadata("vsize", vsize);
        }

        normalised.to = outputs.first().and_then(|output| output.address.clone());
        normalised.from = self.inputs.first().and_then(|input| {
            let script = match &input.witness_utxo {
                Some(prevout) => prevout.script_pubkey.clone(),
                None => inferred_prevout_script(input)?,
            };
            codec.address_of_script(&script)
        });
        normalised.outputs = Some(outputs);
        Ok(normalised)
    }
}
