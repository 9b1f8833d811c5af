//! Spend types, scriptSig/witness assembly and size estimates

use crate::address::UtxoAddress;
use crate::chain::SignatureAlgorithm;
use crate::codec::der::signature_to_der;
use crate::error::{CodecError, CodecResult};
use crate::hash::hash160;

pub const SIGHASH_ALL: u8 = 0x01;
/// Taproot default, omitted from the signature
pub const SIGHASH_DEFAULT: u8 = 0x00;

/// How an input is spent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    P2pkh,
    P2shP2wpkh,
    P2wpkh,
    /// Taproot key path
    P2tr,
}

impl InputKind {
    /// Classify a previous output, given the redeem script for P2SH
    pub fn classify(script_pubkey: &[u8], redeem_script: Option<&[u8]>) -> CodecResult<Self> {
        match UtxoAddress::from_script_pubkey(script_pubkey) {
            Some(UtxoAddress::P2pkh(_)) => Ok(InputKind::P2pkh),
            Some(UtxoAddress::P2wpkh(_)) => Ok(InputKind::P2wpkh),
            Some(UtxoAddress::P2tr(_)) => Ok(InputKind::P2tr),
            Some(UtxoAddress::P2sh(_)) => match redeem_script {
                Some(redeem) if matches!(UtxoAddress::from_script_pubkey(redeem), Some(UtxoAddress::P2wpkh(_))) => {
                    Ok(InputKind::P2shP2wpkh)
                }
                Some(_) => Err(CodecError::Other("only P2SH-P2WPKH redeem scripts are supported".to_string())),
                None => Err(CodecError::Other("P2SH input without redeem script".to_string())),
            },
            Some(UtxoAddress::P2wsh(_)) => Err(CodecError::Other("P2WSH inputs are not supported".to_string())),
            None => Err(CodecError::Other(format!(
                "non-standard script {}",
                hex::encode(script_pubkey)
            ))),
        }
    }

    pub fn is_segwit(&self) -> bool {
        !matches!(self, InputKind::P2pkh)
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            InputKind::P2tr => SignatureAlgorithm::Secp256k1Schnorr,
            _ => SignatureAlgorithm::Secp256k1Ecdsa,
        }
    }

    pub fn default_sighash(&self) -> u8 {
        match self {
            InputKind::P2tr => SIGHASH_DEFAULT,
            _ => SIGHASH_ALL,
        }
    }

    /// Signed input weight in weight units
    pub fn input_weight(&self) -> usize {
        // outpoint 36 + sequence 4 + scriptSig length 1
        const BASE: usize = 41;
        match self {
            // 107-byte scriptSig: DER signature + sighash, compressed key
            InputKind::P2pkh => (BASE + 107) * 4,
            // 23-byte scriptSig pushing the redeem script, 108-byte witness
            InputKind::P2shP2wpkh => (BASE + 23) * 4 + 108,
            InputKind::P2wpkh => BASE * 4 + 108,
            // one 64-byte signature
            InputKind::P2tr => BASE * 4 + 66,
        }
    }
}

/// P2WPKH witness program (also the P2SH-P2WPKH redeem script)
pub fn p2wpkh_script(public_key: &[u8]) -> Vec<u8> {
    UtxoAddress::P2wpkh(hash160(public_key)).script_pubkey()
}

/// BIP-143 scriptCode of a P2WPKH spend
pub fn p2wpkh_script_code(public_key: &[u8]) -> Vec<u8> {
    UtxoAddress::P2pkh(hash160(public_key)).script_pubkey()
}

/// Check that `public_key` controls `script_pubkey`
pub fn check_key_matches(
    kind: InputKind,
    script_pubkey: &[u8],
    public_key: &[u8],
    redeem_script: Option<&[u8]>,
) -> CodecResult<()> {
    let key_hash = hash160(public_key);
    let matches = match (kind, UtxoAddress::from_script_pubkey(script_pubkey)) {
        (InputKind::P2pkh, Some(UtxoAddress::P2pkh(hash))) => hash == key_hash,
        (InputKind::P2wpkh, Some(UtxoAddress::P2wpkh(hash))) => hash == key_hash,
        (InputKind::P2shP2wpkh, Some(UtxoAddress::P2sh(hash))) => {
            let expected = p2wpkh_script(public_key);
            redeem_script == Some(expected.as_slice()) && hash == hash160(&expected)
        }
        _ => false,
    };
    if matches {
        Ok(())
    } else {
        Err(CodecError::Other(format!(
            "public key {} does not control the spent output",
            hex::encode(public_key)
        )))
    }
}

/// Push `data` onto a script with the minimal direct push opcode
fn push_data(data: &[u8], script: &mut Vec<u8>) -> CodecResult<()> {
    match data.len() {
        len @ 0..=75 => script.push(len as u8),
        len @ 76..=255 => script.extend_from_slice(&[0x4c, len as u8]),
        len => return Err(CodecError::Other(format!("{len}-byte push is too large"))),
    }
    script.extend_from_slice(data);
    Ok(())
}

/// Final scriptSig and witness for one input
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalScripts {
    pub script_sig: Vec<u8>,
    pub witness: Vec<Vec<u8>>,
}

/// DER signature with its sighash byte, and the key that made it
fn ecdsa_parts<'a>(
    signature: &[u8],
    sighash_type: u8,
    public_key: Option<&'a [u8]>,
) -> CodecResult<(Vec<u8>, &'a [u8])> {
    let public_key =
        public_key.ok_or_else(|| CodecError::Other("input has no public key".to_string()))?;
    let mut der = signature_to_der(signature)?;
    der.push(sighash_type);
    Ok((der, public_key))
}

/// Assemble the spend of one input from its 64-byte signature
pub fn finalize_input(
    kind: InputKind,
    signature: &[u8],
    sighash_type: u8,
    public_key: Option<&[u8]>,
    redeem_script: Option<&[u8]>,
) -> CodecResult<FinalScripts> {
    let ecdsa = || ecdsa_parts(signature, sighash_type, public_key);

    match kind {
        InputKind::P2tr => {
            let mut schnorr = signature.to_vec();
            if sighash_type != SIGHASH_DEFAULT {
                schnorr.push(sighash_type);
            }
            Ok(FinalScripts {
                script_sig: Vec::new(),
                witness: vec![schnorr],
            })
        }
        InputKind::P2pkh => {
            let (der, public_key) = ecdsa()?;
            let mut script_sig = Vec::with_capacity(der.len() + public_key.len() + 2);
            push_data(&der, &mut script_sig)?;
            push_data(public_key, &mut script_sig)?;
            Ok(FinalScripts {
                script_sig,
                witness: Vec::new(),
            })
        }
        InputKind::P2wpkh => {
            let (der, public_key) = ecdsa()?;
            Ok(FinalScripts {
                script_sig: Vec::new(),
                witness: vec![der, public_key.to_vec()],
            })
        }
        InputKind::P2shP2wpkh => {
            let redeem = redeem_script
                .ok_or_else(|| CodecError::Other("P2SH input without redeem script".to_string()))?;
            let (der, public_key) = ecdsa()?;
            let mut script_sig = Vec::with_capacity(redeem.len() + 1);
            push_data(redeem, &mut script_sig)?;
            Ok(FinalScripts {
                script_sig,
                witness: vec![der, public_key.to_vec()],
            })
        }
    }
}
