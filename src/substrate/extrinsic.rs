//! Extrinsic v4 wire format and the signer payload
//!
//! Signed extrinsic:
//!
//! ```text
//! compact(len) | 0x84 | 0x00 signer[32] | scheme sig[64] | era nonce tip [mode] | call
//! ```
//!
//! The unsigned form is `0x00 | signer[32] | extra | additional | call`. Its
//! leading zero can never start a signed extrinsic, whose compact length is
//! always at least 64.

use super::call::SubstrateCall;
use super::era::Era;
use super::{AdditionalSigned, MultiSignature, SubstrateTransaction};
use crate::chain::SubstrateParams;
use crate::codec::compact::{decode_compact_from, decode_compact_len, encode_compact};
use crate::codec::{decode_array, decode_u32_le, decode_u8, remaining};
use crate::error::{CodecError, CodecResult};
use crate::hash::blake2b_256;
use std::io::Cursor;

const SIGNED_V4: u8 = 0x84;
const UNSIGNED_FORM: u8 = 0x00;
const MULTI_ADDRESS_ID: u8 = 0x00;
const ED25519: u8 = 0x00;
const SR25519: u8 = 0x01;
/// `CheckMetadataHash` mode byte: disabled
const METADATA_HASH_DISABLED: u8 = 0x00;
/// `Option::<[u8; 32]>::None`
const NO_METADATA_HASH: u8 = 0x00;
/// Payloads longer than this are signed over their blake2b-256 hash
const MAX_UNHASHED_PAYLOAD: usize = 256;

fn encode_extra(tx: &SubstrateTransaction, out: &mut Vec<u8>) {
    tx.era.encode(out);
    encode_compact(u128::from(tx.nonce), out);
    encode_compact(tx.tip, out);
    if tx.metadata_hash_check {
        out.push(METADATA_HASH_DISABLED);
    }
}

fn decode_extra(
    cursor: &mut Cursor<&[u8]>,
    metadata_hash_check: bool,
) -> CodecResult<(Era, u32, u128)> {
    let era = Era::decode(cursor)?;
    let nonce = decode_compact_from(cursor)?;
    let nonce = u32::try_from(nonce)
        .map_err(|_| CodecError::InvalidCompact(format!("nonce {nonce} exceeds u32")))?;
    let tip = decode_compact_from(cursor)?;
    if metadata_hash_check {
        let mode = decode_u8(cursor)?;
        if mode != METADATA_HASH_DISABLED {
            return Err(CodecError::Other(format!(
                "metadata hash mode {mode} is not supported"
            )));
        }
    }
    Ok((era, nonce, tip))
}

fn encode_additional(additional: &AdditionalSigned, metadata_hash_check: bool, out: &mut Vec<u8>) {
    out.extend_from_slice(&additional.spec_version.to_le_bytes());
    out.extend_from_slice(&additional.transaction_version.to_le_bytes());
    out.extend_from_slice(&additional.genesis_hash);
    out.extend_from_slice(&additional.block_hash);
    if metadata_hash_check {
        out.push(NO_METADATA_HASH);
    }
}

fn decode_additional(
    cursor: &mut Cursor<&[u8]>,
    metadata_hash_check: bool,
) -> CodecResult<AdditionalSigned> {
    let additional = AdditionalSigned {
        spec_version: decode_u32_le(cursor)?,
        transaction_version: decode_u32_le(cursor)?,
        genesis_hash: decode_array(cursor)?,
        block_hash: decode_array(cursor)?,
    };
    if metadata_hash_check && decode_u8(cursor)? != NO_METADATA_HASH {
        return Err(CodecError::Other(
            "metadata hash in the signed payload is not supported".to_string(),
        ));
    }
    Ok(additional)
}

fn additional_of(tx: &SubstrateTransaction) -> CodecResult<&AdditionalSigned> {
    tx.additional.as_ref().ok_or_else(|| {
        CodecError::Other(
            "runtime versions and genesis hash are not known for this extrinsic".to_string(),
        )
    })
}

/// Bytes the signer signs: `call | extra | additional`, hashed when long
pub fn signing_payload(tx: &SubstrateTransaction) -> CodecResult<Vec<u8>> {
    let additional = additional_of(tx)?;
    let mut payload = tx.call.to_vec();
    encode_extra(tx, &mut payload);
    encode_additional(additional, tx.metadata_hash_check, &mut payload);
    if payload.len() > MAX_UNHASHED_PAYLOAD {
        return Ok(blake2b_256(&payload).to_vec());
    }
    Ok(payload)
}

pub fn encode_unsigned(tx: &SubstrateTransaction) -> CodecResult<Vec<u8>> {
    let additional = additional_of(tx)?;
    let mut out = vec![UNSIGNED_FORM];
    out.extend_from_slice(&tx.signer);
    encode_extra(tx, &mut out);
    encode_additional(additional, tx.metadata_hash_check, &mut out);
    tx.call.encode(&mut out);
    Ok(out)
}

pub fn encode_signed(tx: &SubstrateTransaction, signature: &MultiSignature) -> Vec<u8> {
    let mut body = vec![SIGNED_V4, MULTI_ADDRESS_ID];
    body.extend_from_slice(&tx.signer);
    match signature {
        MultiSignature::Ed25519(bytes) => {
            body.push(ED25519);
            body.extend_from_slice(bytes);
        }
        MultiSignature::Sr25519(bytes) => {
            body.push(SR25519);
            body.extend_from_slice(bytes);
        }
    }
    encode_extra(tx, &mut body);
    tx.call.encode(&mut body);

    let mut out = Vec::with_capacity(body.len() + 4);
    encode_compact(body.len() as u128, &mut out);
    out.extend_from_slice(&body);
    out
}

/// Parse either the unsigned form or a signed extrinsic
pub fn decode(params: &SubstrateParams, bytes: &[u8]) -> CodecResult<SubstrateTransaction> {
    let metadata_hash_check = params.metadata_hash_check;
    if bytes.first() == Some(&UNSIGNED_FORM) {
        let mut cursor = Cursor::new(&bytes[1..]);
        let signer = decode_array(&mut cursor)?;
        let (era, nonce, tip) = decode_extra(&mut cursor, metadata_hash_check)?;
        let additional = decode_additional(&mut cursor, metadata_hash_check)?;
        let call = remaining(&mut cursor);
        if call.is_empty() {
            return Err(CodecError::UnexpectedEnd {
                needed: 1,
                available: 0,
            });
        }
        return Ok(SubstrateTransaction {
            signer,
            call: SubstrateCall::decode(params, call),
            era,
            nonce,
            tip,
            metadata_hash_check,
            additional: Some(additional),
            signature: None,
        });
    }

    let mut cursor = Cursor::new(bytes);
    let len = decode_compact_len(&mut cursor)?;
    let body = remaining(&mut cursor);
    if body.len() != len {
        return Err(CodecError::InvalidLength {
            expected: len,
            actual: body.len(),
        });
    }

    let mut cursor = Cursor::new(body);
    match decode_u8(&mut cursor)? {
        SIGNED_V4 => {}
        version => {
            return Err(CodecError::Other(format!(
                "extrinsic version byte {version:#04x} is not a signed v4 extrinsic"
            )))
        }
    }
    match decode_u8(&mut cursor)? {
        MULTI_ADDRESS_ID => {}
        kind => {
            return Err(CodecError::Other(format!(
                "MultiAddress variant {kind} is not supported"
            )))
        }
    }
    let signer = decode_array(&mut cursor)?;
    let signature = match decode_u8(&mut cursor)? {
        ED25519 => MultiSignature::Ed25519(decode_array(&mut cursor)?),
        SR25519 => MultiSignature::Sr25519(decode_array(&mut cursor)?),
        kind => {
            return Err(CodecError::Other(format!(
                "MultiSignature variant {kind} is not supported"
            )))
        }
    };
    let (era, nonce, tip) = decode_extra(&mut cursor, metadata_hash_check)?;
    let call = remaining(&mut cursor);
    if call.is_empty() {
        return Err(CodecError::UnexpectedEnd {
            needed: 1,
            available: 0,
        });
    }

    Ok(SubstrateTransaction {
        signer,
        call: SubstrateCall::decode(params, call),
        era,
        nonce,
        tip,
        metadata_hash_check,
        additional: None,
        signature: Some(signature),
    })
}
