//! RLP wire encoding of EVM transactions
//!
//! Legacy: `rlp([nonce, gasPrice, gas, to, value, data, v, r, s])`, where the
//! unsigned form carries `chainId, 0, 0` in the signature slots (EIP-155).
//! EIP-1559: `0x02 || rlp([chainId, nonce, maxPriorityFee, maxFee, gas, to,
//! value, data, accessList, yParity, r, s])`.

use super::{AccessListItem, EvmSignature, EvmTransaction};
use crate::codec::rlp::RlpItem;
use crate::error::{CodecError, CodecResult};
use crate::transaction::overrides::EvmTxType;

const EIP1559_TYPE: u8 = 0x02;

pub(super) fn encode_unsigned(tx: &EvmTransaction) -> Vec<u8> {
    match tx.tx_type {
        EvmTxType::Legacy => {
            let mut fields = legacy_fields(tx);
            fields.extend([
                RlpItem::uint(u128::from(tx.chain_id)),
                RlpItem::uint(0),
                RlpItem::uint(0),
            ]);
            RlpItem::List(fields).encode()
        }
        EvmTxType::Eip1559 => typed(EIP1559_TYPE, eip1559_fields(tx)),
    }
}

pub(super) fn encode_signed(tx: &EvmTransaction) -> Option<Vec<u8>> {
    let signature = tx.signature.as_ref()?;
    let encoded = match tx.tx_type {
        EvmTxType::Legacy => {
            let v = u128::from(tx.chain_id) * 2 + 35 + u128::from(signature.y_parity);
            let mut fields = legacy_fields(tx);
            fields.extend([
                RlpItem::uint(v),
                RlpItem::scalar(&signature.r),
                RlpItem::scalar(&signature.s),
            ]);
            RlpItem::List(fields).encode()
        }
        EvmTxType::Eip1559 => {
            let mut fields = eip1559_fields(tx);
            fields.extend([
                RlpItem::uint(u128::from(signature.y_parity)),
                RlpItem::scalar(&signature.r),
                RlpItem::scalar(&signature.s),
            ]);
            typed(EIP1559_TYPE, fields)
        }
    };
    Some(encoded)
}

fn typed(tx_type: u8, fields: Vec<RlpItem>) -> Vec<u8> {
    let mut out = vec![tx_type];
    RlpItem::List(fields).encode_into(&mut out);
    out
}

fn to_item(to: &Option<[u8; 20]>) -> RlpItem {
    match to {
        Some(address) => RlpItem::bytes(address),
        None => RlpItem::Bytes(Vec::new()),
    }
}

fn legacy_fields(tx: &EvmTransaction) -> Vec<RlpItem> {
    vec![
        RlpItem::uint(u128::from(tx.nonce)),
        RlpItem::uint(tx.gas_price.unwrap_or(0)),
        RlpItem::uint(u128::from(tx.gas_limit)),
        to_item(&tx.to),
        RlpItem::uint(tx.value),
        RlpItem::bytes(&tx.data),
    ]
}

fn eip1559_fields(tx: &EvmTransaction) -> Vec<RlpItem> {
    let access_list = tx
        .access_list
        .iter()
        .map(|item| {
            RlpItem::List(vec![
                RlpItem::bytes(&item.address),
                RlpItem::List(item.storage_keys.iter().map(|key| RlpItem::bytes(key)).collect()),
            ])
        })
        .collect();

    vec![
        RlpItem::uint(u128::from(tx.chain_id)),
        RlpItem::uint(u128::from(tx.nonce)),
        RlpItem::uint(tx.max_priority_fee_per_gas.unwrap_or(0)),
        RlpItem::uint(tx.max_fee_per_gas.unwrap_or(0)),
        RlpItem::uint(u128::from(tx.gas_limit)),
        to_item(&tx.to),
        RlpItem::uint(tx.value),
        RlpItem::bytes(&tx.data),
        RlpItem::List(access_list),
    ]
}

/// Parse a signed or unsigned transaction
pub(super) fn decode(bytes: &[u8]) -> CodecResult<EvmTransaction> {
    match bytes.first() {
        Some(&EIP1559_TYPE) => decode_eip1559(&bytes[1..]),
        Some(&first) if first >= 0xc0 => decode_legacy(bytes),
        Some(&other) => Err(CodecError::Other(format!(
            "unsupported transaction type {other:#04x}"
        ))),
        None => Err(CodecError::UnexpectedEnd {
            needed: 1,
            available: 0,
        }),
    }
}

fn decode_to(item: &RlpItem) -> CodecResult<Option<[u8; 20]>> {
    let data = item.as_bytes()?;
    match data.len() {
        0 => Ok(None),
        20 => item.as_array().map(Some),
        other => Err(CodecError::InvalidLength {
            expected: 20,
            actual: other,
        }),
    }
}

fn decode_signature(parity: u8, r: &RlpItem, s: &RlpItem) -> CodecResult<EvmSignature> {
    Ok(EvmSignature {
        y_parity: parity,
        r: r.as_array()?,
        s: s.as_array()?,
    })
}

fn decode_legacy(bytes: &[u8]) -> CodecResult<EvmTransaction> {
    let item = RlpItem::decode(bytes)?;
    let fields = item.as_list()?;
    if fields.len() != 9 {
        return Err(CodecError::InvalidRlp(format!(
            "legacy transaction has {} fields, expected 9",
            fields.len()
        )));
    }

    let v = fields[6].as_u64()?;
    let r = fields[7].as_bytes()?;
    let s = fields[8].as_bytes()?;
    let (chain_id, signature) = if r.is_empty() && s.is_empty() {
        (v, None)
    } else if v >= 35 {
        let parity = ((v - 35) % 2) as u8;
        ((v - 35) / 2, Some(decode_signature(parity, &fields[7], &fields[8])?))
    } else {
        return Err(CodecError::Other(format!(
            "v = {v}: transactions without replay protection are not supported"
        )));
    };

    Ok(EvmTransaction {
        tx_type: EvmTxType::Legacy,
        chain_id,
        nonce: fields[0].as_u64()?,
        gas_limit: fields[2].as_u64()?,
        gas_price: Some(fields[1].as_u128()?),
        max_fee_per_gas: None,
        max_priority_fee_per_gas: None,
        to: decode_to(&fields[3])?,
        value: fields[4].as_u128()?,
        data: fields[5].as_bytes()?.to_vec(),
        access_list: Vec::new(),
        signature,
    })
}

fn decode_eip1559(bytes: &[u8]) -> CodecResult<EvmTransaction> {
    let item = RlpItem::decode(bytes)?;
    let fields = item.as_list()?;
    let signature = match fields.len() {
        9 => None,
        12 => {
            let parity = fields[9].as_u64()?;
            if parity > 1 {
                return Err(CodecError::Other(format!("y parity {parity}")));
            }
            Some(decode_signature(parity as u8, &fields[10], &fields[11])?)
        }
        other => {
            return Err(CodecError::InvalidRlp(format!(
                "EIP-1559 transaction has {other} fields, expected 9 or 12"
            )))
        }
    };

    let access_list = fields[8]
        .as_list()?
        .iter()
        .map(|entry| {
            let entry = entry.as_list()?;
            if entry.len() != 2 {
                return Err(CodecError::InvalidRlp("access list entry".to_string()));
            }
            let storage_keys = entry[1]
                .as_list()?
                .iter()
                .map(|key| fixed_bytes::<32>(key))
                .collect::<CodecResult<Vec<_>>>()?;
            Ok(AccessListItem {
                address: fixed_bytes::<20>(&entry[0])?,
                storage_keys,
            })
        })
        .collect::<CodecResult<Vec<_>>>()?;

    Ok(EvmTransaction {
        tx_type: EvmTxType::Eip1559,
        chain_id: fields[0].as_u64()?,
        nonce: fields[1].as_u64()?,
        gas_limit: fields[4].as_u64()?,
        gas_price: None,
        max_priority_fee_per_gas: Some(fields[2].as_u128()?),
        max_fee_per_gas: Some(fields[3].as_u128()?),
        to: decode_to(&fields[5])?,
        value: fields[6].as_u128()?,
        data: fields[7].as_bytes()?.to_vec(),
        access_list,
        signature,
    })
}

/// Exactly `N` bytes, no padding
fn fixed_bytes<const N: usize>(item: &RlpItem) -> CodecResult<[u8; N]> {
    let data = item.as_bytes()?;
    data.try_into().map_err(|_| CodecError::InvalidLength {
        expected: N,
        actual: data.len(),
    })
}
