//! XRPL canonical binary serialization for `Payment`
//!
//! Fields are written sorted by `(type code, field code)`. Variable-length
//! fields carry the ledger's 1-3 byte VL prefix.

use super::XrpTransaction;
use crate::codec::{decode_array, decode_bytes, decode_u8, ensure_consumed};
use crate::error::{CodecError, CodecResult};
use std::io::Cursor;

const TYPE_UINT16: u8 = 1;
const TYPE_UINT32: u8 = 2;
const TYPE_AMOUNT: u8 = 6;
const TYPE_BLOB: u8 = 7;
const TYPE_ACCOUNT: u8 = 8;

const TRANSACTION_TYPE: (u8, u8) = (TYPE_UINT16, 2);
const FLAGS: (u8, u8) = (TYPE_UINT32, 2);
const SEQUENCE: (u8, u8) = (TYPE_UINT32, 4);
const DESTINATION_TAG: (u8, u8) = (TYPE_UINT32, 14);
const LAST_LEDGER_SEQUENCE: (u8, u8) = (TYPE_UINT32, 27);
const AMOUNT: (u8, u8) = (TYPE_AMOUNT, 1);
const FEE: (u8, u8) = (TYPE_AMOUNT, 8);
const SIGNING_PUB_KEY: (u8, u8) = (TYPE_BLOB, 3);
const TXN_SIGNATURE: (u8, u8) = (TYPE_BLOB, 4);
const ACCOUNT: (u8, u8) = (TYPE_ACCOUNT, 1);
const DESTINATION: (u8, u8) = (TYPE_ACCOUNT, 3);

const PAYMENT: u16 = 0;

/// Native amounts: bit 63 clear (not an issued currency), bit 62 set (positive)
const NATIVE_POSITIVE: u64 = 0x4000_0000_0000_0000;
/// 100 billion XRP in drops
pub const MAX_DROPS: u64 = 100_000_000_000_000_000;

/// Prefix of the signing blob (`STX\0`)
pub const SIGNING_PREFIX: [u8; 4] = [0x53, 0x54, 0x58, 0x00];
/// Prefix of the transaction id preimage (`TXN\0`)
pub const TRANSACTION_ID_PREFIX: [u8; 4] = [0x54, 0x58, 0x4e, 0x00];

fn write_field_id((type_code, field_code): (u8, u8), out: &mut Vec<u8>) {
    match (type_code < 16, field_code < 16) {
        (true, true) => out.push((type_code << 4) | field_code),
        (true, false) => out.extend_from_slice(&[type_code << 4, field_code]),
        (false, true) => out.extend_from_slice(&[field_code, type_code]),
        (false, false) => out.extend_from_slice(&[0, type_code, field_code]),
    }
}

fn read_field_id(cursor: &mut Cursor<&[u8]>) -> CodecResult<(u8, u8)> {
    let first = decode_u8(cursor)?;
    let (type_code, field_code) = (first >> 4, first & 0x0f);
    Ok(match (type_code, field_code) {
        (0, 0) => (decode_u8(cursor)?, decode_u8(cursor)?),
        (0, field) => (decode_u8(cursor)?, field),
        (kind, 0) => (kind, decode_u8(cursor)?),
        pair => pair,
    })
}

/// Variable-length prefix
pub fn write_vl(data: &[u8], out: &mut Vec<u8>) -> CodecResult<()> {
    let len = data.len();
    match len {
        0..=192 => out.push(len as u8),
        193..=12_480 => {
            let rest = len - 193;
            out.extend_from_slice(&[193 + (rest >> 8) as u8, (rest & 0xff) as u8]);
        }
        12_481..=918_744 => {
            let rest = len - 12_481;
            out.extend_from_slice(&[
                241 + (rest >> 16) as u8,
                ((rest >> 8) & 0xff) as u8,
                (rest & 0xff) as u8,
            ]);
        }
        _ => return Err(CodecError::Other(format!("{len}-byte field is too long"))),
    }
    out.extend_from_slice(data);
    Ok(())
}

pub fn read_vl(cursor: &mut Cursor<&[u8]>) -> CodecResult<Vec<u8>> {
    let first = decode_u8(cursor)? as usize;
    let len = match first {
        0..=192 => first,
        193..=240 => 193 + ((first - 193) << 8) + decode_u8(cursor)? as usize,
        241..=254 => {
            let second = decode_u8(cursor)? as usize;
            let third = decode_u8(cursor)? as usize;
            12_481 + ((first - 241) << 16) + (second << 8) + third
        }
        _ => return Err(CodecError::Other(format!("invalid length prefix {first:#04x}"))),
    };
    Ok(decode_bytes(cursor, len)?.to_vec())
}

fn write_amount(drops: u64, out: &mut Vec<u8>) -> CodecResult<()> {
    if drops > MAX_DROPS {
        return Err(CodecError::Other(format!("{drops} drops exceeds the XRP supply")));
    }
    out.extend_from_slice(&(NATIVE_POSITIVE | drops).to_be_bytes());
    Ok(())
}

fn read_amount(cursor: &mut Cursor<&[u8]>) -> CodecResult<u64> {
    let raw = u64::from_be_bytes(decode_array(cursor)?);
    if raw & (1 << 63) != 0 {
        return Err(CodecError::Other("issued currency amounts are not supported".to_string()));
    }
    if raw & NATIVE_POSITIVE == 0 && raw != 0 {
        return Err(CodecError::Other("negative XRP amount".to_string()));
    }
    Ok(raw & !NATIVE_POSITIVE)
}

fn write_account(account: &[u8; 20], out: &mut Vec<u8>) {
    out.push(20);
    out.extend_from_slice(account);
}

fn read_account(cursor: &mut Cursor<&[u8]>) -> CodecResult<[u8; 20]> {
    let bytes = read_vl(cursor)?;
    bytes.as_slice().try_into().map_err(|_| CodecError::InvalidLength {
        expected: 20,
        actual: bytes.len(),
    })
}

/// Serialize every field, leaving out `TxnSignature` when `signing` is set
pub fn encode(tx: &XrpTransaction, signing: bool) -> CodecResult<Vec<u8>> {
    let mut out = Vec::with_capacity(256);

    write_field_id(TRANSACTION_TYPE, &mut out);
    out.extend_from_slice(&PAYMENT.to_be_bytes());
    write_field_id(FLAGS, &mut out);
    out.extend_from_slice(&tx.flags.to_be_bytes());
    write_field_id(SEQUENCE, &mut out);
    out.extend_from_slice(&tx.sequence.to_be_bytes());
    if let Some(tag) = tx.destination_tag {
        write_field_id(DESTINATION_TAG, &mut out);
        out.extend_from_slice(&tag.to_be_bytes());
    }
    if let Some(ledger) = tx.last_ledger_sequence {
        write_field_id(LAST_LEDGER_SEQUENCE, &mut out);
        out.extend_from_slice(&ledger.to_be_bytes());
    }
    write_field_id(AMOUNT, &mut out);
    write_amount(tx.amount, &mut out)?;
    write_field_id(FEE, &mut out);
    write_amount(tx.fee, &mut out)?;
    write_field_id(SIGNING_PUB_KEY, &mut out);
    write_vl(&tx.signing_pub_key, &mut out)?;
    if let (Some(signature), false) = (&tx.txn_signature, signing) {
        write_field_id(TXN_SIGNATURE, &mut out);
        write_vl(signature, &mut out)?;
    }
    write_field_id(ACCOUNT, &mut out);
    write_account(&tx.account, &mut out);
    write_field_id(DESTINATION, &mut out);
    write_account(&tx.destination, &mut out);

    Ok(out)
}

pub fn decode(bytes: &[u8]) -> CodecResult<XrpTransaction> {
    let mut cursor = Cursor::new(bytes);
    let mut previous: Option<(u8, u8)> = None;

    let mut transaction_type = None;
    let mut flags = 0;
    let mut sequence = None;
    let mut destination_tag = None;
    let mut last_ledger_sequence = None;
    let mut amount = None;
    let mut fee = None;
    let mut signing_pub_key = Vec::new();
    let mut txn_signature = None;
    let mut account = None;
    let mut destination = None;

    while (cursor.position() as usize) < bytes.len() {
        let id = read_field_id(&mut cursor)?;
        if previous.is_some_and(|previous| previous >= id) {
            return Err(CodecError::Other(format!(
                "field ({}, {}) out of canonical order",
                id.0, id.1
            )));
        }
        previous = Some(id);

        match id {
            TRANSACTION_TYPE => {
                transaction_type = Some(u16::from_be_bytes(decode_array(&mut cursor)?))
            }
            FLAGS => flags = u32::from_be_bytes(decode_array(&mut cursor)?),
            SEQUENCE => sequence = Some(u32::from_be_bytes(decode_array(&mut cursor)?)),
            DESTINATION_TAG => {
                destination_tag = Some(u32::from_be_bytes(decode_array(&mut cursor)?))
            }
            LAST_LEDGER_SEQUENCE => {
                last_ledger_sequence = Some(u32::from_be_bytes(decode_array(&mut cursor)?))
            }
            AMOUNT => amount = Some(read_amount(&mut cursor)?),
            FEE => fee = Some(read_amount(&mut cursor)?),
            SIGNING_PUB_KEY => signing_pub_key = read_vl(&mut cursor)?,
            TXN_SIGNATURE => txn_signature = Some(read_vl(&mut cursor)?),
            ACCOUNT => account = Some(read_account(&mut cursor)?),
            DESTINATION => destination = Some(read_account(&mut cursor)?),
            (type_code, field_code) => {
                return Err(CodecError::Other(format!(
                    "unsupported field (type {type_code}, field {field_code})"
                )))
            }
        }
    }
    ensure_consumed(&cursor)?;

    let missing = |name: &str| CodecError::Other(format!("missing {name}"));
    match transaction_type {
        Some(PAYMENT) => {}
        Some(other) => {
            return Err(CodecError::Other(format!(
                "transaction type {other} is not supported"
            )))
        }
        None => return Err(missing("TransactionType")),
    }

    Ok(XrpTransaction {
        account: account.ok_or_else(|| missing("Account"))?,
        destination: destination.ok_or_else(|| missing("Destination"))?,
        amount: amount.ok_or_else(|| missing("Amount"))?,
        fee: fee.ok_or_else(|| missing("Fee"))?,
        sequence: sequence.ok_or_else(|| missing("Sequence"))?,
        flags,
        destination_tag,
        last_ledger_sequence,
        signing_pub_key,
        txn_signature,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment() -> XrpTransaction {
        XrpTransaction {
            account: [0x11; 20],
            destination: [0x22; 20],
            amount: 1000,
            fee: 10,
            sequence: 1,
            flags: 0x8000_0000,
            destination_tag: None,
            last_ledger_sequence: None,
            signing_pub_key: vec![0x02; 33],
            txn_signature: None,
        }
    }

    #[test]
    fn test_field_layout() {
        let encoded = encode(&payment(), false).unwrap();
        let expected_head = concat!(
            "120000",             // TransactionType Payment
            "2280000000",         // Flags
            "2400000001",         // Sequence
            "6140000000000003e8", // Amount 1000 drops
            "68400000000000000a", // Fee 10 drops
            "7321"                // SigningPubKey, 33 bytes
        );
        assert!(hex::encode(&encoded).starts_with(expected_head));
        // Account then Destination, both 20-byte VL
        let tail = &encoded[encoded.len() - 44..];
        assert_eq!(&tail[..2], &[0x81, 0x14]);
        assert_eq!(&tail[22..24], &[0x83, 0x14]);
    }

    #[test]
    fn test_two_byte_field_id() {
        let mut out = Vec::new();
        write_field_id(LAST_LEDGER_SEQUENCE, &mut out);
        assert_eq!(out, vec![0x20, 0x1b]);
        let mut out = Vec::new();
        write_field_id(DESTINATION_TAG, &mut out);
        assert_eq!(out, vec![0x2e]);
        assert_eq!(read_field_id(&mut Cursor::new(&[0x20, 0x1b][..])).unwrap(), LAST_LEDGER_SEQUENCE);
        assert_eq!(read_field_id(&mut Cursor::new(&[0x01, 0x11][..])).unwrap(), (17, 1));
    }

    #[test]
    fn test_vl_prefix_boundaries() {
        for len in [0usize, 192, 193, 12_480, 12_481] {
            let data = vec![0xab; len];
            let mut out = Vec::new();
            write_vl(&data, &mut out).unwrap();
            let prefix = out.len() - len;
            let expected = match len {
                0..=192 => 1,
                193..=12_480 => 2,
                _ => 3,
            };
            assert_eq!(prefix, expected, "len {len}");
            assert_eq!(read_vl(&mut Cursor::new(&out[..])).unwrap(), data);
        }
    }

    #[test]
    fn test_signing_form_omits_signature() {
        let signed = XrpTransaction {
            destination_tag: Some(7),
            last_ledger_sequence: Some(90_000_020),
            txn_signature: Some(vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01]),
            ..payment()
        };
        let full = encode(&signed, false).unwrap();
        let signing = encode(&signed, true).unwrap();
        assert_eq!(full.len(), signing.len() + 10);
        assert_eq!(decode(&full).unwrap(), signed);
        assert_eq!(decode(&signing).unwrap().txn_signature, None);
    }

    #[test]
    fn test_rejects_bad_input() {
        let encoded = encode(&payment(), false).unwrap();
        assert!(decode(&encoded[..encoded.len() - 1]).is_err());

        // Sequence before Flags
        let swapped = hex::decode("12000024000000012280000000").unwrap();
        assert!(decode(&swapped).is_err());

        let mut issued = encode(&payment(), false).unwrap();
        // Amount high bit set: issued currency
        let amount_at = 3 + 5 + 5 + 1;
        issued[amount_at] |= 0x80;
        assert!(decode(&issued).is_err());

        assert!(write_amount(MAX_DROPS + 1, &mut Vec::new()).is_err());
    }
}
