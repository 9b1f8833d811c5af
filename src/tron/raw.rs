//! `protocol.Transaction` and the two contracts this crate builds
//!
//! Field numbers follow java-tron's `Tron.proto` and `contract/*.proto`.

use crate::codec::protobuf::{
    write_bytes_field, write_int64_field, write_varint_field, FieldReader,
};
use crate::error::{CodecError, CodecResult};

pub const TRANSFER_CONTRACT: u64 = 1;
pub const TRIGGER_SMART_CONTRACT: u64 = 31;

const TYPE_URL_PREFIX: &str = "type.googleapis.com/protocol.";

/// One contract of `Transaction.raw`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TronContract {
    /// TRX transfer, amount in sun
    Transfer {
        owner: [u8; 21],
        to: [u8; 21],
        amount: i64,
    },
    /// Smart contract call (TRC-20 transfers included)
    TriggerSmartContract {
        owner: [u8; 21],
        contract: [u8; 21],
        call_value: i64,
        data: Vec<u8>,
    },
}

impl TronContract {
    pub fn owner(&self) -> &[u8; 21] {
        match self {
            TronContract::Transfer { owner, .. } => owner,
            TronContract::TriggerSmartContract { owner, .. } => owner,
        }
    }

    fn contract_type(&self) -> u64 {
        match self {
            TronContract::Transfer { .. } => TRANSFER_CONTRACT,
            TronContract::TriggerSmartContract { .. } => TRIGGER_SMART_CONTRACT,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            TronContract::Transfer { .. } => "TransferContract",
            TronContract::TriggerSmartContract { .. } => "TriggerSmartContract",
        }
    }

    fn encode_parameter(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            TronContract::Transfer { owner, to, amount } => {
                write_bytes_field(1, owner, &mut out);
                write_bytes_field(2, to, &mut out);
                write_int64_field(3, *amount, &mut out);
            }
            TronContract::TriggerSmartContract {
                owner,
                contract,
                call_value,
                data,
            } => {
                write_bytes_field(1, owner, &mut out);
                write_bytes_field(2, contract, &mut out);
                write_int64_field(3, *call_value, &mut out);
                write_bytes_field(4, data, &mut out);
            }
        }
        out
    }

    fn decode_parameter(contract_type: u64, type_url: &str, value: &[u8]) -> CodecResult<Self> {
        let expected = match contract_type {
            TRANSFER_CONTRACT => "TransferContract",
            TRIGGER_SMART_CONTRACT => "TriggerSmartContract",
            other => {
                return Err(CodecError::InvalidProtobuf(format!(
                    "contract type {other} is not supported"
                )))
            }
        };
        if !type_url.is_empty() && type_url != format!("{TYPE_URL_PREFIX}{expected}") {
            return Err(CodecError::InvalidProtobuf(format!(
                "type url {type_url:?} does not match contract type {contract_type}"
            )));
        }

        let mut owner = None;
        let mut target = None;
        let mut amount = 0i64;
        let mut data = Vec::new();
        let mut reader = FieldReader::new(value);
        while let Some((field, value)) = reader.next_field()? {
            match field {
                1 => owner = Some(address(value.as_bytes(field)?)?),
                2 => target = Some(address(value.as_bytes(field)?)?),
                3 => amount = value.as_varint(field)? as i64,
                4 if contract_type == TRIGGER_SMART_CONTRACT => {
                    data = value.as_bytes(field)?.to_vec()
                }
                _ => {}
            }
        }
        let owner = owner.ok_or_else(|| missing("owner_address"))?;
        let target = target.ok_or_else(|| missing("to/contract address"))?;

        Ok(match contract_type {
            TRANSFER_CONTRACT => TronContract::Transfer {
                owner,
                to: target,
                amount,
            },
            _ => TronContract::TriggerSmartContract {
                owner,
                contract: target,
                call_value: amount,
                data,
            },
        })
    }
}

fn address(bytes: &[u8]) -> CodecResult<[u8; 21]> {
    bytes.try_into().map_err(|_| CodecError::InvalidLength {
        expected: 21,
        actual: bytes.len(),
    })
}

fn missing(field: &str) -> CodecError {
    CodecError::InvalidProtobuf(format!("missing {field}"))
}

/// `Transaction.raw`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TronRaw {
    /// Bytes 6..8 of the big-endian reference block number
    pub ref_block_bytes: [u8; 2],
    /// Bytes 8..16 of the reference block id
    pub ref_block_hash: [u8; 8],
    /// Milliseconds since the epoch
    pub expiration: i64,
    /// Memo
    pub data: Vec<u8>,
    pub contract: TronContract,
    pub permission_id: i32,
    pub timestamp: i64,
    /// Maximum energy fee in sun, smart contracts only
    pub fee_limit: i64,
}

impl TronRaw {
    pub fn encode(&self) -> Vec<u8> {
        let mut parameter = Vec::new();
        write_bytes_field(
            1,
            format!("{TYPE_URL_PREFIX}{}", self.contract.type_name()).as_bytes(),
            &mut parameter,
        );
        write_bytes_field(2, &self.contract.encode_parameter(), &mut parameter);

        let mut contract = Vec::new();
        write_varint_field(1, self.contract.contract_type(), &mut contract);
        write_bytes_field(2, &parameter, &mut contract);
        write_int64_field(5, i64::from(self.permission_id), &mut contract);

        let mut out = Vec::new();
        write_bytes_field(1, &self.ref_block_bytes, &mut out);
        write_bytes_field(4, &self.ref_block_hash, &mut out);
        write_int64_field(8, self.expiration, &mut out);
        write_bytes_field(10, &self.data, &mut out);
        write_bytes_field(11, &contract, &mut out);
        write_int64_field(14, self.timestamp, &mut out);
        write_int64_field(18, self.fee_limit, &mut out);
        out
    }

    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let mut ref_block_bytes = None;
        let mut ref_block_hash = None;
        let mut expiration = 0;
        let mut data = Vec::new();
        let mut contract = None;
        let mut timestamp = 0;
        let mut fee_limit = 0;

        let mut reader = FieldReader::new(bytes);
        while let Some((field, value)) = reader.next_field()? {
            match field {
                1 => ref_block_bytes = Some(fixed::<2>(value.as_bytes(field)?)?),
                4 => ref_block_hash = Some(fixed::<8>(value.as_bytes(field)?)?),
                8 => expiration = value.as_varint(field)? as i64,
                10 => data = value.as_bytes(field)?.to_vec(),
                11 => {
                    if contract.is_some() {
                        return Err(CodecError::InvalidProtobuf(
                            "more than one contract".to_string(),
                        ));
                    }
                    contract = Some(decode_contract(value.as_bytes(field)?)?);
                }
                14 => timestamp = value.as_varint(field)? as i64,
                18 => fee_limit = value.as_varint(field)? as i64,
                _ => {}
            }
        }

        let (contract, permission_id) = contract.ok_or_else(|| missing("contract"))?;
        Ok(Self {
            ref_block_bytes: ref_block_bytes.ok_or_else(|| missing("ref_block_bytes"))?,
            ref_block_hash: ref_block_hash.ok_or_else(|| missing("ref_block_hash"))?,
            expiration,
            data,
            contract,
            permission_id,
            timestamp,
            fee_limit,
        })
    }
}

fn fixed<const N: usize>(bytes: &[u8]) -> CodecResult<[u8; N]> {
    bytes.try_into().map_err(|_| CodecError::InvalidLength {
        expected: N,
        actual: bytes.len(),
    })
}

fn decode_contract(bytes: &[u8]) -> CodecResult<(TronContract, i32)> {
    let mut contract_type = None;
    let mut parameter = None;
    let mut permission_id = 0i32;

    let mut reader = FieldReader::new(bytes);
    while let Some((field, value)) = reader.next_field()? {
        match field {
            1 => contract_type = Some(value.as_varint(field)?),
            2 => parameter = Some(value.as_bytes(field)?),
            5 => permission_id = value.as_varint(field)? as i32,
            _ => {}
        }
    }
    let contract_type = contract_type.ok_or_else(|| missing("contract type"))?;
    let parameter = parameter.ok_or_else(|| missing("contract parameter"))?;

    let mut type_url = "";
    let mut value: &[u8] = &[];
    let mut reader = FieldReader::new(parameter);
    while let Some((field, field_value)) = reader.next_field()? {
        match field {
            1 => {
                type_url = std::str::from_utf8(field_value.as_bytes(field)?)
                    .map_err(|err| CodecError::InvalidProtobuf(format!("type url: {err}")))?
            }
            2 => value = field_value.as_bytes(field)?,
            _ => {}
        }
    }

    let contract = TronContract::decode_parameter(contract_type, type_url, value)?;
    Ok((contract, permission_id))
}

/// `protocol.Transaction`: raw data bytes plus signatures
pub fn encode_transaction(raw_data: &[u8], signatures: &[[u8; 65]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw_data.len() + signatures.len() * 67 + 4);
    write_bytes_field(1, raw_data, &mut out);
    for signature in signatures {
        write_bytes_field(2, signature, &mut out);
    }
    out
}

/// Split `protocol.Transaction` into raw data bytes and signatures
pub fn decode_transaction(bytes: &[u8]) -> CodecResult<(Vec<u8>, Vec<[u8; 65]>)> {
    let mut raw_data = None;
    let mut signatures = Vec::new();
    let mut reader = FieldReader::new(bytes);
    while let Some((field, value)) = reader.next_field()? {
        match field {
            1 => raw_data = Some(value.as_bytes(field)?.to_vec()),
            2 => signatures.push(fixed::<65>(value.as_bytes(field)?)?),
            // ret
            5 => {}
            other => {
                return Err(CodecError::InvalidProtobuf(format!(
                    "unexpected transaction field {other}"
                )))
            }
        }
    }
    let raw_data = raw_data.ok_or_else(|| missing("raw_data"))?;
    Ok((raw_data, signatures))
}
