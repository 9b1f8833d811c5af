use crate::chain::SubstrateParams;
use crate::codec::compact::{decode_compact_from, encode_compact};
use crate::codec::{decode_array, decode_u8, ensure_consumed};
use crate::error::CodecResult;
use std::io::Cursor;

/// `MultiAddress::Id`
const MULTI_ADDRESS_ID: u8 = 0x00;

/// A runtime call
///
/// Only `Balances.transfer_keep_alive` is understood; anything else is kept
/// as opaque SCALE bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubstrateCall {
    Transfer {
        pallet_index: u8,
        call_index: u8,
        dest: [u8; 32],
        /// Planck
        amount: u128,
    },
    Raw(Vec<u8>),
}

impl SubstrateCall {
    pub fn transfer(params: &SubstrateParams, dest: [u8; 32], amount: u128) -> Self {
        SubstrateCall::Transfer {
            pallet_index: params.balances_pallet_index,
            call_index: params.transfer_call_index,
            dest,
            amount,
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            SubstrateCall::Transfer {
                pallet_index,
                call_index,
                dest,
                amount,
            } => {
                out.extend_from_slice(&[*pallet_index, *call_index, MULTI_ADDRESS_ID]);
                out.extend_from_slice(dest);
                encode_compact(*amount, out);
            }
            SubstrateCall::Raw(bytes) => out.extend_from_slice(bytes),
        }
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }

    /// Interpret `bytes` as a whole call, recognising the configured transfer
    pub fn decode(params: &SubstrateParams, bytes: &[u8]) -> Self {
        Self::decode_transfer(params, bytes).unwrap_or_else(|| SubstrateCall::Raw(bytes.to_vec()))
    }

    fn decode_transfer(params: &SubstrateParams, bytes: &[u8]) -> Option<Self> {
        let mut cursor = Cursor::new(bytes);
        let parse = |cursor: &mut Cursor<&[u8]>| -> CodecResult<Option<Self>> {
            let pallet_index = decode_u8(cursor)?;
            let call_index = decode_u8(cursor)?;
            if pallet_index != params.balances_pallet_index
                || call_index != params.transfer_call_index
                || decode_u8(cursor)? != MULTI_ADDRESS_ID
            {
                return Ok(None);
            }
            let dest = decode_array(cursor)?;
            let amount = decode_compact_from(cursor)?;
            ensure_consumed(cursor)?;
            Ok(Some(SubstrateCall::Transfer {
                pallet_index,
                call_index,
                dest,
                amount,
            }))
        };
        parse(&mut cursor).ok().flatten()
    }

    /// `(pallet, call)` indices
    pub fn indices(&self) -> Option<(u8, u8)> {
        match self {
            SubstrateCall::Transfer {
                pallet_index,
                call_index,
                ..
            } => Some((*pallet_index, *call_index)),
            SubstrateCall::Raw(bytes) => Some((*bytes.first()?, *bytes.get(1)?)),
        }
    }
}
