//! Recursive Length Prefix encoding (EVM)

use crate::codec::trim_leading_zeros;
use crate::error::{CodecError, CodecResult};

/// A decoded or to-be-encoded RLP value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlpItem {
    Bytes(Vec<u8>),
    List(Vec<RlpItem>),
}

impl RlpItem {
    /// Big-endian integer with leading zeros stripped (zero is the empty string)
    pub fn uint(value: u128) -> Self {
        RlpItem::Bytes(trim_leading_zeros(&value.to_be_bytes()).to_vec())
    }

    pub fn bytes(data: &[u8]) -> Self {
        RlpItem::Bytes(data.to_vec())
    }

    /// 32-byte signature component, encoded as an integer
    pub fn scalar(data: &[u8]) -> Self {
        RlpItem::Bytes(trim_leading_zeros(data).to_vec())
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            RlpItem::Bytes(data) => {
                if data.len() == 1 && data[0] < 0x80 {
                    out.push(data[0]);
                } else {
                    encode_header(0x80, data.len(), out);
                    out.extend_from_slice(data);
                }
            }
            RlpItem::List(items) => {
                let mut payload = Vec::new();
                for item in items {
                    item.encode_into(&mut payload);
                }
                encode_header(0xc0, payload.len(), out);
                out.extend_from_slice(&payload);
            }
        }
    }

    /// Decode exactly one item spanning all of `input`
    pub fn decode(input: &[u8]) -> CodecResult<Self> {
        let (item, rest) = decode_item(input)?;
        if !rest.is_empty() {
            return Err(CodecError::TrailingBytes(rest.len()));
        }
        Ok(item)
    }

    pub fn as_bytes(&self) -> CodecResult<&[u8]> {
        match self {
            RlpItem::Bytes(data) => Ok(data),
            RlpItem::List(_) => Err(invalid("expected a byte string, found a list")),
        }
    }

    pub fn as_list(&self) -> CodecResult<&[RlpItem]> {
        match self {
            RlpItem::List(items) => Ok(items),
            RlpItem::Bytes(_) => Err(invalid("expected a list, found a byte string")),
        }
    }

    pub fn as_u128(&self) -> CodecResult<u128> {
        let data = self.as_bytes()?;
        if data.len() > 16 {
            return Err(invalid(format!("{}-byte integer overflows u128", data.len())));
        }
        if data.first() == Some(&0) {
            return Err(invalid("integer with leading zero"));
        }
        let mut be = [0u8; 16];
        be[16 - data.len()..].copy_from_slice(data);
        Ok(u128::from_be_bytes(be))
    }

    pub fn as_u64(&self) -> CodecResult<u64> {
        let value = self.as_u128()?;
        u64::try_from(value).map_err(|_| invalid(format!("{value} overflows u64")))
    }

    /// Fixed-width value left-padded to `N` bytes (addresses, r and s)
    pub fn as_array<const N: usize>(&self) -> CodecResult<[u8; N]> {
        let data = self.as_bytes()?;
        if data.len() > N {
            return Err(CodecError::InvalidLength {
                expected: N,
                actual: data.len(),
            });
        }
        let mut out = [0u8; N];
        out[N - data.len()..].copy_from_slice(data);
        Ok(out)
    }
}

fn encode_header(offset: u8, len: usize, out: &mut Vec<u8>) {
    if len < 56 {
        out.push(offset + len as u8);
    } else {
        let len_bytes = (len as u64).to_be_bytes();
        let len_bytes = trim_leading_zeros(&len_bytes);
        out.push(offset + 55 + len_bytes.len() as u8);
        out.extend_from_slice(len_bytes);
    }
}

fn decode_item(input: &[u8]) -> CodecResult<(RlpItem, &[u8])> {
    let (&prefix, rest) = input.split_first().ok_or(CodecError::UnexpectedEnd {
        needed: 1,
        available: 0,
    })?;

    match prefix {
        0x00..=0x7f => Ok((RlpItem::Bytes(vec![prefix]), rest)),
        0x80..=0xb7 => {
            let len = usize::from(prefix - 0x80);
            let (data, rest) = split(rest, len)?;
            if len == 1 && data[0] < 0x80 {
                return Err(invalid("single byte below 0x80 must not carry a prefix"));
            }
            Ok((RlpItem::Bytes(data.to_vec()), rest))
        }
        0xb8..=0xbf => {
            let (len, rest) = long_length(rest, usize::from(prefix - 0xb7))?;
            let (data, rest) = split(rest, len)?;
            Ok((RlpItem::Bytes(data.to_vec()), rest))
        }
        0xc0..=0xf7 => {
            let (payload, rest) = split(rest, usize::from(prefix - 0xc0))?;
            Ok((RlpItem::List(decode_list(payload)?), rest))
        }
        0xf8..=0xff => {
            let (len, rest) = long_length(rest, usize::from(prefix - 0xf7))?;
            let (payload, rest) = split(rest, len)?;
            Ok((RlpItem::List(decode_list(payload)?), rest))
        }
    }
}

fn decode_list(mut payload: &[u8]) -> CodecResult<Vec<RlpItem>> {
    let mut items = Vec::new();
    while !payload.is_empty() {
        let (item, rest) = decode_item(payload)?;
        items.push(item);
        payload = rest;
    }
    Ok(items)
}

fn long_length(input: &[u8], width: usize) -> CodecResult<(usize, &[u8])> {
    let (len_bytes, rest) = split(input, width)?;
    if len_bytes[0] == 0 {
        return Err(invalid("length with leading zero"));
    }
    if width > std::mem::size_of::<usize>() {
        return Err(invalid("length overflows usize"));
    }
    let len = len_bytes
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | usize::from(b));
    if len < 56 {
        return Err(invalid("long form used for a short payload"));
    }
    Ok((len, rest))
}

fn split(input: &[u8], len: usize) -> CodecResult<(&[u8], &[u8])> {
    if input.len() < len {
        return Err(CodecError::UnexpectedEnd {
            needed: len,
            available: input.len(),
        });
    }
    Ok(input.split_at(len))
}

fn invalid(reason: impl Into<String>) -> CodecError {
    CodecError::InvalidRlp(reason.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_scalars() {
        assert_eq!(RlpItem::uint(0).encode(), vec![0x80]);
        assert_eq!(RlpItem::uint(0x7f).encode(), vec![0x7f]);
        assert_eq!(RlpItem::uint(0x80).encode(), vec![0x81, 0x80]);
        assert_eq!(RlpItem::uint(1024).encode(), vec![0x82, 0x04, 0x00]);
        assert_eq!(RlpItem::bytes(b"dog").encode(), vec![0x83, b'd', b'o', b'g']);
    }

    #[test]
    fn test_nested_lists() {
        // [ [], [[]], [ [], [[]] ] ]
        let empty = RlpItem::List(vec![]);
        let item = RlpItem::List(vec![
            empty.clone(),
            RlpItem::List(vec![empty.clone()]),
            RlpItem::List(vec![empty.clone(), RlpItem::List(vec![empty])]),
        ]);
        let encoded = item.encode();
        assert_eq!(hex::encode(&encoded), "c7c0c1c0c3c0c1c0");
        assert_eq!(RlpItem::decode(&encoded).unwrap(), item);
    }

    #[test]
    fn test_long_string() {
        let data = vec![0xaa; 60];
        let encoded = RlpItem::bytes(&data).encode();
        assert_eq!(&encoded[..2], &[0xb8, 60]);
        assert_eq!(RlpItem::decode(&encoded).unwrap().as_bytes().unwrap(), &data[..]);
    }

    #[test]
    fn test_integer_accessors() {
        let item = RlpItem::decode(&[0x82, 0x04, 0x00]).unwrap();
        assert_eq!(item.as_u64().unwrap(), 1024);
        assert_eq!(item.as_array::<4>().unwrap(), [0, 0, 4, 0]);
        assert!(RlpItem::Bytes(vec![0, 1]).as_u128().is_err());
        assert!(RlpItem::List(vec![]).as_bytes().is_err());
    }

    #[test]
    fn test_rejects_non_canonical() {
        assert!(RlpItem::decode(&[0x81, 0x05]).is_err());
        assert!(RlpItem::decode(&[0xb8, 0x02, 0x01, 0x02]).is_err());
        assert!(RlpItem::decode(&[0x83, 0x01]).is_err());
        assert!(matches!(
            RlpItem::decode(&[0x01, 0x02]),
            Err(CodecError::TrailingBytes(1))
        ));
    }
}
