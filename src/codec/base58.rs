//! Base58 and Base58Check
//!
//! Thin wrappers over `bs58` that fix the alphabet per use site and map
//! failures onto [`CodecError`]. Leading zero bytes map to leading `'1'`
//! characters (`'r'` in the Ripple alphabet) and survive a round trip.

use crate::error::{CodecError, CodecResult};

pub use bs58::Alphabet;

/// Encode with the Bitcoin alphabet
pub fn encode_base58(bytes: &[u8]) -> String {
    bs58::encode(bytes).into_string()
}

/// Decode with the Bitcoin alphabet
pub fn decode_base58(value: &str) -> CodecResult<Vec<u8>> {
    Ok(bs58::decode(value).into_vec()?)
}

/// Decode exactly `N` bytes
pub fn decode_base58_array<const N: usize>(value: &str) -> CodecResult<[u8; N]> {
    let bytes = decode_base58(value)?;
    bytes.as_slice().try_into().map_err(|_| CodecError::InvalidLength {
        expected: N,
        actual: bytes.len(),
    })
}

/// Base58Check: payload followed by the first four bytes of its double SHA-256
pub fn encode_base58_check(payload: &[u8], alphabet: &'static Alphabet) -> String {
    bs58::encode(payload)
        .with_alphabet(alphabet)
        .with_check()
        .into_string()
}

/// Decode Base58Check, returning the payload without its checksum
pub fn decode_base58_check(value: &str, alphabet: &'static Alphabet) -> CodecResult<Vec<u8>> {
    Ok(bs58::decode(value)
        .with_alphabet(alphabet)
        .with_check(None)
        .into_vec()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_leading_zeros_preserved() {
        let bytes = [0u8, 0, 0, 1, 2, 3];
        let encoded = encode_base58(&bytes);
        assert!(encoded.starts_with("111"));
        assert_eq!(decode_base58(&encoded).unwrap(), bytes);

        assert_eq!(encode_base58(&[0, 0]), "11");
        assert_eq!(decode_base58("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_known_vector() {
        assert_eq!(encode_base58(b"Hello World!"), "2NEpo7TZRRrLZSi2U");
    }

    #[test]
    fn test_out_of_alphabet_character() {
        let err = decode_base58("3mJr0").unwrap_err();
        assert_eq!(err, CodecError::InvalidCharacter { character: '0', index: 4 });
    }

    #[test]
    fn test_base58_check_detects_corruption() {
        let encoded = encode_base58_check(&[0x00, 0xAA, 0xBB], Alphabet::BITCOIN);
        assert_eq!(
            decode_base58_check(&encoded, Alphabet::BITCOIN).unwrap(),
            vec![0x00, 0xAA, 0xBB]
        );

        let mut corrupted: Vec<char> = encoded.chars().collect();
        let last = corrupted.len() - 1;
        corrupted[last] = if corrupted[last] == '2' { '3' } else { '2' };
        let corrupted: String = corrupted.into_iter().collect();
        assert!(decode_base58_check(&corrupted, Alphabet::BITCOIN).is_err());
    }

    proptest! {
        #[test]
        fn prop_base58_round_trip(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            prop_assert_eq!(decode_base58(&encode_base58(&bytes)).unwrap(), bytes);
        }

        #[test]
        fn prop_base58_round_trip_with_zero_prefix(
            zeros in 0usize..8,
            tail in proptest::collection::vec(any::<u8>(), 0..32),
        ) {
            let mut bytes = vec![0u8; zeros];
            bytes.extend(tail);
            let encoded = encode_base58(&bytes);
            prop_assert!(encoded.chars().take(zeros).all(|c| c == '1'));
            prop_assert_eq!(decode_base58(&encoded).unwrap(), bytes);
        }
    }
}
