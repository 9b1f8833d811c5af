//! The few ERC-20 calls the builder writes and normalisation recognises

/// `transfer(address,uint256)`
pub const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];
/// `approve(address,uint256)`
pub const APPROVE_SELECTOR: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Erc20Call {
    Transfer { to: [u8; 20], amount: u128 },
    Approve { spender: [u8; 20], amount: u128 },
}

impl Erc20Call {
    pub fn encode(&self) -> Vec<u8> {
        let (selector, address, amount) = match self {
            Erc20Call::Transfer { to, amount } => (TRANSFER_SELECTOR, to, amount),
            Erc20Call::Approve { spender, amount } => (APPROVE_SELECTOR, spender, amount),
        };
        let mut data = Vec::with_capacity(68);
        data.extend_from_slice(&selector);
        data.extend_from_slice(&address_word(address));
        data.extend_from_slice(&uint_word(*amount));
        data
    }

    /// Recognise call data; amounts above `u128::MAX` are not recognised
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() != 68 {
            return None;
        }
        let (selector, args) = data.split_at(4);
        let address = word_to_address(&args[..32])?;
        let amount = word_to_uint(&args[32..])?;
        match selector {
            s if s == TRANSFER_SELECTOR => Some(Erc20Call::Transfer { to: address, amount }),
            s if s == APPROVE_SELECTOR => Some(Erc20Call::Approve {
                spender: address,
                amount,
            }),
            _ => None,
        }
    }
}

fn address_word(address: &[u8; 20]) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address);
    word
}

fn uint_word(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn word_to_address(word: &[u8]) -> Option<[u8; 20]> {
    if word[..12].iter().any(|&b| b != 0) {
        return None;
    }
    word[12..].try_into().ok()
}

fn word_to_uint(word: &[u8]) -> Option<u128> {
    if word[..16].iter().any(|&b| b != 0) {
        return None;
    }
    let mut be = [0u8; 16];
    be.copy_from_slice(&word[16..]);
    Some(u128::from_be_bytes(be))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::keccak256;

    #[test]
    fn test_selectors_match_signatures() {
        assert_eq!(keccak256(b"transfer(address,uint256)")[..4], TRANSFER_SELECTOR);
        assert_eq!(keccak256(b"approve(address,uint256)")[..4], APPROVE_SELECTOR);
    }

    #[test]
    fn test_transfer_layout() {
        let call = Erc20Call::Transfer {
            to: [0x42; 20],
            amount: 1_000_000,
        };
        let data = call.encode();
        assert_eq!(
            hex::encode(&data),
            concat!(
                "a9059cbb",
                "0000000000000000000000004242424242424242424242424242424242424242",
                "00000000000000000000000000000000000000000000000000000000000f4240"
            )
        );
        assert_eq!(Erc20Call::decode(&data), Some(call));
    }

    #[test]
    fn test_unrelated_data_not_recognised() {
        assert_eq!(Erc20Call::decode(&[0xa9, 0x05, 0x9c, 0xbb]), None);
        let mut data = Erc20Call::Approve {
            spender: [1; 20],
            amount: 5,
        }
        .encode();
        data[4] = 1;
        assert_eq!(Erc20Call::decode(&data), None);
    }
}
