//! secp256k1 public key recovery
//!
//! Signers hand back a bare 64-byte `r || s`; EVM and Tron wire formats also
//! need the recovery id, which is found by recovering both candidates and
//! comparing against the known sender.

use crate::address::evm::address_from_public_key;
use crate::error::{CodecError, CodecResult};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

/// 20-byte account hash (EVM address, Tron account) of the key that produced
/// `signature` over `prehash`
pub fn recover_address(prehash: &[u8; 32], signature: &[u8], recovery_id: u8) -> CodecResult<[u8; 20]> {
    let signature = Signature::from_slice(signature)
        .map_err(|e| CodecError::Other(format!("malformed secp256k1 signature: {e}")))?;
    let recovery_id = RecoveryId::from_byte(recovery_id)
        .ok_or_else(|| CodecError::Other(format!("invalid recovery id {recovery_id}")))?;
    let key = VerifyingKey::recover_from_prehash(prehash, &signature, recovery_id)
        .map_err(|e| CodecError::Other(format!("public key recovery failed: {e}")))?;
    address_from_public_key(key.to_encoded_point(false).as_bytes())
}

/// Recovery id (0 or 1) under which `signature` recovers to `expected`
pub fn find_recovery_id(prehash: &[u8; 32], signature: &[u8], expected: &[u8; 20]) -> Option<u8> {
    (0u8..2).find(|&id| {
        recover_address(prehash, signature, id)
            .map(|address| address == *expected)
            .unwrap_or(false)
    })
}

#[cfg(test)]
pub(crate) mod test_keys {
    use k256::ecdsa::SigningKey;

    /// Deterministic key for signing in tests
    pub fn signing_key(seed: u8) -> SigningKey {
        let mut secret = [0u8; 32];
        secret[31] = seed.max(1);
        secret[0] = 0x11;
        SigningKey::from_slice(&secret).unwrap()
    }

    /// `r || s` over a 32-byte prehash
    pub fn sign_prehash(key: &SigningKey, prehash: &[u8]) -> Vec<u8> {
        let (signature, _) = key.sign_prehash_recoverable(prehash).unwrap();
        signature.to_bytes().to_vec()
    }

    pub fn address_of(key: &SigningKey) -> [u8; 20] {
        let point = key.verifying_key().to_encoded_point(false);
        crate::address::evm::address_from_public_key(point.as_bytes()).unwrap()
    }

    /// SEC1 compressed public key
    pub fn compressed_public_key(key: &SigningKey) -> Vec<u8> {
        key.verifying_key().to_encoded_point(true).as_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::test_keys::*;
    use super::*;
    use crate::hash::keccak256;

    #[test]
    fn test_recovers_signer() {
        let key = signing_key(7);
        let prehash = keccak256(b"txforge recovery");
        let signature = sign_prehash(&key, &prehash);

        let id = find_recovery_id(&prehash, &signature, &address_of(&key)).unwrap();
        assert_eq!(recover_address(&prehash, &signature, id).unwrap(), address_of(&key));
        assert_ne!(
            recover_address(&prehash, &signature, 1 - id).ok(),
            Some(address_of(&key))
        );
    }

    #[test]
    fn test_other_signer_not_found() {
        let prehash = keccak256(b"txforge recovery");
        let signature = sign_prehash(&signing_key(7), &prehash);
        assert_eq!(find_recovery_id(&prehash, &signature, &address_of(&signing_key(8))), None);
        assert!(recover_address(&prehash, &[0u8; 64], 0).is_err());
    }
}
