// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dual-PRF combiner: merges a forward-chain key and a backward-chain key into a single secret
//! such that either input alone is a valid PRF key for the other (HMAC's dual-PRF property),
//! followed by an HKDF wrapping step that produces the actual combined output.
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use super::prf::{PrfError, prf};

pub const COMBINED_KEY_SIZE: usize = 32;

/// Combines a forward-chain raw key and a backward-chain raw key. The order is part of the wire
/// contract (it is the MAC key/message assignment) and must not be swapped by callers.
pub fn combine(
    forward_key: &[u8],
    backward_key: &[u8],
) -> Result<[u8; COMBINED_KEY_SIZE], CombinerError> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(forward_key)
        .map_err(|_| CombinerError::InvalidKeyLength)?;
    mac.update(backward_key);
    let mac_bytes = mac.finalize().into_bytes();
    Ok(prf(&mac_bytes, b"HMAC-doublePRF")?)
}

#[derive(Debug, Error)]
pub enum CombinerError {
    #[error("invalid key length for hmac")]
    InvalidKeyLength,

    #[error(transparent)]
    Prf(#[from] PrfError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_matters() {
        let k1 = [1u8; 32];
        let k2 = [2u8; 32];
        assert_ne!(combine(&k1, &k2).unwrap(), combine(&k2, &k1).unwrap());
    }

    #[test]
    fn deterministic() {
        let k1 = [9u8; 32];
        let k2 = [3u8; 16];
        assert_eq!(combine(&k1, &k2).unwrap(), combine(&k1, &k2).unwrap());
    }
}
