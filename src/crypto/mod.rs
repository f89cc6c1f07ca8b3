// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core cryptographic algorithms and random number generator.
//!
//! Algorithms:
//! - SHA256 HKDF (the PRF underlying SSKG node transitions and the KaPPA epoch key)
//! - HMAC-SHA256 (the MAC step of the dual-PRF combiner)
//! - AES-256-GCM (file and metadata AEAD)
//!
//! Random Number Generator:
//! - ChaCha20 stream cipher, seeded via `getrandom`
pub mod aead;
pub mod combiner;
pub mod prf;
mod rng;
mod secret;

pub use rng::{Rng, RngError};
pub use secret::Secret;
