// SPDX-License-Identifier: MIT OR Apache-2.0

//! `grappa` implements the client-side core of GRaPPA, an end-to-end encrypted shared-folder
//! protocol. A folder's membership and key material are driven by a CGKA group (the actual
//! MLS-style key-agreement algorithm is supplied by the host application through the [`Cgka`]
//! trait; this crate treats it as an opaque collaborator), while file and metadata confidentiality
//! comes from KaPPA, a double key progression that combines a forward chain (reset whenever
//! membership grows, so new members cannot read a folder's past) and a backward chain (reset
//! whenever a member is removed or a rotation is requested, so a departing member cannot read a
//! folder's future).
//!
//! ## Components
//!
//! - [`sskg`]: the seekable sequential key generator both chain families are built from — a
//!   complete binary tree of PRF outputs with logarithmic state and seek cost.
//! - [`crypto`]: the dual-PRF combiner, AEAD, and PRF primitives KaPPA and the file envelope are
//!   built on, plus the zeroizing [`crypto::Secret`] container and deterministic [`Rng`].
//! - [`kappa`]: the double key progression itself ([`kappa::Kappa`]) and the
//!   [`kappa::DoubleChainsInterval`] slice a member actually carries.
//! - [`cgka`]: the [`Cgka`] trait contract a host's real group key-agreement implementation must
//!   satisfy.
//! - [`server`]: the [`server::ServerMiddleware`] contract for the untrusted delivery service.
//! - [`orchestrator`]: the per-command state machine ([`orchestrator::ClientState`]) tying the
//!   above together into `exec_ctrl`, `proc_ctrl`, `join_ctrl` and `create_group`.
//! - [`metadata`]: the per-folder encrypted file listing.
//! - [`persistence`]: canonical-CBOR, format-tagged (de)serialization for on-disk state.
//!
//! ## Security
//!
//! This crate implements the protocol's cryptographic and state-machine core only. It does not
//! provide metadata privacy from the server beyond opaque blobs, asynchronous delivery ordering
//! beyond per-folder FIFO, resistance to a colluding malicious admin and server, or recovery of
//! file bodies uploaded between a member's removal and the next key rotation. A host application
//! is responsible for the actual CGKA algorithm, transport security, and PKI issuance.
pub mod cgka;
pub mod config;
pub mod crypto;
pub mod error;
pub mod ids;
pub mod kappa;
pub mod metadata;
pub mod orchestrator;
pub mod persistence;
pub mod server;
pub mod sskg;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use cgka::Cgka;
pub use config::Config;
pub use crypto::{Rng, RngError};
pub use error::{GrappaError, Result};
pub use server::ServerMiddleware;
