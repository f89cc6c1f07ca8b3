// SPDX-License-Identifier: MIT OR Apache-2.0

//! The crate-wide error taxonomy: one variant per failure kind a GRaPPA command can surface,
//! each wrapping the lower-level error that produced it.
use thiserror::Error;

use crate::cgka::CgkaError;
use crate::crypto::aead::AeadError;
use crate::crypto::combiner::CombinerError;
use crate::crypto::prf::PrfError;
use crate::kappa::KappaError;
use crate::persistence::PersistenceError;
use crate::server::ServerError;
use crate::sskg::SskgError;

pub type Result<T> = std::result::Result<T, GrappaError>;

#[derive(Debug, Error)]
pub enum GrappaError {
    #[error("cgka operation failed")]
    Cgka(#[from] CgkaError),

    #[error("server middleware request failed")]
    Server(#[from] ServerError),

    #[error("kappa key progression failed")]
    Kappa(#[from] KappaError),

    #[error("state persistence failed")]
    Persistence(#[from] PersistenceError),

    #[error("aead operation failed")]
    Aead(#[from] AeadError),

    #[error(transparent)]
    Combiner(#[from] CombinerError),

    #[error(transparent)]
    Prf(#[from] PrfError),

    #[error(transparent)]
    Sskg(#[from] SskgError),

    /// A command was issued against a client state that does not satisfy its precondition (e.g.
    /// `joinCtrl` before a welcome has been received, or a member issuing an admin-only command).
    #[error("precondition violated: {0}")]
    PreconditionViolation(&'static str),

    /// The server rejected a write because this client's view of the group is behind; the
    /// orchestrator's recovery path should reconcile via `proc_ctrl` and retry.
    #[error("client state is stale relative to the server")]
    Stale,
}

/// A single file's metadata or body failed to decrypt; reported per-entry by `listFiles` so one
/// inaccessible file does not abort the whole listing.
#[derive(Debug, Error)]
pub enum CryptoFailure {
    #[error(transparent)]
    Aead(#[from] AeadError),

    #[error(transparent)]
    Kappa(#[from] KappaError),

    #[error("metadata envelope could not be decoded")]
    Malformed,
}
