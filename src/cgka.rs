// SPDX-License-Identifier: MIT OR Apache-2.0

//! The CGKA adapter: GRaPPA treats the underlying MLS-style continuous group key agreement as an
//! external, opaque collaborator. This module only defines the contract a host application's real
//! CGKA implementation must satisfy; the algorithm itself (TreeKEM or otherwise) lives outside
//! this crate.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::UserId;

/// Tags the payload kind of an application message, binding it to the CGKA's own authenticated-
/// data channel so a forged or replayed-from-elsewhere blob cannot be mistaken for a different
/// payload kind. Carried alongside (not inside) the data passed to [`Cgka::prepare_app_msg`] /
/// recovered by [`Cgka::process_incoming_app_msg`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthTag {
    /// A KaPPA chain extension addressed to members who already hold a contiguous prefix.
    KpExt,
    /// A single-epoch KaPPA interval addressed to a member who just joined via welcome.
    KpInt,
    /// The complete, serialized KaPPA state, addressed to admins who need the full chains rather
    /// than an extension to merge.
    KpState,
}

/// A pending, not-yet-applied commit together with the wire message a peer needs to process it.
pub struct PendingCommit {
    pub commit: Vec<u8>,
    pub welcome: Option<Vec<u8>>,
}

/// The operations GRaPPA's orchestrator drives on a CGKA group. All state mutation happens
/// in-place on `&mut self`; a pending commit must be explicitly applied or deleted before the
/// next one is created.
#[async_trait]
pub trait Cgka: Send + Sync {
    /// Initialises this client's own identity (leaf key material, credentials) independently of
    /// any particular group. Idempotent: safe to call again after a restart.
    async fn init_client(&mut self, me: &UserId) -> Result<(), CgkaError>;

    /// Produces a fresh, publishable key package for this client, to be handed to the server
    /// middleware so other clients can add this client to a group.
    async fn generate_key_package(&mut self) -> Result<Vec<u8>, CgkaError>;

    /// Creates a brand-new single-member group with `self` as its sole member.
    async fn create_group(&mut self, me: &UserId) -> Result<(), CgkaError>;

    /// Stages (but does not apply) a commit adding `member`, producing a welcome for them.
    async fn create_add_commit(&mut self, member: &UserId) -> Result<PendingCommit, CgkaError>;

    /// Stages a commit removing `member`.
    async fn create_remove_commit(&mut self, member: &UserId) -> Result<PendingCommit, CgkaError>;

    /// Stages a self-update commit (fresh leaf key material, used for rotation and key-only
    /// commands that do not change membership).
    async fn create_update_commit(&mut self) -> Result<PendingCommit, CgkaError>;

    /// Applies this member's own most recently staged pending commit.
    async fn apply_pending_commit(&mut self) -> Result<(), CgkaError>;

    /// Discards this member's own pending commit without applying it, restoring the prior epoch
    /// as current. Called from the RAII cleanup path when a staged commit's server write fails.
    async fn delete_pending_commit(&mut self) -> Result<(), CgkaError>;

    /// Processes a commit authored by another member, advancing the local group epoch.
    async fn process_incoming(&mut self, commit: &[u8]) -> Result<(), CgkaError>;

    /// Processes a welcome, joining a group this member was just added to.
    async fn process_welcome(&mut self, welcome: &[u8]) -> Result<(), CgkaError>;

    /// Seals `data` for delivery as an application message, authenticated under the current
    /// epoch's exporter secret and bound to `auth_tag` so the recipient cannot confuse payload
    /// kinds.
    async fn prepare_app_msg(&self, data: &[u8], auth_tag: AuthTag) -> Result<Vec<u8>, CgkaError>;

    /// Opens an application message produced by [`Self::prepare_app_msg`], returning the payload
    /// and the tag it was sealed under. Fails if the message does not authenticate against this
    /// client's current epoch.
    async fn process_incoming_app_msg(&self, msg: &[u8]) -> Result<(Vec<u8>, AuthTag), CgkaError>;

    /// Discards all local group state for this client, returning it to an uninitialised,
    /// groupless condition. Used when this client has been removed from a group (by itself or by
    /// another member) and must not retain key material for it.
    async fn reset(&mut self) -> Result<(), CgkaError>;

    /// The current member set, in an implementation-defined but stable order.
    async fn members(&self) -> Result<Vec<UserId>, CgkaError>;
}

#[derive(Debug, Error)]
pub enum CgkaError {
    #[error("no pending commit to apply or delete")]
    NoPendingCommit,

    #[error("a pending commit already exists; apply or delete it before staging a new one")]
    PendingCommitExists,

    #[error("{0} is not a member of this group")]
    NotAMember(String),

    #[error("this client has not yet joined the group (no welcome processed)")]
    NotWelcomed,

    #[error("incoming commit conflicts with this client's pending commit")]
    Conflict,

    #[error("application message did not authenticate against the current epoch")]
    AuthenticationFailed,

    #[error("cgka adapter failure: {0}")]
    Adapter(String),
}
