// SPDX-License-Identifier: MIT OR Apache-2.0

//! The server middleware contract: an untrusted, honest-but-curious relay that serializes
//! control and application messages per folder into two FIFO logs. It never sees plaintext and
//! never reorders a folder's messages; everything else (trust, decryption, conflict resolution)
//! happens at the clients.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{FolderId, UserId};

/// A control-plane message: a CGKA proposal/commit or its welcome, opaque to the server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CtrlMessage {
    pub seq: u64,
    pub payload: Vec<u8>,
}

/// An application-plane message: an encrypted file operation, opaque to the server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApplicationMessage {
    pub seq: u64,
    pub payload: Vec<u8>,
}

/// The operations a GRaPPA client needs from the delivery service. Every folder has exactly one
/// control log and one application log, each a strictly ordered, append-only sequence.
#[async_trait]
pub trait ServerMiddleware: Send + Sync {
    /// Registers a brand-new, empty folder.
    async fn create_folder(&self, folder: &FolderId) -> Result<(), ServerError>;

    /// Appends `payload` to `folder`'s control log, provided the client's view is still current
    /// (`expected_seq` must equal the log's current length). Returns the assigned sequence
    /// number on success, or `Conflict409` if another client raced ahead.
    async fn submit_ctrl(
        &self,
        folder: &FolderId,
        expected_seq: u64,
        payload: Vec<u8>,
    ) -> Result<u64, ServerError>;

    /// Returns every control message strictly after `since_seq`, in order.
    async fn fetch_ctrl(
        &self,
        folder: &FolderId,
        since_seq: u64,
    ) -> Result<Vec<CtrlMessage>, ServerError>;

    /// Appends `payload` to `folder`'s application log. Application messages do not carry the
    /// same optimistic-concurrency precondition as control messages: ordering among them only
    /// needs to be FIFO, not causally tied to a specific prior epoch.
    async fn submit_application(
        &self,
        folder: &FolderId,
        payload: Vec<u8>,
    ) -> Result<u64, ServerError>;

    /// Returns every application message strictly after `since_seq`, in order.
    async fn fetch_application(
        &self,
        folder: &FolderId,
        since_seq: u64,
    ) -> Result<Vec<ApplicationMessage>, ServerError>;

    /// The control log's current length (the next `expected_seq` a writer must present).
    async fn ctrl_len(&self, folder: &FolderId) -> Result<u64, ServerError>;

    /// Publishes a fresh key package for `uid`, making it available to whoever next adds `uid` to
    /// a group. Overwrites whatever key package `uid` previously published.
    async fn send_key_package(&self, uid: &UserId, package: Vec<u8>) -> Result<(), ServerError>;

    /// Consumes and returns `target_uid`'s currently-published key package, on behalf of `uid`
    /// acting within `folder`. A key package is single-use: once fetched for a given add, it is
    /// no longer available for a second one.
    async fn fetch_key_package_for_uid_with_folder(
        &self,
        uid: &UserId,
        target_uid: &UserId,
        folder: &FolderId,
    ) -> Result<Vec<u8>, ServerError>;

    /// Records that `uid` has voluntarily left `folder`, so no further control or application
    /// writes from `uid` should be expected or relayed to it.
    async fn send_remove_self(&self, uid: &UserId, folder: &FolderId) -> Result<(), ServerError>;
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("folder {0} is unknown to the server")]
    UnknownFolder(String),

    #[error("folder {0} already exists")]
    FolderExists(String),

    #[error("conflict: client's expected sequence number is stale")]
    Conflict409,

    #[error("transport failure: {0}")]
    Transport(String),
}
