// SPDX-License-Identifier: MIT OR Apache-2.0

//! An in-memory [`ServerMiddleware`] double: one control log and one application log per folder,
//! each a plain `Vec` guarded by a `tokio::sync::Mutex`. Good enough to exercise the orchestrator
//! end to end; not a delivery service.
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::ids::{FolderId, UserId};
use crate::server::{ApplicationMessage, CtrlMessage, ServerError, ServerMiddleware};

#[derive(Default)]
struct FolderLog {
    ctrl: Vec<Vec<u8>>,
    application: Vec<Vec<u8>>,
}

#[derive(Default)]
pub struct InMemoryServer {
    folders: Mutex<HashMap<FolderId, FolderLog>>,
    key_packages: Mutex<HashMap<UserId, Vec<u8>>>,
}

impl InMemoryServer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServerMiddleware for InMemoryServer {
    async fn create_folder(&self, folder: &FolderId) -> Result<(), ServerError> {
        let mut folders = self.folders.lock().await;
        if folders.contains_key(folder) {
            return Err(ServerError::FolderExists(folder.to_string()));
        }
        folders.insert(folder.clone(), FolderLog::default());
        Ok(())
    }

    async fn submit_ctrl(
        &self,
        folder: &FolderId,
        expected_seq: u64,
        payload: Vec<u8>,
    ) -> Result<u64, ServerError> {
        let mut folders = self.folders.lock().await;
        let log = folders
            .get_mut(folder)
            .ok_or_else(|| ServerError::UnknownFolder(folder.to_string()))?;
        if log.ctrl.len() as u64 != expected_seq {
            return Err(ServerError::Conflict409);
        }
        log.ctrl.push(payload);
        Ok(expected_seq)
    }

    async fn fetch_ctrl(
        &self,
        folder: &FolderId,
        since_seq: u64,
    ) -> Result<Vec<CtrlMessage>, ServerError> {
        let folders = self.folders.lock().await;
        let log = folders
            .get(folder)
            .ok_or_else(|| ServerError::UnknownFolder(folder.to_string()))?;
        Ok(log
            .ctrl
            .iter()
            .enumerate()
            .skip(since_seq as usize)
            .map(|(seq, payload)| CtrlMessage {
                seq: seq as u64,
                payload: payload.clone(),
            })
            .collect())
    }

    async fn submit_application(
        &self,
        folder: &FolderId,
        payload: Vec<u8>,
    ) -> Result<u64, ServerError> {
        let mut folders = self.folders.lock().await;
        let log = folders
            .get_mut(folder)
            .ok_or_else(|| ServerError::UnknownFolder(folder.to_string()))?;
        let seq = log.application.len() as u64;
        log.application.push(payload);
        Ok(seq)
    }

    async fn fetch_application(
        &self,
        folder: &FolderId,
        since_seq: u64,
    ) -> Result<Vec<ApplicationMessage>, ServerError> {
        let folders = self.folders.lock().await;
        let log = folders
            .get(folder)
            .ok_or_else(|| ServerError::UnknownFolder(folder.to_string()))?;
        Ok(log
            .application
            .iter()
            .enumerate()
            .skip(since_seq as usize)
            .map(|(seq, payload)| ApplicationMessage {
                seq: seq as u64,
                payload: payload.clone(),
            })
            .collect())
    }

    async fn ctrl_len(&self, folder: &FolderId) -> Result<u64, ServerError> {
        let folders = self.folders.lock().await;
        let log = folders
            .get(folder)
            .ok_or_else(|| ServerError::UnknownFolder(folder.to_string()))?;
        Ok(log.ctrl.len() as u64)
    }

    async fn send_key_package(&self, uid: &UserId, package: Vec<u8>) -> Result<(), ServerError> {
        let mut key_packages = self.key_packages.lock().await;
        key_packages.insert(uid.clone(), package);
        Ok(())
    }

    async fn fetch_key_package_for_uid_with_folder(
        &self,
        _uid: &UserId,
        target_uid: &UserId,
        _folder: &FolderId,
    ) -> Result<Vec<u8>, ServerError> {
        let mut key_packages = self.key_packages.lock().await;
        key_packages
            .remove(target_uid)
            .ok_or_else(|| ServerError::Transport(format!("no key package for {target_uid}")))
    }

    async fn send_remove_self(&self, _uid: &UserId, folder: &FolderId) -> Result<(), ServerError> {
        let folders = self.folders.lock().await;
        folders
            .get(folder)
            .ok_or_else(|| ServerError::UnknownFolder(folder.to_string()))?;
        Ok(())
    }
}
