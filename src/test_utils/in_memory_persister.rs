// SPDX-License-Identifier: MIT OR Apache-2.0

//! An in-memory [`StatePersister`] double: a `Mutex<HashMap<...>>` keyed by `(folder, me)`.
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::ids::{FolderId, UserId};
use crate::persistence::{PersistenceError, StateBlob, StatePersister};

#[derive(Default)]
pub struct InMemoryStatePersister {
    blobs: Mutex<HashMap<(FolderId, UserId), Vec<u8>>>,
}

impl InMemoryStatePersister {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatePersister for InMemoryStatePersister {
    async fn save(&self, folder: &FolderId, me: &UserId, blob: StateBlob) -> Result<(), PersistenceError> {
        let mut blobs = self.blobs.lock().await;
        blobs.insert((folder.clone(), me.clone()), blob.into_bytes());
        Ok(())
    }

    async fn load(&self, folder: &FolderId, me: &UserId) -> Result<Option<StateBlob>, PersistenceError> {
        let blobs = self.blobs.lock().await;
        Ok(blobs
            .get(&(folder.clone(), me.clone()))
            .cloned()
            .map(StateBlob::from_bytes))
    }

    async fn delete(&self, folder: &FolderId, me: &UserId) -> Result<(), PersistenceError> {
        let mut blobs = self.blobs.lock().await;
        blobs.remove(&(folder.clone(), me.clone()));
        Ok(())
    }
}
