// SPDX-License-Identifier: MIT OR Apache-2.0

//! On-disk state persistence: canonical CBOR, framed by a one-byte format tag ahead of the
//! payload so future format changes are detectable without re-parsing.
use std::io::Read;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::ids::{FolderId, UserId};

const FORMAT_TAG_V1: u8 = 1;

/// A CBOR-encoded, format-tagged blob of persisted client state.
#[derive(Clone, Debug)]
pub struct StateBlob(Vec<u8>);

impl StateBlob {
    pub fn encode<T: Serialize>(value: &T) -> Result<Self, PersistenceError> {
        let mut bytes = vec![FORMAT_TAG_V1];
        ciborium::ser::into_writer(value, &mut bytes)?;
        Ok(Self(bytes))
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, PersistenceError> {
        let (tag, payload) = self
            .0
            .split_first()
            .ok_or(PersistenceError::Truncated)?;
        if *tag != FORMAT_TAG_V1 {
            return Err(PersistenceError::UnsupportedFormat(*tag));
        }
        Ok(ciborium::de::from_reader(payload)?)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// The durable store the orchestrator persists a client's state into: created by `createGroup` or
/// `joinCtrl`, overwritten after every successful committed command, and torn down once a client
/// leaves its folder. A host backs this with a file per `(folder, me)` pair, a key-value store, or
/// whatever else satisfies the same atomicity the blob's one-shot `save` implies.
#[async_trait]
pub trait StatePersister: Send + Sync {
    async fn save(&self, folder: &FolderId, me: &UserId, blob: StateBlob) -> Result<(), PersistenceError>;

    async fn load(&self, folder: &FolderId, me: &UserId) -> Result<Option<StateBlob>, PersistenceError>;

    async fn delete(&self, folder: &FolderId, me: &UserId) -> Result<(), PersistenceError>;
}

pub fn decode_from_reader<T: DeserializeOwned, R: Read>(
    mut reader: R,
) -> Result<T, PersistenceError> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(PersistenceError::Io)?;
    StateBlob(bytes).decode()
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("persisted blob is empty")]
    Truncated,

    #[error("unsupported state blob format tag {0}")]
    UnsupportedFormat(u8),

    #[error("failed to read persisted state")]
    Io(#[from] std::io::Error),

    #[error("failed to encode state as cbor")]
    Encode(#[from] ciborium::ser::Error<std::io::Error>),

    #[error("failed to decode state from cbor")]
    Decode(#[from] ciborium::de::Error<std::io::Error>),
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Example {
        folder: String,
        epoch: u64,
    }

    #[test]
    fn round_trip() {
        let value = Example {
            folder: "shared".into(),
            epoch: 7,
        };
        let blob = StateBlob::encode(&value).unwrap();
        let decoded: Example = blob.decode().unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn rejects_unknown_format_tag() {
        let blob = StateBlob::from_bytes(vec![99, 0, 0]);
        let result: Result<Example, _> = blob.decode();
        assert!(matches!(result, Err(PersistenceError::UnsupportedFormat(99))));
    }

    #[test]
    fn rejects_empty_blob() {
        let blob = StateBlob::from_bytes(Vec::new());
        let result: Result<Example, _> = blob.decode();
        assert!(matches!(result, Err(PersistenceError::Truncated)));
    }
}
