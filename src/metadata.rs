// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-folder file-metadata envelope.
//!
//! Each file gets its own freshly-sampled AEAD key `fk`. The file body is encrypted under `fk`;
//! `fk` and the file's name are then sealed together under the epoch key the file was added at
//! (with the file id as associated data), so that a member who only holds a
//! [`DoubleChainsInterval`] spanning that epoch can recover `fk` and decrypt the body without the
//! epoch key ever touching file contents directly.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::crypto::Rng;
use crate::crypto::aead::{self, AEAD_KEY_SIZE, AeadKey, AeadNonce};
use crate::error::CryptoFailure;
use crate::ids::FileId;
use crate::kappa::{DoubleChainsInterval, EpochKey};

/// The `(fk, file_name)` pair, encoded once and sealed under the epoch key.
#[derive(Serialize, Deserialize)]
struct FileKeyAndName {
    #[serde(with = "serde_bytes")]
    fk: AeadKey,
    name: String,
}

/// A single file's metadata entry: the epoch it was added at, and the `fk`-and-name blob sealed
/// under that epoch's key.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct FileRecord {
    epoch: u64,
    envelope_nonce: AeadNonce,
    envelope_ciphertext: Vec<u8>,
}

/// A folder's encrypted file listing.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FolderMetadata {
    files: BTreeMap<FileId, FileRecord>,
}

/// The AEAD-encrypted body of a file, keyed by its own per-file key rather than an epoch key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileCiphertext {
    nonce: AeadNonce,
    ciphertext: Vec<u8>,
}

impl FolderMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Samples a fresh per-file key, encrypts `file_bytes` under it, then seals `(fk, file_name)`
    /// under the key for `epoch`. Returns the file body ciphertext the caller is responsible for
    /// storing (typically with the host's blob storage) alongside the metadata envelope.
    pub fn add_file(
        &mut self,
        file: FileId,
        file_name: &str,
        file_bytes: &[u8],
        epoch: u64,
        epoch_key: &EpochKey,
        rng: &Rng,
    ) -> Result<FileCiphertext, CryptoFailure> {
        let fk: AeadKey = rng.random_array().map_err(|_| CryptoFailure::Malformed)?;

        let body_nonce = aead::random_nonce(rng)?;
        let body_ciphertext = aead::encrypt(&fk, &body_nonce, file_bytes, aad(&file))?;

        let key_and_name = FileKeyAndName {
            fk,
            name: file_name.to_string(),
        };
        let encoded = encode(&key_and_name)?;
        let envelope_nonce = aead::random_nonce(rng)?;
        let envelope_ciphertext =
            aead::encrypt(epoch_key.as_bytes(), &envelope_nonce, &encoded, aad(&file))?;

        self.files.insert(file, FileRecord {
            epoch,
            envelope_nonce,
            envelope_ciphertext,
        });

        Ok(FileCiphertext {
            nonce: body_nonce,
            ciphertext: body_ciphertext,
        })
    }

    pub fn remove_file(&mut self, file: &FileId) -> bool {
        self.files.remove(file).is_some()
    }

    /// Recovers `file`'s name and per-file key using whatever epoch key `interval` can derive for
    /// the epoch it was added at.
    pub fn file_key_and_name(
        &self,
        file: &FileId,
        interval: &DoubleChainsInterval,
    ) -> Result<(AeadKey, String), CryptoFailure> {
        let record = self.files.get(file).ok_or(CryptoFailure::Malformed)?;
        let key = interval.get_key(record.epoch)?;
        let plaintext = aead::decrypt(
            key.as_bytes(),
            &record.envelope_nonce,
            &record.envelope_ciphertext,
            aad(file),
        )?;
        let key_and_name: FileKeyAndName = decode(&plaintext)?;
        Ok((key_and_name.fk, key_and_name.name))
    }

    /// Recovers `file`'s plaintext body, given its stored [`FileCiphertext`].
    pub fn read_file(
        &self,
        file: &FileId,
        ciphertext: &FileCiphertext,
        interval: &DoubleChainsInterval,
    ) -> Result<Vec<u8>, CryptoFailure> {
        let (fk, _name) = self.file_key_and_name(file, interval)?;
        aead::decrypt(&fk, &ciphertext.nonce, &ciphertext.ciphertext, aad(file)).map_err(Into::into)
    }

    /// Attempts to recover every entry's name. A file whose epoch falls outside `interval`'s span
    /// reports its own `CryptoFailure` rather than aborting the whole listing.
    pub fn list_files(
        &self,
        interval: &DoubleChainsInterval,
    ) -> Vec<(FileId, Result<String, CryptoFailure>)> {
        self.files
            .keys()
            .map(|id| {
                let name = self.file_key_and_name(id, interval).map(|(_, name)| name);
                (id.clone(), name)
            })
            .collect()
    }
}

fn aad(file: &FileId) -> &[u8] {
    file.as_str().as_bytes()
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CryptoFailure> {
    let mut out = Vec::new();
    ciborium::into_writer(value, &mut out).map_err(|_| CryptoFailure::Malformed)?;
    Ok(out)
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, CryptoFailure> {
    ciborium::from_reader(bytes).map_err(|_| CryptoFailure::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kappa::Kappa;

    fn rng() -> Rng {
        Rng::from_seed([6; 32])
    }

    #[test]
    fn add_and_read_round_trip() {
        let rng = rng();
        let kappa = Kappa::init(8, &rng).unwrap();
        let key = kappa.get_key(0).unwrap();
        let interval = kappa.get_interval(0, 0).unwrap();

        let mut metadata = FolderMetadata::new();
        let file = FileId::new("report.pdf");
        let body = b"the quarterly numbers";
        let ctxt = metadata
            .add_file(file.clone(), "report.pdf", body, 0, &key, &rng)
            .unwrap();

        let (_, name) = metadata.file_key_and_name(&file, &interval).unwrap();
        assert_eq!(name, "report.pdf");
        assert_eq!(metadata.read_file(&file, &ctxt, &interval).unwrap(), body);
    }

    #[test]
    fn wrong_file_id_as_aad_is_rejected() {
        let rng = rng();
        let kappa = Kappa::init(8, &rng).unwrap();
        let key = kappa.get_key(0).unwrap();
        let interval = kappa.get_interval(0, 0).unwrap();

        let mut metadata = FolderMetadata::new();
        let file = FileId::new("report.pdf");
        let ctxt = metadata
            .add_file(file.clone(), "report.pdf", b"body", 0, &key, &rng)
            .unwrap();

        let other = FileId::new("other.pdf");
        assert!(metadata.file_key_and_name(&other, &interval).is_err());
        assert!(metadata.read_file(&other, &ctxt, &interval).is_err());
    }

    #[test]
    fn listing_reports_out_of_range_entries_without_aborting() {
        let rng = rng();
        let mut kappa = Kappa::init(8, &rng).unwrap();
        let key0 = kappa.get_key(0).unwrap();
        kappa.progress(crate::kappa::BlockKind::None, &rng).unwrap();

        let mut metadata = FolderMetadata::new();
        let ok_file = FileId::new("a.txt");
        metadata
            .add_file(ok_file.clone(), "a.txt", b"hi", 0, &key0, &rng)
            .unwrap();

        // interval that does not cover epoch 0
        let interval = kappa.get_interval(1, 1).unwrap();
        let results = metadata.list_files(&interval);
        assert_eq!(results.len(), 1);
        assert!(results[0].1.is_err());
    }
}
