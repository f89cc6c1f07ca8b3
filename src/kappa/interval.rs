// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`DoubleChainsInterval`]: the slice of forward and backward chains needed to derive every
//! epoch key in `[l, r]`, and the static operations (`get_key`, `process_extension`) that operate
//! on it without touching the full [`super::Kappa`] state.
use serde::{Deserialize, Serialize};

use crate::crypto::combiner::combine;
use crate::crypto::prf::prf;

use super::KappaError;
use super::chain::{BackwardChain, ForwardChain};

pub const EPOCH_KEY_SIZE: usize = 32;

/// An AEAD key for a single epoch, derived from the combined forward and backward chain outputs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(test, derive(Debug))]
pub struct EpochKey(#[serde(with = "serde_bytes")] [u8; EPOCH_KEY_SIZE]);

impl EpochKey {
    pub fn as_bytes(&self) -> &[u8; EPOCH_KEY_SIZE] {
        &self.0
    }
}

/// The forward- and backward-chain slice covering a contiguous epoch range `[l, r]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DoubleChainsInterval {
    pub(super) epochs: (u64, u64),
    pub(super) forward: Vec<ForwardChain>,
    pub(super) backward: Vec<BackwardChain>,
}

impl DoubleChainsInterval {
    pub fn range(&self) -> (u64, u64) {
        self.epochs
    }

    fn forward_chain_for(&self, epoch: u64) -> Result<&ForwardChain, KappaError> {
        self.forward
            .iter()
            .find(|c| c.covers(epoch))
            .ok_or(KappaError::EpochOutOfRange)
    }

    fn backward_chain_for(&self, epoch: u64) -> Result<&BackwardChain, KappaError> {
        self.backward
            .iter()
            .find(|c| c.covers(epoch))
            .ok_or(KappaError::EpochOutOfRange)
    }

    /// Derives the AEAD key for `epoch`, which must lie within this interval's range.
    pub fn get_key(&self, epoch: u64) -> Result<EpochKey, KappaError> {
        if epoch < self.epochs.0 || epoch > self.epochs.1 {
            return Err(KappaError::EpochOutOfRange);
        }
        let forward_raw = self.forward_chain_for(epoch)?.raw_key_at(epoch)?;
        let backward_raw = self.backward_chain_for(epoch)?.raw_key_at(epoch)?;
        let combined = combine(&forward_raw, &backward_raw)?;
        let epoch_key: [u8; EPOCH_KEY_SIZE] = prf(&combined, b"KAPPA")?;
        Ok(EpochKey(epoch_key))
    }

    /// Merges `self` (covering `[l, m]`) with `extension` (covering `[m+1, r]`), as produced by
    /// `Kappa::process_extension` / an admin's CTRL message for a join.
    pub fn process_extension(mut self, extension: DoubleChainsInterval) -> Result<Self, KappaError> {
        if extension.epochs.0 != self.epochs.1 + 1 {
            return Err(KappaError::NonContiguousExtension);
        }

        let drop_shared_backward_tail = matches!(
            (self.backward.last(), extension.backward.first()),
            (Some(last), Some(first)) if last.start_epoch == first.start_epoch
        );
        if drop_shared_backward_tail {
            self.backward.pop();
        }

        self.forward.extend(extension.forward);
        self.backward.extend(extension.backward);
        self.epochs.1 = extension.epochs.1;
        Ok(self)
    }
}
