// SPDX-License-Identifier: MIT OR Apache-2.0

//! KaPPA: double key progression.
//!
//! Every epoch's AEAD key is the dual-PRF combination of a forward-chain output (advances
//! whenever membership changes) and a backward-chain output (advances whenever fresh, rather
//! than ratcheted, randomness is injected). Both families are partitioned into bounded-length
//! chains of at most `max_interval_without_blocks` epochs so that clients joining later only need
//! `O(log(span))` state, not every chain the folder has ever had.
mod chain;
mod interval;

pub use chain::{BackwardChain, ForwardChain};
pub use interval::{DoubleChainsInterval, EpochKey};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::crypto::combiner::CombinerError;
use crate::crypto::prf::PrfError;
use crate::crypto::{Rng, RngError};
use crate::sskg::SskgError;

/// Which chain family (or both) must start a fresh bounded chain for the epoch being progressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    /// No externally-forced reset; a new chain still starts if the current one would exceed its
    /// maximum span.
    None,
    /// Membership changed: a new forward chain must start.
    ForwardBlock,
    /// Fresh randomness was injected: a new backward chain must start.
    BackwardBlock,
    /// Both families must start a new chain (used for the very first epoch).
    FullBlock,
}

impl BlockKind {
    fn forces_forward(self) -> bool {
        matches!(self, BlockKind::ForwardBlock | BlockKind::FullBlock)
    }

    fn forces_backward(self) -> bool {
        matches!(self, BlockKind::BackwardBlock | BlockKind::FullBlock)
    }
}

/// The double key-progression state for a single folder (member or admin group; GRaPPA runs one
/// `Kappa` per group).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Kappa {
    max_interval_without_blocks: u64,
    max_epoch: u64,
    forward_chains: Vec<ForwardChain>,
    backward_chains: Vec<BackwardChain>,
}

impl Kappa {
    /// Initialises a fresh double key progression at epoch 0, starting both chain families.
    pub fn init(max_interval_without_blocks: u64, rng: &Rng) -> Result<Self, KappaError> {
        let mut kappa = Self {
            max_interval_without_blocks,
            max_epoch: 0,
            forward_chains: Vec::new(),
            backward_chains: Vec::new(),
        };
        kappa.progress(BlockKind::FullBlock, rng)?;
        Ok(kappa)
    }

    pub fn max_epoch(&self) -> u64 {
        self.max_epoch
    }

    /// Advances to a new epoch, starting fresh chains where `block` or the `M`-epoch span limit
    /// requires it.
    pub fn progress(&mut self, block: BlockKind, rng: &Rng) -> Result<(), KappaError> {
        let is_first = self.forward_chains.is_empty();
        if !is_first {
            self.max_epoch += 1;
        }
        let epoch = self.max_epoch;

        let needs_forward = is_first
            || block.forces_forward()
            || self
                .forward_chains
                .last()
                .is_none_or(|c| epoch > c.start_epoch + self.max_interval_without_blocks);
        if needs_forward {
            if let Some(last) = self.forward_chains.last_mut() {
                last.shorten(epoch - last.start_epoch);
            }
            debug!(epoch, "starting new forward chain");
            self.forward_chains.push(ForwardChain::new(
                epoch,
                self.max_interval_without_blocks,
                rng,
            )?);
        }

        let needs_backward = is_first
            || block.forces_backward()
            || self
                .backward_chains
                .last()
                .is_none_or(|c| epoch > c.start_epoch + self.max_interval_without_blocks);
        if needs_backward {
            if let Some(last) = self.backward_chains.last_mut() {
                last.shorten(epoch - last.start_epoch)?;
            }
            debug!(epoch, "starting new backward chain");
            self.backward_chains.push(BackwardChain::new(
                epoch,
                self.max_interval_without_blocks,
                rng,
            )?);
        }

        Ok(())
    }

    fn select_forward(&self, l: u64, r: u64) -> Result<Vec<ForwardChain>, KappaError> {
        let start = self
            .forward_chains
            .partition_point(|c| c.start_epoch + c.length <= l);
        let end = self
            .forward_chains
            .partition_point(|c| c.start_epoch <= r);
        if start >= end {
            return Err(KappaError::EpochOutOfRange);
        }
        Ok(self.forward_chains[start..end].to_vec())
    }

    fn select_backward(&self, l: u64, r: u64) -> Result<Vec<BackwardChain>, KappaError> {
        let start = self
            .backward_chains
            .partition_point(|c| c.start_epoch + c.length <= l);
        let end = self
            .backward_chains
            .partition_point(|c| c.start_epoch <= r);
        if start >= end {
            return Err(KappaError::EpochOutOfRange);
        }
        Ok(self.backward_chains[start..end].to_vec())
    }

    /// Produces the chain slice needed to derive every epoch key in `[l, r]`.
    pub fn get_interval(&self, l: u64, r: u64) -> Result<DoubleChainsInterval, KappaError> {
        if l > r || r > self.max_epoch {
            return Err(KappaError::EpochOutOfRange);
        }

        let mut forward = self.select_forward(l, r)?;
        if let Some(first) = forward.first_mut() {
            first.advance_start(l.max(first.start_epoch))?;
        }

        let mut backward = self.select_backward(l, r)?;
        if let Some(last) = backward.last_mut() {
            let covered = (r - last.start_epoch + 1).min(last.length);
            last.shorten(covered)?;
        }

        Ok(DoubleChainsInterval {
            epochs: (l, r),
            forward,
            backward,
        })
    }

    /// Like [`Self::get_interval`] but drops the leading forward chain when `[l, r]` does not
    /// start exactly at a forward-chain boundary, since the recipient already holds that chain
    /// from an earlier extension.
    pub fn create_extension(&self, l: u64, r: u64) -> Result<DoubleChainsInterval, KappaError> {
        let mut interval = self.get_interval(l, r)?;
        let starts_at_boundary = self.forward_chains.iter().any(|c| c.start_epoch == l);
        if !starts_at_boundary && !interval.forward.is_empty() {
            interval.forward.remove(0);
        }
        Ok(interval)
    }

    /// Derives the key for `epoch` against this state's full known range.
    pub fn get_key(&self, epoch: u64) -> Result<EpochKey, KappaError> {
        self.get_interval(0, self.max_epoch)?.get_key(epoch)
    }

    /// Appends a `create_extension` produced by the chain's current authoring admin directly onto
    /// this state's own chains, for an admin who was not the one calling [`Self::progress`] but
    /// still needs the full state (rather than just an interval) kept current. Only valid when
    /// `extension` does not cross a block boundary, i.e. it was not derived from a command that
    /// shortened either chain family (those ship the whole state instead; see
    /// `orchestrator::proc`).
    pub fn merge_extension(&mut self, extension: DoubleChainsInterval) -> Result<(), KappaError> {
        if extension.epochs.0 != self.max_epoch + 1 {
            return Err(KappaError::NonContiguousExtension);
        }

        let drop_shared_backward_tail = matches!(
            (self.backward_chains.last(), extension.backward.first()),
            (Some(last), Some(first)) if last.start_epoch == first.start_epoch
        );
        if drop_shared_backward_tail {
            self.backward_chains.pop();
        }

        self.forward_chains.extend(extension.forward);
        self.backward_chains.extend(extension.backward);
        self.max_epoch = extension.epochs.1;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum KappaError {
    #[error("requested epoch is out of range for this interval or state")]
    EpochOutOfRange,

    #[error("extension does not start immediately after this interval's upper bound")]
    NonContiguousExtension,

    #[error(transparent)]
    Sskg(#[from] SskgError),

    #[error(transparent)]
    Rng(#[from] RngError),

    #[error(transparent)]
    Prf(#[from] PrfError),

    #[error(transparent)]
    Combiner(#[from] CombinerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> Rng {
        Rng::from_seed([5; 32])
    }

    #[test]
    fn init_then_progress_yields_distinct_keys() {
        let rng = rng();
        let mut kappa = Kappa::init(4, &rng).unwrap();
        let k0 = kappa.get_key(0).unwrap();
        kappa.progress(BlockKind::None, &rng).unwrap();
        let k1 = kappa.get_key(1).unwrap();
        assert_ne!(k0.as_bytes(), k1.as_bytes());
        assert_eq!(kappa.get_key(0).unwrap().as_bytes(), k0.as_bytes());
    }

    #[test]
    fn chains_split_after_max_interval() {
        let rng = rng();
        let mut kappa = Kappa::init(2, &rng).unwrap();
        for _ in 0..5 {
            kappa.progress(BlockKind::None, &rng).unwrap();
        }
        assert!(kappa.forward_chains.len() > 1);
        assert!(kappa.backward_chains.len() > 1);
        // every epoch so far must still be derivable
        for e in 0..=kappa.max_epoch() {
            kappa.get_key(e).unwrap();
        }
    }

    #[test]
    fn forward_block_forces_new_chain_without_affecting_backward() {
        let rng = rng();
        let mut kappa = Kappa::init(10, &rng).unwrap();
        kappa.progress(BlockKind::None, &rng).unwrap();
        kappa.progress(BlockKind::ForwardBlock, &rng).unwrap();
        assert_eq!(kappa.forward_chains.len(), 2);
        assert_eq!(kappa.backward_chains.len(), 1);
    }

    #[test]
    fn extension_keys_match_full_state() {
        let rng = rng();
        let mut kappa = Kappa::init(3, &rng).unwrap();
        for _ in 0..6 {
            kappa.progress(BlockKind::None, &rng).unwrap();
        }

        let full = kappa.get_interval(0, kappa.max_epoch()).unwrap();
        let part_a = kappa.create_extension(0, 3).unwrap();
        let part_b = kappa.create_extension(4, kappa.max_epoch()).unwrap();
        let joined = part_a.process_extension(part_b).unwrap();

        for e in 0..=kappa.max_epoch() {
            assert_eq!(
                full.get_key(e).unwrap().as_bytes(),
                joined.get_key(e).unwrap().as_bytes()
            );
        }
    }

    #[test]
    fn extension_drops_known_leading_forward_chain() {
        let rng = rng();
        let mut kappa = Kappa::init(10, &rng).unwrap();
        for _ in 0..4 {
            kappa.progress(BlockKind::None, &rng).unwrap();
        }
        // [0, max_epoch] starts exactly at the single forward chain's boundary (epoch 0), so
        // nothing is dropped.
        let ext = kappa.create_extension(0, kappa.max_epoch()).unwrap();
        assert_eq!(ext.forward.len(), 1);

        // [2, max_epoch] starts mid-chain: the recipient is assumed to already have it.
        let ext_mid = kappa.create_extension(2, kappa.max_epoch()).unwrap();
        assert!(ext_mid.forward.is_empty());
    }
}
