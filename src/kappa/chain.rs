// SPDX-License-Identifier: MIT OR Apache-2.0

//! Forward and backward key chains, each a thin wrapper around an [`Sskg`] that maps SSKG
//! positions onto epoch numbers.
use serde::{Deserialize, Serialize};

use crate::crypto::Rng;
use crate::sskg::{NODE_SECRET_SIZE, Sskg, SskgError};

use super::KappaError;

/// A forward chain's `i`-th output is the raw key for epoch `start_epoch + i`. Unlike the
/// backward family, shortening a forward chain's advertised `length` is pure bookkeeping (the
/// epoch-to-position mapping is already stable ascending from `start_epoch`), so it needs no
/// compensating reseek.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForwardChain {
    pub(super) start_epoch: u64,
    pub(super) length: u64,
    sskg: Sskg,
}

impl ForwardChain {
    pub(super) fn new(start_epoch: u64, capacity: u64, rng: &Rng) -> Result<Self, KappaError> {
        let sskg = Sskg::generate(capacity, format!("forward@{start_epoch}"), rng)?;
        Ok(Self {
            start_epoch,
            length: capacity,
            sskg,
        })
    }

    pub(super) fn covers(&self, epoch: u64) -> bool {
        epoch >= self.start_epoch && epoch - self.start_epoch < self.length
    }

    /// Records that this (now-retired) chain only ever served `covered` epochs, so a later
    /// range selection does not mistake its unused tail capacity for the next chain's span.
    pub(super) fn shorten(&mut self, covered: u64) {
        self.length = self.length.min(covered);
    }

    pub(super) fn raw_key_at(&self, epoch: u64) -> Result<[u8; NODE_SECRET_SIZE], KappaError> {
        let offset = epoch
            .checked_sub(self.start_epoch)
            .ok_or(KappaError::EpochOutOfRange)?;
        let positioned = self.sskg.clone().superseek(offset)?;
        Ok(positioned.current_raw_key()?)
    }

    /// Re-anchors this chain at `new_start` (`new_start` must be within the chain's span),
    /// dropping the prefix the recipient already has. Used when slicing a leading chain of an
    /// interval or extension to start exactly at the requested lower bound.
    pub(super) fn advance_start(&mut self, new_start: u64) -> Result<(), KappaError> {
        let offset = new_start
            .checked_sub(self.start_epoch)
            .ok_or(KappaError::EpochOutOfRange)?;
        if offset > 0 {
            self.sskg = self.sskg.clone().superseek(offset)?;
        }
        self.start_epoch = new_start;
        Ok(())
    }
}

/// A backward chain's `j`-th *used* SSKG output (enumerated from SSKG position 0 upward)
/// corresponds to epoch `start_epoch + (length - 1 - j)`: the chain is consumed from the tail,
/// so the oldest epoch it covers needs the deepest derivation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackwardChain {
    pub(super) start_epoch: u64,
    pub(super) length: u64,
    sskg: Sskg,
}

impl BackwardChain {
    pub(super) fn new(start_epoch: u64, capacity: u64, rng: &Rng) -> Result<Self, KappaError> {
        let sskg = Sskg::generate(capacity, format!("backward@{start_epoch}"), rng)?;
        Ok(Self {
            start_epoch,
            length: capacity,
            sskg,
        })
    }

    pub(super) fn covers(&self, epoch: u64) -> bool {
        epoch >= self.start_epoch && epoch - self.start_epoch < self.length
    }

    pub(super) fn raw_key_at(&self, epoch: u64) -> Result<[u8; NODE_SECRET_SIZE], KappaError> {
        let offset = epoch
            .checked_sub(self.start_epoch)
            .ok_or(KappaError::EpochOutOfRange)?;
        if offset >= self.length {
            return Err(KappaError::EpochOutOfRange);
        }
        let idx = self.length - 1 - offset;
        let positioned = self.sskg.clone().superseek(idx)?;
        Ok(positioned.current_raw_key()?)
    }

    /// Shrinks this chain's advertised span to `covered` epochs, compensating the underlying
    /// generator so that already-issued epoch keys within the new span stay reproducible: the
    /// positions that would have served epochs beyond `covered` become permanently unreachable.
    pub(super) fn shorten(&mut self, covered: u64) -> Result<(), KappaError> {
        if covered > self.length {
            return Err(KappaError::EpochOutOfRange);
        }
        let drop = self.length - covered;
        if drop > 0 {
            self.sskg = self.sskg.clone().superseek(drop)?;
        }
        self.length = covered;
        Ok(())
    }
}

impl From<SskgError> for KappaError {
    fn from(err: SskgError) -> Self {
        KappaError::Sskg(err)
    }
}
