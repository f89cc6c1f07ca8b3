// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tunable parameters for a GRaPPA session.
use serde::{Deserialize, Serialize};

/// The default `max_interval_without_blocks`: the number of epochs a KaPPA chain may span before
/// it is forced to start a fresh one even without a membership change or a randomness injection.
pub const DEFAULT_MAX_INTERVAL_WITHOUT_BLOCKS: u64 = 32;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Upper bound on the span of a single KaPPA forward or backward chain, see
    /// [`crate::kappa::Kappa`].
    pub max_interval_without_blocks: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_interval_without_blocks: DEFAULT_MAX_INTERVAL_WITHOUT_BLOCKS,
        }
    }
}
