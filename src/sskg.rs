// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seekable sequential key generator.
//!
//! An SSKG derives a fixed-length sequence of outputs from a single seed, arranged as a complete
//! binary tree: every node of the tree (leaf or internal) contributes exactly one output, in
//! pre-order. State is a stack of at most `log2(N)` unexpanded subtree roots, so both `next` and
//! `seek`/`superseek` run in `O(log N)`.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::prf::{PrfError, prf};
use crate::crypto::{Rng, RngError, Secret};

pub const NODE_SECRET_SIZE: usize = 32;

type NodeSecret = Secret<NODE_SECRET_SIZE>;
type Height = u32;

enum Label {
    Seed,
    Key,
    Left,
    Right,
}

impl Label {
    fn as_bytes(&self) -> &'static [u8] {
        match self {
            Label::Seed => b"seed",
            Label::Key => b"key",
            Label::Left => b"left",
            Label::Right => b"right",
        }
    }
}

fn derive(secret: &NodeSecret, label: Label) -> Result<NodeSecret, SskgError> {
    let bytes: [u8; NODE_SECRET_SIZE] = prf(secret.as_bytes(), label.as_bytes())?;
    Ok(Secret::from_bytes(bytes))
}

/// Smallest `h` such that a complete binary tree of height `h` (one output per node, `2^h - 1`
/// outputs total) has capacity for at least `n` outputs.
fn tree_height(n: u64) -> Height {
    let mut h: Height = 0;
    while (1u64 << h) - 1 < n {
        h += 1;
    }
    h
}

/// Total outputs (pre-order node count) of a complete binary tree of the given height.
fn capacity(height: Height) -> u64 {
    (1u64 << height) - 1
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StackEntry {
    secret: NodeSecret,
    height: Height,
}

/// A seekable sequential key generator over exactly `length` outputs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sskg {
    name: String,
    length: u64,
    position: u64,
    stack: Vec<StackEntry>,
}

impl Sskg {
    /// Samples a fresh seed and returns a generator producing exactly `length` outputs.
    pub fn generate(length: u64, name: impl Into<String>, rng: &Rng) -> Result<Self, SskgError> {
        if length == 0 {
            return Err(SskgError::EmptySequence);
        }
        let seed: [u8; NODE_SECRET_SIZE] = rng.random_array()?;
        let root = derive(&Secret::from_bytes(seed), Label::Seed)?;
        let height = tree_height(length);
        Ok(Self {
            name: name.into(),
            length,
            position: 0,
            stack: vec![StackEntry {
                secret: root,
                height,
            }],
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.length
    }

    fn top(&self) -> Result<&StackEntry, SskgError> {
        self.stack.last().ok_or(SskgError::Exhausted)
    }

    /// The current output, i.e. the key at `self.position()`.
    pub fn current_raw_key(&self) -> Result<[u8; NODE_SECRET_SIZE], SskgError> {
        let top = self.top()?;
        Ok(*derive(&top.secret, Label::Key)?.as_bytes())
    }

    /// Advances to the next output in the sequence.
    pub fn next(&mut self) -> Result<(), SskgError> {
        if self.is_exhausted() {
            return Err(SskgError::Exhausted);
        }
        let top = self.stack.pop().ok_or(SskgError::Exhausted)?;
        if top.height > 1 {
            let right = derive(&top.secret, Label::Right)?;
            let left = derive(&top.secret, Label::Left)?;
            self.stack.push(StackEntry {
                secret: right,
                height: top.height - 1,
            });
            self.stack.push(StackEntry {
                secret: left,
                height: top.height - 1,
            });
        }
        self.position += 1;
        Ok(())
    }

    /// Seeks to the `k`-th output (0-indexed). Only valid on a generator that has not yet
    /// produced any output.
    pub fn seek(self, k: u64) -> Result<Self, SskgError> {
        if self.position != 0 || self.stack.len() != 1 {
            return Err(SskgError::AlreadyStarted);
        }
        self.superseek(k)
    }

    /// Seeks forward by `k` outputs from the current position.
    pub fn superseek(mut self, k: u64) -> Result<Self, SskgError> {
        let target = self
            .position
            .checked_add(k)
            .filter(|p| *p < self.length)
            .ok_or(SskgError::OutOfBounds)?;
        let mut remaining = k;
        while remaining > 0 {
            let cap = capacity(self.top()?.height);
            if remaining >= cap {
                self.stack.pop();
                remaining -= cap;
                continue;
            }
            let top = self.stack.pop().expect("checked by top() above");
            remaining -= 1;
            if remaining == 0 {
                self.stack.push(top);
                break;
            }
            let half = capacity(top.height - 1);
            let right = derive(&top.secret, Label::Right)?;
            let left = derive(&top.secret, Label::Left)?;
            if remaining < half {
                self.stack.push(StackEntry {
                    secret: right,
                    height: top.height - 1,
                });
                self.stack.push(StackEntry {
                    secret: left,
                    height: top.height - 1,
                });
            } else {
                remaining -= half;
                self.stack.push(StackEntry {
                    secret: right,
                    height: top.height - 1,
                });
            }
        }
        self.position = target;
        Ok(self)
    }
}

#[derive(Debug, Error)]
pub enum SskgError {
    #[error("sequence length must be at least 1")]
    EmptySequence,

    #[error("generator has already produced its last output")]
    Exhausted,

    #[error("seek target is out of bounds for this generator's length")]
    OutOfBounds,

    #[error("seek is only valid on a generator that has not produced any output yet")]
    AlreadyStarted,

    #[error(transparent)]
    Rng(#[from] RngError),

    #[error(transparent)]
    Prf(#[from] PrfError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> Rng {
        Rng::from_seed([11; 32])
    }

    #[test]
    fn next_matches_superseek_one() {
        let a = Sskg::generate(20, "a", &rng()).unwrap();
        let mut b = a.clone();

        let mut by_next = Vec::new();
        for _ in 0..20 {
            by_next.push(b.current_raw_key().unwrap());
            if b.position() + 1 < b.len() {
                b.next().unwrap();
            } else {
                break;
            }
        }

        let mut c = a;
        let mut by_seek = Vec::new();
        for i in 0..20u64 {
            c = c.superseek(if i == 0 { 0 } else { 1 }).unwrap();
            by_seek.push(c.current_raw_key().unwrap());
        }

        assert_eq!(by_next, by_seek);
    }

    #[test]
    fn seek_matches_next_chain() {
        let seed_gen = Sskg::generate(50, "x", &rng()).unwrap();

        let mut stepped = seed_gen.clone();
        for _ in 0..17 {
            stepped.next().unwrap();
        }
        let expected = stepped.current_raw_key().unwrap();

        let sought = seed_gen.seek(17).unwrap();
        assert_eq!(sought.current_raw_key().unwrap(), expected);
    }

    #[test]
    fn superseek_split_equals_single_jump() {
        let seed_gen = Sskg::generate(50, "x", &rng()).unwrap();

        let direct = seed_gen.clone().seek(30).unwrap();
        let split = seed_gen.seek(11).unwrap().superseek(19).unwrap();

        assert_eq!(
            direct.current_raw_key().unwrap(),
            split.current_raw_key().unwrap()
        );
    }

    #[test]
    fn seek_after_start_rejected() {
        let mut g = Sskg::generate(10, "x", &rng()).unwrap();
        g.next().unwrap();
        assert!(g.seek(3).is_err());
    }

    #[test]
    fn out_of_bounds_seek_rejected() {
        let g = Sskg::generate(10, "x", &rng()).unwrap();
        assert!(g.seek(10).is_err());
    }

    #[test]
    fn distinct_positions_distinct_keys() {
        let g = Sskg::generate(30, "x", &rng()).unwrap();
        let a = g.clone().seek(3).unwrap().current_raw_key().unwrap();
        let b = g.seek(4).unwrap().current_raw_key().unwrap();
        assert_ne!(a, b);
    }
}
