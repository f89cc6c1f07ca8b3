// SPDX-License-Identifier: MIT OR Apache-2.0

//! The GRaPPA orchestrator: the per-command state machine that drives a folder's dual CGKA groups
//! (member and admin) and KaPPA key progression against a [`crate::server::ServerMiddleware`].
//!
//! Any admin may author a command; whichever admin does so is the sole source of randomness for
//! that command's `Kappa::progress` call (see `exec.rs`). Every other admin only ever merges the
//! chain extension, or overwrites its state wholesale from a distributed `KpState` when the
//! command forced a chain restart a bare extension cannot express (see
//! [`crate::cgka::AuthTag`] and `Command::sends_full_state_to_admins`). Plain members never hold
//! more than a bounded `DoubleChainsInterval`. Any failure that may have left a commit staged or
//! this client's view stale routes through [`ClientState::recover`] rather than improvised
//! cleanup. See `DESIGN.md` for the full rationale.
mod commands;
mod create;
mod exec;
mod guard;
mod join;
mod proc;
mod recover;
mod state;
mod wire;

pub use commands::Command;
pub use create::create_group;
pub use join::join_ctrl;
pub use state::{ClientState, PersistedClientState};
