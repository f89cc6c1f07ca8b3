// SPDX-License-Identifier: MIT OR Apache-2.0

//! The envelopes carried inside a `CtrlMessage`/`ApplicationMessage` payload. The server only
//! relays opaque bytes, so every field two clients need to agree on travels in here.
use serde::{Deserialize, Serialize};

use super::commands::{Command, Group};

/// A control-log entry: the command being executed, plus whichever commits and welcomes it
/// produced. `AddMember`/`AddAdmin` carry a welcome for their target; commands touching both
/// groups (`AddAdmin`, `RemoveAdmin`, `UpdateAdmin`, `RotateKeys`) carry a commit for each.
#[derive(Clone, Serialize, Deserialize)]
pub(super) struct ControlEnvelope {
    pub(super) command: Command,
    pub(super) member_commit: Option<Vec<u8>>,
    pub(super) member_welcome: Option<Vec<u8>>,
    pub(super) admin_commit: Option<Vec<u8>>,
    pub(super) admin_welcome: Option<Vec<u8>>,
}

/// An application-log entry: a CGKA application message, authenticated and tagged (`KpExt`,
/// `KpInt`, or `KpState`) by `Cgka::prepare_app_msg`, opaque to anyone who cannot open it against
/// the matching group's current epoch. `group` tells a recipient which of its CGKA handles (if
/// any) to try opening it with.
#[derive(Clone, Serialize, Deserialize)]
pub(super) struct ApplicationEnvelope {
    pub(super) group: Group,
    pub(super) sealed: Vec<u8>,
}
