// SPDX-License-Identifier: MIT OR Apache-2.0

//! The seven control commands an admin can execute, and the fixed mapping from each to the
//! effect it has on each of the folder's two CGKA groups and on the KaPPA block it forces.
use serde::{Deserialize, Serialize};

use crate::ids::UserId;
use crate::kappa::BlockKind;

/// A control command, always executed by an admin. Every command but `UpdateUser` affects at
/// least one of the folder's two CGKA groups (member, for file access; admin, for control-plane
/// membership); several affect both at once.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Command {
    AddMember(UserId),
    RemoveMember(UserId),
    AddAdmin(UserId),
    RemoveAdmin(UserId),
    UpdateAdmin,
    RotateKeys,
    UpdateUser,
}

/// Which of the folder's two CGKA groups a piece of wire data belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(super) enum Group {
    Member,
    Admin,
}

/// The effect a command has on a single CGKA group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum GroupAction {
    /// This group is untouched by the command.
    None,
    Add(UserId),
    Remove(UserId),
    /// A key-only commit: membership is unchanged.
    Update,
}

impl Command {
    /// The user a command names as its target (the one added to or removed from a group), if
    /// any. `procCtrl` uses this to detect whether an incoming command's target is the local
    /// client itself.
    pub(super) fn target(&self) -> Option<&UserId> {
        match self {
            Command::AddMember(u)
            | Command::RemoveMember(u)
            | Command::AddAdmin(u)
            | Command::RemoveAdmin(u) => Some(u),
            Command::UpdateAdmin | Command::RotateKeys | Command::UpdateUser => None,
        }
    }

    /// The effect on the member group: every command except a pure admin-group add/remove runs a
    /// member-group update-keys commit (or, for `ADD`/`REM`, the membership change itself).
    pub(super) fn member_action(&self) -> GroupAction {
        match self {
            Command::AddMember(u) => GroupAction::Add(u.clone()),
            Command::RemoveMember(u) => GroupAction::Remove(u.clone()),
            Command::AddAdmin(_)
            | Command::RemoveAdmin(_)
            | Command::UpdateAdmin
            | Command::RotateKeys
            | Command::UpdateUser => GroupAction::Update,
        }
    }

    /// The effect on the admin group, if any.
    pub(super) fn admin_action(&self) -> GroupAction {
        match self {
            Command::AddAdmin(u) => GroupAction::Add(u.clone()),
            Command::RemoveAdmin(u) => GroupAction::Remove(u.clone()),
            Command::UpdateAdmin | Command::RotateKeys => GroupAction::Update,
            Command::AddMember(_) | Command::RemoveMember(_) | Command::UpdateUser => {
                GroupAction::None
            }
        }
    }

    /// Adding a member or admin only needs the extension's epoch boundary to keep them from
    /// reading the folder's past; no chain needs to be *forced*, so `None` still lets the
    /// natural `M`-epoch span limit apply on its own. Removing one, or deliberately rotating,
    /// must deny the removed party any future key, so those force a fresh backward chain.
    /// `UpdateUser` progresses no epoch at all, so its block kind is never consulted; see
    /// [`Self::progresses_kappa`].
    pub(super) fn block(&self) -> BlockKind {
        match self {
            Command::AddMember(_) | Command::AddAdmin(_) | Command::UpdateAdmin => BlockKind::None,
            Command::RemoveMember(_) => BlockKind::ForwardBlock,
            Command::RemoveAdmin(_) | Command::RotateKeys => BlockKind::BackwardBlock,
            Command::UpdateUser => BlockKind::None,
        }
    }

    /// Whether this command advances the folder's KaPPA epoch at all. Only `UpdateUser` does
    /// not: it is a member-group key-only commit with no effect on file-key derivation.
    pub(super) fn progresses_kappa(&self) -> bool {
        !matches!(self, Command::UpdateUser)
    }

    /// Whether the full KaPPA state (rather than just a chain extension) must be shipped to
    /// admins who did not author this command: true whenever a chain is force-started, since a
    /// forced restart shortens the previous chain in a way a bare extension cannot replicate.
    pub(super) fn sends_full_state_to_admins(&self) -> bool {
        matches!(self.block(), BlockKind::ForwardBlock | BlockKind::BackwardBlock)
    }

    /// Whether the single application message broadcast to the admin group must carry the
    /// complete `Kappa` rather than a bare extension: true whenever [`Self::sends_full_state_to_admins`]
    /// already requires it, or whenever a brand-new admin is joining with no prior history to
    /// extend from.
    pub(super) fn admin_broadcast_is_full_state(&self) -> bool {
        self.sends_full_state_to_admins() || matches!(self.admin_action(), GroupAction::Add(_))
    }
}
