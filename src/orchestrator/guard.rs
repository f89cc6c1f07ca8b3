// SPDX-License-Identifier: MIT OR Apache-2.0

//! A scoped reminder that a staged-but-unresolved CGKA commit needs cleanup. Rust has no async
//! `Drop`, so this cannot itself call `cgka_delete_pending_commit`; every fallible path that
//! stages a commit is responsible for calling that cleanup and then [`PendingCommitGuard::disarm`]
//! before it returns. `Drop` only catches the case where neither happened.
use tracing::error;

pub struct PendingCommitGuard {
    armed: bool,
    context: &'static str,
}

impl PendingCommitGuard {
    pub(super) fn new(context: &'static str) -> Self {
        Self {
            armed: true,
            context,
        }
    }

    /// Marks this guard's commit as resolved (applied, or explicitly deleted). Call on every
    /// path out of the scope it guards, success or failure.
    pub(super) fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingCommitGuard {
    fn drop(&mut self) {
        if self.armed {
            error!(
                context = self.context,
                "pending commit guard dropped while still armed; the staged commit was never \
                 applied or explicitly deleted"
            );
        }
    }
}
