// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconciliation after a failed or interrupted command. Every fallible path that stages a CGKA
//! commit routes its failure through [`ClientState::recover`] rather than improvising its own
//! cleanup: discard whatever was left pending on either group, reload the durable subset of this
//! client's state from disk, and replay any control messages it missed in the meantime.
use tracing::warn;

use crate::error::Result;
use crate::persistence::StatePersister;
use crate::server::ServerMiddleware;

use super::state::ClientState;

impl ClientState {
    pub(super) async fn recover(
        &mut self,
        server: &dyn ServerMiddleware,
        persister: &dyn StatePersister,
    ) -> Result<()> {
        if let Some(pending) = self.take_pending_commit() {
            if pending.member_staged {
                self.member_cgka_mut().delete_pending_commit().await?;
            }
            if pending.admin_staged {
                if let Some(admin_cgka) = self.admin_cgka_mut() {
                    admin_cgka.delete_pending_commit().await?;
                }
            }
        }

        let folder = self.folder().clone();
        let me = self.me().clone();
        match persister.load(&folder, &me).await? {
            Some(blob) => {
                let persisted = blob.decode()?;
                if let Err(err) = self.overwrite_from_persisted(persisted) {
                    warn!(%folder, %me, %err, "persisted state no longer matches this client's role during recovery");
                }
            }
            None => {
                warn!(%folder, %me, "no persisted state found during recovery");
            }
        }

        self.proc_ctrl(server, persister, None).await
    }
}
