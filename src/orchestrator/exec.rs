// SPDX-License-Identifier: MIT OR Apache-2.0

//! `exec_ctrl`: an admin stages whichever CGKA commits a command requires (the member group
//! always gets one; commands touching admin membership or keys get a second, on the admin
//! group), submits them together to the folder's shared control log under optimistic
//! concurrency, and on success applies them locally, advances KaPPA, and broadcasts the
//! resulting chain material. Every staging path is paired with explicit cleanup on failure (see
//! [`PendingCommitGuard`] and [`ClientState::recover`]).
use tracing::{debug, instrument};

use crate::cgka::{AuthTag, Cgka, PendingCommit};
use crate::crypto::Rng;
use crate::error::{GrappaError, Result};
use crate::persistence::{StateBlob, StatePersister};
use crate::server::ServerMiddleware;

use super::commands::{Command, Group, GroupAction};
use super::guard::PendingCommitGuard;
use super::state::{ClientState, PendingCommitRecord};
use super::wire::{ApplicationEnvelope, ControlEnvelope};

impl ClientState {
    /// Executes `command` against the server, advancing this client's own view on success.
    /// Admin-only: a plain member has no control-plane write path.
    #[instrument(skip(self, server, persister, rng), fields(folder = %self.folder()))]
    pub async fn exec_ctrl(
        &mut self,
        command: Command,
        server: &dyn ServerMiddleware,
        persister: &dyn StatePersister,
        rng: &Rng,
    ) -> Result<()> {
        self.flush_pending_app_messages(server).await?;

        if !self.is_admin() {
            return Err(GrappaError::PreconditionViolation(
                "only an admin client may execute control commands",
            ));
        }
        if self.has_pending_commit() {
            return Err(GrappaError::PreconditionViolation(
                "a pending commit is already staged; resolve it before issuing another command",
            ));
        }

        match self.try_exec_ctrl(&command, server, rng).await {
            Ok(()) => {
                persister
                    .save(self.folder(), self.me(), StateBlob::encode(&self.to_persisted())?)
                    .await?;
                Ok(())
            }
            Err(err) => {
                if let Err(recover_err) = self.recover(server, persister).await {
                    return Err(recover_err);
                }
                Err(err)
            }
        }
    }

    async fn try_exec_ctrl(
        &mut self,
        command: &Command,
        server: &dyn ServerMiddleware,
        rng: &Rng,
    ) -> Result<()> {
        let member_action = command.member_action();
        let admin_action = command.admin_action();
        let block = command.block();

        let member_staged = stage_action(self.member_cgka_mut(), &member_action).await?;
        let mut guard = PendingCommitGuard::new("exec_ctrl");

        let admin_staged = match (self.admin_cgka_mut(), &admin_action) {
            (Some(admin_cgka), GroupAction::None) => {
                let _ = admin_cgka;
                None
            }
            (Some(admin_cgka), action) => Some(stage_action(admin_cgka, action).await?),
            (None, GroupAction::None) => None,
            (None, _) => {
                return Err(GrappaError::PreconditionViolation(
                    "command requires an admin-group action but this client holds no admin cgka",
                ));
            }
        };

        self.set_pending_commit(Some(PendingCommitRecord {
            member_staged: true,
            admin_staged: admin_staged.is_some(),
            block,
        }));
        debug!(?member_action, ?admin_action, ?block, "staged commit(s)");

        let kappa_snapshot = self.kappa_snapshot();
        if command.progresses_kappa() {
            self.progress_kappa(block, rng)?;
        }

        let envelope = ControlEnvelope {
            command: command.clone(),
            member_commit: Some(member_staged.commit.clone()),
            member_welcome: member_staged.welcome.clone(),
            admin_commit: admin_staged.as_ref().map(|s| s.commit.clone()),
            admin_welcome: admin_staged.as_ref().and_then(|s| s.welcome.clone()),
        };
        let payload = StateBlob::encode(&envelope)?.into_bytes();
        let expected_seq = self.ctrl_seq();

        let seq = match server.submit_ctrl(self.folder(), expected_seq, payload).await {
            Ok(seq) => seq,
            Err(err) => {
                if let Some(snapshot) = kappa_snapshot {
                    self.restore_kappa(snapshot);
                }
                self.member_cgka_mut().delete_pending_commit().await?;
                if admin_staged.is_some() {
                    if let Some(admin_cgka) = self.admin_cgka_mut() {
                        admin_cgka.delete_pending_commit().await?;
                    }
                }
                self.set_pending_commit(None);
                guard.disarm();
                return Err(err.into());
            }
        };

        self.member_cgka_mut().apply_pending_commit().await?;
        if admin_staged.is_some() {
            if let Some(admin_cgka) = self.admin_cgka_mut() {
                admin_cgka.apply_pending_commit().await?;
            }
        }
        self.set_ctrl_seq(seq + 1);
        self.set_pending_commit(None);
        guard.disarm();

        self.queue_application_messages(command, &member_action, &admin_action)
            .await?;
        self.flush_pending_app_messages(server).await
    }

    async fn queue_application_messages(
        &mut self,
        command: &Command,
        member_action: &GroupAction,
        admin_action: &GroupAction,
    ) -> Result<()> {
        if command.progresses_kappa() {
            let epoch = self.kappa_max_epoch()?;
            let extension_bytes = StateBlob::encode(&self.kappa_create_extension(epoch, epoch)?)?.into_bytes();
            let sealed = self
                .member_cgka_mut()
                .prepare_app_msg(&extension_bytes, AuthTag::KpExt)
                .await?;
            self.push_application_message(Group::Member, sealed)?;

            if let GroupAction::Add(_) = member_action {
                let interval_bytes = StateBlob::encode(&self.kappa_get_interval(epoch, epoch)?)?.into_bytes();
                let sealed = self
                    .member_cgka_mut()
                    .prepare_app_msg(&interval_bytes, AuthTag::KpInt)
                    .await?;
                self.push_application_message(Group::Member, sealed)?;
            }

            let needs_admin_payload =
                *admin_action != GroupAction::None || command.sends_full_state_to_admins();
            if needs_admin_payload {
                let (payload, tag) = if command.admin_broadcast_is_full_state() {
                    (StateBlob::encode(self.kappa()?)?.into_bytes(), AuthTag::KpState)
                } else {
                    (extension_bytes.clone(), AuthTag::KpExt)
                };
                let Some(admin_cgka) = self.admin_cgka_mut() else {
                    return Err(GrappaError::PreconditionViolation(
                        "command requires an admin broadcast but this client holds no admin cgka",
                    ));
                };
                let sealed = admin_cgka.prepare_app_msg(&payload, tag).await?;
                self.push_application_message(Group::Admin, sealed)?;
            }
        }
        Ok(())
    }

    fn push_application_message(&mut self, group: Group, sealed: Vec<u8>) -> Result<()> {
        let envelope = ApplicationEnvelope { group, sealed };
        let bytes = StateBlob::encode(&envelope)?.into_bytes();
        self.push_pending_app_message(bytes);
        Ok(())
    }

    /// Flushes whatever application messages are queued (either just staged, or left over from
    /// an earlier call that crashed between the control and application writes). Cheap no-op
    /// when nothing is queued.
    pub(super) async fn flush_pending_app_messages(&mut self, server: &dyn ServerMiddleware) -> Result<()> {
        let folder = self.folder().clone();
        let queued = self.pending_app_messages().to_vec();
        for message in queued {
            let seq = server.submit_application(&folder, message).await?;
            self.bump_app_seq(seq + 1);
        }
        self.clear_pending_app_messages();
        Ok(())
    }
}

async fn stage_action(cgka: &mut dyn Cgka, action: &GroupAction) -> Result<PendingCommit> {
    Ok(match action {
        GroupAction::Add(user) => cgka.create_add_commit(user).await?,
        GroupAction::Remove(user) => cgka.create_remove_commit(user).await?,
        GroupAction::Update => cgka.create_update_commit().await?,
        GroupAction::None => {
            return Err(GrappaError::PreconditionViolation(
                "no commit to stage for an untouched group",
            ));
        }
    })
}
