// SPDX-License-Identifier: MIT OR Apache-2.0

//! `proc_ctrl`: catches a client up on control messages authored by someone else. Handles four
//! distinct roles a message can play for the local client: an ordinary key/membership update to
//! merge, a command that removes the local client from the folder entirely, a command that
//! demotes the local client from admin back to plain member, and a command that promotes the
//! local client from plain member to admin. Every other client's envelope is just a commit to
//! replay plus (for commands that progress KaPPA) one or two application-log payloads to absorb.
use tracing::{instrument, warn};

use crate::cgka::{AuthTag, Cgka};
use crate::error::{GrappaError, Result};
use crate::persistence::{StateBlob, StatePersister};
use crate::server::{ApplicationMessage, ServerMiddleware};

use super::commands::{Command, Group};
use super::state::ClientState;
use super::wire::{ApplicationEnvelope, ControlEnvelope};

impl ClientState {
    /// Fetches and applies every control message this client has not yet seen. `new_admin_cgka`
    /// is consumed only if this call promotes the client to admin (an `AddAdmin` naming it as
    /// target); if that happens and `None` was supplied, the call fails so the host can retry
    /// with a freshly constructed handle, mirroring [`super::join_ctrl`]'s contract.
    #[instrument(skip(self, server, persister, new_admin_cgka), fields(folder = %self.folder()))]
    pub async fn proc_ctrl(
        &mut self,
        server: &dyn ServerMiddleware,
        persister: &dyn StatePersister,
        mut new_admin_cgka: Option<Box<dyn Cgka>>,
    ) -> Result<()> {
        self.flush_pending_app_messages(server).await?;

        let folder = self.folder().clone();
        let since_ctrl = self.ctrl_seq();
        let messages = server.fetch_ctrl(&folder, since_ctrl).await?;
        if messages.is_empty() {
            return Ok(());
        }

        let since_app = self.app_seq();
        let mut app_log = server.fetch_application(&folder, since_app).await?;
        let app_high_watermark = app_log.last().map(|m| m.seq + 1).unwrap_or(since_app);

        for message in messages {
            let envelope: ControlEnvelope = StateBlob::from_bytes(message.payload).decode()?;
            if self.apply_envelope(envelope, &mut app_log, server, &mut new_admin_cgka).await? {
                self.set_ctrl_seq(message.seq + 1);
                if self.is_removed() {
                    persister.delete(self.folder(), self.me()).await?;
                    return Ok(());
                }
            } else {
                self.set_ctrl_seq(message.seq + 1);
            }
        }

        self.bump_app_seq(app_high_watermark);
        persister
            .save(self.folder(), self.me(), StateBlob::encode(&self.to_persisted())?)
            .await?;
        Ok(())
    }

    /// Applies one control envelope. Returns `Ok(true)` if the client transitioned role or was
    /// removed (the caller stops advancing past messages it hasn't fully reconciled against, but
    /// in practice we always advance; the flag exists for readability at call sites).
    async fn apply_envelope(
        &mut self,
        envelope: ControlEnvelope,
        app_log: &mut Vec<ApplicationMessage>,
        server: &dyn ServerMiddleware,
        new_admin_cgka: &mut Option<Box<dyn Cgka>>,
    ) -> Result<bool> {
        let command = envelope.command.clone();
        let target_is_me = command.target() == Some(self.me());

        if let Some(commit) = &envelope.member_commit {
            if !(matches!(command, Command::RemoveMember(_)) && target_is_me) {
                self.member_cgka_mut().process_incoming(commit).await?;
            }
        }

        if matches!(command, Command::UpdateUser) {
            return Ok(false);
        }

        if matches!(command, Command::RemoveMember(_)) && target_is_me {
            self.become_removed().await?;
            server.send_remove_self(self.me(), self.folder()).await?;
            return Ok(true);
        }

        if self.is_admin() {
            if let Some(commit) = &envelope.admin_commit {
                if matches!(command, Command::RemoveAdmin(_)) && target_is_me {
                    if let Some(admin_cgka) = self.admin_cgka_mut() {
                        admin_cgka.reset().await?;
                    }
                    self.demote_to_member();
                    return Ok(true);
                }
                if let Some(admin_cgka) = self.admin_cgka_mut() {
                    admin_cgka.process_incoming(commit).await?;
                }
            }

            if command.progresses_kappa() {
                let full_state = command.admin_broadcast_is_full_state();
                let opened = take_app_message(app_log, Group::Admin, self.admin_cgka_mut().ok_or(
                    GrappaError::PreconditionViolation("admin client holds no admin cgka"),
                )?)
                .await?;
                match opened {
                    Some((data, AuthTag::KpState)) if full_state => {
                        let kappa = StateBlob::from_bytes(data).decode()?;
                        self.set_kappa(kappa);
                    }
                    Some((data, AuthTag::KpExt)) if !full_state => {
                        let extension = StateBlob::from_bytes(data).decode()?;
                        self.merge_kappa_extension(extension)?;
                    }
                    Some((_, other)) => {
                        warn!(?other, "admin broadcast carried an unexpected application tag");
                    }
                    None => {
                        warn!("expected admin application message was not yet available");
                    }
                }
                self.republish_admin_key_package(server).await?;
            }
            return Ok(false);
        }

        if matches!(command, Command::AddAdmin(_)) && target_is_me {
            let Some(mut admin_cgka) = new_admin_cgka.take() else {
                return Err(GrappaError::PreconditionViolation(
                    "promotion to admin requires a freshly constructed admin cgka handle",
                ));
            };
            let Some(welcome) = &envelope.admin_welcome else {
                return Err(GrappaError::PreconditionViolation(
                    "an admin-promoting commit must carry a welcome for the joiner",
                ));
            };
            admin_cgka.process_welcome(welcome).await?;
            let opened = take_app_message(app_log, Group::Admin, admin_cgka.as_ref()).await?;
            let Some((data, AuthTag::KpState)) = opened else {
                return Err(GrappaError::PreconditionViolation(
                    "an admin-promoting commit must carry the full kappa state for the joiner",
                ));
            };
            let kappa = StateBlob::from_bytes(data).decode()?;
            self.promote_to_admin(admin_cgka, kappa);
            return Ok(true);
        }

        if command.progresses_kappa() {
            let opened = take_app_message(app_log, Group::Member, self.member_cgka_mut()).await?;
            match opened {
                Some((data, AuthTag::KpExt)) => {
                    let extension = StateBlob::from_bytes(data).decode()?;
                    self.merge_member_extension(extension)?;
                }
                Some((_, other)) => {
                    warn!(?other, "member broadcast carried an unexpected application tag");
                }
                None => {
                    warn!("expected member application message was not yet available");
                }
            }
            self.republish_member_key_package(server).await?;
        }
        Ok(false)
    }

    async fn republish_member_key_package(&mut self, server: &dyn ServerMiddleware) -> Result<()> {
        let me = self.me().clone();
        let package = self.member_cgka_mut().generate_key_package().await?;
        server.send_key_package(&me, package).await?;
        Ok(())
    }

    async fn republish_admin_key_package(&mut self, server: &dyn ServerMiddleware) -> Result<()> {
        let me = self.me().clone();
        let Some(admin_cgka) = self.admin_cgka_mut() else {
            return Ok(());
        };
        let package = admin_cgka.generate_key_package().await?;
        server.send_key_package(&me, package).await?;
        Ok(())
    }
}

/// Scans `app_log` for the first entry tagged for `group` that `cgka` can open, removing and
/// returning it. Entries belonging to another group, or that fail to authenticate against this
/// client's current epoch (meant for a different recipient or a later one), are left in place.
pub(super) async fn take_app_message(
    app_log: &mut Vec<ApplicationMessage>,
    group: Group,
    cgka: &dyn Cgka,
) -> Result<Option<(Vec<u8>, AuthTag)>> {
    for idx in 0..app_log.len() {
        let envelope: ApplicationEnvelope =
            StateBlob::from_bytes(app_log[idx].payload.clone()).decode()?;
        if envelope.group != group {
            continue;
        }
        if let Ok((data, tag)) = cgka.process_incoming_app_msg(&envelope.sealed).await {
            app_log.remove(idx);
            return Ok(Some((data, tag)));
        }
    }
    Ok(None)
}
