// SPDX-License-Identifier: MIT OR Apache-2.0

//! `join_ctrl`: a brand-new member has no epoch context to fetch "since", so it scans the
//! folder's control log from the beginning looking for the one welcome addressed to it (a real
//! CGKA's `process_welcome` rejects any welcome not meant for the caller), bootstraps its first
//! `DoubleChainsInterval` from the matching application-log entry, then replays every later
//! member-group envelope exactly as an established member would.
use tracing::{debug, instrument};

use crate::cgka::{AuthTag, Cgka};
use crate::error::{GrappaError, Result};
use crate::ids::{FolderId, UserId};
use crate::persistence::{StateBlob, StatePersister};
use crate::server::{ApplicationMessage, ServerMiddleware};

use super::proc::take_app_message;
use super::commands::Group;
use super::state::ClientState;
use super::wire::ControlEnvelope;

/// Attempts to join `folder`'s member group using a welcome found somewhere in its control log.
/// Returns the resulting `Member` client state, caught up to the log's current end and persisted
/// via `persister`.
#[instrument(skip(server, persister, member_cgka), fields(%folder, %me))]
pub async fn join_ctrl(
    folder: FolderId,
    me: UserId,
    mut member_cgka: Box<dyn Cgka>,
    server: &dyn ServerMiddleware,
    persister: &dyn StatePersister,
) -> Result<ClientState> {
    member_cgka.init_client(&me).await?;
    let messages = server.fetch_ctrl(&folder, 0).await?;
    let mut app_log = server.fetch_application(&folder, 0).await?;

    let mut joined_at: Option<usize> = None;
    let mut interval = None;

    for (idx, message) in messages.iter().enumerate() {
        let envelope: ControlEnvelope = StateBlob::from_bytes(message.payload.clone()).decode()?;
        let Some(welcome) = &envelope.member_welcome else {
            continue;
        };
        if member_cgka.process_welcome(welcome).await.is_ok() {
            let bootstrapped = take_app_message(&mut app_log, Group::Member, member_cgka.as_ref()).await?;
            let Some((data, AuthTag::KpInt | AuthTag::KpExt)) = bootstrapped else {
                return Err(GrappaError::PreconditionViolation(
                    "a member-adding commit must carry a bootstrap interval for the joiner",
                ));
            };
            interval = Some(StateBlob::from_bytes(data).decode()?);
            joined_at = Some(idx);
            debug!(seq = message.seq, "joined member group");
            break;
        }
    }

    let Some(joined_at) = joined_at else {
        return Err(GrappaError::PreconditionViolation(
            "no welcome in this folder's control log was addressed to this client",
        ));
    };

    let member_package = member_cgka.generate_key_package().await?;
    server.send_key_package(&me, member_package).await?;

    let mut state = ClientState::Member {
        folder,
        me,
        member_cgka,
        interval,
        ctrl_seq: messages[joined_at].seq + 1,
        app_seq: 0,
        pending_commit: None,
        pending_app_messages: Vec::new(),
        removed: false,
    };

    for message in &messages[joined_at + 1..] {
        let envelope: ControlEnvelope = StateBlob::from_bytes(message.payload.clone()).decode()?;
        state.apply_join_catchup(envelope, &mut app_log).await?;
        state.mark_synced_to(message.seq + 1);
    }

    persister
        .save(state.folder(), state.me(), StateBlob::encode(&state.to_persisted())?)
        .await?;
    Ok(state)
}

impl ClientState {
    async fn apply_join_catchup(
        &mut self,
        envelope: ControlEnvelope,
        app_log: &mut Vec<ApplicationMessage>,
    ) -> Result<()> {
        if let Some(commit) = &envelope.member_commit {
            self.member_cgka_mut().process_incoming(commit).await?;
        }
        if envelope.command.progresses_kappa() {
            if let Some((data, AuthTag::KpExt)) =
                take_app_message(app_log, Group::Member, self.member_cgka_mut()).await?
            {
                let extension = StateBlob::from_bytes(data).decode()?;
                self.merge_member_extension(extension)?;
            }
        }
        Ok(())
    }

    fn mark_synced_to(&mut self, next: u64) {
        self.set_ctrl_seq(next);
    }
}
