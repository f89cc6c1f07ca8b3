// SPDX-License-Identifier: MIT OR Apache-2.0

//! `create_group`: registers a brand-new folder and bootstraps both of its CGKA groups under a
//! single founding admin, publishing that admin's key packages and persisting the resulting state
//! before handing it back.
use tracing::instrument;

use crate::cgka::Cgka;
use crate::config::Config;
use crate::crypto::Rng;
use crate::error::Result;
use crate::ids::{FolderId, UserId};
use crate::kappa::Kappa;
use crate::persistence::{StateBlob, StatePersister};
use crate::server::ServerMiddleware;

use super::state::ClientState;

/// Creates `folder` on the server and initializes its member and admin groups with `me` as the
/// sole, founding member of each. Persists the resulting state via `persister` before returning.
#[instrument(skip(server, persister, member_cgka, admin_cgka, config, rng), fields(%folder, %me))]
pub async fn create_group(
    folder: FolderId,
    me: UserId,
    mut member_cgka: Box<dyn Cgka>,
    mut admin_cgka: Box<dyn Cgka>,
    config: &Config,
    rng: &Rng,
    server: &dyn ServerMiddleware,
    persister: &dyn StatePersister,
) -> Result<ClientState> {
    server.create_folder(&folder).await?;

    member_cgka.init_client(&me).await?;
    admin_cgka.init_client(&me).await?;
    member_cgka.create_group(&me).await?;
    admin_cgka.create_group(&me).await?;

    let member_package = member_cgka.generate_key_package().await?;
    server.send_key_package(&me, member_package).await?;
    let admin_package = admin_cgka.generate_key_package().await?;
    server.send_key_package(&me, admin_package).await?;

    let kappa = Kappa::init(config.max_interval_without_blocks, rng)?;

    let state = ClientState::Admin {
        folder,
        me,
        member_cgka,
        admin_cgka,
        kappa,
        ctrl_seq: 0,
        app_seq: 0,
        pending_commit: None,
        pending_app_messages: Vec::new(),
    };
    persister
        .save(state.folder(), state.me(), StateBlob::encode(&state.to_persisted())?)
        .await?;
    Ok(state)
}
