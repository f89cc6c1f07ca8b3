// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-(user, folder) client state GRaPPA drives commands over. An ordinary member only ever
//! receives control messages (`proc_ctrl`); an admin additionally issues them (`exec_ctrl`) and so
//! carries the admin group's own CGKA handle alongside the full `Kappa` state. Both groups share
//! one folder's control and application logs (the server does not distinguish them); envelopes
//! carry their own tags so a recipient knows what it is looking at.
use serde::{Deserialize, Serialize};

use crate::cgka::Cgka;
use crate::error::GrappaError;
use crate::ids::{FolderId, UserId};
use crate::kappa::{BlockKind, DoubleChainsInterval, Kappa};

/// A commit staged but not yet resolved (applied or explicitly deleted) in one or both groups,
/// recorded so a crash between staging and resolution can be diagnosed and reconciled on the
/// next call (see `orchestrator::recover`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(super) struct PendingCommitRecord {
    pub(super) member_staged: bool,
    pub(super) admin_staged: bool,
    pub(super) block: BlockKind,
}

/// The live, in-process GRaPPA client state for one (user, folder) pair. Owns its CGKA handle(s)
/// by value; a host sharing this across tasks holds it behind its own per-(user, folder) mutex.
pub enum ClientState {
    Member {
        folder: FolderId,
        me: UserId,
        member_cgka: Box<dyn Cgka>,
        interval: Option<DoubleChainsInterval>,
        ctrl_seq: u64,
        app_seq: u64,
        pending_commit: Option<PendingCommitRecord>,
        /// Application messages whose control-log commit already landed but which have not yet
        /// been confirmed delivered to the application log (durability window between the two
        /// server writes; replayed by `flush_pending_app_messages` on the next call).
        pending_app_messages: Vec<Vec<u8>>,
        /// Set once this client has removed itself (or been removed) from the folder; the state
        /// retains no further role. A host seeing this should delete its persisted copy.
        removed: bool,
    },
    Admin {
        folder: FolderId,
        me: UserId,
        member_cgka: Box<dyn Cgka>,
        admin_cgka: Box<dyn Cgka>,
        kappa: Kappa,
        ctrl_seq: u64,
        app_seq: u64,
        pending_commit: Option<PendingCommitRecord>,
        pending_app_messages: Vec<Vec<u8>>,
    },
}

impl ClientState {
    pub fn folder(&self) -> &FolderId {
        match self {
            ClientState::Member { folder, .. } | ClientState::Admin { folder, .. } => folder,
        }
    }

    pub fn me(&self) -> &UserId {
        match self {
            ClientState::Member { me, .. } | ClientState::Admin { me, .. } => me,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, ClientState::Admin { .. })
    }

    /// Whether this client has removed itself, or been removed, from the folder. A host seeing
    /// `true` should stop driving commands against this state and delete its persisted copy.
    pub fn is_removed(&self) -> bool {
        matches!(self, ClientState::Member { removed: true, .. })
    }

    pub(super) fn ctrl_seq(&self) -> u64 {
        match self {
            ClientState::Member { ctrl_seq, .. } | ClientState::Admin { ctrl_seq, .. } => {
                *ctrl_seq
            }
        }
    }

    /// The member group's current epoch range this client can derive file keys for, if it has
    /// joined yet.
    pub fn member_interval(&self) -> Result<DoubleChainsInterval, GrappaError> {
        match self {
            ClientState::Member { interval, .. } => interval
                .clone()
                .ok_or(GrappaError::PreconditionViolation(
                    "this client has not joined the member group yet",
                )),
            ClientState::Admin { kappa, .. } => Ok(kappa.get_interval(0, kappa.max_epoch())?),
        }
    }

    pub(super) fn has_pending_commit(&self) -> bool {
        match self {
            ClientState::Member { pending_commit, .. }
            | ClientState::Admin { pending_commit, .. } => pending_commit.is_some(),
        }
    }

    pub(super) fn kappa(&self) -> Result<&Kappa, GrappaError> {
        match self {
            ClientState::Admin { kappa, .. } => Ok(kappa),
            ClientState::Member { .. } => Err(GrappaError::PreconditionViolation(
                "only an admin client holds the full kappa state",
            )),
        }
    }

    pub(super) fn kappa_snapshot(&self) -> Option<Kappa> {
        match self {
            ClientState::Admin { kappa, .. } => Some(kappa.clone()),
            ClientState::Member { .. } => None,
        }
    }

    pub(super) fn restore_kappa(&mut self, snapshot: Kappa) {
        if let ClientState::Admin { kappa, .. } = self {
            *kappa = snapshot;
        }
    }

    pub(super) fn progress_kappa(&mut self, block: BlockKind, rng: &crate::crypto::Rng) -> Result<(), GrappaError> {
        match self {
            ClientState::Admin { kappa, .. } => Ok(kappa.progress(block, rng)?),
            ClientState::Member { .. } => Err(GrappaError::PreconditionViolation(
                "only an admin client progresses the kappa state",
            )),
        }
    }

    pub(super) fn kappa_max_epoch(&self) -> Result<u64, GrappaError> {
        Ok(self.kappa()?.max_epoch())
    }

    pub(super) fn kappa_create_extension(
        &self,
        l: u64,
        r: u64,
    ) -> Result<DoubleChainsInterval, GrappaError> {
        Ok(self.kappa()?.create_extension(l, r)?)
    }

    pub(super) fn kappa_get_interval(&self, l: u64, r: u64) -> Result<DoubleChainsInterval, GrappaError> {
        Ok(self.kappa()?.get_interval(l, r)?)
    }

    pub(super) fn member_cgka_mut(&mut self) -> &mut dyn Cgka {
        match self {
            ClientState::Member { member_cgka, .. } | ClientState::Admin { member_cgka, .. } => {
                member_cgka.as_mut()
            }
        }
    }

    pub(super) fn admin_cgka_mut(&mut self) -> Option<&mut dyn Cgka> {
        match self {
            ClientState::Admin { admin_cgka, .. } => Some(admin_cgka.as_mut()),
            ClientState::Member { .. } => None,
        }
    }

    pub(super) fn take_pending_commit(&mut self) -> Option<PendingCommitRecord> {
        match self {
            ClientState::Member { pending_commit, .. }
            | ClientState::Admin { pending_commit, .. } => pending_commit.take(),
        }
    }

    pub(super) fn set_pending_commit(&mut self, record: Option<PendingCommitRecord>) {
        match self {
            ClientState::Member { pending_commit, .. }
            | ClientState::Admin { pending_commit, .. } => *pending_commit = record,
        }
    }

    pub(super) fn pending_app_messages(&self) -> &[Vec<u8>] {
        match self {
            ClientState::Member {
                pending_app_messages,
                ..
            }
            | ClientState::Admin {
                pending_app_messages,
                ..
            } => pending_app_messages,
        }
    }

    pub(super) fn push_pending_app_message(&mut self, sealed: Vec<u8>) {
        match self {
            ClientState::Member {
                pending_app_messages,
                ..
            }
            | ClientState::Admin {
                pending_app_messages,
                ..
            } => pending_app_messages.push(sealed),
        }
    }

    pub(super) fn clear_pending_app_messages(&mut self) {
        match self {
            ClientState::Member {
                pending_app_messages,
                ..
            }
            | ClientState::Admin {
                pending_app_messages,
                ..
            } => pending_app_messages.clear(),
        }
    }

    pub(super) fn set_ctrl_seq(&mut self, next: u64) {
        match self {
            ClientState::Member { ctrl_seq, .. } | ClientState::Admin { ctrl_seq, .. } => {
                *ctrl_seq = next;
            }
        }
    }

    pub(super) fn app_seq(&self) -> u64 {
        match self {
            ClientState::Member { app_seq, .. } | ClientState::Admin { app_seq, .. } => *app_seq,
        }
    }

    pub(super) fn set_kappa(&mut self, new_kappa: Kappa) {
        if let ClientState::Admin { kappa, .. } = self {
            *kappa = new_kappa;
        }
    }

    pub(super) fn merge_kappa_extension(
        &mut self,
        extension: DoubleChainsInterval,
    ) -> Result<(), GrappaError> {
        if let ClientState::Admin { kappa, .. } = self {
            kappa.merge_extension(extension)?;
        }
        Ok(())
    }

    /// Merges a forward extension into this member's own `DoubleChainsInterval`. A no-op for an
    /// admin, which tracks the full `Kappa` via [`Self::merge_kappa_extension`] instead.
    pub(super) fn merge_member_extension(
        &mut self,
        extension: DoubleChainsInterval,
    ) -> Result<(), GrappaError> {
        if let ClientState::Member { interval, .. } = self {
            *interval = Some(match interval.take() {
                Some(current) => current.process_extension(extension)?,
                None => extension,
            });
        }
        Ok(())
    }

    /// Demotes an admin back to a plain member, dropping its canonical `Kappa` in favor of the
    /// bounded interval a member tracks, and discarding the admin cgka handle (already `reset()`
    /// by the caller). A no-op if this state is already a plain member.
    pub(super) fn demote_to_member(&mut self) {
        let (folder, me, member_cgka, kappa, ctrl_seq, app_seq) =
            match std::mem::replace(self, ClientState::placeholder()) {
                ClientState::Admin {
                    folder,
                    me,
                    member_cgka,
                    kappa,
                    ctrl_seq,
                    app_seq,
                    ..
                } => (folder, me, member_cgka, kappa, ctrl_seq, app_seq),
                other @ ClientState::Member { .. } => {
                    *self = other;
                    return;
                }
            };
        let interval = kappa.get_interval(0, kappa.max_epoch()).ok();
        *self = ClientState::Member {
            folder,
            me,
            member_cgka,
            interval,
            ctrl_seq,
            app_seq,
            pending_commit: None,
            pending_app_messages: Vec::new(),
            removed: false,
        };
    }

    /// Promotes a plain member to admin, attaching the freshly-joined admin cgka handle and the
    /// bootstrapped `Kappa` state. A no-op if this state is already an admin.
    pub(super) fn promote_to_admin(&mut self, admin_cgka: Box<dyn Cgka>, kappa: Kappa) {
        let (folder, me, member_cgka, ctrl_seq, app_seq) =
            match std::mem::replace(self, ClientState::placeholder()) {
                ClientState::Member {
                    folder,
                    me,
                    member_cgka,
                    ctrl_seq,
                    app_seq,
                    ..
                } => (folder, me, member_cgka, ctrl_seq, app_seq),
                other @ ClientState::Admin { .. } => {
                    *self = other;
                    return;
                }
            };
        *self = ClientState::Admin {
            folder,
            me,
            member_cgka,
            admin_cgka,
            kappa,
            ctrl_seq,
            app_seq,
            pending_commit: None,
            pending_app_messages: Vec::new(),
        };
    }

    pub(super) fn bump_app_seq(&mut self, next: u64) {
        match self {
            ClientState::Member { app_seq, .. } | ClientState::Admin { app_seq, .. } => {
                *app_seq = next;
            }
        }
    }

    /// Discards all local state, leaving a client with no role in the folder. Used when this
    /// client removes itself or is removed by an admin.
    pub(super) async fn become_removed(&mut self) -> Result<(), GrappaError> {
        self.member_cgka_mut().reset().await?;
        *self = ClientState::Member {
            folder: self.folder().clone(),
            me: self.me().clone(),
            member_cgka: match std::mem::replace(self, ClientState::placeholder()) {
                ClientState::Member { member_cgka, .. } | ClientState::Admin { member_cgka, .. } => {
                    member_cgka
                }
            },
            interval: None,
            ctrl_seq: 0,
            app_seq: 0,
            pending_commit: None,
            pending_app_messages: Vec::new(),
            removed: true,
        };
        Ok(())
    }

    fn placeholder() -> Self {
        // Never observed: immediately overwritten by `become_removed`. Exists only so
        // `mem::replace` has somewhere to put a value while `self` is being rebuilt in place.
        ClientState::Member {
            folder: FolderId::new(""),
            me: UserId::new(""),
            member_cgka: Box::new(NullCgka),
            interval: None,
            ctrl_seq: 0,
            app_seq: 0,
            pending_commit: None,
            pending_app_messages: Vec::new(),
            removed: true,
        }
    }
}

/// A `Cgka` that never succeeds, used only as a momentarily-held placeholder inside
/// `ClientState::become_removed`'s `mem::replace` dance; it is never retained or called.
struct NullCgka;

#[async_trait::async_trait]
impl Cgka for NullCgka {
    async fn init_client(&mut self, _me: &UserId) -> Result<(), crate::cgka::CgkaError> {
        unreachable!("NullCgka is a transient placeholder")
    }
    async fn generate_key_package(&mut self) -> Result<Vec<u8>, crate::cgka::CgkaError> {
        unreachable!("NullCgka is a transient placeholder")
    }
    async fn create_group(&mut self, _me: &UserId) -> Result<(), crate::cgka::CgkaError> {
        unreachable!("NullCgka is a transient placeholder")
    }
    async fn create_add_commit(
        &mut self,
        _member: &UserId,
    ) -> Result<crate::cgka::PendingCommit, crate::cgka::CgkaError> {
        unreachable!("NullCgka is a transient placeholder")
    }
    async fn create_remove_commit(
        &mut self,
        _member: &UserId,
    ) -> Result<crate::cgka::PendingCommit, crate::cgka::CgkaError> {
        unreachable!("NullCgka is a transient placeholder")
    }
    async fn create_update_commit(&mut self) -> Result<crate::cgka::PendingCommit, crate::cgka::CgkaError> {
        unreachable!("NullCgka is a transient placeholder")
    }
    async fn apply_pending_commit(&mut self) -> Result<(), crate::cgka::CgkaError> {
        unreachable!("NullCgka is a transient placeholder")
    }
    async fn delete_pending_commit(&mut self) -> Result<(), crate::cgka::CgkaError> {
        unreachable!("NullCgka is a transient placeholder")
    }
    async fn process_incoming(&mut self, _commit: &[u8]) -> Result<(), crate::cgka::CgkaError> {
        unreachable!("NullCgka is a transient placeholder")
    }
    async fn process_welcome(&mut self, _welcome: &[u8]) -> Result<(), crate::cgka::CgkaError> {
        unreachable!("NullCgka is a transient placeholder")
    }
    async fn prepare_app_msg(
        &self,
        _data: &[u8],
        _auth_tag: crate::cgka::AuthTag,
    ) -> Result<Vec<u8>, crate::cgka::CgkaError> {
        unreachable!("NullCgka is a transient placeholder")
    }
    async fn process_incoming_app_msg(
        &self,
        _msg: &[u8],
    ) -> Result<(Vec<u8>, crate::cgka::AuthTag), crate::cgka::CgkaError> {
        unreachable!("NullCgka is a transient placeholder")
    }
    async fn reset(&mut self) -> Result<(), crate::cgka::CgkaError> {
        unreachable!("NullCgka is a transient placeholder")
    }
    async fn members(&self) -> Result<Vec<UserId>, crate::cgka::CgkaError> {
        unreachable!("NullCgka is a transient placeholder")
    }
}

/// The durable subset of [`ClientState`]: everything but the live `Box<dyn Cgka>` handles, which
/// stay in memory across a reload (see `orchestrator::recover`) rather than round-tripping
/// through the persisted blob.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum PersistedClientState {
    Member {
        folder: FolderId,
        me: UserId,
        interval: Option<DoubleChainsInterval>,
        ctrl_seq: u64,
        app_seq: u64,
        pending_commit: Option<PendingCommitRecord>,
        pending_app_messages: Vec<Vec<u8>>,
        removed: bool,
    },
    Admin {
        folder: FolderId,
        me: UserId,
        kappa: Kappa,
        ctrl_seq: u64,
        app_seq: u64,
        pending_commit: Option<PendingCommitRecord>,
        pending_app_messages: Vec<Vec<u8>>,
    },
}

impl ClientState {
    pub fn to_persisted(&self) -> PersistedClientState {
        match self {
            ClientState::Member {
                folder,
                me,
                interval,
                ctrl_seq,
                app_seq,
                pending_commit,
                pending_app_messages,
                removed,
                ..
            } => PersistedClientState::Member {
                folder: folder.clone(),
                me: me.clone(),
                interval: interval.clone(),
                ctrl_seq: *ctrl_seq,
                app_seq: *app_seq,
                pending_commit: pending_commit.clone(),
                pending_app_messages: pending_app_messages.clone(),
                removed: *removed,
            },
            ClientState::Admin {
                folder,
                me,
                kappa,
                ctrl_seq,
                app_seq,
                pending_commit,
                pending_app_messages,
                ..
            } => PersistedClientState::Admin {
                folder: folder.clone(),
                me: me.clone(),
                kappa: kappa.clone(),
                ctrl_seq: *ctrl_seq,
                app_seq: *app_seq,
                pending_commit: pending_commit.clone(),
                pending_app_messages: pending_app_messages.clone(),
            },
        }
    }

    /// Overwrites this client's persisted-subset fields from a reloaded blob, leaving the live
    /// CGKA handles untouched. Used by `orchestrator::recover` to reconcile after a crash or a
    /// failed server write; the variant of `persisted` must match `self`'s current variant.
    pub(super) fn overwrite_from_persisted(
        &mut self,
        persisted: PersistedClientState,
    ) -> Result<(), GrappaError> {
        match (self, persisted) {
            (
                ClientState::Member {
                    interval,
                    ctrl_seq,
                    app_seq,
                    pending_commit,
                    pending_app_messages,
                    removed,
                    ..
                },
                PersistedClientState::Member {
                    interval: p_interval,
                    ctrl_seq: p_ctrl_seq,
                    app_seq: p_app_seq,
                    pending_commit: p_pending_commit,
                    pending_app_messages: p_pending_app_messages,
                    removed: p_removed,
                    ..
                },
            ) => {
                *interval = p_interval;
                *ctrl_seq = p_ctrl_seq;
                *app_seq = p_app_seq;
                *pending_commit = p_pending_commit;
                *pending_app_messages = p_pending_app_messages;
                *removed = p_removed;
                Ok(())
            }
            (
                ClientState::Admin {
                    kappa,
                    ctrl_seq,
                    app_seq,
                    pending_commit,
                    pending_app_messages,
                    ..
                },
                PersistedClientState::Admin {
                    kappa: p_kappa,
                    ctrl_seq: p_ctrl_seq,
                    app_seq: p_app_seq,
                    pending_commit: p_pending_commit,
                    pending_app_messages: p_pending_app_messages,
                    ..
                },
            ) => {
                *kappa = p_kappa;
                *ctrl_seq = p_ctrl_seq;
                *app_seq = p_app_seq;
                *pending_commit = p_pending_commit;
                *pending_app_messages = p_pending_app_messages;
                Ok(())
            }
            _ => Err(GrappaError::PreconditionViolation(
                "persisted state's variant no longer matches this client's role",
            )),
        }
    }
}

impl PersistedClientState {
    /// Reunites persisted state with live CGKA handles the host restored from its own durable
    /// store (the full `Kappa` is carried here directly for admins; ordinary members only ever
    /// held a `DoubleChainsInterval`). `admin_cgka` must be `Some` iff this blob is the `Admin`
    /// variant.
    pub fn restore(
        self,
        member_cgka: Box<dyn Cgka>,
        admin_cgka: Option<Box<dyn Cgka>>,
    ) -> Result<ClientState, GrappaError> {
        match (self, admin_cgka) {
            (
                PersistedClientState::Member {
                    folder,
                    me,
                    interval,
                    ctrl_seq,
                    app_seq,
                    pending_commit,
                    pending_app_messages,
                    removed,
                },
                None,
            ) => Ok(ClientState::Member {
                folder,
                me,
                member_cgka,
                interval,
                ctrl_seq,
                app_seq,
                pending_commit,
                pending_app_messages,
                removed,
            }),
            (
                PersistedClientState::Admin {
                    folder,
                    me,
                    kappa,
                    ctrl_seq,
                    app_seq,
                    pending_commit,
                    pending_app_messages,
                },
                Some(admin_cgka),
            ) => Ok(ClientState::Admin {
                folder,
                me,
                member_cgka,
                admin_cgka,
                kappa,
                ctrl_seq,
                app_seq,
                pending_commit,
                pending_app_messages,
            }),
            _ => Err(GrappaError::PreconditionViolation(
                "admin cgka handle presence must match the persisted state's variant",
            )),
        }
    }
}
