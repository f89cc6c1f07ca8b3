// SPDX-License-Identifier: MIT OR Apache-2.0

//! A deterministic, in-memory [`Cgka`] double. It tracks group membership as a plain `Vec` and
//! encodes commits/welcomes/application messages as CBOR so tests can decode and assert on them
//! directly; it performs no actual key agreement or authentication, so it must never be used
//! outside test code.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cgka::{AuthTag, Cgka, CgkaError, PendingCommit};
use crate::ids::UserId;
use crate::persistence::StateBlob;

#[derive(Clone, Serialize, Deserialize)]
enum MockOp {
    Add(UserId),
    Remove(UserId),
    Update,
}

#[derive(Clone, Serialize, Deserialize)]
struct MockCommit {
    epoch: u64,
    op: MockOp,
    members_after: Vec<UserId>,
}

#[derive(Clone, Serialize, Deserialize)]
struct MockWelcome {
    for_user: UserId,
    epoch: u64,
    members: Vec<UserId>,
}

#[derive(Serialize, Deserialize)]
struct MockAppMsg {
    epoch: u64,
    tag: AuthTag,
    #[serde(with = "serde_bytes")]
    data: Vec<u8>,
}

struct PendingMock {
    epoch: u64,
    members_after: Vec<UserId>,
}

/// A single member's view of a mock group. Two or more instances sharing the same commits (as
/// relayed through a [`super::InMemoryServer`]) simulate a real group's members converging.
pub struct MockCgka {
    me: UserId,
    client_initialized: bool,
    key_package_seq: u64,
    joined: bool,
    epoch: u64,
    members: Vec<UserId>,
    pending: Option<PendingMock>,
}

impl MockCgka {
    pub fn new(me: UserId) -> Self {
        Self {
            me,
            client_initialized: false,
            key_package_seq: 0,
            joined: false,
            epoch: 0,
            members: Vec::new(),
            pending: None,
        }
    }

    fn require_joined(&self) -> Result<(), CgkaError> {
        if self.joined {
            Ok(())
        } else {
            Err(CgkaError::NotWelcomed)
        }
    }

    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CgkaError> {
        StateBlob::encode(value)
            .map(StateBlob::into_bytes)
            .map_err(|err| CgkaError::Adapter(err.to_string()))
    }

    fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, CgkaError> {
        StateBlob::from_bytes(bytes.to_vec())
            .decode()
            .map_err(|err| CgkaError::Adapter(err.to_string()))
    }

    fn stage(&mut self, op: MockOp, members_after: Vec<UserId>) -> Result<MockCommit, CgkaError> {
        self.require_joined()?;
        if self.pending.is_some() {
            return Err(CgkaError::PendingCommitExists);
        }
        let epoch = self.epoch + 1;
        self.pending = Some(PendingMock {
            epoch,
            members_after: members_after.clone(),
        });
        Ok(MockCommit {
            epoch,
            op,
            members_after,
        })
    }
}

#[async_trait]
impl Cgka for MockCgka {
    async fn init_client(&mut self, me: &UserId) -> Result<(), CgkaError> {
        self.me = me.clone();
        self.client_initialized = true;
        Ok(())
    }

    async fn generate_key_package(&mut self) -> Result<Vec<u8>, CgkaError> {
        if !self.client_initialized {
            return Err(CgkaError::Adapter("init_client must run first".into()));
        }
        self.key_package_seq += 1;
        Ok(format!("{}#{}", self.me, self.key_package_seq).into_bytes())
    }

    async fn create_group(&mut self, me: &UserId) -> Result<(), CgkaError> {
        self.joined = true;
        self.epoch = 0;
        self.members = vec![me.clone()];
        Ok(())
    }

    async fn create_add_commit(&mut self, member: &UserId) -> Result<PendingCommit, CgkaError> {
        let mut members_after = self.members.clone();
        members_after.push(member.clone());
        let commit = self.stage(MockOp::Add(member.clone()), members_after.clone())?;
        let welcome = MockWelcome {
            for_user: member.clone(),
            epoch: commit.epoch,
            members: members_after,
        };
        Ok(PendingCommit {
            commit: Self::encode(&commit)?,
            welcome: Some(Self::encode(&welcome)?),
        })
    }

    async fn create_remove_commit(&mut self, member: &UserId) -> Result<PendingCommit, CgkaError> {
        if !self.members.contains(member) {
            return Err(CgkaError::NotAMember(member.to_string()));
        }
        let members_after: Vec<UserId> = self
            .members
            .iter()
            .filter(|m| *m != member)
            .cloned()
            .collect();
        let commit = self.stage(MockOp::Remove(member.clone()), members_after)?;
        Ok(PendingCommit {
            commit: Self::encode(&commit)?,
            welcome: None,
        })
    }

    async fn create_update_commit(&mut self) -> Result<PendingCommit, CgkaError> {
        let members_after = self.members.clone();
        let commit = self.stage(MockOp::Update, members_after)?;
        Ok(PendingCommit {
            commit: Self::encode(&commit)?,
            welcome: None,
        })
    }

    async fn apply_pending_commit(&mut self) -> Result<(), CgkaError> {
        let pending = self.pending.take().ok_or(CgkaError::NoPendingCommit)?;
        self.epoch = pending.epoch;
        self.members = pending.members_after;
        Ok(())
    }

    async fn delete_pending_commit(&mut self) -> Result<(), CgkaError> {
        self.pending.take().ok_or(CgkaError::NoPendingCommit)?;
        Ok(())
    }

    async fn process_incoming(&mut self, commit: &[u8]) -> Result<(), CgkaError> {
        self.require_joined()?;
        let commit: MockCommit = Self::decode(commit)?;
        self.epoch = commit.epoch;
        self.members = commit.members_after;
        Ok(())
    }

    async fn process_welcome(&mut self, welcome: &[u8]) -> Result<(), CgkaError> {
        let welcome: MockWelcome = Self::decode(welcome)?;
        if welcome.for_user != self.me {
            return Err(CgkaError::NotAMember(self.me.to_string()));
        }
        self.joined = true;
        self.epoch = welcome.epoch;
        self.members = welcome.members;
        Ok(())
    }

    async fn prepare_app_msg(&self, data: &[u8], auth_tag: AuthTag) -> Result<Vec<u8>, CgkaError> {
        self.require_joined()?;
        Self::encode(&MockAppMsg {
            epoch: self.epoch,
            tag: auth_tag,
            data: data.to_vec(),
        })
    }

    async fn process_incoming_app_msg(&self, msg: &[u8]) -> Result<(Vec<u8>, AuthTag), CgkaError> {
        self.require_joined()?;
        let msg: MockAppMsg = Self::decode(msg)?;
        if msg.epoch != self.epoch {
            return Err(CgkaError::AuthenticationFailed);
        }
        Ok((msg.data, msg.tag))
    }

    async fn reset(&mut self) -> Result<(), CgkaError> {
        self.joined = false;
        self.epoch = 0;
        self.members.clear();
        self.pending = None;
        Ok(())
    }

    async fn members(&self) -> Result<Vec<UserId>, CgkaError> {
        self.require_joined()?;
        Ok(self.members.clone())
    }
}
