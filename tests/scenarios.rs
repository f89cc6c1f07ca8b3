// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end scenarios over the in-memory test doubles: create a folder, add and remove members
//! and admins, rotate keys, and check who can and cannot read a file added at each point.
use grappa::config::Config;
use grappa::crypto::Rng;
use grappa::ids::{FileId, FolderId, UserId};
use grappa::metadata::FolderMetadata;
use grappa::orchestrator::{create_group, join_ctrl, Command};
use grappa::persistence::StatePersister;
use grappa::test_utils::{InMemoryServer, InMemoryStatePersister, MockCgka};

fn rng(seed: u8) -> Rng {
    Rng::from_seed([seed; 32])
}

#[tokio::test]
async fn member_added_then_reads_a_file_added_after_joining() {
    let server = InMemoryServer::new();
    let persister = InMemoryStatePersister::new();
    let folder = FolderId::new("shared");
    let alice = UserId::new("alice");
    let bob = UserId::new("bob");
    let config = Config::default();

    let mut admin = create_group(
        folder.clone(),
        alice.clone(),
        Box::new(MockCgka::new(alice.clone())),
        Box::new(MockCgka::new(alice.clone())),
        &config,
        &rng(1),
        &server,
        &persister,
    )
    .await
    .unwrap();

    admin
        .exec_ctrl(Command::AddMember(bob.clone()), &server, &persister, &rng(2))
        .await
        .unwrap();

    let mut bob_state = join_ctrl(
        folder.clone(),
        bob.clone(),
        Box::new(MockCgka::new(bob.clone())),
        &server,
        &persister,
    )
    .await
    .unwrap();

    let mut metadata = FolderMetadata::new();
    let file = FileId::new("notes.txt");
    let admin_interval = admin.member_interval().unwrap();
    let epoch = admin_interval.range().1;
    let key = admin_interval.get_key(epoch).unwrap();
    let body = b"the quarterly numbers";
    let ciphertext = metadata
        .add_file(file.clone(), "notes.txt", body, epoch, &key, &rng(3))
        .unwrap();

    let bob_interval = bob_state.member_interval().unwrap();
    assert_eq!(
        metadata.read_file(&file, &ciphertext, &bob_interval).unwrap(),
        body
    );

    // proc_ctrl is a no-op for bob here: there is nothing new to fetch since joining.
    bob_state.proc_ctrl(&server, &persister, None).await.unwrap();
}

#[tokio::test]
async fn removed_member_cannot_read_a_file_added_after_removal() {
    let server = InMemoryServer::new();
    let persister = InMemoryStatePersister::new();
    let folder = FolderId::new("shared");
    let alice = UserId::new("alice");
    let bob = UserId::new("bob");
    let config = Config::default();

    let mut admin = create_group(
        folder.clone(),
        alice.clone(),
        Box::new(MockCgka::new(alice.clone())),
        Box::new(MockCgka::new(alice.clone())),
        &config,
        &rng(10),
        &server,
        &persister,
    )
    .await
    .unwrap();

    admin
        .exec_ctrl(Command::AddMember(bob.clone()), &server, &persister, &rng(11))
        .await
        .unwrap();
    let bob_state = join_ctrl(
        folder.clone(),
        bob.clone(),
        Box::new(MockCgka::new(bob.clone())),
        &server,
        &persister,
    )
    .await
    .unwrap();
    let bob_interval_before_removal = bob_state.member_interval().unwrap();

    admin
        .exec_ctrl(Command::RemoveMember(bob.clone()), &server, &persister, &rng(12))
        .await
        .unwrap();

    let mut metadata = FolderMetadata::new();
    let file = FileId::new("secret.txt");
    let admin_interval = admin.member_interval().unwrap();
    let epoch = admin_interval.range().1;
    let key = admin_interval.get_key(epoch).unwrap();
    let ciphertext = metadata
        .add_file(file.clone(), "secret.txt", b"after removal", epoch, &key, &rng(13))
        .unwrap();

    // bob never calls proc_ctrl again after being removed; his interval is frozen at the point of
    // his last sync and cannot reach the new epoch.
    assert!(
        metadata
            .read_file(&file, &ciphertext, &bob_interval_before_removal)
            .is_err()
    );
}

#[tokio::test]
async fn self_update_does_not_change_membership() {
    let server = InMemoryServer::new();
    let persister = InMemoryStatePersister::new();
    let folder = FolderId::new("shared");
    let alice = UserId::new("alice");
    let config = Config::default();

    let mut admin = create_group(
        folder.clone(),
        alice.clone(),
        Box::new(MockCgka::new(alice.clone())),
        Box::new(MockCgka::new(alice.clone())),
        &config,
        &rng(20),
        &server,
        &persister,
    )
    .await
    .unwrap();

    let before = admin.member_interval().unwrap().range();
    admin
        .exec_ctrl(Command::UpdateUser, &server, &persister, &rng(21))
        .await
        .unwrap();
    let after = admin.member_interval().unwrap().range();
    // UpdateUser is a member-group key-only commit: it never progresses KaPPA's epoch.
    assert_eq!(after.1, before.1);
}

#[tokio::test]
async fn member_promoted_to_admin_via_add_admin() {
    let server = InMemoryServer::new();
    let persister = InMemoryStatePersister::new();
    let folder = FolderId::new("promotion");
    let alice = UserId::new("alice");
    let bob = UserId::new("bob");
    let config = Config::default();

    let mut admin = create_group(
        folder.clone(),
        alice.clone(),
        Box::new(MockCgka::new(alice.clone())),
        Box::new(MockCgka::new(alice.clone())),
        &config,
        &rng(40),
        &server,
        &persister,
    )
    .await
    .unwrap();

    admin
        .exec_ctrl(Command::AddMember(bob.clone()), &server, &persister, &rng(41))
        .await
        .unwrap();
    let mut bob_state = join_ctrl(
        folder.clone(),
        bob.clone(),
        Box::new(MockCgka::new(bob.clone())),
        &server,
        &persister,
    )
    .await
    .unwrap();
    assert!(!bob_state.is_admin());

    admin
        .exec_ctrl(Command::AddAdmin(bob.clone()), &server, &persister, &rng(42))
        .await
        .unwrap();

    bob_state
        .proc_ctrl(&server, &persister, Some(Box::new(MockCgka::new(bob.clone()))))
        .await
        .unwrap();
    assert!(bob_state.is_admin());
}

#[tokio::test]
async fn admin_demoted_to_member_via_remove_admin() {
    let server = InMemoryServer::new();
    let persister = InMemoryStatePersister::new();
    let folder = FolderId::new("demotion");
    let alice = UserId::new("alice");
    let bob = UserId::new("bob");
    let config = Config::default();

    let mut admin = create_group(
        folder.clone(),
        alice.clone(),
        Box::new(MockCgka::new(alice.clone())),
        Box::new(MockCgka::new(alice.clone())),
        &config,
        &rng(50),
        &server,
        &persister,
    )
    .await
    .unwrap();

    admin
        .exec_ctrl(Command::AddMember(bob.clone()), &server, &persister, &rng(51))
        .await
        .unwrap();
    let mut bob_state = join_ctrl(
        folder.clone(),
        bob.clone(),
        Box::new(MockCgka::new(bob.clone())),
        &server,
        &persister,
    )
    .await
    .unwrap();

    admin
        .exec_ctrl(Command::AddAdmin(bob.clone()), &server, &persister, &rng(52))
        .await
        .unwrap();
    bob_state
        .proc_ctrl(&server, &persister, Some(Box::new(MockCgka::new(bob.clone()))))
        .await
        .unwrap();
    assert!(bob_state.is_admin());

    admin
        .exec_ctrl(Command::RemoveAdmin(bob.clone()), &server, &persister, &rng(53))
        .await
        .unwrap();
    bob_state.proc_ctrl(&server, &persister, None).await.unwrap();
    assert!(!bob_state.is_admin());
}

#[tokio::test]
async fn member_removed_transitions_to_removed_state() {
    let server = InMemoryServer::new();
    let persister = InMemoryStatePersister::new();
    let folder = FolderId::new("removal");
    let alice = UserId::new("alice");
    let bob = UserId::new("bob");
    let config = Config::default();

    let mut admin = create_group(
        folder.clone(),
        alice.clone(),
        Box::new(MockCgka::new(alice.clone())),
        Box::new(MockCgka::new(alice.clone())),
        &config,
        &rng(60),
        &server,
        &persister,
    )
    .await
    .unwrap();

    admin
        .exec_ctrl(Command::AddMember(bob.clone()), &server, &persister, &rng(61))
        .await
        .unwrap();
    let mut bob_state = join_ctrl(
        folder.clone(),
        bob.clone(),
        Box::new(MockCgka::new(bob.clone())),
        &server,
        &persister,
    )
    .await
    .unwrap();

    admin
        .exec_ctrl(Command::RemoveMember(bob.clone()), &server, &persister, &rng(62))
        .await
        .unwrap();
    bob_state.proc_ctrl(&server, &persister, None).await.unwrap();

    assert!(bob_state.is_removed());
    assert!(persister.load(&folder, &bob).await.unwrap().is_none());
}
