use format_migrate::core::WorkingSetMeta;
use format_migrate::legacy::LegacyRoot;
use format_migrate::store::DestStore;
use format_migrate::{ErrorKind, MemoryProgress, RefName, WorkingSet};

use crate::fixtures::history::{Rig, root_with, users, users_schema, users_table};

#[test]
fn dirty_working_set_is_migrated_against_head() {
    let rig = Rig::new(MemoryProgress::new());
    let schema = users_schema();
    let init = rig.commit(&[], LegacyRoot::empty(), "init");
    let head = rig.commit(
        &[init.hash],
        root_with([("users", users_table(&schema, &users(4)))]),
        "head",
    );
    let branch = RefName::branch("main");
    let ws_ref = RefName::working_set("main");
    let ws_meta = WorkingSetMeta {
        name: "fixture".into(),
        email: "fixture@example.com".into(),
        timestamp_ms: 42,
        description: "wip".into(),
    };
    rig.legacy.set_ref(branch.clone(), head.hash).unwrap();
    rig.legacy
        .put_working_set(
            ws_ref.clone(),
            WorkingSet {
                working: root_with([
                    ("users", users_table(&schema, &users(9))),
                    ("scratch", users_table(&schema, &users(1))),
                ]),
                staged: root_with([("users", users_table(&schema, &users(6)))]),
                meta: Some(ws_meta.clone()),
            },
        )
        .unwrap();

    let migrator = rig.migrator();
    migrator.migrate_commit(&init).unwrap();
    let migrated_head = migrator.migrate_commit(&head).unwrap().migrated();
    rig.dest.set_head(&branch, migrated_head).unwrap();

    let ws = migrator.migrate_working_set(&branch, &ws_ref).unwrap();
    assert_eq!(ws.meta, Some(ws_meta));

    let working = rig.dest.read_root_value(&ws.working).unwrap();
    assert_eq!(working.get_table("users").unwrap().rows().len(), 9);
    assert_eq!(working.get_table("scratch").unwrap().rows().len(), 1);
    let staged = rig.dest.read_root_value(&ws.staged).unwrap();
    assert_eq!(staged.get_table("users").unwrap().rows().len(), 6);
    assert!(staged.get_table("scratch").is_none());

    let stored = rig.dest.working_set(&ws_ref).unwrap();
    assert_eq!((stored.working, stored.staged), (ws.working, ws.staged));
}

#[test]
fn unmigrated_branch_head_fails() {
    let rig = Rig::new(MemoryProgress::new());
    let init = rig.commit(&[], LegacyRoot::empty(), "init");
    let branch = RefName::branch("main");
    let ws_ref = RefName::working_set("main");
    rig.legacy.set_ref(branch.clone(), init.hash).unwrap();
    rig.legacy
        .put_working_set(
            ws_ref.clone(),
            WorkingSet {
                working: LegacyRoot::empty(),
                staged: LegacyRoot::empty(),
                meta: None,
            },
        )
        .unwrap();

    let err = rig
        .migrator()
        .migrate_working_set(&branch, &ws_ref)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
}
