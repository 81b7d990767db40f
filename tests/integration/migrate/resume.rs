use std::sync::atomic::{AtomicBool, Ordering};

use format_migrate::core::ContentHash;
use format_migrate::legacy::{LegacyCommit, LegacyRoot};
use format_migrate::progress::{Progress, ProgressError};
use format_migrate::store::DestStore;
use format_migrate::{CommitOutcome, MemoryProgress, SqliteProgress};

use crate::fixtures::history::{Rig, root_with, users, users_schema, users_table};

/// Linear history: init, then one commit per step growing `users`.
fn linear_history<P: Progress>(rig: &Rig<P>, steps: i64) -> Vec<LegacyCommit> {
    let mut history = vec![rig.commit(&[], LegacyRoot::empty(), "init")];
    for step in 1..=steps {
        let parent = history[history.len() - 1].hash;
        let root = root_with([("users", users_table(&users_schema(), &users(step * 3)))]);
        history.push(rig.commit(&[parent], root, &format!("step {step}")));
    }
    history
}

fn migrated_hashes<P: Progress>(rig: &Rig<P>, history: &[LegacyCommit]) -> Vec<ContentHash> {
    history
        .iter()
        .map(|commit| rig.progress.get(&commit.hash).unwrap())
        .collect()
}

#[test]
fn interrupted_run_resumes_from_sqlite_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger").join("progress.sqlite");

    let reference = Rig::new(MemoryProgress::new());
    let reference_history = linear_history(&reference, 6);
    let migrator = reference.migrator();
    for commit in &reference_history {
        migrator.migrate_commit(commit).unwrap();
    }

    let first = Rig::new(SqliteProgress::open(&path).unwrap());
    let history = linear_history(&first, 6);
    {
        let migrator = first.migrator();
        for commit in &history[..3] {
            migrator.migrate_commit(commit).unwrap();
        }
    }
    let dest = first.dest.clone();
    let legacy = first.legacy.clone();
    drop(first);

    let resumed = Rig {
        legacy,
        dest,
        progress: SqliteProgress::open(&path).unwrap(),
    };
    let migrator = resumed.migrator();
    let outcomes: Vec<_> = history
        .iter()
        .map(|commit| migrator.migrate_commit(commit).unwrap())
        .collect();
    assert!(
        outcomes[..3]
            .iter()
            .all(|o| matches!(o, CommitOutcome::Skipped { .. }))
    );
    assert!(
        outcomes[3..]
            .iter()
            .all(|o| matches!(o, CommitOutcome::Migrated { .. }))
    );
    assert_eq!(
        migrated_hashes(&resumed, &history),
        migrated_hashes(&reference, &reference_history)
    );
}

/// Ledger whose next `put` fails, as if the process died right after the
/// destination flush.
struct CrashingLedger {
    inner: MemoryProgress,
    crash_next_put: AtomicBool,
}

impl Progress for CrashingLedger {
    fn has(&self, legacy: &ContentHash) -> Result<bool, ProgressError> {
        self.inner.has(legacy)
    }

    fn get(&self, legacy: &ContentHash) -> Result<ContentHash, ProgressError> {
        self.inner.get(legacy)
    }

    fn put(&self, legacy: ContentHash, migrated: ContentHash) -> Result<(), ProgressError> {
        if self.crash_next_put.swap(false, Ordering::SeqCst) {
            return Err(ProgressError::Poisoned);
        }
        self.inner.put(legacy, migrated)
    }
}

#[test]
fn crash_after_flush_remigrates_to_same_commit() {
    let rig = Rig::new(CrashingLedger {
        inner: MemoryProgress::new(),
        crash_next_put: AtomicBool::new(false),
    });
    let history = linear_history(&rig, 2);
    let migrator = rig.migrator();
    migrator.migrate_commit(&history[0]).unwrap();
    migrator.migrate_commit(&history[1]).unwrap();

    rig.progress.crash_next_put.store(true, Ordering::SeqCst);
    assert!(migrator.migrate_commit(&history[2]).is_err());
    assert!(!rig.progress.has(&history[2].hash).unwrap());
    let flushed = rig
        .dest
        .resolve_ref(&migrator.options().flush_ref)
        .unwrap();

    let outcome = migrator.migrate_commit(&history[2]).unwrap();
    assert_eq!(outcome, CommitOutcome::Migrated { migrated: flushed });
    assert_eq!(rig.progress.get(&history[2].hash).unwrap(), flushed);
}
