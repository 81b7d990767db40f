use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, OptionalExtension, TransactionBehavior, params};

use super::{Progress, ProgressError};
use crate::core::ContentHash;

const LEDGER_SCHEMA_VERSION: u32 = 1;
const BUSY_TIMEOUT_MS: u64 = 5_000;

/// Ledger persisted in a SQLite database, so an interrupted migration can be
/// resumed by a later process.
pub struct SqliteProgress {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteProgress {
    pub fn open(path: &Path) -> Result<Self, ProgressError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            reject_symlink(dir)?;
            std::fs::create_dir_all(dir).map_err(|source| ProgressError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        reject_symlink(path)?;

        let mut conn = open_connection(path)?;
        prepare_schema(&mut conn)?;
        ensure_permissions(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lookup(&self, legacy: &ContentHash) -> Result<Option<ContentHash>, ProgressError> {
        let conn = self.conn.lock().map_err(|_| ProgressError::Poisoned)?;
        let blob: Option<Vec<u8>> = conn
            .query_row(
                "SELECT migrated FROM commits WHERE legacy = ?1",
                params![legacy.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .optional()?;
        blob.map(blob_hash).transpose()
    }
}

impl Progress for SqliteProgress {
    fn has(&self, legacy: &ContentHash) -> Result<bool, ProgressError> {
        Ok(self.lookup(legacy)?.is_some())
    }

    fn get(&self, legacy: &ContentHash) -> Result<ContentHash, ProgressError> {
        self.lookup(legacy)?.ok_or(ProgressError::Missing(*legacy))
    }

    fn put(&self, legacy: ContentHash, migrated: ContentHash) -> Result<(), ProgressError> {
        let mut conn = self.conn.lock().map_err(|_| ProgressError::Poisoned)?;
        let tx = conn.transaction()?;
        let existing: Option<Vec<u8>> = tx
            .query_row(
                "SELECT migrated FROM commits WHERE legacy = ?1",
                params![legacy.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(existing) = existing {
            let existing = blob_hash(existing)?;
            if existing != migrated {
                return Err(ProgressError::Conflict {
                    legacy,
                    existing,
                    new: migrated,
                });
            }
            return Ok(());
        }
        tx.execute(
            "INSERT INTO commits (legacy, migrated) VALUES (?1, ?2)",
            params![legacy.as_bytes().as_slice(), migrated.as_bytes().as_slice()],
        )?;
        tx.commit()?;
        Ok(())
    }
}

/// Creates the ledger tables and version row if absent, then checks the
/// version. Runs under one write lock so concurrent openers of a fresh file
/// observe either nothing or the complete schema.
fn prepare_schema(conn: &mut Connection) -> Result<(), ProgressError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS commits (
            legacy BLOB PRIMARY KEY,
            migrated BLOB NOT NULL
         );
         CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
         );",
    )?;
    tx.execute(
        "INSERT OR IGNORE INTO meta (key, value) VALUES ('schema_version', ?1)",
        params![LEDGER_SCHEMA_VERSION.to_string()],
    )?;
    validate_meta(&tx)?;
    tx.commit()?;
    Ok(())
}

fn validate_meta(conn: &Connection) -> Result<(), ProgressError> {
    let version: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    match version {
        Some(v) if v == LEDGER_SCHEMA_VERSION.to_string() => Ok(()),
        other => Err(ProgressError::SchemaVersionMismatch {
            expected: LEDGER_SCHEMA_VERSION,
            got: other.unwrap_or_else(|| "<missing>".to_string()),
        }),
    }
}

fn open_connection(path: &Path) -> Result<Connection, ProgressError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
    let conn = Connection::open_with_flags(path, flags)?;
    // Set before the pragmas: switching to WAL takes a lock.
    conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "FULL")?;
    Ok(conn)
}

fn ensure_permissions(path: &Path) -> Result<(), ProgressError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(
            |source| ProgressError::Io {
                path: path.to_path_buf(),
                source,
            },
        )?;
    }
    Ok(())
}

fn reject_symlink(path: &Path) -> Result<(), ProgressError> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => Err(ProgressError::Symlink {
            path: path.to_path_buf(),
        }),
        Ok(_) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(ProgressError::Io {
            path: path.to_path_buf(),
            source: err,
        }),
    }
}

fn blob_hash(blob: Vec<u8>) -> Result<ContentHash, ProgressError> {
    let bytes: [u8; 32] = blob
        .try_into()
        .map_err(|_| ProgressError::Decode("hash blob wrong length".to_string()))?;
    Ok(ContentHash::from_bytes(bytes))
}
