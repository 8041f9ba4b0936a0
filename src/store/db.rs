use super::{BugRepository, StoreError};
use crate::models::bug::{BugFilter, BugRecord, BugStatus, Priority, Severity};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const DB_SCHEMA_VERSION: i64 = 2;

const BUG_COLUMNS: &str = "id, title, description, severity, priority, status, reported_by, assigned_to, tags, created_at, updated_at";

pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;

    let mut version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        apply_migration_1(conn)?;
        version = 1;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version < 2 {
        apply_migration_2(conn)?;
        version = 2;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version > DB_SCHEMA_VERSION {
        log::warn!("bug database schema v{version} is newer than supported v{DB_SCHEMA_VERSION}");
    }

    Ok(())
}

fn apply_migration_1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS bugs (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            severity TEXT NOT NULL CHECK(severity IN ('low', 'medium', 'high', 'critical')),
            priority TEXT NOT NULL CHECK(priority IN ('low', 'medium', 'high', 'critical')),
            status TEXT NOT NULL DEFAULT 'open' CHECK(status IN ('open', 'in-progress', 'resolved')),
            reported_by TEXT NOT NULL,
            assigned_to TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            CHECK(updated_at >= created_at)
        );
        ",
    )
}

fn apply_migration_2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_bugs_status ON bugs(status);
        CREATE INDEX IF NOT EXISTS idx_bugs_created_at ON bugs(created_at);
        ",
    )
}

/// SQLite-backed repository. The connection is shared behind a mutex so
/// every call sees a consistent table.
pub struct SqliteBugRepository {
    conn: Mutex<Connection>,
}

impl SqliteBugRepository {
    pub fn open(path: &Path) -> std::result::Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        initialize_schema(&conn)?;
        log::info!("opened bug database at {}", path.display());
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> std::result::Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> std::result::Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl BugRepository for SqliteBugRepository {
    fn list(&self, filter: &BugFilter) -> std::result::Result<Vec<BugRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {BUG_COLUMNS} FROM bugs ORDER BY created_at DESC, id ASC"
        ))?;

        let bugs = stmt
            .query_map([], bug_from_row)?
            .collect::<Result<Vec<_>>>()?;

        Ok(bugs.into_iter().filter(|bug| filter.matches(bug)).collect())
    }

    fn get(&self, id: &str) -> std::result::Result<Option<BugRecord>, StoreError> {
        let conn = self.lock()?;
        let bug = conn
            .query_row(
                &format!("SELECT {BUG_COLUMNS} FROM bugs WHERE id = ?1"),
                params![id],
                bug_from_row,
            )
            .optional()?;
        Ok(bug)
    }

    fn create(&self, record: &BugRecord) -> std::result::Result<(), StoreError> {
        let conn = self.lock()?;
        let tags_json = serde_json::to_string(&record.tags)?;
        let inserted = conn.execute(
            &format!("INSERT INTO bugs ({BUG_COLUMNS}) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)"),
            params![
                &record.id,
                &record.title,
                &record.description,
                record.severity,
                record.priority,
                record.status,
                &record.reported_by,
                record.assigned_to.as_deref(),
                tags_json,
                record.created_at,
                record.updated_at,
            ],
        );

        match inserted {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                Err(StoreError::Duplicate(record.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update(&self, record: &BugRecord) -> std::result::Result<bool, StoreError> {
        let conn = self.lock()?;
        let tags_json = serde_json::to_string(&record.tags)?;
        let changed = conn.execute(
            "UPDATE bugs SET title=?2, description=?3, severity=?4, priority=?5, status=?6, reported_by=?7, assigned_to=?8, tags=?9, updated_at=?10 WHERE id=?1",
            params![
                &record.id,
                &record.title,
                &record.description,
                record.severity,
                record.priority,
                record.status,
                &record.reported_by,
                record.assigned_to.as_deref(),
                tags_json,
                record.updated_at,
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete(&self, id: &str) -> std::result::Result<bool, StoreError> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM bugs WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }
}

fn bug_from_row(row: &Row<'_>) -> Result<BugRecord> {
    let tags_str: String = row.get(8)?;
    let tags: Vec<String> = serde_json::from_str(&tags_str)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;
    Ok(BugRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        severity: row.get(3)?,
        priority: row.get(4)?,
        status: row.get(5)?,
        reported_by: row.get(6)?,
        assigned_to: row.get(7)?,
        tags,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

impl ToSql for Severity {
    fn to_sql(&self) -> Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Severity {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str()?.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for Priority {
    fn to_sql(&self) -> Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Priority {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str()?.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for BugStatus {
    fn to_sql(&self) -> Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for BugStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str()?.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str) -> BugRecord {
        BugRecord {
            id: id.to_string(),
            title: "Crash on empty cart".to_string(),
            description: "Checkout throws when the cart is empty".to_string(),
            severity: Severity::Critical,
            priority: Priority::High,
            status: BugStatus::Open,
            reported_by: "qa@example.com".to_string(),
            assigned_to: Some("dev@example.com".to_string()),
            tags: vec!["checkout".to_string(), "crash".to_string()],
            created_at: 1_700_000_000_000,
            updated_at: 1_700_000_000_000,
        }
    }

    #[test]
    fn schema_initializes_with_expected_version() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        initialize_schema(&conn).expect("schema init");
        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("schema version");
        assert_eq!(version, DB_SCHEMA_VERSION);

        // Re-running is a no-op.
        initialize_schema(&conn).expect("schema re-init");
    }

    #[test]
    fn bug_round_trip_preserves_every_field() {
        let repo = SqliteBugRepository::open_in_memory().expect("repo");
        let bug = sample("bug-1");
        repo.create(&bug).expect("insert");

        let loaded = repo.get("bug-1").expect("read").expect("exists");
        assert_eq!(loaded, bug);
    }

    #[test]
    fn duplicate_insert_is_reported() {
        let repo = SqliteBugRepository::open_in_memory().expect("repo");
        repo.create(&sample("bug-1")).expect("insert");
        let err = repo.create(&sample("bug-1")).expect_err("duplicate");
        assert!(matches!(err, StoreError::Duplicate(id) if id == "bug-1"));
    }

    #[test]
    fn check_constraint_rejects_unknown_status() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        initialize_schema(&conn).expect("schema init");
        let result = conn.execute(
            "INSERT INTO bugs (id, title, description, severity, priority, status, reported_by, created_at, updated_at)
             VALUES ('x', 'title', 'description', 'low', 'low', 'closed', 'qa', 1, 1)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn update_and_delete_touch_only_existing_rows() {
        let repo = SqliteBugRepository::open_in_memory().expect("repo");
        assert!(!repo.update(&sample("missing")).expect("update"));

        repo.create(&sample("bug-1")).expect("insert");
        let mut changed = sample("bug-1");
        changed.status = BugStatus::InProgress;
        changed.assigned_to = None;
        changed.updated_at += 5;
        assert!(repo.update(&changed).expect("update"));
        assert_eq!(repo.get("bug-1").expect("read"), Some(changed));

        assert!(repo.delete("bug-1").expect("delete"));
        assert!(!repo.delete("bug-1").expect("delete again"));
    }

    #[test]
    fn corrupt_tags_fail_the_read() {
        let repo = SqliteBugRepository::open_in_memory().expect("repo");
        repo.create(&sample("bug-1")).expect("insert");
        repo.lock()
            .expect("lock")
            .execute("UPDATE bugs SET tags = '{corrupt' WHERE id = 'bug-1'", [])
            .expect("corrupt tags");

        assert!(matches!(repo.get("bug-1"), Err(StoreError::Sqlite(_))));
        assert!(matches!(repo.list(&BugFilter::default()), Err(StoreError::Sqlite(_))));
    }

    #[test]
    fn file_database_survives_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("state.db");
        {
            let repo = SqliteBugRepository::open(&path).expect("open");
            repo.create(&sample("bug-1")).expect("insert");
        }
        let repo = SqliteBugRepository::open(&path).expect("reopen");
        let listed = repo.list(&BugFilter::default()).expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "bug-1");
    }
}
