use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use rusqlite_migration::{M, Migrations};
use tracing::debug;

use crate::config::HashtagConfig;
use crate::error::{IndexError, Result, SqliteError};
use crate::store::{SortedSetStore, resolve_window};

/// Sorted sets persisted in a single SQLite database
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and bring its schema up to date.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut conn = Connection::open(&path).map_err(|e| SqliteError::Open {
            path: path.clone(),
            source: e,
        })?;

        // Enable WAL mode for better concurrency
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| SqliteError::Pragma {
                pragma: "journal_mode",
                source: e,
            })?;

        Self::migrate(&mut conn)?;
        debug!(path = %path.display(), "opened sqlite tag store");

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path),
        })
    }

    /// A throwaway database, gone when the store is dropped.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().map_err(|e| SqliteError::Open {
            path: PathBuf::from(":memory:"),
            source: e,
        })?;
        Self::migrate(&mut conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Open the database named by [`HashtagConfig::sqlite_path`], or an
    /// in-memory one when no path is configured.
    pub fn from_config(config: &HashtagConfig) -> Result<Self> {
        match &config.sqlite_path {
            Some(path) => Self::open(path),
            None => Self::open_in_memory(),
        }
    }

    fn migrations() -> Migrations<'static> {
        Migrations::new(vec![M::up(include_str!(
            "sqlite/migrations/001_sorted_sets.sql"
        ))])
    }

    fn migrate(conn: &mut Connection) -> Result<()> {
        Self::migrations()
            .to_latest(conn)
            .map_err(|e| SqliteError::Migration {
                message: e.to_string(),
            })?;
        Ok(())
    }

    /// `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> std::result::Result<T, rusqlite::Error>,
    {
        let mut conn = self.conn.lock().map_err(|_| SqliteError::LockPoisoned)?;
        f(&mut conn).map_err(|e| {
            IndexError::from(SqliteError::Query {
                message: e.to_string(),
            })
        })
    }

    fn window(&self, key: &str, start: i64, stop: i64, descending: bool) -> Result<Vec<String>> {
        let sql = if descending {
            "SELECT member FROM sorted_set WHERE key = ?1
             ORDER BY score DESC, member DESC LIMIT ?2 OFFSET ?3"
        } else {
            "SELECT member FROM sorted_set WHERE key = ?1
             ORDER BY score ASC, member ASC LIMIT ?2 OFFSET ?3"
        };

        self.with_conn(|conn| {
            let len: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sorted_set WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )?;
            let Some(window) = resolve_window(len as usize, start, stop) else {
                return Ok(Vec::new());
            };

            let mut stmt = conn.prepare_cached(sql)?;
            let rows = stmt.query_map(
                params![key, window.len() as i64, window.start as i64],
                |row| row.get::<_, String>(0),
            )?;
            rows.collect()
        })
    }
}

#[async_trait]
impl SortedSetStore for SqliteStore {
    async fn sorted_set_add(&self, key: &str, score: i64, member: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sorted_set (key, member, score) VALUES (?1, ?2, ?3)
                 ON CONFLICT (key, member) DO UPDATE SET score = excluded.score",
                params![key, member, score],
            )?;
            Ok(())
        })
    }

    async fn sorted_sets_add(&self, keys: &[String], score: i64, member: &str) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO sorted_set (key, member, score) VALUES (?1, ?2, ?3)
                     ON CONFLICT (key, member) DO UPDATE SET score = excluded.score",
                )?;
                for key in keys {
                    stmt.execute(params![key, member, score])?;
                }
            }
            tx.commit()
        })
    }

    async fn sorted_set_range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        self.window(key, start, stop, false)
    }

    async fn sorted_set_rev_range(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<String>> {
        self.window(key, start, stop, true)
    }

    async fn sorted_set_card(&self, key: &str) -> Result<u64> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM sorted_set WHERE key = ?1",
                params![key],
                |row| row.get::<_, i64>(0),
            )
        })
        .map(|count| count as u64)
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO set_member (key, member) VALUES (?1, ?2)",
                params![key, member],
            )?;
            Ok(())
        })
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare_cached("SELECT member FROM set_member WHERE key = ?1 ORDER BY member")?;
            let rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;
            rows.collect()
        })
    }
}

impl SqliteStore {
    /// Score of `member` in `key`, if present.
    pub fn score(&self, key: &str, member: &str) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT score FROM sorted_set WHERE key = ?1 AND member = ?2",
                params![key, member],
                |row| row.get(0),
            )
            .optional()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_valid() {
        assert!(SqliteStore::migrations().validate().is_ok());
    }

    #[tokio::test]
    async fn test_from_config_opens_configured_path() {
        assert!(
            SqliteStore::from_config(&HashtagConfig::default())
                .unwrap()
                .path()
                .is_none()
        );

        let path = std::env::temp_dir().join(format!("hashtags-{}.sqlite", std::process::id()));
        let config = HashtagConfig {
            sqlite_path: Some(path.clone()),
            ..Default::default()
        };
        {
            let store = SqliteStore::from_config(&config).unwrap();
            assert_eq!(store.path(), Some(path.as_path()));
            store.sorted_set_add("k", 1, "a").await.unwrap();
        }
        let reopened = SqliteStore::from_config(&config).unwrap();
        assert_eq!(reopened.sorted_set_range("k", 0, -1).await.unwrap(), ["a"]);

        drop(reopened);
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }

    #[tokio::test]
    async fn test_range_and_rev_range() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.sorted_set_add("k", 3, "a").await.unwrap();
        store.sorted_set_add("k", 1, "b").await.unwrap();
        store.sorted_set_add("k", 2, "c").await.unwrap();

        assert_eq!(store.sorted_set_range("k", 0, -1).await.unwrap(), ["b", "c", "a"]);
        assert_eq!(store.sorted_set_rev_range("k", 0, 1).await.unwrap(), ["a", "c"]);
        assert_eq!(store.sorted_set_rev_range("k", -1, -1).await.unwrap(), ["b"]);
        assert!(store.sorted_set_rev_range("k", 5, 9).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_and_bulk_add() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.sorted_set_add("x", 1, "7").await.unwrap();
        let keys = vec!["x".to_string(), "y".to_string()];
        store.sorted_sets_add(&keys, 9, "7").await.unwrap();

        assert_eq!(store.sorted_set_card("x").await.unwrap(), 1);
        assert_eq!(store.score("x", "7").unwrap(), Some(9));
        assert_eq!(store.score("y", "7").unwrap(), Some(9));
        assert_eq!(store.score("z", "7").unwrap(), None);
    }

    #[tokio::test]
    async fn test_sets() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_add("topic:1:tags", "rust").await.unwrap();
        store.set_add("topic:1:tags", "rust").await.unwrap();
        store.set_add("topic:1:tags", "go").await.unwrap();
        assert_eq!(store.set_members("topic:1:tags").await.unwrap(), ["go", "rust"]);
    }
}
