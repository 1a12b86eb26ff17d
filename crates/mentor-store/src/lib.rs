use anyhow::Result;
use chrono::Utc;
use mentor_core::{AppState, Theme, runtime_dir};
use rusqlite::{Connection, OptionalExtension, params};
use std::fs;
use std::path::{Path, PathBuf};

pub const STATE_KEY: &str = "mentor_state";
pub const THEME_KEY: &str = "mentor_theme";

const MIGRATIONS: &[(i64, &str)] = &[(
    1,
    "CREATE TABLE IF NOT EXISTS local_state (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
     );",
)];

/// Result of reading one keyed record.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue<T> {
    Missing,
    Loaded(T),
    /// A value exists but could not be decoded.
    Corrupt { error: String },
}

/// Durable keyed local state under `<workspace>/.mentor/store.sqlite`.
pub struct Store {
    db_path: PathBuf,
}

impl Store {
    pub fn new(workspace: &Path) -> Result<Self> {
        let root = runtime_dir(workspace);
        fs::create_dir_all(&root)?;
        let db_path = root.join("store.sqlite");
        let store = Self { db_path };
        store.init_db()?;
        Ok(store)
    }

    pub fn db(&self) -> Result<Connection> {
        Ok(Connection::open(&self.db_path)?)
    }

    pub fn put_raw(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.db()?;
        conn.execute(
            "INSERT OR REPLACE INTO local_state (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let conn = self.db()?;
        let value = conn
            .query_row(
                "SELECT value FROM local_state WHERE key = ?1",
                [key],
                |r| r.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Serializes the whole state bag in one write.
    pub fn save_state(&self, state: &AppState) -> Result<()> {
        self.put_raw(STATE_KEY, &serde_json::to_string(state)?)
    }

    pub fn load_state(&self) -> Result<StoredValue<AppState>> {
        let Some(raw) = self.get_raw(STATE_KEY)? else {
            return Ok(StoredValue::Missing);
        };
        Ok(match serde_json::from_str::<AppState>(&raw) {
            Ok(state) => StoredValue::Loaded(state),
            Err(err) => StoredValue::Corrupt {
                error: err.to_string(),
            },
        })
    }

    pub fn save_theme(&self, theme: Theme) -> Result<()> {
        self.put_raw(THEME_KEY, theme.as_str())
    }

    pub fn load_theme(&self) -> Result<StoredValue<Theme>> {
        let Some(raw) = self.get_raw(THEME_KEY)? else {
            return Ok(StoredValue::Missing);
        };
        Ok(match raw.parse::<Theme>() {
            Ok(theme) => StoredValue::Loaded(theme),
            Err(err) => StoredValue::Corrupt {
                error: err.to_string(),
            },
        })
    }

    fn init_db(&self) -> Result<()> {
        let conn = self.db()?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
             );",
        )?;

        for (version, sql) in MIGRATIONS {
            let already: i64 = conn.query_row(
                "SELECT COUNT(1) FROM schema_migrations WHERE version = ?1",
                [*version],
                |r| r.get(0),
            )?;
            if already == 0 {
                conn.execute_batch(sql)?;
                conn.execute(
                    "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                    params![version, Utc::now().to_rfc3339()],
                )?;
            }
        }
        Ok(())
    }
}
