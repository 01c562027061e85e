use crate::app_dirs::AppDirs;
use crate::error::{Error, Result};
use chrono::Local;
use rusqlite::{params, types::Value, Connection, OptionalExtension};
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::Path;

/// Fixed identifiers of the persisted records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKey {
    BestSingle,
    BestAverage,
}

impl RecordKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKey::BestSingle => "bestSingleMs",
            RecordKey::BestAverage => "bestAverageMs",
        }
    }
}

/// Parse a stored record. Anything that is not a positive number counts as no record.
pub fn parse_record(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if let Ok(ms) = raw.parse::<u64>() {
        return (ms > 0).then_some(ms);
    }
    match raw.parse::<f64>() {
        Ok(ms) if ms.is_finite() && ms >= 1.0 => Some(ms.round() as u64),
        _ => None,
    }
}

/// Durable storage for two named numeric values
pub trait RecordStore: Debug {
    /// Read a record; missing or unreadable values are None
    fn read(&self, key: RecordKey) -> Option<u64>;
    fn write(&mut self, key: RecordKey, ms: u64) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

impl<T: RecordStore + ?Sized> RecordStore for Box<T> {
    fn read(&self, key: RecordKey) -> Option<u64> {
        (**self).read(key)
    }

    fn write(&mut self, key: RecordKey, ms: u64) -> Result<()> {
        (**self).write(key, ms)
    }

    fn clear(&mut self) -> Result<()> {
        (**self).clear()
    }
}

/// Best values seen so far, lower is better
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Records {
    pub best_single: Option<u64>,
    pub best_average: Option<u64>,
}

/// Which records a session improved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordUpdate {
    pub single: bool,
    pub average: bool,
}

impl Records {
    pub fn load<S: RecordStore + ?Sized>(store: &S) -> Self {
        Self {
            best_single: store.read(RecordKey::BestSingle),
            best_average: store.read(RecordKey::BestAverage),
        }
    }

    pub fn improve(&mut self, average: u64, best: u64) -> RecordUpdate {
        let update = RecordUpdate {
            single: self.best_single.map_or(true, |rec| best < rec),
            average: self.best_average.map_or(true, |rec| average < rec),
        };
        if update.single {
            self.best_single = Some(best);
        }
        if update.average {
            self.best_average = Some(average);
        }
        update
    }
}

/// Records kept in process memory only
#[derive(Debug, Default, Clone)]
pub struct MemoryRecordStore {
    values: HashMap<RecordKey, String>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an arbitrary raw value, as a hand-edited store might contain
    pub fn with_raw(mut self, key: RecordKey, raw: &str) -> Self {
        self.values.insert(key, raw.to_string());
        self
    }
}

impl RecordStore for MemoryRecordStore {
    fn read(&self, key: RecordKey) -> Option<u64> {
        self.values.get(&key).and_then(|raw| parse_record(raw))
    }

    fn write(&mut self, key: RecordKey, ms: u64) -> Result<()> {
        self.values.insert(key, ms.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.values.clear();
        Ok(())
    }
}

/// SQLite backed record store
#[derive(Debug)]
pub struct SqliteRecordStore {
    conn: Connection,
}

impl SqliteRecordStore {
    /// Open the database in the application state directory
    pub fn new() -> Result<Self> {
        let path = AppDirs::db_path().ok_or(Error::NoStateDir("records"))?;
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT
            )
            "#,
            [],
        )?;
        Ok(Self { conn })
    }

    fn read_value(&self, key: RecordKey) -> rusqlite::Result<Option<Value>> {
        self.conn
            .query_row(
                "SELECT value FROM records WHERE key = ?1",
                [key.as_str()],
                |row| row.get::<_, Value>(0),
            )
            .optional()
    }
}

impl RecordStore for SqliteRecordStore {
    fn read(&self, key: RecordKey) -> Option<u64> {
        match self.read_value(key) {
            Ok(Some(Value::Integer(ms))) if ms > 0 => Some(ms as u64),
            Ok(Some(Value::Real(ms))) => parse_record(&ms.to_string()),
            Ok(Some(Value::Text(raw))) => parse_record(&raw),
            Ok(_) => None,
            Err(e) => {
                log::warn!("failed to read record {}: {}", key.as_str(), e);
                None
            }
        }
    }

    fn write(&mut self, key: RecordKey, ms: u64) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO records (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key.as_str(), ms.to_string(), Local::now().to_rfc3339()],
        )?;
        log::info!("stored record {} = {} ms", key.as_str(), ms);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.conn.execute("DELETE FROM records", [])?;
        Ok(())
    }
}
