use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;
use crate::result::ScrapeResult;

/// One persisted scrape, successful or not.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeRecord {
    pub id: Uuid,
    pub session_id: Uuid,
    pub url: String,
    pub fetched_at: Option<DateTime<Utc>>,
    /// Full JSON export of the `ScrapeResult`.
    pub result_json: Option<String>,
    pub restructured: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ScrapeRecord {
    pub fn success(
        session_id: Uuid,
        result: &ScrapeResult,
        restructured: Option<String>,
    ) -> Result<Self, StoreError> {
        Ok(ScrapeRecord {
            id: Uuid::new_v4(),
            session_id,
            url: result.url().to_string(),
            fetched_at: Some(result.fetched_at()),
            result_json: Some(result.to_json()?),
            restructured,
            error: None,
            created_at: Utc::now(),
        })
    }

    pub fn failure(session_id: Uuid, url: &str, error: impl ToString) -> Self {
        ScrapeRecord {
            id: Uuid::new_v4(),
            session_id,
            url: url.to_string(),
            fetched_at: None,
            result_json: None,
            restructured: None,
            error: Some(error.to_string()),
            created_at: Utc::now(),
        }
    }
}

/// Persistence boundary: a store only has to accept records.
pub trait RecordStore {
    fn save(&self, record: &ScrapeRecord) -> Result<(), StoreError>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store = SqliteStore { conn };
        store.init_schema()?;
        debug!("opened record store at {}", path.display());
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS scrapes (
                id           TEXT PRIMARY KEY,
                session_id   TEXT NOT NULL,
                url          TEXT NOT NULL,
                fetched_at   TEXT,
                result_json  TEXT,
                restructured TEXT,
                error        TEXT,
                created_at   TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_scrapes_session ON scrapes(session_id);
            CREATE INDEX IF NOT EXISTS idx_scrapes_created ON scrapes(created_at);
            ",
        )?;
        Ok(())
    }

    /// Most recent records first.
    pub fn recent(&self, limit: usize) -> Result<Vec<ScrapeRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, url, fetched_at, result_json, restructured, error, created_at
             FROM scrapes ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get(&self, id: &Uuid) -> Result<Option<ScrapeRecord>, StoreError> {
        let record = self
            .conn
            .query_row(
                "SELECT id, session_id, url, fetched_at, result_json, restructured, error, created_at
                 FROM scrapes WHERE id = ?1",
                params![id.to_string()],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }
}

impl RecordStore for SqliteStore {
    fn save(&self, record: &ScrapeRecord) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO scrapes
                (id, session_id, url, fetched_at, result_json, restructured, error, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id.to_string(),
                record.session_id.to_string(),
                record.url,
                record.fetched_at.map(timestamp),
                record.result_json,
                record.restructured,
                record.error,
                timestamp(record.created_at),
            ],
        )?;
        debug!(id = %record.id, "saved record");
        Ok(())
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ScrapeRecord> {
    let fetched_at: Option<String> = row.get(3)?;
    Ok(ScrapeRecord {
        id: uuid_at(row, 0)?,
        session_id: uuid_at(row, 1)?,
        url: row.get(2)?,
        fetched_at: fetched_at.map(|s| parse_time(3, &s)).transpose()?,
        result_json: row.get(4)?,
        restructured: row.get(5)?,
        error: row.get(6)?,
        created_at: parse_time(7, &row.get::<_, String>(7)?)?,
    })
}

fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_time(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
