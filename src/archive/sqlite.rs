//! SQLite-backed append-only update journal.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use crate::update::{ContestUpdate, StoredUpdate, StoredUpdateEnvelope, UPDATE_FORMAT_VERSION};

use super::{ArchiveError, ArchiveResult, UpdateSink};

/// SQLite implementation of [`UpdateSink`].
pub struct SqliteUpdateJournal {
    conn: Connection,
}

impl SqliteUpdateJournal {
    /// Opens or creates a journal at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory journal.
    pub fn open_in_memory() -> ArchiveResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> ArchiveResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self { conn })
    }

    /// Loads every journaled update strictly after `seq`, in order.
    pub fn load_updates_after(&self, seq: u64) -> ArchiveResult<Vec<StoredUpdate>> {
        let mut stmt = self
            .conn
            .prepare("SELECT seq, ts_ms, payload FROM updates WHERE seq > ?1 ORDER BY seq ASC")?;

        let rows = stmt.query_map(params![seq as i64], |row| {
            let seq: i64 = row.get(0)?;
            let ts_ms: i64 = row.get(1)?;
            let payload: Vec<u8> = row.get(2)?;
            let mut stored = decode_stored_payload(&payload).map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(
                    payload.len(),
                    rusqlite::types::Type::Blob,
                    Box::new(std::io::Error::other(err)),
                )
            })?;
            stored.seq = seq as u64;
            stored.ts_ms = ts_ms as u64;
            Ok(stored)
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Loads the full journaled history as a replay bundle.
    pub fn load_history(&self) -> ArchiveResult<Vec<ContestUpdate>> {
        Ok(self
            .load_updates_after(0)?
            .into_iter()
            .map(|stored| stored.update)
            .collect())
    }

    /// Returns the latest sequence in the journal.
    pub fn latest_seq(&self) -> ArchiveResult<u64> {
        let seq: Option<i64> = self
            .conn
            .query_row("SELECT MAX(seq) FROM updates", [], |row| row.get(0))
            .optional()?;
        Ok(seq.unwrap_or(0) as u64)
    }

    /// Deletes updates up to and including `seq`.
    pub fn compact_through(&mut self, seq: u64) -> ArchiveResult<usize> {
        let count = self
            .conn
            .execute("DELETE FROM updates WHERE seq <= ?1", params![seq as i64])?;
        Ok(count)
    }
}

impl UpdateSink for SqliteUpdateJournal {
    fn append_updates(&mut self, updates: &[StoredUpdate]) -> ArchiveResult<u64> {
        if updates.is_empty() {
            return self.latest_seq();
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO updates(seq, ts_ms, kind, entity_id, payload) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for stored in updates {
                let payload = serde_json::to_vec(&StoredUpdateEnvelope::new(stored.clone()))?;
                let (kind, entity_id) = update_kind_and_id(&stored.update);
                stmt.execute(params![
                    stored.seq as i64,
                    stored.ts_ms as i64,
                    kind,
                    entity_id,
                    payload,
                ])?;
            }
        }
        tx.commit()?;

        Ok(updates.last().map(|u| u.seq).unwrap_or(0))
    }

    fn flush(&mut self) -> ArchiveResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        Ok(())
    }

    fn compact_through(&mut self, seq: u64) -> ArchiveResult<usize> {
        SqliteUpdateJournal::compact_through(self, seq)
    }
}

fn update_kind_and_id(update: &ContestUpdate) -> (i64, Option<&str>) {
    match update {
        ContestUpdate::Info(_) => (1, None),
        ContestUpdate::Run(run) => (2, Some(run.id.as_str())),
        ContestUpdate::Commentary(msg) => (3, Some(msg.id.as_str())),
    }
}

fn decode_stored_payload(payload: &[u8]) -> Result<StoredUpdate, String> {
    let envelope: StoredUpdateEnvelope =
        serde_json::from_slice(payload).map_err(|e| format!("update payload decode failed: {e}"))?;
    if envelope.format_version != UPDATE_FORMAT_VERSION {
        return Err(format!(
            "unsupported update format version: {}",
            envelope.format_version
        ));
    }
    Ok(envelope.stored)
}
