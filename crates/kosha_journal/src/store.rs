//! I define the append-only event store.
//!

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use kosha_space::{event::EventRecord, OpaqueId};
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// An error from the event store.
#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    /// Underlying database error.
    #[error("Database error in event store.")]
    Db(#[from] sqlx::Error),

    /// A persisted record doesn't decode.
    #[error("Corrupt event record {event_id}.")]
    CorruptRecord {
        /// Id of the corrupt record.
        event_id: String,
    },
}

/// The append-only event log.
///
/// Events for one aggregate carry strictly increasing
/// sequence numbers, assigned inside the append transaction;
/// the global order of the log is the commit order.
#[derive(Debug, Clone)]
pub struct EventStore {
    pool: SqlitePool,
}

impl EventStore {
    /// Create a new event store over given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the backing pool.
    #[inline]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Idempotently create the backing schema.
    pub async fn init_schema(&self) -> Result<(), EventStoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                event_id     TEXT PRIMARY KEY,
                aggregate_id TEXT NOT NULL,
                sequence     INTEGER NOT NULL,
                event_type   TEXT NOT NULL,
                payload      TEXT NOT NULL,
                recorded_at  TEXT NOT NULL,
                UNIQUE (aggregate_id, sequence)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_aggregate ON events (aggregate_id);")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Append given records under one transaction, assigning
    /// per-aggregate sequences. On return, the records carry
    /// their authoritative sequences.
    #[tracing::instrument(skip_all, fields(count = records.len()))]
    pub async fn append(&self, records: &mut [EventRecord]) -> Result<(), EventStoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        // Next sequence per aggregate touched by this batch.
        let mut next_sequences: HashMap<OpaqueId, i64> = HashMap::new();

        for record in records.iter_mut() {
            let next = match next_sequences.get(&record.aggregate_id) {
                Some(next) => *next,
                None => {
                    let row = sqlx::query(
                        "SELECT COALESCE(MAX(sequence), 0) AS max_seq FROM events WHERE aggregate_id = ?1",
                    )
                    .bind(record.aggregate_id.to_string())
                    .fetch_one(&mut *tx)
                    .await?;
                    row.get::<i64, _>("max_seq") + 1
                }
            };

            record.sequence = next;
            next_sequences.insert(record.aggregate_id, next + 1);

            sqlx::query(
                r#"
                INSERT INTO events (event_id, aggregate_id, sequence, event_type, payload, recorded_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(record.event_id.to_string())
            .bind(record.aggregate_id.to_string())
            .bind(record.sequence)
            .bind(&record.event_type)
            .bind(record.payload.to_string())
            .bind(record.recorded_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Appended {} event records.", records.len());
        Ok(())
    }

    /// Load the events of given aggregate with sequence
    /// strictly greater than given one, in sequence order.
    pub async fn load_since(
        &self,
        aggregate_id: OpaqueId,
        after_sequence: i64,
    ) -> Result<Vec<EventRecord>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, aggregate_id, sequence, event_type, payload, recorded_at
            FROM events
            WHERE aggregate_id = ?1 AND sequence > ?2
            ORDER BY sequence ASC
            "#,
        )
        .bind(aggregate_id.to_string())
        .bind(after_sequence)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let event_id: String = row.get("event_id");
                let corrupt = || EventStoreError::CorruptRecord {
                    event_id: event_id.clone(),
                };

                Ok(EventRecord {
                    event_id: event_id.parse().map_err(|_| corrupt())?,
                    aggregate_id: row
                        .get::<String, _>("aggregate_id")
                        .parse()
                        .map_err(|_| corrupt())?,
                    sequence: row.get("sequence"),
                    event_type: row.get("event_type"),
                    payload: serde_json::from_str(&row.get::<String, _>("payload"))
                        .map_err(|_| corrupt())?,
                    recorded_at: row.get::<DateTime<Utc>, _>("recorded_at"),
                })
            })
            .collect()
    }
}

// ----------------------------------------
//                                      tests
// ----------------------------------------
