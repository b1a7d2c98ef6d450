//! Durable rating storage: one row per (artist, title, listener_id).
//!
//! rusqlite connections are blocking, so every call hops onto the blocking
//! pool and takes the connection lock there.

use std::sync::{Arc, Mutex};

use calico_proto::config::DatabaseConfig;
use calico_proto::ratings::{Rating, RatingsResponse};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::StoreError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS ratings (
    id INTEGER PRIMARY KEY,
    artist TEXT NOT NULL,
    title TEXT NOT NULL,
    listener_id TEXT NOT NULL,
    rating INTEGER NOT NULL CHECK (rating IN (-1, 1)),
    created_at TEXT NOT NULL,
    UNIQUE (artist, title, listener_id)
);
"#;

const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

#[derive(Clone)]
pub struct RatingStore {
    conn: Arc<Mutex<Connection>>,
}

impl RatingStore {
    pub fn open(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let conn = if config.in_memory {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = config.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            info!("Opening rating store at {}", config.path.display());
            Connection::open(&config.path)?
        };
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert or replace this listener's vote; the timestamp moves to now.
    pub async fn upsert(
        &self,
        artist: &str,
        title: &str,
        listener_id: &str,
        rating: Rating,
    ) -> Result<(), StoreError> {
        let (artist, title, listener_id) =
            (artist.to_owned(), title.to_owned(), listener_id.to_owned());
        let value = rating.value();
        self.with_conn(move |conn| {
            let sql = format!(
                "INSERT INTO ratings (artist, title, listener_id, rating, created_at)
                 VALUES (?1, ?2, ?3, ?4, {now})
                 ON CONFLICT (artist, title, listener_id)
                 DO UPDATE SET rating = excluded.rating, created_at = excluded.created_at",
                now = NOW
            );
            conn.execute(&sql, params![artist, title, listener_id, value])?;
            debug!("rating upserted: {} / {} by {} = {}", artist, title, listener_id, value);
            Ok(())
        })
        .await
    }

    /// Aggregate counts for the track plus `listener_id`'s own vote (0 when
    /// absent or when no listener is given).
    pub async fn ratings(
        &self,
        artist: &str,
        title: &str,
        listener_id: Option<&str>,
    ) -> Result<RatingsResponse, StoreError> {
        let (artist, title) = (artist.to_owned(), title.to_owned());
        let listener_id = listener_id.map(str::to_owned);
        self.with_conn(move |conn| {
            let (thumbs_up, thumbs_down): (i64, i64) = conn.query_row(
                "SELECT
                    COALESCE(SUM(CASE WHEN rating = 1 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN rating = -1 THEN 1 ELSE 0 END), 0)
                 FROM ratings WHERE artist = ?1 AND title = ?2",
                params![artist, title],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let user_rating = match listener_id {
                Some(listener_id) => conn
                    .query_row(
                        "SELECT rating FROM ratings
                         WHERE artist = ?1 AND title = ?2 AND listener_id = ?3",
                        params![artist, title, listener_id],
                        |row| row.get::<_, i8>(0),
                    )
                    .optional()?
                    .unwrap_or(0),
                None => 0,
            };

            Ok(RatingsResponse {
                thumbs_up: thumbs_up.max(0) as u64,
                thumbs_down: thumbs_down.max(0) as u64,
                user_rating,
            })
        })
        .await
    }

    /// Current time as seen by the database; doubles as a liveness probe.
    pub async fn db_time(&self) -> Result<String, StoreError> {
        self.with_conn(|conn| {
            let time = conn.query_row(&format!("SELECT {}", NOW), [], |row| row.get(0))?;
            Ok(time)
        })
        .await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&conn)
        })
        .await?
    }
}
