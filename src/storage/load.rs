use crate::ingest::sessionize::SessionEvent;
use duckdb::Connection;

#[derive(Debug)]
pub enum LoadError {
    Clear(duckdb::Error),
    Insert(duckdb::Error),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clear(e) => write!(f, "Clearing events table failed: {e}"),
            Self::Insert(e) => write!(f, "Inserting events failed: {e}"),
        }
    }
}

impl std::error::Error for LoadError {}

/// Replace the full contents of the events table with the given run's
/// sessionized events.
///
/// The delete and all inserts run under the caller's single connection
/// acquisition, so a concurrent reader on the same connection never
/// observes a half-loaded table. Returns the number of rows written.
pub fn replace_events(conn: &Connection, events: &[SessionEvent]) -> Result<usize, LoadError> {
    conn.execute("DELETE FROM events", [])
        .map_err(LoadError::Clear)?;

    let mut stmt = conn
        .prepare(
            "INSERT INTO events (id, type, user_agent, ip, customer_id, page,
             product, query, referrer, position, session_id, timestamp)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .map_err(LoadError::Insert)?;

    for event in events {
        stmt.execute(duckdb::params![
            event.id,
            event.event_type,
            event.user_agent,
            event.ip,
            event.customer_id,
            event.page,
            event.product,
            event.query,
            event.referrer,
            event.position,
            event.session_id,
            event.timestamp.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        ])
        .map_err(LoadError::Insert)?;
    }

    Ok(events.len())
}
