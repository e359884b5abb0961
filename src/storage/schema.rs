use duckdb::Connection;
use std::path::Path;

/// SQL statement to create the events table.
///
/// `timestamp` is stored alongside the flattened attribute columns because
/// both funnel computations read it back.
pub const CREATE_EVENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS events (
    id          VARCHAR NOT NULL,
    type        VARCHAR NOT NULL,
    user_agent  VARCHAR,
    ip          VARCHAR,
    customer_id VARCHAR NOT NULL,
    page        VARCHAR,
    product     VARCHAR,
    query       VARCHAR,
    referrer    VARCHAR,
    position    BIGINT,
    session_id  BIGINT NOT NULL,
    timestamp   TIMESTAMP NOT NULL
)
";

/// Initialize the database schema.
pub fn init_schema(conn: &Connection) -> Result<(), duckdb::Error> {
    conn.execute_batch(CREATE_EVENTS_TABLE)?;
    Ok(())
}

/// Open the event store and ensure the schema exists.
///
/// `path` of `None` opens an in-memory database, which is sufficient for a
/// batch run that loads, aggregates, and serves within one process.
pub fn open_store(path: Option<&Path>) -> Result<Connection, duckdb::Error> {
    let conn = match path {
        Some(p) => Connection::open(p)?,
        None => Connection::open_in_memory()?,
    };
    init_schema(&conn)?;
    Ok(conn)
}
