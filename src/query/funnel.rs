use crate::query::percentile::continuous_median;
use duckdb::Connection;
use std::collections::BTreeMap;

/// Event type that marks a session as order-placing.
pub const ORDER_EVENT_TYPE: &str = "placed_order";

/// The two order-funnel medians computed once per pipeline run.
///
/// `None` means no customer qualified for that metric — a valid empty
/// result, distinct from a query failure.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderFunnelMetrics {
    pub median_visits_before_order: Option<f64>,
    pub median_session_duration_minutes: Option<f64>,
}

#[derive(Debug)]
pub enum ComputeError {
    Query(duckdb::Error),
}

impl std::fmt::Display for ComputeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Query(e) => write!(f, "Event store query failed: {e}"),
        }
    }
}

impl std::error::Error for ComputeError {}

impl From<duckdb::Error> for ComputeError {
    fn from(e: duckdb::Error) -> Self {
        Self::Query(e)
    }
}

struct EventRow {
    customer_id: String,
    session_id: i64,
    event_type: String,
    epoch_secs: f64,
}

/// Read the sessionized events back as flat rows with epoch-second
/// timestamps. Both funnel reductions run off this projection.
fn fetch_event_rows(conn: &Connection) -> Result<Vec<EventRow>, duckdb::Error> {
    let mut stmt = conn.prepare(
        "SELECT customer_id, session_id, type,
                CAST(EXTRACT(EPOCH FROM timestamp) AS DOUBLE)
         FROM events",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(EventRow {
                customer_id: row.get(0)?,
                session_id: row.get(1)?,
                event_type: row.get(2)?,
                epoch_secs: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Median number of sessions a customer accumulates before their first
/// order-placing session.
///
/// Grouped-and-sorted in-memory reduction: per customer, sessions are
/// walked in ascending `session_id` order; the first session containing a
/// `placed_order` event contributes one data point — the count of strictly
/// earlier sessions. Customers without an order contribute nothing.
#[allow(clippy::cast_precision_loss)]
pub fn median_visits_before_order(conn: &Connection) -> Result<Option<f64>, ComputeError> {
    let rows = fetch_event_rows(conn)?;

    let mut sessions: BTreeMap<String, BTreeMap<i64, bool>> = BTreeMap::new();
    for row in &rows {
        let has_order = sessions
            .entry(row.customer_id.clone())
            .or_default()
            .entry(row.session_id)
            .or_insert(false);
        *has_order = *has_order || row.event_type == ORDER_EVENT_TYPE;
    }

    let mut points = Vec::new();
    for by_session in sessions.values() {
        if let Some(earlier) = by_session.values().position(|has_order| *has_order) {
            points.push(earlier as f64);
        }
    }

    Ok(continuous_median(points))
}

/// Per-session aggregate carried by the duration reduction.
struct SessionSpan {
    min_ts: f64,
    /// Earliest `placed_order` timestamp within the session, if any.
    order_ts: Option<f64>,
}

/// Median minutes from a customer's first recorded activity to the order
/// event in their first order-placing session.
///
/// A customer whose very first session contains the order has no preceding
/// activity to measure from and contributes no data point. Multiple orders
/// within one session collapse to a single data point — the session, not
/// the event, is the unit.
pub fn median_minutes_before_order(conn: &Connection) -> Result<Option<f64>, ComputeError> {
    let rows = fetch_event_rows(conn)?;

    let mut sessions: BTreeMap<String, BTreeMap<i64, SessionSpan>> = BTreeMap::new();
    for row in &rows {
        let span = sessions
            .entry(row.customer_id.clone())
            .or_default()
            .entry(row.session_id)
            .or_insert(SessionSpan {
                min_ts: row.epoch_secs,
                order_ts: None,
            });
        span.min_ts = span.min_ts.min(row.epoch_secs);
        if row.event_type == ORDER_EVENT_TYPE {
            span.order_ts = Some(span.order_ts.map_or(row.epoch_secs, |t| t.min(row.epoch_secs)));
        }
    }

    let mut points = Vec::new();
    for by_session in sessions.values() {
        let first_order = by_session
            .iter()
            .find_map(|(sid, span)| span.order_ts.map(|ts| (*sid, ts)));
        let Some((order_session, order_ts)) = first_order else {
            continue;
        };
        let first_ts = by_session
            .range(..order_session)
            .map(|(_, span)| span.min_ts)
            .reduce(f64::min);
        if let Some(first_ts) = first_ts {
            points.push((order_ts - first_ts) / 60.0);
        }
    }

    Ok(continuous_median(points))
}

/// Run both funnel computations against the event store.
pub fn compute_order_funnel(conn: &Connection) -> Result<OrderFunnelMetrics, ComputeError> {
    Ok(OrderFunnelMetrics {
        median_visits_before_order: median_visits_before_order(conn)?,
        median_session_duration_minutes: median_minutes_before_order(conn)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema;

    fn setup_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::init_schema(&conn).unwrap();
        conn
    }

    fn insert_event(
        conn: &Connection,
        customer: &str,
        session_id: i64,
        event_type: &str,
        timestamp: &str,
    ) {
        conn.execute(
            "INSERT INTO events (id, type, customer_id, session_id, timestamp)
             VALUES (?, ?, ?, ?, CAST(? AS TIMESTAMP))",
            duckdb::params![
                format!("{customer}-{session_id}-{timestamp}"),
                event_type,
                customer,
                session_id,
                timestamp
            ],
        )
        .unwrap();
    }

    #[test]
    fn test_empty_table_yields_no_medians() {
        let conn = setup_test_db();
        assert_eq!(median_visits_before_order(&conn).unwrap(), None);
        assert_eq!(median_minutes_before_order(&conn).unwrap(), None);
    }

    #[test]
    fn test_example_scenario() {
        // C1: browse at 10:00 (session 1), browse at 10:10 and order at
        // 10:16 (session 2). One session precedes the order; first activity
        // to order spans 16 minutes.
        let conn = setup_test_db();
        insert_event(&conn, "c1", 1, "view_page", "2021-01-23 10:00:00");
        insert_event(&conn, "c1", 2, "view_page", "2021-01-23 10:10:00");
        insert_event(&conn, "c1", 2, "placed_order", "2021-01-23 10:16:00");

        assert_eq!(median_visits_before_order(&conn).unwrap(), Some(1.0));
        assert_eq!(median_minutes_before_order(&conn).unwrap(), Some(16.0));
    }

    #[test]
    fn test_customer_without_order_contributes_nothing() {
        let conn = setup_test_db();
        insert_event(&conn, "c1", 1, "view_page", "2021-01-23 10:00:00");
        insert_event(&conn, "c1", 2, "search", "2021-01-23 11:00:00");

        assert_eq!(median_visits_before_order(&conn).unwrap(), None);
        assert_eq!(median_minutes_before_order(&conn).unwrap(), None);
    }

    #[test]
    fn test_order_in_first_session() {
        // Zero preceding sessions: counts as 0 for the visits metric but is
        // excluded from the duration metric (no earlier activity to anchor).
        let conn = setup_test_db();
        insert_event(&conn, "c1", 1, "view_page", "2021-01-23 10:00:00");
        insert_event(&conn, "c1", 1, "placed_order", "2021-01-23 10:02:00");

        assert_eq!(median_visits_before_order(&conn).unwrap(), Some(0.0));
        assert_eq!(median_minutes_before_order(&conn).unwrap(), None);
    }

    #[test]
    fn test_only_first_order_session_counts() {
        let conn = setup_test_db();
        insert_event(&conn, "c1", 1, "view_page", "2021-01-23 10:00:00");
        insert_event(&conn, "c1", 2, "placed_order", "2021-01-23 11:00:00");
        insert_event(&conn, "c1", 3, "placed_order", "2021-01-23 12:00:00");

        // One data point from session 2 (1 preceding session), not two.
        assert_eq!(median_visits_before_order(&conn).unwrap(), Some(1.0));
        assert_eq!(median_minutes_before_order(&conn).unwrap(), Some(60.0));
    }

    #[test]
    fn test_two_orders_in_same_session_collapse() {
        let conn = setup_test_db();
        insert_event(&conn, "c1", 1, "view_page", "2021-01-23 10:00:00");
        insert_event(&conn, "c1", 2, "placed_order", "2021-01-23 10:10:00");
        insert_event(&conn, "c1", 2, "placed_order", "2021-01-23 10:12:00");

        // Still one data point, anchored to the earliest order timestamp.
        assert_eq!(median_visits_before_order(&conn).unwrap(), Some(1.0));
        assert_eq!(median_minutes_before_order(&conn).unwrap(), Some(10.0));
    }

    #[test]
    fn test_median_across_customers_even_count() {
        let conn = setup_test_db();
        // c1: order in session 2 -> 1 preceding session
        insert_event(&conn, "c1", 1, "view_page", "2021-01-23 10:00:00");
        insert_event(&conn, "c1", 2, "placed_order", "2021-01-23 11:00:00");
        // c2: order in session 5 -> 2 preceding sessions
        insert_event(&conn, "c2", 3, "view_page", "2021-01-23 10:00:00");
        insert_event(&conn, "c2", 4, "view_page", "2021-01-23 11:00:00");
        insert_event(&conn, "c2", 5, "placed_order", "2021-01-23 12:00:00");

        assert_eq!(median_visits_before_order(&conn).unwrap(), Some(1.5));
    }

    #[test]
    fn test_duration_uses_earliest_activity_across_prior_sessions() {
        let conn = setup_test_db();
        insert_event(&conn, "c1", 1, "view_page", "2021-01-23 09:00:00");
        insert_event(&conn, "c1", 1, "view_page", "2021-01-23 09:01:00");
        insert_event(&conn, "c1", 2, "search", "2021-01-23 10:00:00");
        insert_event(&conn, "c1", 3, "placed_order", "2021-01-23 10:30:00");

        // Anchored to 09:00, not to session 2's 10:00.
        assert_eq!(median_minutes_before_order(&conn).unwrap(), Some(90.0));
    }

    #[test]
    fn test_compute_order_funnel_bundles_both() {
        let conn = setup_test_db();
        insert_event(&conn, "c1", 1, "view_page", "2021-01-23 10:00:00");
        insert_event(&conn, "c1", 2, "placed_order", "2021-01-23 10:30:00");

        let metrics = compute_order_funnel(&conn).unwrap();
        assert_eq!(metrics.median_visits_before_order, Some(1.0));
        assert_eq!(metrics.median_session_duration_minutes, Some(30.0));
    }

    #[test]
    fn test_fractional_minutes() {
        let conn = setup_test_db();
        insert_event(&conn, "c1", 1, "view_page", "2021-01-23 10:00:00");
        insert_event(&conn, "c1", 2, "placed_order", "2021-01-23 10:10:30");

        assert_eq!(median_minutes_before_order(&conn).unwrap(), Some(10.5));
    }
}
