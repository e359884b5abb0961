use crate::ingest::source::RawEvent;
use chrono::{DateTime, Duration, NaiveDateTime};

/// Inactivity gap above which a customer's next event starts a new session.
pub const DEFAULT_SESSION_GAP_MINUTES: i64 = 4;

/// An event attributed to a customer and stamped with its session.
///
/// Session ids come from a single counter that runs across the whole sorted
/// stream, so an id is never shared by two customers and
/// `(customer_id, session_id)` pairs are globally unique.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub id: String,
    pub event_type: String,
    pub timestamp: NaiveDateTime,
    pub customer_id: String,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
    pub page: Option<String>,
    pub product: Option<String>,
    pub query: Option<String>,
    pub referrer: Option<String>,
    pub position: Option<i64>,
    pub session_id: i64,
}

#[derive(Debug)]
pub enum SessionizeError {
    MissingTimestamp { id: String },
    InvalidTimestamp { id: String, value: String },
}

impl std::fmt::Display for SessionizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingTimestamp { id } => {
                write!(f, "Event {id} has no timestamp; sessions cannot be assigned")
            }
            Self::InvalidTimestamp { id, value } => {
                write!(f, "Event {id} has unparseable timestamp {value:?}")
            }
        }
    }
}

impl std::error::Error for SessionizeError {}

/// Assign session ids to a collection of raw events.
///
/// Events without a `customer_id` cannot be attributed and are dropped.
/// Every remaining event must carry a parseable timestamp; a missing or
/// malformed one fails the whole call, since ordering is undefined without
/// a time anchor.
///
/// The remaining events are stable-sorted by `(customer_id, timestamp)` and
/// scanned once, carrying `(last_customer, last_timestamp, counter)`. The
/// counter increments when the customer changes or when the gap to the
/// previous event strictly exceeds `gap` — a gap of exactly `gap` stays in
/// the same session.
pub fn sessionize(
    events: Vec<RawEvent>,
    gap: Duration,
) -> Result<Vec<SessionEvent>, SessionizeError> {
    let mut tagged = Vec::with_capacity(events.len());
    for event in events {
        let Some(customer_id) = event.customer_id else {
            continue;
        };
        let raw_ts = event
            .timestamp
            .as_deref()
            .ok_or_else(|| SessionizeError::MissingTimestamp {
                id: event.id.clone(),
            })?;
        let timestamp =
            parse_timestamp(raw_ts).ok_or_else(|| SessionizeError::InvalidTimestamp {
                id: event.id.clone(),
                value: raw_ts.to_string(),
            })?;
        tagged.push(SessionEvent {
            id: event.id,
            event_type: event.event_type,
            timestamp,
            customer_id,
            user_agent: event.user_agent,
            ip: event.ip,
            page: event.page,
            product: event.product,
            query: event.query,
            referrer: event.referrer,
            position: event.position,
            session_id: 0,
        });
    }

    // Stable sort: equal (customer, timestamp) pairs keep their input order.
    tagged.sort_by(|a, b| {
        a.customer_id
            .cmp(&b.customer_id)
            .then_with(|| a.timestamp.cmp(&b.timestamp))
    });

    let mut counter: i64 = 0;
    let mut last: Option<(String, NaiveDateTime)> = None;
    for event in &mut tagged {
        let new_session = match &last {
            None => true,
            Some((last_customer, last_timestamp)) => {
                *last_customer != event.customer_id
                    || event.timestamp - *last_timestamp > gap
            }
        };
        if new_session {
            counter += 1;
        }
        event.session_id = counter;
        last = Some((event.customer_id.clone(), event.timestamp));
    }

    Ok(tagged)
}

/// Parse a source timestamp into a comparable instant.
///
/// The feed emits RFC 3339 (`2021-01-23T10:00:00.000Z`); naive variants
/// with and without the `T` separator are accepted as well.
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}
