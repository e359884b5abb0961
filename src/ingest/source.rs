use serde::Deserialize;

/// One decoded line from the event feed, flattened to storage column names.
///
/// `timestamp` stays a raw string here; parsing happens during
/// sessionization, where a bad value is a hard error rather than a
/// silently dropped row.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub id: String,
    pub event_type: String,
    pub timestamp: Option<String>,
    pub customer_id: Option<String>,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
    pub page: Option<String>,
    pub product: Option<String>,
    pub query: Option<String>,
    pub referrer: Option<String>,
    pub position: Option<i64>,
}

/// Wire format: `{"id": ..., "type": ..., "event": {...}}` with kebab-case
/// keys inside the nested object.
#[derive(Debug, Deserialize)]
struct WireRecord {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    event: WireBody,
}

#[derive(Debug, Deserialize)]
struct WireBody {
    timestamp: Option<String>,
    #[serde(rename = "customer-id")]
    customer_id: Option<String>,
    #[serde(rename = "user-agent")]
    user_agent: Option<String>,
    ip: Option<String>,
    page: Option<String>,
    product: Option<String>,
    query: Option<String>,
    referrer: Option<String>,
    position: Option<i64>,
}

impl From<WireRecord> for RawEvent {
    fn from(record: WireRecord) -> Self {
        Self {
            id: record.id,
            event_type: record.event_type,
            timestamp: record.event.timestamp,
            customer_id: record.event.customer_id,
            user_agent: record.event.user_agent,
            ip: record.event.ip,
            page: record.event.page,
            product: record.event.product,
            query: record.event.query,
            referrer: record.event.referrer,
            position: record.event.position,
        }
    }
}

#[derive(Debug)]
pub enum FetchError {
    Http(reqwest::Error),
    Parse { line: usize, source: serde_json::Error },
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(e) => write!(f, "Event feed request failed: {e}"),
            Self::Parse { line, source } => {
                write!(f, "Malformed event record on line {line}: {source}")
            }
        }
    }
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

/// Fetch the newline-delimited JSON event feed and decode every line.
///
/// Any undecodable line fails the whole fetch with its 1-based line number;
/// there is no partial ingestion.
pub async fn fetch_events(url: &str) -> Result<Vec<RawEvent>, FetchError> {
    let body = reqwest::get(url).await?.error_for_status()?.text().await?;
    parse_ndjson(&body)
}

/// Decode a newline-delimited JSON body into flattened events.
pub fn parse_ndjson(body: &str) -> Result<Vec<RawEvent>, FetchError> {
    body.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str::<WireRecord>(line)
                .map(RawEvent::from)
                .map_err(|source| FetchError::Parse {
                    line: idx + 1,
                    source,
                })
        })
        .collect()
}
