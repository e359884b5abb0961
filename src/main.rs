use funnel_metrics::config::Config;
use funnel_metrics::ingest::sessionize::{sessionize, SessionizeError};
use funnel_metrics::ingest::source::{fetch_events, FetchError};
use funnel_metrics::query::funnel::{compute_order_funnel, ComputeError, OrderFunnelMetrics};
use funnel_metrics::server::{self, AppState};
use funnel_metrics::storage::load::{replace_events, LoadError};
use funnel_metrics::storage::schema;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug)]
enum PipelineError {
    Fetch(FetchError),
    Sessionize(SessionizeError),
    Open(duckdb::Error),
    Load(LoadError),
    Compute(ComputeError),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch(e) => write!(f, "Source fetch failed: {e}"),
            Self::Sessionize(e) => write!(f, "Sessionization failed: {e}"),
            Self::Open(e) => write!(f, "Opening event store failed: {e}"),
            Self::Load(e) => write!(f, "Persisting events failed: {e}"),
            Self::Compute(e) => write!(f, "Funnel computation failed: {e}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<FetchError> for PipelineError {
    fn from(e: FetchError) -> Self {
        Self::Fetch(e)
    }
}

impl From<SessionizeError> for PipelineError {
    fn from(e: SessionizeError) -> Self {
        Self::Sessionize(e)
    }
}

impl From<LoadError> for PipelineError {
    fn from(e: LoadError) -> Self {
        Self::Load(e)
    }
}

impl From<ComputeError> for PipelineError {
    fn from(e: ComputeError) -> Self {
        Self::Compute(e)
    }
}

/// Run the batch stages: fetch, sessionize, persist, aggregate.
///
/// Any stage error aborts the run; the server never starts on stale or
/// half-computed metrics.
#[allow(clippy::cast_possible_truncation)]
async fn run_pipeline(config: &Config) -> Result<OrderFunnelMetrics, PipelineError> {
    let started = Instant::now();
    let raw = fetch_events(&config.source_url).await?;
    tracing::info!(
        count = raw.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Fetched event feed"
    );

    let started = Instant::now();
    let sessioned = sessionize(raw, chrono::Duration::minutes(config.session_gap_minutes))?;
    tracing::info!(
        count = sessioned.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Sessionization completed"
    );

    let started = Instant::now();
    let conn = schema::open_store(config.database.as_deref()).map_err(PipelineError::Open)?;
    let conn = Arc::new(Mutex::new(conn));
    {
        let guard = conn.lock();
        let stored = replace_events(&guard, &sessioned)?;
        tracing::info!(
            count = stored,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Event store refreshed"
        );
    }

    let started = Instant::now();
    let metrics = {
        let guard = conn.lock();
        compute_order_funnel(&guard)?
    };
    tracing::info!(
        median_visits_before_order = ?metrics.median_visits_before_order,
        median_session_duration_minutes = ?metrics.median_session_duration_minutes,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Funnel medians computed"
    );

    Ok(metrics)
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "funnel_metrics=info,tower_http=info".into()),
        )
        .init();

    // Load configuration
    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref().map(std::path::Path::new));

    tracing::info!(
        host = %config.host,
        port = config.port,
        source_url = %config.source_url,
        session_gap_minutes = config.session_gap_minutes,
        "Starting Funnel Metrics"
    );

    let metrics = match run_pipeline(&config).await {
        Ok(metrics) => metrics,
        Err(e) => {
            tracing::error!(error = %e, "Pipeline failed");
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState { metrics });
    let app = server::build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    tracing::info!(addr = %addr, "Listening");
    axum::serve(listener, app).await.expect("Server error");
}
