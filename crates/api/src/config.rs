use std::str::FromStr;
use std::time::Duration;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for in-flight analyses, in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Job runner and retention settings.
    pub analysis: AnalysisConfig,
}

/// Settings for the analysis runner, its queue, and job retention.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Fixed processing delay of the simulated analyzer.
    pub simulated_delay: Duration,
    /// Upper bound on a single analysis before it is failed.
    pub timeout: Duration,
    /// Maximum analyses running at once.
    pub concurrency: usize,
    /// Capacity of the submit -> runner queue.
    pub queue_capacity: usize,
    /// Finished jobs older than this are purged.
    pub retention: chrono::Duration,
    /// Bound on jobs held by the in-memory store.
    pub max_retained_jobs: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            simulated_delay: Duration::from_millis(3000),
            timeout: Duration::from_secs(60),
            concurrency: 4,
            queue_capacity: 256,
            retention: chrono::Duration::hours(24),
            max_retained_jobs: 1000,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                 |
    /// |---------------------------|-------------------------|
    /// | `HOST`                    | `0.0.0.0`               |
    /// | `PORT`                    | `3000`                  |
    /// | `CORS_ORIGINS`            | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`   | `30`                    |
    ///
    /// Analysis settings are read by [`AnalysisConfig::from_env`].
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            host,
            port: env_or("PORT", 3000),
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", 30),
            analysis: AnalysisConfig::from_env(),
        }
    }
}

impl AnalysisConfig {
    /// | Env Var                   | Default |
    /// |---------------------------|---------|
    /// | `ANALYSIS_DELAY_MS`       | `3000`  |
    /// | `ANALYSIS_TIMEOUT_SECS`   | `60`    |
    /// | `ANALYSIS_CONCURRENCY`    | `4`     |
    /// | `ANALYSIS_QUEUE_CAPACITY` | `256`   |
    /// | `JOB_RETENTION_HOURS`     | `24`    |
    /// | `MAX_RETAINED_JOBS`       | `1000`  |
    pub fn from_env() -> Self {
        Self {
            simulated_delay: Duration::from_millis(env_or("ANALYSIS_DELAY_MS", 3000)),
            timeout: Duration::from_secs(env_or("ANALYSIS_TIMEOUT_SECS", 60)),
            concurrency: env_or::<usize>("ANALYSIS_CONCURRENCY", 4).max(1),
            queue_capacity: env_or::<usize>("ANALYSIS_QUEUE_CAPACITY", 256).max(1),
            retention: retention_from_hours(env_or("JOB_RETENTION_HOURS", 24)),
            max_retained_jobs: env_or::<usize>("MAX_RETAINED_JOBS", 1000).max(1),
        }
    }
}

/// Convert `JOB_RETENTION_HOURS` into a duration, panicking on a value
/// chrono cannot represent.
fn retention_from_hours(hours: i64) -> chrono::Duration {
    chrono::Duration::try_hours(hours)
        .filter(|d| *d >= chrono::Duration::zero())
        .unwrap_or_else(|| panic!("JOB_RETENTION_HOURS has an invalid value: '{hours}'"))
}

/// Read and parse an env var, falling back to `default` when unset.
///
/// Panics on a present but unparsable value: misconfiguration should fail
/// at startup, not at first use.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{key} has an invalid value: '{raw}'")),
        Err(_) => default,
    }
}
