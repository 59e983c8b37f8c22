use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Address the HTTP server binds to
    /// Format: HOST:PORT
    pub bind_addr: String,

    /// Directory where uploaded source files are stored
    pub upload_dir: PathBuf,

    /// Directory where result CSV files are written
    pub results_dir: PathBuf,

    /// Directory for rolling log files
    pub log_dir: PathBuf,

    /// Maximum payload size for all requests (in bytes)
    /// Default: 10MB (10 * 1024 * 1024)
    pub max_payload_size: usize,

    /// Maximum number of jobs processing concurrently
    pub max_concurrent_jobs: usize,

    /// Base URL of the search results page, queried as `<base>?q=<term>`
    pub search_base_url: String,

    /// Timeout for a single search-page navigation (milliseconds)
    pub navigation_timeout_ms: u64,

    /// Timeout while waiting for result links to appear (milliseconds)
    pub selector_timeout_ms: u64,

    /// Pause between companies to bound the request rate (milliseconds)
    pub item_delay_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// All variables are optional and fall back to defaults:
    /// - BIND_ADDR (default: 0.0.0.0:3000)
    /// - UPLOAD_DIR, RESULTS_DIR, LOG_DIR (default: uploads, results, logs)
    /// - MAX_PAYLOAD_SIZE: maximum request payload size in bytes (default: 10485760 = 10MB)
    /// - MAX_CONCURRENT_JOBS (default: 2)
    /// - SEARCH_BASE_URL (default: https://www.bing.com/search)
    /// - NAVIGATION_TIMEOUT_MS, SELECTOR_TIMEOUT_MS, ITEM_DELAY_MS
    pub fn from_env() -> Self {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        Config {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            upload_dir: env_path("UPLOAD_DIR", "uploads"),
            results_dir: env_path("RESULTS_DIR", "results"),
            log_dir: env_path("LOG_DIR", "logs"),
            max_payload_size: env_parse("MAX_PAYLOAD_SIZE", 10 * 1024 * 1024),
            max_concurrent_jobs: env_parse("MAX_CONCURRENT_JOBS", 2),
            search_base_url: env::var("SEARCH_BASE_URL")
                .unwrap_or_else(|_| "https://www.bing.com/search".to_string()),
            navigation_timeout_ms: env_parse("NAVIGATION_TIMEOUT_MS", 20_000),
            selector_timeout_ms: env_parse("SELECTOR_TIMEOUT_MS", 10_000),
            item_delay_ms: env_parse("ITEM_DELAY_MS", 500),
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_path(key: &str, default: &str) -> PathBuf {
    env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}
