use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_WORKER_CONCURRENCY: usize = 8;
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 20;

/// Engine settings, read from `WORKSYNC_*` environment variables with
/// defaults suitable for local use.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root under which each project gets one working directory, keyed by
    /// project id.
    pub local_root: PathBuf,
    /// Upper bound on concurrent transfer tasks, shared by pull and push.
    pub worker_concurrency: usize,
    /// Delay between scheduled background pushes for an open session.
    pub sync_interval: Duration,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let local_root = std::env::var("WORKSYNC_LOCAL_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_local_root());
        let worker_concurrency =
            read_limit_env("WORKSYNC_WORKER_CONCURRENCY", DEFAULT_WORKER_CONCURRENCY);
        let sync_interval = Duration::from_secs(read_u64_env(
            "WORKSYNC_SYNC_INTERVAL_SECS",
            DEFAULT_SYNC_INTERVAL_SECS,
        ));
        Self {
            local_root,
            worker_concurrency,
            sync_interval,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn default_local_root() -> PathBuf {
    std::env::temp_dir().join("worksync").join("projects")
}

fn read_u64_env(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn read_limit_env(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}
