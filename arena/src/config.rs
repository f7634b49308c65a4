//! Runtime configuration for the arena.
//!
//! Each value has one getter: the environment variable wins, then the
//! default.
//!
//! - `CHESS_ARENA_DATA_DIR`: settings and credentials (default: platform data dir, else `./data`)
//! - `CHESS_ARENA_LOG_DIR`: rolling log files (default: `<data dir>/logs`)
//! - `CHESS_ARENA_AUTOPLAY_DELAY_MS`: pause between auto-play steps (default 1000)
//! - `CHESS_ARENA_REPLY_DELAY_MS`: pause before an agent answers a human move (default 500)

use std::path::PathBuf;
use std::time::Duration;

use agent::RetryPolicy;
use directories::ProjectDirs;

const DEV_DATA_DIR: &str = "./data";
const DEFAULT_AUTOPLAY_DELAY_MS: u64 = 1000;
const DEFAULT_REPLY_DELAY_MS: u64 = 500;

/// Get the data directory for persistence.
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CHESS_ARENA_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(dirs) = ProjectDirs::from("", "", "chess-arena") {
        return dirs.data_dir().to_path_buf();
    }

    PathBuf::from(DEV_DATA_DIR)
}

pub fn get_log_dir() -> PathBuf {
    match std::env::var("CHESS_ARENA_LOG_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => get_data_dir().join("logs"),
    }
}

pub fn get_settings_path() -> PathBuf {
    get_data_dir().join("settings.json")
}

pub fn get_autoplay_delay() -> Duration {
    millis_from_env("CHESS_ARENA_AUTOPLAY_DELAY_MS", DEFAULT_AUTOPLAY_DELAY_MS)
}

pub fn get_reply_delay() -> Duration {
    millis_from_env("CHESS_ARENA_REPLY_DELAY_MS", DEFAULT_REPLY_DELAY_MS)
}

fn millis_from_env(var: &str, default_ms: u64) -> Duration {
    let ms = std::env::var(var)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default_ms);
    Duration::from_millis(ms)
}

/// Timing knobs for the turn orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Interval between auto-play steps.
    pub autoplay_delay: Duration,
    /// Delay before an agent answers a human move (and opens a new game as
    /// White). `None` turns the automatic reply off.
    pub reply_delay: Option<Duration>,
    pub retry: RetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            autoplay_delay: Duration::from_millis(DEFAULT_AUTOPLAY_DELAY_MS),
            reply_delay: Some(Duration::from_millis(DEFAULT_REPLY_DELAY_MS)),
            retry: RetryPolicy::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_env() -> Self {
        Self {
            autoplay_delay: get_autoplay_delay(),
            reply_delay: Some(get_reply_delay()),
            retry: RetryPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_data_dir_is_not_empty() {
        // Either CHESS_ARENA_DATA_DIR, the platform dir or ./data.
        assert!(!get_data_dir().as_os_str().is_empty());
        assert!(get_log_dir().ends_with("logs") || std::env::var("CHESS_ARENA_LOG_DIR").is_ok());
    }

    #[test]
    fn test_unparseable_delay_uses_default() {
        assert_eq!(
            millis_from_env("CHESS_ARENA_TEST_UNSET_DELAY", 750),
            Duration::from_millis(750)
        );
    }
}
