//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env from the current directory if it exists.
    ///
    /// Returns whether a file was loaded. Variables already present in the
    /// process environment are not overwritten.
    pub fn load_env_file() -> Result<bool> {
        Self::load_env_file_from(Path::new(".env"))
    }

    pub fn load_env_file_from(path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }

        dotenv::from_path(path)
            .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;
        Ok(true)
    }

    /// Names of the supported `PQT_*` variables that are currently set
    pub fn active_vars() -> Vec<&'static str> {
        SUPPORTED_VARS
            .iter()
            .copied()
            .filter(|var| std::env::var_os(var).is_some())
            .collect()
    }
}

/// Every environment variable the configuration reads
pub const SUPPORTED_VARS: &[&str] = &[
    "PQT_TARGET",
    "PQT_SAMPLES",
    "PQT_METRICS",
    "PQT_INTERVAL_MS",
    "PQT_PROBE_TIMEOUT_MS",
    "PQT_PAYLOAD_SIZE",
    "PQT_METRIC_TIMEOUT_SECS",
    "PQT_MAX_ATTEMPTS",
    "PQT_MTU_MIN",
    "PQT_MTU_MAX",
    "PQT_DNS_DOMAINS",
    "PQT_SPEEDTEST_URL",
    "PQT_ENABLE_COLOR",
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_missing_env_file() {
        let loaded = EnvManager::load_env_file_from(Path::new("/nonexistent/.env")).unwrap();
        assert!(!loaded);
    }

    #[test]
    fn test_load_env_file_from_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "PQT_TEST_ONLY_MARKER=loaded").unwrap();

        assert!(EnvManager::load_env_file_from(file.path()).unwrap());
        assert_eq!(std::env::var("PQT_TEST_ONLY_MARKER").unwrap(), "loaded");
    }
}
