//! Configuration for learnhub-client.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Root directory for device-local data (progress, notes, auth session).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Gateway configuration.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Checkout confirmation configuration.
    #[serde(default)]
    pub verification: VerificationConfig,

    /// Local progress store configuration.
    #[serde(default)]
    pub progress: ProgressConfig,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Backend / payment-processor proxy endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the portal backend API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Attempt budgets and poll interval for checkout confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Milliseconds between access/enrollment polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Poll attempt budget when confirming portal-wide access.
    #[serde(default = "default_portal_attempts")]
    pub portal_max_attempts: u32,

    /// Poll attempt budget when confirming a single course enrollment.
    #[serde(default = "default_course_attempts")]
    pub course_max_attempts: u32,
}

/// Retention policy for the local progress store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Resume positions older than this many days are treated as absent.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    /// A position within this many seconds of the end is not worth resuming
    /// and is evicted on write.
    #[serde(default = "default_resume_threshold")]
    pub resume_threshold_secs: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            gateway: GatewayConfig::default(),
            verification: VerificationConfig::default(),
            progress: ProgressConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            portal_max_attempts: default_portal_attempts(),
            course_max_attempts: default_course_attempts(),
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            resume_threshold_secs: default_resume_threshold(),
        }
    }
}

impl VerificationConfig {
    /// Poll interval as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "learnhub")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".learnhub"))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    "https://api.learnhub.dev".to_string()
}

const fn default_request_timeout() -> u64 {
    30
}

const fn default_poll_interval() -> u64 {
    2000
}

const fn default_portal_attempts() -> u32 {
    15
}

const fn default_course_attempts() -> u32 {
    10
}

const fn default_retention_days() -> i64 {
    30
}

const fn default_resume_threshold() -> f64 {
    5.0
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_portal_policy() {
        let config = ClientConfig::default();
        assert_eq!(config.verification.poll_interval_ms, 2000);
        assert_eq!(config.verification.portal_max_attempts, 15);
        assert_eq!(config.verification.course_max_attempts, 10);
        assert_eq!(config.progress.retention_days, 30);
        assert!((config.progress.resume_threshold_secs - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            [gateway]
            base_url = "https://staging.learnhub.dev"
            "#,
        )
        .unwrap();

        assert_eq!(config.gateway.base_url, "https://staging.learnhub.dev");
        assert_eq!(config.gateway.request_timeout_secs, 30);
        assert_eq!(config.verification.poll_interval_ms, 2000);
    }

    #[test]
    fn roundtrips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = ClientConfig::default();
        config.verification.poll_interval_ms = 500;
        config.to_file(&path).unwrap();

        let loaded = ClientConfig::from_file(&path).unwrap();
        assert_eq!(loaded.verification.poll_interval_ms, 500);
    }
}
