//! Command-line interface definition.

use clap::{Parser, ValueEnum};
use learnhub_client::verification::VerificationTarget;
use learnhub_client::ClientConfig;
use std::path::PathBuf;

/// Headless checkout confirmation for the LearnHub training portal.
#[derive(Parser, Debug)]
#[command(name = "learnhub-confirm")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Checkout session token issued by the payment gateway.
    #[arg(long, short, env = "LEARNHUB_SESSION_TOKEN")]
    pub session_token: String,

    /// What the checkout should unlock.
    #[arg(long, value_enum, default_value = "portal", env = "LEARNHUB_TARGET")]
    pub target: CliTarget,

    /// Course identifier (required when --target course).
    #[arg(long, env = "LEARNHUB_COURSE")]
    pub course: Option<String>,

    /// Base URL of the portal backend API.
    #[arg(long, env = "LEARNHUB_API_URL")]
    pub api_url: Option<String>,

    /// Root directory for device-local data.
    #[arg(long, env = "LEARNHUB_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log level.
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Path to configuration file.
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

/// Confirmation target CLI enum.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliTarget {
    /// Portal-wide access.
    Portal,
    /// A single course enrollment.
    Course,
}

impl Cli {
    /// Resolve CLI arguments into a config, session token and target.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded,
    /// or if `--target course` is missing `--course`.
    pub fn into_parts(self) -> color_eyre::Result<(ClientConfig, String, VerificationTarget)> {
        // Start with default config or load from file
        let mut config = if let Some(ref path) = self.config {
            ClientConfig::from_file(path)?
        } else {
            ClientConfig::default()
        };

        // Override with CLI arguments
        if let Some(api_url) = self.api_url {
            config.gateway.base_url = api_url;
        }
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        config.log_level = self.log_level;

        let target = match self.target {
            CliTarget::Portal => VerificationTarget::PortalAccess,
            CliTarget::Course => {
                let course = self.course.ok_or_else(|| {
                    color_eyre::eyre::eyre!("--course is required with --target course")
                })?;
                VerificationTarget::CourseEnrollment { course }
            }
        };

        Ok((config, self.session_token, target))
    }
}
