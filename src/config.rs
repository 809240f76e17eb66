use crate::decoder::TransferDecoder;
use crate::detection::script_signatures::SignatureScanner;
use crate::filter::{HitPolicy, ScanOrchestrator};
use crate::matcher::{OctetStreamMatcher, DEFAULT_CONTENT_TYPE_TOKEN};
use crate::search::SearchOptions;
use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Bodies larger than this are truncated before scanning.
pub const DEFAULT_MAX_BODY_SIZE: usize = 25 * 1024 * 1024;

fn default_max_body_size() -> usize {
    DEFAULT_MAX_BODY_SIZE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub socket_path: String,
    /// Bytes of message body buffered per transaction
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub actions: ActionsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Case-insensitive token looked for in each part's Content-Type
    pub content_type_token: String,
    pub leaves_only: bool,
    pub recursive: bool,
    pub hit_policy: HitPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    pub score_header: String,
    pub part_header: String,
    /// Reject instead of tagging once the score reaches this value
    pub reject_threshold: Option<f64>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            content_type_token: DEFAULT_CONTENT_TYPE_TOKEN.to_string(),
            leaves_only: true,
            recursive: true,
            hit_policy: HitPolicy::FirstMatch,
        }
    }
}

impl Default for ActionsConfig {
    fn default() -> Self {
        ActionsConfig {
            score_header: "X-Octet-Script-Score".to_string(),
            part_header: "X-Octet-Script-Part".to_string(),
            reject_threshold: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            socket_path: "/var/run/octet-script-milter.sock".to_string(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            scan: ScanConfig::default(),
            actions: ActionsConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path}"))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {path}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.scan.content_type_token.trim().is_empty() {
            anyhow::bail!("scan.content_type_token must not be empty");
        }
        if self.actions.score_header.trim().is_empty() || self.actions.part_header.trim().is_empty() {
            anyhow::bail!("actions header names must not be empty");
        }
        if self.max_body_size == 0 {
            anyhow::bail!("max_body_size must be greater than zero");
        }
        if let Some(threshold) = self.actions.reject_threshold {
            if threshold.is_nan() || threshold <= 0.0 {
                anyhow::bail!("actions.reject_threshold must be positive, got {threshold}");
            }
        }
        Ok(())
    }

    /// Build the scanner described by the `scan` section.
    pub fn build_orchestrator(&self) -> anyhow::Result<ScanOrchestrator> {
        let orchestrator = ScanOrchestrator::with_parts(
            Box::new(OctetStreamMatcher::with_token(&self.scan.content_type_token)),
            Box::new(TransferDecoder::new()),
            SignatureScanner::new()?,
        )
        .with_search_options(SearchOptions {
            leaves_only: self.scan.leaves_only,
            recursive: self.scan.recursive,
        })
        .with_policy(self.scan.hit_policy);
        Ok(orchestrator)
    }
}
