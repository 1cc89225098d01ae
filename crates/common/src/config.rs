use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::errors::{AppError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub io: IoConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(".")
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Config::builder()
            .add_source(
                File::with_name(
                    path.as_ref()
                        .join("config/default")
                        .to_string_lossy()
                        .as_ref(),
                )
                .required(false),
            )
            .add_source(
                File::with_name(
                    path.as_ref()
                        .join("config/local")
                        .to_string_lossy()
                        .as_ref(),
                )
                .required(false),
            )
            .add_source(Environment::default().separator("__"))
            .build()?
            .try_deserialize()
    }
}

/// Numeric repository columns the outlier handler may be pointed at.
pub const OUTLIER_COLUMNS: &[&str] = &["stars", "forks", "open_issues"];

pub const REPOSITORY_KEY_COLUMNS: &[&str] = &["id", "full_name", "name"];
pub const RECORD_KEY_COLUMNS: &[&str] = &["id", "repository", "number"];

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "PipelineConfig::default_outliers")]
    pub outliers: Vec<OutlierRule>,
    #[serde(default)]
    pub size_bins: SizeBins,
    #[serde(default = "PipelineConfig::default_stale_after_days")]
    pub stale_after_days: i64,
    #[serde(default)]
    pub dedup: DedupConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            outliers: Self::default_outliers(),
            size_bins: SizeBins::default(),
            stale_after_days: Self::default_stale_after_days(),
            dedup: DedupConfig::default(),
        }
    }
}

impl PipelineConfig {
    fn default_outliers() -> Vec<OutlierRule> {
        OUTLIER_COLUMNS
            .iter()
            .map(|column| OutlierRule {
                column: (*column).to_string(),
                strategy: OutlierStrategy::IqrClip {
                    k: OutlierStrategy::default_k(),
                },
            })
            .collect()
    }

    const fn default_stale_after_days() -> i64 {
        180
    }

    /// Ten thousand years; far beyond any snapshot's history.
    pub const MAX_STALE_AFTER_DAYS: i64 = 365 * 10_000;

    pub fn validate(&self) -> Result<()> {
        for rule in &self.outliers {
            if !OUTLIER_COLUMNS.contains(&rule.column.as_str()) {
                return Err(AppError::invalid(format!(
                    "outlier rule targets unknown column `{}`",
                    rule.column
                )));
            }
            rule.strategy.validate()?;
        }
        self.size_bins.validate()?;
        if !(0..=Self::MAX_STALE_AFTER_DAYS).contains(&self.stale_after_days) {
            return Err(AppError::invalid(format!(
                "stale_after_days must be between 0 and {}",
                Self::MAX_STALE_AFTER_DAYS
            )));
        }
        self.dedup.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OutlierRule {
    pub column: String,
    #[serde(flatten)]
    pub strategy: OutlierStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "method", rename_all = "kebab-case")]
pub enum OutlierStrategy {
    PercentileClip {
        #[serde(default = "OutlierStrategy::default_p")]
        p: f64,
    },
    IqrClip {
        #[serde(default = "OutlierStrategy::default_k")]
        k: f64,
    },
    ZscoreImpute {
        #[serde(default = "OutlierStrategy::default_t")]
        t: f64,
    },
    LogTransform,
}

impl OutlierStrategy {
    pub const fn default_p() -> f64 {
        0.99
    }

    pub const fn default_k() -> f64 {
        1.5
    }

    pub const fn default_t() -> f64 {
        3.0
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::PercentileClip { .. } => "percentile-clip",
            Self::IqrClip { .. } => "iqr-clip",
            Self::ZscoreImpute { .. } => "zscore-impute",
            Self::LogTransform => "log-transform",
        }
    }

    fn validate(&self) -> Result<()> {
        match *self {
            Self::PercentileClip { p } if !(0.0..=1.0).contains(&p) => Err(AppError::invalid(
                format!("percentile-clip p must be within [0, 1], got {p}"),
            )),
            Self::IqrClip { k } if !k.is_finite() || k < 0.0 => Err(AppError::invalid(format!(
                "iqr-clip k must be a non-negative number, got {k}"
            ))),
            Self::ZscoreImpute { t } if !t.is_finite() || t <= 0.0 => Err(AppError::invalid(
                format!("zscore-impute t must be positive, got {t}"),
            )),
            _ => Ok(()),
        }
    }
}

/// Lower edges of the small, medium, large and mega star classes.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct SizeBins(pub [f64; 4]);

impl Default for SizeBins {
    fn default() -> Self {
        Self([1_000.0, 10_000.0, 100_000.0, 250_000.0])
    }
}

impl SizeBins {
    pub fn edges(&self) -> &[f64; 4] {
        &self.0
    }

    pub fn validate(&self) -> Result<()> {
        let edges = &self.0;
        if edges.iter().any(|edge| edge.is_nan()) {
            return Err(AppError::invalid("size bin edges must be numbers"));
        }
        let ascending = edges.windows(2).all(|pair| {
            pair[0] < pair[1] || (pair[0] == f64::INFINITY && pair[1] == f64::INFINITY)
        });
        if !ascending {
            return Err(AppError::invalid(format!(
                "size bin edges must be strictly ascending, got {edges:?}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DedupConfig {
    #[serde(default = "DedupConfig::default_repositories")]
    pub repositories: Vec<String>,
    #[serde(default = "DedupConfig::default_records")]
    pub issues: Vec<String>,
    #[serde(default = "DedupConfig::default_records")]
    pub pull_requests: Vec<String>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            repositories: Self::default_repositories(),
            issues: Self::default_records(),
            pull_requests: Self::default_records(),
        }
    }
}

impl DedupConfig {
    fn default_repositories() -> Vec<String> {
        vec!["full_name".to_string()]
    }

    fn default_records() -> Vec<String> {
        vec!["repository".to_string(), "number".to_string()]
    }

    fn validate(&self) -> Result<()> {
        check_keys("repositories", &self.repositories, REPOSITORY_KEY_COLUMNS)?;
        check_keys("issues", &self.issues, RECORD_KEY_COLUMNS)?;
        check_keys("pull_requests", &self.pull_requests, RECORD_KEY_COLUMNS)
    }
}

fn check_keys(table: &str, keys: &[String], allowed: &[&str]) -> Result<()> {
    if keys.is_empty() {
        return Err(AppError::invalid(format!(
            "dedup keys for {table} must not be empty"
        )));
    }
    if let Some(unknown) = keys.iter().find(|key| !allowed.contains(&key.as_str())) {
        return Err(AppError::invalid(format!(
            "dedup key `{unknown}` is not a column of {table}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct IoConfig {
    #[serde(default = "IoConfig::default_input_dir")]
    pub input_dir: PathBuf,
    #[serde(default = "IoConfig::default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            input_dir: Self::default_input_dir(),
            output_dir: Self::default_output_dir(),
        }
    }
}

impl IoConfig {
    fn default_input_dir() -> PathBuf {
        PathBuf::from("data/raw")
    }

    fn default_output_dir() -> PathBuf {
        PathBuf::from("data/processed")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "RetryConfig::default_base_ms")]
    pub base_ms: u64,
    #[serde(default = "RetryConfig::default_max_ms")]
    pub max_ms: u64,
    #[serde(default = "RetryConfig::default_jitter_frac")]
    pub jitter_frac: f32,
    #[serde(default = "RetryConfig::default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_ms: Self::default_base_ms(),
            max_ms: Self::default_max_ms(),
            jitter_frac: Self::default_jitter_frac(),
            max_attempts: Self::default_max_attempts(),
        }
    }
}

impl RetryConfig {
    const fn default_base_ms() -> u64 {
        200
    }

    const fn default_max_ms() -> u64 {
        5_000
    }

    const fn default_jitter_frac() -> f32 {
        0.2
    }

    const fn default_max_attempts() -> u32 {
        3
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "ObservabilityConfig::default_log_level")]
    pub log_level: String,
    #[serde(default = "ObservabilityConfig::default_metrics_file")]
    pub metrics_file: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            metrics_file: Self::default_metrics_file(),
        }
    }
}

impl ObservabilityConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }

    fn default_metrics_file() -> String {
        "metrics.prom".to_string()
    }
}
