// src/config.rs
//! Service configuration: TOML file plus env overrides.
//!
//! Resolution:
//! 1) $ATTRITION_CONFIG_PATH (must exist when set)
//! 2) config/attrition.toml
//! 3) built-in defaults
//!
//! Then `ATTRITION_MODEL_PATH`, `ATTRITION_THRESHOLD` and `ATTRITION_METRICS`
//! override the file.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::aggregate::DEFAULT_GROUP_FIELD;
use crate::pipeline::DEFAULT_THRESHOLD;

pub const DEFAULT_CONFIG_PATH: &str = "config/attrition.toml";
pub const DEFAULT_MODEL_PATH: &str = "models/attrition_model.json";

pub const ENV_CONFIG_PATH: &str = "ATTRITION_CONFIG_PATH";
pub const ENV_MODEL_PATH: &str = "ATTRITION_MODEL_PATH";
pub const ENV_THRESHOLD: &str = "ATTRITION_THRESHOLD";
pub const ENV_METRICS: &str = "ATTRITION_METRICS";

fn default_model_path() -> PathBuf {
    PathBuf::from(DEFAULT_MODEL_PATH)
}
fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}
fn default_group_field() -> Option<String> {
    Some(DEFAULT_GROUP_FIELD.to_string())
}
fn default_max_upload_bytes() -> usize {
    5 * 1024 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    /// Probability at or above which a record is labelled 1.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Secondary grouping for batch summaries; empty string disables it.
    #[serde(default = "default_group_field")]
    pub group_field: Option<String>,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Optional CSV checked against the category tables at startup.
    #[serde(default)]
    pub sample_data_path: Option<PathBuf>,
    #[serde(default)]
    pub metrics_enabled: bool,
    #[serde(default)]
    pub bounds: InputBounds,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            threshold: default_threshold(),
            group_field: default_group_field(),
            max_upload_bytes: default_max_upload_bytes(),
            sample_data_path: None,
            metrics_enabled: false,
            bounds: InputBounds::default(),
        }
    }
}

/// Range policy of the single-record form (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputBounds {
    pub age_min: u32,
    pub age_max: u32,
    pub education_min: u32,
    pub education_max: u32,
    pub income_min: u32,
    pub income_max: u32,
}

impl Default for InputBounds {
    fn default() -> Self {
        Self {
            age_min: 18,
            age_max: 60,
            education_min: 1,
            education_max: 5,
            income_min: 1000,
            income_max: 20000,
        }
    }
}

impl InputBounds {
    fn sanitize(&mut self) {
        // keep a valid interval, as with the other band settings
        if self.age_min > self.age_max {
            std::mem::swap(&mut self.age_min, &mut self.age_max);
        }
        if self.education_min > self.education_max {
            std::mem::swap(&mut self.education_min, &mut self.education_max);
        }
        if self.income_min > self.income_max {
            std::mem::swap(&mut self.income_min, &mut self.income_max);
        }
    }
}

// parse optional float env and clamp to <0.0..=1.0>
fn parse_threshold_env(raw: Option<String>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
}

impl AppConfig {
    /// Parse from TOML text, without env overrides.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: AppConfig = toml::from_str(s)?;
        cfg.normalize();
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Env path, then default path, then defaults; env overrides applied last.
    pub fn load() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default.exists() {
                Self::load_from(&default)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env();
        info!(
            target: "attrition",
            model_path = %cfg.model_path.display(),
            threshold = cfg.threshold,
            group_field = ?cfg.group_field,
            metrics = cfg.metrics_enabled,
            "config loaded"
        );
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(p) = std::env::var(ENV_MODEL_PATH) {
            if !p.trim().is_empty() {
                self.model_path = PathBuf::from(p);
            }
        }
        if let Some(t) = parse_threshold_env(std::env::var(ENV_THRESHOLD).ok()) {
            self.threshold = t;
        }
        if let Ok(v) = std::env::var(ENV_METRICS) {
            self.metrics_enabled = v == "1";
        }
    }

    fn normalize(&mut self) {
        if !self.threshold.is_finite() {
            self.threshold = DEFAULT_THRESHOLD;
        }
        self.threshold = self.threshold.clamp(0.0, 1.0);
        if self
            .group_field
            .as_deref()
            .is_some_and(|g| g.trim().is_empty())
        {
            self.group_field = None;
        }
        self.bounds.sanitize();
    }
}
