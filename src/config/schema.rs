use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::migrate::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_CREATION_REF, DEFAULT_FLUSH_REF,
    DEFAULT_SYSTEM_TABLE_PREFIX, ValidationMode,
};

use super::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub validation: ValidationMode,
    pub system_table_prefix: String,
    pub refs: RefsConfig,
    pub progress: ProgressConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            validation: ValidationMode::default(),
            system_table_prefix: DEFAULT_SYSTEM_TABLE_PREFIX.to_string(),
            refs: RefsConfig::default(),
            progress: ProgressConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Rejects values that would make a run impossible.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.channel_capacity == 0 {
            return Err(invalid("pipeline.channel_capacity", "must be at least 1"));
        }
        if self.refs.flush.trim().is_empty() {
            return Err(invalid("refs.flush", "must not be empty"));
        }
        if self.refs.creation.trim().is_empty() {
            return Err(invalid("refs.creation", "must not be empty"));
        }
        if self.refs.flush == self.refs.creation {
            return Err(invalid("refs.flush", "must differ from refs.creation"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bound of each channel between pipeline stages.
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefsConfig {
    pub flush: String,
    pub creation: String,
}

impl Default for RefsConfig {
    fn default() -> Self {
        Self {
            flush: DEFAULT_FLUSH_REF.to_string(),
            creation: DEFAULT_CREATION_REF.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProgressConfig {
    /// SQLite ledger. Unset means an in-memory ledger that cannot resume.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Tree,
    Pretty,
    Compact,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogRotation {
    Daily,
    Hourly,
    Minutely,
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub stdout: bool,
    pub stdout_format: LogFormat,
    pub filter: Option<String>,
    pub file: FileLoggingConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            stdout: true,
            stdout_format: LogFormat::Tree,
            filter: None,
            file: FileLoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    pub enabled: bool,
    pub dir: Option<PathBuf>,
    pub format: LogFormat,
    pub rotation: LogRotation,
    pub retention_max_files: Option<usize>,
}

impl Default for FileLoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: None,
            format: LogFormat::Json,
            rotation: LogRotation::Daily,
            retention_max_files: Some(10),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfigOverride {
    pub stdout: Option<bool>,
    pub stdout_format: Option<LogFormat>,
    pub filter: Option<String>,
    pub file: Option<FileLoggingConfigOverride>,
}

impl LoggingConfigOverride {
    pub fn apply_to(&self, target: &mut LoggingConfig) {
        if let Some(stdout) = self.stdout {
            target.stdout = stdout;
        }
        if let Some(format) = self.stdout_format {
            target.stdout_format = format;
        }
        if let Some(filter) = self.filter.as_ref() {
            target.filter = Some(filter.clone());
        }
        if let Some(file) = self.file.as_ref() {
            file.apply_to(&mut target.file);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FileLoggingConfigOverride {
    pub enabled: Option<bool>,
    pub dir: Option<PathBuf>,
    pub format: Option<LogFormat>,
    pub rotation: Option<LogRotation>,
    pub retention_max_files: Option<usize>,
}

impl FileLoggingConfigOverride {
    pub fn apply_to(&self, target: &mut FileLoggingConfig) {
        if let Some(enabled) = self.enabled {
            target.enabled = enabled;
        }
        if let Some(dir) = self.dir.as_ref() {
            target.dir = Some(dir.clone());
        }
        if let Some(format) = self.format {
            target.format = format;
        }
        if let Some(rotation) = self.rotation {
            target.rotation = rotation;
        }
        if let Some(files) = self.retention_max_files {
            target.retention_max_files = Some(files);
        }
    }
}

/// Partial config: every field left unset keeps the value underneath.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ConfigLayer {
    pub channel_capacity: Option<usize>,
    pub validation: Option<ValidationMode>,
    pub system_table_prefix: Option<String>,
    pub flush_ref: Option<String>,
    pub creation_ref: Option<String>,
    pub progress_path: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfigOverride,
}

impl ConfigLayer {
    pub fn apply_to(&self, base: &mut Config) {
        if let Some(capacity) = self.channel_capacity {
            base.pipeline.channel_capacity = capacity;
        }
        if let Some(validation) = self.validation {
            base.validation = validation;
        }
        if let Some(prefix) = &self.system_table_prefix {
            base.system_table_prefix = prefix.clone();
        }
        if let Some(flush) = &self.flush_ref {
            base.refs.flush = flush.clone();
        }
        if let Some(creation) = &self.creation_ref {
            base.refs.creation = creation.clone();
        }
        if let Some(path) = &self.progress_path {
            base.progress.path = Some(path.clone());
        }
        self.logging.apply_to(&mut base.logging);
    }
}
