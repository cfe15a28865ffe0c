//! Configuration and value types for file conversion.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::converter::{Details, Parameters};
use crate::error::{Error, Result};
use crate::format::FormatId;

const MIB: u64 = 1024 * 1024;

/// Configuration for one converter category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Whether converters of this category are registered.
    /// Default: true.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Default parameters per output format, overridden by request
    /// parameters.
    #[serde(default)]
    pub parameters: BTreeMap<FormatId, Parameters>,
}

fn default_true() -> bool {
    true
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            parameters: BTreeMap::new(),
        }
    }
}

/// Per-category converter settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConvertersConfig {
    pub categories: BTreeMap<String, CategoryConfig>,
}

impl ConvertersConfig {
    /// Categories absent from the config are enabled.
    pub fn is_enabled(&self, category: &str) -> bool {
        self.categories
            .get(category)
            .map(|c| c.enabled)
            .unwrap_or(true)
    }

    /// Disable a category.
    pub fn disable(mut self, category: impl Into<String>) -> Self {
        self.categories.entry(category.into()).or_default().enabled = false;
        self
    }

    /// Set a default parameter for one output format of a category.
    pub fn default_parameter(
        mut self,
        category: impl Into<String>,
        format: impl Into<FormatId>,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.categories
            .entry(category.into())
            .or_default()
            .parameters
            .entry(format.into())
            .or_default()
            .insert(name.into(), value.into());
        self
    }

    /// Configured defaults for `format` in `category`.
    pub fn defaults_for(&self, category: &str, format: &FormatId) -> Option<&Parameters> {
        self.categories
            .get(category)
            .and_then(|c| c.parameters.get(format))
    }
}

/// Configuration for the conversion engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base directory for per-conversion workspaces.
    /// Default: system temp directory.
    pub temp_dir: Option<PathBuf>,

    /// Keep workspaces after conversion for manual inspection.
    /// Default: false.
    pub preserve_temp_files: bool,

    /// Largest accepted input file.
    /// Default: 100 MiB.
    pub max_file_size_bytes: u64,

    /// Longest converter chain considered when no direct converter exists.
    /// Default: 3.
    pub max_conversion_steps: usize,

    /// Worker threads for batch conversion.
    /// Default: number of CPU cores.
    pub batch_threads: usize,

    /// Path to the soffice binary used by the office converters.
    /// If None, searches PATH.
    pub soffice_path: Option<PathBuf>,

    /// Per-category converter settings.
    pub converters: ConvertersConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            preserve_temp_files: false,
            max_file_size_bytes: 100 * MIB,
            max_conversion_steps: 3,
            batch_threads: num_cpus::get(),
            soffice_path: None,
            converters: ConvertersConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Set the workspace base directory.
    pub fn temp_dir(mut self, dir: PathBuf) -> Self {
        self.temp_dir = Some(dir);
        self
    }

    /// Keep workspaces after conversion.
    pub fn preserve_temp_files(mut self, preserve: bool) -> Self {
        self.preserve_temp_files = preserve;
        self
    }

    /// Set the input size ceiling in bytes.
    pub fn max_file_size_bytes(mut self, bytes: u64) -> Self {
        self.max_file_size_bytes = bytes;
        self
    }

    /// Set the input size ceiling in mebibytes.
    pub fn max_file_size_mb(mut self, mb: u64) -> Self {
        self.max_file_size_bytes = mb.saturating_mul(MIB);
        self
    }

    /// Set the longest converter chain considered.
    pub fn max_conversion_steps(mut self, steps: usize) -> Self {
        self.max_conversion_steps = steps;
        self
    }

    /// Set the number of batch worker threads.
    pub fn batch_threads(mut self, threads: usize) -> Self {
        self.batch_threads = threads;
        self
    }

    /// Set the soffice binary path.
    pub fn soffice_path(mut self, path: PathBuf) -> Self {
        self.soffice_path = Some(path);
        self
    }

    /// Replace the per-category converter settings.
    pub fn converters(mut self, converters: ConvertersConfig) -> Self {
        self.converters = converters;
        self
    }

    /// Disable one converter category.
    pub fn disable_category(mut self, category: impl Into<String>) -> Self {
        self.converters = self.converters.disable(category);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_conversion_steps == 0 {
            return Err(Error::InvalidConfig(
                "max_conversion_steps must be at least 1".to_string(),
            ));
        }
        if self.batch_threads == 0 {
            return Err(Error::InvalidConfig(
                "batch_threads must be at least 1".to_string(),
            ));
        }
        if let Some(dir) = &self.temp_dir {
            if dir.exists() && !dir.is_dir() {
                return Err(Error::InvalidConfig(format!(
                    "temp_dir is not a directory: {}",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}

/// A single conversion request.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// Path to the input file.
    pub input_path: PathBuf,

    /// Path to write the output file. Its parent must exist.
    pub output_path: PathBuf,

    /// Parameters passed to every stage.
    pub parameters: Parameters,
}

impl ConversionRequest {
    /// Create a new conversion request.
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            parameters: Parameters::new(),
        }
    }

    /// Replace all parameters.
    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set one parameter.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Input file name for progress reporting.
    pub fn display_name(&self) -> String {
        self.input_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string()
    }
}

/// Result of one stage of a conversion path.
#[derive(Debug, Clone, Serialize)]
pub struct StageResult {
    /// Stage number (1-indexed).
    pub index: usize,

    /// Name of the converter that ran.
    pub converter: String,

    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub input_format: FormatId,
    pub output_format: FormatId,

    /// Details reported by the converter.
    pub details: Details,

    /// Processing time for this stage.
    pub duration: Duration,
}

/// Result of a successful conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub input_format: FormatId,
    pub output_format: FormatId,

    /// Per-stage results in execution order.
    pub stages: Vec<StageResult>,

    /// Details of all stages merged, later stages winning.
    pub details: Details,

    /// Workspace used by this conversion.
    pub workspace: PathBuf,

    /// Whether the workspace was kept on disk.
    pub workspace_preserved: bool,

    /// Total processing time.
    pub duration: Duration,
}

impl ConversionResult {
    /// Number of converter invocations.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// True if the conversion went through intermediate formats.
    pub fn is_multi_step(&self) -> bool {
        self.stages.len() > 1
    }

    /// Resolved (input, output) format pair.
    pub fn format_pair(&self) -> (&str, &str) {
        (self.input_format.as_str(), self.output_format.as_str())
    }
}

/// Progress information for a batch conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionProgress {
    /// Index of the current file being processed.
    pub file_index: usize,

    /// Total number of files to process.
    pub total_files: usize,

    /// Name of the current file.
    pub current_file: String,

    /// Current state of the file.
    pub state: ProgressState,
}

/// State of one file in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressState {
    /// Queued, waiting to start.
    Queued,
    /// Conversion running.
    Converting,
    /// Completed successfully.
    Completed,
    /// Failed with error.
    Failed,
}

/// Result of a batch conversion.
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Successful conversions.
    pub successful: Vec<ConversionResult>,

    /// Failed conversions.
    pub failed: Vec<FailedFile>,

    /// Total processing time.
    pub total_duration: Duration,
}

impl BatchResult {
    pub fn total_files(&self) -> usize {
        self.successful.len() + self.failed.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Information about a failed conversion.
#[derive(Debug, Clone)]
pub struct FailedFile {
    /// Original input path.
    pub input_path: PathBuf,

    /// Requested output path.
    pub output_path: PathBuf,

    /// Error message.
    pub error: String,
}
