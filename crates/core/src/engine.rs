//! Conversion engine that ties the registry, path planning and workspaces
//! together.
//!
//! This module provides the high-level API for converting files, with
//! support for batch processing and progress callbacks.

use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::{
    BatchResult, ConversionProgress, ConversionRequest, ConversionResult, EngineConfig,
    FailedFile, ProgressState, StageResult,
};
use crate::converter::{ConversionJob, Details, ParamSpec, Parameters};
use crate::converters::BuiltinProvider;
use crate::error::{ConversionError, Error, Result, ValidationError};
use crate::format::{self, FormatId};
use crate::registry::{ConversionPath, ConverterProvider, Registry};
use crate::workspace::TempWorkspace;

/// Main entry point for file conversion.
///
/// Safe to share between threads: every call owns its own workspace and
/// the registry only synchronizes its instance cache.
#[derive(Debug)]
pub struct ConversionEngine {
    /// Converter index.
    registry: Arc<Registry>,
    /// Configuration.
    config: EngineConfig,
    /// Workers for [`ConversionEngine::convert_batch`].
    batch_pool: rayon::ThreadPool,
    successful: AtomicUsize,
    failed: AtomicUsize,
}

impl ConversionEngine {
    /// Create an engine with the built-in converters.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let provider = BuiltinProvider::new().with_soffice_path(config.soffice_path.clone());
        Self::with_provider(config, &provider)
    }

    /// Create an engine from the converters of `provider`.
    pub fn with_provider(config: EngineConfig, provider: &dyn ConverterProvider) -> Result<Self> {
        config.validate()?;
        let registry = Registry::discover(provider, &config.converters);
        Self::with_registry(config, Arc::new(registry))
    }

    /// Create an engine around an existing registry.
    pub fn with_registry(config: EngineConfig, registry: Arc<Registry>) -> Result<Self> {
        config.validate()?;

        let batch_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.batch_threads)
            .thread_name(|i| format!("fileconverter-batch-{}", i))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("Failed to create thread pool: {}", e)))?;

        info!(
            "Conversion engine initialized with {} conversion pairs, max_conversion_steps={}, batch_threads={}",
            registry.pair_count(),
            config.max_conversion_steps,
            config.batch_threads
        );

        Ok(Self {
            registry,
            config,
            batch_pool,
            successful: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        })
    }

    /// Create an engine with default settings.
    pub fn with_defaults() -> Result<Self> {
        Self::new(EngineConfig::default())
    }

    /// Convert `input` to `output`, deriving both formats from the file
    /// extensions.
    pub fn convert(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        parameters: &Parameters,
    ) -> Result<ConversionResult> {
        let result = self.run(input.as_ref(), output.as_ref(), parameters);
        match &result {
            Ok(_) => self.successful.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.failed.fetch_add(1, Ordering::Relaxed),
        };
        result
    }

    /// Convert a single request.
    pub fn convert_request(&self, request: &ConversionRequest) -> Result<ConversionResult> {
        self.convert(&request.input_path, &request.output_path, &request.parameters)
    }

    fn run(
        &self,
        input_path: &Path,
        output_path: &Path,
        parameters: &Parameters,
    ) -> Result<ConversionResult> {
        let start = Instant::now();
        info!("Converting {:?} to {:?}", input_path, output_path);

        self.validate_input(input_path)?;
        let input_format = self.resolve_format(input_path)?;
        let output_format = self.resolve_format(output_path)?;

        let path = self.plan(&input_format, &output_format)?;
        let stage_parameters = self.stage_parameters(&path, parameters)?;

        let workspace = TempWorkspace::create(
            self.config.temp_dir.as_deref(),
            self.config.preserve_temp_files,
        )?;
        let output_existed = output_path.exists();

        let stages = match self.execute(&path, &stage_parameters, input_path, output_path, &workspace) {
            Ok(stages) => stages,
            Err(e) => {
                if e.stage_index() == Some(path.len()) && !output_existed {
                    remove_partial_output(output_path);
                }
                return Err(e.into());
            }
        };

        let workspace_preserved = workspace.is_preserved();
        let workspace = workspace.finish();

        let mut details = Details::new();
        for stage in &stages {
            details.extend(stage.details.clone());
        }
        details.insert("input_format".into(), input_format.as_str().into());
        details.insert("output_format".into(), output_format.as_str().into());
        details.insert("input_path".into(), input_path.display().to_string().into());
        details.insert("output_path".into(), output_path.display().to_string().into());

        info!(
            "Converted {:?} ({} -> {}) in {} stage(s) in {:?}",
            input_path,
            input_format,
            output_format,
            stages.len(),
            start.elapsed()
        );

        Ok(ConversionResult {
            input_path: input_path.to_path_buf(),
            output_path: output_path.to_path_buf(),
            input_format,
            output_format,
            stages,
            details,
            workspace,
            workspace_preserved,
            duration: start.elapsed(),
        })
    }

    fn validate_input(&self, path: &Path) -> std::result::Result<(), ValidationError> {
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ValidationError::InputNotFound(path.to_path_buf()))
            }
            Err(source) => {
                return Err(ValidationError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        if !metadata.is_file() {
            return Err(ValidationError::NotAFile(path.to_path_buf()));
        }

        File::open(path).map_err(|source| ValidationError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        if metadata.len() > self.config.max_file_size_bytes {
            return Err(ValidationError::FileTooLarge {
                path: path.to_path_buf(),
                size_bytes: metadata.len(),
                limit_bytes: self.config.max_file_size_bytes,
            });
        }
        Ok(())
    }

    fn resolve_format(&self, path: &Path) -> std::result::Result<FormatId, ValidationError> {
        format::extension_of(path)
            .and_then(|ext| self.registry.resolve_extension(&ext))
            .ok_or_else(|| ValidationError::UndeterminableFormat {
                path: path.to_path_buf(),
            })
    }

    /// The converter chain the engine would run for a format pair.
    pub fn plan(&self, input: impl AsRef<str>, output: impl AsRef<str>) -> Result<ConversionPath> {
        let input = FormatId::new(input);
        let output = FormatId::new(output);

        if input == output {
            return Ok(ConversionPath::identity(&input));
        }

        self.registry
            .find_path(&input, &output, self.config.max_conversion_steps)
            .ok_or_else(|| {
                ConversionError::NoConversionPath {
                    input_format: input,
                    output_format: output,
                }
                .into()
            })
    }

    /// Parameters for each stage: configured category defaults for the
    /// stage's output format, overridden by the caller's parameters.
    fn stage_parameters(
        &self,
        path: &ConversionPath,
        parameters: &Parameters,
    ) -> std::result::Result<Vec<Parameters>, ValidationError> {
        path.stages()
            .iter()
            .map(|stage| {
                let mut merged = self
                    .config
                    .converters
                    .defaults_for(&stage.descriptor.category, &stage.output_format)
                    .cloned()
                    .unwrap_or_default();
                merged.extend(parameters.clone());

                if let Some(schema) = stage.descriptor.parameters.get(&stage.output_format) {
                    for (name, value) in &merged {
                        if let Some(spec) = schema.get(name) {
                            spec.validate(name, value)?;
                        }
                    }
                }
                Ok(merged)
            })
            .collect()
    }

    fn execute(
        &self,
        path: &ConversionPath,
        parameters: &[Parameters],
        input_path: &Path,
        output_path: &Path,
        workspace: &TempWorkspace,
    ) -> std::result::Result<Vec<StageResult>, ConversionError> {
        let total = path.len();
        let mut results = Vec::with_capacity(total);
        let mut current = input_path.to_path_buf();

        for (i, (stage, params)) in path.stages().iter().zip(parameters).enumerate() {
            let index = i + 1;
            let target = if index == total {
                output_path.to_path_buf()
            } else {
                let extension = self
                    .registry
                    .format_extensions(&stage.output_format)
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| stage.output_format.to_string());
                workspace.intermediate_path(index, &extension)
            };

            debug!(
                "Stage {}/{}: {} ({} -> {})",
                index, total, stage.descriptor.name, stage.input_format, stage.output_format
            );
            let stage_start = Instant::now();
            let job = ConversionJob {
                input_path: &current,
                output_path: &target,
                temp_dir: workspace.path(),
                input_format: &stage.input_format,
                output_format: &stage.output_format,
                parameters: params,
            };

            let details = stage
                .converter
                .convert(&job)
                .and_then(|details| {
                    if target.exists() {
                        Ok(details)
                    } else {
                        Err(ConversionError::MissingOutput(target.clone()))
                    }
                })
                .map_err(|source| ConversionError::Stage {
                    index,
                    total,
                    converter: stage.descriptor.name.clone(),
                    input_format: stage.input_format.clone(),
                    output_format: stage.output_format.clone(),
                    source: Box::new(source),
                })?;

            results.push(StageResult {
                index,
                converter: stage.descriptor.name.clone(),
                input_path: current,
                output_path: target.clone(),
                input_format: stage.input_format.clone(),
                output_format: stage.output_format.clone(),
                details,
                duration: stage_start.elapsed(),
            });
            current = target;
        }

        Ok(results)
    }

    /// Convert multiple files in parallel on the batch thread pool.
    pub fn convert_batch(&self, requests: Vec<ConversionRequest>) -> BatchResult {
        let start = Instant::now();

        let outcomes: Vec<(ConversionRequest, Result<ConversionResult>)> =
            self.batch_pool.install(|| {
                requests
                    .into_par_iter()
                    .map(|request| {
                        let result = self.convert_request(&request);
                        (request, result)
                    })
                    .collect()
            });

        let mut successful = Vec::new();
        let mut failed = Vec::new();
        for (request, outcome) in outcomes {
            match outcome {
                Ok(result) => successful.push(result),
                Err(e) => {
                    error!("Failed to convert {:?}: {}", request.input_path, e);
                    failed.push(FailedFile {
                        input_path: request.input_path,
                        output_path: request.output_path,
                        error: e.to_string(),
                    });
                }
            }
        }

        BatchResult {
            successful,
            failed,
            total_duration: start.elapsed(),
        }
    }

    /// Convert multiple files one after another, reporting progress.
    pub fn convert_batch_with_progress<F>(
        &self,
        requests: Vec<ConversionRequest>,
        progress_callback: F,
    ) -> BatchResult
    where
        F: Fn(ConversionProgress),
    {
        let start = Instant::now();
        let total_files = requests.len();
        let mut successful = Vec::new();
        let mut failed = Vec::new();

        let report = |file_index: usize, current_file: &str, state: ProgressState| {
            progress_callback(ConversionProgress {
                file_index,
                total_files,
                current_file: current_file.to_string(),
                state,
            });
        };

        for (file_index, request) in requests.iter().enumerate() {
            report(file_index, &request.display_name(), ProgressState::Queued);
        }

        for (file_index, request) in requests.into_iter().enumerate() {
            let current_file = request.display_name();
            report(file_index, &current_file, ProgressState::Converting);

            match self.convert_request(&request) {
                Ok(result) => {
                    report(file_index, &current_file, ProgressState::Completed);
                    successful.push(result);
                }
                Err(e) => {
                    error!("Failed to convert {:?}: {}", request.input_path, e);
                    report(file_index, &current_file, ProgressState::Failed);
                    failed.push(FailedFile {
                        input_path: request.input_path,
                        output_path: request.output_path,
                        error: e.to_string(),
                    });
                }
            }
        }

        BatchResult {
            successful,
            failed,
            total_duration: start.elapsed(),
        }
    }

    /// Metadata of the converter registered for a direct format pair.
    pub fn conversion_info(
        &self,
        input: impl AsRef<str>,
        output: impl AsRef<str>,
    ) -> Option<ConverterMetadata> {
        let output = FormatId::new(output);
        let descriptor = self.registry.descriptor(input.as_ref(), &output)?;
        Some(ConverterMetadata {
            name: descriptor.name.clone(),
            category: descriptor.category.clone(),
            description: descriptor.description.clone(),
            input_formats: descriptor.input_formats.clone(),
            output_formats: descriptor.output_formats.clone(),
            parameters: descriptor
                .parameters
                .get(&output)
                .cloned()
                .unwrap_or_default(),
        })
    }

    /// Every directly supported conversion: input format to output formats.
    pub fn supported_conversions(&self) -> BTreeMap<FormatId, Vec<FormatId>> {
        self.registry.conversion_map()
    }

    /// Get the converter registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Get the current configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get statistics about processing.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            successful_conversions: self.successful.load(Ordering::Relaxed),
            failed_conversions: self.failed.load(Ordering::Relaxed),
            registered_pairs: self.registry.pair_count(),
            categories: self.registry.categories(),
        }
    }
}

fn remove_partial_output(path: &Path) {
    if !path.exists() {
        return;
    }
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed partial output {:?}", path),
        Err(e) => warn!("Failed to remove partial output {:?}: {}", path, e),
    }
}

/// Description of the converter serving a format pair.
#[derive(Debug, Clone, Serialize)]
pub struct ConverterMetadata {
    pub name: String,
    pub category: String,
    pub description: String,
    pub input_formats: Vec<FormatId>,
    pub output_formats: Vec<FormatId>,
    /// Parameters that apply to the requested output format.
    pub parameters: BTreeMap<String, ParamSpec>,
}

/// Statistics about the engine.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    /// Successful conversions since creation.
    pub successful_conversions: usize,
    /// Failed conversions since creation.
    pub failed_conversions: usize,
    /// Indexed (input, output) pairs.
    pub registered_pairs: usize,
    /// Categories with at least one converter.
    pub categories: Vec<String>,
}

/// Builder for creating a ConversionEngine with custom settings.
pub struct EngineBuilder {
    config: EngineConfig,
    provider: Option<Box<dyn ConverterProvider>>,
    registry: Option<Arc<Registry>>,
}

impl EngineBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            provider: None,
            registry: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the base directory for workspaces.
    pub fn temp_dir(mut self, dir: PathBuf) -> Self {
        self.config.temp_dir = Some(dir);
        self
    }

    /// Keep workspaces after conversion.
    pub fn preserve_temp_files(mut self, preserve: bool) -> Self {
        self.config.preserve_temp_files = preserve;
        self
    }

    /// Set the input size ceiling in bytes.
    pub fn max_file_size_bytes(mut self, bytes: u64) -> Self {
        self.config.max_file_size_bytes = bytes;
        self
    }

    /// Set the longest converter chain considered.
    pub fn max_conversion_steps(mut self, steps: usize) -> Self {
        self.config.max_conversion_steps = steps;
        self
    }

    /// Set the number of batch worker threads.
    pub fn batch_threads(mut self, threads: usize) -> Self {
        self.config.batch_threads = threads;
        self
    }

    /// Set the path to soffice binary.
    pub fn soffice_path(mut self, path: PathBuf) -> Self {
        self.config.soffice_path = Some(path);
        self
    }

    /// Skip a converter category during discovery.
    pub fn disable_category(mut self, category: impl Into<String>) -> Self {
        self.config.converters = self.config.converters.disable(category);
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
        self.config.converters = self
            .config
            .converters
            .default_parameter(category, format, name, value);
        self
    }

    /// Discover converters from this provider instead of the built-in one.
    pub fn provider(mut self, provider: impl ConverterProvider + 'static) -> Self {
        self.provider = Some(Box::new(provider));
        self
    }

    /// Use a prepared registry; takes precedence over any provider.
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build the engine.
    pub fn build(self) -> Result<ConversionEngine> {
        match (self.registry, self.provider) {
            (Some(registry), _) => ConversionEngine::with_registry(self.config, registry),
            (None, Some(provider)) => ConversionEngine::with_provider(self.config, provider.as_ref()),
            (None, None) => ConversionEngine::new(self.config),
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::{Converter, ConverterFactory};
    use crate::registry::StaticProvider;
    use serde_json::json;
    use tempfile::TempDir;

    #[derive(Default)]
    struct UpperConverter;

    impl Converter for UpperConverter {
        fn name(&self) -> &str {
            "UpperConverter"
        }

        fn input_formats(&self) -> Vec<FormatId> {
            vec![FormatId::new("txt")]
        }

        fn output_formats(&self) -> Vec<FormatId> {
            vec![FormatId::new("md")]
        }

        fn parameters(&self) -> crate::converter::ParameterSchema {
            crate::converter::ParameterSchema::from([(
                FormatId::new("md"),
                BTreeMap::from([(
                    "repeat".to_string(),
                    ParamSpec::integer("Copies").default_value(1).range(1.0, 3.0),
                )]),
            )])
        }

        fn convert(&self, job: &ConversionJob<'_>) -> std::result::Result<Details, ConversionError> {
            let text = std::fs::read_to_string(job.input_path)?;
            let repeat = job.param_u64("repeat").unwrap_or(1) as usize;
            std::fs::write(job.output_path, text.to_uppercase().repeat(repeat))?;
            let mut details = job.base_details();
            details.insert("repeat".into(), repeat.into());
            Ok(details)
        }
    }

    fn engine(builder: EngineBuilder) -> ConversionEngine {
        let provider = StaticProvider::new()
            .with_category("text", vec![ConverterFactory::of::<UpperConverter>()]);
        builder.provider(provider).batch_threads(2).build().unwrap()
    }

    // ========== EngineBuilder tests ==========

    #[test]
    fn test_builder_default() {
        let builder = EngineBuilder::new();
        let default_config = EngineConfig::default();
        assert_eq!(builder.config.max_conversion_steps, default_config.max_conversion_steps);
        assert_eq!(builder.config.max_file_size_bytes, default_config.max_file_size_bytes);
        assert!(builder.provider.is_none());
        assert!(builder.registry.is_none());
    }

    #[test]
    fn test_builder_chaining() {
        let builder = EngineBuilder::new()
            .temp_dir(PathBuf::from("/tmp/convert"))
            .preserve_temp_files(true)
            .max_file_size_bytes(1024)
            .max_conversion_steps(2)
            .batch_threads(3)
            .soffice_path(PathBuf::from("/usr/bin/soffice"))
            .disable_category("image")
            .default_parameter("image", "jpeg", "quality", 90);

        assert_eq!(builder.config.temp_dir, Some(PathBuf::from("/tmp/convert")));
        assert!(builder.config.preserve_temp_files);
        assert_eq!(builder.config.max_file_size_bytes, 1024);
        assert_eq!(builder.config.max_conversion_steps, 2);
        assert_eq!(builder.config.batch_threads, 3);
        assert_eq!(builder.config.soffice_path, Some(PathBuf::from("/usr/bin/soffice")));
        assert!(!builder.config.converters.is_enabled("image"));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = EngineBuilder::new()
            .provider(StaticProvider::new())
            .max_conversion_steps(0)
            .build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_plan_same_format_is_identity() {
        let engine = engine(EngineBuilder::new());
        let path = engine.plan("TXT", "txt").unwrap();
        assert!(path.is_direct());
        assert_eq!(path.stages()[0].descriptor.name, "IdentityConverter");
    }

    #[test]
    fn test_plan_without_path() {
        let engine = engine(EngineBuilder::new());
        match engine.plan("md", "txt") {
            Err(Error::Conversion(ConversionError::NoConversionPath { input_format, output_format })) => {
                assert_eq!(input_format.as_str(), "md");
                assert_eq!(output_format.as_str(), "txt");
            }
            other => panic!("Expected NoConversionPath, got {:?}", other.map(|p| p.len())),
        }
    }

    #[test]
    fn test_convert_applies_config_defaults_and_overrides() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.txt");
        std::fs::write(&input, "ab").unwrap();

        let engine = engine(EngineBuilder::new().default_parameter("text", "md", "repeat", 2));
        let result = engine
            .convert(&input, dir.path().join("a.md"), &Parameters::new())
            .unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("a.md")).unwrap(), "ABAB");
        assert_eq!(result.details["repeat"], json!(2));

        let mut params = Parameters::new();
        params.insert("repeat".into(), json!(3));
        engine.convert(&input, dir.path().join("b.md"), &params).unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("b.md")).unwrap(), "ABABAB");
    }

    #[test]
    fn test_convert_rejects_invalid_parameter() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.txt");
        std::fs::write(&input, "ab").unwrap();

        let engine = engine(EngineBuilder::new().temp_dir(dir.path().to_path_buf()));
        let mut params = Parameters::new();
        params.insert("repeat".into(), json!(9));

        match engine.convert(&input, dir.path().join("a.md"), &params) {
            Err(Error::Validation(ValidationError::InvalidParameter { name, .. })) => {
                assert_eq!(name, "repeat")
            }
            other => panic!("Expected InvalidParameter, got {:?}", other.map(|r| r.stage_count())),
        }
        assert!(!dir.path().join("a.md").exists());
    }

    #[test]
    fn test_convert_same_format_copies() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.txt");
        std::fs::write(&input, "same").unwrap();

        let engine = engine(EngineBuilder::new());
        let result = engine
            .convert(&input, dir.path().join("copy.txt"), &Parameters::new())
            .unwrap();
        assert_eq!(result.stage_count(), 1);
        assert_eq!(std::fs::read_to_string(dir.path().join("copy.txt")).unwrap(), "same");
    }

    #[test]
    fn test_convert_onto_itself_keeps_content() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.txt");
        std::fs::write(&input, "keep me").unwrap();

        let engine = engine(EngineBuilder::new());
        engine.convert(&input, &input, &Parameters::new()).unwrap();
        assert_eq!(std::fs::read_to_string(&input).unwrap(), "keep me");
    }

    #[test]
    fn test_validation_errors() {
        let dir = TempDir::new().unwrap();
        let engine = engine(EngineBuilder::new());

        let missing = engine.convert(dir.path().join("nope.txt"), dir.path().join("x.md"), &Parameters::new());
        assert!(matches!(
            missing,
            Err(Error::Validation(ValidationError::InputNotFound(_)))
        ));

        let not_file = engine.convert(dir.path(), dir.path().join("x.md"), &Parameters::new());
        assert!(matches!(
            not_file,
            Err(Error::Validation(ValidationError::NotAFile(_)))
        ));

        let input = dir.path().join("a.txt");
        std::fs::write(&input, "x").unwrap();
        let unknown = engine.convert(&input, dir.path().join("x.unknownext"), &Parameters::new());
        match unknown {
            Err(e) => {
                assert!(e.is_validation());
                assert!(e.to_string().contains("format undeterminable"));
            }
            Ok(_) => panic!("Expected validation error"),
        }
    }

    #[test]
    fn test_stats_and_conversion_info() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.txt");
        std::fs::write(&input, "x").unwrap();

        let engine = engine(EngineBuilder::new());
        engine.convert(&input, dir.path().join("a.md"), &Parameters::new()).unwrap();
        let _ = engine.convert(dir.path().join("missing.txt"), dir.path().join("b.md"), &Parameters::new());

        let stats = engine.stats();
        assert_eq!(stats.successful_conversions, 1);
        assert_eq!(stats.failed_conversions, 1);
        assert_eq!(stats.registered_pairs, 1);
        assert_eq!(stats.categories, vec!["text".to_string()]);

        let info = engine.conversion_info("txt", "MD").unwrap();
        assert_eq!(info.name, "UpperConverter");
        assert_eq!(info.category, "text");
        assert_eq!(info.description, "No description available");
        assert!(info.parameters.contains_key("repeat"));
        assert!(engine.conversion_info("md", "txt").is_none());

        let serialized = serde_json::to_value(&info).unwrap();
        assert_eq!(serialized["parameters"]["repeat"]["type"], json!("integer"));
    }
}
