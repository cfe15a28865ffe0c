//! # fileconverter-core
//!
//! Extensible file format conversion library.
//!
//! Converters register the (input, output) format pairs they handle. When no
//! single converter covers a request, the engine chains several of them
//! through intermediate formats, running each chain in a private temporary
//! workspace:
//!
//! - **data exchange**: JSON, YAML, TOML, XML, CSV and TSV
//! - **documents**: plain text and Markdown to HTML and back to text
//! - **spreadsheets**: XLSX, XLS and ODS to CSV, TSV and JSON
//! - **images**: PNG, JPEG, GIF, BMP, TIFF and WebP
//! - **office**: word processing, spreadsheet and presentation files to PDF
//!   through a headless LibreOffice, when one is installed
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fileconverter_core::{ConversionEngine, EngineConfig, Parameters};
//!
//! fn main() -> anyhow::Result<()> {
//!     let engine = ConversionEngine::new(EngineConfig::default())?;
//!
//!     // Spreadsheet to YAML goes through JSON
//!     let result = engine.convert("report.xlsx", "report.yaml", &Parameters::new())?;
//!
//!     println!("Converted in {} stage(s)", result.stage_count());
//!     Ok(())
//! }
//! ```
//!
//! ## Batch Processing with Progress
//!
//! ```rust,no_run
//! use fileconverter_core::{ConversionProgress, ConversionRequest, EngineBuilder};
//!
//! fn main() -> anyhow::Result<()> {
//!     let engine = EngineBuilder::new()
//!         .max_conversion_steps(2)
//!         .default_parameter("image", "jpeg", "quality", 90)
//!         .build()?;
//!
//!     let requests = vec![
//!         ConversionRequest::new("notes.md", "notes.html"),
//!         ConversionRequest::new("photo.png", "photo.jpg"),
//!     ];
//!
//!     let result = engine.convert_batch_with_progress(requests, |progress: ConversionProgress| {
//!         println!(
//!             "File {}/{}: {} {:?}",
//!             progress.file_index + 1,
//!             progress.total_files,
//!             progress.current_file,
//!             progress.state
//!         );
//!     });
//!
//!     println!("{} converted in {:?}", result.successful.len(), result.total_duration);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod converter;
pub mod converters;
pub mod engine;
pub mod error;
pub mod format;
pub mod registry;
pub mod workspace;

// Re-export main types for convenience
pub use config::{
    BatchResult, CategoryConfig, ConversionProgress, ConversionRequest, ConversionResult,
    ConvertersConfig, EngineConfig, FailedFile, ProgressState, StageResult,
};
pub use converter::{
    ConversionJob, Converter, ConverterFactory, Details, ParamSpec, ParamType, ParameterSchema,
    Parameters,
};
pub use converters::BuiltinProvider;
pub use engine::{ConversionEngine, ConverterMetadata, EngineBuilder, EngineStats};
pub use error::{ConversionError, DiscoveryError, Error, Result, ValidationError};
pub use format::{FormatCategory, FormatId};
pub use registry::{ConversionPath, ConverterProvider, Registry, StaticProvider};
pub use workspace::TempWorkspace;

/// Initialize the library's logging.
/// Call this once at application startup if you want to see logs.
pub fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();
}
