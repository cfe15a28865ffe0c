//! The contract every format converter implements.
//!
//! A converter declares which formats it reads and writes, which parameters
//! it understands per output format, and performs one format transition per
//! [`Converter::convert`] call. The engine never looks inside a converter;
//! everything it needs is exposed through this trait.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{ConversionError, ValidationError};
use crate::format::{self, FormatId};

/// Named tunables passed to a converter.
pub type Parameters = serde_json::Map<String, Value>;

/// Free-form information a converter reports about one conversion.
pub type Details = serde_json::Map<String, Value>;

/// Parameter specs grouped by the output format they affect.
pub type ParameterSchema = BTreeMap<FormatId, BTreeMap<String, ParamSpec>>;

/// Value type of a converter parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// Declaration of one converter parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    pub kind: ParamType,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl ParamSpec {
    fn new(kind: ParamType, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            default: None,
            min: None,
            max: None,
            options: Vec::new(),
        }
    }

    pub fn string(description: impl Into<String>) -> Self {
        Self::new(ParamType::String, description)
    }

    pub fn integer(description: impl Into<String>) -> Self {
        Self::new(ParamType::Integer, description)
    }

    pub fn number(description: impl Into<String>) -> Self {
        Self::new(ParamType::Number, description)
    }

    pub fn boolean(description: impl Into<String>) -> Self {
        Self::new(ParamType::Boolean, description)
    }

    /// Set the default value.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Set inclusive numeric bounds.
    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Restrict a string parameter to a fixed set of values.
    pub fn options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    /// Check `value` against this spec.
    pub fn validate(&self, name: &str, value: &Value) -> std::result::Result<(), ValidationError> {
        let invalid = |message: String| ValidationError::InvalidParameter {
            name: name.to_string(),
            message,
        };

        let numeric = match (self.kind, value) {
            (ParamType::String, Value::String(s)) => {
                if !self.options.is_empty() && !self.options.iter().any(|o| o == s) {
                    return Err(invalid(format!(
                        "'{}' is not one of [{}]",
                        s,
                        self.options.join(", ")
                    )));
                }
                None
            }
            (ParamType::Boolean, Value::Bool(_)) => None,
            (ParamType::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => n.as_f64(),
            (ParamType::Number, Value::Number(n)) => n.as_f64(),
            (kind, other) => {
                return Err(invalid(format!("expected {}, got {}", kind, other)));
            }
        };

        if let Some(n) = numeric {
            if let Some(min) = self.min {
                if n < min {
                    return Err(invalid(format!("{} is below the minimum {}", n, min)));
                }
            }
            if let Some(max) = self.max {
                if n > max {
                    return Err(invalid(format!("{} is above the maximum {}", n, max)));
                }
            }
        }
        Ok(())
    }
}

/// One format transition handed to a converter.
#[derive(Debug, Clone, Copy)]
pub struct ConversionJob<'a> {
    pub input_path: &'a Path,
    pub output_path: &'a Path,
    /// Scratch directory shared by every stage of the current conversion.
    pub temp_dir: &'a Path,
    pub input_format: &'a FormatId,
    pub output_format: &'a FormatId,
    pub parameters: &'a Parameters,
}

impl<'a> ConversionJob<'a> {
    pub fn param_str(&self, name: &str) -> Option<&'a str> {
        self.parameters.get(name).and_then(Value::as_str)
    }

    pub fn param_u64(&self, name: &str) -> Option<u64> {
        self.parameters.get(name).and_then(Value::as_u64)
    }

    pub fn param_bool(&self, name: &str) -> Option<bool> {
        self.parameters.get(name).and_then(Value::as_bool)
    }

    /// Fail with [`ConversionError::UnsupportedPair`] unless this converter
    /// declares both formats of the job.
    pub fn ensure_supported(&self, converter: &dyn Converter) -> Result<(), ConversionError> {
        let reads = converter.input_formats().contains(self.input_format);
        let writes = converter.output_formats().contains(self.output_format);
        if reads && writes {
            Ok(())
        } else {
            Err(ConversionError::UnsupportedPair {
                converter: converter.name().to_string(),
                input_format: self.input_format.clone(),
                output_format: self.output_format.clone(),
            })
        }
    }

    /// Standard details every converter reports.
    pub fn base_details(&self) -> Details {
        let mut details = Details::new();
        details.insert("input_format".into(), self.input_format.as_str().into());
        details.insert("output_format".into(), self.output_format.as_str().into());
        details.insert(
            "input_path".into(),
            self.input_path.display().to_string().into(),
        );
        details.insert(
            "output_path".into(),
            self.output_path.display().to_string().into(),
        );
        details
    }
}

/// A format handler.
///
/// Implementations must be stateless or internally synchronized: the
/// registry shares one instance per format pair across concurrent
/// conversions.
pub trait Converter: Send + Sync {
    /// Display name, used in logs, errors and metadata.
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        "No description available"
    }

    /// Formats this converter can read. Never empty.
    fn input_formats(&self) -> Vec<FormatId>;

    /// Formats this converter can write. Never empty.
    fn output_formats(&self) -> Vec<FormatId>;

    /// File extensions for `format`, preferred first.
    fn format_extensions(&self, format: &FormatId) -> Vec<String> {
        format::extensions_for(format)
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new()
    }

    /// Write exactly one artifact at `job.output_path`, or fail.
    fn convert(&self, job: &ConversionJob<'_>) -> Result<Details, ConversionError>;
}

/// Constructor for converter instances.
///
/// The registry calls it once to read capability declarations, and again
/// lazily the first time each format pair is requested.
#[derive(Clone)]
pub struct ConverterFactory(Arc<dyn Fn() -> Box<dyn Converter> + Send + Sync>);

impl ConverterFactory {
    pub fn new<F>(make: F) -> Self
    where
        F: Fn() -> Box<dyn Converter> + Send + Sync + 'static,
    {
        Self(Arc::new(make))
    }

    /// Factory for a converter type with a `Default` constructor.
    pub fn of<C>() -> Self
    where
        C: Converter + Default + 'static,
    {
        Self::new(|| Box::new(C::default()))
    }

    pub fn create(&self) -> Box<dyn Converter> {
        (self.0)()
    }
}

impl fmt::Debug for ConverterFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConverterFactory")
    }
}

/// Copies the input unchanged; used for same-format requests.
#[derive(Debug, Clone)]
pub struct IdentityConverter {
    format: FormatId,
}

impl IdentityConverter {
    pub fn new(format: FormatId) -> Self {
        Self { format }
    }
}

impl Converter for IdentityConverter {
    fn name(&self) -> &str {
        "IdentityConverter"
    }

    fn description(&self) -> &str {
        "Copies a file without changing its format"
    }

    fn input_formats(&self) -> Vec<FormatId> {
        vec![self.format.clone()]
    }

    fn output_formats(&self) -> Vec<FormatId> {
        vec![self.format.clone()]
    }

    fn convert(&self, job: &ConversionJob<'_>) -> Result<Details, ConversionError> {
        let same_file = match (job.input_path.canonicalize(), job.output_path.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        let bytes = if same_file {
            std::fs::metadata(job.input_path)?.len()
        } else {
            std::fs::copy(job.input_path, job.output_path)?
        };
        let mut details = job.base_details();
        details.insert("bytes_copied".into(), bytes.into());
        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_param_spec_builder() {
        let spec = ParamSpec::integer("Indentation width")
            .default_value(2)
            .range(0.0, 8.0);
        assert_eq!(spec.kind, ParamType::Integer);
        assert_eq!(spec.default, Some(json!(2)));
        assert_eq!(spec.min, Some(0.0));
        assert_eq!(spec.max, Some(8.0));
    }

    #[test]
    fn test_param_spec_validate_integer_bounds() {
        let spec = ParamSpec::integer("quality").range(1.0, 100.0);
        assert!(spec.validate("quality", &json!(85)).is_ok());
        assert!(spec.validate("quality", &json!(0)).is_err());
        assert!(spec.validate("quality", &json!(101)).is_err());
        assert!(spec.validate("quality", &json!(2.5)).is_err());
        assert!(spec.validate("quality", &json!("85")).is_err());
    }

    #[test]
    fn test_param_spec_validate_options() {
        let spec = ParamSpec::string("orientation").options(["portrait", "landscape"]);
        assert!(spec.validate("orientation", &json!("portrait")).is_ok());

        let err = spec.validate("orientation", &json!("sideways")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("orientation"));
        assert!(msg.contains("sideways"));
    }

    #[test]
    fn test_param_spec_validate_number_and_bool() {
        assert!(ParamSpec::number("margin").validate("margin", &json!(1.5)).is_ok());
        assert!(ParamSpec::number("margin").validate("margin", &json!(2)).is_ok());
        assert!(ParamSpec::boolean("pretty").validate("pretty", &json!(true)).is_ok());
        assert!(ParamSpec::boolean("pretty").validate("pretty", &json!(1)).is_err());
    }

    #[test]
    fn test_param_spec_serializes_type_field() {
        let spec = ParamSpec::boolean("Infer column types").default_value(false);
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["type"], json!("boolean"));
        assert_eq!(value["default"], json!(false));
        assert!(value.get("options").is_none());
    }

    #[test]
    fn test_job_param_accessors() {
        let mut params = Parameters::new();
        params.insert("indent".into(), json!(4));
        params.insert("root_element".into(), json!("data"));
        params.insert("infer_types".into(), json!(true));

        let input = FormatId::new("json");
        let output = FormatId::new("xml");
        let job = ConversionJob {
            input_path: Path::new("in.json"),
            output_path: Path::new("out.xml"),
            temp_dir: Path::new("/tmp"),
            input_format: &input,
            output_format: &output,
            parameters: &params,
        };

        assert_eq!(job.param_u64("indent"), Some(4));
        assert_eq!(job.param_str("root_element"), Some("data"));
        assert_eq!(job.param_bool("infer_types"), Some(true));
        assert_eq!(job.param_str("missing"), None);

        let details = job.base_details();
        assert_eq!(details["input_format"], json!("json"));
        assert_eq!(details["output_path"], json!("out.xml"));
    }

    #[test]
    fn test_identity_converter_copies() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.txt");
        let output = dir.path().join("b.txt");
        std::fs::write(&input, "hello").unwrap();

        let format = FormatId::new("txt");
        let params = Parameters::new();
        let converter = IdentityConverter::new(format.clone());
        let job = ConversionJob {
            input_path: &input,
            output_path: &output,
            temp_dir: dir.path(),
            input_format: &format,
            output_format: &format,
            parameters: &params,
        };

        assert!(job.ensure_supported(&converter).is_ok());
        let details = converter.convert(&job).unwrap();
        assert_eq!(details["bytes_copied"], json!(5));
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "hello");
    }

    #[test]
    fn test_ensure_supported_rejects_unknown_pair() {
        let format = FormatId::new("txt");
        let other = FormatId::new("pdf");
        let params = Parameters::new();
        let converter = IdentityConverter::new(format.clone());
        let job = ConversionJob {
            input_path: Path::new("a.txt"),
            output_path: Path::new("a.pdf"),
            temp_dir: Path::new("/tmp"),
            input_format: &format,
            output_format: &other,
            parameters: &params,
        };

        match job.ensure_supported(&converter) {
            Err(ConversionError::UnsupportedPair { converter, .. }) => {
                assert_eq!(converter, "IdentityConverter");
            }
            other => panic!("Expected UnsupportedPair, got {:?}", other),
        }
    }

    #[test]
    fn test_factory_creates_fresh_instances() {
        let factory = ConverterFactory::new(|| Box::new(IdentityConverter::new(FormatId::new("md"))));
        let a = factory.create();
        let b = factory.clone().create();
        assert_eq!(a.name(), b.name());
        assert_eq!(a.input_formats(), vec![FormatId::new("md")]);
    }
}
