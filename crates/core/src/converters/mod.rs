//! Built-in converters and the provider that registers them.

pub mod data_exchange;
pub mod document;
pub mod image;
pub mod office;
pub mod spreadsheet;

use std::path::PathBuf;
use tracing::debug;

use crate::converter::ConverterFactory;
use crate::error::DiscoveryError;
use crate::registry::ConverterProvider;

pub use self::data_exchange::DataExchangeConverter;
pub use self::document::DocumentConverter;
pub use self::image::ImageConverter;
pub use self::office::OfficeConverter;
pub use self::spreadsheet::SpreadsheetConverter;

pub const DATA_EXCHANGE: &str = "data_exchange";
pub const DOCUMENT: &str = "document";
pub const IMAGE: &str = "image";
pub const OFFICE: &str = "office";
pub const SPREADSHEET: &str = "spreadsheet";

/// Provider for the converters shipped with this crate.
#[derive(Debug, Clone, Default)]
pub struct BuiltinProvider {
    soffice_path: Option<PathBuf>,
}

impl BuiltinProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this soffice binary instead of searching for one.
    pub fn with_soffice_path(mut self, path: Option<PathBuf>) -> Self {
        self.soffice_path = path;
        self
    }
}

impl ConverterProvider for BuiltinProvider {
    fn categories(&self) -> Vec<String> {
        [DATA_EXCHANGE, DOCUMENT, IMAGE, OFFICE, SPREADSHEET]
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    fn load(&self, category: &str) -> Result<Vec<ConverterFactory>, DiscoveryError> {
        match category {
            DATA_EXCHANGE => Ok(vec![ConverterFactory::of::<DataExchangeConverter>()]),
            DOCUMENT => Ok(vec![ConverterFactory::of::<DocumentConverter>()]),
            IMAGE => Ok(vec![ConverterFactory::of::<ImageConverter>()]),
            SPREADSHEET => Ok(vec![ConverterFactory::of::<SpreadsheetConverter>()]),
            OFFICE => {
                let soffice = office::find_soffice(self.soffice_path.as_deref()).ok_or_else(|| {
                    DiscoveryError::ToolUnavailable {
                        category: category.to_string(),
                        tool: "soffice".to_string(),
                    }
                })?;
                debug!("Found LibreOffice at: {:?}", soffice);
                Ok(vec![ConverterFactory::new(move || {
                    Box::new(OfficeConverter::new(soffice.clone()))
                })])
            }
            other => Err(DiscoveryError::UnknownCategory(other.to_string())),
        }
    }
}
