//! Format identifiers and the table of well-known formats.
//!
//! A [`FormatId`] names a logical format (`"yaml"`), which may be spelled by
//! several file extensions (`yaml`, `yml`). The order of [`KNOWN_FORMATS`] is
//! also the priority order used to break ties between equally short
//! conversion paths.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;

use self::FormatCategory::*;

/// Normalized, case-insensitive name of a logical file format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FormatId(String);

impl FormatId {
    /// Create a format identifier, lowercasing and stripping whitespace and
    /// leading dots.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(
            name.as_ref()
                .trim()
                .trim_start_matches('.')
                .to_ascii_lowercase(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Static information for this format, if it is well known.
    pub fn info(&self) -> Option<&'static FormatInfo> {
        KNOWN_FORMATS.iter().find(|info| info.id == self.0)
    }

    /// Category of this format, if it is well known.
    pub fn category(&self) -> Option<FormatCategory> {
        self.info().map(|info| info.category)
    }

    /// MIME type of this format, if it is well known.
    pub fn mime_type(&self) -> Option<&'static str> {
        self.info().map(|info| info.mime)
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FormatId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FormatId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for FormatId {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<FormatId> for String {
    fn from(format: FormatId) -> Self {
        format.0
    }
}

/// Broad family a format belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatCategory {
    Document,
    Spreadsheet,
    Image,
    DataExchange,
    Archive,
    Font,
}

impl FormatCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Spreadsheet => "spreadsheet",
            Self::Image => "image",
            Self::DataExchange => "data_exchange",
            Self::Archive => "archive",
            Self::Font => "font",
        }
    }
}

impl fmt::Display for FormatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of a well-known format.
#[derive(Debug, Clone, Copy)]
pub struct FormatInfo {
    /// Canonical format identifier.
    pub id: &'static str,
    /// File extensions, preferred first.
    pub extensions: &'static [&'static str],
    pub category: FormatCategory,
    pub mime: &'static str,
}

const fn known(
    id: &'static str,
    extensions: &'static [&'static str],
    category: FormatCategory,
    mime: &'static str,
) -> FormatInfo {
    FormatInfo {
        id,
        extensions,
        category,
        mime,
    }
}

/// Well-known formats in path-search priority order.
///
/// Text-based hub formats come first so that, among equally short paths,
/// the one going through a widely supported intermediate is preferred.
pub const KNOWN_FORMATS: &[FormatInfo] = &[
    known("json", &["json"], DataExchange, "application/json"),
    known("csv", &["csv"], Spreadsheet, "text/csv"),
    known("html", &["html", "htm"], Document, "text/html"),
    known("txt", &["txt", "text"], Document, "text/plain"),
    known("md", &["md", "markdown"], Document, "text/markdown"),
    known("xml", &["xml"], DataExchange, "application/xml"),
    known("yaml", &["yaml", "yml"], DataExchange, "application/x-yaml"),
    known("toml", &["toml"], DataExchange, "application/toml"),
    known("tsv", &["tsv", "tab"], Spreadsheet, "text/tab-separated-values"),
    known("ini", &["ini"], DataExchange, "text/plain"),
    known("pdf", &["pdf"], Document, "application/pdf"),
    known(
        "docx",
        &["docx"],
        Document,
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    known("doc", &["doc"], Document, "application/msword"),
    known("odt", &["odt"], Document, "application/vnd.oasis.opendocument.text"),
    known("rtf", &["rtf"], Document, "application/rtf"),
    known(
        "xlsx",
        &["xlsx"],
        Spreadsheet,
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    known("xls", &["xls"], Spreadsheet, "application/vnd.ms-excel"),
    known(
        "ods",
        &["ods"],
        Spreadsheet,
        "application/vnd.oasis.opendocument.spreadsheet",
    ),
    known(
        "pptx",
        &["pptx"],
        Document,
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    known("ppt", &["ppt"], Document, "application/vnd.ms-powerpoint"),
    known(
        "odp",
        &["odp"],
        Document,
        "application/vnd.oasis.opendocument.presentation",
    ),
    known("png", &["png"], Image, "image/png"),
    known("jpeg", &["jpg", "jpeg", "jpe"], Image, "image/jpeg"),
    known("gif", &["gif"], Image, "image/gif"),
    known("bmp", &["bmp"], Image, "image/bmp"),
    known("tiff", &["tif", "tiff"], Image, "image/tiff"),
    known("webp", &["webp"], Image, "image/webp"),
    known("ico", &["ico"], Image, "image/x-icon"),
    known("svg", &["svg"], Image, "image/svg+xml"),
    known("zip", &["zip"], Archive, "application/zip"),
    known("tar", &["tar"], Archive, "application/x-tar"),
    known("gz", &["gz", "gzip"], Archive, "application/gzip"),
    known("7z", &["7z"], Archive, "application/x-7z-compressed"),
    known("rar", &["rar"], Archive, "application/vnd.rar"),
    known("ttf", &["ttf"], Font, "font/ttf"),
    known("otf", &["otf"], Font, "font/otf"),
    known("woff", &["woff"], Font, "font/woff"),
    known("woff2", &["woff2"], Font, "font/woff2"),
    known("eot", &["eot"], Font, "application/vnd.ms-fontobject"),
];

/// Lowercased extension of `path` without the dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| !e.is_empty())
}

/// Look up a well-known format by one of its extensions.
pub fn format_for_extension(extension: &str) -> Option<FormatId> {
    let ext = FormatId::new(extension);
    if ext.is_empty() {
        return None;
    }
    KNOWN_FORMATS
        .iter()
        .find(|info| info.extensions.contains(&ext.as_str()))
        .map(|info| FormatId::new(info.id))
}

/// Default extensions for a format; unknown formats use their own name.
pub fn extensions_for(format: &FormatId) -> Vec<String> {
    match format.info() {
        Some(info) => info.extensions.iter().map(|e| e.to_string()).collect(),
        None => vec![format.as_str().to_string()],
    }
}

/// Rank of a format in the priority order (lower is preferred).
pub fn priority_rank(format: &FormatId) -> usize {
    KNOWN_FORMATS
        .iter()
        .position(|info| info.id == format.as_str())
        .unwrap_or(KNOWN_FORMATS.len())
}

/// Total order used for deterministic tie-breaking: known formats by
/// priority, then unknown formats alphabetically.
pub fn priority_cmp(a: &FormatId, b: &FormatId) -> Ordering {
    priority_rank(a)
        .cmp(&priority_rank(b))
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_id_normalization() {
        assert_eq!(FormatId::new(".DOCX").as_str(), "docx");
        assert_eq!(FormatId::new("  Yaml ").as_str(), "yaml");
        assert_eq!(FormatId::new("..csv").as_str(), "csv");
        assert_eq!(FormatId::from("JSON"), FormatId::new("json"));
    }

    #[test]
    fn test_format_id_serde_normalizes() {
        let format: FormatId = serde_json::from_str("\".HTML\"").unwrap();
        assert_eq!(format.as_str(), "html");
        assert_eq!(serde_json::to_string(&format).unwrap(), "\"html\"");
    }

    #[test]
    fn test_format_for_extension_aliases() {
        assert_eq!(format_for_extension("yml"), Some(FormatId::new("yaml")));
        assert_eq!(format_for_extension("HTM"), Some(FormatId::new("html")));
        assert_eq!(format_for_extension(".jpg"), Some(FormatId::new("jpeg")));
        assert_eq!(format_for_extension("tif"), Some(FormatId::new("tiff")));
        assert_eq!(format_for_extension("markdown"), Some(FormatId::new("md")));
        assert_eq!(format_for_extension("unknownext"), None);
        assert_eq!(format_for_extension(""), None);
    }

    #[test]
    fn test_extensions_for() {
        assert_eq!(extensions_for(&FormatId::new("html")), vec!["html", "htm"]);
        assert_eq!(extensions_for(&FormatId::new("custom")), vec!["custom"]);
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Path::new("/a/b/Report.CSV")), Some("csv".to_string()));
        assert_eq!(extension_of(Path::new("/a/b/README")), None);
        assert_eq!(extension_of(Path::new("archive.tar.gz")), Some("gz".to_string()));
    }

    #[test]
    fn test_category_and_mime() {
        let csv = FormatId::new("csv");
        assert_eq!(csv.category(), Some(FormatCategory::Spreadsheet));
        assert_eq!(csv.mime_type(), Some("text/csv"));
        assert_eq!(FormatId::new("nope").category(), None);
        assert_eq!(FormatCategory::DataExchange.to_string(), "data_exchange");
    }

    #[test]
    fn test_known_format_categories() {
        let category = |id: &str| FormatId::new(id).category();
        assert_eq!(category("docx"), Some(FormatCategory::Document));
        assert_eq!(category("ods"), Some(FormatCategory::Spreadsheet));
        assert_eq!(category("webp"), Some(FormatCategory::Image));
        assert_eq!(category("toml"), Some(FormatCategory::DataExchange));
    }

    #[test]
    fn test_priority_order() {
        let json = FormatId::new("json");
        let html = FormatId::new("html");
        let alpha = FormatId::new("aaa-custom");
        let beta = FormatId::new("bbb-custom");

        assert_eq!(priority_cmp(&json, &html), Ordering::Less);
        assert_eq!(priority_cmp(&html, &alpha), Ordering::Less);
        assert_eq!(priority_cmp(&alpha, &beta), Ordering::Less);
        assert_eq!(priority_rank(&alpha), KNOWN_FORMATS.len());
    }

    #[test]
    fn test_known_formats_unique() {
        let mut ids: Vec<&str> = KNOWN_FORMATS.iter().map(|f| f.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), KNOWN_FORMATS.len());

        for info in KNOWN_FORMATS {
            assert!(!info.extensions.is_empty(), "{} has no extensions", info.id);
        }
    }
}
