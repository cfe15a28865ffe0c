//! Office documents to PDF through a headless LibreOffice.
//!
//! Each conversion runs its own `soffice` process with a private user
//! profile inside the conversion workspace, so concurrent conversions never
//! share LibreOffice state.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::converter::{ConversionJob, Converter, Details};
use crate::error::ConversionError;
use crate::format::{FormatCategory, FormatId};

const INPUTS: &[&str] = &[
    "docx", "doc", "odt", "rtf", "txt", "html", "xlsx", "xls", "ods", "pptx", "ppt", "odp",
];

/// Locate the soffice binary.
///
/// An explicit path must exist. Otherwise the usual install locations are
/// tried, then `PATH`.
pub fn find_soffice(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    let candidates = [
        // macOS
        "/Applications/LibreOffice.app/Contents/MacOS/soffice",
        // Linux
        "/usr/bin/soffice",
        "/usr/lib/libreoffice/program/soffice",
        "/opt/libreoffice/program/soffice",
        // Snap (Ubuntu)
        "/snap/bin/libreoffice.soffice",
    ];
    for candidate in candidates {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Some(path);
        }
    }

    which::which("soffice")
        .or_else(|_| which::which("libreoffice"))
        .ok()
}

/// PDF export filter LibreOffice should use for an input format.
fn export_filter(format: &FormatId) -> &'static str {
    match format.as_str() {
        "html" => "pdf:writer_web_pdf_Export",
        "pptx" | "ppt" | "odp" => "pdf:impress_pdf_Export",
        _ if format.category() == Some(FormatCategory::Spreadsheet) => "pdf:calc_pdf_Export",
        _ => "pdf:writer_pdf_Export",
    }
}

/// Converts office documents to PDF with LibreOffice.
#[derive(Debug, Clone)]
pub struct OfficeConverter {
    soffice: PathBuf,
}

impl OfficeConverter {
    pub fn new(soffice: PathBuf) -> Self {
        Self { soffice }
    }

    pub fn soffice_path(&self) -> &Path {
        &self.soffice
    }

    fn tool_failed(&self, path: &Path, message: impl Into<String>) -> ConversionError {
        ConversionError::ToolFailed {
            tool: self.soffice.display().to_string(),
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

impl Converter for OfficeConverter {
    fn name(&self) -> &str {
        "OfficeConverter"
    }

    fn description(&self) -> &str {
        "Converts word processing, spreadsheet and presentation documents to PDF using LibreOffice"
    }

    fn input_formats(&self) -> Vec<FormatId> {
        INPUTS.iter().map(FormatId::new).collect()
    }

    fn output_formats(&self) -> Vec<FormatId> {
        vec![FormatId::new("pdf")]
    }

    fn convert(&self, job: &ConversionJob<'_>) -> Result<Details, ConversionError> {
        job.ensure_supported(self)?;
        let start = Instant::now();
        let input_path = job.input_path;

        // Unique output and profile directories for this run
        let run_id = Uuid::new_v4().simple().to_string();
        let output_dir = job.temp_dir.join(format!("office_out_{}", run_id));
        let profile_dir = job.temp_dir.join(format!("office_profile_{}", run_id));
        std::fs::create_dir_all(&output_dir)?;

        let filter = export_filter(job.input_format);
        let mut cmd = Command::new(&self.soffice);
        cmd.args([
            "--headless",
            "--invisible",
            "--nologo",
            "--nofirststartwizard",
            "--norestore",
        ]);
        cmd.arg(format!(
            "-env:UserInstallation=file://{}",
            profile_dir.display()
        ));
        cmd.args(["--convert-to", filter, "--outdir"]);
        cmd.arg(&output_dir);
        cmd.arg(input_path);

        debug!("Running {:?} on {:?} with {}", self.soffice, input_path.file_name(), filter);
        let output = cmd
            .output()
            .map_err(|e| self.tool_failed(input_path, format!("failed to start: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("LibreOffice conversion failed for {:?}: {}", input_path, stderr);
            return Err(self.tool_failed(input_path, stderr.trim()));
        }

        let input_stem = input_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");
        let expected = output_dir.join(format!("{}.pdf", input_stem));

        // LibreOffice may pick a slightly different name
        let pdf_path = if expected.exists() {
            expected
        } else {
            std::fs::read_dir(&output_dir)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .find(|p| p.extension().map(|ext| ext == "pdf").unwrap_or(false))
                .ok_or_else(|| self.tool_failed(input_path, "PDF output file not found"))?
        };

        if std::fs::rename(&pdf_path, job.output_path).is_err() {
            std::fs::copy(&pdf_path, job.output_path)?;
        }

        for dir in [&output_dir, &profile_dir] {
            if dir.exists() {
                if let Err(e) = std::fs::remove_dir_all(dir) {
                    warn!("Failed to remove {:?}: {}", dir, e);
                }
            }
        }

        debug!("Converted {:?} in {:?}", input_path.file_name(), start.elapsed());

        let mut details = job.base_details();
        details.insert("export_filter".into(), filter.into());
        details.insert(
            "duration_ms".into(),
            (start.elapsed().as_millis() as u64).into(),
        );
        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::Parameters;
    use tempfile::TempDir;

    #[test]
    fn test_find_soffice_with_explicit_nonexistent_path() {
        assert!(find_soffice(Some(Path::new("/nonexistent/soffice"))).is_none());
    }

    #[test]
    fn test_find_soffice_with_explicit_valid_path() {
        // This test binary always exists
        let current_exe = std::env::current_exe().unwrap();
        assert_eq!(find_soffice(Some(current_exe.as_path())), Some(current_exe.clone()));
    }

    #[test]
    fn test_export_filter_by_document_kind() {
        assert_eq!(export_filter(&FormatId::new("docx")), "pdf:writer_pdf_Export");
        assert_eq!(export_filter(&FormatId::new("xlsx")), "pdf:calc_pdf_Export");
        assert_eq!(export_filter(&FormatId::new("odp")), "pdf:impress_pdf_Export");
        assert_eq!(export_filter(&FormatId::new("html")), "pdf:writer_web_pdf_Export");
    }

    #[test]
    fn test_declared_formats() {
        let converter = OfficeConverter::new(PathBuf::from("soffice"));
        assert_eq!(converter.output_formats(), vec![FormatId::new("pdf")]);
        assert!(converter.input_formats().contains(&FormatId::new("odt")));
        assert!(!converter.input_formats().contains(&FormatId::new("pdf")));
    }

    #[cfg(unix)]
    fn fake_soffice(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-soffice");
        std::fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    fn run(soffice: PathBuf, dir: &TempDir) -> (PathBuf, Result<Details, ConversionError>) {
        let input = dir.path().join("letter.docx");
        let output = dir.path().join("letter.pdf");
        std::fs::write(&input, b"docx bytes").unwrap();

        let input_format = FormatId::new("docx");
        let output_format = FormatId::new("pdf");
        let params = Parameters::new();
        let job = ConversionJob {
            input_path: &input,
            output_path: &output,
            temp_dir: dir.path(),
            input_format: &input_format,
            output_format: &output_format,
            parameters: &params,
        };
        let result = OfficeConverter::new(soffice).convert(&job);
        (output, result)
    }

    #[cfg(unix)]
    #[test]
    fn test_convert_moves_pdf_from_outdir() {
        let dir = TempDir::new().unwrap();
        let soffice = fake_soffice(
            dir.path(),
            r#"outdir=""
last=""
while [ $# -gt 0 ]; do
  case "$1" in
    --outdir) outdir="$2"; shift 2 ;;
    *) last="$1"; shift ;;
  esac
done
name=$(basename "$last")
printf '%%PDF-1.4\n' > "$outdir/${name%.*}.pdf"
"#,
        );

        let (output, result) = run(soffice, &dir);
        let details = result.unwrap();
        assert_eq!(details["export_filter"], "pdf:writer_pdf_Export");
        assert!(std::fs::read_to_string(&output).unwrap().starts_with("%PDF"));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("office_"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_convert_reports_tool_failure() {
        let dir = TempDir::new().unwrap();
        let soffice = fake_soffice(dir.path(), "echo 'source file could not be loaded' >&2\nexit 1\n");

        let (output, result) = run(soffice, &dir);
        match result {
            Err(ConversionError::ToolFailed { message, .. }) => {
                assert!(message.contains("could not be loaded"));
            }
            other => panic!("Expected ToolFailed, got {:?}", other),
        }
        assert!(!output.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_convert_without_pdf_output() {
        let dir = TempDir::new().unwrap();
        let soffice = fake_soffice(dir.path(), "exit 0\n");

        let (_, result) = run(soffice, &dir);
        match result {
            Err(ConversionError::ToolFailed { message, .. }) => {
                assert!(message.contains("PDF output file not found"));
            }
            other => panic!("Expected ToolFailed, got {:?}", other),
        }
    }
}
