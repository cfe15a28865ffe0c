//! Workbook export (xlsx, xls, ods) to CSV, TSV or JSON records.

use calamine::{open_workbook_auto, Data, Range, Reader};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

use crate::converter::{ConversionJob, Converter, Details, ParamSpec, ParameterSchema};
use crate::error::ConversionError;
use crate::format::FormatId;

const INPUTS: &[&str] = &["xlsx", "xls", "ods"];
const OUTPUTS: &[&str] = &["csv", "tsv", "json"];

/// Reads one worksheet of a workbook with calamine.
#[derive(Debug, Clone, Default)]
pub struct SpreadsheetConverter;

impl Converter for SpreadsheetConverter {
    fn name(&self) -> &str {
        "SpreadsheetConverter"
    }

    fn description(&self) -> &str {
        "Exports a worksheet of an Excel or OpenDocument workbook as CSV, TSV or JSON"
    }

    fn input_formats(&self) -> Vec<FormatId> {
        INPUTS.iter().map(FormatId::new).collect()
    }

    fn output_formats(&self) -> Vec<FormatId> {
        OUTPUTS.iter().map(FormatId::new).collect()
    }

    fn parameters(&self) -> ParameterSchema {
        OUTPUTS
            .iter()
            .map(|format| {
                (
                    FormatId::new(format),
                    BTreeMap::from([(
                        "sheet".to_string(),
                        ParamSpec::string("Worksheet to export, defaults to the first sheet"),
                    )]),
                )
            })
            .collect()
    }

    fn convert(&self, job: &ConversionJob<'_>) -> Result<Details, ConversionError> {
        job.ensure_supported(self)?;
        let format = job.input_format;

        let mut workbook =
            open_workbook_auto(job.input_path).map_err(|e| ConversionError::parse(format, e))?;
        let sheet_names = workbook.sheet_names();

        let sheet = match job.param_str("sheet") {
            Some(name) if sheet_names.iter().any(|s| s == name) => name.to_string(),
            Some(name) => {
                return Err(ConversionError::unsupported(
                    format,
                    format!("no sheet named '{}' (available: {})", name, sheet_names.join(", ")),
                ))
            }
            None => sheet_names
                .first()
                .cloned()
                .ok_or_else(|| ConversionError::unsupported(format, "workbook has no sheets"))?,
        };

        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| ConversionError::parse(format, e))?;
        let rows = rows_of(&range);
        debug!("Read {} rows from sheet '{}'", rows.len(), sheet);

        match job.output_format.as_str() {
            "csv" => write_rows(job.output_path, &rows, b',')?,
            "tsv" => write_rows(job.output_path, &rows, b'\t')?,
            _ => {
                let records = records_of(&rows);
                let mut writer = BufWriter::new(File::create(job.output_path)?);
                serde_json::to_writer_pretty(&mut writer, &records)
                    .map_err(|e| ConversionError::Failed(e.to_string()))?;
                writer.write_all(b"\n")?;
                writer.flush()?;
            }
        }

        let mut details = job.base_details();
        details.insert("sheet".into(), sheet.into());
        details.insert("sheet_count".into(), sheet_names.len().into());
        details.insert("rows".into(), rows.len().saturating_sub(1).into());
        Ok(details)
    }
}

fn rows_of(range: &Range<Data>) -> Vec<Vec<Data>> {
    range.rows().map(|row| row.to_vec()).collect()
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::Int(i) => Value::from(*i),
        Data::Float(f) if f.is_finite() => Value::from(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}

/// Rows after the header as JSON objects keyed by header cell.
fn records_of(rows: &[Vec<Data>]) -> Value {
    let Some((header, body)) = rows.split_first() else {
        return Value::Array(Vec::new());
    };
    let keys: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell {
            Data::Empty => format!("column_{}", i + 1),
            other => other.to_string(),
        })
        .collect();

    Value::Array(
        body.iter()
            .map(|row| {
                let record: Map<String, Value> = keys
                    .iter()
                    .enumerate()
                    .map(|(i, key)| (key.clone(), row.get(i).map(cell_value).unwrap_or(Value::Null)))
                    .collect();
                Value::Object(record)
            })
            .collect(),
    )
}

fn write_rows(path: &Path, rows: &[Vec<Data>], delimiter: u8) -> Result<(), ConversionError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .map_err(|e| ConversionError::Failed(e.to_string()))?;
    for row in rows {
        let record: Vec<String> = row.iter().map(|cell| cell.to_string()).collect();
        writer
            .write_record(&record)
            .map_err(|e| ConversionError::Failed(e.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}
