//! Structured data conversion between JSON, YAML, TOML, XML, CSV and TSV.
//!
//! Every input is parsed into a `serde_json::Value` tree and written back
//! out in the target format.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

use crate::converter::{ConversionJob, Converter, Details, ParamSpec, ParameterSchema};
use crate::error::ConversionError;
use crate::format::FormatId;

const FORMATS: &[&str] = &["json", "yaml", "toml", "xml", "csv", "tsv"];

const DEFAULT_INDENT: u64 = 2;
const DEFAULT_ROOT: &str = "root";
const DEFAULT_ITEM: &str = "item";

/// Converts between structured data formats.
#[derive(Debug, Clone, Default)]
pub struct DataExchangeConverter;

impl Converter for DataExchangeConverter {
    fn name(&self) -> &str {
        "DataExchangeConverter"
    }

    fn description(&self) -> &str {
        "Converts between JSON, YAML, TOML, XML, CSV and TSV"
    }

    fn input_formats(&self) -> Vec<FormatId> {
        FORMATS.iter().map(FormatId::new).collect()
    }

    fn output_formats(&self) -> Vec<FormatId> {
        FORMATS.iter().map(FormatId::new).collect()
    }

    fn parameters(&self) -> ParameterSchema {
        let mut schema = ParameterSchema::new();
        schema.insert(
            FormatId::new("json"),
            BTreeMap::from([(
                "indent".to_string(),
                ParamSpec::integer("Spaces per indentation level, 0 for compact output")
                    .default_value(DEFAULT_INDENT)
                    .range(0.0, 8.0),
            )]),
        );
        schema.insert(
            FormatId::new("xml"),
            BTreeMap::from([
                (
                    "root_element".to_string(),
                    ParamSpec::string("Name of the document element").default_value(DEFAULT_ROOT),
                ),
                (
                    "item_element".to_string(),
                    ParamSpec::string("Element name for array items").default_value(DEFAULT_ITEM),
                ),
            ]),
        );
        for (format, default) in [("csv", ","), ("tsv", "\t")] {
            schema.insert(
                FormatId::new(format),
                BTreeMap::from([(
                    "delimiter".to_string(),
                    ParamSpec::string("Field delimiter, a single character").default_value(default),
                )]),
            );
        }
        // Reading CSV, TSV and XML is the same whatever the target.
        for format in FORMATS {
            schema.entry(FormatId::new(format)).or_default().insert(
                "infer_types".to_string(),
                ParamSpec::boolean("Parse numbers and booleans out of CSV, TSV and XML text")
                    .default_value(false),
            );
        }
        schema
    }

    fn convert(&self, job: &ConversionJob<'_>) -> Result<Details, ConversionError> {
        job.ensure_supported(self)?;

        let value = read_value(job)?;
        debug!(
            "Parsed {} document from {:?}",
            job.input_format,
            job.input_path.file_name()
        );
        write_value(job, &value)?;

        let mut details = job.base_details();
        if let Value::Array(items) = &value {
            details.insert("records".into(), items.len().into());
        }
        Ok(details)
    }
}

fn read_value(job: &ConversionJob<'_>) -> Result<Value, ConversionError> {
    let format = job.input_format;
    let text = std::fs::read_to_string(job.input_path)?;
    let infer = job.param_bool("infer_types").unwrap_or(false);

    match format.as_str() {
        "json" => serde_json::from_str(&text).map_err(|e| ConversionError::parse(format, e)),
        "yaml" => serde_yaml::from_str(&text).map_err(|e| ConversionError::parse(format, e)),
        "toml" => toml::from_str(&text).map_err(|e| ConversionError::parse(format, e)),
        "xml" => read_xml(format, &text, infer),
        "csv" => read_delimited(format, &text, b',', infer),
        "tsv" => read_delimited(format, &text, b'\t', infer),
        _ => Err(ConversionError::unsupported(format, "not a data exchange format")),
    }
}

fn write_value(job: &ConversionJob<'_>, value: &Value) -> Result<(), ConversionError> {
    let format = job.output_format;
    match format.as_str() {
        "json" => {
            let indent = job.param_u64("indent").unwrap_or(DEFAULT_INDENT) as usize;
            write_json(job.output_path, value, indent)
        }
        "yaml" => {
            let text = serde_yaml::to_string(value)
                .map_err(|e| ConversionError::unsupported(format, e.to_string()))?;
            std::fs::write(job.output_path, text)?;
            Ok(())
        }
        "toml" => {
            let text = toml::to_string_pretty(&toml_document(value))
                .map_err(|e| ConversionError::unsupported(format, e.to_string()))?;
            std::fs::write(job.output_path, text)?;
            Ok(())
        }
        "xml" => {
            let root = job.param_str("root_element").unwrap_or(DEFAULT_ROOT);
            let item = job.param_str("item_element").unwrap_or(DEFAULT_ITEM);
            let bytes = write_xml(value, root, item)?;
            std::fs::write(job.output_path, bytes)?;
            Ok(())
        }
        "csv" | "tsv" => {
            let fallback = if format.as_str() == "csv" { b',' } else { b'\t' };
            let delimiter = match job.param_str("delimiter") {
                Some(d) => delimiter_byte(format, d)?,
                None => fallback,
            };
            write_delimited(job.output_path, format, value, delimiter)
        }
        _ => Err(ConversionError::unsupported(format, "not a data exchange format")),
    }
}

fn write_json(path: &Path, value: &Value, indent: usize) -> Result<(), ConversionError> {
    let mut writer = BufWriter::new(File::create(path)?);
    if indent == 0 {
        serde_json::to_writer(&mut writer, value)
            .map_err(|e| ConversionError::Failed(e.to_string()))?;
    } else {
        let indent = " ".repeat(indent);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
        value
            .serialize(&mut serializer)
            .map_err(|e| ConversionError::Failed(e.to_string()))?;
    }
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Parse numbers and booleans out of a text cell.
fn infer_scalar(text: &str) -> Value {
    match text {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = text.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = text.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }
    Value::String(text.to_string())
}

fn text_value(text: String, infer: bool) -> Value {
    if infer {
        infer_scalar(&text)
    } else {
        Value::String(text)
    }
}

// CSV / TSV

fn delimiter_byte(format: &FormatId, delimiter: &str) -> Result<u8, ConversionError> {
    match delimiter.as_bytes() {
        [b] => Ok(*b),
        _ => Err(ConversionError::unsupported(
            format,
            format!("delimiter must be a single ASCII character, got {:?}", delimiter),
        )),
    }
}

fn read_delimited(
    format: &FormatId,
    text: &str,
    delimiter: u8,
    infer: bool,
) -> Result<Value, ConversionError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ConversionError::parse(format, e))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ConversionError::parse(format, e))?;
        let mut row = Map::new();
        for (i, field) in record.iter().enumerate() {
            let key = headers
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("column_{}", i + 1));
            row.insert(key, text_value(field.to_string(), infer));
        }
        rows.push(Value::Object(row));
    }
    Ok(Value::Array(rows))
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn write_delimited(
    path: &Path,
    format: &FormatId,
    value: &Value,
    delimiter: u8,
) -> Result<(), ConversionError> {
    let rows: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![value],
        _ => {
            return Err(ConversionError::unsupported(
                format,
                "expected an array of records or a single object",
            ))
        }
    };

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .map_err(|e| ConversionError::Failed(e.to_string()))?;
    let csv_err = |e: csv::Error| ConversionError::Failed(e.to_string());

    if rows.iter().all(|r| r.is_object()) {
        let mut columns: Vec<&str> = Vec::new();
        for row in &rows {
            if let Value::Object(map) = row {
                for key in map.keys() {
                    if !columns.contains(&key.as_str()) {
                        columns.push(key);
                    }
                }
            }
        }
        writer.write_record(&columns).map_err(csv_err)?;
        for row in &rows {
            let record: Vec<String> = columns
                .iter()
                .map(|c| row.get(*c).map(cell_text).unwrap_or_default())
                .collect();
            writer.write_record(&record).map_err(csv_err)?;
        }
    } else {
        for row in &rows {
            let record: Vec<String> = match row {
                Value::Array(cells) => cells.iter().map(cell_text).collect(),
                scalar => vec![cell_text(scalar)],
            };
            writer.write_record(&record).map_err(csv_err)?;
        }
    }

    writer.flush()?;
    Ok(())
}

// TOML

/// TOML needs a table at the top level and has no null.
fn toml_document(value: &Value) -> Value {
    match strip_nulls(value) {
        Value::Object(map) => Value::Object(map),
        other => {
            let mut map = Map::new();
            map.insert("items".to_string(), other);
            Value::Object(map)
        }
    }
}

fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .filter(|v| !v.is_null())
                .map(strip_nulls)
                .collect(),
        ),
        other => other.clone(),
    }
}

// XML
//
// Elements map to object keys, repeated elements to arrays and attributes to
// `@name` keys. Two marker attributes keep JSON shapes XML cannot express:
// `json-type` ("array" or "object") on arrays and empty objects, and
// `json-key` holding a key that is not a valid element name.

const TYPE_ATTR: &str = "json-type";
const KEY_ATTR: &str = "json-key";

#[derive(Debug, Clone, Copy, PartialEq)]
enum Marker {
    Array,
    Object,
}

struct XmlNode {
    name: String,
    children: Map<String, Value>,
    text: String,
    marker: Option<Marker>,
    /// Children in document order, for array elements.
    items: Vec<Value>,
}

fn start_node(
    format: &FormatId,
    start: &BytesStart<'_>,
) -> Result<XmlNode, ConversionError> {
    let mut name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut children = Map::new();
    let mut marker = None;
    for attr in start.attributes() {
        let attr = attr.map_err(|e| ConversionError::parse(format, e))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| ConversionError::parse(format, e))?
            .into_owned();
        match key.as_str() {
            TYPE_ATTR => {
                marker = match value.as_str() {
                    "array" => Some(Marker::Array),
                    "object" => Some(Marker::Object),
                    _ => None,
                }
            }
            KEY_ATTR => name = value,
            _ => {
                children.insert(format!("@{}", key), Value::String(value));
            }
        }
    }
    Ok(XmlNode {
        name,
        children,
        text: String::new(),
        marker,
        items: Vec::new(),
    })
}

fn finish_node(node: XmlNode, infer: bool) -> (String, Value) {
    let text = node.text.trim().to_string();
    let value = match node.marker {
        Some(Marker::Array) => Value::Array(node.items),
        Some(Marker::Object) => Value::Object(node.children),
        None if node.children.is_empty() => {
            if text.is_empty() {
                Value::Null
            } else {
                text_value(text, infer)
            }
        }
        None => {
            let mut children = node.children;
            if !text.is_empty() {
                children.insert("#text".to_string(), text_value(text, infer));
            }
            Value::Object(children)
        }
    };
    (node.name, value)
}

fn attach(parent: &mut Map<String, Value>, name: String, value: Value) {
    match parent.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            parent.insert(name, value);
        }
    }
}

fn close_node(stack: &mut [XmlNode], node: XmlNode, root: &mut Option<Value>, infer: bool) {
    let (name, value) = finish_node(node, infer);
    match stack.last_mut() {
        Some(parent) if parent.marker == Some(Marker::Array) => parent.items.push(value),
        Some(parent) => attach(&mut parent.children, name, value),
        None => *root = Some(value),
    }
}

fn read_xml(format: &FormatId, text: &str, infer: bool) -> Result<Value, ConversionError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<Value> = None;

    loop {
        match reader
            .read_event()
            .map_err(|e| ConversionError::parse(format, e))?
        {
            Event::Start(start) => stack.push(start_node(format, &start)?),
            Event::Empty(start) => {
                let node = start_node(format, &start)?;
                close_node(&mut stack, node, &mut root, infer);
            }
            Event::Text(t) => {
                if let Some(node) = stack.last_mut() {
                    let unescaped = t.unescape().map_err(|e| ConversionError::parse(format, e))?;
                    node.text.push_str(&unescaped);
                }
            }
            Event::CData(c) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| ConversionError::parse(format, "unbalanced closing tag"))?;
                close_node(&mut stack, node, &mut root, infer);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(ConversionError::parse(format, "unexpected end of document"));
    }
    root.ok_or_else(|| ConversionError::parse(format, "document has no root element"))
}

fn element_name(key: &str) -> String {
    let mut name: String = key
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if !name.starts_with(|c: char| c.is_alphabetic() || c == '_') {
        name.insert(0, '_');
    }
    name
}

fn xml_event<W: Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<(), ConversionError> {
    writer
        .write_event(event)
        .map_err(|e| ConversionError::Failed(format!("XML write error: {}", e)))
}

fn write_element<W: Write>(
    writer: &mut Writer<W>,
    key: &str,
    value: &Value,
    item: &str,
) -> Result<(), ConversionError> {
    let name = element_name(key);
    let mut start = BytesStart::new(name.as_str());
    if name != key {
        start.push_attribute((KEY_ATTR, key));
    }

    match value {
        Value::Null => xml_event(writer, Event::Empty(start)),
        Value::Object(map) if map.is_empty() => {
            start.push_attribute((TYPE_ATTR, "object"));
            xml_event(writer, Event::Empty(start))
        }
        Value::Object(map) => {
            for (k, v) in map {
                if let (Some(attr), Value::String(s)) = (k.strip_prefix('@'), v) {
                    start.push_attribute((element_name(attr).as_str(), s.as_str()));
                }
            }
            xml_event(writer, Event::Start(start))?;
            for (k, v) in map {
                if k.starts_with('@') && v.is_string() {
                    continue;
                }
                if k == "#text" {
                    xml_event(writer, Event::Text(BytesText::new(&cell_text(v))))?;
                    continue;
                }
                match v {
                    // Two or more entries read back as an array without a marker.
                    Value::Array(items) if items.len() > 1 => {
                        for entry in items {
                            write_element(writer, k, entry, item)?;
                        }
                    }
                    other => write_element(writer, k, other, item)?,
                }
            }
            xml_event(writer, Event::End(BytesEnd::new(name.as_str())))
        }
        Value::Array(items) => {
            start.push_attribute((TYPE_ATTR, "array"));
            if items.is_empty() {
                return xml_event(writer, Event::Empty(start));
            }
            xml_event(writer, Event::Start(start))?;
            for entry in items {
                write_element(writer, item, entry, item)?;
            }
            xml_event(writer, Event::End(BytesEnd::new(name.as_str())))
        }
        scalar => {
            xml_event(writer, Event::Start(start))?;
            xml_event(writer, Event::Text(BytesText::new(&cell_text(scalar))))?;
            xml_event(writer, Event::End(BytesEnd::new(name.as_str())))
        }
    }
}

fn write_xml(value: &Value, root: &str, item: &str) -> Result<Vec<u8>, ConversionError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    xml_event(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;
    write_element(&mut writer, root, value, item)?;
    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}
