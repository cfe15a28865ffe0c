//! Plain text and Markdown to HTML, text or Markdown.
//!
//! Markdown goes through `pulldown-cmark` (CommonMark plus tables,
//! strikethrough, footnotes and task lists). Plain text is treated as
//! paragraphs separated by blank lines.

use pulldown_cmark::{html, Event, Options, Parser, Tag, TagEnd};
use pulldown_cmark_escape::escape_html;
use std::collections::BTreeMap;

use crate::converter::{ConversionJob, Converter, Details, ParamSpec, ParameterSchema};
use crate::error::ConversionError;
use crate::format::FormatId;

const INPUTS: &[&str] = &["txt", "md"];
const OUTPUTS: &[&str] = &["html", "txt", "md"];

/// Renders text documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentConverter;

impl Converter for DocumentConverter {
    fn name(&self) -> &str {
        "DocumentConverter"
    }

    fn description(&self) -> &str {
        "Renders Markdown and plain text as HTML, text or Markdown"
    }

    fn input_formats(&self) -> Vec<FormatId> {
        INPUTS.iter().map(FormatId::new).collect()
    }

    fn output_formats(&self) -> Vec<FormatId> {
        OUTPUTS.iter().map(FormatId::new).collect()
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::from([(
            FormatId::new("html"),
            BTreeMap::from([(
                "title".to_string(),
                ParamSpec::string("Document title, defaults to the input file name"),
            )]),
        )])
    }

    fn convert(&self, job: &ConversionJob<'_>) -> Result<Details, ConversionError> {
        job.ensure_supported(self)?;

        let source = std::fs::read_to_string(job.input_path)?;
        let markdown = job.input_format.as_str() == "md";
        let mut details = job.base_details();

        let (rendered, blocks) = match (job.output_format.as_str(), markdown) {
            ("html", _) => {
                let title = job
                    .param_str("title")
                    .map(str::to_string)
                    .or_else(|| {
                        job.input_path
                            .file_stem()
                            .and_then(|s| s.to_str())
                            .map(str::to_string)
                    })
                    .unwrap_or_else(|| "Document".to_string());
                let (body, blocks) = if markdown {
                    markdown_html(&source)
                } else {
                    plain_html(&source)
                };
                details.insert("title".into(), title.clone().into());
                (html_document(&title, &body), blocks)
            }
            ("md", _) => (escape_markdown(&source), paragraphs(&source).len()),
            (_, true) => markdown_text(&source),
            (_, false) => {
                let paragraphs = paragraphs(&source);
                let blocks = paragraphs.len();
                let mut text = paragraphs.join("\n\n");
                text.push('\n');
                (text, blocks)
            }
        };

        std::fs::write(job.output_path, rendered)?;
        details.insert("blocks".into(), blocks.into());
        Ok(details)
    }
}

fn parser(source: &str) -> Parser<'_> {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_TASKLISTS;
    Parser::new_ext(source, options)
}

fn escaped(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // Writing into a String cannot fail.
    let _ = escape_html(&mut out, text);
    out
}

/// Counts top-level blocks while passing events through.
struct BlockCounter {
    depth: usize,
    blocks: usize,
}

impl BlockCounter {
    fn new() -> Self {
        Self { depth: 0, blocks: 0 }
    }

    fn observe(&mut self, event: &Event<'_>) {
        match event {
            Event::Start(_) => {
                if self.depth == 0 {
                    self.blocks += 1;
                }
                self.depth += 1;
            }
            Event::End(_) => self.depth = self.depth.saturating_sub(1),
            Event::Rule | Event::Html(_) if self.depth == 0 => self.blocks += 1,
            _ => {}
        }
    }
}

fn markdown_html(source: &str) -> (String, usize) {
    let mut counter = BlockCounter::new();
    let events = parser(source).inspect(|event| counter.observe(event));
    let mut body = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut body, events);
    (body.trim_end().to_string(), counter.blocks)
}

/// Plain text is a sequence of paragraphs separated by blank lines.
fn paragraphs(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        out.push(current.join("\n"));
    }
    out
}

fn plain_html(source: &str) -> (String, usize) {
    let paragraphs = paragraphs(source);
    let html: Vec<String> = paragraphs
        .iter()
        .map(|p| {
            let lines: Vec<String> = p.lines().map(escaped).collect();
            format!("<p>{}</p>", lines.join("<br>\n"))
        })
        .collect();
    (html.join("\n"), paragraphs.len())
}

fn html_document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escaped(title),
        body
    )
}

fn end_block(out: &mut String, in_list: bool) {
    let trimmed = out.trim_end_matches('\n').len();
    out.truncate(trimmed);
    if !out.is_empty() {
        out.push_str(if in_list { "\n" } else { "\n\n" });
    }
}

/// Markdown rendered as plain text: markup dropped, list markers kept and
/// link targets appended in parentheses.
fn markdown_text(source: &str) -> (String, usize) {
    let mut counter = BlockCounter::new();
    let mut out = String::with_capacity(source.len());
    // Next number per open list, `None` for bullet lists.
    let mut lists: Vec<Option<u64>> = Vec::new();
    let mut links: Vec<String> = Vec::new();

    for event in parser(source) {
        counter.observe(&event);
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::Rule => {
                out.push_str(&"-".repeat(40));
                end_block(&mut out, !lists.is_empty());
            }
            Event::TaskListMarker(done) => out.push_str(if done { "[x] " } else { "[ ] " }),
            Event::Start(Tag::List(start)) => {
                if !lists.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                lists.push(start);
            }
            Event::Start(Tag::Item) => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(&"  ".repeat(lists.len().saturating_sub(1)));
                match lists.last_mut() {
                    Some(Some(n)) => {
                        out.push_str(&format!("{}. ", n));
                        *n += 1;
                    }
                    _ => out.push_str("- "),
                }
            }
            Event::Start(Tag::Link { dest_url, .. }) => links.push(dest_url.to_string()),
            Event::End(TagEnd::Link) => {
                if let Some(url) = links.pop() {
                    out.push_str(&format!(" ({})", url));
                }
            }
            Event::End(TagEnd::Item) => {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Event::End(TagEnd::List(_)) => {
                lists.pop();
                end_block(&mut out, !lists.is_empty());
            }
            Event::End(TagEnd::Paragraph)
            | Event::End(TagEnd::Heading(_))
            | Event::End(TagEnd::CodeBlock) => end_block(&mut out, !lists.is_empty()),
            _ => {}
        }
    }

    let mut text = out.trim_end().to_string();
    text.push('\n');
    (text, counter.blocks)
}

fn ordered_marker(line: &str) -> bool {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && line[digits..].starts_with(". ")
}

/// Escape text so Markdown renders it literally.
fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with(['-', '+']) || ordered_marker(trimmed) {
            out.push_str(&line[..line.len() - trimmed.len()]);
            out.push('\\');
            out.push_str(trimmed);
        } else {
            for c in line.chars() {
                if matches!(c, '\\' | '`' | '*' | '_' | '[' | ']' | '#' | '>') {
                    out.push('\\');
                }
                out.push(c);
            }
        }
        out.push('\n');
    }
    out
}
