//! Source file parsing and text extraction.

use anyhow::{anyhow, Context};
use calamine::{open_workbook, Data, Reader, Xlsx};
use ragdex_core::{AppError, AppResult};
use regex::Regex;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

/// Extensions the default extractor understands (lowercase, no dot).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "docx", "xlsx"];

/// Content type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    PlainText,
    Markdown,
    Word,
    Spreadsheet,
    Unsupported,
}

impl ContentType {
    /// Detect content type from file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("txt") => Self::PlainText,
            Some("md") => Self::Markdown,
            Some("docx") => Self::Word,
            Some("xlsx") => Self::Spreadsheet,
            _ => Self::Unsupported,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlainText => "text",
            Self::Markdown => "markdown",
            Self::Word => "docx",
            Self::Spreadsheet => "xlsx",
            Self::Unsupported => "unsupported",
        }
    }
}

/// Whether `path` has one of the [`SUPPORTED_EXTENSIONS`].
pub fn is_supported(path: &Path) -> bool {
    ContentType::from_path(path) != ContentType::Unsupported
}

/// Turns a document on disk into plain text.
///
/// Called from a blocking thread; implementations may do synchronous I/O.
pub trait Extractor: Send + Sync + std::fmt::Debug {
    fn supports(&self, path: &Path) -> bool;

    /// Extract text. Failures are [`AppError::ExtractionFailure`].
    fn extract(&self, path: &Path) -> AppResult<String>;
}

/// Default extractor for `.txt`, `.md`, `.docx` and `.xlsx`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileExtractor;

impl Extractor for FileExtractor {
    fn supports(&self, path: &Path) -> bool {
        is_supported(path)
    }

    fn extract(&self, path: &Path) -> AppResult<String> {
        let result = match ContentType::from_path(path) {
            ContentType::PlainText => read_text(path),
            ContentType::Markdown => read_text(path).map(|raw| clean_markdown(&raw)),
            ContentType::Word => read_docx(path),
            ContentType::Spreadsheet => read_xlsx(path),
            ContentType::Unsupported => Err(anyhow!("unsupported file type")),
        };

        result.map_err(|e| AppError::ExtractionFailure(format!("{}: {:#}", path.display(), e)))
    }
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    let bytes = fs::read(path).context("failed to read file")?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Clean markdown down to its visible text.
///
/// Headings, fences, rules, quote and list markers are dropped per line;
/// links and images keep their label and inline emphasis keeps its content.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim_start_matches('#').trim();

        if trimmed.starts_with("```") || trimmed.starts_with("~~~") || is_rule(trimmed) {
            continue;
        }

        let body = trimmed.trim_start_matches('>').trim_start();
        let body = list_marker_regex().replace(body, "");
        let body = strip_inline(&body);
        let body = body.trim();

        if !body.is_empty() {
            result.push_str(body);
            result.push('\n');
        }
    }

    result.trim().to_string()
}

fn is_rule(line: &str) -> bool {
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() >= 3
        && ['-', '*', '_']
            .iter()
            .any(|marker| compact.chars().all(|c| c == *marker))
}

fn list_marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:[-*+]|\d+[.)])\s+").expect("list marker pattern is valid")
    })
}

fn inline_regexes() -> &'static [(Regex, &'static str)] {
    static RE: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    RE.get_or_init(|| {
        [
            (r"!?\[([^\]]*)\]\([^)]*\)", "$1"),
            (r"\*\*([^*]+)\*\*", "$1"),
            (r"\b__([^_]+)__\b", "$1"),
            (r"\*([^*\s][^*]*)\*", "$1"),
            (r"\b_([^_]+)_\b", "$1"),
            (r"~~([^~]+)~~", "$1"),
            (r"`([^`]+)`", "$1"),
        ]
        .into_iter()
        .map(|(pattern, replacement)| {
            (
                Regex::new(pattern).expect("inline markdown pattern is valid"),
                replacement,
            )
        })
        .collect()
    })
}

fn strip_inline(line: &str) -> String {
    inline_regexes()
        .iter()
        .fold(line.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
}

fn paragraph_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<w:p(?:\s[^>/]*)?>(.*?)</w:p>").expect("paragraph pattern is valid")
    })
}

fn text_run_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>").expect("text run pattern is valid")
    })
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Paragraph text of a WordprocessingML body, one non-empty paragraph per line.
fn docx_paragraphs(xml: &str) -> String {
    paragraph_regex()
        .captures_iter(xml)
        .filter_map(|para| {
            let body = para.get(1)?.as_str();
            let text: String = text_run_regex()
                .captures_iter(body)
                .filter_map(|run| run.get(1).map(|m| unescape_xml(m.as_str())))
                .collect();
            let text = text.trim().to_string();
            (!text.is_empty()).then_some(text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn read_docx(path: &Path) -> anyhow::Result<String> {
    let file = fs::File::open(path).context("failed to open file")?;
    let mut archive = zip::ZipArchive::new(file).context("not a zip archive")?;
    let mut entry = archive
        .by_name("word/document.xml")
        .context("missing word/document.xml")?;

    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .context("failed to read word/document.xml")?;

    Ok(docx_paragraphs(&xml))
}

fn format_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::Float(f) if f.fract() == 0.0 => format!("{:.0}", f),
        other => other.to_string(),
    }
}

fn read_xlsx(path: &Path) -> anyhow::Result<String> {
    let mut workbook: Xlsx<_> = open_workbook(path).context("failed to open workbook")?;
    let mut lines = Vec::new();

    for sheet in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&sheet)
            .with_context(|| format!("failed to read sheet '{}'", sheet))?;

        lines.push(format!("[Sheet] {}", sheet));
        for row in range.rows() {
            let cells: Vec<String> = row.iter().map(format_cell).collect();
            lines.push(cells.join(" | "));
        }
    }

    Ok(lines.join("\n"))
}
