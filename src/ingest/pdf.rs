//! PDF text extraction.

use crate::chunking::PageText;
use crate::error::{AcervoError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

static PDF_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.pdf$").expect("valid suffix regex"));

static INLINE_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{a0}\u{c}\r]+").expect("valid space regex"));

static EXTRA_BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank line regex"));

/// Text pages of a PDF.
#[derive(Debug, Clone)]
pub struct ParsedPdf {
    pub title: String,
    /// Non-empty pages only, numbered by their position in the file.
    pub pages: Vec<PageText>,
    /// Page count including empty pages.
    pub total_pages: usize,
}

/// Document title for a PDF file name: the name without its `.pdf` suffix.
pub fn title_from_file_name(file_name: &str) -> String {
    PDF_SUFFIX.replace(file_name.trim(), "").to_string()
}

/// Collapse runs of inline whitespace, trim lines, and keep at most one blank
/// line between paragraphs.
pub fn normalize_whitespace(text: &str) -> String {
    let lines: Vec<String> = text
        .lines()
        .map(|line| INLINE_SPACE.replace_all(line, " ").trim().to_string())
        .collect();
    EXTRA_BLANK_LINES
        .replace_all(&lines.join("\n"), "\n\n")
        .trim()
        .to_string()
}

/// Build a [`ParsedPdf`] from raw per-page text.
pub fn pages_from_text(file_name: &str, raw_pages: Vec<String>) -> ParsedPdf {
    let total_pages = raw_pages.len();
    let pages = raw_pages
        .iter()
        .enumerate()
        .map(|(i, raw)| PageText::new(i as u32 + 1, normalize_whitespace(raw)))
        .filter(|page| !page.text.is_empty())
        .collect();

    ParsedPdf {
        title: title_from_file_name(file_name),
        pages,
        total_pages,
    }
}

/// Extract per-page text from PDF bytes.
///
/// CPU-bound; call from a blocking context.
pub fn parse_pdf(bytes: &[u8], file_name: &str) -> Result<ParsedPdf> {
    let raw_pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| AcervoError::PdfExtract(format!("{}: {}", file_name, e)))?;
    Ok(pages_from_text(file_name, raw_pages))
}

/// PDF files under `dir`, sorted by path.
pub fn collect_pdf_files(dir: &Path, recursive: bool) -> Vec<PathBuf> {
    let walker = WalkDir::new(dir).max_depth(if recursive { usize::MAX } else { 1 });
    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_from_file_name() {
        assert_eq!(title_from_file_name("Offer Guide.pdf"), "Offer Guide");
        assert_eq!(title_from_file_name("REPORT.PDF"), "REPORT");
        assert_eq!(title_from_file_name("notes.pdf.txt"), "notes.pdf.txt");
    }

    #[test]
    fn test_normalize_whitespace() {
        let raw = "  Title \t here \n\n\n\nFirst   line\nsecond\u{a0}line  \n";
        assert_eq!(normalize_whitespace(raw), "Title here\n\nFirst line\nsecond line");
        assert_eq!(normalize_whitespace(" \n \t\n"), "");
    }

    #[test]
    fn test_empty_pages_dropped_but_counted() {
        let parsed = pages_from_text(
            "deck.pdf",
            vec!["Intro".to_string(), "   ".to_string(), "Outro".to_string()],
        );
        assert_eq!(parsed.title, "deck");
        assert_eq!(parsed.total_pages, 3);
        assert_eq!(parsed.pages.len(), 2);
        assert_eq!(parsed.pages[1].page_number, 3);
    }

    #[test]
    fn test_invalid_pdf_is_an_error() {
        let result = parse_pdf(b"definitely not a pdf", "bad.pdf");
        assert!(matches!(result, Err(AcervoError::PdfExtract(_))));
    }

    #[test]
    fn test_collect_pdf_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"x").unwrap();
        std::fs::write(dir.path().join("a.PDF"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(nested.join("c.pdf"), b"x").unwrap();

        let flat = collect_pdf_files(dir.path(), false);
        let names: Vec<_> = flat
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);

        assert_eq!(collect_pdf_files(dir.path(), true).len(), 3);
    }
}
