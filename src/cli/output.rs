//! CLI output formatting utilities.

use crate::store::{Document, DocumentStatus, RetrievedChunk};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print one document line.
    pub fn document_info(doc: &Document) {
        let status = match doc.status {
            DocumentStatus::Completed => style(doc.status.as_str()).green(),
            DocumentStatus::Error => style(doc.status.as_str()).red(),
            _ => style(doc.status.as_str()).yellow(),
        };
        println!(
            "  {} {} ({}, {}, {} chunks, {})",
            style("*").cyan(),
            style(&doc.title).bold(),
            style(doc.id).dim(),
            doc.source_kind,
            doc.total_chunks,
            status
        );
        if let Some(message) = &doc.error_message {
            println!("      {}", style(message).red().dim());
        }
    }

    /// Print a search result.
    pub fn search_result(rank: usize, chunk: &RetrievedChunk) {
        let location = match (chunk.page_number, &chunk.section_title) {
            (Some(page), Some(section)) => format!("{} (p.{})", section, page),
            (Some(page), None) => format!("p.{}", page),
            (None, Some(section)) => section.clone(),
            (None, None) => chunk.source_kind.to_string(),
        };
        println!(
            "\n{} {} {} @ {} (score: {:.2})",
            style(format!("{}.", rank)).green(),
            style(&chunk.document_title).bold(),
            style(format!("[{}]", chunk.source_kind)).dim(),
            style(location).cyan(),
            chunk.similarity
        );
        println!("   {}", content_preview(&chunk.content, 200));
    }

    /// Create a progress bar.
    pub fn progress_bar(len: u64, msg: &str) -> ProgressBar {
        let pb = ProgressBar::new(len);
        if let Ok(bar_style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(bar_style.progress_chars("#>-"));
        }
        pb.set_message(msg.to_string());
        pb
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Format duration in seconds to a human-readable string.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Single-line preview, truncated on a char boundary.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let cut: String = content.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(605), "10m 5s");
        assert_eq!(format_duration(3723), "1h 2m 3s");
    }

    #[test]
    fn test_content_preview_respects_char_boundaries() {
        assert_eq!(content_preview("a\nb", 10), "a b");
        assert_eq!(content_preview("ação é boa", 4), "ação...");
    }
}
