//! Message formatter
//!
//! Turns a flat model response into display blocks: headings, paragraphs,
//! list items, rules, spacers and tables. Single pass, line oriented; inline
//! `**bold**` is the only span markup recognized. It is not a Markdown
//! parser: no code blocks, links or nesting.

use serde::Serialize;

/// A bold line longer than this (inner text) is treated as a paragraph
const MAX_BOLD_LINE_LEN: usize = 60;

/// Inline span inside paragraph, heading or list text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum Span {
    /// Plain text
    Text(String),
    /// `**bold**` text
    Bold(String),
}

impl Span {
    /// Whether the span holds only whitespace
    pub fn is_blank(&self) -> bool {
        match self {
            Span::Text(text) | Span::Bold(text) => text.trim().is_empty(),
        }
    }
}

/// Display block produced by [`format_message`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// `#`, `##` or `###` heading
    Heading {
        /// 1 to 3
        level: u8,
        /// Heading text
        spans: Vec<Span>,
    },
    /// Ordinary text line
    Paragraph {
        /// Line text
        spans: Vec<Span>,
    },
    /// `-`, `*` or `•` list item
    BulletItem {
        /// Item text
        spans: Vec<Span>,
    },
    /// `1.` style list item
    NumberedItem {
        /// Number as written
        number: u32,
        /// Item text
        spans: Vec<Span>,
    },
    /// A short line made of a single bold span, rendered as a sub-heading
    BoldLine {
        /// Text without the asterisks
        text: String,
    },
    /// `---`
    HorizontalRule,
    /// Blank line(s)
    Spacer,
    /// Pipe table
    Table {
        /// Header row, when a separator row followed the first row
        header: Option<Vec<String>>,
        /// Body rows
        rows: Vec<Vec<String>>,
    },
}

/// Format a raw text buffer into display blocks
pub fn format_message(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut table_buffer: Vec<&str> = Vec::new();

    for raw_line in text.lines() {
        let line = raw_line.trim();

        if line.starts_with('|') {
            table_buffer.push(line);
            continue;
        }
        if !table_buffer.is_empty() {
            blocks.push(flush_table(&table_buffer));
            table_buffer.clear();
        }

        if line.is_empty() {
            if !matches!(blocks.last(), Some(Block::Spacer)) {
                blocks.push(Block::Spacer);
            }
            continue;
        }

        if let Some(block) = format_line(line) {
            blocks.push(block);
        }
    }

    if !table_buffer.is_empty() {
        blocks.push(flush_table(&table_buffer));
    }

    blocks
}

/// `None` for a line with nothing left to show, e.g. `** **`
fn format_line(line: &str) -> Option<Block> {
    if let Some((level, rest)) = heading(line) {
        return Some(Block::Heading {
            level,
            spans: parse_inline(rest),
        });
    }
    if is_horizontal_rule(line) {
        return Some(Block::HorizontalRule);
    }
    for marker in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return Some(Block::BulletItem {
                spans: parse_inline(rest.trim_start()),
            });
        }
    }
    if let Some((number, rest)) = numbered_item(line) {
        return Some(Block::NumberedItem {
            number,
            spans: parse_inline(rest),
        });
    }
    if let Some(text) = bold_line(line) {
        return Some(Block::BoldLine {
            text: text.to_string(),
        });
    }
    let spans = parse_inline(line);
    if spans.iter().all(Span::is_blank) {
        return None;
    }
    Some(Block::Paragraph { spans })
}

fn heading(line: &str) -> Option<(u8, &str)> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if hashes == 0 {
        return None;
    }
    let rest = line[hashes..].strip_prefix(' ')?;
    Some((hashes.min(3) as u8, rest.trim()))
}

fn is_horizontal_rule(line: &str) -> bool {
    let mut chars = line.chars();
    match chars.next() {
        Some(first @ ('-' | '*' | '_')) => line.len() >= 3 && chars.all(|c| c == first),
        _ => false,
    }
}

fn numbered_item(line: &str) -> Option<(u32, &str)> {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = line[digits..].strip_prefix(". ")?;
    let number = line[..digits].parse().ok()?;
    Some((number, rest.trim_start()))
}

/// `**Note**` on its own line, short and without a colon
fn bold_line(line: &str) -> Option<&str> {
    let inner = line.strip_prefix("**")?.strip_suffix("**")?;
    if inner.trim().is_empty()
        || inner.contains("**")
        || inner.contains(':')
        || inner.chars().count() >= MAX_BOLD_LINE_LEN
    {
        return None;
    }
    Some(inner.trim())
}

/// Split text into plain and `**bold**` spans. An unmatched `**` is kept as
/// literal text.
pub fn parse_inline(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let after_open = &rest[start + 2..];
        let Some(len) = after_open.find("**") else {
            break;
        };
        if start > 0 {
            spans.push(Span::Text(rest[..start].to_string()));
        }
        let inner = &after_open[..len];
        if !inner.trim().is_empty() {
            spans.push(Span::Bold(inner.to_string()));
        } else if !inner.is_empty() {
            spans.push(Span::Text(inner.to_string()));
        }
        rest = &after_open[len + 2..];
    }

    if !rest.is_empty() {
        spans.push(Span::Text(rest.to_string()));
    }
    spans
}

fn split_cells(row: &str) -> Vec<String> {
    let mut cells: Vec<&str> = row.split('|').collect();
    if cells.first().is_some_and(|c| c.trim().is_empty()) {
        cells.remove(0);
    }
    if cells.last().is_some_and(|c| c.trim().is_empty()) {
        cells.pop();
    }
    cells.into_iter().map(|c| c.trim().to_string()).collect()
}

fn is_separator_row(cells: &[String]) -> bool {
    !cells.is_empty()
        && cells.iter().all(|cell| {
            !cell.is_empty() && cell.contains('-') && cell.chars().all(|c| c == '-' || c == ':')
        })
}

fn flush_table(lines: &[&str]) -> Block {
    let mut rows: Vec<Vec<String>> = lines.iter().map(|line| split_cells(line)).collect();

    let header = if rows.len() > 1 && is_separator_row(&rows[1]) {
        rows.remove(1);
        Some(rows.remove(0))
    } else {
        None
    };
    rows.retain(|row| !is_separator_row(row));

    Block::Table { header, rows }
}
