//! Fixed-budget line wrapping and the document banner.

use chrono::{DateTime, Utc};

/// Approximate advance width of one monospace glyph, as a fraction of the font size.
const GLYPH_WIDTH_RATIO: f64 = 0.9;

/// Width of the source name slot in the banner.
const BANNER_NAME_WIDTH: usize = 40;

/// Timestamp format shared by the banner and the page footer.
pub const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Maximum characters per display line for a render width.
///
/// `floor((width - 2 * padding) / (font_size * 0.9))`, never less than one.
pub fn char_budget(width: u32, font_size: u32, padding: u32) -> usize {
    let usable = width.saturating_sub(padding * 2) as f64;
    let glyph = font_size as f64 * GLYPH_WIDTH_RATIO;
    if glyph <= 0.0 {
        return 1;
    }
    ((usable / glyph).floor() as usize).max(1)
}

/// Hard-splits one source line into chunks of exactly `budget` characters.
///
/// The last chunk may be shorter. An empty line yields one empty line.
pub fn wrap_line(line: &str, budget: usize) -> Vec<String> {
    let budget = budget.max(1);
    if line.is_empty() {
        return vec![String::new()];
    }

    let chars: Vec<char> = line.chars().collect();
    chars
        .chunks(budget)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Splits `text` on `\n` and wraps every segment.
pub fn wrap_text(text: &str, budget: usize) -> Vec<String> {
    text.split('\n')
        .flat_map(|line| wrap_line(line, budget))
        .collect()
}

/// Values embedded in the document banner.
#[derive(Debug, Clone)]
pub struct Banner<'a> {
    pub source_name: &'a str,
    /// Upper-cased extension including the dot, e.g. `.TXT`.
    pub extension: &'a str,
    pub dpi: u32,
    pub quality: u8,
    pub timestamp: DateTime<Utc>,
}

impl Banner<'_> {
    /// The boxed banner block, followed by one blank separator line.
    pub fn lines(&self) -> Vec<String> {
        let name: String = format!("{:<width$}", self.source_name, width = BANNER_NAME_WIDTH)
            .chars()
            .take(BANNER_NAME_WIDTH)
            .collect();
        let now = self.timestamp.format(DISPLAY_TIME_FORMAT);

        vec![
            "╔══════════════════════════════════════════════════════════════╗".to_string(),
            "║  SEEDOC - Professional Document Converter                     ║".to_string(),
            format!("║  Source: {}", name),
            format!(
                "║  Format: {}  DPI: {}  Quality: {}                    ║",
                self.extension, self.dpi, self.quality
            ),
            format!("║  Date: {}                                  ║", now),
            "╚══════════════════════════════════════════════════════════════╝".to_string(),
            String::new(),
        ]
    }
}

/// Banner plus wrapped body, ready for pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedDocument {
    /// Number of leading lines that came from the banner (after wrapping).
    pub header_lines: usize,
    pub lines: Vec<String>,
}

impl WrappedDocument {
    pub fn new(banner: &[String], body: &str, budget: usize) -> Self {
        let mut lines: Vec<String> = banner
            .iter()
            .flat_map(|line| wrap_line(line, budget))
            .collect();
        let header_lines = lines.len();
        lines.extend(wrap_text(body, budget));

        Self {
            header_lines,
            lines,
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines that came from the source body.
    pub fn body(&self) -> &[String] {
        &self.lines[self.header_lines..]
    }
}
