//! SVG drawing descriptions for paginated text.

use chrono::{DateTime, Utc};
use std::fmt::Write;

use crate::paginate::{Page, PageLayout};
use crate::wrap::DISPLAY_TIME_FORMAT;

/// Font families tried in order, ending with the generic family.
pub const FONT_FAMILIES: &[&str] = &["D2Coding", "Consolas", "Monaco", "Courier New", "monospace"];

const PRODUCT_LABEL: &str = "SEEDOC";
const FOOTER_FONT_SIZE: u32 = 10;
/// Distance of the footer baseline from the bottom edge.
const FOOTER_OFFSET: u32 = 20;

/// Values that are the same for every page of one conversion.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub layout: PageLayout,
    pub dpi: u32,
    pub timestamp: DateTime<Utc>,
}

/// Drops control characters that are not allowed in XML 1.0 text.
///
/// Tab, line feed and carriage return are kept.
fn is_stripped_control(ch: char) -> bool {
    matches!(ch, '\u{00}'..='\u{08}' | '\u{0B}'..='\u{0C}' | '\u{0E}'..='\u{1F}' | '\u{7F}')
}

/// Escapes markup characters and strips control characters.
pub fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if is_stripped_control(c) => {}
            c => out.push(c),
        }
    }
    out
}

fn font_family_attr() -> String {
    FONT_FAMILIES
        .iter()
        .map(|family| {
            if *family == "monospace" {
                family.to_string()
            } else {
                format!("'{}'", family)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Footer text for one page.
pub fn footer_text(page: &Page<'_>, ctx: &PageContext) -> String {
    format!(
        "Page {}/{} | {} | DPI: {} | {}",
        page.number,
        page.total,
        ctx.timestamp.format(DISPLAY_TIME_FORMAT),
        ctx.dpi,
        PRODUCT_LABEL
    )
}

/// Builds the SVG document for one page.
pub fn render_page(page: &Page<'_>, ctx: &PageContext) -> String {
    let layout = &ctx.layout;
    let width = layout.width;
    let height = page.height;
    let line_height = layout.line_height();

    let mut svg = String::new();
    // Writing into a String cannot fail.
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    );
    svg.push_str(r#"<rect width="100%" height="100%" fill="white"/>"#);
    let _ = write!(
        svg,
        r#"<g font-family="{family}" font-size="{size}" fill="black">"#,
        family = font_family_attr(),
        size = layout.font_size
    );

    for (idx, line) in page.lines.iter().enumerate() {
        let y = layout.padding + layout.font_size + idx as u32 * line_height;
        let _ = write!(
            svg,
            r#"<text x="{x}" y="{y}" xml:space="preserve">{text}</text>"#,
            x = layout.padding,
            y = y,
            text = escape_text(line)
        );
    }

    let _ = write!(
        svg,
        r##"<text x="{x}" y="{y}" font-size="{size}" fill="#666">{text}</text>"##,
        x = layout.padding,
        y = height.saturating_sub(FOOTER_OFFSET),
        size = FOOTER_FONT_SIZE,
        text = escape_text(&footer_text(page, ctx))
    );
    svg.push_str("</g></svg>");
    svg
}
