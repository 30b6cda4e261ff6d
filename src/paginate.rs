//! Page geometry and partitioning of wrapped lines into pages.

use serde::{Deserialize, Serialize};

use crate::wrap::char_budget;

/// Pixel geometry shared by wrapping, pagination and rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLayout {
    pub width: u32,
    pub font_size: u32,
    /// Extra vertical space between lines.
    pub leading: u32,
    pub padding: u32,
    pub max_height: u32,
    /// Space kept free below the last line for the footer.
    pub footer_reserve: u32,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            width: 1800,
            font_size: 28,
            leading: 8,
            padding: 40,
            max_height: 32000,
            footer_reserve: 40,
        }
    }
}

impl PageLayout {
    pub fn line_height(&self) -> u32 {
        self.font_size + self.leading
    }

    pub fn char_budget(&self) -> usize {
        char_budget(self.width, self.font_size, self.padding)
    }

    /// `floor((max_height - 2 * padding - footer_reserve) / line_height)`, at least one.
    pub fn lines_per_page(&self) -> usize {
        let usable = self
            .max_height
            .saturating_sub(self.padding * 2)
            .saturating_sub(self.footer_reserve);
        let line_height = self.line_height().max(1);
        ((usable / line_height) as usize).max(1)
    }

    /// Pixel height of a page holding `line_count` lines.
    pub fn page_height(&self, line_count: usize) -> u32 {
        line_count as u32 * self.line_height() + self.padding * 2 + self.footer_reserve
    }
}

/// One contiguous slice of a wrapped document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<'a> {
    /// 1-based page number.
    pub number: usize,
    pub total: usize,
    pub lines: &'a [String],
    pub height: u32,
}

/// Number of pages needed for `total_lines`. Always at least one.
pub fn page_count(total_lines: usize, lines_per_page: usize) -> usize {
    total_lines.div_ceil(lines_per_page.max(1)).max(1)
}

/// Partitions `lines` into pages of `layout.lines_per_page()` lines.
///
/// An empty input produces a single empty page.
pub fn paginate<'a>(lines: &'a [String], layout: &PageLayout) -> Vec<Page<'a>> {
    let per_page = layout.lines_per_page();
    let total = page_count(lines.len(), per_page);

    if lines.is_empty() {
        return vec![Page {
            number: 1,
            total,
            lines,
            height: layout.page_height(0),
        }];
    }

    lines
        .chunks(per_page)
        .enumerate()
        .map(|(idx, chunk)| Page {
            number: idx + 1,
            total,
            lines: chunk,
            height: layout.page_height(chunk.len()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn small_layout() -> PageLayout {
        // 10 lines per page at 36px line height
        PageLayout {
            max_height: 80 + 40 + 36 * 10,
            ..PageLayout::default()
        }
    }

    fn numbered(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("line {}", i)).collect()
    }

    #[test]
    fn test_default_lines_per_page() {
        assert_eq!(PageLayout::default().lines_per_page(), 885);
        assert_eq!(PageLayout::default().line_height(), 36);
    }

    #[test]
    fn test_lines_per_page_never_zero() {
        let layout = PageLayout {
            max_height: 10,
            ..PageLayout::default()
        };
        assert_eq!(layout.lines_per_page(), 1);
    }

    #[test]
    fn test_pagination_is_lossless_and_ordered() {
        let lines = numbered(37);
        let pages = paginate(&lines, &small_layout());

        let rejoined: Vec<String> = pages.iter().flat_map(|p| p.lines.to_vec()).collect();
        assert_eq!(rejoined, lines);
    }

    #[test]
    fn test_page_numbers_are_contiguous() {
        let lines = numbered(37);
        let pages = paginate(&lines, &small_layout());

        assert_eq!(pages.len(), 4);
        let numbers: Vec<usize> = pages.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert!(pages.iter().all(|p| p.total == 4));
        assert_eq!(pages[3].lines.len(), 7);
    }

    #[test]
    fn test_one_line_over_capacity_makes_two_pages() {
        let lines = numbered(11);
        let pages = paginate(&lines, &small_layout());

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].lines.len(), 10);
        assert_eq!(pages[1].lines.len(), 1);
    }

    #[test]
    fn test_empty_input_yields_single_page() {
        let pages = paginate(&[], &small_layout());

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].number, 1);
        assert!(pages[0].lines.is_empty());
        assert_eq!(pages[0].height, 120);
    }

    #[test]
    fn test_page_height_tracks_line_count() {
        let layout = PageLayout::default();
        assert_eq!(layout.page_height(3), 3 * 36 + 80 + 40);
    }
}
