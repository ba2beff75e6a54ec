//! Page layout: a vertical cursor over fixed-size pages and the page-break
//! policy that decides when to start a new page.
//!
//! Coordinates are millimetres measured from the top-left page corner; the
//! renderer flips them into PDF space. A block fits when
//! `y + height <= page height - bottom margin`: the comparison that forces a
//! break is strict, so a block that exactly fills the remaining space stays on
//! the current page.

use log::debug;

use crate::block::{ContentBlock, TableBlock};
use crate::config::PageGeometry;

/// A block with the coordinates assigned when it was placed.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedBlock {
    /// Left edge.
    pub x_mm: f64,
    /// Top edge.
    pub y_mm: f64,
    /// The block itself.
    pub block: ContentBlock,
}

impl PlacedBlock {
    /// Bottom edge of the block.
    pub fn bottom_mm(&self) -> f64 {
        self.y_mm + self.block.height_mm()
    }
}

/// Text stamped at the bottom of a page once the page count is known.
#[derive(Clone, Debug, PartialEq)]
pub struct Footer {
    /// `Page i of n`.
    pub page_label: String,
    /// `Generated: <timestamp>`.
    pub timestamp_label: String,
}

/// One page of the composed document.
#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    index: usize,
    blocks: Vec<PlacedBlock>,
    footer: Option<Footer>,
}

impl Page {
    fn new(index: usize) -> Self {
        Self {
            index,
            blocks: Vec::new(),
            footer: None,
        }
    }

    /// Zero-based position of the page in the document.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Blocks in placement order.
    pub fn blocks(&self) -> &[PlacedBlock] {
        &self.blocks
    }

    /// Footer, present after composition finished.
    pub fn footer(&self) -> Option<&Footer> {
        self.footer.as_ref()
    }

    pub(crate) fn set_footer(&mut self, footer: Footer) {
        self.footer = Some(footer);
    }

    /// Lowest bottom edge of any block, or `None` on an empty page.
    pub fn content_bottom_mm(&self) -> Option<f64> {
        self.blocks
            .iter()
            .map(PlacedBlock::bottom_mm)
            .fold(None, |acc: Option<f64>, bottom| {
                Some(acc.map_or(bottom, |current| current.max(bottom)))
            })
    }

    /// All text on the page, one block per line group.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .map(|placed| placed.block.text())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Vertical position on the current page plus the pages already flushed.
pub struct LayoutCursor {
    geometry: PageGeometry,
    block_spacing_mm: f64,
    pages: Vec<Page>,
    current: Page,
    y_mm: f64,
}

impl LayoutCursor {
    /// Opens the first page.
    pub fn new(geometry: PageGeometry, block_spacing_mm: f64) -> Self {
        Self {
            geometry,
            block_spacing_mm,
            pages: Vec::new(),
            current: Page::new(0),
            y_mm: geometry.margin_top_mm,
        }
    }

    /// Current vertical position.
    pub fn y_mm(&self) -> f64 {
        self.y_mm
    }

    /// Index of the page being filled.
    pub fn page_index(&self) -> usize {
        self.current.index
    }

    /// Page geometry in use.
    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    /// Whether nothing has been placed on the current page yet.
    pub fn at_page_top(&self) -> bool {
        self.current.blocks.is_empty()
    }

    /// Space left between the cursor and the bottom margin.
    pub fn remaining_mm(&self) -> f64 {
        self.geometry.content_limit() - self.y_mm
    }

    /// Whether a block of `height_mm` fits below the cursor.
    pub fn will_fit(&self, height_mm: f64) -> bool {
        !(self.y_mm + height_mm > self.geometry.content_limit())
    }

    /// Closes the current page and opens a fresh one.
    pub fn flush(&mut self) {
        let next = Page::new(self.current.index + 1);
        let finished = std::mem::replace(&mut self.current, next);
        debug!(
            "page {} flushed with {} block(s) at y={:.1}mm",
            finished.index + 1,
            finished.blocks.len(),
            self.y_mm
        );
        self.pages.push(finished);
        self.y_mm = self.geometry.margin_top_mm;
    }

    /// Moves the cursor down.
    pub fn advance(&mut self, height_mm: f64) {
        self.y_mm += height_mm;
    }

    /// Starts a new page unless `height_mm` still fits on this one.
    ///
    /// Heights larger than a whole printable page only force a break when the
    /// current page already has content, so oversized content ends up alone on
    /// a fresh page instead of flushing forever.
    pub fn ensure_space(&mut self, height_mm: f64) {
        if self.will_fit(height_mm) {
            return;
        }
        if height_mm > self.geometry.printable_height() && self.at_page_top() {
            debug!(
                "block of {:.1}mm exceeds the printable height; placing it alone",
                height_mm
            );
            return;
        }
        self.flush();
    }

    fn put(&mut self, x_mm: f64, block: ContentBlock) -> f64 {
        let height = block.height_mm();
        self.current.blocks.push(PlacedBlock {
            x_mm,
            y_mm: self.y_mm,
            block,
        });
        height
    }

    /// Places one block at the left margin and returns the page it landed on.
    pub fn place_block(&mut self, block: ContentBlock) -> usize {
        let x_mm = self.geometry.margin_x_mm;
        self.place_block_at(x_mm, block)
    }

    /// Like [`LayoutCursor::place_block`] with an explicit left edge.
    pub fn place_block_at(&mut self, x_mm: f64, block: ContentBlock) -> usize {
        self.ensure_space(block.height_mm());
        let page = self.current.index;
        let height = self.put(x_mm, block);
        self.advance(height + self.block_spacing_mm);
        page
    }

    /// Places blocks that must stay on one page, stacked without gaps between
    /// them, each at its own left edge. Their combined height is checked
    /// against the page-break policy.
    pub fn place_together(&mut self, blocks: Vec<(f64, ContentBlock)>) -> usize {
        let total: f64 = blocks.iter().map(|(_, block)| block.height_mm()).sum();
        self.ensure_space(total);
        let page = self.current.index;
        for (x_mm, block) in blocks {
            let height = self.put(x_mm, block);
            self.advance(height);
        }
        self.advance(self.block_spacing_mm);
        page
    }

    /// Places a block and keeps it on the same page as the first
    /// `following_mm` of whatever is placed next (used for headings).
    pub fn place_keep_with_next(&mut self, block: ContentBlock, following_mm: f64) -> usize {
        self.ensure_space(block.height_mm() + self.block_spacing_mm + following_mm);
        self.place_block(block)
    }

    /// Places a table, splitting it between data rows across as many pages as
    /// needed. Continuations repeat the header row. Returns the page the table
    /// starts on.
    pub fn place_table(&mut self, table: TableBlock) -> usize {
        let x_mm = self.geometry.margin_x_mm;
        let mut remaining = table;
        let mut first_page = None;

        loop {
            if self.will_fit(remaining.height_mm()) {
                let page = self.place_block_at(x_mm, ContentBlock::Table(remaining));
                return first_page.unwrap_or(page);
            }

            let mut fitting = remaining.rows_fitting(self.remaining_mm());
            if fitting == 0 {
                if !self.at_page_top() {
                    self.flush();
                    continue;
                }
                // Not even one row fits an empty page; place one anyway.
                fitting = 1.min(remaining.rows.len());
            }

            let tail = remaining.split_off(fitting);
            let page = self.current.index;
            first_page.get_or_insert(page);
            self.put(x_mm, ContentBlock::Table(remaining));
            debug!(
                "table split on page {} after {} row(s), {} row(s) continue",
                page + 1,
                fitting,
                tail.rows.len()
            );
            self.flush();
            if tail.rows.is_empty() {
                return first_page.unwrap_or(page);
            }
            remaining = tail;
        }
    }

    /// Closes the last page and returns all pages in order.
    pub fn finish(mut self) -> Vec<Page> {
        if !self.current.blocks.is_empty() || self.pages.is_empty() {
            self.pages.push(self.current);
        }
        self.pages
    }
}
