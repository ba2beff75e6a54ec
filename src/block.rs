//! Content blocks: the renderable units placed on pages.
//!
//! Each variant carries exactly what is needed to measure and draw it. Heights
//! are fixed at construction time from the configured line metrics, so the
//! layout engine can make page-break decisions without touching the PDF
//! backend.

use crate::richtext::{Color, TextLine};

/// Role of a title line; selects font size and weight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TitleLevel {
    /// Document title, centred.
    Document,
    /// Section heading.
    Section,
    /// Caption line above a captured visual.
    Visual,
}

impl TitleLevel {
    /// Font size used for the level.
    pub fn font_size_pt(self) -> f64 {
        match self {
            TitleLevel::Document => 18.0,
            TitleLevel::Section => 16.0,
            TitleLevel::Visual => 14.0,
        }
    }
}

/// Horizontal placement of text lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HorizontalAlignment {
    /// Start at the block's x position.
    #[default]
    Left,
    /// Centre on the page.
    Center,
}

/// A single bold heading line.
#[derive(Clone, Debug, PartialEq)]
pub struct TitleBlock {
    /// Heading text.
    pub text: String,
    /// Heading role.
    pub level: TitleLevel,
    /// Measured height.
    pub height_mm: f64,
}

/// One or more lines of styled body text.
#[derive(Clone, Debug, PartialEq)]
pub struct ParagraphBlock {
    /// Lines in top-to-bottom order.
    pub lines: Vec<TextLine>,
    /// Alignment of every line.
    pub alignment: HorizontalAlignment,
    /// Height of one line.
    pub line_height_mm: f64,
}

impl ParagraphBlock {
    /// Total height of all lines.
    pub fn height_mm(&self) -> f64 {
        self.lines.len() as f64 * self.line_height_mm
    }

    /// Plain text of every line, joined by newlines.
    pub fn plain_text(&self) -> String {
        self.lines
            .iter()
            .map(TextLine::plain_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A fixed-width table column.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    /// Header label.
    pub label: String,
    /// Column width.
    pub width_mm: f64,
}

impl Column {
    /// Creates a column.
    pub fn new(label: impl Into<String>, width_mm: f64) -> Self {
        Self {
            label: label.into(),
            width_mm,
        }
    }
}

/// Per-cell styling decided by the table renderer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CellStyle {
    /// Default black text.
    #[default]
    Plain,
    /// Sign-coloured variance text.
    Colored(Color),
}

impl CellStyle {
    /// Text colour of the cell.
    pub fn color(self) -> Color {
        match self {
            CellStyle::Plain => Color::BLACK,
            CellStyle::Colored(color) => color,
        }
    }
}

/// One data row: display strings plus a style hint per cell.
#[derive(Clone, Debug, PartialEq)]
pub struct TableRow {
    /// Formatted, already truncated cell texts.
    pub cells: Vec<String>,
    /// Style for each cell, index-aligned with `cells`.
    pub style_hints: Vec<CellStyle>,
}

/// A laid-out table; see [`crate::table`] for construction.
#[derive(Clone, Debug, PartialEq)]
pub struct TableBlock {
    /// Columns in left-to-right order.
    pub columns: Vec<Column>,
    /// Data rows in display order.
    pub rows: Vec<TableRow>,
    /// Height of the header row.
    pub header_row_height_mm: f64,
    /// Height of each data row.
    pub data_row_height_mm: f64,
    /// Font size of the header row.
    pub header_font_size_pt: f64,
    /// Font size of data rows.
    pub data_font_size_pt: f64,
}

impl TableBlock {
    /// `header + rows * row height`.
    pub fn height_mm(&self) -> f64 {
        self.header_row_height_mm + self.rows.len() as f64 * self.data_row_height_mm
    }

    /// Height of the header plus the first data row; a table is never split
    /// into less than this.
    pub fn min_height_mm(&self) -> f64 {
        self.header_row_height_mm + self.data_row_height_mm.min(self.height_mm())
    }

    /// Number of data rows that fit into `available_mm` below the header.
    pub fn rows_fitting(&self, available_mm: f64) -> usize {
        let below_header = available_mm - self.header_row_height_mm;
        if below_header < 0.0 {
            return 0;
        }
        let mut count = 0;
        while count < self.rows.len()
            && (count + 1) as f64 * self.data_row_height_mm <= below_header
        {
            count += 1;
        }
        count
    }

    /// Splits off the rows from `at` onwards into a continuation table that
    /// repeats the header.
    pub fn split_off(&mut self, at: usize) -> TableBlock {
        TableBlock {
            columns: self.columns.clone(),
            rows: self.rows.split_off(at),
            header_row_height_mm: self.header_row_height_mm,
            data_row_height_mm: self.data_row_height_mm,
            header_font_size_pt: self.header_font_size_pt,
            data_font_size_pt: self.data_font_size_pt,
        }
    }

    /// Total width of all columns.
    pub fn width_mm(&self) -> f64 {
        self.columns.iter().map(|column| column.width_mm).sum()
    }
}

/// An RGB raster to draw at a given size.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageBlock {
    /// Raster width in pixels.
    pub pixel_width: u32,
    /// Raster height in pixels.
    pub pixel_height: u32,
    /// Encoded image (PNG or JPEG).
    pub raster_bytes: Vec<u8>,
    /// Laid-out width on the page.
    pub width_mm: f64,
    /// Laid-out height on the page.
    pub height_mm: f64,
}

impl ImageBlock {
    /// Fits a raster into `max_width_mm` and `max_height_mm`, keeping its
    /// aspect ratio.
    pub fn fitted(
        pixel_width: u32,
        pixel_height: u32,
        raster_bytes: Vec<u8>,
        max_width_mm: f64,
        max_height_mm: f64,
    ) -> Self {
        let aspect = f64::from(pixel_height) / f64::from(pixel_width.max(1));
        let mut width_mm = max_width_mm;
        let mut height_mm = width_mm * aspect;
        if height_mm > max_height_mm {
            height_mm = max_height_mm;
            width_mm = height_mm / aspect.max(f64::EPSILON);
        }
        Self {
            pixel_width,
            pixel_height,
            raster_bytes,
            width_mm,
            height_mm,
        }
    }
}

/// Individual content blocks that make up a page.
#[derive(Clone, Debug, PartialEq)]
pub enum ContentBlock {
    /// Heading line.
    Title(TitleBlock),
    /// Body text.
    Paragraph(ParagraphBlock),
    /// Tabular data.
    Table(TableBlock),
    /// Captured visual.
    Image(ImageBlock),
}

impl ContentBlock {
    /// Convenience helper for building a title block.
    pub fn title(text: impl Into<String>, level: TitleLevel, height_mm: f64) -> Self {
        Self::Title(TitleBlock {
            text: text.into(),
            level,
            height_mm,
        })
    }

    /// Convenience helper for building a left-aligned paragraph block.
    pub fn paragraph(lines: impl Into<Vec<TextLine>>, line_height_mm: f64) -> Self {
        Self::Paragraph(ParagraphBlock {
            lines: lines.into(),
            alignment: HorizontalAlignment::Left,
            line_height_mm,
        })
    }

    /// Convenience helper for building a centred paragraph block.
    pub fn centered(lines: impl Into<Vec<TextLine>>, line_height_mm: f64) -> Self {
        Self::Paragraph(ParagraphBlock {
            lines: lines.into(),
            alignment: HorizontalAlignment::Center,
            line_height_mm,
        })
    }

    /// Measured height of the block.
    pub fn height_mm(&self) -> f64 {
        match self {
            ContentBlock::Title(title) => title.height_mm,
            ContentBlock::Paragraph(paragraph) => paragraph.height_mm(),
            ContentBlock::Table(table) => table.height_mm(),
            ContentBlock::Image(image) => image.height_mm,
        }
    }

    /// All text carried by the block, for inspection and tests.
    pub fn text(&self) -> String {
        match self {
            ContentBlock::Title(title) => title.text.clone(),
            ContentBlock::Paragraph(paragraph) => paragraph.plain_text(),
            ContentBlock::Table(table) => {
                let mut lines = vec![table
                    .columns
                    .iter()
                    .map(|column| column.label.as_str())
                    .collect::<Vec<_>>()
                    .join(" | ")];
                lines.extend(table.rows.iter().map(|row| row.cells.join(" | ")));
                lines.join("\n")
            }
            ContentBlock::Image(_) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: usize) -> TableBlock {
        TableBlock {
            columns: vec![Column::new("A", 20.0), Column::new("B", 30.0)],
            rows: (0..rows)
                .map(|i| TableRow {
                    cells: vec![i.to_string(), "x".into()],
                    style_hints: vec![CellStyle::Plain; 2],
                })
                .collect(),
            header_row_height_mm: 6.0,
            data_row_height_mm: 6.0,
            header_font_size_pt: 9.0,
            data_font_size_pt: 8.0,
        }
    }

    #[test]
    fn table_height_is_header_plus_rows() {
        assert_eq!(table(10).height_mm(), 66.0);
        assert_eq!(table(0).height_mm(), 6.0);
        assert_eq!(table(10).width_mm(), 50.0);
    }

    #[test]
    fn rows_fitting_counts_whole_rows() {
        let table = table(10);
        assert_eq!(table.rows_fitting(5.0), 0);
        assert_eq!(table.rows_fitting(12.0), 1);
        assert_eq!(table.rows_fitting(17.9), 1);
        assert_eq!(table.rows_fitting(18.0), 2);
        assert_eq!(table.rows_fitting(1000.0), 10);
    }

    #[test]
    fn split_repeats_columns() {
        let mut head = table(5);
        let tail = head.split_off(2);
        assert_eq!(head.rows.len(), 2);
        assert_eq!(tail.rows.len(), 3);
        assert_eq!(tail.columns, head.columns);
        assert_eq!(tail.rows[0].cells[0], "2");
    }

    #[test]
    fn fitted_image_keeps_aspect_ratio() {
        let image = ImageBlock::fitted(1200, 600, Vec::new(), 144.0, 500.0);
        assert_eq!(image.width_mm, 144.0);
        assert_eq!(image.height_mm, 72.0);

        let tall = ImageBlock::fitted(300, 3000, Vec::new(), 144.0, 200.0);
        assert_eq!(tall.height_mm, 200.0);
        assert!((tall.width_mm - 20.0).abs() < 1e-9);
    }
}
