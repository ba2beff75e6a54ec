//! PDF serialization of a [`ComposedDocument`] with `printpdf`.
//!
//! Layout positions are measured from the top-left corner; PDF user space
//! starts at the bottom-left, so every y coordinate is flipped here and only
//! here.

use std::io::BufWriter;

use log::debug;
use printpdf::{
    Color as PdfColor, Image, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point,
    Rgb,
};

use crate::assembler::ComposedDocument;
use crate::block::{
    ContentBlock, HorizontalAlignment, ImageBlock, ParagraphBlock, TableBlock, TitleBlock,
    TitleLevel,
};
use crate::error::ReportError;
use crate::fonts::{text_width_mm, FontSet};
use crate::layout::{Footer, PlacedBlock};
use crate::richtext::{Color, FontStyle, TextLine};

const IMAGE_DPI: f64 = 300.0;
const MM_PER_INCH: f64 = 25.4;
const CELL_PADDING_MM: f64 = 1.0;
const HEADER_RULE_THICKNESS_PT: f64 = 0.5;
/// Baseline position inside a line box, as a share of the line height.
const BASELINE_RATIO: f64 = 0.7;

/// Serializes `document` into PDF bytes.
pub fn render_pdf(document: &ComposedDocument) -> Result<Vec<u8>, ReportError> {
    let geometry = *document.geometry();
    let (pdf, first_page, first_layer) = PdfDocument::new(
        document.title(),
        Mm(geometry.width_mm),
        Mm(geometry.height_mm),
        "Layer 1",
    );
    let fonts = FontSet::install(&pdf)?;

    for (index, page) in document.pages().iter().enumerate() {
        let layer = if index == 0 {
            pdf.get_page(first_page).get_layer(first_layer)
        } else {
            let (page_index, layer_index) = pdf.add_page(
                Mm(geometry.width_mm),
                Mm(geometry.height_mm),
                format!("Page {}", index + 1),
            );
            pdf.get_page(page_index).get_layer(layer_index)
        };

        let painter = Painter {
            layer,
            fonts: &fonts,
            page_width_mm: geometry.width_mm,
            page_height_mm: geometry.height_mm,
        };
        for placed in page.blocks() {
            painter.draw(placed)?;
        }
        if let Some(footer) = page.footer() {
            painter.draw_footer(footer, document);
        }
        debug!("rendered page {} ({} block(s))", index + 1, page.blocks().len());
    }

    let mut writer = BufWriter::new(Vec::new());
    pdf.save(&mut writer)
        .map_err(|err| ReportError::Render(err.to_string()))?;
    writer
        .into_inner()
        .map_err(|err| ReportError::Render(err.to_string()))
}

fn pdf_color(color: Color) -> PdfColor {
    let (r, g, b) = color.to_unit();
    PdfColor::Rgb(Rgb::new(r, g, b, None))
}

struct Painter<'a> {
    layer: PdfLayerReference,
    fonts: &'a FontSet,
    page_width_mm: f64,
    page_height_mm: f64,
}

impl Painter<'_> {
    fn flip(&self, y_mm: f64) -> Mm {
        Mm(self.page_height_mm - y_mm)
    }

    fn draw(&self, placed: &PlacedBlock) -> Result<(), ReportError> {
        match &placed.block {
            ContentBlock::Title(title) => self.draw_title(placed.x_mm, placed.y_mm, title),
            ContentBlock::Paragraph(paragraph) => {
                self.draw_paragraph(placed.x_mm, placed.y_mm, paragraph)
            }
            ContentBlock::Table(table) => self.draw_table(placed.x_mm, placed.y_mm, table),
            ContentBlock::Image(image) => self.draw_image(placed.x_mm, placed.y_mm, image)?,
        }
        Ok(())
    }

    fn text(
        &self,
        text: &str,
        size_pt: f64,
        x_mm: f64,
        baseline_mm: f64,
        font: &IndirectFontRef,
        color: Color,
    ) {
        self.layer.set_fill_color(pdf_color(color));
        self.layer
            .use_text(text, size_pt, Mm(x_mm), self.flip(baseline_mm), font);
    }

    fn centered_x(&self, width_mm: f64) -> f64 {
        (self.page_width_mm - width_mm) / 2.0
    }

    fn draw_title(&self, x_mm: f64, y_mm: f64, title: &TitleBlock) {
        let size = title.level.font_size_pt();
        let x = match title.level {
            TitleLevel::Document => self.centered_x(text_width_mm(&title.text, size)),
            TitleLevel::Section | TitleLevel::Visual => x_mm,
        };
        let baseline = y_mm + title.height_mm * BASELINE_RATIO;
        self.text(
            &title.text,
            size,
            x,
            baseline,
            self.fonts.get(FontStyle::Bold),
            Color::BLACK,
        );
    }

    fn draw_line(&self, x_mm: f64, baseline_mm: f64, line: &TextLine) {
        let size = line.font_size_pt();
        let mut x = x_mm;
        for span in line.spans() {
            self.text(
                span.text(),
                size,
                x,
                baseline_mm,
                self.fonts.get(span.font_style()),
                span.color().unwrap_or(Color::BLACK),
            );
            x += text_width_mm(span.text(), size);
        }
    }

    fn draw_paragraph(&self, x_mm: f64, y_mm: f64, paragraph: &ParagraphBlock) {
        for (index, line) in paragraph.lines.iter().enumerate() {
            let top = y_mm + index as f64 * paragraph.line_height_mm;
            let x = match paragraph.alignment {
                HorizontalAlignment::Left => x_mm,
                HorizontalAlignment::Center => {
                    self.centered_x(text_width_mm(&line.plain_text(), line.font_size_pt()))
                }
            };
            self.draw_line(x, top + paragraph.line_height_mm * BASELINE_RATIO, line);
        }
    }

    fn draw_table(&self, x_mm: f64, y_mm: f64, table: &TableBlock) {
        let bold = self.fonts.get(FontStyle::Bold);
        let regular = self.fonts.get(FontStyle::Regular);

        let header_baseline = y_mm + table.header_row_height_mm * BASELINE_RATIO;
        let mut x = x_mm;
        for column in &table.columns {
            self.text(
                &column.label,
                table.header_font_size_pt,
                x + CELL_PADDING_MM,
                header_baseline,
                bold,
                Color::BLACK,
            );
            x += column.width_mm;
        }

        let rule_y = self.flip(y_mm + table.header_row_height_mm);
        self.layer.set_outline_color(pdf_color(Color::GREY));
        self.layer.set_outline_thickness(HEADER_RULE_THICKNESS_PT);
        self.layer.add_shape(Line {
            points: vec![
                (Point::new(Mm(x_mm), rule_y), false),
                (Point::new(Mm(x_mm + table.width_mm()), rule_y), false),
            ],
            is_closed: false,
            has_fill: false,
            has_stroke: true,
            is_clipping_path: false,
        });

        for (row_index, row) in table.rows.iter().enumerate() {
            let top =
                y_mm + table.header_row_height_mm + row_index as f64 * table.data_row_height_mm;
            let baseline = top + table.data_row_height_mm * BASELINE_RATIO;
            let mut x = x_mm;
            let cells = row.cells.iter().zip(&row.style_hints).zip(&table.columns);
            for ((cell, style), column) in cells {
                self.text(
                    cell,
                    table.data_font_size_pt,
                    x + CELL_PADDING_MM,
                    baseline,
                    regular,
                    style.color(),
                );
                x += column.width_mm;
            }
        }
    }

    fn draw_image(&self, x_mm: f64, y_mm: f64, block: &ImageBlock) -> Result<(), ReportError> {
        let decoded = image::load_from_memory(&block.raster_bytes)
            .map_err(|err| ReportError::Render(format!("captured image is unreadable: {}", err)))?;
        let rgb = image::DynamicImage::ImageRgb8(decoded.to_rgb8());
        let natural_width_mm = f64::from(block.pixel_width) / IMAGE_DPI * MM_PER_INCH;
        let natural_height_mm = f64::from(block.pixel_height) / IMAGE_DPI * MM_PER_INCH;
        if natural_width_mm <= 0.0 || natural_height_mm <= 0.0 {
            return Err(ReportError::Render("captured image has no size".to_string()));
        }

        Image::from_dynamic_image(&rgb).add_to_layer(
            self.layer.clone(),
            Some(Mm(x_mm)),
            Some(self.flip(y_mm + block.height_mm)),
            None,
            Some(block.width_mm / natural_width_mm),
            Some(block.height_mm / natural_height_mm),
            Some(IMAGE_DPI),
        );
        Ok(())
    }

    fn draw_footer(&self, footer: &Footer, document: &ComposedDocument) {
        let config = document.footer_config();
        let font = self.fonts.get(FontStyle::Regular);
        let size = config.font_size_pt;
        for (label, offset) in [
            (&footer.page_label, config.page_line_offset_mm),
            (&footer.timestamp_label, config.timestamp_line_offset_mm),
        ] {
            let x = self.centered_x(text_width_mm(label, size));
            self.text(label, size, x, self.page_height_mm - offset, font, config.color);
        }
    }
}
