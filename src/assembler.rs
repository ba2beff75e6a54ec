//! Document assembly: walks the report sections in their fixed order, turns
//! each into content blocks and lays them out page by page.
//!
//! Sections whose data is empty are skipped entirely. Captured visuals come
//! right after the document title, in the order the caller listed them; a
//! visual that cannot be captured leaves an italic placeholder line in its
//! slot. Footers are stamped in a final pass once the page count is known.

use log::{debug, info};

use crate::block::{ContentBlock, ImageBlock, TitleLevel};
use crate::capture::{CaptureResult, VisualCapturer};
use crate::config::{FooterConfig, PageGeometry, ReportConfig};
use crate::error::ReportError;
use crate::layout::{Footer, LayoutCursor, Page};
use crate::model::{ReportContext, Summary, VisualRef};
use crate::richtext::{Color, Span, TextLine};
use crate::table::{format_money_grouped, format_percent, TableRenderer, VarianceClass};

const PERIOD_FONT_SIZE_PT: f64 = 12.0;
const SUMMARY_FONT_SIZE_PT: f64 = 11.0;
const PLACEHOLDER_FONT_SIZE_PT: f64 = 10.0;

/// Format of the generation timestamp printed in every footer.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Where a section starts; used for the document outline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionMark {
    /// Section heading or visual title.
    pub title: String,
    /// Zero-based page the section starts on.
    pub page_index: usize,
}

/// Per-visual capture tally of one composition run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Visuals captured from their preferred target.
    pub captured: usize,
    /// Visuals captured from their fallback container.
    pub degraded: usize,
    /// Visuals replaced by a placeholder line.
    pub failed: usize,
}

/// The laid-out report, ready to be rendered.
#[derive(Clone, Debug)]
pub struct ComposedDocument {
    title: String,
    geometry: PageGeometry,
    footer: FooterConfig,
    pages: Vec<Page>,
    sections: Vec<SectionMark>,
    generated_at: String,
    capture_stats: CaptureStats,
}

impl ComposedDocument {
    /// Document title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Page size and margins the pages were laid out for.
    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    /// Footer placement.
    pub fn footer_config(&self) -> &FooterConfig {
        &self.footer
    }

    /// Pages in order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Sections in document order.
    pub fn sections(&self) -> &[SectionMark] {
        &self.sections
    }

    /// Timestamp printed in the footers.
    pub fn generated_at(&self) -> &str {
        &self.generated_at
    }

    /// Capture outcome counts.
    pub fn capture_stats(&self) -> CaptureStats {
        self.capture_stats
    }

    /// All text of the document including footers, page by page.
    pub fn text(&self) -> String {
        self.pages
            .iter()
            .map(|page| {
                let mut text = page.text();
                if let Some(footer) = page.footer() {
                    text.push('\n');
                    text.push_str(&footer.page_label);
                    text.push('\n');
                    text.push_str(&footer.timestamp_label);
                }
                text
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Lays out a [`ReportContext`] into pages.
pub struct DocumentAssembler {
    config: ReportConfig,
    capturer: VisualCapturer,
    timestamp: Option<String>,
}

impl DocumentAssembler {
    /// Creates an assembler after validating `config`.
    pub fn new(config: ReportConfig) -> Result<Self, ReportError> {
        config.validate()?;
        let capturer = VisualCapturer::new(config.capture);
        Ok(Self {
            config,
            capturer,
            timestamp: None,
        })
    }

    /// Uses a fixed footer timestamp instead of the current local time.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Composes the report. Visual capture failures degrade into placeholder
    /// lines; only malformed table content is an error.
    pub async fn compose(&self, context: &ReportContext) -> Result<ComposedDocument, ReportError> {
        let spacing = self.config.spacing;
        let tables = TableRenderer::new(&spacing, self.config.truncation);
        let mut cursor = LayoutCursor::new(self.config.page, spacing.block_spacing_mm);
        let mut sections = Vec::new();

        let page = cursor.place_block(ContentBlock::title(
            self.config.title.as_str(),
            TitleLevel::Document,
            spacing.title_height_mm,
        ));
        sections.push(SectionMark {
            title: self.config.title.clone(),
            page_index: page,
        });
        cursor.place_block(ContentBlock::centered(
            period_lines(context),
            spacing.text_line_height_mm,
        ));

        let mut capture_stats = CaptureStats::default();
        for visual in context.visuals() {
            let page = self
                .place_visual(&mut cursor, visual, &mut capture_stats)
                .await;
            sections.push(SectionMark {
                title: visual.title().to_string(),
                page_index: page,
            });
        }

        if let Some(summary) = context.summary() {
            let lines = summary_lines(summary, context);
            let page = self.place_heading(
                &mut cursor,
                "Executive Summary",
                spacing.text_line_height_mm,
            );
            cursor.place_block(ContentBlock::paragraph(lines, spacing.text_line_height_mm));
            sections.push(SectionMark {
                title: "Executive Summary".to_string(),
                page_index: page,
            });
        }

        if !context.department_rows().is_empty() {
            let table = tables.department_table(context.department_rows())?;
            let page =
                self.place_heading(&mut cursor, "Department Breakdown", table.min_height_mm());
            cursor.place_table(table);
            sections.push(SectionMark {
                title: "Department Breakdown".to_string(),
                page_index: page,
            });
        }

        let employees: Vec<_> = context.employee_rows_without_totals().collect();
        if !employees.is_empty() {
            let table = tables.employee_table(employees)?;
            let page = self.place_heading(
                &mut cursor,
                "Employee Variance Analysis",
                table.min_height_mm(),
            );
            cursor.place_table(table);
            sections.push(SectionMark {
                title: "Employee Variance Analysis".to_string(),
                page_index: page,
            });
        }

        let period = context.period();
        if period.is_historical() && !context.trend_rows().is_empty() {
            let heading = format!(
                "Historical Variance Trends ({} Months)",
                period.window_months()
            );
            let table = tables.trend_table(context.trend_rows())?;
            let page = self.place_heading(&mut cursor, &heading, table.min_height_mm());
            cursor.place_table(table);
            sections.push(SectionMark {
                title: heading,
                page_index: page,
            });
        }

        let mut pages = cursor.finish();
        let generated_at = self.timestamp.clone().unwrap_or_else(|| {
            chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
        });
        stamp_footers(&mut pages, &generated_at);

        info!(
            "composed report for {} on {} page(s); visuals: {} captured, {} degraded, {} failed",
            period,
            pages.len(),
            capture_stats.captured,
            capture_stats.degraded,
            capture_stats.failed
        );

        Ok(ComposedDocument {
            title: self.config.title.clone(),
            geometry: self.config.page,
            footer: self.config.footer,
            pages,
            sections,
            generated_at,
            capture_stats,
        })
    }

    fn place_heading(&self, cursor: &mut LayoutCursor, text: &str, following_mm: f64) -> usize {
        cursor.place_keep_with_next(
            ContentBlock::title(text, TitleLevel::Section, self.config.spacing.heading_height_mm),
            following_mm,
        )
    }

    async fn place_visual(
        &self,
        cursor: &mut LayoutCursor,
        visual: &VisualRef,
        stats: &mut CaptureStats,
    ) -> usize {
        let geometry = self.config.page;
        let capture = self.config.capture;
        let title_height = self.config.spacing.visual_title_height_mm;

        let result = self.capturer.capture(visual.source(), visual.title()).await;
        let raster = match result {
            CaptureResult::Success(raster) => {
                stats.captured += 1;
                raster
            }
            CaptureResult::Degraded { raster, .. } => {
                stats.degraded += 1;
                raster
            }
            CaptureResult::Failed(reason) => {
                stats.failed += 1;
                let line = TextLine::single(
                    Span::new(format!(
                        "[Chart \"{}\" could not be captured: {}]",
                        visual.title(),
                        reason
                    ))
                    .italic()
                    .colored(Color::GREY),
                    PLACEHOLDER_FONT_SIZE_PT,
                );
                return cursor.place_block_at(
                    capture.image_margin_mm,
                    ContentBlock::paragraph(vec![line], self.config.spacing.text_line_height_mm),
                );
            }
        };

        let max_width =
            (geometry.width_mm - 2.0 * capture.image_margin_mm) * capture.max_width_ratio;
        let max_height = geometry.printable_height() - title_height;
        let image = ImageBlock::fitted(
            raster.width,
            raster.height,
            raster.bytes,
            max_width,
            max_height,
        );
        let image_x = (geometry.width_mm - image.width_mm) / 2.0;
        debug!(
            "visual \"{}\" laid out at {:.1}x{:.1}mm",
            visual.title(),
            image.width_mm,
            image.height_mm
        );

        cursor.place_together(vec![
            (
                capture.image_margin_mm,
                ContentBlock::title(visual.title(), TitleLevel::Visual, title_height),
            ),
            (image_x, ContentBlock::Image(image)),
        ])
    }
}

fn period_lines(context: &ReportContext) -> Vec<TextLine> {
    let period = context.period();
    let mut lines = vec![TextLine::single(
        format!("Report Period: {}", period),
        PERIOD_FONT_SIZE_PT,
    )];
    if period.is_historical() && context.trend_rows().len() > 1 {
        lines.push(TextLine::single(
            format!("Historical Period: Last {} Months", period.window_months()),
            PERIOD_FONT_SIZE_PT,
        ));
    }
    lines
}

fn signed_value_line(label: String, amount: f64, percent: f64) -> TextLine {
    let color = VarianceClass::of(amount).color();
    TextLine::new(
        vec![
            Span::new(label),
            Span::new(format!(
                "{} ({})",
                format_money_grouped(amount),
                format_percent(percent)
            ))
            .colored(color),
        ],
        SUMMARY_FONT_SIZE_PT,
    )
}

fn summary_lines(summary: &Summary, context: &ReportContext) -> Vec<TextLine> {
    let mut lines = vec![
        TextLine::single(
            format!("Total Employees: {}", summary.employee_count),
            SUMMARY_FONT_SIZE_PT,
        ),
        TextLine::single(
            format!("Total Budget: {}", format_money_grouped(summary.total_budget)),
            SUMMARY_FONT_SIZE_PT,
        ),
        TextLine::single(
            format!("Total Actual: {}", format_money_grouped(summary.total_actual)),
            SUMMARY_FONT_SIZE_PT,
        ),
        signed_value_line(
            "Total Variance: ".to_string(),
            summary.total_variance,
            summary.total_variance_percent,
        ),
    ];

    let period = context.period();
    if period.is_historical() {
        if let Some(average) = summary.average {
            lines.push(signed_value_line(
                format!("Average Variance ({} months): ", period.window_months()),
                average.variance,
                average.variance_percent,
            ));
        }
    }
    lines
}

fn stamp_footers(pages: &mut [Page], generated_at: &str) {
    let total = pages.len();
    for (index, page) in pages.iter_mut().enumerate() {
        page.set_footer(Footer {
            page_label: format!("Page {} of {}", index + 1, total),
            timestamp_label: format!("Generated: {}", generated_at),
        });
    }
}
