//! Tunable settings for page geometry, spacing, footers and visual capture.
//!
//! All lengths are millimetres; font sizes are points. Every struct implements
//! [`Default`] with the values the report has always been produced with, and
//! can be deserialized partially from JSON (missing keys keep their defaults).

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ReportError;
use crate::richtext::Color;

/// Physical page size and margins.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PageGeometry {
    /// Page width.
    pub width_mm: f64,
    /// Page height.
    pub height_mm: f64,
    /// Distance from the top edge to the first block.
    pub margin_top_mm: f64,
    /// Distance from the bottom edge that content must not cross.
    pub margin_bottom_mm: f64,
    /// Left (and right) content inset.
    pub margin_x_mm: f64,
}

impl Default for PageGeometry {
    fn default() -> Self {
        // Portrait A4.
        Self {
            width_mm: 210.0,
            height_mm: 297.0,
            margin_top_mm: 10.0,
            margin_bottom_mm: 20.0,
            margin_x_mm: 10.0,
        }
    }
}

impl PageGeometry {
    /// Lowest y position (from the top edge) content may reach.
    pub fn content_limit(&self) -> f64 {
        self.height_mm - self.margin_bottom_mm
    }

    /// Height available for content on an empty page.
    pub fn printable_height(&self) -> f64 {
        self.content_limit() - self.margin_top_mm
    }

    /// Width available between the horizontal margins.
    pub fn printable_width(&self) -> f64 {
        self.width_mm - 2.0 * self.margin_x_mm
    }
}

/// Vertical metrics of the different block kinds.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Spacing {
    /// Gap inserted after every placed block.
    pub block_spacing_mm: f64,
    /// Height of the document title line.
    pub title_height_mm: f64,
    /// Height of a section heading line.
    pub heading_height_mm: f64,
    /// Height of the title line above a captured visual.
    pub visual_title_height_mm: f64,
    /// Height of one line of body text.
    pub text_line_height_mm: f64,
    /// Height of a table header row.
    pub header_row_height_mm: f64,
    /// Height of a table data row.
    pub data_row_height_mm: f64,
}

impl Default for Spacing {
    fn default() -> Self {
        Self {
            block_spacing_mm: 4.0,
            title_height_mm: 8.0,
            heading_height_mm: 8.0,
            visual_title_height_mm: 5.0,
            text_line_height_mm: 6.0,
            header_row_height_mm: 6.0,
            data_row_height_mm: 6.0,
        }
    }
}

/// Placement and look of the per-page footer.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct FooterConfig {
    /// Offset of the page-number line above the bottom page edge.
    pub page_line_offset_mm: f64,
    /// Offset of the timestamp line above the bottom page edge.
    pub timestamp_line_offset_mm: f64,
    /// Footer font size.
    pub font_size_pt: f64,
    /// Footer text colour.
    pub color: Color,
}

impl Default for FooterConfig {
    fn default() -> Self {
        Self {
            page_line_offset_mm: 10.0,
            timestamp_line_offset_mm: 5.0,
            font_size_pt: 8.0,
            color: Color::GREY,
        }
    }
}

/// Settings for the visual capture adapter.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Fixed wait before rasterizing, used when the source cannot signal that
    /// it finished rendering.
    pub settle_delay_ms: u64,
    /// Oversampling factor applied during rasterization.
    pub scale: f64,
    /// Fill used for transparent regions.
    pub background: Color,
    /// Time budget for the primary rasterization attempt.
    pub timeout_ms: u64,
    /// Time budget for the fallback attempt.
    pub fallback_timeout_ms: u64,
    /// Size forced onto a detached clone whose own size measures as zero.
    pub fallback_width_px: u32,
    /// See [`CaptureConfig::fallback_width_px`].
    pub fallback_height_px: u32,
    /// Largest share of the image column a captured visual may occupy.
    pub max_width_ratio: f64,
    /// Horizontal inset of visual titles and images.
    pub image_margin_mm: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 100,
            scale: 1.5,
            background: Color::WHITE,
            timeout_ms: 20_000,
            fallback_timeout_ms: 15_000,
            fallback_width_px: 800,
            fallback_height_px: 400,
            max_width_ratio: 0.8,
            image_margin_mm: 15.0,
        }
    }
}

impl CaptureConfig {
    /// Settle delay as a [`Duration`].
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Primary attempt budget as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Fallback attempt budget as a [`Duration`].
    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_millis(self.fallback_timeout_ms)
    }

    /// Disables the settle delay and returns the updated config.
    pub fn without_settle_delay(mut self) -> Self {
        self.settle_delay_ms = 0;
        self
    }
}

/// Character budgets applied to text cells so fixed-width columns never overflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TruncationLimits {
    /// Employee identifiers.
    pub employee_id: usize,
    /// Employee names.
    pub employee_name: usize,
    /// Department column of the employee table.
    pub employee_department: usize,
    /// Department column of the department table.
    pub department_name: usize,
    /// Month column of the trend table.
    pub month_label: usize,
}

impl Default for TruncationLimits {
    fn default() -> Self {
        Self {
            employee_id: 8,
            employee_name: 20,
            employee_department: 12,
            department_name: 20,
            month_label: 16,
        }
    }
}

/// Top-level configuration of a report run.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Title printed at the top of the first page.
    pub title: String,
    /// Page size and margins.
    pub page: PageGeometry,
    /// Block metrics.
    pub spacing: Spacing,
    /// Footer placement.
    pub footer: FooterConfig,
    /// Visual capture settings.
    pub capture: CaptureConfig,
    /// Text cell budgets.
    pub truncation: TruncationLimits,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: "Payroll Variance Report".to_string(),
            page: PageGeometry::default(),
            spacing: Spacing::default(),
            footer: FooterConfig::default(),
            capture: CaptureConfig::default(),
            truncation: TruncationLimits::default(),
        }
    }
}

impl ReportConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a configuration from a JSON file and validates it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the document title and returns the updated config.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the page geometry and returns the updated config.
    pub fn with_page(mut self, page: PageGeometry) -> Self {
        self.page = page;
        self
    }

    /// Sets the block metrics and returns the updated config.
    pub fn with_spacing(mut self, spacing: Spacing) -> Self {
        self.spacing = spacing;
        self
    }

    /// Sets the capture settings and returns the updated config.
    pub fn with_capture(mut self, capture: CaptureConfig) -> Self {
        self.capture = capture;
        self
    }

    /// Sets the footer placement and returns the updated config.
    pub fn with_footer(mut self, footer: FooterConfig) -> Self {
        self.footer = footer;
        self
    }

    /// Checks that the values describe a usable page and capture setup.
    pub fn validate(&self) -> Result<(), ReportError> {
        let page = &self.page;
        let spacing = &self.spacing;
        let measures = [
            ("page.width_mm", page.width_mm),
            ("page.height_mm", page.height_mm),
            ("page.margin_top_mm", page.margin_top_mm),
            ("page.margin_bottom_mm", page.margin_bottom_mm),
            ("page.margin_x_mm", page.margin_x_mm),
            ("spacing.block_spacing_mm", spacing.block_spacing_mm),
            ("spacing.title_height_mm", spacing.title_height_mm),
            ("spacing.heading_height_mm", spacing.heading_height_mm),
            ("spacing.visual_title_height_mm", spacing.visual_title_height_mm),
            ("spacing.text_line_height_mm", spacing.text_line_height_mm),
            ("spacing.header_row_height_mm", spacing.header_row_height_mm),
            ("spacing.data_row_height_mm", spacing.data_row_height_mm),
            ("footer.page_line_offset_mm", self.footer.page_line_offset_mm),
            ("footer.timestamp_line_offset_mm", self.footer.timestamp_line_offset_mm),
            ("footer.font_size_pt", self.footer.font_size_pt),
            ("capture.scale", self.capture.scale),
            ("capture.max_width_ratio", self.capture.max_width_ratio),
        ];
        if let Some((field, value)) = measures.iter().find(|(_, value)| !value.is_finite()) {
            return Err(ReportError::Config(format!(
                "{field} must be a finite number, got {value}"
            )));
        }

        if page.width_mm <= 0.0 || page.height_mm <= 0.0 {
            return Err(ReportError::Config(format!(
                "page size must be positive, got {}x{} mm",
                page.width_mm, page.height_mm
            )));
        }
        if page.printable_height() <= 0.0 || page.printable_width() <= 0.0 {
            return Err(ReportError::Config(
                "margins leave no printable area".to_string(),
            ));
        }
        if self.capture.scale <= 1.0 {
            return Err(ReportError::Config(format!(
                "capture scale must oversample (> 1.0), got {}",
                self.capture.scale
            )));
        }
        if self.capture.max_width_ratio <= 0.0 || self.capture.max_width_ratio > 1.0 {
            return Err(ReportError::Config(format!(
                "max_width_ratio must be in (0, 1], got {}",
                self.capture.max_width_ratio
            )));
        }
        let heights = [
            spacing.title_height_mm,
            spacing.heading_height_mm,
            spacing.visual_title_height_mm,
            spacing.text_line_height_mm,
            spacing.header_row_height_mm,
            spacing.data_row_height_mm,
        ];
        if heights.iter().any(|height| *height <= 0.0) || spacing.block_spacing_mm < 0.0 {
            return Err(ReportError::Config(
                "line heights must be positive and spacing non-negative".to_string(),
            ));
        }
        Ok(())
    }
}
