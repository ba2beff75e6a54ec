//! Paginated payroll variance reports.
//!
//! A [`ReportContext`] holds the pre-computed figures of one reporting period
//! plus the rendered visuals to embed. [`ReportBuilder`] lays the context out
//! on fixed-size pages (title, captured visuals, executive summary, department,
//! employee and trend tables, footers) and serializes the result to PDF.
//!
//! ```no_run
//! use std::sync::Arc;
//! use variance_report::{ImageFileVisual, Period, ReportBuilder, ReportContext};
//!
//! # async fn run() -> Result<(), variance_report::ReportError> {
//! let context = ReportContext::builder(Period::new(2024, 3, 6)?)
//!     .visual("Monthly Trend", Arc::new(ImageFileVisual::new("trend", "trend.png")))
//!     .build()?;
//! let report = ReportBuilder::new().render(&context).await?;
//! report.write_to_dir("reports")?;
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod block;
pub mod builder;
pub mod capture;
pub mod config;
pub mod error;
pub mod fonts;
pub mod layout;
pub mod model;
pub mod render;
pub mod richtext;
pub mod table;

#[cfg(feature = "bookmarks")]
pub mod bookmarks;

pub use assembler::{ComposedDocument, DocumentAssembler, SectionMark};
pub use builder::{RenderedReport, ReportBuilder};
pub use capture::{
    CaptureResult, ImageFileVisual, StaticVisual, VisualCapturer, VisualKind, VisualSource,
};
pub use config::ReportConfig;
pub use error::{CaptureError, ReportError};
pub use model::{
    report_filename, DepartmentRow, EmployeeRow, Period, ReportContext, ReportData, Summary,
    TrendRow,
};
