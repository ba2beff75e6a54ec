//! High-level entry point: compose a report context and render it to PDF.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::assembler::{ComposedDocument, DocumentAssembler};
use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::model::{report_filename, ReportContext};
use crate::render::render_pdf;

/// A rendered report and the name it should be saved under.
#[derive(Clone, Debug)]
pub struct RenderedReport {
    /// PDF bytes.
    pub bytes: Vec<u8>,
    /// `Variance_Report_With_Charts_<year>_<MM>.pdf`.
    pub filename: String,
    /// Number of pages in the document.
    pub page_count: usize,
}

impl RenderedReport {
    /// Writes the PDF into `dir` under [`RenderedReport::filename`], creating
    /// the directory when needed, and returns the full path.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf, ReportError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(&self.filename);
        fs::write(&path, &self.bytes)?;
        info!("wrote {} ({} bytes)", path.display(), self.bytes.len());
        Ok(path)
    }
}

/// Builder for report exports pre-configured with the crate defaults.
#[derive(Clone, Debug, Default)]
pub struct ReportBuilder {
    config: ReportConfig,
    timestamp: Option<String>,
    #[cfg(feature = "bookmarks")]
    bookmarks: bool,
}

impl ReportBuilder {
    /// Creates a builder with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: ReportConfig) -> Self {
        self.config = config;
        self
    }

    /// Prints `timestamp` in the footers instead of the current time.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Adds a PDF outline with one entry per section.
    #[cfg(feature = "bookmarks")]
    pub fn with_bookmarks(mut self, enabled: bool) -> Self {
        self.bookmarks = enabled;
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    fn assembler(&self) -> Result<DocumentAssembler, ReportError> {
        let assembler = DocumentAssembler::new(self.config.clone())?;
        Ok(match &self.timestamp {
            Some(timestamp) => assembler.with_timestamp(timestamp.clone()),
            None => assembler,
        })
    }

    /// Lays out `context` without serializing it.
    pub async fn compose(&self, context: &ReportContext) -> Result<ComposedDocument, ReportError> {
        self.assembler()?.compose(context).await
    }

    /// Composes and renders `context` into PDF bytes.
    pub async fn render(&self, context: &ReportContext) -> Result<RenderedReport, ReportError> {
        let document = self.compose(context).await?;
        #[allow(unused_mut)]
        let mut bytes = render_pdf(&document)?;

        #[cfg(feature = "bookmarks")]
        if self.bookmarks {
            bytes = crate::bookmarks::apply_section_bookmarks(&bytes, document.sections())?;
        }

        Ok(RenderedReport {
            bytes,
            filename: report_filename(context.period()),
            page_count: document.page_count(),
        })
    }
}
