//! Ready-made [`VisualSource`] implementations backed by images that were
//! rendered elsewhere: an in-memory image and an image file on disk.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageOutputFormat, Rgb, RgbImage};
use log::debug;
use tokio::task;

use super::{DetachedVisual, Raster, StyleFixups, VisualKind, VisualSource};
use crate::error::CaptureError;
use crate::richtext::Color;

/// An image that has already been rendered, kept in memory.
pub struct StaticVisual {
    name: String,
    image: DynamicImage,
    visible: bool,
    kind: VisualKind,
    card: Option<Arc<dyn VisualSource>>,
    parent: Option<Arc<dyn VisualSource>>,
    open_clones: Arc<AtomicUsize>,
}

impl StaticVisual {
    /// Wraps `image` under `name`.
    pub fn new(name: impl Into<String>, image: DynamicImage) -> Self {
        Self {
            name: name.into(),
            image,
            visible: true,
            kind: VisualKind::Element,
            card: None,
            parent: None,
            open_clones: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Decodes `bytes` (PNG or JPEG) into a visual.
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Result<Self, CaptureError> {
        let name = name.into();
        let image = image::load_from_memory(bytes).map_err(|err| CaptureError::InvalidPayload {
            name: name.clone(),
            detail: err.to_string(),
        })?;
        Ok(Self::new(name, image))
    }

    /// Marks the visual as not displayed.
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Sets the role of the visual.
    pub fn with_kind(mut self, kind: VisualKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the enclosing card.
    pub fn with_card(mut self, card: Arc<dyn VisualSource>) -> Self {
        self.card = Some(card);
        self
    }

    /// Sets the enclosing container used as capture fallback.
    pub fn with_parent(mut self, parent: Arc<dyn VisualSource>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Number of detached clones not yet disposed.
    pub fn open_clones(&self) -> usize {
        self.open_clones.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisualSource for StaticVisual {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn measure(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn kind(&self) -> VisualKind {
        self.kind
    }

    fn card(&self) -> Option<Arc<dyn VisualSource>> {
        self.card.clone()
    }

    fn parent(&self) -> Option<Arc<dyn VisualSource>> {
        self.parent.clone()
    }

    async fn rendered(&self) -> bool {
        true
    }

    fn detach(&self, fixups: &StyleFixups) -> Result<Box<dyn DetachedVisual>, CaptureError> {
        self.open_clones.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ImageClone {
            image: Some(self.image.clone()),
            fixups: *fixups,
            open_clones: Some(Arc::clone(&self.open_clones)),
        }))
    }
}

/// An image file written by an external renderer. A missing file counts as
/// a visual that is not displayed.
pub struct ImageFileVisual {
    name: String,
    path: PathBuf,
    parent: Option<Arc<dyn VisualSource>>,
}

impl ImageFileVisual {
    /// Refers to the image at `path`; nothing is read until capture.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            parent: None,
        }
    }

    /// Sets the enclosing container used as capture fallback.
    pub fn with_parent(mut self, parent: Arc<dyn VisualSource>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Location of the image.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<DynamicImage, CaptureError> {
        let invalid = |detail: String| CaptureError::InvalidPayload {
            name: self.name.clone(),
            detail,
        };
        image::io::Reader::open(&self.path)
            .map_err(|_| CaptureError::NotVisible(self.name.clone()))?
            .with_guessed_format()
            .map_err(|err| invalid(err.to_string()))?
            .decode()
            .map_err(|err| invalid(err.to_string()))
    }
}

#[async_trait]
impl VisualSource for ImageFileVisual {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_visible(&self) -> bool {
        self.path.is_file()
    }

    fn measure(&self) -> (u32, u32) {
        image::image_dimensions(&self.path).unwrap_or((0, 0))
    }

    fn parent(&self) -> Option<Arc<dyn VisualSource>> {
        self.parent.clone()
    }

    async fn rendered(&self) -> bool {
        true
    }

    fn detach(&self, fixups: &StyleFixups) -> Result<Box<dyn DetachedVisual>, CaptureError> {
        Ok(Box::new(ImageClone {
            image: Some(self.load()?),
            fixups: *fixups,
            open_clones: None,
        }))
    }
}

struct ImageClone {
    image: Option<DynamicImage>,
    fixups: StyleFixups,
    open_clones: Option<Arc<AtomicUsize>>,
}

fn empty_raster(width: u32, height: u32) -> Raster {
    Raster {
        width,
        height,
        bytes: Vec::new(),
    }
}

#[async_trait]
impl DetachedVisual for ImageClone {
    async fn rasterize(&mut self, scale: f64, background: Color) -> Result<Raster, CaptureError> {
        let Some(image) = self.image.take() else {
            return Ok(empty_raster(0, 0));
        };
        // Nothing to resample; validation reports the empty source.
        let (source_width, source_height) = image.dimensions();
        if source_width == 0 || source_height == 0 {
            return Ok(empty_raster(source_width, source_height));
        }

        let (width, height) = self
            .fixups
            .explicit_size
            .unwrap_or((source_width, source_height));
        let target_width = (f64::from(width) * scale).round() as u32;
        let target_height = (f64::from(height) * scale).round() as u32;
        if target_width == 0 || target_height == 0 {
            return Ok(empty_raster(target_width, target_height));
        }

        let opacity = self.fixups.opacity.clamp(0.0, 1.0);
        task::spawn_blocking(move || {
            encode_flattened(&image, target_width, target_height, background, opacity)
        })
        .await
        .map_err(|err| CaptureError::InvalidPayload {
            name: "clone".to_string(),
            detail: format!("rasterizer task failed: {err}"),
        })?
    }

    fn dispose(&mut self) {
        self.image = None;
        if let Some(counter) = self.open_clones.take() {
            counter.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

fn encode_flattened(
    image: &DynamicImage,
    width: u32,
    height: u32,
    background: Color,
    opacity: f64,
) -> Result<Raster, CaptureError> {
    let flattened = flatten(image, width, height, background, opacity);
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(flattened)
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .map_err(|err| CaptureError::InvalidPayload {
            name: "clone".to_string(),
            detail: err.to_string(),
        })?;
    debug!(
        "rasterized clone at {}x{} px ({} bytes)",
        width,
        height,
        bytes.len()
    );
    Ok(Raster {
        width,
        height,
        bytes,
    })
}

/// Resizes `image` and composites it over an opaque `background`.
fn flatten(
    image: &DynamicImage,
    width: u32,
    height: u32,
    background: Color,
    opacity: f64,
) -> RgbImage {
    let resized = image::imageops::resize(&image.to_rgba8(), width, height, FilterType::Triangle);
    let Color(bg_r, bg_g, bg_b) = background;
    RgbImage::from_fn(width, height, |x, y| {
        let pixel = resized.get_pixel(x, y).0;
        let alpha = f64::from(pixel[3]) / 255.0 * opacity;
        let blend = |channel: u8, bg: u8| -> u8 {
            (f64::from(channel) * alpha + f64::from(bg) * (1.0 - alpha)).round() as u8
        };
        Rgb([
            blend(pixel[0], bg_r),
            blend(pixel[1], bg_g),
            blend(pixel[2], bg_b),
        ])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureResult, VisualCapturer};
    use crate::config::CaptureConfig;
    use image::{Rgba, RgbaImage};

    fn transparent(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0])))
    }

    #[tokio::test]
    async fn transparent_pixels_become_background() {
        let visual = StaticVisual::new("chart", transparent(10, 4));
        let capturer = VisualCapturer::new(CaptureConfig::default());
        let result = capturer.capture(&visual, "Chart").await;
        let raster = result.raster().expect("captured raster");
        assert_eq!((raster.width, raster.height), (15, 6));

        let decoded = image::load_from_memory(&raster.bytes)
            .expect("decode")
            .to_rgb8();
        assert_eq!(decoded.get_pixel(3, 3), &Rgb([255, 255, 255]));
        assert_eq!(visual.open_clones(), 0);
    }

    #[tokio::test]
    async fn hidden_static_visual_uses_parent() {
        let parent: Arc<dyn VisualSource> = Arc::new(StaticVisual::new("card", transparent(4, 4)));
        let visual = StaticVisual::new("chart", transparent(4, 4))
            .hidden()
            .with_parent(Arc::clone(&parent));
        let capturer = VisualCapturer::new(CaptureConfig::default());
        let result = capturer.capture(&visual, "Chart").await;
        assert!(matches!(result, CaptureResult::Degraded { .. }));
    }

    #[tokio::test]
    async fn missing_file_is_not_visible() {
        let visual = ImageFileVisual::new("trend", "/definitely/not/here.png");
        assert!(!visual.is_visible());
        let capturer = VisualCapturer::new(CaptureConfig::default());
        let result = capturer.capture(&visual, "Trend").await;
        assert_eq!(
            result,
            CaptureResult::Failed(CaptureError::NotVisible("trend".into()))
        );
    }

    #[tokio::test]
    async fn file_visual_is_captured() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("chart.png");
        transparent(8, 8).save(&path).expect("write png");

        let visual = ImageFileVisual::new("chart", &path);
        assert_eq!(visual.measure(), (8, 8));
        let capturer = VisualCapturer::new(CaptureConfig::default());
        let result = capturer.capture(&visual, "Chart").await;
        assert!(matches!(result, CaptureResult::Success(_)));
    }

    #[tokio::test]
    async fn empty_image_fails_with_zero_dimension() {
        let visual = StaticVisual::new("empty", transparent(0, 0));
        assert_eq!(visual.measure(), (0, 0));
        let capturer = VisualCapturer::new(CaptureConfig::default());
        let result = capturer.capture(&visual, "Empty").await;
        assert_eq!(
            result,
            CaptureResult::Failed(CaptureError::ZeroDimension {
                name: "empty".into(),
                width: 0,
                height: 0,
            })
        );
        assert_eq!(visual.open_clones(), 0);
    }

    #[tokio::test]
    async fn slow_rasterization_times_out() {
        let visual = StaticVisual::new(
            "large",
            DynamicImage::ImageRgb8(RgbImage::from_pixel(1200, 1200, Rgb([40, 90, 160]))),
        );
        let capturer = VisualCapturer::new(CaptureConfig {
            timeout_ms: 1,
            fallback_timeout_ms: 1,
            ..CaptureConfig::default()
        });
        let result = capturer.capture(&visual, "Large").await;
        assert_eq!(
            result,
            CaptureResult::Failed(CaptureError::CaptureTimeout {
                name: "large".into(),
                millis: 1,
            })
        );
        assert_eq!(visual.open_clones(), 0);
    }

    #[test]
    fn from_bytes_rejects_garbage() {
        let result = StaticVisual::from_bytes("chart", b"not an image");
        assert!(matches!(result, Err(CaptureError::InvalidPayload { .. })));
    }
}
