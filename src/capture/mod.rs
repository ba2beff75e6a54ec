//! Visual capture: turns an already-rendered visual into a validated raster.
//!
//! Rendering backends plug in through [`VisualSource`]. The capturer never
//! touches a live visual beyond querying it: style fixups are applied to a
//! detached clone obtained with [`VisualSource::detach`], and that clone is
//! disposed on every exit path by a drop guard.
//!
//! A capture attempt runs these steps:
//!
//! 1. the visual must be visible, otherwise the attempt fails with
//!    [`CaptureError::NotVisible`];
//! 2. wait for the source's rendering-complete signal, or sleep the configured
//!    settle delay when the source cannot provide one;
//! 3. a bare chart region is replaced by its enclosing card when it has one;
//! 4. the clone is rasterized at the configured scale onto the background
//!    colour, bounded by a timeout;
//! 5. the raster is validated by decoding it.
//!
//! When the attempt fails the capturer retries exactly once: against the
//! visual's card if that was not already the target, otherwise against the
//! parent container of the attempted target.

pub mod sources;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::GenericImageView;
use log::{debug, info, warn};
use tokio::sync::Mutex;

use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::richtext::Color;

pub use sources::{ImageFileVisual, StaticVisual};

/// Role of a visual inside its surrounding layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VisualKind {
    /// The bare drawing area of a chart, without caption or legend.
    ChartRegion,
    /// A card container wrapping a chart together with its caption.
    Card,
    /// Any other element.
    #[default]
    Element,
}

/// Style overrides applied to a detached clone before rasterizing it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StyleFixups {
    /// Render the clone even if the original is styled hidden.
    pub force_visible: bool,
    /// Opacity forced onto the clone.
    pub opacity: f64,
    /// Explicit pixel size, used when the original reports no usable size.
    pub explicit_size: Option<(u32, u32)>,
}

impl StyleFixups {
    /// Fixups for a visual measured at `measured`; an unusable measurement
    /// is replaced by the configured fallback size.
    pub fn for_measurement(measured: (u32, u32), config: &CaptureConfig) -> Self {
        let (width, height) = measured;
        let explicit_size = if width == 0 || height == 0 {
            Some((
                if width == 0 { config.fallback_width_px } else { width },
                if height == 0 { config.fallback_height_px } else { height },
            ))
        } else {
            None
        };
        Self {
            force_visible: true,
            opacity: 1.0,
            explicit_size,
        }
    }
}

/// An encoded raster produced by a capture.
#[derive(Clone, PartialEq)]
pub struct Raster {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// PNG or JPEG payload.
    pub bytes: Vec<u8>,
}

impl fmt::Debug for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Raster")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Outcome of capturing one visual.
#[derive(Clone, Debug, PartialEq)]
pub enum CaptureResult {
    /// The preferred target was captured.
    Success(Raster),
    /// Only the parent container could be captured.
    Degraded {
        /// Raster of the fallback target.
        raster: Raster,
        /// Always `true`; kept explicit for callers that log it.
        used_fallback: bool,
    },
    /// Both attempts failed; carries the reason of the first failure.
    Failed(CaptureError),
}

impl CaptureResult {
    /// Raster of a successful or degraded capture.
    pub fn raster(&self) -> Option<&Raster> {
        match self {
            CaptureResult::Success(raster) | CaptureResult::Degraded { raster, .. } => Some(raster),
            CaptureResult::Failed(_) => None,
        }
    }

    /// Whether no raster is available.
    pub fn is_failed(&self) -> bool {
        matches!(self, CaptureResult::Failed(_))
    }
}

/// A disposable copy of a visual, safe to restyle.
#[async_trait]
pub trait DetachedVisual: Send {
    /// Draws the clone at `scale` onto an opaque `background`.
    async fn rasterize(&mut self, scale: f64, background: Color) -> Result<Raster, CaptureError>;

    /// Releases the clone. Called exactly once by the capturer.
    fn dispose(&mut self);
}

/// An already-rendered visual the report can capture.
#[async_trait]
pub trait VisualSource: Send + Sync {
    /// Identifier used in log lines and error messages.
    fn name(&self) -> &str;

    /// Whether the visual is mounted and displayed.
    fn is_visible(&self) -> bool;

    /// Current size in pixels.
    fn measure(&self) -> (u32, u32);

    /// Role of the visual.
    fn kind(&self) -> VisualKind {
        VisualKind::Element
    }

    /// Enclosing card of a chart region.
    fn card(&self) -> Option<Arc<dyn VisualSource>> {
        None
    }

    /// Nearest enclosing container.
    fn parent(&self) -> Option<Arc<dyn VisualSource>> {
        None
    }

    /// Resolves to `true` once the backend knows rendering has finished.
    /// Sources that cannot tell return `false` and get the settle delay.
    async fn rendered(&self) -> bool {
        false
    }

    /// Creates a clone with `fixups` applied; the original stays untouched.
    fn detach(&self, fixups: &StyleFixups) -> Result<Box<dyn DetachedVisual>, CaptureError>;
}

struct CloneGuard(Box<dyn DetachedVisual>);

impl Drop for CloneGuard {
    fn drop(&mut self) {
        self.0.dispose();
    }
}

/// Captures visuals one at a time.
pub struct VisualCapturer {
    config: CaptureConfig,
    in_flight: Mutex<()>,
}

impl VisualCapturer {
    /// Creates a capturer with `config`.
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            in_flight: Mutex::new(()),
        }
    }

    /// Settings in use.
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Captures `source`, shown under `title`, with a single-level fallback.
    ///
    /// Never returns an error: every failure is folded into
    /// [`CaptureResult::Failed`]. Calls are serialized; a second call waits
    /// until the first one has finished.
    pub async fn capture(&self, source: &dyn VisualSource, title: &str) -> CaptureResult {
        let _slot = self.in_flight.lock().await;

        let card = match source.kind() {
            VisualKind::ChartRegion => source.card(),
            _ => None,
        };
        let target: &dyn VisualSource = card.as_deref().unwrap_or(source);

        let primary = if source.is_visible() {
            self.attempt(target, self.config.timeout()).await
        } else {
            Err(CaptureError::NotVisible(source.name().to_string()))
        };

        let primary_error = match primary {
            Ok(raster) => {
                info!(
                    "captured \"{}\" from {} ({}x{} px)",
                    title,
                    target.name(),
                    raster.width,
                    raster.height
                );
                return CaptureResult::Success(raster);
            }
            Err(err) => err,
        };

        let fallback = match &card {
            Some(_) => target.parent(),
            None => source.card().or_else(|| target.parent()),
        };
        let Some(container) = fallback else {
            warn!(
                "capture of \"{}\" failed ({}): {}; no container to fall back to",
                title,
                primary_error.kind(),
                primary_error
            );
            return CaptureResult::Failed(primary_error);
        };

        warn!(
            "capture of \"{}\" failed ({}): {}; retrying with {}",
            title,
            primary_error.kind(),
            primary_error,
            container.name()
        );
        match self
            .attempt(container.as_ref(), self.config.fallback_timeout())
            .await
        {
            Ok(raster) => {
                info!(
                    "captured \"{}\" from fallback container {}",
                    title,
                    container.name()
                );
                CaptureResult::Degraded {
                    raster,
                    used_fallback: true,
                }
            }
            Err(fallback_error) => {
                warn!(
                    "fallback capture of \"{}\" failed too: {}",
                    title, fallback_error
                );
                CaptureResult::Failed(primary_error)
            }
        }
    }

    async fn attempt(
        &self,
        target: &dyn VisualSource,
        budget: Duration,
    ) -> Result<Raster, CaptureError> {
        if !target.is_visible() {
            return Err(CaptureError::NotVisible(target.name().to_string()));
        }

        if !target.rendered().await && !self.config.settle_delay().is_zero() {
            debug!(
                "waiting {:?} for {} to settle",
                self.config.settle_delay(),
                target.name()
            );
            tokio::time::sleep(self.config.settle_delay()).await;
        }

        let fixups = StyleFixups::for_measurement(target.measure(), &self.config);
        let mut clone = CloneGuard(target.detach(&fixups)?);
        let raster = tokio::time::timeout(
            budget,
            clone.0.rasterize(self.config.scale, self.config.background),
        )
        .await
        .map_err(|_| CaptureError::CaptureTimeout {
            name: target.name().to_string(),
            millis: budget.as_millis() as u64,
        })??;
        drop(clone);

        validate_raster(target.name(), raster)
    }
}

/// Checks that `raster` has a size and decodes as PNG or JPEG.
pub fn validate_raster(name: &str, raster: Raster) -> Result<Raster, CaptureError> {
    let invalid = |detail: String| CaptureError::InvalidPayload {
        name: name.to_string(),
        detail,
    };

    if raster.width == 0 || raster.height == 0 {
        return Err(CaptureError::ZeroDimension {
            name: name.to_string(),
            width: raster.width,
            height: raster.height,
        });
    }
    if raster.bytes.is_empty() {
        return Err(invalid("empty payload".to_string()));
    }

    let format = image::guess_format(&raster.bytes)
        .map_err(|_| invalid("payload is not an encoded image".to_string()))?;
    if !matches!(format, image::ImageFormat::Png | image::ImageFormat::Jpeg) {
        return Err(invalid(format!("unsupported image format {:?}", format)));
    }
    let decoded = image::load_from_memory_with_format(&raster.bytes, format)
        .map_err(|err| invalid(err.to_string()))?;
    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err(CaptureError::ZeroDimension {
            name: name.to_string(),
            width,
            height,
        });
    }

    Ok(Raster {
        width,
        height,
        bytes: raster.bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 20, 30])));
        let mut bytes = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .expect("encode png");
        bytes
    }

    #[derive(Clone, Copy)]
    enum Behaviour {
        Succeed,
        ZeroSize,
        Garbage,
        Hang,
        Slow,
    }

    #[derive(Default)]
    struct Counters {
        detached: AtomicUsize,
        disposed: AtomicUsize,
        rasterizing: AtomicUsize,
        peak_rasterizing: AtomicUsize,
    }

    struct MockVisual {
        name: &'static str,
        visible: bool,
        behaviour: Behaviour,
        kind: VisualKind,
        card: Option<Arc<dyn VisualSource>>,
        parent: Option<Arc<dyn VisualSource>>,
        counters: Arc<Counters>,
    }

    impl MockVisual {
        fn new(name: &'static str, behaviour: Behaviour, counters: &Arc<Counters>) -> Self {
            Self {
                name,
                visible: true,
                behaviour,
                kind: VisualKind::Element,
                card: None,
                parent: None,
                counters: Arc::clone(counters),
            }
        }
    }

    struct MockClone {
        behaviour: Behaviour,
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl DetachedVisual for MockClone {
        async fn rasterize(
            &mut self,
            _scale: f64,
            _background: Color,
        ) -> Result<Raster, CaptureError> {
            match self.behaviour {
                Behaviour::Succeed => Ok(Raster {
                    width: 4,
                    height: 2,
                    bytes: png(4, 2),
                }),
                Behaviour::ZeroSize => Ok(Raster {
                    width: 0,
                    height: 2,
                    bytes: png(4, 2),
                }),
                Behaviour::Garbage => Ok(Raster {
                    width: 4,
                    height: 2,
                    bytes: b"data:,".to_vec(),
                }),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!("timeout fires first")
                }
                Behaviour::Slow => {
                    let now = self.counters.rasterizing.fetch_add(1, Ordering::SeqCst) + 1;
                    self.counters.peak_rasterizing.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(15)).await;
                    self.counters.rasterizing.fetch_sub(1, Ordering::SeqCst);
                    Ok(Raster {
                        width: 4,
                        height: 2,
                        bytes: png(4, 2),
                    })
                }
            }
        }

        fn dispose(&mut self) {
            self.counters.disposed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl VisualSource for MockVisual {
        fn name(&self) -> &str {
            self.name
        }

        fn is_visible(&self) -> bool {
            self.visible
        }

        fn measure(&self) -> (u32, u32) {
            (4, 2)
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

        fn detach(&self, _fixups: &StyleFixups) -> Result<Box<dyn DetachedVisual>, CaptureError> {
            self.counters.detached.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockClone {
                behaviour: self.behaviour,
                counters: Arc::clone(&self.counters),
            }))
        }
    }

    fn capturer() -> VisualCapturer {
        VisualCapturer::new(CaptureConfig {
            timeout_ms: 50,
            fallback_timeout_ms: 50,
            ..CaptureConfig::default()
        })
    }

    #[tokio::test]
    async fn success_disposes_clone() {
        let counters = Arc::new(Counters::default());
        let visual = MockVisual::new("chart", Behaviour::Succeed, &counters);
        let result = capturer().capture(&visual, "Trends").await;
        assert!(matches!(result, CaptureResult::Success(_)));
        assert_eq!(counters.detached.load(Ordering::SeqCst), 1);
        assert_eq!(counters.disposed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn chart_region_prefers_card() {
        let counters = Arc::new(Counters::default());
        let card_counters = Arc::new(Counters::default());
        let mut visual = MockVisual::new("region", Behaviour::Garbage, &counters);
        visual.kind = VisualKind::ChartRegion;
        visual.card = Some(Arc::new(MockVisual::new(
            "card",
            Behaviour::Succeed,
            &card_counters,
        )));
        let result = capturer().capture(&visual, "Trends").await;
        assert!(matches!(result, CaptureResult::Success(_)));
        assert_eq!(counters.detached.load(Ordering::SeqCst), 0);
        assert_eq!(card_counters.disposed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_payload_falls_back_to_parent() {
        let counters = Arc::new(Counters::default());
        let mut visual = MockVisual::new("chart", Behaviour::Garbage, &counters);
        visual.parent = Some(Arc::new(MockVisual::new(
            "container",
            Behaviour::Succeed,
            &counters,
        )));
        let result = capturer().capture(&visual, "Trends").await;
        assert!(matches!(
            result,
            CaptureResult::Degraded {
                used_fallback: true,
                ..
            }
        ));
        assert_eq!(counters.detached.load(Ordering::SeqCst), 2);
        assert_eq!(counters.disposed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fallback_prefers_card_over_parent() {
        let counters = Arc::new(Counters::default());
        let card_counters = Arc::new(Counters::default());
        let parent_counters = Arc::new(Counters::default());
        let mut visual = MockVisual::new("legend", Behaviour::Garbage, &counters);
        visual.card = Some(Arc::new(MockVisual::new(
            "card",
            Behaviour::Succeed,
            &card_counters,
        )));
        visual.parent = Some(Arc::new(MockVisual::new(
            "row",
            Behaviour::Succeed,
            &parent_counters,
        )));

        let result = capturer().capture(&visual, "Trends").await;
        assert!(matches!(result, CaptureResult::Degraded { .. }));
        assert_eq!(counters.detached.load(Ordering::SeqCst), 1);
        assert_eq!(card_counters.detached.load(Ordering::SeqCst), 1);
        assert_eq!(parent_counters.detached.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fallback_depth_is_one() {
        let counters = Arc::new(Counters::default());
        let mut grandparent_holder = MockVisual::new("container", Behaviour::ZeroSize, &counters);
        grandparent_holder.parent = Some(Arc::new(MockVisual::new(
            "page",
            Behaviour::Succeed,
            &counters,
        )));
        let mut visual = MockVisual::new("chart", Behaviour::Garbage, &counters);
        visual.parent = Some(Arc::new(grandparent_holder));

        let result = capturer().capture(&visual, "Trends").await;
        match result {
            CaptureResult::Failed(err) => assert_eq!(err.kind(), "InvalidPayload"),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(counters.detached.load(Ordering::SeqCst), 2);
        assert_eq!(counters.disposed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn hidden_visual_is_not_detached() {
        let counters = Arc::new(Counters::default());
        let mut visual = MockVisual::new("chart", Behaviour::Succeed, &counters);
        visual.visible = false;
        let result = capturer().capture(&visual, "Trends").await;
        assert_eq!(
            result,
            CaptureResult::Failed(CaptureError::NotVisible("chart".into()))
        );
        assert_eq!(counters.detached.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn timeout_still_disposes_clone() {
        let counters = Arc::new(Counters::default());
        let visual = MockVisual::new("chart", Behaviour::Hang, &counters);
        let result = capturer().capture(&visual, "Trends").await;
        match result {
            CaptureResult::Failed(CaptureError::CaptureTimeout { millis, .. }) => {
                assert_eq!(millis, 50)
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(counters.disposed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_captures_run_one_at_a_time() {
        let counters = Arc::new(Counters::default());
        let capturer = Arc::new(capturer());

        let handles: Vec<_> = ["first", "second", "third"]
            .into_iter()
            .map(|name| {
                let capturer = Arc::clone(&capturer);
                let visual = MockVisual::new(name, Behaviour::Slow, &counters);
                tokio::spawn(async move { capturer.capture(&visual, name).await })
            })
            .collect();
        for handle in handles {
            let result = handle.await.expect("capture task");
            assert!(matches!(result, CaptureResult::Success(_)));
        }

        assert_eq!(counters.detached.load(Ordering::SeqCst), 3);
        assert_eq!(counters.disposed.load(Ordering::SeqCst), 3);
        assert_eq!(counters.peak_rasterizing.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn validation_rejects_bad_rasters() {
        let zero = validate_raster(
            "chart",
            Raster {
                width: 0,
                height: 10,
                bytes: png(1, 1),
            },
        );
        assert!(matches!(zero, Err(CaptureError::ZeroDimension { .. })));

        let placeholder = validate_raster(
            "chart",
            Raster {
                width: 10,
                height: 10,
                bytes: b"data:,".to_vec(),
            },
        );
        assert!(matches!(placeholder, Err(CaptureError::InvalidPayload { .. })));

        let ok = validate_raster(
            "chart",
            Raster {
                width: 1,
                height: 1,
                bytes: png(6, 3),
            },
        )
        .expect("valid png");
        assert_eq!((ok.width, ok.height), (6, 3));
    }

    #[test]
    fn fixups_replace_unusable_measurements() {
        let config = CaptureConfig::default();
        let fixups = StyleFixups::for_measurement((0, 300), &config);
        assert_eq!(fixups.explicit_size, Some((800, 300)));
        assert!(fixups.force_visible);
        assert_eq!(StyleFixups::for_measurement((640, 480), &config).explicit_size, None);
    }
}
