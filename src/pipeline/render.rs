//! PDF rasterisation: render every page to an RGB PNG via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which is CPU-bound
//! and not async-aware. `tokio::task::spawn_blocking` moves the work onto the
//! blocking thread pool so the Tokio workers keep serving other requests.
//!
//! ## Sizing
//!
//! A page of `w × h` points renders to `round(w·zoom) × round(h·zoom)` pixels,
//! i.e. zoom 1 is 72 DPI. Doubling the zoom doubles both dimensions.
//!
//! ## Cancellation
//!
//! A blocking thread cannot be killed. When the future returned by
//! [`render_pages`] times out or is dropped, a shared flag is raised and the
//! worker stops at the next page boundary instead of finishing the document
//! nobody is waiting for.

use crate::error::{Pdf2PngError, Stage};
use crate::output::RenderedPage;
use crate::pipeline::encode::encode_png;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// PDF header marker. The format allows it anywhere in the first 1024 bytes.
const PDF_MAGIC: &[u8] = b"%PDF-";
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Integer scale factor applied to both axes of every page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Zoom(u32);

impl Zoom {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 10;

    /// Validate a caller-supplied zoom factor.
    pub fn new(zoom: i64) -> Result<Self, Pdf2PngError> {
        if zoom < i64::from(Self::MIN) || zoom > i64::from(Self::MAX) {
            return Err(Pdf2PngError::InvalidZoom {
                zoom,
                min: Self::MIN,
                max: Self::MAX,
            });
        }
        Ok(Self(zoom as u32))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Pixel length of a page edge measured in PDF points.
    pub fn scale(self, points: f32) -> i32 {
        (points * self.0 as f32).round().max(1.0) as i32
    }
}

/// `true` if `bytes` carries a PDF header near its start.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    window.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC)
}

/// Rasterise every page of `pdf` at `zoom`, giving up after `timeout`.
///
/// All-or-nothing: the first page that fails aborts the whole document.
/// Dropping the returned future stops the worker at the next page boundary.
pub async fn render_pages(
    pdf: Arc<Vec<u8>>,
    zoom: i64,
    timeout: Duration,
) -> Result<Vec<RenderedPage>, Pdf2PngError> {
    let zoom = Zoom::new(zoom)?;
    run_cancellable(timeout, move |cancel| render_document(&pdf, zoom, cancel)).await
}

/// Raises its flag when dropped.
///
/// Held by the awaiting future, so the flag goes up on timeout, on normal
/// completion, and when the caller abandons the future (a sibling failing
/// inside `try_join!`, or a disconnected client).
struct CancelOnDrop(Arc<AtomicBool>);

impl CancelOnDrop {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Run `work` on the blocking pool, handing it a flag that is raised once
/// nobody waits for the result any more.
async fn run_cancellable<T, F>(timeout: Duration, work: F) -> Result<T, Pdf2PngError>
where
    T: Send + 'static,
    F: FnOnce(&AtomicBool) -> Result<T, Pdf2PngError> + Send + 'static,
{
    let cancel = CancelOnDrop::new();
    let worker_cancel = cancel.flag();

    let task = tokio::task::spawn_blocking(move || work(&worker_cancel));

    match tokio::time::timeout(timeout, task).await {
        Ok(joined) => {
            joined.map_err(|e| Pdf2PngError::Internal(format!("Render task panicked: {}", e)))?
        }
        Err(_) => {
            warn!("Rasterisation exceeded {:?}; cancelling", timeout);
            Err(Pdf2PngError::Timeout {
                stage: Stage::Render,
                secs: timeout.as_secs(),
            })
        }
    }
}

/// Blocking implementation of page rendering.
///
/// Uses the process-wide pdfium instance; `cancel` is checked before each
/// page.
pub fn render_document(
    pdf: &[u8],
    zoom: Zoom,
    cancel: &AtomicBool,
) -> Result<Vec<RenderedPage>, Pdf2PngError> {
    if !looks_like_pdf(pdf) {
        return Err(Pdf2PngError::MalformedDocument {
            detail: format!("missing %PDF header ({} bytes received)", pdf.len()),
        });
    }

    let pdfium = pdfium_auto::shared_pdfium()
        .map_err(|e| Pdf2PngError::PdfiumBindingFailed(e.to_string()))?;

    let document = pdfium
        .load_pdf_from_byte_slice(pdf, None)
        .map_err(|e| Pdf2PngError::MalformedDocument {
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages, zoom {}", total_pages, zoom.get());

    let mut results = Vec::with_capacity(total_pages);

    for idx in 0..total_pages {
        if cancel.load(Ordering::Relaxed) {
            debug!("Rasterisation cancelled before page {}", idx + 1);
            return Err(Pdf2PngError::Timeout {
                stage: Stage::Render,
                secs: 0,
            });
        }

        let page_number = idx + 1;
        let page = pages
            .get(idx as u16)
            .map_err(|e| Pdf2PngError::RasterisationFailed {
                page: page_number,
                detail: format!("{:?}", e),
            })?;

        let render_config = PdfRenderConfig::new()
            .set_target_width(zoom.scale(page.width().value))
            .set_target_height(zoom.scale(page.height().value));

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            Pdf2PngError::RasterisationFailed {
                page: page_number,
                detail: format!("{:?}", e),
            }
        })?;

        let rgb = DynamicImage::ImageRgb8(bitmap.as_image().to_rgb8());
        let png = encode_png(&rgb).map_err(|e| Pdf2PngError::RasterisationFailed {
            page: page_number,
            detail: format!("PNG encoding failed: {}", e),
        })?;

        debug!(
            "Rendered page {} → {}x{} px",
            page_number,
            rgb.width(),
            rgb.height()
        );

        results.push(RenderedPage {
            page_number,
            width: rgb.width(),
            height: rgb.height(),
            png,
        });
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_bounds_are_inclusive() {
        assert_eq!(Zoom::new(1).unwrap().get(), 1);
        assert_eq!(Zoom::new(10).unwrap().get(), 10);
        assert!(Zoom::new(0).is_err());
        assert!(Zoom::new(11).is_err());
        assert!(Zoom::new(-3).is_err());
    }

    #[test]
    fn zoom_scales_points_to_pixels() {
        let z = Zoom::new(2).unwrap();
        assert_eq!(z.scale(612.0), 1224);
        assert_eq!(z.scale(595.3), 1191);
        assert_eq!(Zoom::new(4).unwrap().scale(612.0), 2 * z.scale(612.0));
    }

    #[test]
    fn pdf_header_detection() {
        assert!(looks_like_pdf(b"%PDF-1.7\n..."));
        assert!(looks_like_pdf(b"\xef\xbb\xbf junk %PDF-1.4"));
        assert!(!looks_like_pdf(b"<html>not found</html>"));
        assert!(!looks_like_pdf(b""));

        let mut late = vec![b' '; 2000];
        late.extend_from_slice(b"%PDF-1.4");
        assert!(!looks_like_pdf(&late));
    }

    #[test]
    fn garbage_is_malformed_before_pdfium() {
        let cancel = AtomicBool::new(false);
        let err = render_document(b"definitely not a pdf", Zoom::new(2).unwrap(), &cancel)
            .unwrap_err();
        assert!(matches!(err, Pdf2PngError::MalformedDocument { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn abandoned_render_raises_cancel_flag() {
        let (observed_tx, observed_rx) = std::sync::mpsc::channel();
        let work = move |cancel: &AtomicBool| {
            while !cancel.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(5));
            }
            let _ = observed_tx.send(());
            Ok::<(), Pdf2PngError>(())
        };

        // Give up on the call while the worker is busy, the way try_join!
        // drops a branch once its sibling fails.
        let pending = run_cancellable(Duration::from_secs(60), work);
        assert!(tokio::time::timeout(Duration::from_millis(50), pending)
            .await
            .is_err());

        observed_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("worker never saw the cancel flag");
    }

    #[tokio::test]
    async fn worker_timeout_is_reported_as_render_timeout() {
        let work = |cancel: &AtomicBool| {
            while !cancel.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok::<(), Pdf2PngError>(())
        };
        let err = run_cancellable(Duration::from_millis(20), work)
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2PngError::Timeout { stage: Stage::Render, .. }));
    }

    #[test]
    fn cancel_guard_sets_flag_on_drop() {
        let guard = CancelOnDrop::new();
        let flag = guard.flag();
        assert!(!flag.load(Ordering::Relaxed));
        drop(guard);
        assert!(flag.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn out_of_range_zoom_fails_without_rendering() {
        let err = render_pages(Arc::new(b"%PDF-1.4".to_vec()), 11, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2PngError::InvalidZoom { zoom: 11, .. }));
    }
}
