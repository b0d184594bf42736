//! Rasteriser behaviour against generated documents.
//!
//! Requires a local pdfium; each test skips itself otherwise.

#[macro_use]
mod common;

use common::minimal_pdf;
use pdf2png_api::pipeline::render::{render_document, render_pages};
use pdf2png_api::{Pdf2PngError, Zoom};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

fn dimensions(png: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(png).unwrap();
    (img.width(), img.height())
}

#[test]
fn page_count_and_numbering_follow_document() {
    skip_without_pdfium!();
    let pdf = minimal_pdf(3, 100, 50);
    let pages = render_document(&pdf, Zoom::new(1).unwrap(), &AtomicBool::new(false)).unwrap();

    let numbers: Vec<usize> = pages.iter().map(|p| p.page_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    for page in &pages {
        assert_eq!(&page.png[..8], b"\x89PNG\r\n\x1a\n");
    }
}

#[test]
fn doubling_zoom_doubles_dimensions() {
    skip_without_pdfium!();
    let pdf = minimal_pdf(1, 120, 80);
    let cancel = AtomicBool::new(false);

    let z2 = render_document(&pdf, Zoom::new(2).unwrap(), &cancel).unwrap();
    let z4 = render_document(&pdf, Zoom::new(4).unwrap(), &cancel).unwrap();

    assert_eq!(dimensions(&z2[0].png), (240, 160));
    assert_eq!(dimensions(&z4[0].png), (480, 320));
    assert_eq!((z2[0].width, z2[0].height), (240, 160));
}

#[test]
fn rendering_is_deterministic() {
    skip_without_pdfium!();
    let pdf = minimal_pdf(2, 100, 100);
    let cancel = AtomicBool::new(false);

    let a = render_document(&pdf, Zoom::new(3).unwrap(), &cancel).unwrap();
    let b = render_document(&pdf, Zoom::new(3).unwrap(), &cancel).unwrap();
    let a: Vec<_> = a.into_iter().map(|p| p.png).collect();
    let b: Vec<_> = b.into_iter().map(|p| p.png).collect();
    assert_eq!(a, b);
}

#[test]
fn cancelled_render_stops_before_first_page() {
    skip_without_pdfium!();
    let pdf = minimal_pdf(2, 100, 100);
    let err = render_document(&pdf, Zoom::new(1).unwrap(), &AtomicBool::new(true)).unwrap_err();
    assert!(matches!(err, Pdf2PngError::Timeout { .. }));
}

#[tokio::test]
async fn async_render_validates_zoom_first() {
    // No pdfium needed: zoom is checked before the worker starts.
    let pdf = Arc::new(minimal_pdf(1, 100, 100));
    let err = render_pages(pdf, 11, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, Pdf2PngError::InvalidZoom { zoom: 11, .. }));
}

#[tokio::test]
async fn async_render_matches_blocking_render() {
    skip_without_pdfium!();
    let pdf = minimal_pdf(2, 90, 60);
    let expected = render_document(&pdf, Zoom::new(2).unwrap(), &AtomicBool::new(false)).unwrap();
    let actual = render_pages(Arc::new(pdf), 2, Duration::from_secs(60))
        .await
        .unwrap();

    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(&expected) {
        assert_eq!(a.png, e.png);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_renders_share_one_pdfium() {
    skip_without_pdfium!();
    let short = Arc::new(minimal_pdf(1, 50, 50));
    let long = Arc::new(minimal_pdf(8, 300, 300));

    // The short render finishes while the long one still holds pages.
    let (a, b) = tokio::join!(
        render_pages(Arc::clone(&short), 1, Duration::from_secs(60)),
        render_pages(Arc::clone(&long), 3, Duration::from_secs(60)),
    );
    assert_eq!(a.unwrap().len(), 1);
    let b = b.unwrap();
    assert_eq!(b.len(), 8);
    assert_eq!(dimensions(&b[7].png), (900, 900));

    // A later render after both have finished still works.
    let again = render_pages(short, 2, Duration::from_secs(60)).await.unwrap();
    assert_eq!(dimensions(&again[0].png), (100, 100));
}
