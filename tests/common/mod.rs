//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, routing::get, Router};
use pdf2png_api::{Converter, Fetcher, MarkdownExtractor, Pdf2PngError};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Skip the current test when no pdfium library is available locally.
macro_rules! skip_without_pdfium {
    () => {
        if pdfium_auto::cached_pdfium_path().is_none() {
            println!("SKIP: pdfium not available (set PDFIUM_LIB_PATH or run the server once)");
            return;
        }
    };
}

/// Build a valid PDF with `pages` blank pages of `width`×`height` points.
pub fn minimal_pdf(pages: usize, width: u32, height: u32) -> Vec<u8> {
    let first_page = 3;
    let kids: Vec<String> = (0..pages).map(|i| format!("{} 0 R", first_page + i)).collect();

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), pages),
    ];
    for _ in 0..pages {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {width} {height}] /Resources << >> >>"
        ));
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_at = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    // Each entry is exactly 20 bytes including the two-byte EOL.
    out.extend_from_slice(b"0000000000 65535 f \n");
    for off in offsets {
        out.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_at
        )
        .as_bytes(),
    );
    out
}

/// A local document host that counts every request it receives.
pub struct DocServer {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl DocServer {
    /// Serves `/three-pages.pdf`, `/not-a-pdf.bin`, and 404 for everything else.
    pub async fn start() -> Self {
        let hits = Arc::new(AtomicUsize::new(0));

        async fn three_pages(State(hits): State<Arc<AtomicUsize>>) -> Vec<u8> {
            hits.fetch_add(1, Ordering::SeqCst);
            minimal_pdf(3, 200, 100)
        }
        async fn not_a_pdf(State(hits): State<Arc<AtomicUsize>>) -> &'static str {
            hits.fetch_add(1, Ordering::SeqCst);
            "<html>definitely not a pdf</html>"
        }
        async fn missing(State(hits): State<Arc<AtomicUsize>>) -> StatusCode {
            hits.fetch_add(1, Ordering::SeqCst);
            StatusCode::NOT_FOUND
        }

        let app = Router::new()
            .route("/three-pages.pdf", get(three_pages))
            .route("/not-a-pdf.bin", get(not_a_pdf))
            .fallback(missing)
            .with_state(Arc::clone(&hits));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, hits }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Returns canned pages, or fails, without any network access.
pub struct FakeExtractor {
    pages: Vec<String>,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn pages(pages: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            pages: pages.iter().map(|p| p.to_string()).collect(),
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            pages: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }

    /// Number of times the parsing step was reached.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarkdownExtractor for FakeExtractor {
    async fn extract(&self, pdf_path: &Path) -> Result<Vec<String>, Pdf2PngError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(pdf_path.exists(), "scratch file must exist during extraction");
        if self.fail {
            return Err(Pdf2PngError::ExtractionFailed(
                "parsing job finished with status ERROR".into(),
            ));
        }
        Ok(self.pages.clone())
    }
}

pub fn converter(extractor: Arc<FakeExtractor>) -> Converter {
    Converter::new(
        Fetcher::new(Duration::from_secs(10)).unwrap(),
        extractor,
        Duration::from_secs(60),
    )
}
