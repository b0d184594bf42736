//! Request orchestration: fetch → (extract and/or rasterise) → assemble.
//!
//! Each entry point is all-or-nothing. Zoom is validated before any network
//! I/O, and nothing touches the disk until the download succeeded.
//!
//! ## Scratch files
//!
//! The parsing service client needs a file path. Every call gets its own
//! uniquely-named [`tempfile::NamedTempFile`], written on the blocking pool.
//! The file is removed when the guard drops, whether extraction succeeded,
//! failed, or the request future was cancelled. Concurrent requests therefore never share a path.

use crate::config::ServerConfig;
use crate::error::Pdf2PngError;
use crate::output::{PageImage, RenderedPage};
use crate::pipeline::extract::{LlamaParseClient, MarkdownExtractor};
use crate::pipeline::fetch::Fetcher;
use crate::pipeline::render::{self, Zoom};
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Everything a request needs, shared across requests.
#[derive(Clone)]
pub struct Converter {
    fetcher: Fetcher,
    extractor: Arc<dyn MarkdownExtractor>,
    render_timeout: Duration,
}

impl Converter {
    pub fn new(
        fetcher: Fetcher,
        extractor: Arc<dyn MarkdownExtractor>,
        render_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            render_timeout,
        }
    }

    /// Wire up the real HTTP fetcher and the LlamaParse client from `config`.
    pub fn from_config(config: &ServerConfig) -> Result<Self, Pdf2PngError> {
        let fetcher = Fetcher::new(config.download_timeout())?;
        let extractor = LlamaParseClient::new(
            config.parser_base_url.clone(),
            config.parser_api_key.clone(),
            config.extraction_timeout(),
            config.poll_interval(),
        )?;
        Ok(Self::new(
            fetcher,
            Arc::new(extractor),
            config.render_timeout(),
        ))
    }

    /// Download `url` and rasterise every page at `zoom`.
    pub async fn convert_to_images(
        &self,
        url: &str,
        zoom: i64,
    ) -> Result<Vec<PageImage>, Pdf2PngError> {
        Zoom::new(zoom)?;
        let start = Instant::now();
        let pdf = Arc::new(self.fetcher.fetch(url).await?);
        let pages = self.render(pdf, zoom).await?;
        info!(
            "Converted {} pages from {} in {}ms",
            pages.len(),
            url,
            start.elapsed().as_millis()
        );
        Ok(pages.iter().map(RenderedPage::to_page_image).collect())
    }

    /// Download `url` and extract per-page Markdown.
    pub async fn parse_to_markdown(&self, url: &str) -> Result<Vec<String>, Pdf2PngError> {
        let start = Instant::now();
        let pdf = Arc::new(self.fetcher.fetch(url).await?);
        let pages = self.extract(pdf).await?;
        info!(
            "Extracted {} Markdown pages from {} in {}ms",
            pages.len(),
            url,
            start.elapsed().as_millis()
        );
        Ok(pages)
    }

    /// Download `url` once, then extract Markdown and rasterise concurrently.
    pub async fn process(
        &self,
        url: &str,
        zoom: i64,
    ) -> Result<(Vec<String>, Vec<PageImage>), Pdf2PngError> {
        Zoom::new(zoom)?;
        let start = Instant::now();
        let pdf = Arc::new(self.fetcher.fetch(url).await?);

        let (markdown, rendered) =
            tokio::try_join!(self.extract(Arc::clone(&pdf)), self.render(pdf, zoom))?;

        info!(
            "Processed {}: {} Markdown pages, {} images in {}ms",
            url,
            markdown.len(),
            rendered.len(),
            start.elapsed().as_millis()
        );
        let images = rendered.iter().map(RenderedPage::to_page_image).collect();
        Ok((markdown, images))
    }

    async fn render(
        &self,
        pdf: Arc<Vec<u8>>,
        zoom: i64,
    ) -> Result<Vec<RenderedPage>, Pdf2PngError> {
        render::render_pages(pdf, zoom, self.render_timeout).await
    }

    async fn extract(&self, pdf: Arc<Vec<u8>>) -> Result<Vec<String>, Pdf2PngError> {
        let scratch = tokio::task::spawn_blocking(move || write_scratch_file(&pdf))
            .await
            .map_err(|e| Pdf2PngError::Internal(format!("Scratch write task failed: {}", e)))??;
        debug!("Scratch file for parsing: {}", scratch.path().display());
        // `scratch` is dropped (and the file deleted) when this returns
        self.extractor.extract(scratch.path()).await
    }
}

/// Persist `bytes` to a fresh, uniquely-named temporary `.pdf` file.
fn write_scratch_file(bytes: &[u8]) -> Result<tempfile::NamedTempFile, Pdf2PngError> {
    let mut tmp = tempfile::Builder::new()
        .prefix("pdf2png-")
        .suffix(".pdf")
        .tempfile()
        .map_err(Pdf2PngError::ScratchFile)?;
    tmp.write_all(bytes).map_err(Pdf2PngError::ScratchFile)?;
    tmp.flush().map_err(Pdf2PngError::ScratchFile)?;
    Ok(tmp)
}
