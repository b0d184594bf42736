//! Error types for the pdf2png-api library.
//!
//! Every request is all-or-nothing: a single page that fails to render, a
//! parsing job that errors out, or a download that returns 404 aborts the
//! whole request. There is therefore exactly one error type,
//! [`Pdf2PngError`], returned by every pipeline stage and by the
//! orchestration functions in [`crate::convert`].
//!
//! Mapping to HTTP status codes lives in [`crate::server`]; this module only
//! classifies errors (see [`Pdf2PngError::is_client_error`]).

use std::fmt;
use thiserror::Error;

/// The pipeline stage that ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Download,
    Render,
    Extraction,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Download => "download",
            Stage::Render => "rasterisation",
            Stage::Extraction => "markdown extraction",
        };
        f.write_str(name)
    }
}

/// All errors returned by the pdf2png-api library.
#[derive(Debug, Error)]
pub enum Pdf2PngError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The source URL could not be fetched or answered with a non-2xx status.
    #[error("Failed to download PDF from '{url}': {reason}")]
    DownloadFailed {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    /// Zoom factor outside the accepted range.
    #[error("Zoom must be between {min} and {max} (inclusive), got {zoom}")]
    InvalidZoom { zoom: i64, min: u32, max: u32 },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The downloaded bytes are not a PDF pdfium can open.
    #[error("Document is not a readable PDF: {detail}")]
    MalformedDocument { detail: String },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy."
    )]
    PdfiumBindingFailed(String),

    // ── Parsing service errors ────────────────────────────────────────────
    /// The external Markdown parsing service failed.
    #[error("Markdown extraction failed: {0}")]
    ExtractionFailed(String),

    // ── Resource errors ───────────────────────────────────────────────────
    /// A stage exceeded its time budget.
    #[error("The {stage} stage timed out after {secs}s")]
    Timeout { stage: Stage, secs: u64 },

    /// The per-request scratch file could not be created or written.
    #[error("Failed to prepare scratch file: {0}")]
    ScratchFile(#[source] std::io::Error),

    /// The request body is not valid JSON or does not match the expected shape.
    #[error("Invalid request body: {0}")]
    InvalidRequest(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2PngError {
    /// `true` for errors caused by the request itself rather than by the
    /// document, the parsing service, or this process.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Pdf2PngError::InvalidZoom { .. }
                | Pdf2PngError::DownloadFailed { .. }
                | Pdf2PngError::InvalidRequest(_)
        )
    }

    /// Short machine-readable name used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Pdf2PngError::DownloadFailed { .. } => "download_failed",
            Pdf2PngError::InvalidZoom { .. } => "invalid_zoom",
            Pdf2PngError::MalformedDocument { .. } => "malformed_document",
            Pdf2PngError::RasterisationFailed { .. } => "rasterisation_failed",
            Pdf2PngError::PdfiumBindingFailed(_) => "pdfium_unavailable",
            Pdf2PngError::ExtractionFailed(_) => "extraction_failed",
            Pdf2PngError::Timeout { .. } => "timeout",
            Pdf2PngError::ScratchFile(_) => "scratch_file",
            Pdf2PngError::InvalidRequest(_) => "invalid_request",
            Pdf2PngError::InvalidConfig(_) => "invalid_config",
            Pdf2PngError::Internal(_) => "internal_error",
        }
    }
}
