//! Result types produced by the pipeline and serialised into responses.

use crate::pipeline::encode::to_data_url;
use serde::{Deserialize, Serialize};

/// One rasterised page, PNG-encoded.
///
/// `page_number` is 1-based and contiguous across a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub page_number: usize,
    /// Pixel width of the rendered bitmap.
    pub width: u32,
    /// Pixel height of the rendered bitmap.
    pub height: u32,
    /// Lossless PNG bytes (RGB, no alpha).
    pub png: Vec<u8>,
}

impl RenderedPage {
    /// The page as it appears on the wire.
    pub fn to_page_image(&self) -> PageImage {
        PageImage {
            page_number: self.page_number,
            data_url: to_data_url(&self.png),
        }
    }
}

/// Wire form of a rendered page: `{page_number, data_url}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    pub page_number: usize,
    pub data_url: String,
}

/// Response of `POST /convert-pdf-to-png/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesResponse {
    pub message: String,
    pub images: Vec<PageImage>,
}

/// Response of `POST /parse-pdf-to-markdown/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownResponse {
    pub message: String,
    pub markdown_pages: Vec<String>,
}

/// Response of `POST /process-pdf/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub message: String,
    pub markdown_pages: Vec<String>,
    pub images: Vec<PageImage>,
}
