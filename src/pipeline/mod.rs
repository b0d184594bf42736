//! Pipeline stages for PDF conversion.
//!
//! Each submodule implements exactly one step, so each can be tested without
//! the HTTP layer and without the others.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌──▶ render ──▶ encode ──▶ images
//! fetch ─────┤   (pdfium)   (png/base64)
//! (reqwest)  └──▶ extract ─────────────▶ markdown_pages
//!                 (parsing service)
//! ```
//!
//! 1. [`fetch`]: download the source PDF into memory
//! 2. [`render`]: rasterise every page; runs in `spawn_blocking` because
//!    pdfium is CPU-bound and not async-aware
//! 3. [`encode`]: PNG-encode each page and wrap it as a base64 data URL
//! 4. [`extract`]: hand the PDF to the external parsing service and collect
//!    one Markdown string per page

pub mod encode;
pub mod extract;
pub mod fetch;
pub mod render;
