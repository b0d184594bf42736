//! # pdf2png-api
//!
//! HTTP service that downloads a PDF from a URL and returns its pages as PNG
//! images (base64 data URLs), per-page Markdown from an external parsing
//! service, or both.
//!
//! ## Pipeline Overview
//!
//! ```text
//! POST {pdf_url, zoom}
//!  │
//!  ├─ 1. Validate  zoom ∈ [1, 10], before any I/O
//!  ├─ 2. Fetch     download the PDF into memory (reqwest)
//!  ├─ 3. Render    rasterise pages via pdfium at `zoom` × 72 DPI (spawn_blocking)
//!  ├─ 4. Encode    RGB → PNG → data:image/png;base64,…
//!  ├─ 5. Extract   per-request temp file → parsing service → Markdown pages
//!  └─ 6. Respond   one combined JSON payload, or one error
//! ```
//!
//! Every request is all-or-nothing: one failed page or a failed parsing job
//! fails the whole request and no partial data is returned.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2png_api::{server, AppState, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::builder()
//!         .parser_api_key(std::env::var("LLAMA_CLOUD_API_KEY")?)
//!         .build()?;
//!     let state = AppState::from_config(&config)?;
//!     server::serve(&config, state).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2png-server` binary (clap + anyhow + tracing-subscriber + dotenvy) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ServerConfig, ServerConfigBuilder};
pub use convert::Converter;
pub use error::{Pdf2PngError, Stage};
pub use output::{ImagesResponse, MarkdownResponse, PageImage, ProcessResponse, RenderedPage};
pub use pipeline::extract::{LlamaParseClient, MarkdownExtractor, ParseProfile};
pub use pipeline::fetch::Fetcher;
pub use pipeline::render::{render_pages, Zoom};
pub use server::{router, AppState};
