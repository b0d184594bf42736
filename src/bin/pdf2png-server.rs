//! Server binary for pdf2png-api.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `ServerConfig`, makes sure pdfium is available, and serves.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2png_api::{config::DEFAULT_PARSER_BASE_URL, server, AppState, ServerConfig};
use std::io;
use std::net::IpAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on 0.0.0.0:8000 (API key from the environment or .env)
  pdf2png-server

  # Custom port, longer render budget
  pdf2png-server --port 9000 --render-timeout 300

  # Convert a document
  curl -X POST localhost:8000/convert-pdf-to-png/ \
       -H 'content-type: application/json' \
       -d '{"pdf_url": "https://arxiv.org/pdf/1706.03762", "zoom": 2}'

ENVIRONMENT VARIABLES:
  LLAMA_CLOUD_API_KEY     Parsing service API key (required)
  RUST_LOG                Log filter, e.g. pdf2png_api=debug,tower_http=debug
  PDFIUM_LIB_PATH         Path to an existing libpdfium, skips auto-download
  PDFIUM_AUTO_CACHE_DIR   Override the default pdfium cache directory

  Every flag below can also be set through the variable named in its help.
  A `.env` file in the working directory is loaded first.
"#;

/// Rasterise PDF pages to PNG data URLs and extract Markdown over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2png-server",
    version,
    about = "HTTP service: PDF URL → PNG data URLs and per-page Markdown",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Interface to bind.
    #[arg(long, env = "PDF2PNG_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to bind.
    #[arg(short, long, env = "PDF2PNG_PORT", default_value_t = 8000)]
    port: u16,

    /// Zoom used when a request omits it (1–10).
    #[arg(long, env = "PDF2PNG_DEFAULT_ZOOM", default_value_t = 2,
          value_parser = clap::value_parser!(u32).range(1..=10))]
    default_zoom: u32,

    /// PDF download timeout in seconds.
    #[arg(long, env = "PDF2PNG_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Rasterisation timeout per document in seconds.
    #[arg(long, env = "PDF2PNG_RENDER_TIMEOUT", default_value_t = 120)]
    render_timeout: u64,

    /// Markdown extraction timeout per document in seconds.
    #[arg(long, env = "PDF2PNG_EXTRACTION_TIMEOUT", default_value_t = 600)]
    extraction_timeout: u64,

    /// Delay between parsing-job status checks in milliseconds.
    #[arg(long, env = "PDF2PNG_POLL_INTERVAL_MS", default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Base URL of the parsing service.
    #[arg(long, env = "LLAMA_CLOUD_BASE_URL", default_value = DEFAULT_PARSER_BASE_URL)]
    parser_base_url: String,

    /// Parsing service API key.
    #[arg(long, env = "LLAMA_CLOUD_API_KEY", hide_env_values = true)]
    parser_api_key: String,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2PNG_VERBOSE")]
    verbose: bool,

    /// Do not show the pdfium download progress bar.
    #[arg(short, long, env = "PDF2PNG_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before clap reads its env fallbacks.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "pdf2png_api=debug,tower_http=debug,info"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    tracing::info!(
        "Starting pdf2png-api v{} ({:?})",
        env!("CARGO_PKG_VERSION"),
        config
    );

    // ── Ensure PDFium engine is available ────────────────────────────────
    // Done once at startup so the first request does not pay for the ~30 MB
    // download. Later calls only hit the in-process path cache.
    tokio::task::block_in_place(|| ensure_pdfium(cli.quiet))?;

    let state = AppState::from_config(&config).context("Failed to initialise services")?;
    server::serve(&config, state)
        .await
        .context("Server failed")?;

    Ok(())
}

/// Map CLI args to `ServerConfig`.
fn build_config(cli: &Cli) -> Result<ServerConfig> {
    ServerConfig::builder()
        .host(cli.host)
        .port(cli.port)
        .default_zoom(cli.default_zoom)
        .download_timeout_secs(cli.download_timeout)
        .render_timeout_secs(cli.render_timeout)
        .extraction_timeout_secs(cli.extraction_timeout)
        .poll_interval_ms(cli.poll_interval_ms)
        .parser_base_url(cli.parser_base_url.clone())
        .parser_api_key(cli.parser_api_key.clone())
        .build()
        .context("Invalid configuration")
}

/// Download (first run) or locate the pdfium shared library.
fn ensure_pdfium(quiet: bool) -> Result<()> {
    if quiet || pdfium_auto::is_pdfium_cached() {
        let path = pdfium_auto::ensure_pdfium_library(None)
            .context("Failed to locate PDFium engine")?;
        tracing::info!("PDFium library: {}", path.display());
        return Ok(());
    }

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    bar.set_prefix("PDF engine");
    bar.enable_steady_tick(Duration::from_millis(80));

    let path = pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
        if let Some(t) = total {
            if bar.length() != Some(t) {
                bar.set_length(t);
            }
        }
        bar.set_position(downloaded);
    }))
    .context("Failed to download PDFium engine")?;

    bar.finish_with_message("ready ✓");
    tracing::info!("PDFium library: {}", path.display());
    Ok(())
}
