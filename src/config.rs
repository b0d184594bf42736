//! Configuration for the conversion server.
//!
//! All runtime knobs live in [`ServerConfig`], built via its
//! [`ServerConfigBuilder`]. The server binary fills the builder from CLI
//! flags and environment variables; library users and tests set only the
//! fields they care about and rely on the defaults for the rest.

use crate::error::Pdf2PngError;
use crate::pipeline::render::Zoom;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default base URL of the Markdown parsing service.
pub const DEFAULT_PARSER_BASE_URL: &str = "https://api.cloud.llamaindex.ai";

/// Lower bound for the parsing-job status poll interval.
pub const MIN_POLL_INTERVAL_MS: u64 = 10;

/// Configuration for the conversion server.
///
/// # Example
/// ```rust
/// use pdf2png_api::ServerConfig;
///
/// let config = ServerConfig::builder()
///     .port(9000)
///     .parser_api_key("llx-test")
///     .build()
///     .unwrap();
/// assert_eq!(config.bind_addr().port(), 9000);
/// ```
#[derive(Clone)]
pub struct ServerConfig {
    /// Interface to bind. Default: `0.0.0.0`.
    pub host: IpAddr,

    /// TCP port to bind. Default: 8000.
    pub port: u16,

    /// Zoom used when a request omits `zoom`. Default: 2.
    pub default_zoom: u32,

    /// Timeout for downloading the source PDF, in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Timeout for rasterising a whole document, in seconds. Default: 120.
    pub render_timeout_secs: u64,

    /// Timeout for a whole parsing job (upload + polling + result), in seconds. Default: 600.
    pub extraction_timeout_secs: u64,

    /// Delay between two parsing-job status checks, in milliseconds. Default: 1000.
    pub poll_interval_ms: u64,

    /// Base URL of the Markdown parsing service.
    pub parser_base_url: String,

    /// API key for the Markdown parsing service. Required.
    pub parser_api_key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
            default_zoom: 2,
            download_timeout_secs: 120,
            render_timeout_secs: 120,
            extraction_timeout_secs: 600,
            poll_interval_ms: 1000,
            parser_base_url: DEFAULT_PARSER_BASE_URL.to_string(),
            parser_api_key: String::new(),
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("default_zoom", &self.default_zoom)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("extraction_timeout_secs", &self.extraction_timeout_secs)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("parser_base_url", &self.parser_base_url)
            .field("parser_api_key", &"<redacted>")
            .finish()
    }
}

impl ServerConfig {
    /// Create a new builder for `ServerConfig`.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn host(mut self, host: IpAddr) -> Self {
        self.config.host = host;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn default_zoom(mut self, zoom: u32) -> Self {
        self.config.default_zoom = zoom;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs;
        self
    }

    pub fn extraction_timeout_secs(mut self, secs: u64) -> Self {
        self.config.extraction_timeout_secs = secs;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn parser_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.parser_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn parser_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.parser_api_key = key.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServerConfig, Pdf2PngError> {
        let c = &self.config;
        if c.parser_api_key.trim().is_empty() {
            return Err(Pdf2PngError::InvalidConfig(
                "parsing service API key is not set (LLAMA_CLOUD_API_KEY)".into(),
            ));
        }
        if Zoom::new(i64::from(c.default_zoom)).is_err() {
            return Err(Pdf2PngError::InvalidConfig(format!(
                "default zoom must be {}–{}, got {}",
                Zoom::MIN,
                Zoom::MAX,
                c.default_zoom
            )));
        }
        for (name, secs) in [
            ("download timeout", c.download_timeout_secs),
            ("render timeout", c.render_timeout_secs),
            ("extraction timeout", c.extraction_timeout_secs),
        ] {
            if secs == 0 {
                return Err(Pdf2PngError::InvalidConfig(format!(
                    "{name} must be ≥ 1 second"
                )));
            }
        }
        if c.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            return Err(Pdf2PngError::InvalidConfig(format!(
                "poll interval must be ≥ {MIN_POLL_INTERVAL_MS} ms, got {}",
                c.poll_interval_ms
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr().to_string(), "0.0.0.0:8000");
        assert_eq!(c.default_zoom, 2);
        assert_eq!(c.parser_base_url, DEFAULT_PARSER_BASE_URL);
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let err = ServerConfig::builder().build().unwrap_err();
        assert!(err.to_string().contains("LLAMA_CLOUD_API_KEY"), "got: {err}");
    }

    #[test]
    fn default_zoom_out_of_range_is_rejected() {
        let err = ServerConfig::builder()
            .parser_api_key("k")
            .default_zoom(11)
            .build()
            .unwrap_err();
        assert!(matches!(err, Pdf2PngError::InvalidConfig(_)));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = ServerConfig::builder()
            .parser_api_key("k")
            .render_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("render timeout"));
    }

    #[test]
    fn poll_interval_below_minimum_is_rejected() {
        let err = ServerConfig::builder()
            .parser_api_key("k")
            .poll_interval_ms(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Pdf2PngError::InvalidConfig(_)));
        assert!(err.to_string().contains("poll interval"), "got: {err}");

        let c = ServerConfig::builder()
            .parser_api_key("k")
            .poll_interval_ms(MIN_POLL_INTERVAL_MS)
            .build()
            .unwrap();
        assert_eq!(c.poll_interval(), Duration::from_millis(MIN_POLL_INTERVAL_MS));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let c = ServerConfig::builder()
            .parser_api_key("k")
            .parser_base_url("http://127.0.0.1:9999/")
            .build()
            .unwrap();
        assert_eq!(c.parser_base_url, "http://127.0.0.1:9999");
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = ServerConfig::builder()
            .parser_api_key("llx-secret")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("llx-secret"));
    }
}
