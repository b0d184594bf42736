//! Markdown extraction through an external parsing service.
//!
//! This crate does not parse document layout itself. The service receives the
//! PDF as a file upload together with a fixed [`ParseProfile`], runs an
//! asynchronous job, and returns one Markdown string per source page.
//!
//! ## Job lifecycle
//!
//! ```text
//! POST /api/parsing/upload            → {id, status: PENDING}
//! GET  /api/parsing/job/{id}          → PENDING … SUCCESS | ERROR | CANCELED
//! GET  /api/parsing/job/{id}/result/json → {pages: [{page, md, text}]}
//! ```
//!
//! Polling is bounded by the extraction timeout; there is no retry on a
//! failed upload or a failed job.

use crate::error::{Pdf2PngError, Stage};
use crate::prompts::CONTENT_GUIDELINE_INSTRUCTION;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Turns a PDF on disk into Markdown, one string per page in page order.
#[async_trait]
pub trait MarkdownExtractor: Send + Sync {
    async fn extract(&self, pdf_path: &Path) -> Result<Vec<String>, Pdf2PngError>;
}

/// Options sent with every parsing job.
///
/// The default is the only profile the server uses: fresh (non-cached)
/// results, no OCR, columns kept as laid out, Markdown output with page
/// furniture suppressed by the content guideline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseProfile {
    pub premium_mode: bool,
    pub invalidate_cache: bool,
    pub do_not_cache: bool,
    pub skip_diagonal_text: bool,
    pub disable_ocr: bool,
    pub do_not_unroll_columns: bool,
    pub result_type: String,
    pub page_separator: String,
    pub language: String,
    pub content_guideline_instruction: String,
}

impl Default for ParseProfile {
    fn default() -> Self {
        Self {
            premium_mode: true,
            invalidate_cache: true,
            do_not_cache: true,
            skip_diagonal_text: true,
            disable_ocr: true,
            do_not_unroll_columns: true,
            result_type: "markdown".to_string(),
            page_separator: String::new(),
            language: "en".to_string(),
            content_guideline_instruction: CONTENT_GUIDELINE_INSTRUCTION.to_string(),
        }
    }
}

impl ParseProfile {
    /// The profile as multipart form fields.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let flag = |b: bool| (if b { "true" } else { "false" }).to_string();
        vec![
            ("premium_mode", flag(self.premium_mode)),
            ("invalidate_cache", flag(self.invalidate_cache)),
            ("do_not_cache", flag(self.do_not_cache)),
            ("skip_diagonal_text", flag(self.skip_diagonal_text)),
            ("disable_ocr", flag(self.disable_ocr)),
            ("do_not_unroll_columns", flag(self.do_not_unroll_columns)),
            ("result_type", self.result_type.clone()),
            ("page_separator", self.page_separator.clone()),
            ("language", self.language.clone()),
            (
                "content_guideline_instruction",
                self.content_guideline_instruction.clone(),
            ),
        ]
    }
}

#[derive(Debug, Deserialize)]
struct JobStatus {
    id: String,
    status: String,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobResult {
    #[serde(default)]
    pages: Vec<ParsedPage>,
}

#[derive(Debug, Deserialize)]
struct ParsedPage {
    #[serde(default)]
    page: Option<usize>,
    #[serde(default)]
    md: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// Client for the LlamaParse REST API.
#[derive(Debug, Clone)]
pub struct LlamaParseClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    profile: ParseProfile,
    timeout: Duration,
    poll_interval: Duration,
}

impl LlamaParseClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self, Pdf2PngError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("pdf2png-api/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Pdf2PngError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            profile: ParseProfile::default(),
            timeout,
            poll_interval,
        })
    }

    /// Replace the default profile.
    pub fn with_profile(mut self, profile: ParseProfile) -> Self {
        self.profile = profile;
        self
    }

    async fn upload(&self, pdf_path: &Path) -> Result<String, Pdf2PngError> {
        let bytes = tokio::fs::read(pdf_path)
            .await
            .map_err(Pdf2PngError::ScratchFile)?;
        let file_name = pdf_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")
            .map_err(|e| Pdf2PngError::Internal(e.to_string()))?;

        let form = self
            .profile
            .form_fields()
            .into_iter()
            .fold(Form::new().part("file", part), |form, (k, v)| form.text(k, v));

        let job: JobStatus = self
            .send(
                self.http
                    .post(format!("{}/api/parsing/upload", self.base_url))
                    .multipart(form),
            )
            .await?;

        info!("Parsing job {} started ({})", job.id, job.status);
        Ok(job.id)
    }

    async fn wait_for(&self, job_id: &str) -> Result<(), Pdf2PngError> {
        let started = Instant::now();
        loop {
            let job: JobStatus = self
                .send(
                    self.http
                        .get(format!("{}/api/parsing/job/{}", self.base_url, job_id)),
                )
                .await?;

            match job.status.as_str() {
                "SUCCESS" => {
                    debug!("Parsing job {} done after {:?}", job_id, started.elapsed());
                    return Ok(());
                }
                "PENDING" => sleep(self.poll_interval).await,
                other => {
                    let detail = job.error_message.unwrap_or_default();
                    warn!("Parsing job {} ended with {}: {}", job_id, other, detail);
                    return Err(Pdf2PngError::ExtractionFailed(format!(
                        "job {} finished with status {}{}{}",
                        job_id,
                        other,
                        if detail.is_empty() { "" } else { ": " },
                        detail
                    )));
                }
            }
        }
    }

    async fn fetch_pages(&self, job_id: &str) -> Result<Vec<String>, Pdf2PngError> {
        let result: JobResult = self
            .send(self.http.get(format!(
                "{}/api/parsing/job/{}/result/json",
                self.base_url, job_id
            )))
            .await?;

        let mut pages = result.pages;
        // Stable: pages without a number keep their relative order.
        pages.sort_by_key(|p| p.page.unwrap_or(usize::MAX));

        Ok(pages
            .into_iter()
            .map(|p| p.md.or(p.text).unwrap_or_default())
            .collect())
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, Pdf2PngError> {
        let response = request
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Pdf2PngError::ExtractionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Pdf2PngError::ExtractionFailed(format!(
                "parsing service returned HTTP {}: {}",
                status, body
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Pdf2PngError::ExtractionFailed(format!("unexpected response: {e}")))
    }
}

#[async_trait]
impl MarkdownExtractor for LlamaParseClient {
    async fn extract(&self, pdf_path: &Path) -> Result<Vec<String>, Pdf2PngError> {
        let job = async {
            let job_id = self.upload(pdf_path).await?;
            self.wait_for(&job_id).await?;
            self.fetch_pages(&job_id).await
        };

        tokio::time::timeout(self.timeout, job)
            .await
            .map_err(|_| Pdf2PngError::Timeout {
                stage: Stage::Extraction,
                secs: self.timeout.as_secs(),
            })?
    }
}
