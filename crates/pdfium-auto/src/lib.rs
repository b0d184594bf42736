//! # pdfium-auto
//!
//! Locate the [PDFium](https://pdfium.googlesource.com/pdfium/) shared
//! library for `pdfium-render`, downloading and caching it on first use so a
//! fresh server needs no manual `libpdfium` setup.
//!
//! ## Resolution order
//!
//! 1. `PDFIUM_LIB_PATH`, if it points at an existing file.
//! 2. The per-version cache directory (`PDFIUM_AUTO_CACHE_DIR` or the
//!    platform cache dir, e.g. `~/.cache/pdf2png/pdfium-7690/`).
//! 3. Download the platform archive from
//!    [bblanchon/pdfium-binaries](https://github.com/bblanchon/pdfium-binaries)
//!    and extract the library into the cache directory.
//!
//! The resolved path is memoised for the process lifetime, so only the
//! first call can touch the network.
//!
//! ```rust,no_run
//! let pdfium = pdfium_auto::shared_pdfium().expect("pdfium unavailable");
//! let document = pdfium.load_pdf_from_byte_slice(b"%PDF-1.4 ...", None);
//! ```

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use pdfium_render::prelude::Pdfium;
use thiserror::Error;

/// The pdfium-binaries release tag used for downloads.
pub const PDFIUM_VERSION: &str = "7690";

const RELEASE_BASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

/// Directory name under the platform cache dir.
const CACHE_NAMESPACE: &str = "pdf2png";

/// Progress sink: `(bytes_downloaded, total_bytes_if_known)`.
pub type Progress<'a> = &'a dyn Fn(u64, Option<u64>);

/// Errors returned by pdfium-auto operations.
#[derive(Error, Debug)]
pub enum PdfiumAutoError {
    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Cache directory error: {0}")]
    CacheDir(#[source] std::io::Error),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Archive extraction failed: {0}")]
    Extract(String),

    #[error("Failed to bind PDFium from '{path}': {reason}")]
    Bind { path: PathBuf, reason: String },
}

// ── Platform table ───────────────────────────────────────────────────────────

/// Release asset and library layout for one OS/arch pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub os: &'static str,
    pub arch: &'static str,
    /// Asset filename in the release, e.g. `pdfium-linux-x64.tgz`.
    pub archive: &'static str,
    /// Library filename, both inside the archive and on disk.
    pub lib_name: &'static str,
}

const PLATFORMS: &[Platform] = &[
    Platform { os: "linux", arch: "x86_64", archive: "pdfium-linux-x64.tgz", lib_name: "libpdfium.so" },
    Platform { os: "linux", arch: "aarch64", archive: "pdfium-linux-arm64.tgz", lib_name: "libpdfium.so" },
    Platform { os: "macos", arch: "aarch64", archive: "pdfium-mac-arm64.tgz", lib_name: "libpdfium.dylib" },
    Platform { os: "macos", arch: "x86_64", archive: "pdfium-mac-x64.tgz", lib_name: "libpdfium.dylib" },
    Platform { os: "windows", arch: "x86_64", archive: "pdfium-win-x64.tgz", lib_name: "pdfium.dll" },
    Platform { os: "windows", arch: "aarch64", archive: "pdfium-win-arm64.tgz", lib_name: "pdfium.dll" },
];

impl Platform {
    /// Look up an OS/arch pair (values as in `std::env::consts`).
    pub fn lookup(os: &str, arch: &str) -> Result<Platform, PdfiumAutoError> {
        PLATFORMS
            .iter()
            .find(|p| p.os == os && p.arch == arch)
            .copied()
            .ok_or_else(|| PdfiumAutoError::UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            })
    }

    /// The platform this binary runs on.
    pub fn current() -> Result<Platform, PdfiumAutoError> {
        Self::lookup(std::env::consts::OS, std::env::consts::ARCH)
    }

    pub fn download_url(&self) -> String {
        format!("{RELEASE_BASE_URL}/chromium%2F{PDFIUM_VERSION}/{}", self.archive)
    }
}

// ── Locator ──────────────────────────────────────────────────────────────────

/// Where to look for (and where to put) the library.
#[derive(Debug, Clone)]
pub struct Locator {
    /// Explicit library path; wins when the file exists.
    pub override_path: Option<PathBuf>,
    /// Per-version cache directory.
    pub cache_dir: PathBuf,
    pub platform: Platform,
}

impl Locator {
    /// Build from `PDFIUM_LIB_PATH` / `PDFIUM_AUTO_CACHE_DIR` and the current platform.
    pub fn from_env() -> Result<Self, PdfiumAutoError> {
        Ok(Self {
            override_path: std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from),
            cache_dir: pdfium_cache_dir(),
            platform: Platform::current()?,
        })
    }

    /// Cached library location, whether or not it exists yet.
    pub fn cached_lib_path(&self) -> PathBuf {
        self.cache_dir.join(self.platform.lib_name)
    }

    /// The library path if it is available without downloading.
    pub fn find(&self) -> Option<PathBuf> {
        if let Some(p) = self.override_path.as_ref().filter(|p| p.exists()) {
            return Some(p.clone());
        }
        Some(self.cached_lib_path()).filter(|p| p.exists())
    }

    /// Return the library path, downloading into the cache if needed.
    pub fn ensure(&self, on_progress: Option<Progress<'_>>) -> Result<PathBuf, PdfiumAutoError> {
        if let Some(path) = self.find() {
            return Ok(path);
        }

        std::fs::create_dir_all(&self.cache_dir).map_err(PdfiumAutoError::CacheDir)?;
        let archive = download_bytes(&self.platform.download_url(), on_progress)?;
        let dest = self.cached_lib_path();
        extract_library(&archive, self.platform.lib_name, &dest)?;
        Ok(dest)
    }
}

/// Per-version cache directory.
///
/// `PDFIUM_AUTO_CACHE_DIR` overrides the platform cache directory.
pub fn pdfium_cache_dir() -> PathBuf {
    let version_dir = format!("pdfium-{PDFIUM_VERSION}");
    if let Some(root) = std::env::var_os("PDFIUM_AUTO_CACHE_DIR") {
        return PathBuf::from(root).join(version_dir);
    }

    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_NAMESPACE)
        .join(version_dir)
}

// ── Public API ───────────────────────────────────────────────────────────────

static RESOLVED_PATH: OnceLock<PathBuf> = OnceLock::new();

/// `true` if the library is available without network access.
pub fn is_pdfium_cached() -> bool {
    cached_pdfium_path().is_some()
}

/// The on-disk library path, or `None` if it would have to be downloaded.
pub fn cached_pdfium_path() -> Option<PathBuf> {
    if let Some(path) = RESOLVED_PATH.get() {
        return Some(path.clone());
    }
    Locator::from_env().ok()?.find()
}

/// Ensure the library is on disk and return its path.
///
/// Safe to call from multiple threads; after the first success the path
/// comes from an in-process cache.
pub fn ensure_pdfium_library(
    on_progress: Option<Progress<'_>>,
) -> Result<PathBuf, PdfiumAutoError> {
    if let Some(path) = RESOLVED_PATH.get() {
        return Ok(path.clone());
    }
    let path = Locator::from_env()?.ensure(on_progress)?;
    // Two racing first calls resolve the same path; either value is fine.
    let _ = RESOLVED_PATH.set(path.clone());
    Ok(path)
}

static SHARED_PDFIUM: OnceLock<Pdfium> = OnceLock::new();
static SHARED_INIT: Mutex<()> = Mutex::new(());

/// The process-wide PDFium instance, bound on first use.
///
/// `Pdfium::new` initialises the native library and dropping a `Pdfium`
/// destroys it for every caller in the process, so servers must share one
/// instance that is never dropped. Concurrent first calls are serialised so
/// only one instance is ever created.
pub fn shared_pdfium() -> Result<&'static Pdfium, PdfiumAutoError> {
    if let Some(pdfium) = SHARED_PDFIUM.get() {
        return Ok(pdfium);
    }

    let _init = SHARED_INIT.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(pdfium) = SHARED_PDFIUM.get() {
        return Ok(pdfium);
    }
    let path = ensure_pdfium_library(None)?;
    let pdfium = bind_pdfium_from_path(&path)?;
    Ok(SHARED_PDFIUM.get_or_init(|| pdfium))
}

/// Bind to a PDFium library at an explicit `path`.
///
/// The returned instance tears the library down when dropped; prefer
/// [`shared_pdfium`] anywhere more than one binding can be alive.
pub fn bind_pdfium_from_path(path: &Path) -> Result<Pdfium, PdfiumAutoError> {
    Pdfium::bind_to_library(path)
        .map(Pdfium::new)
        .map_err(|e| PdfiumAutoError::Bind {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn download_bytes(url: &str, on_progress: Option<Progress<'_>>) -> Result<Vec<u8>, PdfiumAutoError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("pdfium-auto/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| PdfiumAutoError::Download(e.to_string()))?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| PdfiumAutoError::Download(format!("GET {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(PdfiumAutoError::Download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    let total = response.content_length();
    let mut buf = Vec::with_capacity(total.unwrap_or(0) as usize);
    let mut chunk = vec![0u8; 64 * 1024];

    loop {
        match response.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if let Some(cb) = on_progress {
                    cb(buf.len() as u64, total);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(PdfiumAutoError::Download(format!("Read error: {e}"))),
        }
    }

    Ok(buf)
}

/// Unpack the entry whose file name is `lib_name` from a `.tgz` into `dest`.
///
/// Release archives keep the library under `lib/` (unix) or `bin/` (windows);
/// matching on the file name covers both.
fn extract_library(archive: &[u8], lib_name: &str, dest: &Path) -> Result<(), PdfiumAutoError> {
    use flate2::read::GzDecoder;
    use tar::Archive;

    let mut archive = Archive::new(GzDecoder::new(archive));
    let entries = archive
        .entries()
        .map_err(|e| PdfiumAutoError::Extract(e.to_string()))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| PdfiumAutoError::Extract(e.to_string()))?;
        let is_lib = entry
            .path()
            .map_err(|e| PdfiumAutoError::Extract(e.to_string()))?
            .file_name()
            .is_some_and(|n| n == lib_name);

        if is_lib {
            entry
                .unpack(dest)
                .map_err(|e| PdfiumAutoError::Extract(format!("Unpack failed: {e}")))?;
            return Ok(());
        }
    }

    Err(PdfiumAutoError::Extract(format!(
        "Library '{lib_name}' not found in archive"
    )))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
