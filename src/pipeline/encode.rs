//! Image encoding: `DynamicImage` → PNG bytes → base64 data URL.
//!
//! PNG is lossless, so re-running a conversion on the same document and zoom
//! yields byte-identical payloads. The data URL uses the standard base64
//! alphabet with padding, which is what browsers and `<img src>` expect.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Prefix of every image payload returned by the service.
pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Encode a rasterised page as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Encoded {}x{} image → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// Wrap PNG bytes as `data:image/png;base64,<payload>`.
pub fn to_data_url(png: &[u8]) -> String {
    let mut url = String::with_capacity(PNG_DATA_URL_PREFIX.len() + png.len().div_ceil(3) * 4);
    url.push_str(PNG_DATA_URL_PREFIX);
    STANDARD.encode_string(png, &mut url);
    url
}
