//! Image encoding: `DynamicImage` → base64 PNG wrapped in `ImageData`.
//!
//! Multimodal APIs accept images as base64 payloads in the JSON request
//! body. PNG is chosen over JPEG because it is lossless — compression
//! artefacts on a rendered answer grid turn "B" into "8" often enough to
//! matter. `detail: "high"` asks GPT-4-class tiling to keep the full
//! resolution so subscripts and choice letters stay legible.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised exam page as a base64 PNG ready for the extraction
/// request.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
