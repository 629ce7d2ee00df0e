//! Local photo encoding.

use super::{CodecError, InlineImage};
use std::path::Path;

/// Read a photo from disk and return it as an [`InlineImage`].
///
/// The bytes are decoded once to make sure they really are an image; the
/// original bytes (not a re-encode) are what get returned.
pub async fn encode_local_file(path: &Path) -> Result<InlineImage, CodecError> {
    let start = std::time::Instant::now();

    let data = tokio::fs::read(path).await.map_err(|source| CodecError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let format = image::guess_format(&data).map_err(|source| CodecError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    // Full decode is CPU-bound; keep it off the async workers.
    let probe = data.clone();
    let decoded = tokio::task::spawn_blocking(move || {
        image::load_from_memory_with_format(&probe, format).map(|img| (img.width(), img.height()))
    })
    .await
    .map_err(|e| CodecError::Read {
        path: path.to_path_buf(),
        source: std::io::Error::other(e.to_string()),
    })?;

    let (width, height) = decoded.map_err(|source| CodecError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    log::info!(
        "[CODEC] Encoded {} ({}x{}, {} bytes, {}) in {}ms",
        path.display(),
        width,
        height,
        data.len(),
        format.to_mime_type(),
        start.elapsed().as_millis()
    );

    Ok(InlineImage::new(format.to_mime_type(), data))
}
