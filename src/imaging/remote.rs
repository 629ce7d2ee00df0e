//! Remote reference-image fetching.

use super::{sniff_mime, CodecError, InlineImage};

/// Download an image and return it as an [`InlineImage`].
///
/// The MIME type is sniffed from the bytes; the `Content-Type` header is
/// only consulted when sniffing fails, and must still name an image.
pub async fn encode_remote_image(
    http: &reqwest::Client,
    url: &str,
) -> Result<InlineImage, CodecError> {
    let start = std::time::Instant::now();

    let response = http.get(url).send().await.map_err(|e| CodecError::Fetch {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        log::error!("[CODEC] Fetch {} returned {}", url, status);
        return Err(CodecError::FetchStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let header_mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(content_type_essence);

    let data = response.bytes().await.map_err(|e| CodecError::Fetch {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let mime_type = resolve_mime(&data, header_mime.as_deref())?;

    log::info!(
        "[CODEC] Fetched {} ({} bytes, {}) in {}ms",
        url,
        data.len(),
        mime_type,
        start.elapsed().as_millis()
    );

    Ok(InlineImage::new(mime_type, data.to_vec()))
}

/// `image/png; charset=binary` → `image/png`
fn content_type_essence(raw: &str) -> String {
    raw.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

fn resolve_mime(data: &[u8], header_mime: Option<&str>) -> Result<String, CodecError> {
    if let Some(sniffed) = sniff_mime(data) {
        return Ok(sniffed.to_string());
    }
    match header_mime {
        Some(mime) if mime.starts_with("image/") => Ok(mime.to_string()),
        Some(mime) => Err(CodecError::NotAnImage(mime.to_string())),
        None => Err(CodecError::NotAnImage("unknown".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn essence_strips_parameters() {
        assert_eq!(content_type_essence("Image/PNG; charset=binary"), "image/png");
        assert_eq!(content_type_essence("image/webp"), "image/webp");
    }

    #[test]
    fn sniffed_type_wins_over_header() {
        let mime = resolve_mime(&PNG_MAGIC, Some("application/octet-stream")).unwrap();
        assert_eq!(mime, "image/png");
    }

    #[test]
    fn header_used_when_sniffing_fails() {
        let mime = resolve_mime(b"????", Some("image/avif")).unwrap();
        assert_eq!(mime, "image/avif");
    }

    #[test]
    fn html_error_page_is_rejected() {
        let err = resolve_mime(b"<html>not found</html>", Some("text/html")).unwrap_err();
        assert!(matches!(err, CodecError::NotAnImage(ref m) if m == "text/html"));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_fetch_error() {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(2))
            .build()
            .unwrap();
        // Port 9 on loopback: nothing listens there.
        let err = encode_remote_image(&http, "http://127.0.0.1:9/hoodie.png")
            .await
            .unwrap_err();
        assert!(err.is_fetch_error());
    }
}
