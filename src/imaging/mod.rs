//! Image codec domain: public API.
//!
//! Turns a locally selected photo or a catalog reference image into an
//! [`InlineImage`]: raw bytes plus a MIME type, ready to be embedded in a
//! request body or written back to disk.
//!
//! External code should only use the items exported here.

mod local;
mod remote;

pub use local::encode_local_file;
pub use remote::encode_remote_image;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A self-contained image: bytes and the MIME type describing them.
#[derive(Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

// Bytes are elided so a stray `{:?}` never dumps a whole photo into the log.
impl std::fmt::Debug for InlineImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlineImage")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

impl InlineImage {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Base64 payload as sent in `inlineData.data`.
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.data)
    }

    /// `data:<mime>;base64,<payload>` form.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    /// Parse a `data:` URL. Only base64 payloads are accepted.
    pub fn from_data_url(url: &str) -> Result<Self, CodecError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| CodecError::InvalidDataUrl("missing data: prefix".to_string()))?;
        let (meta, payload) = rest
            .split_once(',')
            .ok_or_else(|| CodecError::InvalidDataUrl("missing payload separator".to_string()))?;
        let mime_type = meta
            .strip_suffix(";base64")
            .ok_or_else(|| CodecError::InvalidDataUrl("payload is not base64".to_string()))?;
        if !mime_type.starts_with("image/") {
            return Err(CodecError::NotAnImage(mime_type.to_string()));
        }
        let data = BASE64
            .decode(payload.trim().as_bytes())
            .map_err(|e| CodecError::InvalidDataUrl(e.to_string()))?;
        Ok(Self::new(mime_type, data))
    }

    /// Decode from a base64 payload with a known MIME type.
    pub fn from_base64(mime_type: impl Into<String>, payload: &str) -> Result<Self, CodecError> {
        let data = BASE64
            .decode(payload.trim().as_bytes())
            .map_err(|e| CodecError::InvalidDataUrl(e.to_string()))?;
        Ok(Self::new(mime_type, data))
    }

    /// File extension matching the MIME type, for writing results to disk.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }
}

/// Failures of the codec adapter.
///
/// `Read`/`Decode` are the upload-side read errors; `Fetch`/`FetchStatus`
/// are the reference-image fetch errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a readable image: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("fetching {url} returned HTTP {status}")]
    FetchStatus { url: String, status: u16 },

    #[error("content type {0} is not an image")]
    NotAnImage(String),

    #[error("invalid data URL: {0}")]
    InvalidDataUrl(String),
}

impl CodecError {
    /// True for failures reading the user's own file.
    pub fn is_read_error(&self) -> bool {
        matches!(self, Self::Read { .. } | Self::Decode { .. })
    }

    /// True for failures retrieving a remote reference image.
    pub fn is_fetch_error(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::FetchStatus { .. })
    }
}

/// Detect the MIME type of image bytes from their magic number.
pub fn sniff_mime(data: &[u8]) -> Option<&'static str> {
    let format = image::guess_format(data).ok()?;
    Some(format.to_mime_type())
}

/// Where the wizard gets its images from.
///
/// [`ImageCodec`] is the production implementation; tests substitute their own.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Encode a photo the user picked from disk.
    async fn encode_local_file(&self, path: &Path) -> Result<InlineImage, CodecError>;

    /// Encode a catalog reference image (URL, data URL or asset path).
    async fn encode_reference(&self, location: &str) -> Result<InlineImage, CodecError>;
}

/// Real codec: local reads from disk, remote fetches over HTTP.
pub struct ImageCodec {
    http: reqwest::Client,
    assets_dir: PathBuf,
}

impl ImageCodec {
    pub fn new(assets_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("[CODEC] HTTP client builder failed ({}), using defaults", e);
                reqwest::Client::new()
            });
        Self {
            http,
            assets_dir: assets_dir.into(),
        }
    }

    /// Resolve an asset path against the assets directory.
    ///
    /// Catalog entries use web-style paths (`/images/hoodie.png`), so a
    /// leading slash is relative to the assets dir unless the absolute
    /// path actually exists.
    fn asset_path(&self, location: &str) -> PathBuf {
        let as_given = Path::new(location);
        if as_given.is_absolute() && as_given.exists() {
            return as_given.to_path_buf();
        }
        self.assets_dir.join(location.trim_start_matches('/'))
    }
}

#[async_trait]
impl ImageSource for ImageCodec {
    async fn encode_local_file(&self, path: &Path) -> Result<InlineImage, CodecError> {
        encode_local_file(path).await
    }

    async fn encode_reference(&self, location: &str) -> Result<InlineImage, CodecError> {
        let location = location.trim();
        if location.starts_with("http://") || location.starts_with("https://") {
            return encode_remote_image(&self.http, location).await;
        }
        if location.starts_with("data:") {
            return InlineImage::from_data_url(location);
        }
        encode_local_file(&self.asset_path(location)).await
    }
}
