//! Recipe images on disk under `<media_root>/uploads/recipe/`.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use image::ImageReader;
use std::io::{self, Cursor};
use std::path::Path;
use uuid::Uuid;

use tracing::debug;

use super::{ApiError, ApiPath, SharedState};

/// Directory (relative to the media root) holding recipe images.
pub const UPLOAD_DIR: &str = "uploads/recipe";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
    Bmp,
}

impl ImageFormat {
    /// Identifies the format from the leading magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else if bytes.len() >= 14 && bytes.starts_with(b"BM") {
            Some(Self::Bmp)
        } else {
            None
        }
    }

    /// Sniffs the format and decodes the whole image. Truncated or
    /// corrupt data behind valid magic bytes is `None`.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let format = Self::sniff(bytes)?;
        let mut reader = ImageReader::new(Cursor::new(bytes));
        reader.set_format(format.into());
        match reader.decode() {
            Ok(_) => Some(format),
            Err(e) => {
                debug!(error = %e, ?format, "image failed to decode");
                None
            }
        }
    }

    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => ".png",
            Self::Jpeg => ".jpg",
            Self::Gif => ".gif",
            Self::Webp => ".webp",
            Self::Bmp => ".bmp",
        }
    }

    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Bmp => "image/bmp",
        }
    }
}

impl From<ImageFormat> for image::ImageFormat {
    fn from(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Gif => image::ImageFormat::Gif,
            ImageFormat::Webp => image::ImageFormat::WebP,
            ImageFormat::Bmp => image::ImageFormat::Bmp,
        }
    }
}

/// `<uuid-v4><ext>`, where `ext` is the lowercased extension of the
/// uploaded name, or the sniffed format's when the name has none.
pub fn image_file_name(original: Option<&str>, format: ImageFormat) -> String {
    let ext = original
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.bytes().all(|b| b.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_else(|| format.extension().to_string());
    format!("{}{}", Uuid::new_v4(), ext)
}

/// Writes the image and returns its path relative to the media root.
pub async fn store_image(
    media_root: &Path,
    original: Option<&str>,
    format: ImageFormat,
    bytes: &[u8],
) -> io::Result<String> {
    let dir = media_root.join(UPLOAD_DIR);
    tokio::fs::create_dir_all(&dir).await?;
    let file_name = image_file_name(original, format);
    tokio::fs::write(dir.join(&file_name), bytes).await?;
    Ok(format!("{UPLOAD_DIR}/{file_name}"))
}

/// Public URL path of a stored image.
pub fn media_url(relative: &str) -> String {
    format!("/media/{relative}")
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_'))
}

pub async fn serve_image(
    State(state): State<SharedState>,
    ApiPath(file): ApiPath<String>,
) -> Result<Response, ApiError> {
    if !is_plain_file_name(&file) {
        return Err(ApiError::NotFound);
    }
    let path = state.config.media_root.join(UPLOAD_DIR).join(&file);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ApiError::NotFound),
        Err(e) => return Err(e.into()),
    };
    let content_type = ImageFormat::sniff(&bytes)
        .map(ImageFormat::content_type)
        .unwrap_or("application/octet-stream");
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}
