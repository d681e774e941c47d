//! Image attachments and their inline wire form.

use std::fmt;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::llm::error::ExchangeError;

/// Message shown when the attachment is not an image.
pub const NOT_AN_IMAGE_MESSAGE: &str = "Please select an image file";

/// Raw image bytes with their declared media type.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    media_type: String,
    bytes: Vec<u8>,
}

impl ImageAttachment {
    /// Validate and wrap image bytes.
    ///
    /// # Errors
    /// Returns [`ExchangeError::Validation`] when the media type is not `image/*`,
    /// when `bytes` is empty, or when it exceeds `max_bytes`.
    pub fn new(
        media_type: impl Into<String>,
        bytes: Vec<u8>,
        max_bytes: usize,
    ) -> Result<Self, ExchangeError> {
        let media_type = media_type.into().trim().to_ascii_lowercase();
        let is_image = media_type
            .strip_prefix("image/")
            .is_some_and(|subtype| !subtype.is_empty());
        if !is_image {
            return Err(ExchangeError::Validation(NOT_AN_IMAGE_MESSAGE.to_string()));
        }
        if bytes.is_empty() {
            return Err(ExchangeError::Validation("Image file is empty".to_string()));
        }
        if bytes.len() > max_bytes {
            return Err(ExchangeError::Validation(format!(
                "Image is too large ({} bytes, limit {max_bytes})",
                bytes.len()
            )));
        }

        Ok(Self { media_type, bytes })
    }

    /// Read an image from disk, inferring the media type from the extension.
    ///
    /// # Errors
    /// Returns [`ExchangeError::Validation`] if the extension is not a known image
    /// type, the file cannot be read, or [`Self::new`] rejects it.
    pub async fn from_path(
        path: impl AsRef<Path>,
        max_bytes: usize,
    ) -> Result<Self, ExchangeError> {
        let path = path.as_ref();
        let media_type = media_type_for_path(path)
            .ok_or_else(|| ExchangeError::Validation(NOT_AN_IMAGE_MESSAGE.to_string()))?;
        let bytes = tokio::fs::read(path).await.map_err(|err| {
            ExchangeError::Validation(format!("Could not read {}: {err}", path.display()))
        })?;
        Self::new(media_type, bytes, max_bytes)
    }

    /// Declared media type, lowercased.
    #[must_use]
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Raw bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false for a validated attachment.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Base64 transcoding for transmission.
    #[must_use]
    pub fn to_inline_payload(&self) -> InlinePayload {
        InlinePayload {
            mime_type: self.media_type.clone(),
            data: STANDARD.encode(&self.bytes),
        }
    }
}

impl fmt::Debug for ImageAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAttachment")
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Base64-encoded bytes tagged with their media type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlinePayload {
    /// Media type, e.g. `image/png`.
    pub mime_type: String,
    /// Standard base64 with padding.
    pub data: String,
}

fn media_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let media_type = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "bmp" => "image/bmp",
        _ => return None,
    };
    Some(media_type)
}
