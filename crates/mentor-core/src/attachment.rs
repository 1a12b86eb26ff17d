use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("failed to read attachment {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported attachment type for {0} (images and PDF only)")]
    Unsupported(String),
    #[error("malformed data URL: {0}")]
    MalformedDataUrl(String),
}

/// File content encoded for transport next to a text prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InlineAttachment {
    pub mime_type: String,
    /// Standard base64, no `data:` prefix.
    pub data: String,
}

impl InlineAttachment {
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: STANDARD.encode(bytes),
        }
    }

    /// Reads and encodes an image or PDF file. No size limit is applied.
    pub fn from_path(path: &Path) -> Result<Self, AttachmentError> {
        let mime = mime_for_path(path)
            .ok_or_else(|| AttachmentError::Unsupported(path.display().to_string()))?;
        let bytes = fs::read(path).map_err(|source| AttachmentError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_bytes(&bytes, mime))
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    pub fn from_data_url(url: &str) -> Result<Self, AttachmentError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| AttachmentError::MalformedDataUrl(preview(url)))?;
        let (meta, data) = rest
            .split_once(',')
            .ok_or_else(|| AttachmentError::MalformedDataUrl(preview(url)))?;
        let mime_type = meta
            .strip_suffix(";base64")
            .ok_or_else(|| AttachmentError::MalformedDataUrl(preview(url)))?;
        if mime_type.is_empty() {
            return Err(AttachmentError::MalformedDataUrl(preview(url)));
        }
        Ok(Self {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Decoded payload size in bytes.
    pub fn byte_len(&self) -> usize {
        let padding = self.data.bytes().rev().take_while(|b| *b == b'=').count();
        ((self.data.len() / 4) * 3).saturating_sub(padding.min(2))
    }
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "pdf" => "application/pdf",
        _ => return None,
    };
    Some(mime)
}

fn preview(url: &str) -> String {
    url.chars().take(32).collect()
}
