use crate::error::AnalysisError;
use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha256};
use std::path::Path;

/// A photo selected for analysis, validated to carry an `image/*` MIME type.
#[derive(Debug, Clone)]
pub struct ImageInput {
    bytes: Vec<u8>,
    mime_type: String,
}

impl ImageInput {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Result<Self, AnalysisError> {
        let mime_type = mime_type.into().trim().to_ascii_lowercase();
        if !mime_type.starts_with("image/") {
            return Err(AnalysisError::Precondition(
                "Please select a valid image file (JPG, PNG, WebP)".to_string(),
            ));
        }
        if bytes.is_empty() {
            return Err(AnalysisError::Precondition("image file is empty".to_string()));
        }

        Ok(Self { bytes, mime_type })
    }

    pub fn from_path(path: &Path) -> Result<Self, AnalysisError> {
        let mime_type = guess_mime_type(path).ok_or_else(|| {
            AnalysisError::Precondition(format!(
                "Please select a valid image file (JPG, PNG, WebP): {}",
                path.display()
            ))
        })?;
        let bytes = std::fs::read(path)?;
        Self::new(bytes, mime_type)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64())
    }

    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        format!("{:x}", hasher.finalize())
    }
}

pub fn guess_mime_type(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "tif" | "tiff" => "image/tiff",
        _ => return None,
    };
    Some(mime)
}
