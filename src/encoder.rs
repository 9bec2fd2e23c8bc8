//! Image encoding.
//!
//! Turns a user-selected file into an [`ImageAsset`]: a `data:` URI holding
//! the file's bytes as base64, plus the MIME type and payload sliced out of
//! that URI.

use std::path::Path;

use base64::{engine::general_purpose, Engine as _};
use image::ImageFormat;
use serde::Serialize;

use crate::error::EncodeError;

const OCTET_STREAM: &str = "application/octet-stream";

/// A file as handed over by the picker: raw bytes plus the reported type.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), content_type, bytes }
    }

    /// Read a file from disk in one go. There is no reported content type,
    /// so the MIME type is sniffed from the bytes at encode time.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, EncodeError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| EncodeError::Read { path: path.to_path_buf(), source })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self { name, content_type: None, bytes })
    }
}

/// An encoded image, immutable once built.
///
/// `mime_type` and `base64_payload` are always the pieces of `data_uri`
/// between `:` and `;` and after the first `,` respectively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageAsset {
    data_uri: String,
    mime_type: String,
    #[serde(skip)]
    base64_payload: String,
}

impl ImageAsset {
    /// Parse a `data:<mime>;base64,<payload>` URI.
    pub fn from_data_uri(data_uri: impl Into<String>) -> Result<Self, EncodeError> {
        let data_uri = data_uri.into();

        let (header, payload) = data_uri
            .split_once(',')
            .ok_or_else(|| EncodeError::MalformedDataUri("missing ','".to_string()))?;
        let mime_type = header
            .split_once(':')
            .and_then(|(_, rest)| rest.split(';').next())
            .ok_or_else(|| EncodeError::MalformedDataUri("missing ':' in header".to_string()))?
            .to_string();
        if !header.contains(";base64") {
            return Err(EncodeError::MalformedDataUri("payload is not base64".to_string()));
        }
        let base64_payload = payload.to_string();

        Ok(Self { data_uri, mime_type, base64_payload })
    }

    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn base64_payload(&self) -> &str {
        &self.base64_payload
    }

    /// Decode the payload back into the original bytes.
    pub fn decode(&self) -> Result<Vec<u8>, EncodeError> {
        Ok(general_purpose::STANDARD.decode(&self.base64_payload)?)
    }
}

/// Encode a picked file. `None` (the picker was cancelled) yields `None`.
pub fn encode(file: Option<SelectedFile>) -> Option<ImageAsset> {
    let file = file?;
    let mime_type = resolve_mime_type(file.content_type.as_deref(), &file.bytes);
    let payload = general_purpose::STANDARD.encode(&file.bytes);

    tracing::debug!(
        name = %file.name,
        mime_type = %mime_type,
        bytes = file.bytes.len(),
        "Encoded image"
    );

    let data_uri = format!("data:{mime_type};base64,{payload}");
    Some(ImageAsset { data_uri, mime_type, base64_payload: payload })
}

/// Prefer the reported type; sniff the bytes when it is missing or generic.
fn resolve_mime_type(reported: Option<&str>, bytes: &[u8]) -> String {
    let reported = reported
        .and_then(|t| t.split(';').next())
        .map(str::trim)
        .filter(|t| !t.is_empty() && !t.contains(',') && *t != OCTET_STREAM);

    match reported {
        Some(t) => t.to_ascii_lowercase(),
        None => sniff_mime_type(bytes).to_string(),
    }
}

fn sniff_mime_type(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        Ok(ImageFormat::Gif) => "image/gif",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Bmp) => "image/bmp",
        Ok(ImageFormat::Tiff) => "image/tiff",
        Ok(ImageFormat::Ico) => "image/x-icon",
        Ok(ImageFormat::Avif) => "image/avif",
        _ => OCTET_STREAM,
    }
}
