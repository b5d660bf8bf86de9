/// Shared data structures for the upload workflow
///
/// These structs represent the data model that flows between
/// the backend client, the workflow controller, and the UI layer.
use base64::Engine;
use serde::Deserialize;
use std::fmt;

/// File extensions the backend knows how to load
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["tif", "tiff", "npy"];

/// A file the user picked for processing, held fully in memory
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFile {
    /// Filename only (e.g., "cells_01.tif")
    pub name: String,
    /// Raw file contents, sent verbatim to the backend
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: String, bytes: Vec<u8>) -> Self {
        SelectedFile { name, bytes }
    }

    /// Lowercased filename extension, if there is one
    pub fn extension(&self) -> Option<String> {
        let (_, ext) = self.name.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext.to_ascii_lowercase())
        }
    }

    /// Whether the backend can load this file, judged by extension alone
    pub fn is_supported(&self) -> bool {
        self.extension()
            .map_or(false, |ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
    }
}

/// A segmentation model the backend offers
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    /// Stable identifier sent with upload requests
    pub id: String,
    /// Human-readable name shown in the picker
    pub name: String,
}

impl ModelDescriptor {
    /// The built-in default, used until (or instead of) a fetched list
    pub fn fallback() -> Self {
        ModelDescriptor {
            id: "cellpose".to_string(),
            name: "Cellpose".to_string(),
        }
    }
}

impl fmt::Display for ModelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// One rendered channel of a multi-channel image
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ChannelPreview {
    /// Channel index within the source image
    pub channel: u32,
    /// Inline `data:image/png;base64,...` payload from the backend
    pub preview: String,
}

impl ChannelPreview {
    /// Decode the inline payload into PNG bytes
    pub fn png_bytes(&self) -> Option<Vec<u8>> {
        decode_data_url(&self.preview)
    }
}

/// Preview state for one selected file
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewEntry {
    pub name: String,
    /// Empty when the preview request failed; the file stays in the list
    /// so selection and preview counts always match
    pub channels: Vec<ChannelPreview>,
    /// Source array dimensions as reported by the backend
    pub shape: Option<Vec<u64>>,
}

impl PreviewEntry {
    pub fn ready(name: String, channels: Vec<ChannelPreview>, shape: Option<Vec<u64>>) -> Self {
        PreviewEntry {
            name,
            channels,
            shape,
        }
    }

    /// Entry for a file whose preview request failed
    pub fn unavailable(name: String) -> Self {
        PreviewEntry {
            name,
            channels: Vec::new(),
            shape: None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.channels.is_empty()
    }

    /// Caption like "2 × 512 × 512", or None when the shape is unknown
    pub fn shape_label(&self) -> Option<String> {
        self.shape.as_ref().map(|dims| {
            dims.iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(" × ")
        })
    }
}

/// Outcome of one successfully segmented file
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationResult {
    /// Name of the file this result belongs to
    pub filename: String,
    /// Model name as reported by the backend
    pub model_name: String,
    /// Number of detected cells
    pub num_cells: u32,
    /// Backend-formatted duration, e.g. "3.21s" or "N/A"
    pub processing_time: String,
    /// Inline mask image, when the backend rendered one
    pub mask_preview: Option<String>,
}

impl SegmentationResult {
    /// Decode the inline mask payload into PNG bytes
    pub fn mask_bytes(&self) -> Option<Vec<u8>> {
        self.mask_preview.as_deref().and_then(decode_data_url)
    }
}

/// Decode a `data:<mime>;base64,<payload>` string, or a bare base64
/// string, into bytes.
pub fn decode_data_url(data: &str) -> Option<Vec<u8>> {
    let encoded = data.split_once(',').map(|(_, e)| e).unwrap_or(data);
    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()
}
