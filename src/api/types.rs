use serde::Deserialize;

use crate::state::data::{ChannelPreview, ModelDescriptor, SegmentationResult};

/// Body of `GET /api/models`
#[derive(Deserialize, Debug, Clone)]
pub struct ModelsResponse {
    pub models: Vec<ModelDescriptor>,
}

/// Body of `POST /api/preview`
///
/// On failure the backend sends only `success` and `error`, so every
/// other field needs a default.
#[derive(Deserialize, Debug, Clone)]
pub struct PreviewResponse {
    pub success: bool,
    #[serde(default)]
    pub previews: Vec<ChannelPreview>,
    #[serde(default)]
    pub shape: Option<Vec<u64>>,
    #[serde(default)]
    pub error: Option<String>,
}

/// The preview data extracted from a successful response
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewData {
    pub channels: Vec<ChannelPreview>,
    pub shape: Option<Vec<u64>>,
}

/// Body of `POST /api/upload`
#[derive(Deserialize, Debug, Clone)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(default)]
    pub prediction: Option<Prediction>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Segmentation outcome nested inside a successful upload response
#[derive(Deserialize, Debug, Clone)]
pub struct Prediction {
    pub model_name: String,
    pub num_cells: u32,
    pub processing_time: String,
    #[serde(default)]
    pub mask_preview: Option<String>,
}

impl Prediction {
    /// Attach the originating filename, which the backend does not echo.
    pub fn into_result(self, filename: String) -> SegmentationResult {
        SegmentationResult {
            filename,
            model_name: self.model_name,
            num_cells: self.num_cells,
            processing_time: self.processing_time,
            mask_preview: self.mask_preview,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_models_response() {
        let json = r#"{"models": [{"id": "cellpose", "name": "Cellpose"}, {"id": "unet", "name": "U-Net"}]}"#;
        let parsed: ModelsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.models.len(), 2);
        assert_eq!(parsed.models[0].id, "cellpose");
        assert_eq!(parsed.models[1].name, "U-Net");
    }

    #[test]
    fn test_parse_preview_response() {
        let json = r#"{
            "success": true,
            "previews": [
                {"channel": 0, "preview": "data:image/png;base64,AAAA"},
                {"channel": 1, "preview": "data:image/png;base64,BBBB"}
            ],
            "shape": [2, 512, 512]
        }"#;
        let parsed: PreviewResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.success);
        assert_eq!(parsed.previews.len(), 2);
        assert_eq!(parsed.previews[1].channel, 1);
        assert_eq!(parsed.shape, Some(vec![2, 512, 512]));
        assert_eq!(parsed.error, None);
    }

    #[test]
    fn test_parse_failed_preview_response() {
        let json = r#"{"success": false, "error": "Unsupported file format"}"#;
        let parsed: PreviewResponse = serde_json::from_str(json).unwrap();
        assert!(!parsed.success);
        assert!(parsed.previews.is_empty());
        assert_eq!(parsed.shape, None);
        assert_eq!(parsed.error.as_deref(), Some("Unsupported file format"));
    }

    #[test]
    fn test_parse_upload_response() {
        let json = r#"{
            "success": true,
            "prediction": {
                "model_name": "Cellpose",
                "num_cells": 42,
                "processing_time": "3.21s",
                "mask_preview": "data:image/png;base64,CCCC"
            }
        }"#;
        let parsed: UploadResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.success);
        let prediction = parsed.prediction.unwrap();
        assert_eq!(prediction.num_cells, 42);
        assert_eq!(prediction.processing_time, "3.21s");
        assert!(prediction.mask_preview.is_some());
    }

    #[test]
    fn test_parse_upload_response_without_mask() {
        let json = r#"{
            "success": true,
            "prediction": {"model_name": "Cellpose", "num_cells": 0, "processing_time": "N/A"}
        }"#;
        let parsed: UploadResponse = serde_json::from_str(json).unwrap();
        let prediction = parsed.prediction.unwrap();
        assert_eq!(prediction.num_cells, 0);
        assert_eq!(prediction.mask_preview, None);
    }

    #[test]
    fn test_parse_failed_upload_response() {
        let json = r#"{"success": false, "error": "Segmentation failed: out of memory"}"#;
        let parsed: UploadResponse = serde_json::from_str(json).unwrap();
        assert!(!parsed.success);
        assert!(parsed.prediction.is_none());
        assert_eq!(parsed.error.as_deref(), Some("Segmentation failed: out of memory"));
    }

    #[test]
    fn test_prediction_into_result_keeps_filename() {
        let prediction = Prediction {
            model_name: "Cellpose".to_string(),
            num_cells: 7,
            processing_time: "1.00s".to_string(),
            mask_preview: None,
        };
        let result = prediction.into_result("cells_01.tif".to_string());
        assert_eq!(result.filename, "cells_01.tif");
        assert_eq!(result.model_name, "Cellpose");
        assert_eq!(result.num_cells, 7);
    }
}
