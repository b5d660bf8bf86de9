use reqwest::multipart;

use crate::api::error::ApiError;
use crate::api::types::{ModelsResponse, PreviewData, PreviewResponse, UploadResponse};
use crate::config::Config;
use crate::state::data::{ModelDescriptor, SegmentationResult, SelectedFile};

/// HTTP client for the segmentation backend.
///
/// Cheap to clone; the inner reqwest client is reference-counted, so
/// every async task can take its own copy.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client from the resolved configuration. The timeout covers
    /// each request end to end, including the segmentation run itself.
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(ApiClient {
            http,
            base_url: config.api_base_url.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Fetch the list of available segmentation models.
    pub async fn fetch_models(&self) -> Result<Vec<ModelDescriptor>, ApiError> {
        let response = self
            .http
            .get(self.endpoint("/api/models"))
            .send()
            .await?
            .error_for_status()?;
        let body: ModelsResponse = response.json().await?;
        Ok(body.models)
    }

    /// Ask the backend to render per-channel previews for one file.
    pub async fn render_preview(&self, file: &SelectedFile) -> Result<PreviewData, ApiError> {
        let response = self
            .http
            .post(self.endpoint("/api/preview"))
            .multipart(file_form(file))
            .send()
            .await?
            .error_for_status()?;
        let body: PreviewResponse = response.json().await?;
        if !body.success {
            let message = body
                .error
                .unwrap_or_else(|| "Preview generation failed".to_string());
            return Err(ApiError::Backend(message));
        }
        Ok(PreviewData {
            channels: body.previews,
            shape: body.shape,
        })
    }

    /// Submit one file for segmentation with the given model.
    pub async fn process_image(
        &self,
        file: &SelectedFile,
        model_id: &str,
    ) -> Result<SegmentationResult, ApiError> {
        let response = self
            .http
            .post(self.endpoint("/api/upload"))
            .query(&[("model_type", model_id)])
            .multipart(file_form(file))
            .send()
            .await?
            .error_for_status()?;
        let body: UploadResponse = response.json().await?;
        if !body.success {
            let message = body.error.unwrap_or_else(|| "Upload failed".to_string());
            return Err(ApiError::Backend(message));
        }
        let prediction = body.prediction.ok_or_else(|| {
            ApiError::MalformedResponse("successful upload with no prediction".to_string())
        })?;
        Ok(prediction.into_result(file.name.clone()))
    }
}

/// Wrap a file as the `file` field of a multipart form. The filename must
/// travel with the bytes: the backend picks its loader by extension.
fn file_form(file: &SelectedFile) -> multipart::Form {
    let part = multipart::Part::bytes(file.bytes.clone()).file_name(file.name.clone());
    multipart::Form::new().part("file", part)
}
