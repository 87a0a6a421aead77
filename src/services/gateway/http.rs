use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde_json::Value;

use super::{validate_upload, Gateway};
use crate::config::{endpoints, GatewayConfig};
use crate::error::GatewayError;
use crate::models::analysis_types::{AnalysisMethod, AvailableModel, CroppedImage, SourceFile};
use crate::models::gateway_types::{RawAnalysis, WeightsResponse};
use crate::services::normalizer;

const DEFAULT_CROP_MIME: &str = "image/png";

#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    config: GatewayConfig,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        config.validate()?;
        Ok(Self {
            client: Client::new(),
            config,
        })
    }

    fn file_part(file: &SourceFile) -> Result<Part, GatewayError> {
        Part::bytes(file.bytes.to_vec())
            .file_name(file.name.clone())
            .mime_str(&file.mime)
            .map_err(|e| GatewayError::Validation(format!("Invalid MIME type {}: {}", file.mime, e)))
    }

    fn analysis_form(&self, file: &SourceFile, crop_face_first: bool) -> Result<Form, GatewayError> {
        Ok(Form::new()
            .part("file", Self::file_part(file)?)
            .text("device", self.config.device.clone())
            .text("recortar_cara", crop_face_first.to_string()))
    }

    async fn post_form(&self, path: &str, form: Form) -> Result<Response, GatewayError> {
        let url = self.config.endpoint(path);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;
        check_status(response).await
    }

    async fn post_analysis(&self, path: &str, form: Form) -> Result<RawAnalysis, GatewayError> {
        let response = self.post_form(path, form).await?;
        let body: Value = response.json().await.map_err(|e| {
            GatewayError::Processing(format!("Invalid JSON from {}: {}", path, e))
        })?;
        normalizer::resolve_shape(body)
    }
}

fn transport_error(url: &str, err: reqwest::Error) -> GatewayError {
    log::warn!("Request to {} failed: {}", url, err);
    GatewayError::Transport(format!("{}: {}", url, err))
}

/// Maps a failure status and its body onto the error taxonomy.
pub fn failure_from_body(status: u16, body: &str) -> GatewayError {
    let body = body.trim();
    if body.is_empty() {
        return GatewayError::Transport(format!("HTTP {} with an empty body", status));
    }

    // FastAPI reports failures as {"detail": ...}; other stacks use error/message.
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            ["detail", "error", "message"]
                .iter()
                .find_map(|key| value.get(*key).cloned())
        })
        .map(|field| match field {
            Value::String(text) => text,
            other => other.to_string(),
        })
        .unwrap_or_else(|| body.to_string());

    GatewayError::Server { status, message }
}

async fn check_status(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let err = failure_from_body(status.as_u16(), &body);
    log::warn!("Gateway answered {}: {}", status, err);
    Err(err)
}

impl Gateway for HttpGateway {
    async fn submit_single_model_analysis(
        &self,
        file: &SourceFile,
        method: AnalysisMethod,
        model_id: Option<&str>,
        crop_face_first: bool,
    ) -> Result<RawAnalysis, GatewayError> {
        validate_upload(file)?;

        let (path, form) = match method {
            AnalysisMethod::Huggingface => {
                (endpoints::HUGGINGFACE, self.analysis_form(file, crop_face_first)?)
            }
            AnalysisMethod::Xception => {
                let model_id = model_id.filter(|id| !id.trim().is_empty()).ok_or_else(|| {
                    GatewayError::Validation("A model must be selected for Xception".to_string())
                })?;
                let form = self
                    .analysis_form(file, crop_face_first)?
                    .text("model_name", model_id.to_string());
                (endpoints::XCEPTION_DETECT, form)
            }
            AnalysisMethod::Ensemble => {
                return Err(GatewayError::Validation(
                    "Ensemble analysis uses its own endpoint".to_string(),
                ));
            }
        };

        log::info!(
            "Submitting {} ({} bytes) to {} [model: {:?}, crop: {}]",
            file.name,
            file.size(),
            path,
            model_id,
            crop_face_first
        );
        self.post_analysis(path, form).await
    }

    async fn submit_ensemble_analysis(
        &self,
        file: &SourceFile,
        crop_face_first: bool,
    ) -> Result<RawAnalysis, GatewayError> {
        validate_upload(file)?;
        let form = self.analysis_form(file, crop_face_first)?;

        log::info!(
            "Submitting {} ({} bytes) to {} [crop: {}]",
            file.name,
            file.size(),
            endpoints::ENSEMBLE_DETECT,
            crop_face_first
        );
        self.post_analysis(endpoints::ENSEMBLE_DETECT, form).await
    }

    async fn request_face_crop(&self, file: &SourceFile) -> Result<CroppedImage, GatewayError> {
        validate_upload(file)?;
        let form = Form::new().part("file", Self::file_part(file)?);

        log::info!(
            "Requesting face crop for {} ({} bytes) from {}",
            file.name,
            file.size(),
            endpoints::CUT_FACE
        );
        let response = self.post_form(endpoints::CUT_FACE, form).await?;

        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .filter(|value| value.starts_with("image/"))
            .unwrap_or(DEFAULT_CROP_MIME)
            .to_string();

        let url = self.config.endpoint(endpoints::CUT_FACE);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(&url, e))?;

        if bytes.is_empty() {
            return Err(GatewayError::Processing(
                "No face was found in the image".to_string(),
            ));
        }

        Ok(CroppedImage {
            mime,
            bytes: bytes.to_vec(),
        })
    }

    async fn list_available_models(&self) -> Result<Vec<AvailableModel>, GatewayError> {
        let url = self.config.endpoint(endpoints::XCEPTION_WEIGHTS);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;
        let response = check_status(response).await?;

        let weights: WeightsResponse = response.json().await.map_err(|e| {
            GatewayError::Processing(format!("Invalid model list: {}", e))
        })?;

        let models: Vec<AvailableModel> = weights
            .available_models
            .into_iter()
            .map(AvailableModel::from)
            .collect();
        log::info!("Gateway lists {} model(s)", models.len());
        Ok(models)
    }

    async fn check_connectivity(&self) -> bool {
        let url = self.config.endpoint(endpoints::XCEPTION_WEIGHTS);
        match self.client.get(&url).send().await {
            Ok(response) => {
                let connected = response.status().is_success();
                log::info!("Connectivity probe {}: HTTP {}", url, response.status());
                connected
            }
            Err(e) => {
                log::warn!("Connectivity probe {} failed: {}", url, e);
                false
            }
        }
    }
}
