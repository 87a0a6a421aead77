//! Client side of the remote analysis Gateway.

pub mod http;

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::models::analysis_types::{AnalysisMethod, AvailableModel, CroppedImage, SourceFile};
use crate::models::gateway_types::RawAnalysis;

pub use http::HttpGateway;

pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
pub const ALLOWED_MIME_TYPES: &[&str] = &["image/png", "image/jpg", "image/jpeg"];

fn invalid_format() -> GatewayError {
    GatewayError::Validation("Invalid format. Only PNG, JPG and JPEG images are allowed.".to_string())
}

fn check_size(size: u64) -> Result<(), GatewayError> {
    if size > MAX_UPLOAD_BYTES {
        return Err(GatewayError::Validation(format!(
            "The file is too large ({:.1} MB). Maximum size is 10 MB.",
            size as f64 / (1024.0 * 1024.0)
        )));
    }
    Ok(())
}

/// Checks the outbound file constraints. Runs before any request is built.
pub fn validate_upload(file: &SourceFile) -> Result<(), GatewayError> {
    let mime = file.mime.trim().to_lowercase();
    if !ALLOWED_MIME_TYPES.contains(&mime.as_str()) {
        return Err(invalid_format());
    }
    check_size(file.size())
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

/// Reads a picked file from disk. Type and size are checked from the path
/// and metadata, so an oversized file is never read.
pub async fn load_upload(path: &Path) -> Result<SourceFile, GatewayError> {
    let mime = mime_for_path(path).ok_or_else(invalid_format)?;
    let unreadable =
        |e: std::io::Error| GatewayError::Validation(format!("Cannot read {}: {}", path.display(), e));

    let metadata = tokio::fs::metadata(path).await.map_err(unreadable)?;
    if !metadata.is_file() {
        return Err(GatewayError::Validation(format!("{} is not a file", path.display())));
    }
    check_size(metadata.len())?;

    let bytes = tokio::fs::read(path).await.map_err(unreadable)?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(SourceFile::new(name, mime, bytes))
}

/// Operations offered by the Gateway. Each call is one network round trip.
pub trait Gateway: Send + Sync {
    fn submit_single_model_analysis(
        &self,
        file: &SourceFile,
        method: AnalysisMethod,
        model_id: Option<&str>,
        crop_face_first: bool,
    ) -> impl Future<Output = Result<RawAnalysis, GatewayError>> + Send;

    fn submit_ensemble_analysis(
        &self,
        file: &SourceFile,
        crop_face_first: bool,
    ) -> impl Future<Output = Result<RawAnalysis, GatewayError>> + Send;

    /// Fails with [`GatewayError::Processing`] when the Gateway finds no face.
    fn request_face_crop(
        &self,
        file: &SourceFile,
    ) -> impl Future<Output = Result<CroppedImage, GatewayError>> + Send;

    fn list_available_models(
        &self,
    ) -> impl Future<Output = Result<Vec<AvailableModel>, GatewayError>> + Send;

    /// Never fails; an unreachable Gateway is just `false`.
    fn check_connectivity(&self) -> impl Future<Output = bool> + Send;
}

impl<G: Gateway> Gateway for Arc<G> {
    fn submit_single_model_analysis(
        &self,
        file: &SourceFile,
        method: AnalysisMethod,
        model_id: Option<&str>,
        crop_face_first: bool,
    ) -> impl Future<Output = Result<RawAnalysis, GatewayError>> + Send {
        (**self).submit_single_model_analysis(file, method, model_id, crop_face_first)
    }

    fn submit_ensemble_analysis(
        &self,
        file: &SourceFile,
        crop_face_first: bool,
    ) -> impl Future<Output = Result<RawAnalysis, GatewayError>> + Send {
        (**self).submit_ensemble_analysis(file, crop_face_first)
    }

    fn request_face_crop(
        &self,
        file: &SourceFile,
    ) -> impl Future<Output = Result<CroppedImage, GatewayError>> + Send {
        (**self).request_face_crop(file)
    }

    fn list_available_models(
        &self,
    ) -> impl Future<Output = Result<Vec<AvailableModel>, GatewayError>> + Send {
        (**self).list_available_models()
    }

    fn check_connectivity(&self) -> impl Future<Output = bool> + Send {
        (**self).check_connectivity()
    }
}
