use std::path::Path;

use crate::error::AppError;
use crate::models::analysis_types::{AnalysisMethod, MethodInfo};
use crate::models::session_types::SessionSnapshot;
use crate::AppState;
use tauri::State;

#[tauri::command]
pub async fn get_session(orchestrator: State<'_, AppState>) -> Result<SessionSnapshot, AppError> {
    Ok(orchestrator.snapshot().await)
}

#[tauri::command]
pub fn method_catalog() -> Vec<MethodInfo> {
    AnalysisMethod::ALL.into_iter().map(MethodInfo::from).collect()
}

#[tauri::command]
pub async fn select_file(
    orchestrator: State<'_, AppState>,
    path: String,
) -> Result<SessionSnapshot, AppError> {
    Ok(orchestrator.select_path(Path::new(&path)).await?)
}

#[tauri::command]
pub async fn set_method(
    orchestrator: State<'_, AppState>,
    method: AnalysisMethod,
) -> Result<SessionSnapshot, AppError> {
    Ok(orchestrator.set_method(method).await?)
}

#[tauri::command]
pub async fn select_model(
    orchestrator: State<'_, AppState>,
    model_id: String,
) -> Result<SessionSnapshot, AppError> {
    Ok(orchestrator.select_model(model_id).await?)
}

#[tauri::command]
pub async fn refresh_models(orchestrator: State<'_, AppState>) -> Result<SessionSnapshot, AppError> {
    Ok(orchestrator.refresh_models().await?)
}

#[tauri::command]
pub async fn set_crop_face_first(
    orchestrator: State<'_, AppState>,
    enabled: bool,
) -> Result<SessionSnapshot, AppError> {
    Ok(orchestrator.set_crop_face_first(enabled).await?)
}

#[tauri::command]
pub async fn request_crop(orchestrator: State<'_, AppState>) -> Result<SessionSnapshot, AppError> {
    Ok(orchestrator.request_crop().await?)
}

#[tauri::command]
pub async fn clear_crop(orchestrator: State<'_, AppState>) -> Result<SessionSnapshot, AppError> {
    Ok(orchestrator.clear_crop().await?)
}

#[tauri::command]
pub async fn start_analysis(orchestrator: State<'_, AppState>) -> Result<SessionSnapshot, AppError> {
    Ok(orchestrator.start_analysis().await?)
}

#[tauri::command]
pub async fn retry_analysis(orchestrator: State<'_, AppState>) -> Result<SessionSnapshot, AppError> {
    Ok(orchestrator.retry().await?)
}

#[tauri::command]
pub async fn dismiss_error(orchestrator: State<'_, AppState>) -> Result<SessionSnapshot, AppError> {
    Ok(orchestrator.dismiss_error().await?)
}

#[tauri::command]
pub async fn reset_session(orchestrator: State<'_, AppState>) -> Result<SessionSnapshot, AppError> {
    Ok(orchestrator.reset().await?)
}

#[tauri::command]
pub async fn check_connectivity(
    orchestrator: State<'_, AppState>,
) -> Result<SessionSnapshot, AppError> {
    Ok(orchestrator.check_connectivity().await?)
}
