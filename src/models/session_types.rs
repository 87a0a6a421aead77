use serde::Serialize;
use std::fmt;

use super::analysis_types::{AnalysisMethod, AvailableModel, EnsembleSummary, Label, Preview};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    #[default]
    Idle,
    Selected,
    Analyzing,
    Complete,
    Error,
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UploadState::Idle => "idle",
            UploadState::Selected => "selected",
            UploadState::Analyzing => "analyzing",
            UploadState::Complete => "complete",
            UploadState::Error => "in error",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityStatus {
    #[default]
    Unknown,
    Connected,
    Disconnected,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModelListStatus {
    #[default]
    NotLoaded,
    Loading,
    Loaded,
    /// The list could not be fetched; the UI offers "retry loading models".
    Failed { message: String },
}

/// Which user actions are enabled right now.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Controls {
    pub upload: bool,
    pub crop: bool,
    pub analyze: bool,
    pub method_switch: bool,
    pub model_select: bool,
    pub retry_connectivity: bool,
    pub retry_models: bool,
    pub reset: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    VeryHigh,
    High,
    Moderate,
    NeedsReview,
}

impl ConfidenceBand {
    pub fn from_percent(confidence: f64) -> Self {
        if confidence >= 90.0 {
            ConfidenceBand::VeryHigh
        } else if confidence >= 80.0 {
            ConfidenceBand::High
        } else if confidence >= 70.0 {
            ConfidenceBand::Moderate
        } else {
            ConfidenceBand::NeedsReview
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            ConfidenceBand::VeryHigh => "Very high confidence",
            ConfidenceBand::High => "High confidence",
            ConfidenceBand::Moderate => "Moderate confidence",
            ConfidenceBand::NeedsReview => "Needs further review",
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ModelRow {
    pub model_id: String,
    pub label: Label,
    pub real_percent: String,
    pub fake_percent: String,
}

/// Display form of a verdict, computed when a snapshot is taken.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct VerdictView {
    pub label: Label,
    pub is_ai_generated: bool,
    pub headline: &'static str,
    pub confidence: f64,
    pub confidence_text: String,
    pub fake_percent: String,
    pub real_percent: String,
    pub band: ConfidenceBand,
    pub band_text: &'static str,
    pub description: String,
    pub model_name: Option<String>,
    pub models: Vec<ModelRow>,
    pub ensemble: Option<EnsembleSummary>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct FileInfo {
    pub name: String,
    pub mime: String,
    pub size_bytes: u64,
    pub size_label: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ModelOption {
    pub id: String,
    pub kind: String,
    pub size_label: String,
}

impl From<&AvailableModel> for ModelOption {
    fn from(model: &AvailableModel) -> Self {
        ModelOption {
            id: model.id.clone(),
            kind: model.kind.clone(),
            size_label: model.size_label(),
        }
    }
}

/// Everything the webview needs to render the uploader in one value.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: UploadState,
    pub file: Option<FileInfo>,
    pub preview: Option<Preview>,
    pub cropped_preview: Option<Preview>,
    pub crop_in_flight: bool,
    pub crop_face_first: bool,
    pub method: AnalysisMethod,
    pub models: Vec<ModelOption>,
    pub model_status: ModelListStatus,
    pub models_notice: Option<String>,
    pub selected_model_id: Option<String>,
    pub connectivity: ConnectivityStatus,
    pub connectivity_notice: Option<String>,
    pub controls: Controls,
    pub verdict: Option<VerdictView>,
    pub error: Option<String>,
}
