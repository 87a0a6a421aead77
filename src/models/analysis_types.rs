use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

/// Which Gateway endpoint(s) an analysis targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMethod {
    #[default]
    Huggingface,
    Xception,
    Ensemble,
}

impl AnalysisMethod {
    pub const ALL: [AnalysisMethod; 3] = [
        AnalysisMethod::Huggingface,
        AnalysisMethod::Xception,
        AnalysisMethod::Ensemble,
    ];

    /// Xception is served from a set of weight files and needs one picked.
    pub fn requires_model(&self) -> bool {
        matches!(self, AnalysisMethod::Xception)
    }

    pub fn is_ensemble(&self) -> bool {
        matches!(self, AnalysisMethod::Ensemble)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AnalysisMethod::Huggingface => "HuggingFace",
            AnalysisMethod::Xception => "Xception",
            AnalysisMethod::Ensemble => "Ensemble",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AnalysisMethod::Huggingface => "Pretrained Hugging Face model for deepfake detection",
            AnalysisMethod::Xception => "Custom Xception models for deepfake detection",
            AnalysisMethod::Ensemble => "Analysis with every available model (HuggingFace + Xception)",
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct MethodInfo {
    pub method: AnalysisMethod,
    pub name: &'static str,
    pub description: &'static str,
    pub requires_model: bool,
}

impl From<AnalysisMethod> for MethodInfo {
    fn from(method: AnalysisMethod) -> Self {
        MethodInfo {
            method,
            name: method.display_name(),
            description: method.description(),
            requires_model: method.requires_model(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Real,
    Fake,
}

const FAKE_PREDICTIONS: &[&str] = &[
    "fake",
    "artificial",
    "ai-generated",
    "imagen artificial",
    "generada artificialmente",
    "imagen generada artificialmente",
    "imagen generada por ia",
];

const REAL_PREDICTIONS: &[&str] = &[
    "real",
    "authentic",
    "auténtica",
    "autentica",
    "imagen real",
    "imagen auténtica",
];

impl Label {
    /// Reads a side out of prediction text. Only the whole text counts, so
    /// "not fake" or "unreal" name no side.
    pub fn parse(text: &str) -> Option<Label> {
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        if FAKE_PREDICTIONS.contains(&normalized.as_str()) {
            Some(Label::Fake)
        } else if REAL_PREDICTIONS.contains(&normalized.as_str()) {
            Some(Label::Real)
        } else {
            None
        }
    }

    /// Fake only on a strictly greater fake score; ties stay real.
    pub fn from_scores(fake: f64, real: f64) -> Label {
        if fake > real {
            Label::Fake
        } else {
            Label::Real
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Real => "real",
            Label::Fake => "fake",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct AvailableModel {
    pub id: String,
    pub size_bytes: u64,
    pub kind: String,
}

impl AvailableModel {
    pub fn size_label(&self) -> String {
        format!("{:.1} MB", self.size_bytes as f64 / (1024.0 * 1024.0))
    }
}

/// The user's image, owned by the session.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub mime: String,
    pub bytes: Arc<[u8]>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Render-only form of an image: a data URL the webview can show directly.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Preview {
    pub data_url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Preview {
    pub fn from_bytes(mime: &str, bytes: &[u8]) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);

        // Dimensions are informational; undecodable headers just leave them unset.
        let dimensions = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .ok()
            .and_then(|reader| reader.into_dimensions().ok());

        Preview {
            data_url: format!("data:{};base64,{}", mime, encoded),
            width: dimensions.map(|(w, _)| w),
            height: dimensions.map(|(_, h)| h),
        }
    }
}

/// Face region returned by the crop endpoint.
#[derive(Debug, Clone)]
pub struct CroppedImage {
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ModelVerdict {
    pub model_id: String,
    pub label: Label,
    pub real_score: f64,
    pub fake_score: f64,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct EnsembleSummary {
    pub model_count: usize,
    pub votes_for_label: usize,
    pub majority_confidence: f64,
    pub average_confidence: f64,
}

/// Canonical outcome of one analysis, whatever endpoint produced it.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct AnalysisVerdict {
    pub label: Label,
    /// Percentage in `[0, 100]`.
    pub confidence: f64,
    pub fake_score: f64,
    pub real_score: f64,
    pub description: String,
    pub model_name: Option<String>,
    pub per_model_breakdown: Vec<ModelVerdict>,
    pub ensemble: Option<EnsembleSummary>,
}
