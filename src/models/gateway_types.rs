//! Wire shapes of the Gateway's JSON bodies.

use serde::{Deserialize, Deserializer};

use super::analysis_types::AvailableModel;

/// Scores arrive as JSON numbers from some endpoints and numeric strings from others.
fn score<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
    }

    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(value) => Ok(value),
        NumberOrText::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid score {:?}", text))),
    }
}

#[derive(Debug, Deserialize)]
pub struct WeightsResponse {
    #[serde(default)]
    pub available_models: Vec<WireModel>,
}

#[derive(Debug, Deserialize)]
pub struct WireModel {
    pub filename: String,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub model_type: String,
}

impl From<WireModel> for AvailableModel {
    fn from(wire: WireModel) -> Self {
        AvailableModel {
            id: wire.filename,
            size_bytes: wire.size_bytes,
            kind: wire.model_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SingleResult {
    #[serde(deserialize_with = "score")]
    pub fake: f64,
    #[serde(deserialize_with = "score")]
    pub real: f64,
    #[serde(default)]
    pub prediction: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SingleEnvelope {
    pub result: SingleResult,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnsembleModelResult {
    pub model_name: String,
    pub prediction: String,
    #[serde(deserialize_with = "score")]
    pub real: f64,
    #[serde(deserialize_with = "score")]
    pub fake: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Decision {
    pub prediction: String,
    #[serde(deserialize_with = "score")]
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnsembleResult {
    pub results: Vec<EnsembleModelResult>,
    pub final_decision_majority: Decision,
    pub final_decision_average: Decision,
}

/// A Gateway analysis body, with its shape settled once at decode time.
#[derive(Debug, Clone, PartialEq)]
pub enum RawAnalysis {
    Single(SingleResult),
    Ensemble(EnsembleResult),
}
