//! Turns Gateway analysis bodies into one canonical verdict.
//!
//! Shape detection runs once, straight after the body is decoded, and yields a
//! [`RawAnalysis`]. Everything downstream matches on that variant.

use serde_json::Value;

use crate::error::GatewayError;
use crate::models::analysis_types::{AnalysisVerdict, EnsembleSummary, Label, ModelVerdict};
use crate::models::gateway_types::{
    EnsembleResult, RawAnalysis, SingleEnvelope, SingleResult,
};
use crate::models::session_types::{ConfidenceBand, ModelRow, VerdictView};

/// Message shown to the user when a result cannot be interpreted.
pub const UNINTERPRETABLE_RESULT: &str = "Could not interpret the analysis result";

fn is_ensemble_shaped(value: &Value) -> bool {
    value.get("results").is_some_and(Value::is_array)
        && value.get("final_decision_majority").is_some()
        && value.get("final_decision_average").is_some()
}

pub fn resolve_shape(value: Value) -> Result<RawAnalysis, GatewayError> {
    if !value.is_object() {
        return Err(GatewayError::Processing(format!(
            "Expected a JSON object, got {}",
            value
        )));
    }

    if is_ensemble_shaped(&value) {
        let ensemble: EnsembleResult = serde_json::from_value(value)
            .map_err(|e| GatewayError::Processing(format!("Malformed ensemble result: {}", e)))?;
        return Ok(RawAnalysis::Ensemble(ensemble));
    }

    // Single-model endpoints wrap the scores in `result`; accept the flat form too.
    let single = if value.get("result").is_some() {
        serde_json::from_value::<SingleEnvelope>(value).map(|envelope| envelope.result)
    } else {
        serde_json::from_value::<SingleResult>(value)
    };

    single
        .map(RawAnalysis::Single)
        .map_err(|e| GatewayError::Processing(format!("Malformed analysis result: {}", e)))
}

/// Scores are independent and unnormalized; keep each inside `[0, 1]`.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub fn normalize(raw: &RawAnalysis) -> Result<AnalysisVerdict, GatewayError> {
    match raw {
        RawAnalysis::Single(single) => Ok(normalize_single(single)),
        RawAnalysis::Ensemble(ensemble) => normalize_ensemble(ensemble),
    }
}

fn is_bare_label(text: &str) -> bool {
    matches!(text.trim().to_lowercase().as_str(), "fake" | "real")
}

fn normalize_single(single: &SingleResult) -> AnalysisVerdict {
    let fake = clamp_score(single.fake);
    let real = clamp_score(single.real);

    let prediction = single
        .prediction
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty());

    let label = prediction
        .and_then(Label::parse)
        .unwrap_or_else(|| Label::from_scores(fake, real));

    let description = match prediction {
        Some(text) if !is_bare_label(text) => text.to_string(),
        _ => match label {
            Label::Fake => format!(
                "The image has a {:.1}% probability of being AI-generated",
                fake * 100.0
            ),
            Label::Real => format!(
                "The image has a {:.1}% probability of being authentic",
                real * 100.0
            ),
        },
    };

    AnalysisVerdict {
        label,
        confidence: fake.max(real) * 100.0,
        fake_score: fake,
        real_score: real,
        description,
        model_name: single.model_name.clone(),
        per_model_breakdown: Vec::new(),
        ensemble: None,
    }
}

fn decision_label(field: &str, prediction: &str) -> Result<Label, GatewayError> {
    Label::parse(prediction).ok_or_else(|| {
        GatewayError::Processing(format!("Unrecognized {} prediction {:?}", field, prediction))
    })
}

fn normalize_ensemble(ensemble: &EnsembleResult) -> Result<AnalysisVerdict, GatewayError> {
    let label = decision_label(
        "final_decision_majority",
        &ensemble.final_decision_majority.prediction,
    )?;
    let average_side = decision_label(
        "final_decision_average",
        &ensemble.final_decision_average.prediction,
    )?;
    let average_confidence = clamp_score(ensemble.final_decision_average.confidence);

    let (fake, real) = match average_side {
        Label::Fake => (average_confidence, 1.0 - average_confidence),
        Label::Real => (1.0 - average_confidence, average_confidence),
    };

    let breakdown: Vec<ModelVerdict> = ensemble
        .results
        .iter()
        .map(|model| {
            let fake_score = clamp_score(model.fake);
            let real_score = clamp_score(model.real);
            ModelVerdict {
                model_id: model.model_name.clone(),
                label: Label::parse(&model.prediction)
                    .unwrap_or_else(|| Label::from_scores(fake_score, real_score)),
                real_score,
                fake_score,
            }
        })
        .collect();

    let votes_for_label = breakdown.iter().filter(|m| m.label == label).count();
    let summary = EnsembleSummary {
        model_count: breakdown.len(),
        votes_for_label,
        majority_confidence: clamp_score(ensemble.final_decision_majority.confidence),
        average_confidence,
    };

    let description = format!(
        "{} of {} models voted {}. Average confidence: {:.1}%",
        summary.votes_for_label,
        summary.model_count,
        label,
        average_confidence * 100.0
    );

    Ok(AnalysisVerdict {
        label,
        confidence: fake.max(real) * 100.0,
        fake_score: fake,
        real_score: real,
        description,
        model_name: None,
        per_model_breakdown: breakdown,
        ensemble: Some(summary),
    })
}

fn percent(score: f64) -> String {
    format!("{:.1}%", score * 100.0)
}

pub fn present(verdict: &AnalysisVerdict) -> VerdictView {
    let band = ConfidenceBand::from_percent(verdict.confidence);
    let is_ai_generated = verdict.label == Label::Fake;

    VerdictView {
        label: verdict.label,
        is_ai_generated,
        headline: if is_ai_generated {
            "AI-generated image"
        } else {
            "Authentic image"
        },
        confidence: verdict.confidence,
        confidence_text: format!("{:.1}%", verdict.confidence),
        fake_percent: percent(verdict.fake_score),
        real_percent: percent(verdict.real_score),
        band,
        band_text: band.text(),
        description: verdict.description.clone(),
        model_name: verdict.model_name.clone(),
        models: verdict
            .per_model_breakdown
            .iter()
            .map(|model| ModelRow {
                model_id: model.model_id.clone(),
                label: model.label,
                real_percent: percent(model.real_score),
                fake_percent: percent(model.fake_score),
            })
            .collect(),
        ensemble: verdict.ensemble.clone(),
    }
}
