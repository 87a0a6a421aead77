//! Scripted Gateway double shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use image_detect_lib::error::GatewayError;
use image_detect_lib::models::analysis_types::{
    AnalysisMethod, AvailableModel, CroppedImage, SourceFile,
};
use image_detect_lib::models::gateway_types::RawAnalysis;
use image_detect_lib::services::gateway::{validate_upload, Gateway};
use image_detect_lib::services::normalizer;
use serde_json::Value;
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Single {
        method: AnalysisMethod,
        model_id: Option<String>,
        crop_face_first: bool,
    },
    Ensemble {
        crop_face_first: bool,
    },
    Crop,
    Models,
    Probe,
}

/// Answers each call from a queue of canned responses and records the calls.
pub struct ScriptedGateway {
    analyses: Mutex<VecDeque<Result<RawAnalysis, GatewayError>>>,
    crops: Mutex<VecDeque<Result<CroppedImage, GatewayError>>>,
    model_lists: Mutex<VecDeque<Result<Vec<AvailableModel>, GatewayError>>>,
    connected: AtomicBool,
    calls: Mutex<Vec<Call>>,
    hold_analysis: AtomicBool,
    analysis_started: Notify,
    analysis_released: Notify,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            analyses: Mutex::new(VecDeque::new()),
            crops: Mutex::new(VecDeque::new()),
            model_lists: Mutex::new(VecDeque::new()),
            connected: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
            hold_analysis: AtomicBool::new(false),
            analysis_started: Notify::new(),
            analysis_released: Notify::new(),
        }
    }

    pub fn disconnected(self) -> Self {
        self.connected.store(false, Ordering::SeqCst);
        self
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn push_analysis_json(&self, body: Value) {
        self.push_analysis(normalizer::resolve_shape(body));
    }

    pub fn push_analysis(&self, result: Result<RawAnalysis, GatewayError>) {
        self.analyses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
    }

    pub fn push_crop(&self, result: Result<CroppedImage, GatewayError>) {
        self.crops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
    }

    pub fn push_models(&self, result: Result<Vec<AvailableModel>, GatewayError>) {
        self.model_lists
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
    }

    /// Makes the next analysis wait until [`ScriptedGateway::release_analysis`].
    pub fn hold_analysis(&self) {
        self.hold_analysis.store(true, Ordering::SeqCst);
    }

    pub async fn analysis_started(&self) {
        self.analysis_started.notified().await;
    }

    pub fn release_analysis(&self) {
        self.analysis_released.notify_one();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, call: Call) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    async fn next_analysis(&self) -> Result<RawAnalysis, GatewayError> {
        if self.hold_analysis.swap(false, Ordering::SeqCst) {
            self.analysis_started.notify_one();
            self.analysis_released.notified().await;
        }
        self.analyses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::Transport("no scripted analysis".into())))
    }
}

impl Gateway for ScriptedGateway {
    async fn submit_single_model_analysis(
        &self,
        file: &SourceFile,
        method: AnalysisMethod,
        model_id: Option<&str>,
        crop_face_first: bool,
    ) -> Result<RawAnalysis, GatewayError> {
        validate_upload(file)?;
        self.record(Call::Single {
            method,
            model_id: model_id.map(str::to_string),
            crop_face_first,
        });
        self.next_analysis().await
    }

    async fn submit_ensemble_analysis(
        &self,
        file: &SourceFile,
        crop_face_first: bool,
    ) -> Result<RawAnalysis, GatewayError> {
        validate_upload(file)?;
        self.record(Call::Ensemble { crop_face_first });
        self.next_analysis().await
    }

    async fn request_face_crop(&self, file: &SourceFile) -> Result<CroppedImage, GatewayError> {
        validate_upload(file)?;
        self.record(Call::Crop);
        self.crops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::Transport("no scripted crop".into())))
    }

    async fn list_available_models(&self) -> Result<Vec<AvailableModel>, GatewayError> {
        self.record(Call::Models);
        self.model_lists
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn check_connectivity(&self) -> bool {
        self.record(Call::Probe);
        self.connected.load(Ordering::SeqCst)
    }
}

pub fn jpeg(size: usize) -> SourceFile {
    SourceFile::new("portrait.jpg", "image/jpeg", vec![0xFFu8; size])
}

pub fn model(id: &str) -> AvailableModel {
    AvailableModel {
        id: id.to_string(),
        size_bytes: 83_886_080,
        kind: "xception".to_string(),
    }
}
