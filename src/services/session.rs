//! The upload/analysis state machine.
//!
//! [`Session::apply`] is the only way the session changes. User actions and
//! network completions both arrive as [`SessionEvent`]s; when an action needs
//! the Gateway, `apply` hands back an [`Effect`] for the caller to run and the
//! outcome comes back later as a completion event carrying a [`Ticket`].
//! Completions whose ticket no longer matches are dropped.

use crate::error::{GatewayError, SessionError};
use crate::models::analysis_types::{
    AnalysisMethod, AnalysisVerdict, AvailableModel, CroppedImage, Preview, SourceFile,
};
use crate::models::session_types::{
    Controls, ConnectivityStatus, FileInfo, ModelListStatus, ModelOption, SessionSnapshot,
    UploadState,
};
use crate::services::gateway;
use crate::services::normalizer;

pub const NO_MODELS_NOTICE: &str = "No models available on the server";
pub const DISCONNECTED_NOTICE: &str = "Cannot connect to the analysis service";

/// Identifies the session (or model-list request) an effect was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
}

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub file: SourceFile,
    pub method: AnalysisMethod,
    pub model_id: Option<String>,
    pub crop_face_first: bool,
}

#[derive(Debug)]
pub enum SessionEvent {
    SelectFile(SourceFile),
    /// A picked file that could not be loaded for upload.
    RejectFile {
        name: String,
        error: GatewayError,
    },
    SetMethod(AnalysisMethod),
    SelectModel(String),
    SetCropFaceFirst(bool),
    RequestCrop,
    ClearCrop,
    StartAnalysis,
    Retry,
    DismissError,
    Reset,
    CheckConnectivity,
    RefreshModels,
    ConnectivityChecked {
        connected: bool,
    },
    ModelsLoaded {
        ticket: Ticket,
        result: Result<Vec<AvailableModel>, GatewayError>,
    },
    CropFinished {
        ticket: Ticket,
        result: Result<CroppedImage, GatewayError>,
    },
    AnalysisFinished {
        ticket: Ticket,
        result: Result<AnalysisVerdict, GatewayError>,
    },
}

/// Network work requested by a transition.
#[derive(Debug)]
pub enum Effect {
    ProbeConnectivity,
    LoadModels { ticket: Ticket },
    Crop { ticket: Ticket, file: SourceFile },
    Analyze { ticket: Ticket, request: AnalysisRequest },
}

#[derive(Debug, Clone)]
struct Upload {
    file: SourceFile,
    preview: Preview,
}

#[derive(Debug, Default)]
pub struct Session {
    generation: u64,
    models_generation: u64,
    state: UploadState,
    upload: Option<Upload>,
    cropped_preview: Option<Preview>,
    crop_in_flight: bool,
    crop_face_first: bool,
    method: AnalysisMethod,
    available_models: Vec<AvailableModel>,
    model_status: ModelListStatus,
    selected_model_id: Option<String>,
    connectivity: ConnectivityStatus,
    probe_in_flight: bool,
    verdict: Option<AnalysisVerdict>,
    last_error: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn method(&self) -> AnalysisMethod {
        self.method
    }

    pub fn source_file(&self) -> Option<&SourceFile> {
        self.upload.as_ref().map(|u| &u.file)
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.upload.as_ref().map(|u| &u.preview)
    }

    pub fn cropped_preview(&self) -> Option<&Preview> {
        self.cropped_preview.as_ref()
    }

    pub fn crop_face_first(&self) -> bool {
        self.crop_face_first
    }

    pub fn available_models(&self) -> &[AvailableModel] {
        &self.available_models
    }

    pub fn model_status(&self) -> &ModelListStatus {
        &self.model_status
    }

    pub fn selected_model_id(&self) -> Option<&str> {
        self.selected_model_id.as_deref()
    }

    pub fn connectivity(&self) -> ConnectivityStatus {
        self.connectivity
    }

    pub fn verdict(&self) -> Option<&AnalysisVerdict> {
        self.verdict.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn ticket(&self) -> Ticket {
        Ticket {
            generation: self.generation,
        }
    }

    /// Whether a completion for `ticket` would still land on this session.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket == self.ticket()
    }

    fn models_ticket(&self) -> Ticket {
        Ticket {
            generation: self.models_generation,
        }
    }

    fn editable(&self) -> bool {
        matches!(
            self.state,
            UploadState::Idle | UploadState::Selected | UploadState::Error
        )
    }

    fn guard_edit(&self, action: &'static str) -> Result<(), SessionError> {
        if self.editable() {
            Ok(())
        } else {
            Err(SessionError::NotAllowed {
                action,
                state: self.state,
            })
        }
    }

    fn guard_upload(&self) -> Result<(), SessionError> {
        self.guard_edit("select a file")?;
        if self.crop_in_flight {
            return Err(SessionError::Busy("face crop"));
        }
        if self.connectivity == ConnectivityStatus::Disconnected {
            return Err(SessionError::Disconnected);
        }
        Ok(())
    }

    fn guard_crop(&self) -> Result<(), SessionError> {
        if self.upload.is_none() {
            return Err(SessionError::NoFileSelected);
        }
        if self.state == UploadState::Analyzing {
            return Err(SessionError::Busy("analysis"));
        }
        if !matches!(self.state, UploadState::Selected | UploadState::Error) {
            return Err(SessionError::NotAllowed {
                action: "crop the face",
                state: self.state,
            });
        }
        if self.crop_in_flight {
            return Err(SessionError::Busy("face crop"));
        }
        if self.connectivity == ConnectivityStatus::Disconnected {
            return Err(SessionError::Disconnected);
        }
        Ok(())
    }

    fn guard_analyze(&self) -> Result<(), SessionError> {
        if self.upload.is_none() {
            return Err(SessionError::NoFileSelected);
        }
        if self.state == UploadState::Analyzing {
            return Err(SessionError::Busy("analysis"));
        }
        if !matches!(self.state, UploadState::Selected | UploadState::Error) {
            return Err(SessionError::NotAllowed {
                action: "start an analysis",
                state: self.state,
            });
        }
        if self.crop_in_flight {
            return Err(SessionError::Busy("face crop"));
        }
        if self.connectivity == ConnectivityStatus::Disconnected {
            return Err(SessionError::Disconnected);
        }
        if self.method.requires_model()
            && (self.available_models.is_empty() || self.selected_model_id.is_none())
        {
            return Err(SessionError::ModelRequired);
        }
        Ok(())
    }

    fn guard_models(&self) -> Result<(), SessionError> {
        self.guard_edit("change the model")?;
        if !self.method.requires_model() {
            return Err(SessionError::ModelsNotUsed);
        }
        Ok(())
    }

    /// Enabled actions, derived from the same guards `apply` enforces.
    pub fn controls(&self) -> Controls {
        Controls {
            upload: self.guard_upload().is_ok(),
            crop: self.guard_crop().is_ok(),
            analyze: self.guard_analyze().is_ok(),
            method_switch: self.editable(),
            model_select: self.guard_models().is_ok() && !self.available_models.is_empty(),
            retry_connectivity: !self.probe_in_flight,
            retry_models: self.guard_models().is_ok()
                && self.model_status != ModelListStatus::Loading,
            reset: true,
        }
    }

    pub fn apply(&mut self, event: SessionEvent) -> Result<Option<Effect>, SessionError> {
        match event {
            SessionEvent::SelectFile(file) => self.select_file(file),
            SessionEvent::RejectFile { name, error } => {
                self.guard_upload()?;
                self.reject_file(&name, error)
            }
            SessionEvent::SetMethod(method) => self.set_method(method),
            SessionEvent::SelectModel(id) => {
                self.guard_models()?;
                if !self.available_models.iter().any(|m| m.id == id) {
                    return Err(SessionError::UnknownModel(id));
                }
                self.selected_model_id = Some(id);
                Ok(None)
            }
            SessionEvent::SetCropFaceFirst(enabled) => {
                self.guard_edit("change the crop option")?;
                self.crop_face_first = enabled;
                Ok(None)
            }
            SessionEvent::RequestCrop => {
                self.guard_crop()?;
                let Some(upload) = self.upload.as_ref() else {
                    return Err(SessionError::NoFileSelected);
                };
                let file = upload.file.clone();
                self.crop_in_flight = true;
                self.cropped_preview = None;
                self.last_error = None;
                Ok(Some(Effect::Crop {
                    ticket: self.ticket(),
                    file,
                }))
            }
            SessionEvent::ClearCrop => {
                self.cropped_preview = None;
                Ok(None)
            }
            SessionEvent::StartAnalysis => self.start_analysis(),
            SessionEvent::Retry => {
                if self.state != UploadState::Error {
                    return Err(SessionError::NotAllowed {
                        action: "retry",
                        state: self.state,
                    });
                }
                self.state = UploadState::Selected;
                self.last_error = None;
                Ok(None)
            }
            SessionEvent::DismissError => {
                self.last_error = None;
                if self.state == UploadState::Error {
                    self.state = if self.upload.is_some() {
                        UploadState::Selected
                    } else {
                        UploadState::Idle
                    };
                }
                Ok(None)
            }
            SessionEvent::Reset => {
                self.reset();
                Ok(None)
            }
            SessionEvent::CheckConnectivity => {
                if self.probe_in_flight {
                    return Err(SessionError::Busy("connectivity check"));
                }
                self.probe_in_flight = true;
                Ok(Some(Effect::ProbeConnectivity))
            }
            SessionEvent::RefreshModels => {
                self.guard_models()?;
                if self.model_status == ModelListStatus::Loading {
                    return Err(SessionError::Busy("model list refresh"));
                }
                Ok(Some(self.begin_model_load()))
            }
            SessionEvent::ConnectivityChecked { connected } => {
                self.probe_in_flight = false;
                self.connectivity = if connected {
                    ConnectivityStatus::Connected
                } else {
                    ConnectivityStatus::Disconnected
                };
                log::debug!("Connectivity is now {:?}", self.connectivity);
                Ok(None)
            }
            SessionEvent::ModelsLoaded { ticket, result } => {
                self.finish_model_load(ticket, result);
                Ok(None)
            }
            SessionEvent::CropFinished { ticket, result } => {
                self.finish_crop(ticket, result);
                Ok(None)
            }
            SessionEvent::AnalysisFinished { ticket, result } => {
                self.finish_analysis(ticket, result);
                Ok(None)
            }
        }
    }

    fn select_file(&mut self, file: SourceFile) -> Result<Option<Effect>, SessionError> {
        self.guard_upload()?;

        if let Err(err) = gateway::validate_upload(&file) {
            return self.reject_file(&file.name, err);
        }

        let preview = Preview::from_bytes(&file.mime, &file.bytes);
        log::debug!("Selected {} ({} bytes)", file.name, file.size());
        self.upload = Some(Upload { file, preview });
        self.cropped_preview = None;
        self.verdict = None;
        self.last_error = None;
        self.state = UploadState::Selected;
        Ok(None)
    }

    fn reject_file(&mut self, name: &str, err: GatewayError) -> Result<Option<Effect>, SessionError> {
        log::warn!("Rejected {}: {}", name, err);
        self.last_error = Some(err.to_string());
        Err(err.into())
    }

    fn set_method(&mut self, method: AnalysisMethod) -> Result<Option<Effect>, SessionError> {
        self.guard_edit("switch the analysis method")?;
        if method == self.method {
            return Ok(None);
        }

        log::debug!("Method {:?} -> {:?}", self.method, method);
        self.method = method;

        if method.requires_model() {
            return Ok(Some(self.begin_model_load()));
        }

        // Leaving the model-requiring method forgets the list and any pending load.
        self.models_generation += 1;
        self.available_models.clear();
        self.selected_model_id = None;
        self.model_status = ModelListStatus::NotLoaded;
        Ok(None)
    }

    fn begin_model_load(&mut self) -> Effect {
        self.models_generation += 1;
        self.available_models.clear();
        self.selected_model_id = None;
        self.model_status = ModelListStatus::Loading;
        Effect::LoadModels {
            ticket: self.models_ticket(),
        }
    }

    fn finish_model_load(
        &mut self,
        ticket: Ticket,
        result: Result<Vec<AvailableModel>, GatewayError>,
    ) {
        if ticket != self.models_ticket() || !self.method.requires_model() {
            log::debug!("Discarding stale model list");
            return;
        }

        match result {
            Ok(models) => {
                self.selected_model_id = models.first().map(|m| m.id.clone());
                self.available_models = models;
                self.model_status = ModelListStatus::Loaded;
            }
            Err(err) => {
                log::warn!("Model list unavailable: {}", err);
                self.available_models.clear();
                self.selected_model_id = None;
                self.model_status = ModelListStatus::Failed {
                    message: format!("Could not load models: {}", err),
                };
            }
        }
    }

    fn finish_crop(&mut self, ticket: Ticket, result: Result<CroppedImage, GatewayError>) {
        if !self.is_current(ticket) {
            log::debug!("Discarding face crop for an abandoned session");
            return;
        }

        self.crop_in_flight = false;
        match result {
            Ok(cropped) => {
                self.cropped_preview = Some(Preview::from_bytes(&cropped.mime, &cropped.bytes));
            }
            Err(err) => {
                log::warn!("Face crop failed: {}", err);
                self.last_error = Some(err.to_string());
            }
        }
    }

    fn start_analysis(&mut self) -> Result<Option<Effect>, SessionError> {
        self.guard_analyze()?;
        let Some(upload) = self.upload.as_ref() else {
            return Err(SessionError::NoFileSelected);
        };

        let request = AnalysisRequest {
            file: upload.file.clone(),
            method: self.method,
            model_id: if self.method.requires_model() {
                self.selected_model_id.clone()
            } else {
                None
            },
            crop_face_first: self.crop_face_first,
        };

        self.state = UploadState::Analyzing;
        self.verdict = None;
        self.last_error = None;
        Ok(Some(Effect::Analyze {
            ticket: self.ticket(),
            request,
        }))
    }

    fn finish_analysis(&mut self, ticket: Ticket, result: Result<AnalysisVerdict, GatewayError>) {
        if !self.is_current(ticket) || self.state != UploadState::Analyzing {
            log::debug!("Discarding analysis result for an abandoned session");
            return;
        }

        match result {
            Ok(verdict) => {
                log::debug!("Verdict {} at {:.1}%", verdict.label, verdict.confidence);
                self.verdict = Some(verdict);
                self.state = UploadState::Complete;
            }
            Err(GatewayError::Processing(detail)) => {
                log::warn!("Uninterpretable analysis result: {}", detail);
                self.last_error = Some(normalizer::UNINTERPRETABLE_RESULT.to_string());
                self.state = UploadState::Error;
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                self.state = UploadState::Error;
            }
        }
    }

    /// Back to the empty idle session. Method, models and connectivity are kept.
    fn reset(&mut self) {
        self.generation += 1;
        self.state = UploadState::Idle;
        self.upload = None;
        self.cropped_preview = None;
        self.crop_in_flight = false;
        self.verdict = None;
        self.last_error = None;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let models_notice = if self.method.requires_model() {
            match &self.model_status {
                ModelListStatus::Loaded if self.available_models.is_empty() => {
                    Some(NO_MODELS_NOTICE.to_string())
                }
                ModelListStatus::Failed { message } => Some(message.clone()),
                _ => None,
            }
        } else {
            None
        };

        SessionSnapshot {
            state: self.state,
            file: self.upload.as_ref().map(|u| FileInfo {
                name: u.file.name.clone(),
                mime: u.file.mime.clone(),
                size_bytes: u.file.size(),
                size_label: format!("{:.1} MB", u.file.size() as f64 / (1024.0 * 1024.0)),
            }),
            preview: self.preview().cloned(),
            cropped_preview: self.cropped_preview.clone(),
            crop_in_flight: self.crop_in_flight,
            crop_face_first: self.crop_face_first,
            method: self.method,
            models: self.available_models.iter().map(ModelOption::from).collect(),
            model_status: self.model_status.clone(),
            models_notice,
            selected_model_id: self.selected_model_id.clone(),
            connectivity: self.connectivity,
            connectivity_notice: (self.connectivity == ConnectivityStatus::Disconnected)
                .then(|| DISCONNECTED_NOTICE.to_string()),
            controls: self.controls(),
            verdict: self.verdict.as_ref().map(normalizer::present),
            error: self.last_error.clone(),
        }
    }
}
