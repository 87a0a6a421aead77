use std::path::Path;

use tokio::sync::{Mutex, MutexGuard};

use crate::error::{GatewayError, SessionError};
use crate::models::analysis_types::{AnalysisMethod, SourceFile};
use crate::models::session_types::SessionSnapshot;
use crate::services::gateway::{self, Gateway};
use crate::services::normalizer;
use crate::services::session::{Effect, Session, SessionEvent, Ticket};

/// Drives a [`Session`] against a [`Gateway`].
///
/// The session lock is only held while an event is applied, never across a
/// Gateway call, so a reset can land while a request is still in flight.
pub struct Orchestrator<G> {
    gateway: G,
    session: Mutex<Session>,
}

impl<G: Gateway> Orchestrator<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            session: Mutex::new(Session::new()),
        }
    }

    async fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().await
    }

    async fn apply(&self, event: SessionEvent) -> Result<Option<Effect>, SessionError> {
        self.lock().await.apply(event)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.lock().await.snapshot()
    }

    /// Applies a completion and decides what the caller still hears about.
    /// A failure is only reported while its ticket is current; an abandoned
    /// request fails silently.
    async fn complete(
        &self,
        ticket: Ticket,
        failure: Option<GatewayError>,
        event: SessionEvent,
    ) -> Result<(), SessionError> {
        let mut session = self.lock().await;
        session.apply(event)?;
        match failure {
            Some(err) if session.is_current(ticket) => Err(err.into()),
            Some(err) => {
                log::debug!("Not reporting failure of an abandoned request: {}", err);
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Applies a user event, runs whatever network work it asks for and
    /// reports the resulting session. Gateway failures are recorded in the
    /// session and also returned.
    pub async fn dispatch(&self, event: SessionEvent) -> Result<SessionSnapshot, SessionError> {
        if let Some(effect) = self.apply(event).await? {
            self.run(effect).await?;
        }
        Ok(self.snapshot().await)
    }

    async fn run(&self, effect: Effect) -> Result<(), SessionError> {
        match effect {
            Effect::ProbeConnectivity => {
                let connected = self.gateway.check_connectivity().await;
                self.apply(SessionEvent::ConnectivityChecked { connected }).await?;
                Ok(())
            }
            Effect::LoadModels { ticket } => {
                // A failed list is surfaced through the model status, not as an error.
                let result = self.gateway.list_available_models().await;
                self.apply(SessionEvent::ModelsLoaded { ticket, result }).await?;
                Ok(())
            }
            Effect::Crop { ticket, file } => {
                let result = self.gateway.request_face_crop(&file).await;
                let failure = result.as_ref().err().cloned();
                self.complete(ticket, failure, SessionEvent::CropFinished { ticket, result })
                    .await
            }
            Effect::Analyze { ticket, request } => {
                let raw = if request.method.is_ensemble() {
                    self.gateway
                        .submit_ensemble_analysis(&request.file, request.crop_face_first)
                        .await
                } else {
                    self.gateway
                        .submit_single_model_analysis(
                            &request.file,
                            request.method,
                            request.model_id.as_deref(),
                            request.crop_face_first,
                        )
                        .await
                };

                let result = raw.and_then(|raw| normalizer::normalize(&raw));
                let failure = result.as_ref().err().cloned();
                self.complete(ticket, failure, SessionEvent::AnalysisFinished { ticket, result })
                    .await
            }
        }
    }

    /// Probes the Gateway; run once at startup and again on request.
    pub async fn initialize(&self) -> SessionSnapshot {
        match self.check_connectivity().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log::debug!("Startup probe skipped: {}", err);
                self.snapshot().await
            }
        }
    }

    pub async fn check_connectivity(&self) -> Result<SessionSnapshot, SessionError> {
        self.dispatch(SessionEvent::CheckConnectivity).await
    }

    pub async fn select_file(&self, file: SourceFile) -> Result<SessionSnapshot, SessionError> {
        self.dispatch(SessionEvent::SelectFile(file)).await
    }

    /// Loads a file picked in the desktop dialog and selects it.
    pub async fn select_path(&self, path: &Path) -> Result<SessionSnapshot, SessionError> {
        match gateway::load_upload(path).await {
            Ok(file) => self.select_file(file).await,
            Err(error) => {
                let name = path.display().to_string();
                self.dispatch(SessionEvent::RejectFile { name, error }).await
            }
        }
    }

    pub async fn set_method(&self, method: AnalysisMethod) -> Result<SessionSnapshot, SessionError> {
        self.dispatch(SessionEvent::SetMethod(method)).await
    }

    pub async fn select_model(&self, model_id: String) -> Result<SessionSnapshot, SessionError> {
        self.dispatch(SessionEvent::SelectModel(model_id)).await
    }

    pub async fn refresh_models(&self) -> Result<SessionSnapshot, SessionError> {
        self.dispatch(SessionEvent::RefreshModels).await
    }

    pub async fn set_crop_face_first(&self, enabled: bool) -> Result<SessionSnapshot, SessionError> {
        self.dispatch(SessionEvent::SetCropFaceFirst(enabled)).await
    }

    pub async fn request_crop(&self) -> Result<SessionSnapshot, SessionError> {
        self.dispatch(SessionEvent::RequestCrop).await
    }

    pub async fn clear_crop(&self) -> Result<SessionSnapshot, SessionError> {
        self.dispatch(SessionEvent::ClearCrop).await
    }

    pub async fn start_analysis(&self) -> Result<SessionSnapshot, SessionError> {
        self.dispatch(SessionEvent::StartAnalysis).await
    }

    pub async fn retry(&self) -> Result<SessionSnapshot, SessionError> {
        self.dispatch(SessionEvent::Retry).await
    }

    pub async fn dismiss_error(&self) -> Result<SessionSnapshot, SessionError> {
        self.dispatch(SessionEvent::DismissError).await
    }

    pub async fn reset(&self) -> Result<SessionSnapshot, SessionError> {
        self.dispatch(SessionEvent::Reset).await
    }
}
