use std::sync::Arc;

use crate::application::services::TranscriptionService;
use crate::presentation::config::Settings;

pub struct AppState {
    pub transcription_service: Arc<TranscriptionService>,
    pub settings: Settings,
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            transcription_service: Arc::clone(&self.transcription_service),
            settings: self.settings.clone(),
        }
    }
}
