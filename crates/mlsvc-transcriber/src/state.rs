//! Application state.

use std::sync::Arc;

use mlsvc_api::ModelSlot;

use crate::decoder::AudioDecode;
use crate::speech::SpeechModel;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<ModelSlot<dyn SpeechModel>>,
    pub decoder: Arc<dyn AudioDecode>,
}

impl AppState {
    pub fn new(model: ModelSlot<dyn SpeechModel>, decoder: Arc<dyn AudioDecode>) -> Self {
        Self {
            model: Arc::new(model),
            decoder,
        }
    }
}
