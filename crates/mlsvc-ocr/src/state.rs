//! Application state.

use std::sync::Arc;

use mlsvc_api::ModelSlot;

use crate::engine::OcrEngine;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ModelSlot<dyn OcrEngine>>,
}

impl AppState {
    pub fn new(engine: ModelSlot<dyn OcrEngine>) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}
