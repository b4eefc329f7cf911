//! Application state.

use std::sync::Arc;

use mlsvc_api::ModelSlot;

use crate::model::DetectionModel;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<ModelSlot<dyn DetectionModel>>,
}

impl AppState {
    pub fn new(model: ModelSlot<dyn DetectionModel>) -> Self {
        Self {
            model: Arc::new(model),
        }
    }
}
