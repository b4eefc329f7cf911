//! Model readiness tracking.
//!
//! Each service loads its model once at startup and stores the outcome in a
//! [`ModelSlot`]. A slot never changes between loaded and unloaded after
//! construction; the only transient state is `Probing`, entered while a
//! health check runs a dummy inference.

use std::fmt::Display;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info, warn};

use mlsvc_media::MediaError;
use mlsvc_models::HealthResponse;

use crate::config::DEFAULT_HEALTH_PROBE_TIMEOUT_SECS;
use crate::metrics;

/// Errors raised by model adapters.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("{0} model is not available")]
    Unavailable(String),

    #[error("Model failed to load: {0}")]
    Load(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error(transparent)]
    Media(#[from] MediaError),
}

impl ModelError {
    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }
}

/// A loaded model that can prove it still works.
#[async_trait]
pub trait ServingModel: Send + Sync {
    /// Short model name used in logs, metrics and health reasons.
    fn name(&self) -> &str;

    /// Run one inference on a fixed dummy input.
    async fn probe(&self) -> Result<(), ModelError>;
}

/// Lock an adapter's inference state.
///
/// A panic inside a previous inference poisons the mutex. The state behind it
/// is reset at the start of every inference, so the poison is cleared and the
/// model keeps serving.
pub fn lock_model<'a, T>(model: &str, mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!(model, "Model lock poisoned by a failed inference, recovering");
        mutex.clear_poison();
        poisoned.into_inner()
    })
}

/// Non-blocking [`lock_model`] for health probes.
///
/// `None` means a request holds the model. A probe must not queue behind it,
/// since a timed-out probe cannot cancel work already on the blocking pool.
pub fn try_lock_model<'a, T>(model: &str, mutex: &'a Mutex<T>) -> Option<MutexGuard<'a, T>> {
    match mutex.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::WouldBlock) => None,
        Err(TryLockError::Poisoned(poisoned)) => {
            warn!(model, "Model lock poisoned by a failed inference, recovering");
            mutex.clear_poison();
            Some(poisoned.into_inner())
        }
    }
}

/// Observable readiness state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStatus {
    Unloaded,
    Loaded,
    Probing,
}

enum SlotState<M: ?Sized> {
    Loaded(Arc<M>),
    Unloaded { reason: String },
}

/// Read-only handle to the service's model, shared by every request.
pub struct ModelSlot<M: ?Sized> {
    name: String,
    state: SlotState<M>,
    probes_in_flight: AtomicUsize,
    probe_timeout: Duration,
}

impl<M: ?Sized> ModelSlot<M> {
    pub fn loaded(name: impl Into<String>, model: Arc<M>) -> Self {
        Self::with_state(name.into(), SlotState::Loaded(model))
    }

    pub fn unloaded(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::with_state(
            name.into(),
            SlotState::Unloaded {
                reason: reason.into(),
            },
        )
    }

    /// Build a slot from the outcome of a startup load, logging it.
    pub fn from_load_result<E: Display>(name: impl Into<String>, result: Result<Arc<M>, E>) -> Self {
        let name = name.into();
        match result {
            Ok(model) => {
                info!(model = %name, "Model loaded");
                Self::loaded(name, model)
            }
            Err(e) => {
                error!(model = %name, error = %e, "Model failed to load, serving unhealthy");
                Self::unloaded(name, e.to_string())
            }
        }
    }

    fn with_state(name: String, state: SlotState<M>) -> Self {
        Self {
            name,
            state,
            probes_in_flight: AtomicUsize::new(0),
            probe_timeout: Duration::from_secs(DEFAULT_HEALTH_PROBE_TIMEOUT_SECS),
        }
    }

    /// Set the health probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, SlotState::Loaded(_))
    }

    pub fn status(&self) -> ModelStatus {
        match self.state {
            SlotState::Unloaded { .. } => ModelStatus::Unloaded,
            SlotState::Loaded(_) if self.probes_in_flight.load(Ordering::SeqCst) > 0 => {
                ModelStatus::Probing
            }
            SlotState::Loaded(_) => ModelStatus::Loaded,
        }
    }

    /// The model, or [`ModelError::Unavailable`] if it never loaded.
    pub fn get(&self) -> Result<Arc<M>, ModelError> {
        match &self.state {
            SlotState::Loaded(model) => Ok(Arc::clone(model)),
            SlotState::Unloaded { .. } => Err(ModelError::Unavailable(self.name.clone())),
        }
    }
}

impl<M: ServingModel + ?Sized> ModelSlot<M> {
    /// Health check: run a dummy inference within the probe timeout.
    pub async fn check_health(&self) -> HealthResponse {
        let model = match &self.state {
            SlotState::Loaded(model) => Arc::clone(model),
            SlotState::Unloaded { reason } => {
                return HealthResponse::unhealthy(format!(
                    "{} model not loaded: {}",
                    self.name, reason
                ));
            }
        };

        self.probes_in_flight.fetch_add(1, Ordering::SeqCst);
        let _guard = scopeguard::guard(&self.probes_in_flight, |count| {
            count.fetch_sub(1, Ordering::SeqCst);
        });

        let start = Instant::now();
        let result = tokio::time::timeout(self.probe_timeout, model.probe()).await;
        let elapsed = start.elapsed().as_secs_f64();

        match result {
            Ok(Ok(())) => {
                metrics::record_inference(&self.name, "probe", "success", elapsed);
                HealthResponse::healthy()
            }
            Ok(Err(e)) => {
                warn!(model = %self.name, error = %e, "Health probe failed");
                metrics::record_inference(&self.name, "probe", "error", elapsed);
                HealthResponse::unhealthy(format!("{} model probe failed: {}", self.name, e))
            }
            Err(_) => {
                warn!(
                    model = %self.name,
                    timeout_secs = self.probe_timeout.as_secs_f64(),
                    "Health probe timed out"
                );
                metrics::record_inference(&self.name, "probe", "timeout", elapsed);
                HealthResponse::unhealthy(format!(
                    "{} model probe timed out after {:.1}s",
                    self.name,
                    self.probe_timeout.as_secs_f64()
                ))
            }
        }
    }
}
