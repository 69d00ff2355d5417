use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

use crate::config::ModelConfig;
use crate::detector::Detector;
use crate::error::Error;

/// Mutex-guarded single-initialization slot.
///
/// The guard is held across the initializer, so concurrent first callers
/// block until the one running initializer finishes and then share its value.
/// A failed initializer leaves the slot empty and the next call retries.
pub(crate) struct OnceSlot<T> {
    slot: Mutex<Option<T>>,
}

impl<T: Clone> OnceSlot<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    pub(crate) fn get_or_try_init<E>(
        &self,
        init: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = slot.as_ref() {
            return Ok(value.clone());
        }
        let value = init()?;
        *slot = Some(value.clone());
        Ok(value)
    }

    pub(crate) fn initialized(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Process-wide handle to the detector.
///
/// The expensive session build runs at most once; every `get` after that
/// returns a clone of the same `Arc`. The detector itself is read-only once
/// loaded, so the handle can be shared freely.
pub struct SharedDetector {
    config: ModelConfig,
    slot: OnceSlot<Arc<Detector>>,
}

impl SharedDetector {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            slot: OnceSlot::new(),
        }
    }

    /// Return the loaded detector, loading it first if this is the first call.
    pub fn get(&self) -> Result<Arc<Detector>, Error> {
        self.slot.get_or_try_init(|| {
            info!(model = %self.config.path.display(), "loading detector");
            Detector::load(&self.config).map(Arc::new)
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.initialized()
    }
}
