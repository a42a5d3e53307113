//! The controller's single, replaceable engine session

use crate::engine::Engine;
use log::debug;
use std::sync::Arc;

/// Holds at most one live session
///
/// Every installed session gets a new generation number. A request remembers
/// the generation it used, so after a failure it can tell whether the session
/// is still the one that failed or has already been replaced by a reset or
/// idle reconnect.
#[derive(Default)]
pub(crate) struct SessionSlot {
    current: Option<Arc<dyn Engine>>,
    generation: u64,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live session and its generation
    pub fn current(&self) -> Option<(Arc<dyn Engine>, u64)> {
        self.current
            .as_ref()
            .map(|engine| (Arc::clone(engine), self.generation))
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Remove the live session without disposing it
    pub fn take(&mut self) -> Option<Arc<dyn Engine>> {
        if self.current.is_some() {
            debug!("Session generation {} taken out for replacement", self.generation);
        }
        self.current.take()
    }

    /// Dispose the live session, leaving the slot empty
    ///
    /// Returns whether there was a session to dispose.
    pub fn dispose_current(&mut self) -> bool {
        match self.current.take() {
            Some(engine) => {
                debug!("Disposing session generation {}", self.generation);
                engine.dispose();
                true
            }
            None => false,
        }
    }

    /// Install a new session; the previous one must already be disposed
    pub fn install(&mut self, engine: Arc<dyn Engine>) -> u64 {
        debug_assert!(self.current.is_none(), "previous session not disposed");
        self.generation += 1;
        self.current = Some(engine);
        self.generation
    }
}
