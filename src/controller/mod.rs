//! Playback/cache request controller
//!
//! Owns the single engine session and runs every speak or cache request
//! through a bounded retry loop:
//!
//! ```text
//! Idle -> Attempting(n) -> Succeeded
//!                       -> Failed
//!                       -> Retrying(n+1) -> Attempting(n+1)
//! ```
//!
//! Only connection-class failures are retried, and only while
//! `n + 1 < max_retries`; before each retry the session is disposed and
//! recreated. The busy flag, the session slot and the connection clock live
//! behind one mutex that is only held for quick reads and swaps. Replacing
//! the session (dispose, then create) is serialized by a second mutex, taken
//! before the first, so stop and status never wait on an engine starting up.

mod idle;
mod session;

pub use idle::{Clock, IdleTimer, ManualClock, SystemClock};

use crate::engine::{Engine, EngineFactory, LogSink};
use crate::error::EngineResult;
use crate::settings::PlaybackSettings;
use crate::{lock, HarnessError, Result};
use log::{debug, info, Level};
use session::SessionSlot;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

/// Total attempts per request, including the first
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Pause between a reconnect and the next attempt
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
/// Unused sessions older than this are recreated
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// How often the event loop runs the idle check
pub const DEFAULT_IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(3);

/// Retry and reconnect policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// `None` disables the idle reconnect
    pub idle_timeout: Option<Duration>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
        }
    }
}

/// The two request types the controller runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Speak,
    Cache,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Speak => write!(f, "Speak"),
            RequestKind::Cache => write!(f, "Cache"),
        }
    }
}

/// Where the in-flight request is, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Idle,
    /// Zero-based attempt number
    Attempting(RequestKind, u32),
    /// Reconnecting before the given attempt
    Retrying(RequestKind, u32),
}

struct Inner {
    slot: SessionSlot,
    busy: bool,
    phase: RequestPhase,
    last_used: Instant,
}

/// Runs speak/cache requests against a replaceable engine session
pub struct Controller {
    factory: Arc<dyn EngineFactory>,
    cache_dir: PathBuf,
    log: LogSink,
    config: ControllerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
    /// Held for a whole replacement; always locked before `inner`
    replacing: Mutex<()>,
}

/// Clears the busy flag when a request ends, however it ends
struct BusyGuard<'a> {
    controller: &'a Controller,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let mut inner = lock(&self.controller.inner);
        inner.busy = false;
        inner.phase = RequestPhase::Idle;
    }
}

impl Controller {
    /// Create a controller without a session; call [`Controller::initialize`] next
    pub fn new(
        factory: Arc<dyn EngineFactory>,
        cache_dir: impl Into<PathBuf>,
        log: LogSink,
        config: ControllerConfig,
    ) -> Self {
        Self::with_clock(factory, cache_dir, log, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        factory: Arc<dyn EngineFactory>,
        cache_dir: impl Into<PathBuf>,
        log: LogSink,
        config: ControllerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        Self {
            factory,
            cache_dir: cache_dir.into(),
            log,
            config,
            clock,
            inner: Mutex::new(Inner {
                slot: SessionSlot::new(),
                busy: false,
                phase: RequestPhase::Idle,
                last_used: now,
            }),
            replacing: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn factory(&self) -> &Arc<dyn EngineFactory> {
        &self.factory
    }

    fn emit(&self, level: Level, message: &str) {
        log::log!(level, "{}", message);
        (self.log)(message);
    }

    /// Create the first session if there is none
    pub fn initialize(&self) -> Result<()> {
        let _replacing = lock(&self.replacing);
        if !lock(&self.inner).slot.is_empty() {
            return Ok(());
        }
        self.swap_in(None, "startup")
    }

    /// Dispose the session taken out of the slot and install a new one
    ///
    /// Must be called with `replacing` held and `inner` released. On failure
    /// the slot stays empty. Either way the connection clock restarts, so a
    /// failed attempt also waits a full idle period before the next one.
    fn swap_in(&self, previous: Option<Arc<dyn Engine>>, reason: &str) -> Result<()> {
        if let Some(engine) = previous {
            engine.dispose();
            debug!("Previous session disposed ({})", reason);
        }

        let created = self.factory.create(&self.cache_dir, Arc::clone(&self.log));

        let mut inner = lock(&self.inner);
        inner.last_used = self.clock.now();
        match created {
            Ok(engine) => {
                let generation = inner.slot.install(Arc::from(engine));
                drop(inner);
                self.emit(
                    Level::Info,
                    &format!(
                        "{} engine initialized ({}, session {})",
                        self.factory.name(),
                        reason,
                        generation
                    ),
                );
                Ok(())
            }
            Err(e) => {
                drop(inner);
                let err = match e {
                    HarnessError::Initialization(_) => e,
                    other => HarnessError::Initialization(other.to_string()),
                };
                self.emit(Level::Error, &err.to_string());
                Err(err)
            }
        }
    }

    /// Manual reset: replace the session and restart the clock
    ///
    /// Runs regardless of in-flight requests; they keep their handle to the
    /// old session and pick up the new one on their next attempt.
    pub fn reset_session(&self) -> Result<()> {
        let _replacing = lock(&self.replacing);
        let previous = lock(&self.inner).slot.take();
        self.swap_in(previous, "manual reset")
    }

    /// Periodic idle check
    ///
    /// Replaces the session when the time since its last use strictly exceeds
    /// the idle timeout. Skipped while a request is in flight or another
    /// replacement is running. Returns whether a reconnect happened.
    pub fn check_idle(&self) -> Result<bool> {
        let Some(timeout) = self.config.idle_timeout else {
            return Ok(false);
        };

        let _replacing = match self.replacing.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return Ok(false),
        };

        let (previous, elapsed) = {
            let mut inner = lock(&self.inner);
            if inner.busy {
                return Ok(false);
            }
            let elapsed = self.clock.now().saturating_duration_since(inner.last_used);
            if elapsed <= timeout {
                return Ok(false);
            }
            (inner.slot.take(), elapsed)
        };

        self.emit(
            Level::Info,
            &format!("Idle for {}s, reconnecting engine", elapsed.as_secs()),
        );
        self.swap_in(previous, "idle timeout")?;
        Ok(true)
    }

    /// Forward a stop to the live session
    ///
    /// Failures are logged, never returned. Returns whether a session was there.
    pub fn stop(&self) -> bool {
        let session = lock(&self.inner).slot.current();
        let Some((engine, _)) = session else {
            return false;
        };

        match engine.stop() {
            Ok(()) => self.emit(Level::Info, "Playback stopped"),
            Err(e) => self.emit(Level::Warn, &format!("Failed to stop playback: {}", e)),
        }
        true
    }

    pub fn is_busy(&self) -> bool {
        lock(&self.inner).busy
    }

    pub fn has_session(&self) -> bool {
        !lock(&self.inner).slot.is_empty()
    }

    pub fn phase(&self) -> RequestPhase {
        lock(&self.inner).phase
    }

    /// Generation number of the live session (increments on every replacement)
    pub fn session_generation(&self) -> u64 {
        lock(&self.inner).slot.generation()
    }

    /// Time since the session was last used or recreated
    pub fn idle_for(&self) -> Duration {
        let last_used = lock(&self.inner).last_used;
        self.clock.now().saturating_duration_since(last_used)
    }

    /// Speak `text`, retrying on connection failures
    pub fn speak(&self, text: &str, settings: &PlaybackSettings) -> Result<()> {
        self.run(RequestKind::Speak, |engine| engine.speak(text, settings))
    }

    /// Render `text` into the cache, retrying on connection failures
    pub fn get_audio_file(&self, text: &str, settings: &PlaybackSettings) -> Result<PathBuf> {
        self.run(RequestKind::Cache, |engine| engine.get_audio_file(text, settings))
    }

    /// Claim the busy flag for a new request
    fn begin(&self, kind: RequestKind) -> Result<BusyGuard<'_>> {
        let mut inner = lock(&self.inner);
        if inner.slot.is_empty() {
            return Err(HarnessError::NotInitialized);
        }
        if inner.busy {
            drop(inner);
            self.emit(
                Level::Warn,
                &format!("{} rejected: another request is in progress", kind),
            );
            return Err(HarnessError::Busy);
        }
        inner.busy = true;
        inner.phase = RequestPhase::Attempting(kind, 0);
        Ok(BusyGuard { controller: self })
    }

    fn run<T, F>(&self, kind: RequestKind, op: F) -> Result<T>
    where
        F: Fn(&dyn Engine) -> EngineResult<T>,
    {
        let _busy = self.begin(kind)?;
        let max_attempts = self.config.max_retries.max(1);
        let mut attempt = 0;

        loop {
            let (engine, generation) = {
                let mut inner = lock(&self.inner);
                inner.phase = RequestPhase::Attempting(kind, attempt);
                inner.slot.current().ok_or(HarnessError::NotInitialized)?
            };

            self.emit(
                Level::Info,
                &format!("{} attempt {}/{}", kind, attempt + 1, max_attempts),
            );

            let err = match op(engine.as_ref()) {
                Ok(value) => {
                    lock(&self.inner).last_used = self.clock.now();
                    self.emit(Level::Info, &format!("{} succeeded", kind));
                    return Ok(value);
                }
                Err(err) => err,
            };
            drop(engine);

            self.emit(Level::Warn, &format!("{} failed: {}", kind, err));
            if !err.is_connection() || attempt + 1 >= max_attempts {
                return Err(err.into());
            }

            attempt += 1;
            self.reconnect_for_retry(kind, attempt, generation)?;

            if !self.config.retry_delay.is_zero() {
                thread::sleep(self.config.retry_delay);
            }
        }
    }

    /// Replace the session that failed, unless someone already did
    fn reconnect_for_retry(&self, kind: RequestKind, attempt: u32, failed_generation: u64) -> Result<()> {
        let _replacing = lock(&self.replacing);
        let previous = {
            let mut inner = lock(&self.inner);
            inner.phase = RequestPhase::Retrying(kind, attempt);

            if inner.slot.generation() != failed_generation && !inner.slot.is_empty() {
                info!("Session already replaced, retrying on the new one");
                inner.last_used = self.clock.now();
                return Ok(());
            }
            inner.slot.take()
        };

        self.emit(
            Level::Info,
            &format!(
                "Reconnecting after connection failure (retry {}/{})",
                attempt,
                self.config.max_retries.max(1) - 1
            ),
        );
        self.swap_in(previous, "reconnect")
    }

    /// Dispose the live session, if any
    pub fn shutdown(&self) {
        let mut inner = lock(&self.inner);
        if inner.slot.dispose_current() {
            info!("Engine session disposed");
        } else {
            debug!("Shutdown without a live session");
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        let inner = match self.inner.get_mut() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner.slot.dispose_current();
    }
}
