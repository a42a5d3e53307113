//! speech-harness - interactive test bench for text-to-speech engines
//!
//! Speaks or caches text through a pluggable engine, with voice and device
//! selection, percentage sliders and a retry/reconnect controller that keeps
//! a long-lived engine session healthy.

pub mod catalog;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod input;
pub mod log_pane;
pub mod panel;
pub mod settings;

pub use error::{HarnessError, Result};

use std::sync::{Mutex, MutexGuard};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "speech-harness";

/// Lock a mutex, carrying on with the data if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
