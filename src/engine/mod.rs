//! Speech engine boundary
//!
//! The request controller only ever talks to an engine through the
//! [`Engine`] and [`EngineFactory`] traits. Concrete adapters live in
//! submodules; [`create_factory`] picks one for the running platform.

pub mod espeak;

#[cfg(feature = "edge")]
pub mod edge;

#[cfg(feature = "native")]
pub mod native;

use crate::error::EngineResult;
use crate::settings::{AudioDevice, PlaybackSettings, VoiceDescriptor};
use crate::{HarnessError, Result};
use log::info;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Destination for human-readable engine and controller messages
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// A live session with a speech engine
///
/// All methods take `&self` so one session can be stopped from another
/// thread while a speak call is blocked inside it.
pub trait Engine: Send + Sync {
    /// Synthesize `text` and play it, returning once playback finished or was stopped
    fn speak(&self, text: &str, settings: &PlaybackSettings) -> EngineResult<()>;

    /// Synthesize `text` into the cache directory and return the file path
    fn get_audio_file(&self, text: &str, settings: &PlaybackSettings) -> EngineResult<PathBuf>;

    /// Halt current playback (best effort)
    fn stop(&self) -> EngineResult<()>;

    /// Release resources; calling it more than once is harmless
    fn dispose(&self);
}

/// Creates engine sessions and answers catalog queries
pub trait EngineFactory: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Create a new session bound to a cache directory and log sink
    fn create(&self, cache_dir: &Path, log: LogSink) -> Result<Box<dyn Engine>>;

    /// Voices this engine accepts, in display order
    fn voices(&self) -> Vec<VoiceDescriptor>;

    /// Output devices, in display order
    fn audio_devices(&self) -> Vec<AudioDevice>;

    /// Id of the device used when nothing else is selected
    fn default_audio_device_id(&self) -> i32;
}

/// Which engine adapter to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// Best available: edge when compiled in, otherwise espeak
    Auto,
    Edge,
    Espeak,
    Native,
}

impl FromStr for EngineKind {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(EngineKind::Auto),
            "edge" => Ok(EngineKind::Edge),
            "espeak" | "espeak-ng" => Ok(EngineKind::Espeak),
            "native" => Ok(EngineKind::Native),
            other => Err(HarnessError::Config(format!("unknown engine kind '{}'", other))),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineKind::Auto => "auto",
            EngineKind::Edge => "edge",
            EngineKind::Espeak => "espeak",
            EngineKind::Native => "native",
        };
        write!(f, "{}", name)
    }
}

/// Create the factory for the requested engine kind
///
/// Kinds whose cargo feature is not enabled are reported as configuration
/// errors rather than silently replaced.
pub fn create_factory(kind: EngineKind) -> Result<Arc<dyn EngineFactory>> {
    match kind {
        EngineKind::Auto => {
            #[cfg(feature = "edge")]
            {
                info!("Using Edge online voices");
                Ok(Arc::new(edge::EdgeFactory::new()))
            }
            #[cfg(not(feature = "edge"))]
            {
                info!("Edge support not compiled in, using espeak-ng");
                Ok(Arc::new(espeak::EspeakFactory::new()))
            }
        }
        EngineKind::Edge => {
            #[cfg(feature = "edge")]
            {
                Ok(Arc::new(edge::EdgeFactory::new()))
            }
            #[cfg(not(feature = "edge"))]
            {
                Err(HarnessError::Config(
                    "edge engine requires building with --features edge".to_string(),
                ))
            }
        }
        EngineKind::Espeak => Ok(Arc::new(espeak::EspeakFactory::new())),
        EngineKind::Native => {
            #[cfg(feature = "native")]
            {
                Ok(Arc::new(native::NativeFactory::new()))
            }
            #[cfg(not(feature = "native"))]
            {
                Err(HarnessError::Config(
                    "native engine requires building with --features native".to_string(),
                ))
            }
        }
    }
}

/// Cache path for a rendering of `text` with `settings`
///
/// The name is a SHA-256 over everything that changes the audio, so the same
/// request always maps to the same file. The output device is not part of it.
pub fn cache_file_path(
    cache_dir: &Path,
    text: &str,
    settings: &PlaybackSettings,
    extension: &str,
) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(settings.voice.as_bytes());
    hasher.update([0]);
    hasher.update(settings.volume.to_le_bytes());
    hasher.update(settings.speed.to_le_bytes());
    hasher.update(settings.pitch.to_le_bytes());
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();

    cache_dir.join(format!("{:x}.{}", digest, extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_kind_parse() {
        assert_eq!("auto".parse::<EngineKind>().unwrap(), EngineKind::Auto);
        assert_eq!("".parse::<EngineKind>().unwrap(), EngineKind::Auto);
        assert_eq!("Edge".parse::<EngineKind>().unwrap(), EngineKind::Edge);
        assert_eq!("espeak-ng".parse::<EngineKind>().unwrap(), EngineKind::Espeak);
        assert!("sapi".parse::<EngineKind>().is_err());
    }

    #[test]
    fn test_cache_file_path_is_stable() {
        let dir = Path::new("/tmp/cache");
        let settings = PlaybackSettings::new("en-US-AriaNeural");

        let a = cache_file_path(dir, "hello", &settings, "mp3");
        let b = cache_file_path(dir, "hello", &settings, "mp3");
        assert_eq!(a, b);
        assert!(a.starts_with(dir));
        assert_eq!(a.extension().and_then(|e| e.to_str()), Some("mp3"));

        let mut faster = settings.clone();
        faster.speed = 150;
        assert_ne!(a, cache_file_path(dir, "hello", &faster, "mp3"));
        assert_ne!(a, cache_file_path(dir, "hello!", &settings, "mp3"));

        let mut other_device = settings.clone();
        other_device.audio_device_id = Some(3);
        assert_eq!(a, cache_file_path(dir, "hello", &other_device, "mp3"));
    }

    #[test]
    fn test_espeak_factory_available() {
        let factory = create_factory(EngineKind::Espeak).unwrap();
        assert_eq!(factory.name(), "espeak");
    }
}
