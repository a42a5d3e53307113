//! Platform speech through the tts crate
//!
//! Uses Speech Dispatcher on Linux, AVFoundation on macOS and WinRT/SAPI on
//! Windows. The platform APIs cannot render to a file and do not expose
//! output devices, so caching is unsupported and a single device is listed.

use super::{Engine, EngineFactory, LogSink};
use crate::error::{EngineError, EngineResult};
use crate::lock;
use crate::settings::{AudioDevice, PlaybackSettings, VoiceDescriptor, PERCENT_DEFAULT};
use crate::{HarnessError, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use tts::Tts;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Map a percentage onto a backend range, 100% landing on `normal`
pub fn scale_percent(percent: i32, min: f32, normal: f32, max: f32) -> f32 {
    let offset = (percent - PERCENT_DEFAULT) as f32 / PERCENT_DEFAULT as f32;
    let value = if offset >= 0.0 {
        normal + (max - normal) * offset
    } else {
        normal + (normal - min) * offset
    };
    value.clamp(min, max)
}

/// Factory for platform speech sessions
pub struct NativeFactory;

impl NativeFactory {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NativeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineFactory for NativeFactory {
    fn name(&self) -> &'static str {
        "native"
    }

    fn create(&self, _cache_dir: &Path, log: LogSink) -> Result<Box<dyn Engine>> {
        let tts = Tts::default()
            .map_err(|e| HarnessError::Initialization(format!("Failed to initialize TTS: {}", e)))?;
        Ok(Box::new(NativeEngine::new(tts, log)))
    }

    fn voices(&self) -> Vec<VoiceDescriptor> {
        let voices = Tts::default().and_then(|tts| tts.voices());
        match voices {
            Ok(voices) => voices
                .iter()
                .map(|v| VoiceDescriptor::new(v.id(), v.name()))
                .collect(),
            Err(e) => {
                warn!("Failed to list platform voices: {}", e);
                Vec::new()
            }
        }
    }

    fn audio_devices(&self) -> Vec<AudioDevice> {
        vec![AudioDevice {
            id: 0,
            name: "System default".to_string(),
        }]
    }

    fn default_audio_device_id(&self) -> i32 {
        0
    }
}

/// One platform speech session
pub struct NativeEngine {
    tts: Mutex<Tts>,
    log: LogSink,
    disposed: AtomicBool,
}

impl NativeEngine {
    pub fn new(tts: Tts, log: LogSink) -> Self {
        Self {
            tts: Mutex::new(tts),
            log,
            disposed: AtomicBool::new(false),
        }
    }

    fn apply(&self, tts: &mut Tts, settings: &PlaybackSettings) -> EngineResult<()> {
        let features = tts.supported_features();

        if features.rate {
            let rate = scale_percent(settings.speed, tts.min_rate(), tts.normal_rate(), tts.max_rate());
            tts.set_rate(rate)
                .map_err(|e| EngineError::other(format!("Failed to set rate: {}", e)))?;
        }
        if features.volume {
            let volume = scale_percent(
                settings.volume,
                tts.min_volume(),
                tts.normal_volume(),
                tts.max_volume(),
            );
            tts.set_volume(volume)
                .map_err(|e| EngineError::other(format!("Failed to set volume: {}", e)))?;
        }
        if features.pitch {
            let pitch = scale_percent(settings.pitch, tts.min_pitch(), tts.normal_pitch(), tts.max_pitch());
            tts.set_pitch(pitch)
                .map_err(|e| EngineError::other(format!("Failed to set pitch: {}", e)))?;
        }
        if features.voice {
            let voices = tts
                .voices()
                .map_err(|e| EngineError::other(format!("Failed to get voices: {}", e)))?;
            match voices.iter().find(|v| v.id() == settings.voice) {
                Some(voice) => tts
                    .set_voice(voice)
                    .map_err(|e| EngineError::other(format!("Failed to set voice: {}", e)))?,
                None => (self.log)(&format!("Voice {} not available, using default", settings.voice)),
            }
        }
        Ok(())
    }

    fn is_speaking(&self) -> bool {
        let tts = lock(&self.tts);
        if !tts.supported_features().is_speaking {
            return false;
        }
        tts.is_speaking().unwrap_or(false)
    }
}

impl Engine for NativeEngine {
    fn speak(&self, text: &str, settings: &PlaybackSettings) -> EngineResult<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(EngineError::other("session has been disposed"));
        }
        if text.trim().is_empty() {
            return Ok(());
        }

        {
            let mut tts = lock(&self.tts);
            self.apply(&mut tts, settings)?;
            debug!("Speaking: {}", text);
            tts.speak(text, true)
                .map_err(|e| EngineError::other(format!("Speak failed: {}", e)))?;
        }

        while self.is_speaking() {
            thread::sleep(POLL_INTERVAL);
        }
        Ok(())
    }

    fn get_audio_file(&self, _text: &str, _settings: &PlaybackSettings) -> EngineResult<PathBuf> {
        Err(EngineError::other(
            "platform speech cannot render audio files",
        ))
    }

    fn stop(&self) -> EngineResult<()> {
        debug!("Canceling speech");
        lock(&self.tts)
            .stop()
            .map(|_| ())
            .map_err(|e| EngineError::other(format!("Cancel failed: {}", e)))
    }

    fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            if let Err(e) = lock(&self.tts).stop() {
                debug!("Failed to stop speech while disposing: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_percent() {
        assert_eq!(scale_percent(100, 0.0, 1.0, 2.0), 1.0);
        assert_eq!(scale_percent(200, 0.0, 1.0, 2.0), 2.0);
        assert_eq!(scale_percent(0, 0.0, 1.0, 2.0), 0.0);
        assert_eq!(scale_percent(50, 0.0, 1.0, 3.0), 0.5);
        assert_eq!(scale_percent(150, 0.0, 1.0, 3.0), 2.0);
    }

    #[test]
    fn test_create_native_engine() {
        // no speech service on headless machines; only a created session is checked
        let log: LogSink = std::sync::Arc::new(|_: &str| {});
        if let Ok(engine) = NativeFactory::new().create(Path::new("."), log) {
            assert!(engine.stop().is_ok());
            let err = engine
                .get_audio_file("hello", &PlaybackSettings::new("en"))
                .unwrap_err();
            assert!(!err.is_connection());
            engine.dispose();
            engine.dispose();
        }
    }
}
