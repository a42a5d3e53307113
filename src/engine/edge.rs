//! Microsoft Edge online voices
//!
//! Text is synthesized over the Edge "read aloud" websocket with the
//! `msedge-tts` client and played with `rodio` on the selected output device.
//! Any failure to reach or talk to the service is a connection-class error;
//! the controller reacts by replacing the session.

use super::{cache_file_path, Engine, EngineFactory, LogSink};
use crate::catalog::EDGE_VOICES;
use crate::error::{EngineError, EngineResult};
use crate::lock;
use crate::settings::{AudioDevice, PlaybackSettings, VoiceDescriptor};
use crate::Result;
use log::{debug, warn};
use msedge_tts::tts::client::connect;
use msedge_tts::tts::SpeechConfig;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{Decoder, OutputStream, Sink};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

const AUDIO_FORMAT: &str = "audio-24khz-48kbitrate-mono-mp3";

/// Output devices in host enumeration order; the index is the device id
fn output_devices() -> Vec<rodio::cpal::Device> {
    match rodio::cpal::default_host().output_devices() {
        Ok(devices) => devices.collect(),
        Err(e) => {
            warn!("Failed to enumerate output devices: {}", e);
            Vec::new()
        }
    }
}

/// Write `audio` to `path` through a sibling `.part` file
///
/// Only complete files ever appear under the cache name.
fn store_audio(path: &Path, audio: &[u8]) -> EngineResult<()> {
    let partial = path.with_extension("mp3.part");
    let result = fs::write(&partial, audio).and_then(|()| fs::rename(&partial, path));
    if let Err(e) = result {
        let _ = fs::remove_file(&partial);
        return Err(EngineError::other(format!(
            "cannot write {}: {}",
            path.display(),
            e
        )));
    }
    Ok(())
}

/// Factory for Edge sessions
pub struct EdgeFactory;

impl EdgeFactory {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EdgeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineFactory for EdgeFactory {
    fn name(&self) -> &'static str {
        "edge"
    }

    fn create(&self, cache_dir: &Path, log: LogSink) -> Result<Box<dyn Engine>> {
        fs::create_dir_all(cache_dir)?;
        Ok(Box::new(EdgeEngine::new(cache_dir.to_path_buf(), log)))
    }

    fn voices(&self) -> Vec<VoiceDescriptor> {
        EDGE_VOICES.clone()
    }

    fn audio_devices(&self) -> Vec<AudioDevice> {
        output_devices()
            .iter()
            .enumerate()
            .map(|(idx, device)| AudioDevice {
                id: idx as i32,
                name: device.name().unwrap_or_else(|_| format!("Device {}", idx)),
            })
            .collect()
    }

    fn default_audio_device_id(&self) -> i32 {
        let default_name = rodio::cpal::default_host()
            .default_output_device()
            .and_then(|d| d.name().ok());

        let Some(default_name) = default_name else {
            return -1;
        };
        output_devices()
            .iter()
            .position(|d| d.name().ok().as_deref() == Some(default_name.as_str()))
            .map(|idx| idx as i32)
            .unwrap_or(-1)
    }
}

/// One Edge session
pub struct EdgeEngine {
    cache_dir: PathBuf,
    log: LogSink,

    /// Sink of the playback in progress, kept so `stop` can reach it
    sink: Mutex<Option<Arc<Sink>>>,

    disposed: AtomicBool,
}

impl EdgeEngine {
    pub fn new(cache_dir: PathBuf, log: LogSink) -> Self {
        Self {
            cache_dir,
            log,
            sink: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    fn ensure_live(&self) -> EngineResult<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(EngineError::other("session has been disposed"));
        }
        Ok(())
    }

    fn speech_config(settings: &PlaybackSettings) -> SpeechConfig {
        let (volume, rate, pitch) = settings.offsets();
        SpeechConfig {
            voice_name: settings.voice.clone(),
            audio_format: AUDIO_FORMAT.to_string(),
            pitch,
            rate,
            volume,
        }
    }

    /// Fetch synthesized MP3 bytes from the service
    fn synthesize(&self, text: &str, settings: &PlaybackSettings) -> EngineResult<Vec<u8>> {
        let config = Self::speech_config(settings);

        debug!("Connecting to Edge TTS...");
        let mut client = connect().map_err(|e| {
            EngineError::connection(format!("failed to connect to Edge TTS: {}", e))
        })?;

        debug!("Synthesizing {} chars with {}", text.len(), settings.voice);
        let response = client.synthesize(text, &config).map_err(|e| {
            EngineError::connection(format!("Edge TTS synthesis failed: {}", e))
        })?;

        if response.audio_bytes.is_empty() {
            return Err(EngineError::other("no audio data returned from Edge TTS"));
        }
        Ok(response.audio_bytes)
    }

    fn play(&self, audio: Vec<u8>, device_id: Option<i32>) -> EngineResult<()> {
        let device = device_id
            .filter(|id| *id >= 0)
            .and_then(|id| output_devices().into_iter().nth(id as usize));

        let (_stream, handle) = match device {
            Some(ref device) => OutputStream::try_from_device(device),
            None => OutputStream::try_default(),
        }
        .map_err(|e| EngineError::other(format!("cannot open audio output: {}", e)))?;

        let sink = Arc::new(
            Sink::try_new(&handle)
                .map_err(|e| EngineError::other(format!("cannot create audio sink: {}", e)))?,
        );
        let source = Decoder::new(Cursor::new(audio))
            .map_err(|e| EngineError::other(format!("cannot decode audio: {}", e)))?;
        sink.append(source);

        *lock(&self.sink) = Some(Arc::clone(&sink));
        sink.sleep_until_end();
        lock(&self.sink).take();

        Ok(())
    }
}

impl Engine for EdgeEngine {
    fn speak(&self, text: &str, settings: &PlaybackSettings) -> EngineResult<()> {
        self.ensure_live()?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let cached = cache_file_path(&self.cache_dir, text, settings, "mp3");
        let audio = if cached.exists() {
            debug!("Playing cached audio {}", cached.display());
            fs::read(&cached)
                .map_err(|e| EngineError::other(format!("cannot read cached audio: {}", e)))?
        } else {
            self.synthesize(text, settings)?
        };

        self.play(audio, settings.audio_device_id)
    }

    fn get_audio_file(&self, text: &str, settings: &PlaybackSettings) -> EngineResult<PathBuf> {
        self.ensure_live()?;
        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::other("nothing to render"));
        }

        let path = cache_file_path(&self.cache_dir, text, settings, "mp3");
        if path.exists() {
            (self.log)(&format!("Using cached audio: {}", path.display()));
            return Ok(path);
        }

        let audio = self.synthesize(text, settings)?;
        store_audio(&path, &audio)?;
        Ok(path)
    }

    fn stop(&self) -> EngineResult<()> {
        if let Some(sink) = lock(&self.sink).take() {
            debug!("Stopping Edge playback");
            sink.stop();
        }
        Ok(())
    }

    fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            debug!("Disposing Edge session");
            if let Some(sink) = lock(&self.sink).take() {
                sink.stop();
            }
        }
    }
}

impl Drop for EdgeEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speech_config_offsets() {
        let mut settings = PlaybackSettings::new("en-US-AriaNeural");
        settings.volume = 120;
        settings.speed = 50;
        settings.pitch = 100;

        let config = EdgeEngine::speech_config(&settings);
        assert_eq!(config.voice_name, "en-US-AriaNeural");
        assert_eq!(config.volume, 20);
        assert_eq!(config.rate, -50);
        assert_eq!(config.pitch, 0);
    }

    #[test]
    fn test_store_audio_leaves_no_partial_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("clip.mp3");

        store_audio(&path, b"ID3 data").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"ID3 data");
        assert!(!dir.path().join("clip.mp3.part").exists());

        let missing = dir.path().join("gone").join("clip.mp3");
        assert!(store_audio(&missing, b"ID3").is_err());
        assert!(!missing.exists());
    }

    #[test]
    fn test_factory_voices_come_from_catalog() {
        let voices = EdgeFactory::new().voices();
        assert_eq!(voices.len(), EDGE_VOICES.len());
    }
}
