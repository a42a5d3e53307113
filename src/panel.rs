//! The harness panel: widget state and button actions
//!
//! Mirrors a window with a text box, voice and device pickers, three
//! percentage sliders, speak/stop/cache/reset buttons and a log. Requests run
//! on worker threads so stop and status stay responsive while audio plays.

use crate::catalog::{find_voice, search_voices};
use crate::config::Config;
use crate::controller::Controller;
use crate::log_pane::LogPane;
use crate::settings::{AudioDevice, Percent, PlaybackSettings, VoiceDescriptor};
use crate::{HarnessError, Result};
use log::{debug, error};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Initial panel values
#[derive(Debug, Clone)]
pub struct PanelDefaults {
    /// Preselected voice (first voice whose id contains this)
    pub voice: String,
    pub text: String,
    pub volume: Percent,
    pub speed: Percent,
    pub pitch: Percent,
}

impl PanelDefaults {
    pub fn from_config(config: &Config) -> Self {
        Self {
            voice: config.default_voice(),
            text: config.initial_text(),
            volume: config.volume(),
            speed: config.speed(),
            pitch: config.pitch(),
        }
    }
}

/// Which slider a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slider {
    Volume,
    Speed,
    Pitch,
}

/// Window-equivalent state driving the controller
pub struct Panel {
    controller: Arc<Controller>,
    log: Arc<LogPane>,

    voices: Vec<VoiceDescriptor>,
    devices: Vec<AudioDevice>,
    default_voice: String,

    /// Text to speak or cache
    pub text: String,
    voice_idx: Option<usize>,
    device_id: i32,
    volume: Percent,
    speed: Percent,
    pitch: Percent,

    workers: Vec<JoinHandle<()>>,
}

impl Panel {
    /// Build the panel, initialize the engine and populate the pickers
    ///
    /// An engine that fails to initialize is reported but does not prevent the
    /// panel from coming up; reset or the idle check will try again.
    pub fn new(controller: Arc<Controller>, log: Arc<LogPane>, defaults: PanelDefaults) -> Self {
        if let Err(e) = controller.initialize() {
            log.notify("Error", &e.to_string());
        }

        let factory = Arc::clone(controller.factory());
        let mut panel = Self {
            controller,
            log,
            voices: Vec::new(),
            devices: Vec::new(),
            default_voice: defaults.voice,
            text: defaults.text,
            voice_idx: None,
            device_id: factory.default_audio_device_id(),
            volume: defaults.volume,
            speed: defaults.speed,
            pitch: defaults.pitch,
            workers: Vec::new(),
        };

        panel.load_audio_devices(factory.audio_devices());
        panel
            .log
            .append(&format!("Default audio device: {}", panel.device_id));
        panel.load_voices(factory.voices());
        panel.log.append("Speech harness initialized");
        panel
    }

    /// Populate the voice picker and select the default voice
    fn load_voices(&mut self, voices: Vec<VoiceDescriptor>) {
        self.voices = voices;
        self.select_default_voice();
        self.log
            .append(&format!("Loaded {} voices", self.voices.len()));
    }

    fn select_default_voice(&mut self) {
        self.voice_idx = find_voice(&self.voices, &self.default_voice)
            .or_else(|| (!self.voices.is_empty()).then_some(0));
    }

    /// Populate the device picker and select the default device
    ///
    /// Falls back to the first device (adopting its id) when the default id
    /// is not in the list.
    fn load_audio_devices(&mut self, devices: Vec<AudioDevice>) {
        self.devices = devices;
        if !self.devices.iter().any(|d| d.id == self.device_id) {
            if let Some(first) = self.devices.first() {
                self.device_id = first.id;
            }
        }
        self.log
            .append(&format!("Loaded {} audio devices", self.devices.len()));
    }

    pub fn voices(&self) -> &[VoiceDescriptor] {
        &self.voices
    }

    pub fn devices(&self) -> &[AudioDevice] {
        &self.devices
    }

    pub fn selected_voice(&self) -> Option<&VoiceDescriptor> {
        self.voice_idx.and_then(|idx| self.voices.get(idx))
    }

    pub fn device_id(&self) -> i32 {
        self.device_id
    }

    pub fn controller(&self) -> &Arc<Controller> {
        &self.controller
    }

    pub fn log(&self) -> &Arc<LogPane> {
        &self.log
    }

    /// Select a voice by list index
    pub fn select_voice(&mut self, idx: usize) -> Result<()> {
        let voice = self
            .voices
            .get(idx)
            .ok_or_else(|| HarnessError::InvalidInput(format!("no voice #{}", idx)))?;
        self.log.append(&format!("Selected voice: {}", voice));
        self.voice_idx = Some(idx);
        Ok(())
    }

    /// Select a voice by identifier (exact match first, then substring)
    pub fn select_voice_by_value(&mut self, value: &str) -> Result<()> {
        let idx = self
            .voices
            .iter()
            .position(|v| v.value == value)
            .or_else(|| find_voice(&self.voices, value))
            .ok_or_else(|| HarnessError::InvalidInput(format!("unknown voice '{}'", value)))?;
        self.select_voice(idx)
    }

    /// Select a device by list index; out-of-range indexes are ignored
    pub fn select_device(&mut self, idx: usize) -> bool {
        let Some(device) = self.devices.get(idx) else {
            debug!("Device index {} out of range", idx);
            return false;
        };
        self.device_id = device.id;
        self.log
            .append(&format!("Selected audio device: {}", device));
        true
    }

    pub fn slider(&self, slider: Slider) -> Percent {
        match slider {
            Slider::Volume => self.volume,
            Slider::Speed => self.speed,
            Slider::Pitch => self.pitch,
        }
    }

    /// Move a slider; values outside 0-200 are rejected
    pub fn set_slider(&mut self, slider: Slider, value: i32) -> Result<()> {
        let value = Percent::new(value)?;
        match slider {
            Slider::Volume => self.volume = value,
            Slider::Speed => self.speed = value,
            Slider::Pitch => self.pitch = value,
        }
        Ok(())
    }

    /// Snapshot the current widget values for one request
    pub fn create_settings(&self) -> PlaybackSettings {
        let voice = self
            .voices
            .get(self.voice_idx.unwrap_or(0))
            .map(|v| v.value.clone())
            .unwrap_or_else(|| self.default_voice.clone());

        PlaybackSettings {
            voice,
            volume: self.volume.value(),
            speed: self.speed.value(),
            pitch: self.pitch.value(),
            audio_device_id: Some(self.device_id),
        }
    }

    /// Common checks before starting a request; returns the trimmed text
    fn prepare_request(&mut self, empty_notice: &str) -> Option<String> {
        self.reap_workers();

        if !self.controller.has_session() {
            self.log.notify("Error", "Speech engine is not initialized");
            return None;
        }
        if self.controller.is_busy() {
            self.log
                .append("A request is already running, wait for it to finish or stop it");
            return None;
        }

        let text = self.text.trim().to_string();
        if text.is_empty() {
            self.log.notify("Notice", empty_notice);
            return None;
        }
        Some(text)
    }

    /// Speak button: play the current text on a worker thread
    ///
    /// Returns whether a request was started.
    pub fn speak(&mut self) -> Result<bool> {
        let Some(text) = self.prepare_request("Enter some text to speak") else {
            return Ok(false);
        };

        let settings = self.create_settings();
        self.log.append(&format!(
            "Speaking text (voice: {}, volume: {}, speed: {}, pitch: {})",
            settings.voice, settings.volume, settings.speed, settings.pitch
        ));

        let controller = Arc::clone(&self.controller);
        let log = Arc::clone(&self.log);
        let handle = thread::Builder::new()
            .name("speak-request".to_string())
            .spawn(move || match controller.speak(&text, &settings) {
                Ok(()) => log.append("Speech finished"),
                Err(HarnessError::Busy) => {}
                Err(e) => log.notify("Speak error", &e.to_string()),
            })?;
        self.workers.push(handle);
        Ok(true)
    }

    /// Cache button: render the current text into the cache on a worker thread
    pub fn cache(&mut self) -> Result<bool> {
        let Some(text) = self.prepare_request("Enter some text to cache") else {
            return Ok(false);
        };

        let settings = self.create_settings();
        self.log.append(&format!(
            "Caching audio (voice: {}, speed: {}, pitch: {})",
            settings.voice, settings.speed, settings.pitch
        ));

        let controller = Arc::clone(&self.controller);
        let log = Arc::clone(&self.log);
        let handle = thread::Builder::new()
            .name("cache-request".to_string())
            .spawn(move || match controller.get_audio_file(&text, &settings) {
                Ok(path) => {
                    log.append(&format!("Audio cached: {}", path.display()));
                    log.notify("Audio cached", &format!("File path: {}", path.display()));
                }
                Err(HarnessError::Busy) => {}
                Err(e) => log.notify("Cache error", &e.to_string()),
            })?;
        self.workers.push(handle);
        Ok(true)
    }

    /// Stop button
    pub fn stop(&mut self) {
        self.controller.stop();
    }

    /// Reset button: defaults for every widget and a fresh engine session
    pub fn reset(&mut self) {
        self.volume = Percent::default();
        self.speed = Percent::default();
        self.pitch = Percent::default();

        self.device_id = self.controller.factory().default_audio_device_id();
        if !self.devices.iter().any(|d| d.id == self.device_id) {
            if let Some(first) = self.devices.first() {
                self.device_id = first.id;
            }
        }
        self.select_default_voice();

        let result = if self.controller.has_session() {
            self.controller.reset_session()
        } else {
            self.controller.initialize()
        };
        match result {
            Ok(()) => {
                self.log.append(&format!(
                    "Settings reset to defaults (default audio device: {})",
                    self.device_id
                ));
                self.log.notify("Reset", "All settings restored to defaults");
            }
            Err(e) => self.log.notify("Reset failed", &e.to_string()),
        }
    }

    /// Voice list lines, optionally filtered by a regex; the selection is starred
    pub fn voice_lines(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        let entries: Vec<(usize, &VoiceDescriptor)> = match pattern {
            Some(p) => search_voices(&self.voices, p)?,
            None => self.voices.iter().enumerate().collect(),
        };
        Ok(entries
            .into_iter()
            .map(|(idx, voice)| {
                let mark = if Some(idx) == self.voice_idx { '*' } else { ' ' };
                format!("{}{:>3}  {}", mark, idx, voice)
            })
            .collect())
    }

    /// Device list lines; the selection is starred
    pub fn device_lines(&self) -> Vec<String> {
        self.devices
            .iter()
            .enumerate()
            .map(|(idx, device)| {
                let mark = if device.id == self.device_id { '*' } else { ' ' };
                format!("{}{:>3}  {}", mark, idx, device)
            })
            .collect()
    }

    /// One-line summary of the panel and controller
    pub fn status(&self) -> String {
        let voice = self
            .selected_voice()
            .map(|v| v.value.as_str())
            .unwrap_or("-");
        format!(
            "engine: {} ({}), phase: {:?}, idle: {}s | voice: {}, device: {}, volume: {}, speed: {}, pitch: {}",
            self.controller.factory().name(),
            if self.controller.has_session() { "ready" } else { "not initialized" },
            self.controller.phase(),
            self.controller.idle_for().as_secs(),
            voice,
            self.device_id,
            self.volume,
            self.speed,
            self.pitch
        )
    }

    /// Forget worker threads that have finished
    fn reap_workers(&mut self) {
        let (done, running): (Vec<_>, Vec<_>) =
            self.workers.drain(..).partition(|h| h.is_finished());
        self.workers = running;
        for handle in done {
            if handle.join().is_err() {
                error!("Request worker panicked");
            }
        }
    }

    /// Block until every started request has finished
    pub fn wait_for_requests(&mut self) {
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("Request worker panicked");
            }
        }
    }

    /// Stop playback, wait for workers and dispose the session
    pub fn shutdown(&mut self) {
        self.controller.stop();
        self.wait_for_requests();
        self.controller.shutdown();
    }
}
