//! espeak-ng engine playing through PulseAudio
//!
//! Speech is produced by running the `espeak-ng` executable. Playback goes to
//! the PulseAudio server (auto-detected under WSLg), and the output device is
//! chosen per request through `PULSE_SINK`. Cached files are WAV renderings
//! made with `espeak-ng -w`.
//!
//! Dependencies:
//! - espeak-ng (install with: sudo apt install espeak-ng)
//! - pactl, for listing output devices (optional)

use super::{cache_file_path, Engine, EngineFactory, LogSink};
use crate::error::{EngineError, EngineResult};
use crate::lock;
use crate::settings::{AudioDevice, PlaybackSettings, VoiceDescriptor};
use crate::{HarnessError, Result};
use log::{debug, info, warn};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

/// How often a speak call checks whether playback finished
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Device id reported when no PulseAudio sinks could be listed
const SYSTEM_DEFAULT_DEVICE: i32 = -1;

/// espeak-ng voices offered by the harness
const VOICES: &[(&str, &str)] = &[
    ("en", "English"),
    ("en-us", "English (US)"),
    ("en-gb", "English (UK)"),
    ("en-gb-scotland", "English (Scotland)"),
    ("cmn", "Chinese (Mandarin)"),
    ("yue", "Chinese (Cantonese)"),
    ("ja", "Japanese"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("it", "Italian"),
    ("pt", "Portuguese"),
    ("ru", "Russian"),
];

/// A PulseAudio output sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulseSink {
    pub index: i32,
    pub name: String,
}

/// Detect if running in WSL (Windows Subsystem for Linux)
fn is_wsl() -> bool {
    if let Ok(contents) = fs::read_to_string("/proc/version") {
        let lower = contents.to_lowercase();
        if lower.contains("microsoft") || lower.contains("wsl") {
            return true;
        }
    }
    std::env::var("WSL_DISTRO_NAME").is_ok()
}

/// Point PulseAudio clients at the WSLg server when needed
fn setup_pulseaudio() -> Result<()> {
    const WSLG_PULSE_PATH: &str = "/mnt/wslg/PulseServer";

    if std::env::var("PULSE_SERVER").is_ok() {
        debug!("PULSE_SERVER already set via environment");
        return Ok(());
    }

    if Path::new(WSLG_PULSE_PATH).exists() {
        info!("Auto-detected WSLG PulseAudio server at {}", WSLG_PULSE_PATH);
        std::env::set_var("PULSE_SERVER", WSLG_PULSE_PATH);
        return Ok(());
    }

    if is_wsl() {
        warn!("WSLG PulseAudio server not found at {}", WSLG_PULSE_PATH);
        return Err(HarnessError::Initialization(
            "PulseAudio server not found. Install WSLg or set PULSE_SERVER.".to_string(),
        ));
    }

    debug!("Native Linux - PulseAudio will use its default configuration");
    Ok(())
}

/// Find the espeak-ng executable
fn find_espeak() -> Result<String> {
    for path in ["espeak-ng", "/usr/bin/espeak-ng"] {
        if let Ok(status) = Command::new(path)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            if status.success() {
                return Ok(path.to_string());
            }
        }
    }

    Err(HarnessError::Initialization(
        "espeak-ng not found. Install with: sudo apt install espeak-ng".to_string(),
    ))
}

/// Parse `pactl list short sinks` output
///
/// Each line is tab separated: index, name, driver, sample spec, state.
pub fn parse_sinks(output: &str) -> Vec<PulseSink> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let index = fields.next()?.trim().parse().ok()?;
            let name = fields.next()?.trim();
            if name.is_empty() {
                return None;
            }
            Some(PulseSink {
                index,
                name: name.to_string(),
            })
        })
        .collect()
}

fn run_pactl(args: &[&str]) -> Option<String> {
    let output = Command::new("pactl")
        .args(args)
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok()
}

fn list_sinks() -> Vec<PulseSink> {
    match run_pactl(&["list", "short", "sinks"]) {
        Some(out) => parse_sinks(&out),
        None => {
            debug!("pactl unavailable, no sink selection");
            Vec::new()
        }
    }
}

/// Convert a speed percentage to espeak words per minute (80-450, 175 at 100%)
pub fn speed_to_wpm(speed: i32) -> i32 {
    (175 * speed / 100).clamp(80, 450)
}

/// Convert a volume percentage to espeak amplitude (0-200, 100 at 100%)
pub fn volume_to_amplitude(volume: i32) -> i32 {
    volume.clamp(0, 200)
}

/// Convert a pitch percentage to espeak pitch (0-99, 50 at 100%)
pub fn pitch_to_espeak(pitch: i32) -> i32 {
    (pitch / 2).clamp(0, 99)
}

/// Factory for espeak-ng sessions
pub struct EspeakFactory;

impl EspeakFactory {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EspeakFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineFactory for EspeakFactory {
    fn name(&self) -> &'static str {
        "espeak"
    }

    fn create(&self, cache_dir: &Path, log: LogSink) -> Result<Box<dyn Engine>> {
        setup_pulseaudio()?;
        let espeak_path = find_espeak()?;
        debug!("Found espeak-ng at: {}", espeak_path);

        Ok(Box::new(EspeakEngine::new(
            espeak_path,
            cache_dir.to_path_buf(),
            log,
            list_sinks(),
        )))
    }

    fn voices(&self) -> Vec<VoiceDescriptor> {
        VOICES
            .iter()
            .map(|(value, name)| VoiceDescriptor::new(*value, *name))
            .collect()
    }

    fn audio_devices(&self) -> Vec<AudioDevice> {
        let sinks = list_sinks();
        if sinks.is_empty() {
            return vec![AudioDevice {
                id: SYSTEM_DEFAULT_DEVICE,
                name: "System default".to_string(),
            }];
        }
        sinks
            .into_iter()
            .map(|s| AudioDevice {
                id: s.index,
                name: s.name,
            })
            .collect()
    }

    fn default_audio_device_id(&self) -> i32 {
        let sinks = list_sinks();
        let default_name = run_pactl(&["get-default-sink"]).map(|s| s.trim().to_string());

        default_name
            .and_then(|name| sinks.iter().find(|s| s.name == name))
            .or_else(|| sinks.first())
            .map(|s| s.index)
            .unwrap_or(SYSTEM_DEFAULT_DEVICE)
    }
}

/// One espeak-ng session
pub struct EspeakEngine {
    espeak_path: String,
    cache_dir: PathBuf,
    log: LogSink,
    sinks: Vec<PulseSink>,

    /// Currently playing espeak-ng process
    current: Mutex<Option<Child>>,

    /// Set by `stop` so the playing call reports success
    stopped: AtomicBool,

    disposed: AtomicBool,
}

impl EspeakEngine {
    pub fn new(espeak_path: String, cache_dir: PathBuf, log: LogSink, sinks: Vec<PulseSink>) -> Self {
        Self {
            espeak_path,
            cache_dir,
            log,
            sinks,
            current: Mutex::new(None),
            stopped: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    fn ensure_live(&self) -> EngineResult<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(EngineError::other("session has been disposed"));
        }
        Ok(())
    }

    fn command(&self, settings: &PlaybackSettings) -> Command {
        let mut cmd = Command::new(&self.espeak_path);
        cmd.arg("-v").arg(&settings.voice);
        cmd.arg("-s").arg(speed_to_wpm(settings.speed).to_string());
        cmd.arg("-a").arg(volume_to_amplitude(settings.volume).to_string());
        cmd.arg("-p").arg(pitch_to_espeak(settings.pitch).to_string());
        cmd.arg("--stdin");
        cmd.stdin(Stdio::piped());
        cmd
    }

    fn sink_for(&self, device_id: Option<i32>) -> Option<&PulseSink> {
        let id = device_id?;
        self.sinks.iter().find(|s| s.index == id)
    }

    /// Kill any currently playing process
    fn cancel_process(&self) {
        if let Some(mut child) = lock(&self.current).take() {
            debug!("Killing espeak-ng process");
            match child.kill() {
                Ok(_) => {
                    let _ = child.wait();
                }
                Err(e) => debug!("Failed to kill espeak-ng process: {}", e),
            }
        }
    }

    fn spawn_error(&self, e: io::Error) -> EngineError {
        if e.kind() == io::ErrorKind::NotFound {
            EngineError::other(format!("espeak-ng not found at {}", self.espeak_path))
        } else {
            EngineError::other(format!("failed to start espeak-ng: {}", e))
        }
    }

    fn wait_for_playback(&self) -> EngineResult<()> {
        loop {
            {
                let mut guard = lock(&self.current);
                let Some(child) = guard.as_mut() else {
                    // taken by stop() or dispose()
                    return Ok(());
                };
                match child.try_wait() {
                    Ok(Some(status)) => {
                        guard.take();
                        return self.playback_result(status);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        guard.take();
                        return Err(EngineError::connection(format!(
                            "lost track of espeak-ng: {}",
                            e
                        )));
                    }
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn playback_result(&self, status: ExitStatus) -> EngineResult<()> {
        if status.success() || self.stopped.load(Ordering::SeqCst) {
            return Ok(());
        }
        // espeak-ng only fails mid-playback when the audio server goes away
        Err(EngineError::connection(format!(
            "audio output lost ({})",
            status
        )))
    }
}

fn write_text(child: &mut Child, text: &str) -> io::Result<()> {
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes())?;
    }
    Ok(())
}

impl Engine for EspeakEngine {
    fn speak(&self, text: &str, settings: &PlaybackSettings) -> EngineResult<()> {
        self.ensure_live()?;
        if text.trim().is_empty() {
            return Ok(());
        }

        self.cancel_process();
        self.stopped.store(false, Ordering::SeqCst);

        let mut cmd = self.command(settings);
        if let Some(sink) = self.sink_for(settings.audio_device_id) {
            debug!("Routing playback to sink {}", sink.name);
            cmd.env("PULSE_SINK", &sink.name);
        }
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        let mut child = cmd.spawn().map_err(|e| self.spawn_error(e))?;
        if let Err(e) = write_text(&mut child, text) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(EngineError::connection(format!(
                "espeak-ng closed its input: {}",
                e
            )));
        }
        debug!("espeak-ng process started");

        *lock(&self.current) = Some(child);
        self.wait_for_playback()
    }

    fn get_audio_file(&self, text: &str, settings: &PlaybackSettings) -> EngineResult<PathBuf> {
        self.ensure_live()?;
        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::other("nothing to render"));
        }

        let path = cache_file_path(&self.cache_dir, text, settings, "wav");
        if path.exists() {
            (self.log)(&format!("Using cached audio: {}", path.display()));
            return Ok(path);
        }

        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| EngineError::other(format!("cannot create cache directory: {}", e)))?;

        // render under a temporary name so a failed run never looks cached
        let partial = path.with_extension("wav.part");
        let _ = fs::remove_file(&partial);

        let mut cmd = self.command(settings);
        cmd.arg("-w").arg(&partial);
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| self.spawn_error(e))?;
        if let Err(e) = write_text(&mut child, text) {
            let _ = child.kill();
            let _ = child.wait();
            let _ = fs::remove_file(&partial);
            return Err(EngineError::other(format!(
                "failed to send text to espeak-ng: {}",
                e
            )));
        }

        let output = match child.wait_with_output() {
            Ok(output) => output,
            Err(e) => {
                let _ = fs::remove_file(&partial);
                return Err(EngineError::other(format!("espeak-ng did not finish: {}", e)));
            }
        };

        if !output.status.success() {
            let _ = fs::remove_file(&partial);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::other(format!(
                "espeak-ng failed to render audio ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        if let Err(e) = fs::rename(&partial, &path) {
            let _ = fs::remove_file(&partial);
            return Err(EngineError::other(format!(
                "cannot store rendered audio at {}: {}",
                path.display(),
                e
            )));
        }

        Ok(path)
    }

    fn stop(&self) -> EngineResult<()> {
        debug!("Stopping espeak-ng playback");
        self.stopped.store(true, Ordering::SeqCst);
        self.cancel_process();
        Ok(())
    }

    fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            debug!("Disposing espeak-ng session");
            self.stopped.store(true, Ordering::SeqCst);
            self.cancel_process();
        }
    }
}

impl Drop for EspeakEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}
