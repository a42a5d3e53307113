//! Configuration management

use crate::catalog::DEFAULT_VOICE;
use crate::controller::{
    ControllerConfig, DEFAULT_IDLE_CHECK_INTERVAL, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_RETRIES,
    DEFAULT_RETRY_DELAY,
};
use crate::engine::EngineKind;
use crate::settings::{Percent, PERCENT_DEFAULT};
use crate::{HarnessError, Result};
use ini::Ini;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Text placed in the input box at startup
pub const DEFAULT_TEXT: &str = "测试TTS";

/// Harness settings persisted in an INI file
///
/// Holds the engine choice, retry/reconnect policy and the initial panel
/// values. Missing keys fall back to built-in defaults.
pub struct Config {
    /// INI configuration storage
    ini: Ini,

    /// Config file path (~/.speech-harness.cfg)
    path: PathBuf,
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from `path`, writing defaults there if it does not exist
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        debug!("Loading config from {:?}", path);

        let ini = if path.exists() {
            Ini::load_from_file(&path)
                .map_err(|e| HarnessError::IniParse(format!("Failed to load config: {}", e)))?
        } else {
            info!("Config file not found, creating default");
            let default = Self::default_config();
            default
                .write_to_file(&path)
                .map_err(|e| HarnessError::IniParse(format!("Failed to write config: {}", e)))?;
            default
        };

        Ok(Self { ini, path })
    }

    fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".speech-harness.cfg")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn default_config() -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some("engine"))
            .set("kind", "auto")
            .set("cache_dir", "");

        ini.with_section(Some("connection"))
            .set("max_retries", DEFAULT_MAX_RETRIES.to_string())
            .set("retry_delay_ms", DEFAULT_RETRY_DELAY.as_millis().to_string())
            .set("idle_timeout_secs", DEFAULT_IDLE_TIMEOUT.as_secs().to_string())
            .set("idle_check_secs", DEFAULT_IDLE_CHECK_INTERVAL.as_secs().to_string());

        ini.with_section(Some("playback"))
            .set("voice", DEFAULT_VOICE)
            .set("volume", PERCENT_DEFAULT.to_string())
            .set("speed", PERCENT_DEFAULT.to_string())
            .set("pitch", PERCENT_DEFAULT.to_string())
            .set("text", DEFAULT_TEXT);

        ini
    }

    pub fn get_string(&self, section: &str, key: &str, default: &str) -> String {
        self.ini
            .get_from(Some(section), key)
            .unwrap_or(default)
            .to_string()
    }

    pub fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Which engine adapter to use
    pub fn engine_kind(&self) -> Result<EngineKind> {
        self.get_string("engine", "kind", "auto").parse()
    }

    /// Where rendered audio is cached
    ///
    /// Defaults to `<local data dir>/SpeechHarness/Cache`.
    pub fn cache_dir(&self) -> PathBuf {
        let configured = self.get_string("engine", "cache_dir", "");
        if !configured.trim().is_empty() {
            return PathBuf::from(configured.trim());
        }
        dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("SpeechHarness")
            .join("Cache")
    }

    /// Retry and reconnect policy
    pub fn controller_config(&self) -> ControllerConfig {
        let max_retries = self.get_int("connection", "max_retries", DEFAULT_MAX_RETRIES as i64);
        let max_retries = u32::try_from(max_retries)
            .ok()
            .filter(|&n| n >= 1)
            .unwrap_or_else(|| {
                warn!("Invalid max_retries {}, using {}", max_retries, DEFAULT_MAX_RETRIES);
                DEFAULT_MAX_RETRIES
            });

        let retry_delay_ms = self.get_int(
            "connection",
            "retry_delay_ms",
            DEFAULT_RETRY_DELAY.as_millis() as i64,
        );
        let idle_secs = self.get_int(
            "connection",
            "idle_timeout_secs",
            DEFAULT_IDLE_TIMEOUT.as_secs() as i64,
        );

        ControllerConfig {
            max_retries,
            retry_delay: Duration::from_millis(retry_delay_ms.max(0) as u64),
            idle_timeout: (idle_secs > 0).then(|| Duration::from_secs(idle_secs as u64)),
        }
    }

    /// How often the idle check runs
    pub fn idle_check_interval(&self) -> Duration {
        let secs = self.get_int(
            "connection",
            "idle_check_secs",
            DEFAULT_IDLE_CHECK_INTERVAL.as_secs() as i64,
        );
        if secs > 0 {
            Duration::from_secs(secs as u64)
        } else {
            DEFAULT_IDLE_CHECK_INTERVAL
        }
    }

    /// Voice preselected at startup and on reset
    pub fn default_voice(&self) -> String {
        self.get_string("playback", "voice", DEFAULT_VOICE)
    }

    pub fn initial_text(&self) -> String {
        self.get_string("playback", "text", DEFAULT_TEXT)
    }

    fn percent(&self, key: &str) -> Percent {
        let raw = self.get_int("playback", key, PERCENT_DEFAULT as i64);
        i32::try_from(raw)
            .map_err(|_| HarnessError::InvalidInput(raw.to_string()))
            .and_then(Percent::new)
            .unwrap_or_else(|e| {
                warn!("Invalid {} in config ({}), using default", key, e);
                Percent::default()
            })
    }

    pub fn volume(&self) -> Percent {
        self.percent("volume")
    }

    pub fn speed(&self) -> Percent {
        self.percent("speed")
    }

    pub fn pitch(&self) -> Percent {
        self.percent("pitch")
    }
}
