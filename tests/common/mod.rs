//! Scripted engine doubles shared by the integration tests

#![allow(dead_code)]

use speech_harness::engine::{Engine, EngineFactory, LogSink};
use speech_harness::error::{EngineError, EngineResult};
use speech_harness::settings::{AudioDevice, PlaybackSettings, VoiceDescriptor};
use speech_harness::{HarnessError, Result};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Outcome of one scripted engine call
#[derive(Debug, Clone)]
pub enum Step {
    Ok,
    Connection(&'static str),
    Other(&'static str),
}

/// Counters and scripts shared by a factory and all sessions it creates
#[derive(Default)]
pub struct Shared {
    pub creates: AtomicUsize,
    pub disposes: AtomicUsize,
    pub live: AtomicUsize,
    pub speak_calls: AtomicUsize,
    pub cache_calls: AtomicUsize,
    pub stops: AtomicUsize,
    /// Whether any session was created while another was still live
    pub overlap: AtomicBool,
    /// Scripted results, consumed one per call; empty means success
    pub script: Mutex<VecDeque<Step>>,
    /// Scripted results for `create`, consumed one per call; empty means success
    pub create_script: Mutex<VecDeque<bool>>,
    /// Generation of the session each call ran on
    pub call_sessions: Mutex<Vec<usize>>,
    pub gate: Gate,
    /// Blocks `create` while armed
    pub create_gate: Gate,
    pub fail_stop: AtomicBool,
}

impl Shared {
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn disposes(&self) -> usize {
        self.disposes.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn speak_calls(&self) -> usize {
        self.speak_calls.load(Ordering::SeqCst)
    }

    pub fn cache_calls(&self) -> usize {
        self.cache_calls.load(Ordering::SeqCst)
    }

    pub fn script(&self, steps: &[Step]) {
        self.script.lock().unwrap().extend(steps.iter().cloned());
    }

    pub fn fail_next_creates(&self, count: usize) {
        let mut script = self.create_script.lock().unwrap();
        for _ in 0..count {
            script.push_back(false);
        }
    }

    fn next_step(&self) -> Step {
        self.script.lock().unwrap().pop_front().unwrap_or(Step::Ok)
    }
}

/// Blocks engine calls until opened, so tests can hold a request in flight
#[derive(Default)]
pub struct Gate {
    state: Mutex<GateState>,
    cond: Condvar,
}

#[derive(Default)]
struct GateState {
    armed: bool,
    open: bool,
    waiting: usize,
}

impl Gate {
    /// Make the next calls block until `open`
    pub fn arm(&self) {
        let mut state = self.state.lock().unwrap();
        state.armed = true;
        state.open = false;
    }

    pub fn open(&self) {
        let mut state = self.state.lock().unwrap();
        state.open = true;
        self.cond.notify_all();
    }

    /// Wait until a call is blocked on the gate
    pub fn wait_for_waiter(&self) {
        let state = self.state.lock().unwrap();
        let (_state, timeout) = self
            .cond
            .wait_timeout_while(state, Duration::from_secs(5), |s| s.waiting == 0)
            .unwrap();
        assert!(!timeout.timed_out(), "no call reached the gate");
    }

    fn pass(&self) {
        let mut state = self.state.lock().unwrap();
        if !state.armed {
            return;
        }
        state.waiting += 1;
        self.cond.notify_all();
        let mut state = self
            .cond
            .wait_timeout_while(state, Duration::from_secs(5), |s| !s.open)
            .unwrap()
            .0;
        state.waiting -= 1;
        state.armed = false;
    }
}

pub struct FakeEngine {
    shared: Arc<Shared>,
    session: usize,
    cache_dir: PathBuf,
    disposed: AtomicBool,
}

impl FakeEngine {
    fn record(&self) {
        self.shared.call_sessions.lock().unwrap().push(self.session);
    }

    fn result(&self) -> EngineResult<()> {
        self.shared.gate.pass();
        match self.shared.next_step() {
            Step::Ok => Ok(()),
            Step::Connection(msg) => Err(EngineError::connection(msg)),
            Step::Other(msg) => Err(EngineError::other(msg)),
        }
    }
}

impl Engine for FakeEngine {
    fn speak(&self, _text: &str, _settings: &PlaybackSettings) -> EngineResult<()> {
        self.shared.speak_calls.fetch_add(1, Ordering::SeqCst);
        self.record();
        self.result()
    }

    fn get_audio_file(&self, text: &str, settings: &PlaybackSettings) -> EngineResult<PathBuf> {
        self.shared.cache_calls.fetch_add(1, Ordering::SeqCst);
        self.record();
        self.result()?;
        Ok(speech_harness::engine::cache_file_path(
            &self.cache_dir,
            text,
            settings,
            "mp3",
        ))
    }

    fn stop(&self) -> EngineResult<()> {
        self.shared.stops.fetch_add(1, Ordering::SeqCst);
        if self.shared.fail_stop.load(Ordering::SeqCst) {
            return Err(EngineError::other("stop refused"));
        }
        Ok(())
    }

    fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            self.shared.disposes.fetch_add(1, Ordering::SeqCst);
            self.shared.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

pub struct FakeFactory {
    pub shared: Arc<Shared>,
}

impl FakeFactory {
    pub fn new() -> (Arc<Self>, Arc<Shared>) {
        let shared = Arc::new(Shared::default());
        (
            Arc::new(Self {
                shared: Arc::clone(&shared),
            }),
            shared,
        )
    }
}

impl EngineFactory for FakeFactory {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn create(&self, cache_dir: &Path, _log: LogSink) -> Result<Box<dyn Engine>> {
        self.shared.create_gate.pass();
        let ok = self
            .shared
            .create_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(true);
        if !ok {
            return Err(HarnessError::Other("engine unavailable".to_string()));
        }

        let session = self.shared.creates.fetch_add(1, Ordering::SeqCst) + 1;
        if self.shared.live.fetch_add(1, Ordering::SeqCst) > 0 {
            self.shared.overlap.store(true, Ordering::SeqCst);
        }
        Ok(Box::new(FakeEngine {
            shared: Arc::clone(&self.shared),
            session,
            cache_dir: cache_dir.to_path_buf(),
            disposed: AtomicBool::new(false),
        }))
    }

    fn voices(&self) -> Vec<VoiceDescriptor> {
        vec![
            VoiceDescriptor::new("en-US-AriaNeural", "English (US) Aria"),
            VoiceDescriptor::new("zh-CN-XiaoxiaoNeural", "Chinese Xiaoxiao"),
            VoiceDescriptor::new("zh-CN-YunxiNeural", "Chinese Yunxi"),
        ]
    }

    fn audio_devices(&self) -> Vec<AudioDevice> {
        vec![
            AudioDevice {
                id: 0,
                name: "Speakers".to_string(),
            },
            AudioDevice {
                id: 1,
                name: "Headphones".to_string(),
            },
        ]
    }

    fn default_audio_device_id(&self) -> i32 {
        1
    }
}

/// A log sink that records every message
pub fn recording_sink() -> (LogSink, Arc<Mutex<Vec<String>>>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink_lines = Arc::clone(&lines);
    let sink: LogSink = Arc::new(move |msg: &str| sink_lines.lock().unwrap().push(msg.to_string()));
    (sink, lines)
}

pub fn count_lines(lines: &Mutex<Vec<String>>, needle: &str) -> usize {
    lines
        .lock()
        .unwrap()
        .iter()
        .filter(|line| line.contains(needle))
        .count()
}
