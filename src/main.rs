//! speech-harness main entry point
//!
//! The event loop waits on two things:
//! 1. stdin (command lines typed by the user)
//! 2. the idle-check timer, which lets the controller recycle a stale session

use anyhow::Context;
use log::{debug, error, info, warn};
use mio::{Events, Interest, Poll, Token};
use speech_harness::config::Config;
use speech_harness::controller::{Controller, IdleTimer};
use speech_harness::engine::create_factory;
use speech_harness::input::{CommandHandler, HandlerAction, LineBuffer};
use speech_harness::log_pane::LogPane;
use speech_harness::panel::{Panel, PanelDefaults};
use std::fs::{self, OpenOptions};
use std::io::{self, Read};
use std::os::unix::io::AsRawFd;
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Token for stdin in mio poll
const STDIN: Token = Token(0);

/// Large enough that std's stdin buffer is bypassed, so poll readiness stays accurate
const READ_CHUNK: usize = 8192;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let debug_mode = args.iter().any(|arg| arg == "--debug" || arg == "-d");

    if debug_mode {
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open("speech-harness.log")
        {
            Ok(log_file) => {
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Debug)
                    .target(env_logger::Target::Pipe(Box::new(log_file)))
                    .init();
            }
            Err(e) => {
                eprintln!("Warning: Failed to open speech-harness.log: {}", e);
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Warn)
                    .init();
            }
        }
        info!(
            "speech-harness {} starting (debug mode, logging to speech-harness.log)",
            speech_harness::VERSION
        );
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Error)
            .parse_default_env()
            .init();
    }

    if let Err(e) = run() {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;
    info!("Configuration loaded from {:?}", config.path());

    let cache_dir = config.cache_dir();
    fs::create_dir_all(&cache_dir)
        .with_context(|| format!("creating cache directory {}", cache_dir.display()))?;

    let kind = config.engine_kind()?;
    let factory = create_factory(kind).with_context(|| format!("selecting engine '{}'", kind))?;

    let log_pane = Arc::new(LogPane::default());
    let controller = Arc::new(Controller::new(
        factory,
        &cache_dir,
        log_pane.sink(),
        config.controller_config(),
    ));

    println!(
        "{} {} - type 'help' for commands",
        speech_harness::APP_NAME,
        speech_harness::VERSION
    );
    let mut panel = Panel::new(controller, log_pane, PanelDefaults::from_config(&config));

    let result = event_loop(&mut panel, config.idle_check_interval());
    panel.shutdown();
    info!("speech-harness exiting");
    result
}

fn event_loop(panel: &mut Panel, idle_check: Duration) -> anyhow::Result<()> {
    let stdin_fd = io::stdin().as_raw_fd();
    let mut handler = CommandHandler::new(io::stdout());
    let mut buffer = LineBuffer::new();
    let mut timer = IdleTimer::new(idle_check, Instant::now());

    // epoll refuses regular files, so redirected input is read without polling
    let mut poll = Poll::new()?;
    let mut stdin_source = mio::unix::SourceFd(&stdin_fd);
    let polling = match poll
        .registry()
        .register(&mut stdin_source, STDIN, Interest::READABLE)
    {
        Ok(()) => true,
        Err(e) => {
            warn!("stdin cannot be polled ({}), reading it directly", e);
            false
        }
    };
    let mut events = Events::with_capacity(16);

    loop {
        let readable = if polling {
            let timeout = timer.time_until_next(Instant::now());
            match poll.poll(&mut events, Some(timeout)) {
                Ok(()) => events.iter().any(|event| event.token() == STDIN),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    debug!("poll interrupted");
                    false
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            true
        };

        if timer.due(Instant::now()) {
            if let Err(e) = panel.controller().check_idle() {
                debug!("Idle reconnect failed: {}", e);
            }
        }

        if !readable {
            continue;
        }

        let mut chunk = [0u8; READ_CHUNK];
        let n = match io::stdin().read(&mut chunk) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };

        if n == 0 {
            info!("stdin closed");
            if let Some(line) = buffer.flush() {
                if handler.process_line(panel, &line)? == HandlerAction::Quit {
                    return Ok(());
                }
            }
            // let scripted requests finish before shutdown stops playback
            panel.wait_for_requests();
            return Ok(());
        }

        buffer.write(&chunk[..n]);
        while let Some(line) = buffer.next_line() {
            if handler.process_line(panel, &line)? == HandlerAction::Quit {
                return Ok(());
            }
        }
    }
}
