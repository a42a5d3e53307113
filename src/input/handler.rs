//! Executes parsed commands against the panel

use super::command::{parse_command, Command, COMMANDS};
use crate::panel::Panel;
use crate::{HarnessError, Result};
use log::debug;
use std::io::Write;

/// What the event loop should do after a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerAction {
    Continue,
    Quit,
}

/// Runs commands, writing listings and status to `out`
pub struct CommandHandler<W: Write> {
    out: W,
}

impl<W: Write> CommandHandler<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Parse and run one input line
    ///
    /// Bad input is reported in the log pane and never ends the session.
    pub fn process_line(&mut self, panel: &mut Panel, line: &str) -> Result<HandlerAction> {
        let command = match parse_command(line) {
            Ok(command) => command,
            Err(HarnessError::InvalidInput(msg)) => {
                panel.log().append(&format!("Invalid input: {}", msg));
                return Ok(HandlerAction::Continue);
            }
            Err(e) => return Err(e),
        };

        debug!("Command: {:?}", command);
        match self.execute(panel, command) {
            Err(HarnessError::InvalidInput(msg)) => {
                panel.log().append(&format!("Invalid input: {}", msg));
                Ok(HandlerAction::Continue)
            }
            other => other,
        }
    }

    pub fn execute(&mut self, panel: &mut Panel, command: Command) -> Result<HandlerAction> {
        match command {
            Command::Speak(text) => {
                if let Some(text) = text {
                    panel.text = text;
                }
                panel.speak()?;
            }
            Command::Cache(text) => {
                if let Some(text) = text {
                    panel.text = text;
                }
                panel.cache()?;
            }
            Command::Stop => panel.stop(),
            Command::Reset => panel.reset(),
            Command::SetText(text) => panel.text = text,
            Command::ListVoices(pattern) => {
                for line in panel.voice_lines(pattern.as_deref())? {
                    writeln!(self.out, "{}", line)?;
                }
            }
            Command::SelectVoiceIndex(idx) => panel.select_voice(idx)?,
            Command::SelectVoice(value) => panel.select_voice_by_value(&value)?,
            Command::ListDevices => {
                for line in panel.device_lines() {
                    writeln!(self.out, "{}", line)?;
                }
            }
            Command::SelectDevice(idx) => {
                if !panel.select_device(idx) {
                    panel.log().append(&format!("No audio device #{}", idx));
                }
            }
            Command::SetSlider(slider, value) => panel.set_slider(slider, value)?,
            Command::Status => {
                writeln!(self.out, "{}", panel.status())?;
                writeln!(self.out, "text: {}", panel.text)?;
            }
            Command::ShowLog(count) => {
                for line in panel.log().tail(count) {
                    writeln!(self.out, "{}", line)?;
                }
            }
            Command::Help => {
                for (usage, help) in COMMANDS {
                    writeln!(self.out, "  {:<20} {}", usage, help)?;
                }
            }
            Command::Quit => return Ok(HandlerAction::Quit),
            Command::Empty => {}
        }
        self.out.flush()?;
        Ok(HandlerAction::Continue)
    }
}
