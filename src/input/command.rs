//! Command parsing

use crate::panel::Slider;
use crate::{HarnessError, Result};

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Requests (optional text replaces the text box first)
    Speak(Option<String>),
    Cache(Option<String>),
    Stop,
    Reset,

    // Widgets
    SetText(String),
    ListVoices(Option<String>),
    SelectVoiceIndex(usize),
    SelectVoice(String),
    ListDevices,
    SelectDevice(usize),
    SetSlider(Slider, i32),

    // Info
    Status,
    ShowLog(usize),
    Help,
    Quit,

    /// Blank line
    Empty,
}

/// Default line count for `log`
pub const DEFAULT_LOG_LINES: usize = 20;

/// Command names and their help text, in help order
pub const COMMANDS: &[(&str, &str)] = &[
    ("speak [text]", "speak the text box (or the given text)"),
    ("cache [text]", "render audio into the cache and show the file path"),
    ("stop", "stop playback"),
    ("reset", "restore defaults and reconnect the engine"),
    ("text <text>", "set the text box"),
    ("voices [regex]", "list voices, optionally filtered"),
    ("voice <index|name>", "select a voice"),
    ("devices", "list audio devices"),
    ("device <index>", "select an audio device"),
    ("volume <0-200>", "set volume"),
    ("speed <0-200>", "set speed"),
    ("pitch <0-200>", "set pitch"),
    ("status", "show engine and panel state"),
    ("log [n]", "show the last n log lines"),
    ("help", "show this help"),
    ("quit", "exit"),
];

fn rest(arg: &str) -> Option<String> {
    let arg = arg.trim();
    (!arg.is_empty()).then(|| arg.to_string())
}

fn number<T: std::str::FromStr>(name: &str, arg: &str) -> Result<T> {
    let arg = arg.trim();
    if arg.is_empty() {
        return Err(HarnessError::InvalidInput(format!("{} needs a number", name)));
    }
    arg.parse()
        .map_err(|_| HarnessError::InvalidInput(format!("{}: '{}' is not a number", name, arg)))
}

/// Parse one input line
pub fn parse_command(line: &str) -> Result<Command> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Empty);
    }

    let (name, arg) = match line.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg),
        None => (line, ""),
    };

    let command = match name.to_ascii_lowercase().as_str() {
        "speak" | "s" => Command::Speak(rest(arg)),
        "cache" | "c" => Command::Cache(rest(arg)),
        "stop" => Command::Stop,
        "reset" => Command::Reset,
        "text" => Command::SetText(arg.trim().to_string()),
        "voices" => Command::ListVoices(rest(arg)),
        "voice" => {
            let arg = rest(arg)
                .ok_or_else(|| HarnessError::InvalidInput("voice needs an index or name".into()))?;
            match arg.parse() {
                Ok(idx) => Command::SelectVoiceIndex(idx),
                Err(_) => Command::SelectVoice(arg),
            }
        }
        "devices" => Command::ListDevices,
        "device" => Command::SelectDevice(number("device", arg)?),
        "volume" => Command::SetSlider(Slider::Volume, number("volume", arg)?),
        "speed" | "rate" => Command::SetSlider(Slider::Speed, number("speed", arg)?),
        "pitch" => Command::SetSlider(Slider::Pitch, number("pitch", arg)?),
        "status" => Command::Status,
        "log" => match rest(arg) {
            Some(n) => Command::ShowLog(number("log", &n)?),
            None => Command::ShowLog(DEFAULT_LOG_LINES),
        },
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => {
            return Err(HarnessError::InvalidInput(format!(
                "unknown command '{}', try 'help'",
                other
            )))
        }
    };
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_keeps_inner_spaces() {
        assert_eq!(
            parse_command("text  hello   world ").unwrap(),
            Command::SetText("hello   world".to_string())
        );
    }

    #[test]
    fn test_number_errors() {
        assert!(matches!(
            parse_command("volume"),
            Err(HarnessError::InvalidInput(_))
        ));
        assert!(matches!(
            parse_command("device -1"),
            Err(HarnessError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_every_help_entry_parses() {
        for (usage, _) in COMMANDS {
            let name = usage.split_whitespace().next().unwrap();
            let line = match name {
                "text" | "voice" => format!("{} x", name),
                "device" | "volume" | "speed" | "pitch" => format!("{} 1", name),
                _ => name.to_string(),
            };
            assert!(parse_command(&line).is_ok(), "'{}' did not parse", line);
        }
    }
}
