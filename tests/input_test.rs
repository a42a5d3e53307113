//! Input system tests
//!
//! Tests command parsing and line buffering

use speech_harness::input::{parse_command, Command, LineBuffer};
use speech_harness::panel::Slider;
use speech_harness::HarnessError;

#[test]
fn test_request_commands() {
    assert_eq!(parse_command("speak").unwrap(), Command::Speak(None));
    assert_eq!(
        parse_command("speak 你好 world").unwrap(),
        Command::Speak(Some("你好 world".to_string()))
    );
    assert_eq!(parse_command("CACHE").unwrap(), Command::Cache(None));
    assert_eq!(parse_command("stop").unwrap(), Command::Stop);
    assert_eq!(parse_command("reset").unwrap(), Command::Reset);
}

#[test]
fn test_widget_commands() {
    assert_eq!(
        parse_command("text hello").unwrap(),
        Command::SetText("hello".to_string())
    );
    assert_eq!(parse_command("text").unwrap(), Command::SetText(String::new()));
    assert_eq!(parse_command("voices").unwrap(), Command::ListVoices(None));
    assert_eq!(
        parse_command("voices ^ja").unwrap(),
        Command::ListVoices(Some("^ja".to_string()))
    );
    assert_eq!(parse_command("voice 4").unwrap(), Command::SelectVoiceIndex(4));
    assert_eq!(
        parse_command("voice en-US-AriaNeural").unwrap(),
        Command::SelectVoice("en-US-AriaNeural".to_string())
    );
    assert_eq!(parse_command("devices").unwrap(), Command::ListDevices);
    assert_eq!(parse_command("device 2").unwrap(), Command::SelectDevice(2));
    assert_eq!(
        parse_command("volume 150").unwrap(),
        Command::SetSlider(Slider::Volume, 150)
    );
    assert_eq!(
        parse_command("speed 80").unwrap(),
        Command::SetSlider(Slider::Speed, 80)
    );
    // range is checked by the panel, not the parser
    assert_eq!(
        parse_command("pitch 300").unwrap(),
        Command::SetSlider(Slider::Pitch, 300)
    );
}

#[test]
fn test_info_commands() {
    assert_eq!(parse_command("status").unwrap(), Command::Status);
    assert_eq!(parse_command("log").unwrap(), Command::ShowLog(20));
    assert_eq!(parse_command("log 5").unwrap(), Command::ShowLog(5));
    assert_eq!(parse_command("help").unwrap(), Command::Help);
    assert_eq!(parse_command("quit").unwrap(), Command::Quit);
    assert_eq!(parse_command("exit").unwrap(), Command::Quit);
    assert_eq!(parse_command("   ").unwrap(), Command::Empty);
}

#[test]
fn test_malformed_commands() {
    for line in ["bogus", "voice", "device x", "volume", "log many"] {
        assert!(
            matches!(parse_command(line), Err(HarnessError::InvalidInput(_))),
            "'{}' should be rejected",
            line
        );
    }
}

#[test]
fn test_line_buffer_feeds_parser() {
    let mut buffer = LineBuffer::new();
    buffer.write(b"volume 90\r\nspe");
    buffer.write(b"ak\n");

    let commands: Vec<Command> = std::iter::from_fn(|| buffer.next_line())
        .map(|line| parse_command(&line).unwrap())
        .collect();
    assert_eq!(
        commands,
        vec![Command::SetSlider(Slider::Volume, 90), Command::Speak(None)]
    );
    assert!(buffer.is_empty());
}
