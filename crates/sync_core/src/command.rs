//! The command language embedded in slide notes and scene overlay text.
//!
//! Notes lines are separated by carriage returns (that is how slide notes
//! store paragraphs), overlay lines by newlines. Unrecognised lines are
//! dropped; parsing never fails.

use std::time::Duration;

use shared::domain::KeyModifiers;
use tracing::trace;

const NOTES_LINE_SEPARATOR: char = '\r';
const OVERLAY_LINE_SEPARATOR: char = '\n';

const SCENE_KEYWORD: &str = "OBSScene:";
const DELAY_KEYWORD: &str = "OBSDelay:";
const HOTKEYS_KEYWORD: &str = "OBSHotKeys:";
const DEFAULT_KEYWORD: &str = "OBSDefault:";
const RECORD_KEYWORD: &str = "OBSRecord:";
const STREAM_KEYWORD: &str = "OBSStream:";
const STAY_LITERAL: &str = "OBSStay";

const NEXT_SLIDE_LITERAL: &str = "next_slide";
const PREVIOUS_SLIDE_LITERAL: &str = "previous_slide";
const CLICK_SLIDE_LITERAL: &str = "click_slide";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputToggle {
    Start,
    Stop,
}

impl OutputToggle {
    fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("start") {
            Some(OutputToggle::Start)
        } else if value.eq_ignore_ascii_case("stop") {
            Some(OutputToggle::Stop)
        } else {
            None
        }
    }

    pub fn is_start(self) -> bool {
        self == OutputToggle::Start
    }
}

/// One instruction from slide notes, executed against the scene controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    ChangeScene(String),
    Delay(Duration),
    SendHotkey {
        modifiers: KeyModifiers,
        key: String,
    },
    SetDefaultScene(String),
    SetRecording(OutputToggle),
    SetStreaming(OutputToggle),
    SuppressFallback,
}

/// One instruction from a scene overlay, executed against the presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationDirective {
    NextSlide,
    PreviousSlide,
    ClickSlide,
}

pub fn parse_notes(text: &str) -> Vec<Directive> {
    lines(text, NOTES_LINE_SEPARATOR)
        .filter_map(|line| {
            let directive = parse_notes_line(line);
            if directive.is_none() {
                trace!(line, "notes: skipping unrecognised line");
            }
            directive
        })
        .collect()
}

pub fn parse_overlay(text: &str) -> Vec<PresentationDirective> {
    lines(text, OVERLAY_LINE_SEPARATOR)
        .filter_map(|line| {
            if line.eq_ignore_ascii_case(NEXT_SLIDE_LITERAL) {
                Some(PresentationDirective::NextSlide)
            } else if line.eq_ignore_ascii_case(PREVIOUS_SLIDE_LITERAL) {
                Some(PresentationDirective::PreviousSlide)
            } else if line.eq_ignore_ascii_case(CLICK_SLIDE_LITERAL) {
                Some(PresentationDirective::ClickSlide)
            } else {
                trace!(line, "overlay: skipping unrecognised line");
                None
            }
        })
        .collect()
}

/// Splits `modifiers|keyName`. Without a pipe the whole value is the key;
/// fields past the key are ignored.
pub fn parse_hotkey(value: &str) -> Option<(KeyModifiers, String)> {
    let mut fields = value.split('|');
    let first = fields.next().unwrap_or_default();
    let (modifiers, key) = match fields.next() {
        Some(key) => (KeyModifiers::from_shorthand(first), key.trim()),
        None => (KeyModifiers::empty(), first.trim()),
    };

    if key.is_empty() {
        return None;
    }

    Some((modifiers, key.to_string()))
}

fn lines(text: &str, separator: char) -> impl Iterator<Item = &str> {
    text.split(separator)
        .map(str::trim)
        .filter(|line| !line.is_empty())
}

fn parse_notes_line(line: &str) -> Option<Directive> {
    if line.eq_ignore_ascii_case(STAY_LITERAL) {
        return Some(Directive::SuppressFallback);
    }

    if let Some(name) = keyword_value(line, SCENE_KEYWORD) {
        return non_empty(name).map(Directive::ChangeScene);
    }
    if let Some(value) = keyword_value(line, DELAY_KEYWORD) {
        return value
            .parse::<u64>()
            .ok()
            .map(|ms| Directive::Delay(Duration::from_millis(ms)));
    }
    if let Some(value) = keyword_value(line, HOTKEYS_KEYWORD) {
        return parse_hotkey(value).map(|(modifiers, key)| Directive::SendHotkey { modifiers, key });
    }
    if let Some(name) = keyword_value(line, DEFAULT_KEYWORD) {
        return non_empty(name).map(Directive::SetDefaultScene);
    }
    if let Some(value) = keyword_value(line, RECORD_KEYWORD) {
        return OutputToggle::parse(value).map(Directive::SetRecording);
    }
    if let Some(value) = keyword_value(line, STREAM_KEYWORD) {
        return OutputToggle::parse(value).map(Directive::SetStreaming);
    }

    None
}

/// Case-insensitive prefix match returning the trimmed remainder.
fn keyword_value<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let prefix = line.get(..keyword.len())?;
    if !prefix.eq_ignore_ascii_case(keyword) {
        return None;
    }
    Some(line[keyword.len()..].trim())
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
#[path = "tests/command_tests.rs"]
mod tests;
