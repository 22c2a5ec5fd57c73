//! Global hotkeys: a toggle key and a push-to-talk hold key.
//!
//! Key names are compared case-insensitively (`F8`, `f8`). Presses are ignored
//! while focus is inside a text input and on OS auto-repeat; the release of a
//! push-to-talk key that was accepted is always forwarded so a turn never sticks open.

use crate::config::HotkeyConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Control input for the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Toggle,
    PushToTalkPressed,
    PushToTalkReleased,
    Reconnect,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPhase {
    Pressed,
    Released,
}

/// Where keyboard focus is when the key event arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusContext {
    #[default]
    Elsewhere,
    TextInput,
}

impl FocusContext {
    /// Parse a focus report line from the UI host: `focus text` or `focus elsewhere`.
    pub fn parse_report(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        if !words.next()?.eq_ignore_ascii_case("focus") {
            return None;
        }
        let focus = match words.next()?.to_ascii_lowercase().as_str() {
            "text" | "text-input" => FocusContext::TextInput,
            "elsewhere" | "none" => FocusContext::Elsewhere,
            _ => return None,
        };
        words.next().is_none().then_some(focus)
    }
}

/// Last focus reported by the UI host, shared with the key hook thread.
#[derive(Debug, Clone, Default)]
pub struct SharedFocus(Arc<AtomicBool>);

impl SharedFocus {
    pub fn set(&self, focus: FocusContext) {
        self.0
            .store(focus == FocusContext::TextInput, Ordering::Release);
    }

    pub fn get(&self) -> FocusContext {
        if self.0.load(Ordering::Acquire) {
            FocusContext::TextInput
        } else {
            FocusContext::Elsewhere
        }
    }
}

#[derive(Debug, Clone)]
pub struct HotkeyMap {
    toggle: String,
    push_to_talk: String,
    toggle_down: bool,
    ptt_down: bool,
}

impl HotkeyMap {
    pub fn new(config: &HotkeyConfig) -> Self {
        Self {
            toggle: config.toggle.trim().to_ascii_uppercase(),
            push_to_talk: config.push_to_talk.trim().to_ascii_uppercase(),
            toggle_down: false,
            ptt_down: false,
        }
    }

    pub fn resolve(
        &mut self,
        key: &str,
        phase: KeyPhase,
        focus: FocusContext,
    ) -> Option<ControlCommand> {
        let key = key.trim().to_ascii_uppercase();

        if key == self.push_to_talk {
            return match phase {
                KeyPhase::Pressed if self.ptt_down => None,
                KeyPhase::Pressed if focus == FocusContext::TextInput => None,
                KeyPhase::Pressed => {
                    self.ptt_down = true;
                    Some(ControlCommand::PushToTalkPressed)
                }
                KeyPhase::Released if self.ptt_down => {
                    self.ptt_down = false;
                    Some(ControlCommand::PushToTalkReleased)
                }
                KeyPhase::Released => None,
            };
        }

        if key == self.toggle {
            return match phase {
                KeyPhase::Pressed if self.toggle_down => None,
                KeyPhase::Pressed => {
                    self.toggle_down = true;
                    (focus != FocusContext::TextInput).then_some(ControlCommand::Toggle)
                }
                KeyPhase::Released => {
                    self.toggle_down = false;
                    None
                }
            };
        }

        None
    }

    pub fn push_to_talk_held(&self) -> bool {
        self.ptt_down
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> HotkeyMap {
        HotkeyMap::new(&HotkeyConfig::default())
    }

    #[test]
    fn push_to_talk_press_and_release() {
        let mut keys = map();
        assert_eq!(
            keys.resolve("F8", KeyPhase::Pressed, FocusContext::Elsewhere),
            Some(ControlCommand::PushToTalkPressed)
        );
        // auto-repeat
        assert_eq!(keys.resolve("F8", KeyPhase::Pressed, FocusContext::Elsewhere), None);
        assert!(keys.push_to_talk_held());
        assert_eq!(
            keys.resolve("f8", KeyPhase::Released, FocusContext::Elsewhere),
            Some(ControlCommand::PushToTalkReleased)
        );
        assert_eq!(keys.resolve("F8", KeyPhase::Released, FocusContext::Elsewhere), None);
    }

    #[test]
    fn text_input_suppresses_presses_but_not_held_release() {
        let mut keys = map();
        assert_eq!(keys.resolve("F9", KeyPhase::Pressed, FocusContext::TextInput), None);
        assert_eq!(keys.resolve("F8", KeyPhase::Pressed, FocusContext::TextInput), None);

        keys.resolve("F8", KeyPhase::Pressed, FocusContext::Elsewhere);
        assert_eq!(
            keys.resolve("F8", KeyPhase::Released, FocusContext::TextInput),
            Some(ControlCommand::PushToTalkReleased)
        );
    }

    #[test]
    fn focus_reports_update_shared_focus() {
        assert_eq!(FocusContext::parse_report("focus text"), Some(FocusContext::TextInput));
        assert_eq!(
            FocusContext::parse_report("  FOCUS elsewhere "),
            Some(FocusContext::Elsewhere)
        );
        assert_eq!(FocusContext::parse_report("focus"), None);
        assert_eq!(FocusContext::parse_report("focus text now"), None);
        assert_eq!(FocusContext::parse_report("toggle"), None);

        let focus = SharedFocus::default();
        let hook = focus.clone();
        assert_eq!(hook.get(), FocusContext::Elsewhere);
        focus.set(FocusContext::TextInput);
        assert_eq!(hook.get(), FocusContext::TextInput);

        let mut keys = map();
        assert_eq!(keys.resolve("F9", KeyPhase::Pressed, hook.get()), None);
        focus.set(FocusContext::Elsewhere);
        keys.resolve("F9", KeyPhase::Released, hook.get());
        assert_eq!(
            keys.resolve("F9", KeyPhase::Pressed, hook.get()),
            Some(ControlCommand::Toggle)
        );
    }

    #[test]
    fn toggle_fires_once_per_press() {
        let mut keys = map();
        assert_eq!(
            keys.resolve("F9", KeyPhase::Pressed, FocusContext::Elsewhere),
            Some(ControlCommand::Toggle)
        );
        assert_eq!(keys.resolve("F9", KeyPhase::Pressed, FocusContext::Elsewhere), None);
        keys.resolve("F9", KeyPhase::Released, FocusContext::Elsewhere);
        assert_eq!(
            keys.resolve("F9", KeyPhase::Pressed, FocusContext::Elsewhere),
            Some(ControlCommand::Toggle)
        );
        assert_eq!(keys.resolve("KeyA", KeyPhase::Pressed, FocusContext::Elsewhere), None);
    }
}
