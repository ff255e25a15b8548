//! Keyboard bindings and input handling.
//!
//! Centralizes all keyboard shortcuts and key mapping logic.

use nannou::prelude::*;

/// Actions that can be triggered by key presses
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Quit,
    /// Leave the running scene for the gallery
    Back,
    ToggleDebug,
    /// Skip to the next track's scene
    NextTrack,
    /// Open the track under the lens
    Enter,
}

/// Parse a key into an action based on the current view
pub fn parse_key(key: Key, in_scene: bool) -> Option<Action> {
    // Global keys
    match key {
        Key::Q => return Some(Action::Quit),
        Key::D => return Some(Action::ToggleDebug),
        _ => {}
    }

    if in_scene {
        return match key {
            Key::Escape => Some(Action::Back),
            Key::Space => Some(Action::NextTrack),
            _ => None,
        };
    }

    match key {
        Key::Return => Some(Action::Enter),
        Key::Escape => Some(Action::Quit),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_depends_on_view() {
        assert_eq!(parse_key(Key::Escape, true), Some(Action::Back));
        assert_eq!(parse_key(Key::Escape, false), Some(Action::Quit));
    }

    #[test]
    fn test_global_keys() {
        for in_scene in [true, false] {
            assert_eq!(parse_key(Key::Q, in_scene), Some(Action::Quit));
            assert_eq!(parse_key(Key::D, in_scene), Some(Action::ToggleDebug));
        }
    }

    #[test]
    fn test_scene_only_keys() {
        assert_eq!(parse_key(Key::Space, true), Some(Action::NextTrack));
        assert_eq!(parse_key(Key::Space, false), None);
        assert_eq!(parse_key(Key::Return, false), Some(Action::Enter));
        assert_eq!(parse_key(Key::Return, true), None);
    }
}
