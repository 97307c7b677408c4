//! Input sampler
//!
//! Once per tick, turns the platform's polled device state into an
//! [`InputFrame`]: the per-frame pressed/released key lists, click edges,
//! pointer position in centered coordinates, and the quit flag. The only
//! state that survives across ticks is the persistent down-key map
//! (device code -> canonical name).
//!
//! The transition logic is separate from the platform poll so the edge
//! cases - a key-up for a code we never saw go down, the always-ignored
//! codes - are plain functions under test.

use std::collections::HashMap;

use macroquad::prelude::{
    get_keys_pressed, get_keys_released, is_key_down, is_key_pressed, is_mouse_button_down,
    is_mouse_button_pressed, is_mouse_button_released, is_quit_requested, mouse_position,
    KeyCode, MouseButton,
};

use crate::keys::{key_name, SKIPPED_KEYS};
use crate::screen::Screen;

/// Everything the dispatch rule needs to know about one tick's input.
#[derive(Debug, Clone, Default)]
pub struct InputFrame {
    /// Canonical names of keys that went down this tick.
    pub keys_pressed: Vec<String>,
    /// Canonical names of keys that came up this tick.
    pub keys_released: Vec<String>,
    /// Canonical names of every key currently held.
    pub keys_down: Vec<String>,
    /// A mouse button went down this tick.
    pub click_edge: bool,
    /// A mouse button came up this tick.
    pub click_release_edge: bool,
    /// A mouse button is currently held.
    pub click_held: bool,
    /// Pointer position in centered coordinates.
    pub pointer: (f32, f32),
    /// Window close request or the quit key combination.
    pub quit: bool,
}

/// Samples the platform input state into per-tick frames.
pub struct InputSampler {
    down: HashMap<KeyCode, &'static str>,
}

impl InputSampler {
    pub fn new() -> Self {
        Self {
            down: HashMap::new(),
        }
    }

    /// Record a key-down. Returns the canonical name when the key is
    /// nameable and not in the skip set.
    fn press(&mut self, code: KeyCode) -> Option<&'static str> {
        if SKIPPED_KEYS.contains(&code) {
            return None;
        }
        let name = key_name(code)?;
        self.down.insert(code, name);
        Some(name)
    }

    /// Record a key-up. A code not currently tracked as down is ignored -
    /// no release is synthesized.
    fn release(&mut self, code: KeyCode) -> Option<&'static str> {
        if SKIPPED_KEYS.contains(&code) {
            return None;
        }
        self.down.remove(&code)
    }

    fn keys_down(&self) -> Vec<String> {
        self.down.values().map(|n| n.to_string()).collect()
    }

    /// Drain this tick's device state. Needs a live window.
    pub fn sample(&mut self, screen: &Screen) -> InputFrame {
        let mut keys_pressed = Vec::new();
        for code in get_keys_pressed() {
            if let Some(name) = self.press(code) {
                keys_pressed.push(name.to_string());
            }
        }
        let mut keys_released = Vec::new();
        for code in get_keys_released() {
            if let Some(name) = self.release(code) {
                keys_released.push(name.to_string());
            }
        }

        // Ctrl+Q / Cmd+Q quits, as does the window's close button
        let modifier_held = is_key_down(KeyCode::LeftControl)
            || is_key_down(KeyCode::RightControl)
            || is_key_down(KeyCode::LeftSuper)
            || is_key_down(KeyCode::RightSuper);
        let quit = is_quit_requested() || (is_key_pressed(KeyCode::Q) && modifier_held);

        let buttons = [MouseButton::Left, MouseButton::Right, MouseButton::Middle];
        let (mx, my) = mouse_position();

        InputFrame {
            keys_pressed,
            keys_released,
            keys_down: self.keys_down(),
            click_edge: buttons.iter().any(|&b| is_mouse_button_pressed(b)),
            click_release_edge: buttons.iter().any(|&b| is_mouse_button_released(b)),
            click_held: buttons.iter().any(|&b| is_mouse_button_down(b)),
            pointer: screen.from_pixels(mx, my),
            quit,
        }
    }
}

impl Default for InputSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_then_release_round_trip() {
        let mut sampler = InputSampler::new();
        assert_eq!(sampler.press(KeyCode::A), Some("a"));
        assert!(sampler.keys_down().contains(&"a".to_string()));
        assert_eq!(sampler.release(KeyCode::A), Some("a"));
        assert!(sampler.keys_down().is_empty());
    }

    #[test]
    fn test_untracked_release_is_ignored() {
        let mut sampler = InputSampler::new();
        assert_eq!(sampler.release(KeyCode::A), None);
    }

    #[test]
    fn test_skipped_codes_never_register() {
        let mut sampler = InputSampler::new();
        assert_eq!(sampler.press(KeyCode::Unknown), None);
        assert!(sampler.keys_down().is_empty());
    }

    #[test]
    fn test_modifier_pair_tracks_per_code() {
        let mut sampler = InputSampler::new();
        sampler.press(KeyCode::LeftShift);
        sampler.press(KeyCode::RightShift);
        // releasing one physical key leaves the other held
        sampler.release(KeyCode::LeftShift);
        assert!(sampler.keys_down().contains(&"shift".to_string()));
    }
}
