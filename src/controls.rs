//! Keyboard controls for the live configuration.

use winit::keyboard::KeyCode;

use crate::params::{PathShape, SimulationConfig};

/// What a key press asks for
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Control {
    TogglePause,
    ToggleArrows,
    SelectShape(PathShape),
    AdjustUsedFrequencies(i32),
    AdjustFrequencies(i32),
    AdjustDuration(f32),
    AdjustIterations(i32),
    Reset,
    Capture,
    Quit,
}

impl Control {
    /// Map a pressed key to a control; Shift widens the frequency steps
    pub fn from_key(key: KeyCode, shift: bool) -> Option<Control> {
        let step = if shift { 10 } else { 1 };
        let control = match key {
            KeyCode::Space => Control::TogglePause,
            KeyCode::KeyA => Control::ToggleArrows,
            KeyCode::Digit1 => Control::SelectShape(PathShape::from_index(0)?),
            KeyCode::Digit2 => Control::SelectShape(PathShape::from_index(1)?),
            KeyCode::Digit3 => Control::SelectShape(PathShape::from_index(2)?),
            KeyCode::Digit4 => Control::SelectShape(PathShape::from_index(3)?),
            KeyCode::Digit5 => Control::SelectShape(PathShape::from_index(4)?),
            KeyCode::ArrowUp => Control::AdjustUsedFrequencies(step),
            KeyCode::ArrowDown => Control::AdjustUsedFrequencies(-step),
            KeyCode::Period => Control::AdjustFrequencies(10 * step),
            KeyCode::Comma => Control::AdjustFrequencies(-10 * step),
            KeyCode::BracketRight => Control::AdjustDuration(1.0),
            KeyCode::BracketLeft => Control::AdjustDuration(-1.0),
            KeyCode::Equal => Control::AdjustIterations(100),
            KeyCode::Minus => Control::AdjustIterations(-100),
            KeyCode::KeyR => Control::Reset,
            KeyCode::KeyS => Control::Capture,
            KeyCode::Escape => Control::Quit,
            _ => return None,
        };
        Some(control)
    }

    /// Apply a config edit through the clamping setters. Returns whether the
    /// config changed; edits already at a limit and the controls the
    /// application handles itself (reset, capture, quit) leave it untouched.
    pub fn apply(self, config: &mut SimulationConfig) -> bool {
        let before = config.clone();
        match self {
            Control::TogglePause => config.paused = !config.paused,
            Control::ToggleArrows => config.rotating_arrows = !config.rotating_arrows,
            Control::SelectShape(shape) => config.active_path = shape,
            Control::AdjustUsedFrequencies(delta) => {
                config.set_used_frequency_count(offset(config.used_frequency_count, delta))
            }
            Control::AdjustFrequencies(delta) => {
                config.set_frequency_count(offset(config.frequency_count, delta))
            }
            Control::AdjustDuration(delta) => config.set_duration_s(config.duration_s + delta),
            Control::AdjustIterations(delta) => {
                config.set_iteration_count(offset(config.iteration_count, delta))
            }
            Control::Reset | Control::Capture | Control::Quit => return false,
        }
        *config != before
    }
}

fn offset(value: u32, delta: i32) -> u32 {
    value.saturating_add_signed(delta)
}

/// Help text printed at startup
pub const HELP: &str = "\
Controls:
  Space        pause / resume
  A            toggle rotating arrows
  1-5          heart, star, square, trefoil, infinity
  Up / Down    used frequencies +/-1 (Shift: 10)
  , / .        computed frequencies -/+10 (Shift: 100)
  [ / ]        loop duration -/+1 s
  - / =        quadrature steps -/+100
  R            reset
  S            save frame (needs --capture-dir)
  Esc          quit";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping() {
        assert_eq!(Control::from_key(KeyCode::Space, false), Some(Control::TogglePause));
        assert_eq!(
            Control::from_key(KeyCode::Digit4, false),
            Some(Control::SelectShape(PathShape::Trefoil))
        );
        assert_eq!(
            Control::from_key(KeyCode::ArrowDown, true),
            Some(Control::AdjustUsedFrequencies(-10))
        );
        assert_eq!(Control::from_key(KeyCode::KeyQ, false), None);
    }

    #[test]
    fn test_edits_respect_ranges() {
        let mut config = SimulationConfig::default();
        for _ in 0..40 {
            Control::AdjustDuration(1.0).apply(&mut config);
        }
        assert_eq!(config.duration_s, 30.0, "duration clamps at 30 s");

        assert!(Control::AdjustIterations(-100).apply(&mut config));
        assert_eq!(config.iteration_count, 900);
        config.iteration_count = 300;
        assert!(
            !Control::AdjustIterations(-100).apply(&mut config),
            "no change reported at the lower limit"
        );
        assert_eq!(config.iteration_count, 300);

        config.used_frequency_count = 1;
        assert!(!Control::AdjustUsedFrequencies(-10).apply(&mut config));
        assert_eq!(config.used_frequency_count, 1, "used count never drops below one");
    }

    #[test]
    fn test_lowering_frequencies_clamps_used_count() {
        let mut config = SimulationConfig::default();
        config.frequency_count = 60;
        config.used_frequency_count = 120;
        Control::AdjustFrequencies(-10).apply(&mut config);
        assert_eq!(config.frequency_count, 50);
        assert_eq!(config.used_frequency_count, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toggles_and_app_controls() {
        let mut config = SimulationConfig::default();
        assert!(Control::TogglePause.apply(&mut config));
        assert!(config.paused);
        assert!(Control::ToggleArrows.apply(&mut config));
        assert!(!config.rotating_arrows);
        assert!(Control::SelectShape(PathShape::Star).apply(&mut config));
        assert!(!Control::SelectShape(PathShape::Star).apply(&mut config));

        let before = config.clone();
        assert!(!Control::Reset.apply(&mut config));
        assert!(!Control::Capture.apply(&mut config));
        assert_eq!(config, before, "app-level controls leave the config alone");
    }
}
