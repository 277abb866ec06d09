// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Control input for the metronome.
//!
//! Key presses become [`ControlAction`]s; transport-related actions map
//! onto [`TransportCommand`]s for the runtime loop.

pub mod keyboard;

pub use keyboard::{format_shortcut, KeyBinding, KeyboardController, Shortcut};

use crate::transport::TransportCommand;

/// Action that can be triggered by controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    // Transport
    /// Toggle play/pause
    TogglePlay,
    /// Start playback
    Play,
    /// Pause playback
    Pause,

    // Tempo
    /// Tempo +1 BPM
    IncrementBpm,
    /// Tempo -1 BPM
    DecrementBpm,
    /// Adjust tempo by delta
    AdjustBpm(i32),

    // UI
    /// Toggle help display
    ToggleHelp,
    /// Quit application
    Quit,
}

impl ControlAction {
    /// Transport command this action sends, if any
    pub fn transport_command(&self) -> Option<TransportCommand> {
        match *self {
            ControlAction::TogglePlay => Some(TransportCommand::Toggle),
            ControlAction::Play => Some(TransportCommand::Play),
            ControlAction::Pause => Some(TransportCommand::Pause),
            ControlAction::IncrementBpm => Some(TransportCommand::Nudge(1)),
            ControlAction::DecrementBpm => Some(TransportCommand::Nudge(-1)),
            ControlAction::AdjustBpm(delta) => Some(TransportCommand::Nudge(delta)),
            ControlAction::ToggleHelp | ControlAction::Quit => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_commands() {
        assert_eq!(
            ControlAction::TogglePlay.transport_command(),
            Some(TransportCommand::Toggle)
        );
        assert_eq!(
            ControlAction::DecrementBpm.transport_command(),
            Some(TransportCommand::Nudge(-1))
        );
        assert_eq!(
            ControlAction::AdjustBpm(10).transport_command(),
            Some(TransportCommand::Nudge(10))
        );
        assert_eq!(ControlAction::ToggleHelp.transport_command(), None);
        assert_eq!(ControlAction::Quit.transport_command(), None);
    }
}
