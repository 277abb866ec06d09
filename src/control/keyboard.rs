// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Keyboard shortcut handling.
//!
//! Provides configurable keyboard bindings for transport, tempo and UI
//! actions.

use std::collections::BTreeMap;
use std::collections::HashMap;

use crossterm::event::{KeyCode, KeyModifiers};

use super::ControlAction;

/// A keyboard shortcut definition
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shortcut {
    /// Key code
    pub code: KeyCode,
    /// Required modifiers
    pub modifiers: KeyModifiers,
}

impl Shortcut {
    /// Create a new shortcut
    pub fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    /// Create a shortcut with no modifiers
    pub fn key(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::NONE)
    }

    /// Create a shortcut with Ctrl modifier
    pub fn ctrl(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::CONTROL)
    }

    /// Create a shortcut with Shift modifier
    pub fn shift(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::SHIFT)
    }
}

/// A keyboard binding (shortcut to action)
#[derive(Debug, Clone)]
pub struct KeyBinding {
    /// The shortcut
    pub shortcut: Shortcut,
    /// The action to perform
    pub action: ControlAction,
    /// Description for help display
    pub description: String,
    /// Category for grouping in help
    pub category: String,
}

impl KeyBinding {
    /// Create a new key binding
    pub fn new(shortcut: Shortcut, action: ControlAction, description: impl Into<String>) -> Self {
        Self {
            shortcut,
            action,
            description: description.into(),
            category: "General".to_string(),
        }
    }

    /// Set the category
    pub fn category(mut self, cat: impl Into<String>) -> Self {
        self.category = cat.into();
        self
    }
}

/// Keyboard controller with configurable bindings
pub struct KeyboardController {
    bindings: HashMap<Shortcut, KeyBinding>,
}

impl KeyboardController {
    /// Create an empty keyboard controller
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    /// Create a keyboard controller with default bindings
    pub fn with_defaults() -> Self {
        let mut controller = Self::new();
        controller.add_default_bindings();
        controller
    }

    fn add_default_bindings(&mut self) {
        // Transport
        self.add(
            KeyBinding::new(
                Shortcut::key(KeyCode::Char(' ')),
                ControlAction::TogglePlay,
                "Play/Pause",
            )
            .category("Transport"),
        );
        self.add(
            KeyBinding::new(Shortcut::key(KeyCode::Enter), ControlAction::Play, "Play")
                .category("Transport"),
        );
        self.add(
            KeyBinding::new(Shortcut::key(KeyCode::Esc), ControlAction::Pause, "Pause")
                .category("Transport"),
        );

        // Tempo
        for (shortcut, action, description) in [
            (Shortcut::key(KeyCode::Up), ControlAction::IncrementBpm, "Tempo +1 BPM"),
            (Shortcut::key(KeyCode::Char('+')), ControlAction::IncrementBpm, "Tempo +1 BPM"),
            (Shortcut::key(KeyCode::Char('=')), ControlAction::IncrementBpm, "Tempo +1 BPM"),
            (Shortcut::key(KeyCode::Down), ControlAction::DecrementBpm, "Tempo -1 BPM"),
            (Shortcut::key(KeyCode::Char('-')), ControlAction::DecrementBpm, "Tempo -1 BPM"),
            (Shortcut::key(KeyCode::PageUp), ControlAction::AdjustBpm(10), "Tempo +10 BPM"),
            (Shortcut::shift(KeyCode::Up), ControlAction::AdjustBpm(10), "Tempo +10 BPM"),
            (Shortcut::key(KeyCode::PageDown), ControlAction::AdjustBpm(-10), "Tempo -10 BPM"),
            (Shortcut::shift(KeyCode::Down), ControlAction::AdjustBpm(-10), "Tempo -10 BPM"),
        ] {
            self.add(KeyBinding::new(shortcut, action, description).category("Tempo"));
        }

        // UI
        self.add(
            KeyBinding::new(
                Shortcut::key(KeyCode::Char('?')),
                ControlAction::ToggleHelp,
                "Toggle Help",
            )
            .category("UI"),
        );
        self.add(
            KeyBinding::new(
                Shortcut::key(KeyCode::Char('h')),
                ControlAction::ToggleHelp,
                "Toggle Help",
            )
            .category("UI"),
        );
        self.add(
            KeyBinding::new(Shortcut::key(KeyCode::Char('q')), ControlAction::Quit, "Quit")
                .category("UI"),
        );
        self.add(
            KeyBinding::new(Shortcut::ctrl(KeyCode::Char('c')), ControlAction::Quit, "Quit")
                .category("UI"),
        );
    }

    /// Add a key binding
    pub fn add(&mut self, binding: KeyBinding) {
        self.bindings.insert(binding.shortcut.clone(), binding);
    }

    /// Get action for a key event
    pub fn get_action(&self, code: KeyCode, modifiers: KeyModifiers) -> Option<&ControlAction> {
        let shortcut = Shortcut::new(code, modifiers);
        self.bindings.get(&shortcut).map(|b| &b.action)
    }

    /// Process a key event and return the action.
    ///
    /// Terminals disagree on whether shifted symbols like `+` or `?` carry
    /// the Shift modifier, so a character key falls back to its unshifted
    /// binding.
    pub fn process_key(&self, code: KeyCode, modifiers: KeyModifiers) -> Option<ControlAction> {
        if let Some(action) = self.get_action(code, modifiers) {
            return Some(*action);
        }
        match code {
            KeyCode::Char(_) if modifiers == KeyModifiers::SHIFT => {
                self.get_action(code, KeyModifiers::NONE).copied()
            }
            _ => None,
        }
    }

    /// Get bindings grouped by category, sorted for stable display
    pub fn bindings_by_category(&self) -> BTreeMap<String, Vec<&KeyBinding>> {
        let mut grouped: BTreeMap<String, Vec<&KeyBinding>> = BTreeMap::new();

        for binding in self.bindings.values() {
            grouped
                .entry(binding.category.clone())
                .or_default()
                .push(binding);
        }
        for bindings in grouped.values_mut() {
            bindings.sort_by(|a, b| a.description.cmp(&b.description));
        }

        grouped
    }
}

impl Default for KeyboardController {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Format a shortcut for display
pub fn format_shortcut(shortcut: &Shortcut) -> String {
    let mut parts = Vec::new();

    if shortcut.modifiers.contains(KeyModifiers::CONTROL) {
        parts.push("Ctrl");
    }
    if shortcut.modifiers.contains(KeyModifiers::ALT) {
        parts.push("Alt");
    }
    if shortcut.modifiers.contains(KeyModifiers::SHIFT) {
        parts.push("Shift");
    }

    let key = match shortcut.code {
        KeyCode::Char(' ') => "Space".to_string(),
        KeyCode::Char(c) => c.to_uppercase().to_string(),
        KeyCode::F(n) => format!("F{}", n),
        KeyCode::Up => "↑".to_string(),
        KeyCode::Down => "↓".to_string(),
        KeyCode::Left => "←".to_string(),
        KeyCode::Right => "→".to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        KeyCode::PageUp => "PageUp".to_string(),
        KeyCode::PageDown => "PageDown".to_string(),
        _ => "?".to_string(),
    };

    parts.push(&key);
    parts.join("+")
}
