//! Keyboard and mouse action events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix wrapped around named keys in rendered text.
pub const ACTION_TEXT_NAME_PREFIX: &str = "<";
/// Suffix wrapped around named keys in rendered text.
pub const ACTION_TEXT_NAME_SUFFIX: &str = ">";

/// Kind of input action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionName {
    Press,
    Release,
    Move,
    Click,
    Scroll,
}

impl ActionName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionName::Press => "press",
            ActionName::Release => "release",
            ActionName::Move => "move",
            ActionName::Click => "click",
            ActionName::Scroll => "scroll",
        }
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "press" => Ok(ActionName::Press),
            "release" => Ok(ActionName::Release),
            "move" => Ok(ActionName::Move),
            "click" => Ok(ActionName::Click),
            "scroll" => Ok(ActionName::Scroll),
            other => Err(format!("Unknown action name: '{}'", other)),
        }
    }
}

/// A persisted action event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEvent {
    pub id: i64,
    /// Owning recording.
    pub recording_timestamp: i64,
    /// Event timestamp (ms since Unix epoch).
    pub timestamp: i64,
    pub name: ActionName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_event_timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mouse_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mouse_y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mouse_dx: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mouse_dy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mouse_button_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mouse_pressed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_char: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_vk: Option<String>,
    /// Layout-independent key name (e.g., "ctrl", "shift", "esc").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_key_name: Option<String>,
    /// Layout-independent character produced by the key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_key_char: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_key_vk: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    /// Accessibility state of the focused element, if captured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_state: Option<serde_json::Value>,
}

impl ActionEvent {
    /// Whether this event's canonical char or canonical name equals `token`.
    pub fn matches_key(&self, token: &str) -> bool {
        self.canonical_key_char.as_deref() == Some(token)
            || self.canonical_key_name.as_deref() == Some(token)
    }

    /// Rendered key text using the raw key fields.
    pub fn text(&self) -> Option<String> {
        key_text(
            self.key_name.as_deref(),
            self.key_char.as_deref(),
            self.key_vk.as_deref(),
        )
    }

    /// Rendered key text using the canonical key fields.
    pub fn canonical_text(&self) -> Option<String> {
        key_text(
            self.canonical_key_name.as_deref(),
            self.canonical_key_char.as_deref(),
            self.canonical_key_vk.as_deref(),
        )
    }
}

impl fmt::Display for ActionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "name=`{}`", self.name)?;
        if let (Some(x), Some(y)) = (self.mouse_x, self.mouse_y) {
            write!(f, " mouse_x=`{}` mouse_y=`{}`", x as i64, y as i64)?;
        }
        if let Some(button) = &self.mouse_button_name {
            write!(f, " mouse_button_name=`{}`", button)?;
        }
        if let Some(text) = self.text() {
            write!(f, " text=`{}`", text)?;
        }
        Ok(())
    }
}

fn key_text(name: Option<&str>, ch: Option<&str>, vk: Option<&str>) -> Option<String> {
    if let Some(name) = name {
        Some(format!("{ACTION_TEXT_NAME_PREFIX}{name}{ACTION_TEXT_NAME_SUFFIX}"))
    } else if let Some(ch) = ch {
        Some(ch.to_string())
    } else {
        vk.map(|vk| format!("{ACTION_TEXT_NAME_PREFIX}{vk}{ACTION_TEXT_NAME_SUFFIX}"))
    }
}

/// Action event fields as produced by the input recorder, before persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActionEvent {
    pub name: ActionName,
    #[serde(default)]
    pub screenshot_timestamp: Option<i64>,
    #[serde(default)]
    pub window_event_timestamp: Option<i64>,
    #[serde(default)]
    pub mouse_x: Option<f64>,
    #[serde(default)]
    pub mouse_y: Option<f64>,
    #[serde(default)]
    pub mouse_dx: Option<f64>,
    #[serde(default)]
    pub mouse_dy: Option<f64>,
    #[serde(default)]
    pub mouse_button_name: Option<String>,
    #[serde(default)]
    pub mouse_pressed: Option<bool>,
    #[serde(default)]
    pub key_name: Option<String>,
    #[serde(default)]
    pub key_char: Option<String>,
    #[serde(default)]
    pub key_vk: Option<String>,
    #[serde(default)]
    pub canonical_key_name: Option<String>,
    #[serde(default)]
    pub canonical_key_char: Option<String>,
    #[serde(default)]
    pub canonical_key_vk: Option<String>,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub element_state: Option<serde_json::Value>,
}

impl NewActionEvent {
    /// Empty event of the given kind.
    pub fn new(name: ActionName) -> Self {
        Self {
            name,
            screenshot_timestamp: None,
            window_event_timestamp: None,
            mouse_x: None,
            mouse_y: None,
            mouse_dx: None,
            mouse_dy: None,
            mouse_button_name: None,
            mouse_pressed: None,
            key_name: None,
            key_char: None,
            key_vk: None,
            canonical_key_name: None,
            canonical_key_char: None,
            canonical_key_vk: None,
            parent_id: None,
            element_state: None,
        }
    }

    /// Press or release of a character key.
    pub fn key_char(name: ActionName, ch: &str) -> Self {
        Self {
            key_char: Some(ch.to_string()),
            canonical_key_char: Some(ch.to_lowercase()),
            ..Self::new(name)
        }
    }

    /// Press or release of a named key such as "ctrl" or "esc".
    pub fn key_name(name: ActionName, key: &str) -> Self {
        Self {
            key_name: Some(key.to_string()),
            canonical_key_name: Some(key.to_string()),
            ..Self::new(name)
        }
    }

    /// Mouse click at a screen position.
    pub fn click(x: f64, y: f64, button: &str, pressed: bool) -> Self {
        Self {
            mouse_x: Some(x),
            mouse_y: Some(y),
            mouse_button_name: Some(button.to_string()),
            mouse_pressed: Some(pressed),
            ..Self::new(ActionName::Click)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persisted(new: NewActionEvent) -> ActionEvent {
        ActionEvent {
            id: 0,
            recording_timestamp: 0,
            timestamp: 0,
            name: new.name,
            screenshot_timestamp: None,
            window_event_timestamp: None,
            mouse_x: new.mouse_x,
            mouse_y: new.mouse_y,
            mouse_dx: None,
            mouse_dy: None,
            mouse_button_name: new.mouse_button_name,
            mouse_pressed: new.mouse_pressed,
            key_name: new.key_name,
            key_char: new.key_char,
            key_vk: new.key_vk,
            canonical_key_name: new.canonical_key_name,
            canonical_key_char: new.canonical_key_char,
            canonical_key_vk: new.canonical_key_vk,
            parent_id: None,
            element_state: None,
        }
    }

    #[test]
    fn test_action_name_round_trip() {
        for name in ["press", "release", "move", "click", "scroll"] {
            let parsed: ActionName = name.parse().unwrap();
            assert_eq!(parsed.as_str(), name);
        }
        assert!("hover".parse::<ActionName>().is_err());
    }

    #[test]
    fn test_key_text_prefers_name() {
        let ctrl = persisted(NewActionEvent::key_name(ActionName::Press, "ctrl"));
        assert_eq!(ctrl.text().as_deref(), Some("<ctrl>"));
        assert_eq!(ctrl.canonical_text().as_deref(), Some("<ctrl>"));

        let a = persisted(NewActionEvent::key_char(ActionName::Press, "A"));
        assert_eq!(a.text().as_deref(), Some("A"));
        assert_eq!(a.canonical_text().as_deref(), Some("a"));

        let mut vk = persisted(NewActionEvent::new(ActionName::Press));
        vk.key_vk = Some("53".into());
        assert_eq!(vk.text().as_deref(), Some("<53>"));
    }

    #[test]
    fn test_matches_key() {
        let shift = persisted(NewActionEvent::key_name(ActionName::Press, "shift"));
        assert!(shift.matches_key("shift"));
        assert!(!shift.matches_key("s"));

        let s = persisted(NewActionEvent::key_char(ActionName::Press, "s"));
        assert!(s.matches_key("s"));
    }

    #[test]
    fn test_display_click() {
        let click = persisted(NewActionEvent::click(10.6, 20.2, "left", true));
        assert_eq!(
            click.to_string(),
            "name=`click` mouse_x=`10` mouse_y=`20` mouse_button_name=`left`"
        );
    }
}
