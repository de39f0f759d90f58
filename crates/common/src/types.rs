//! Core types for loginbdd

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Browser engine a driver session runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }

    /// Name used in W3C `browserName` capabilities
    pub fn webdriver_name(&self) -> &'static str {
        match self {
            Browser::Chromium => "chrome",
            Browser::Firefox => "firefox",
            Browser::Webkit => "safari",
        }
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Browser {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chromium" | "chrome" | "edge" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(Error::InvalidConfig(format!("unknown browser '{}'", other))),
        }
    }
}

/// Which backend drives the browser
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    #[default]
    Playwright,
    Webdriver,
    /// In-memory login application, no browser required
    Simulated,
    /// Test double: actions succeed, queries report absence
    Null,
}

impl DriverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverKind::Playwright => "playwright",
            DriverKind::Webdriver => "webdriver",
            DriverKind::Simulated => "simulated",
            DriverKind::Null => "null",
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DriverKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "playwright" => Ok(DriverKind::Playwright),
            "webdriver" | "selenium" => Ok(DriverKind::Webdriver),
            "simulated" | "sim" => Ok(DriverKind::Simulated),
            "null" | "none" => Ok(DriverKind::Null),
            other => Err(Error::InvalidConfig(format!("unknown driver '{}'", other))),
        }
    }
}

/// Keys the login steps press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Tab,
    Enter,
}

impl Key {
    /// Playwright key name
    pub fn as_str(&self) -> &'static str {
        match self {
            Key::Tab => "Tab",
            Key::Enter => "Enter",
        }
    }

    /// W3C WebDriver code point
    pub fn webdriver_code(&self) -> &'static str {
        match self {
            Key::Tab => "\u{E004}",
            Key::Enter => "\u{E007}",
        }
    }
}

/// Element state to wait for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl WaitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        }
    }
}

/// Signal that marks a navigation as complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadySignal {
    /// No network activity for a short quiet period
    NetworkIdle,
    /// The given selector is present in the DOM
    Element(String),
}

/// Snapshot of a located element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    pub visible: bool,
    pub enabled: bool,
    /// Rendered inner text
    #[serde(default)]
    pub text: String,
    /// Current input value, empty for non-inputs
    #[serde(default)]
    pub value: String,
}

/// Identity of the element holding keyboard focus
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusedElement {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub input_type: String,
}

impl FocusedElement {
    /// First non-empty of id, name, type, tag
    pub fn label(&self) -> String {
        [&self.id, &self.name, &self.input_type, &self.tag]
            .into_iter()
            .find(|s| !s.is_empty())
            .cloned()
            .unwrap_or_default()
    }
}

/// Login form field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Username,
    Password,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Username => "username",
            Field::Password => "password",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport { width: 1280, height: 720 }
    }
}

/// Layout box of an element in CSS pixels, relative to the viewport
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_parse_aliases() {
        assert_eq!("Chrome".parse::<Browser>().unwrap(), Browser::Chromium);
        assert_eq!("safari".parse::<Browser>().unwrap(), Browser::Webkit);
        assert!("netscape".parse::<Browser>().is_err());
    }

    #[test]
    fn test_driver_kind_parse() {
        assert_eq!("selenium".parse::<DriverKind>().unwrap(), DriverKind::Webdriver);
        assert_eq!("sim".parse::<DriverKind>().unwrap(), DriverKind::Simulated);
    }

    #[test]
    fn test_focused_label_prefers_id() {
        let f = FocusedElement {
            tag: "input".into(),
            id: String::new(),
            name: "password".into(),
            input_type: "password".into(),
        };
        assert_eq!(f.label(), "password");
        assert_eq!(FocusedElement::default().label(), "");
    }

    #[test]
    fn test_bounding_box_edges() {
        let b: BoundingBox =
            serde_json::from_str(r#"{"x": 16, "y": 40.5, "width": 328, "height": 40}"#).unwrap();
        assert_eq!(b.right(), 344.0);
        assert_eq!(b.bottom(), 80.5);
    }
}
