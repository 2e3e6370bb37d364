//! Profile data model.
//!
//! A [`Profile`] is the bundle of display and system settings a user activates
//! together. Every field has an "unmanaged" default (`reset`, `do-nothing`,
//! `false`); a field at its default is left alone when the profile is loaded.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Requested screen size, `"WxH"` or `"reset"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Resolution {
    #[default]
    Reset,
    Custom { width: u32, height: u32 },
}

impl Resolution {
    pub fn is_reset(&self) -> bool {
        matches!(self, Self::Reset)
    }

    /// Resolve `reset` to the panel's native size.
    pub fn resolve(&self, native_width: u32, native_height: u32) -> (u32, u32) {
        match *self {
            Self::Reset => (native_width, native_height),
            Self::Custom { width, height } => (width, height),
        }
    }
}

impl FromStr for Resolution {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("reset") {
            return Ok(Self::Reset);
        }
        let (w, h) = s
            .split_once(['x', 'X'])
            .with_context(|| format!("Invalid resolution '{}', expected WxH", s))?;
        let width: u32 = w.trim().parse().with_context(|| format!("Invalid width in '{}'", s))?;
        let height: u32 = h.trim().parse().with_context(|| format!("Invalid height in '{}'", s))?;
        if width == 0 || height == 0 {
            bail!("Resolution '{}' has a zero dimension", s);
        }
        Ok(Self::Custom { width, height })
    }
}

impl TryFrom<String> for Resolution {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reset => write!(f, "reset"),
            Self::Custom { width, height } => write!(f, "{}x{}", width, height),
        }
    }
}

/// Requested density, an integer DPI or `"reset"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Density {
    #[default]
    Reset,
    Dpi(u32),
}

impl Density {
    pub fn is_reset(&self) -> bool {
        matches!(self, Self::Reset)
    }

    pub fn resolve(&self, native_density: u32) -> u32 {
        match *self {
            Self::Reset => native_density,
            Self::Dpi(dpi) => dpi,
        }
    }
}

impl FromStr for Density {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("reset") {
            return Ok(Self::Reset);
        }
        let dpi: u32 = s.parse().with_context(|| format!("Invalid density '{}'", s))?;
        if dpi == 0 {
            bail!("Density must be greater than zero");
        }
        Ok(Self::Dpi(dpi))
    }
}

impl TryFrom<String> for Density {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Density> for String {
    fn from(value: Density) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Density {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reset => write!(f, "reset"),
            Self::Dpi(dpi) => write!(f, "{}", dpi),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Overscan {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub left: i32,
    #[serde(default)]
    pub top: i32,
    #[serde(default)]
    pub right: i32,
    #[serde(default)]
    pub bottom: i32,
}

impl Overscan {
    /// Two overscan settings are equivalent when both are disabled, or both
    /// are enabled with the same four insets.
    pub fn equivalent(&self, other: &Overscan) -> bool {
        match (self.enabled, other.enabled) {
            (false, false) => true,
            (true, true) => self.insets() == other.insets(),
            _ => false,
        }
    }

    pub fn insets(&self) -> (i32, i32, i32, i32) {
        (self.left, self.top, self.right, self.bottom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RotationLock {
    #[default]
    DoNothing,
    AutoRotate,
    Landscape,
    Portrait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImmersiveMode {
    #[default]
    DoNothing,
    StatusOnly,
    ImmersiveMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScreenTimeout {
    #[default]
    DoNothing,
    AlwaysOn,
    AlwaysOnCharging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HdmiRotation {
    #[default]
    Landscape,
    Portrait,
}

impl HdmiRotation {
    pub fn as_prop(&self) -> &'static str {
        match self {
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UiRefresh {
    #[default]
    DoNothing,
    SystemUi,
    ActivityManager,
}

/// One saved bundle of settings. Immutable once saved.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub resolution: Resolution,
    pub density: Density,
    pub overscan: Overscan,
    pub rotation_lock: RotationLock,
    pub immersive_mode: ImmersiveMode,
    pub screen_timeout: ScreenTimeout,
    pub hdmi_rotation: HdmiRotation,
    pub ui_refresh: UiRefresh,
    pub bluetooth_on: bool,
    pub wifi_on: bool,
    pub daydreams_on: bool,
    pub show_touches: bool,
    pub backlight_off: bool,
    pub vibration_off: bool,
    pub chrome_desktop_mode: bool,
    pub navbar_forced: bool,
    pub freeform: bool,
    pub taskbar_enabled: bool,
    pub clear_home_default: bool,
}

impl Profile {
    /// True when every field is at its unmanaged default.
    pub fn is_unmanaged(&self) -> bool {
        *self == Profile::default()
    }
}

/// A profile as persisted under `Saved[id]`, with its listing title.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedProfile {
    pub title: String,
    #[serde(default)]
    pub settings: Profile,
}
