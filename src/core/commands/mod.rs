//! Shell commands and the ordered slot tables they are built from.

pub mod rules;

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// One shell command plus the settle time it needs around it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub line: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub delay_before_ms: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub delay_after_ms: u64,
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

impl Command {
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            delay_before_ms: 0,
            delay_after_ms: 0,
        }
    }

    pub fn wait_before(mut self, ms: u64) -> Self {
        self.delay_before_ms = ms;
        self
    }

    pub fn wait_after(mut self, ms: u64) -> Self {
        self.delay_after_ms = ms;
        self
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.line)
    }
}

/// Ordered commands handed to a sink in one go.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandBatch {
    pub commands: Vec<Command>,
    pub reboot_hint: bool,
}

impl CommandBatch {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(|c| c.line.as_str())
    }

    /// Render as a POSIX shell script, delays as `sleep` lines.
    pub fn to_script(&self) -> String {
        let mut s = String::new();
        for cmd in &self.commands {
            if cmd.delay_before_ms > 0 {
                let _ = writeln!(s, "sleep {}", format_secs(cmd.delay_before_ms));
            }
            let _ = writeln!(s, "{}", cmd.line);
            if cmd.delay_after_ms > 0 {
                let _ = writeln!(s, "sleep {}", format_secs(cmd.delay_after_ms));
            }
        }
        s
    }
}

fn format_secs(ms: u64) -> String {
    if ms % 1000 == 0 {
        format!("{}", ms / 1000)
    } else {
        format!("{}.{:03}", ms / 1000, ms % 1000)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Density,
    DensityRepeat,
    Size,
    Overscan,
    RotationPre,
    Rotation,
    RotationPost,
    ChromeEnable,
    ChromeRestart,
    Immersive,
    Freeform,
    HdmiRotation,
    Navbar,
    DaydreamsEnable,
    DaydreamsCharging,
    SafeModeSize,
    SafeModeDensity,
    UiRefresh,
    UiRefreshFinalize,
    StayOn,
    ShowTouches,
    Vibration,
    Backlight,
}

impl Slot {
    pub fn is_refresh(&self) -> bool {
        matches!(self, Self::UiRefresh | Self::UiRefreshFinalize)
    }

    /// Slots whose commands go to the privileged helper when the shell
    /// cannot write secure settings.
    pub fn needs_secure_settings(&self) -> bool {
        matches!(self, Self::ShowTouches | Self::Navbar)
    }
}

/// Order used with no refresh or a partial restart. Density runs twice.
pub const STANDARD_ORDER: [Slot; 23] = [
    Slot::Density,
    Slot::DensityRepeat,
    Slot::Size,
    Slot::Overscan,
    Slot::RotationPre,
    Slot::Rotation,
    Slot::RotationPost,
    Slot::ChromeEnable,
    Slot::ChromeRestart,
    Slot::Immersive,
    Slot::Freeform,
    Slot::HdmiRotation,
    Slot::Navbar,
    Slot::DaydreamsEnable,
    Slot::DaydreamsCharging,
    Slot::SafeModeSize,
    Slot::SafeModeDensity,
    Slot::UiRefresh,
    Slot::UiRefreshFinalize,
    Slot::StayOn,
    Slot::ShowTouches,
    Slot::Vibration,
    Slot::Backlight,
];

/// Order used with a full restart: everything that must survive the restart
/// runs before it, density once.
pub const FULL_RESTART_ORDER: [Slot; 15] = [
    Slot::Density,
    Slot::Size,
    Slot::Overscan,
    Slot::ChromeEnable,
    Slot::ChromeRestart,
    Slot::Immersive,
    Slot::Freeform,
    Slot::HdmiRotation,
    Slot::Navbar,
    Slot::DaydreamsEnable,
    Slot::DaydreamsCharging,
    Slot::StayOn,
    Slot::ShowTouches,
    Slot::UiRefresh,
    Slot::UiRefreshFinalize,
];

/// Slots left out of the full restart batch and run once the framework is
/// back up.
pub const BOOT_ORDER: [Slot; 7] = [
    Slot::RotationPre,
    Slot::Rotation,
    Slot::RotationPost,
    Slot::SafeModeSize,
    Slot::SafeModeDensity,
    Slot::Vibration,
    Slot::Backlight,
];
