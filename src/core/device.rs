//! Live device access used outside the command batch: reading the values a
//! snapshot is made of, and the few actions that are API calls rather than
//! shell commands.

use anyhow::{Context, Result, bail};
use std::fs;
use tracing::{debug, warn};

use crate::core::cmd::{get_prop, read_output, run_cmd_timeout_sync};
use crate::core::display::{NativeDisplay, query_native_display};
use crate::core::state::DockMode;

const ACTION_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    System,
    Secure,
    Global,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Secure => "secure",
            Self::Global => "global",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceAction {
    SetWifi(bool),
    SetBluetooth(bool),
    /// Start or quit the companion taskbar app.
    SetTaskbar(bool),
    /// Drop the preferred home app so the user is asked to pick one.
    ClearHomeDefault,
}

pub trait Device: Send {
    fn setting(&self, ns: Namespace, key: &str) -> Result<Option<String>>;
    fn prop(&self, key: &str) -> Result<Option<String>>;
    fn read_file(&self, path: &str) -> Result<String>;
    fn wifi_enabled(&self) -> Result<bool>;
    fn bluetooth_enabled(&self) -> Result<bool>;
    fn dock_mode(&self) -> Result<DockMode>;
    /// Whether the freeform window manager feature is live right now. The
    /// feature is evaluated at boot, so it can disagree with the setting.
    fn freeform_window_management(&self) -> Result<bool>;
    fn native_display(&self) -> Result<NativeDisplay>;
    fn perform(&mut self, action: &DeviceAction) -> Result<()>;
}

/// The real device, through `settings`, `getprop`, `dumpsys` and sysfs.
#[derive(Debug, Default)]
pub struct AndroidDevice;

impl AndroidDevice {
    pub fn new() -> Self {
        Self
    }

    fn shell(&self, program: &str, args: &[&str]) -> Result<()> {
        let out = run_cmd_timeout_sync(program, args, ACTION_TIMEOUT_MS)?;
        if !out.status.success() {
            bail!(
                "{} {} failed: {}",
                program,
                args.join(" "),
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        Ok(())
    }
}

impl Device for AndroidDevice {
    fn setting(&self, ns: Namespace, key: &str) -> Result<Option<String>> {
        let value = read_output("settings", &["get", ns.as_str(), key])?;
        Ok(value.filter(|v| v != "null"))
    }

    fn prop(&self, key: &str) -> Result<Option<String>> {
        get_prop(key)
    }

    fn read_file(&self, path: &str) -> Result<String> {
        let s = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
        Ok(s.trim().to_string())
    }

    fn wifi_enabled(&self) -> Result<bool> {
        let out = read_output("dumpsys", &["wifi"])?.unwrap_or_default();
        Ok(out.contains("Wi-Fi is enabled"))
    }

    fn bluetooth_enabled(&self) -> Result<bool> {
        let v = self.setting(Namespace::Global, "bluetooth_on")?;
        Ok(v.as_deref() == Some("1"))
    }

    fn dock_mode(&self) -> Result<DockMode> {
        let out = read_output("dumpsys", &["uimode"])?.unwrap_or_default();
        parse_ui_mode(&out).context("No mCurUiMode in dumpsys uimode")
    }

    fn freeform_window_management(&self) -> Result<bool> {
        let out = read_output("pm", &["list", "features"])?.unwrap_or_default();
        Ok(out
            .lines()
            .any(|l| l.trim() == "feature:android.software.freeform_window_management"))
    }

    fn native_display(&self) -> Result<NativeDisplay> {
        query_native_display()
    }

    fn perform(&mut self, action: &DeviceAction) -> Result<()> {
        debug!(target: "altscreen::device", "Performing {:?}", action);
        match action {
            DeviceAction::SetWifi(on) => {
                self.shell("svc", &["wifi", if *on { "enable" } else { "disable" }])
            }
            DeviceAction::SetBluetooth(on) => {
                self.shell("svc", &["bluetooth", if *on { "enable" } else { "disable" }])
            }
            DeviceAction::SetTaskbar(on) => {
                let intent = if *on {
                    "com.farmerbb.taskbar.START"
                } else {
                    "com.farmerbb.taskbar.QUIT"
                };
                self.shell("am", &["broadcast", "-a", intent])
            }
            DeviceAction::ClearHomeDefault => {
                if let Err(e) = self.shell("cmd", &["role", "clear-role-holders", "android.app.role.HOME"]) {
                    warn!(target: "altscreen::device", "Clearing home role failed: {:#}", e);
                    return Err(e);
                }
                Ok(())
            }
        }
    }
}

/// `mCurUiMode=0x11` → mode type nibble.
fn parse_ui_mode(dump: &str) -> Option<DockMode> {
    let idx = dump.find("mCurUiMode=0x")?;
    let hex: String = dump[idx + "mCurUiMode=0x".len()..]
        .chars()
        .take_while(|c| c.is_ascii_hexdigit())
        .collect();
    u32::from_str_radix(&hex, 16).ok().map(DockMode::from_ui_mode)
}
