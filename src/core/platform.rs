//! Platform capability flags.
//!
//! Everything that depends on the Android release or vendor build is decided
//! here once and handed to the planner, so planning stays a pure function.

use crate::core::cmd::{get_prop, read_output};
use crate::core::config::PlatformOverrides;
use std::path::Path;
use tracing::debug;

const VIBRATION_PATHS: [&str; 3] = [
    "/sys/class/timed_output/vibrator/amp",
    "/sys/class/timed_output/vibrator/vtg_level",
    "/sys/class/leds/vibrator/vmax_mv",
];

const BACKLIGHT_PATHS: [&str; 4] = [
    "/sys/class/backlight/panel0-backlight/brightness",
    "/sys/class/leds/lcd-backlight/brightness",
    "/sys/class/backlight/panel/brightness",
    "/sys/class/backlight/lcd-backlight/brightness",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformCapabilities {
    pub api_level: u32,
    /// `wm size` / `wm density` exist (older releases only have `am display-*`).
    pub wm_commands: bool,
    pub overscan: bool,
    pub immersive: bool,
    pub freeform: bool,
    /// Shell can write secure settings itself. When false, show-touches and
    /// navbar commands go to the privileged helper instead.
    pub secure_settings: bool,
    /// Build reboots on its own after certain display changes; a full restart
    /// must be replaced by a controlled reboot.
    pub reboot_workaround: bool,
    /// Reject resolutions larger than the physical panel.
    pub rejects_upscale: bool,
    pub chrome_tmp_command_line: bool,
    pub vibration_path: Option<String>,
    pub backlight_path: Option<String>,
    pub home_package: Option<String>,
    /// The resolved home app ships with the system image.
    pub vendor_home: bool,
}

impl Default for PlatformCapabilities {
    fn default() -> Self {
        Self::for_api_level(28)
    }
}

impl PlatformCapabilities {
    pub fn for_api_level(api_level: u32) -> Self {
        Self {
            api_level,
            wm_commands: api_level >= 18,
            overscan: (18..=29).contains(&api_level),
            immersive: (19..=29).contains(&api_level),
            freeform: api_level >= 24,
            secure_settings: true,
            reboot_workaround: false,
            rejects_upscale: api_level >= 24,
            chrome_tmp_command_line: api_level >= 24,
            vibration_path: None,
            backlight_path: None,
            home_package: None,
            vendor_home: false,
        }
    }

    /// Probe the running device.
    pub fn detect() -> Self {
        let api_level = get_prop("ro.build.version.sdk")
            .ok()
            .flatten()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or_else(|| {
                tracing::warn!(target: "altscreen::platform", "Could not read SDK level, assuming 28");
                28
            });

        let mut caps = Self::for_api_level(api_level);

        let cm_build = prop_present("ro.cm.version");
        caps.reboot_workaround = cm_build && (21..=23).contains(&api_level);

        // MIUI blocks secure settings writes from shell without an extra toggle.
        caps.secure_settings = !prop_present("ro.miui.ui.version.name");

        caps.vibration_path = first_existing(&VIBRATION_PATHS);
        caps.backlight_path = first_existing(&BACKLIGHT_PATHS);
        caps.home_package = resolve_home_package();
        caps.vendor_home = caps
            .home_package
            .as_deref()
            .map(is_system_package)
            .unwrap_or(false);

        debug!(target: "altscreen::platform", "Detected capabilities: {:?}", caps);
        caps
    }

    pub fn with_overrides(mut self, o: &PlatformOverrides) -> Self {
        if let Some(api) = o.api_level {
            let keep = self.clone();
            self = Self::for_api_level(api);
            self.secure_settings = keep.secure_settings;
            self.reboot_workaround = keep.reboot_workaround;
            self.vibration_path = keep.vibration_path;
            self.backlight_path = keep.backlight_path;
            self.home_package = keep.home_package;
            self.vendor_home = keep.vendor_home;
        }
        if let Some(v) = o.secure_settings {
            self.secure_settings = v;
        }
        if let Some(v) = o.reboot_workaround {
            self.reboot_workaround = v;
        }
        if let Some(p) = &o.vibration_path {
            self.vibration_path = Some(p.clone());
        }
        if let Some(p) = &o.backlight_path {
            self.backlight_path = Some(p.clone());
        }
        if let Some(p) = &o.home_package {
            self.home_package = Some(p.clone());
        }
        self
    }
}

fn prop_present(key: &str) -> bool {
    matches!(get_prop(key), Ok(Some(_)))
}

fn first_existing(paths: &[&str]) -> Option<String> {
    paths
        .iter()
        .find(|p| Path::new(p).exists())
        .map(|p| p.to_string())
}

fn resolve_home_package() -> Option<String> {
    let out = read_output(
        "cmd",
        &[
            "package",
            "resolve-activity",
            "--brief",
            "-a",
            "android.intent.action.MAIN",
            "-c",
            "android.intent.category.HOME",
        ],
    )
    .ok()
    .flatten()?;
    parse_home_component(&out)
}

/// The last line of `resolve-activity --brief` is `package/activity`.
pub(crate) fn parse_home_component(output: &str) -> Option<String> {
    let last = output.lines().last()?.trim();
    let (pkg, _) = last.split_once('/')?;
    if pkg.contains('.') { Some(pkg.to_string()) } else { None }
}

fn is_system_package(pkg: &str) -> bool {
    read_output("pm", &["list", "packages", "-s", pkg])
        .ok()
        .flatten()
        .map(|out| out.lines().any(|l| l.trim() == format!("package:{}", pkg)))
        .unwrap_or(false)
}
