//! One-time capture of the pre-profile system values.
//!
//! Only called when no profile is active. Every read has a fallback from
//! [`Snapshot::default`]; a failed read is logged and counted, never fatal.

use anyhow::Result;
use std::fmt::Debug;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::core::device::{Device, Namespace};
use crate::core::platform::PlatformCapabilities;
use crate::core::state::Snapshot;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureReport {
    /// Names of the fields that fell back to their default.
    pub fallbacks: Vec<&'static str>,
}

struct Capture<'a> {
    device: &'a dyn Device,
    report: CaptureReport,
}

impl<'a> Capture<'a> {
    fn take<T: Debug>(&mut self, field: &'static str, fallback: T, read: Result<Option<T>>) -> T {
        match read {
            Ok(Some(v)) => v,
            Ok(None) => {
                debug!(target: "altscreen::snapshot", "{} unset, using {:?}", field, fallback);
                self.report.fallbacks.push(field);
                fallback
            }
            Err(e) => {
                warn!(target: "altscreen::snapshot", "Reading {} failed ({:#}), using {:?}", field, e, fallback);
                self.report.fallbacks.push(field);
                fallback
            }
        }
    }

    fn setting<T: FromStr + Debug>(
        &mut self,
        field: &'static str,
        ns: Namespace,
        key: &str,
        fallback: T,
    ) -> T {
        let read = self
            .device
            .setting(ns, key)
            .map(|v| v.and_then(|s| s.trim().parse::<T>().ok()));
        self.take(field, fallback, read)
    }
}

/// Read every live value a later revert will restore.
pub fn capture(device: &dyn Device, caps: &PlatformCapabilities) -> (Snapshot, CaptureReport) {
    let d = Snapshot::default();
    let mut c = Capture { device, report: CaptureReport::default() };

    let bluetooth_on = c.take("bluetooth_on", d.bluetooth_on, device.bluetooth_enabled().map(Some));
    let wifi_on = c.take("wifi_on", d.wifi_on, device.wifi_enabled().map(Some));
    let freeform = c.setting::<i32>("freeform", Namespace::Global, "enable_freeform_support", 0) != 0;
    let user_rotation = c.setting("user_rotation", Namespace::System, "user_rotation", d.user_rotation);
    let accelerometer_rotation = c.setting(
        "accelerometer_rotation",
        Namespace::System,
        "accelerometer_rotation",
        d.accelerometer_rotation,
    );
    let dock_mode = c.take("dock_mode", d.dock_mode, device.dock_mode().map(Some));
    let screen_timeout = c.setting("screen_timeout", Namespace::System, "screen_off_timeout", d.screen_timeout);
    let stay_on_while_plugged_in = c.setting(
        "stay_on_while_plugged_in",
        Namespace::Global,
        "stay_on_while_plugged_in",
        d.stay_on_while_plugged_in,
    );
    let haptic_feedback_enabled = c.setting(
        "haptic_feedback_enabled",
        Namespace::System,
        "haptic_feedback_enabled",
        d.haptic_feedback_enabled,
    );
    let show_touches = c.setting("show_touches", Namespace::System, "show_touches", d.show_touches);
    let navbar = c.take("navbar", d.navbar.clone(), device.prop("qemu.hw.mainkeys"));
    let hdmi_rotation = c.take(
        "hdmi_rotation",
        d.hdmi_rotation.clone(),
        device.prop("persist.demo.hdmirotation"),
    );
    let daydreams_enabled = c.setting(
        "daydreams_enabled",
        Namespace::Secure,
        "screensaver_enabled",
        d.daydreams_enabled,
    );
    let daydreams_on_charge = c.setting(
        "daydreams_on_charge",
        Namespace::Secure,
        "screensaver_activate_on_sleep",
        d.daydreams_on_charge,
    );
    let auto_brightness_mode = c.setting(
        "auto_brightness_mode",
        Namespace::System,
        "screen_brightness_mode",
        d.auto_brightness_mode,
    );

    let vibration_raw = caps.vibration_path.as_deref().and_then(|path| {
        let read = device.read_file(path).map(Some);
        let v = c.take("vibration_raw", String::new(), read);
        if v.is_empty() { None } else { Some(v) }
    });
    let backlight_raw = match caps.backlight_path.as_deref() {
        Some(path) => {
            let v = c.take("backlight_raw", String::new(), device.read_file(path).map(Some));
            if v.is_empty() { None } else { Some(v) }
        }
        None => {
            let read = device.setting(Namespace::System, "screen_brightness");
            let v = c.take("backlight_raw", String::new(), read);
            if v.is_empty() { None } else { Some(v) }
        }
    };

    let snapshot = Snapshot {
        bluetooth_on,
        wifi_on,
        freeform,
        user_rotation,
        accelerometer_rotation,
        dock_mode,
        screen_timeout,
        stay_on_while_plugged_in,
        haptic_feedback_enabled,
        show_touches,
        navbar,
        hdmi_rotation,
        daydreams_enabled,
        daydreams_on_charge,
        vibration_raw,
        backlight_raw,
        auto_brightness_mode,
    };

    debug!(
        target: "altscreen::snapshot",
        "Captured snapshot ({} fallbacks)",
        c.report.fallbacks.len()
    );
    (snapshot, c.report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::device::fake::FakeDevice;
    use crate::core::state::DockMode;

    #[test]
    fn test_capture_reads_live_values() {
        let mut dev = FakeDevice::phone();
        dev.bluetooth = Some(true);
        dev.dock = Some(DockMode::Desk);
        dev.set(Namespace::System, "user_rotation", "1");
        dev.set(Namespace::System, "accelerometer_rotation", "0");
        dev.set(Namespace::System, "screen_off_timeout", "30000");
        dev.set(Namespace::Global, "stay_on_while_plugged_in", "3");
        dev.set(Namespace::System, "haptic_feedback_enabled", "0");
        dev.set(Namespace::System, "show_touches", "1");
        dev.set(Namespace::Global, "enable_freeform_support", "1");
        dev.set(Namespace::Secure, "screensaver_enabled", "1");
        dev.set(Namespace::Secure, "screensaver_activate_on_sleep", "0");
        dev.set(Namespace::System, "screen_brightness_mode", "1");
        dev.set(Namespace::System, "screen_brightness", "143");
        dev.props.insert("persist.demo.hdmirotation".into(), "portrait".into());
        dev.props.insert("qemu.hw.mainkeys".into(), "1".into());

        let (snap, report) = capture(&dev, &PlatformCapabilities::for_api_level(28));
        assert!(snap.bluetooth_on);
        assert!(snap.wifi_on);
        assert!(snap.freeform);
        assert_eq!(snap.user_rotation, 1);
        assert_eq!(snap.accelerometer_rotation, 0);
        assert_eq!(snap.dock_mode, DockMode::Desk);
        assert_eq!(snap.screen_timeout, 30000);
        assert_eq!(snap.stay_on_while_plugged_in, 3);
        assert_eq!(snap.haptic_feedback_enabled, 0);
        assert_eq!(snap.show_touches, 1);
        assert_eq!(snap.hdmi_rotation, "portrait");
        assert_eq!(snap.navbar, "1");
        assert_eq!(snap.daydreams_enabled, 1);
        assert_eq!(snap.auto_brightness_mode, 1);
        assert_eq!(snap.backlight_raw.as_deref(), Some("143"));
        assert_eq!(snap.vibration_raw, None);
        assert!(report.fallbacks.is_empty(), "unexpected fallbacks: {:?}", report.fallbacks);
    }

    #[test]
    fn test_unreadable_values_fall_back() {
        let dev = FakeDevice::default();
        let (snap, report) = capture(&dev, &PlatformCapabilities::for_api_level(28));
        let d = Snapshot::default();
        assert_eq!(snap.wifi_on, d.wifi_on);
        assert_eq!(snap.accelerometer_rotation, d.accelerometer_rotation);
        assert_eq!(snap.screen_timeout, d.screen_timeout);
        assert_eq!(snap.hdmi_rotation, d.hdmi_rotation);
        assert!(report.fallbacks.contains(&"wifi_on"));
        assert!(report.fallbacks.contains(&"dock_mode"));
        assert!(report.fallbacks.contains(&"backlight_raw"));
    }

    #[test]
    fn test_sysfs_paths_are_read_when_present() {
        let mut dev = FakeDevice::phone();
        dev.files.insert("/sys/vib".into(), "2800".into());
        dev.files.insert("/sys/bl".into(), "255".into());
        let mut caps = PlatformCapabilities::for_api_level(28);
        caps.vibration_path = Some("/sys/vib".into());
        caps.backlight_path = Some("/sys/bl".into());
        let (snap, _) = capture(&dev, &caps);
        assert_eq!(snap.vibration_raw.as_deref(), Some("2800"));
        assert_eq!(snap.backlight_raw.as_deref(), Some("255"));
    }
}
