//! One rule per slot: a pure function from the change set and context to
//! the commands that fill the slot.

use super::{Command, Slot};
use crate::core::config::TimingConfig;
use crate::core::diff::{Change, ChangeSet, Toggle};
use crate::core::display::NativeDisplay;
use crate::core::platform::PlatformCapabilities;
use crate::core::profile::{HdmiRotation, ImmersiveMode, Profile, RotationLock, ScreenTimeout};
use crate::core::refresh::{self, UiRefreshStrategy};
use crate::core::state::{DockMode, Snapshot};

const CHROME_PACKAGE: &str = "com.android.chrome";
const CHROME_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const SCREEN_TIMEOUT_MAX: i64 = 2_147_483_647;
/// AC | USB | wireless
const STAY_ON_ALL_SOURCES: i32 = 7;

pub type Rule = fn(&BuildContext<'_>) -> Vec<Command>;

pub struct BuildContext<'a> {
    pub changes: &'a ChangeSet,
    /// What the previous transition left applied.
    pub previous: &'a Profile,
    pub snapshot: &'a Snapshot,
    pub caps: &'a PlatformCapabilities,
    pub native: &'a NativeDisplay,
    pub safe_mode: bool,
    pub keep_vendor_home: bool,
    pub strategy: UiRefreshStrategy,
    pub timing: TimingConfig,
}

impl Slot {
    pub fn rule(&self) -> Rule {
        match self {
            Slot::Density | Slot::DensityRepeat => density,
            Slot::Size => size,
            Slot::Overscan => overscan,
            Slot::RotationPre => rotation_pre,
            Slot::Rotation => rotation,
            Slot::RotationPost => rotation_post,
            Slot::ChromeEnable => chrome_enable,
            Slot::ChromeRestart => chrome_restart,
            Slot::Immersive => immersive,
            Slot::Freeform => freeform,
            Slot::HdmiRotation => hdmi_rotation,
            Slot::Navbar => navbar,
            Slot::DaydreamsEnable => daydreams_enable,
            Slot::DaydreamsCharging => daydreams_charging,
            Slot::SafeModeSize => safe_mode_size,
            Slot::SafeModeDensity => safe_mode_density,
            Slot::UiRefresh => ui_refresh,
            Slot::UiRefreshFinalize => ui_refresh_finalize,
            Slot::StayOn => stay_on,
            Slot::ShowTouches => show_touches,
            Slot::Vibration => vibration,
            Slot::Backlight => backlight,
        }
    }
}

fn put(ns: &str, key: &str, value: impl std::fmt::Display) -> Command {
    Command::new(format!("settings put {} {} {}", ns, key, value))
}

fn flag(on: bool) -> u8 {
    u8::from(on)
}

fn density(ctx: &BuildContext<'_>) -> Vec<Command> {
    let tool = if ctx.caps.wm_commands { "wm density" } else { "am display-density" };
    match ctx.changes.density {
        Some(Change::Apply(dpi)) => vec![Command::new(format!("{} {}", tool, dpi))],
        Some(Change::Restore) => vec![Command::new(format!("{} reset", tool))],
        None => vec![],
    }
}

fn size(ctx: &BuildContext<'_>) -> Vec<Command> {
    let tool = if ctx.caps.wm_commands { "wm size" } else { "am display-size" };
    match ctx.changes.size {
        Some(Change::Apply((w, h))) => vec![Command::new(format!("{} {}x{}", tool, w, h))],
        Some(Change::Restore) => vec![Command::new(format!("{} reset", tool))],
        None => vec![],
    }
}

fn overscan(ctx: &BuildContext<'_>) -> Vec<Command> {
    if !ctx.caps.overscan {
        return vec![];
    }
    match ctx.changes.overscan {
        Some(Change::Apply(o)) => vec![Command::new(format!(
            "wm overscan {},{},{},{}",
            o.left, o.top, o.right, o.bottom
        ))],
        Some(Change::Restore) => vec![Command::new("wm overscan reset")],
        None => vec![],
    }
}

fn is_locked(r: RotationLock) -> bool {
    matches!(r, RotationLock::Landscape | RotationLock::Portrait)
}

fn rotation_pre(ctx: &BuildContext<'_>) -> Vec<Command> {
    match ctx.changes.rotation {
        Some(Change::Apply(RotationLock::AutoRotate)) => {
            vec![put("system", "accelerometer_rotation", 1)]
        }
        Some(Change::Apply(RotationLock::Landscape | RotationLock::Portrait)) => {
            vec![put("system", "accelerometer_rotation", 0)]
        }
        Some(Change::Restore) => vec![put(
            "system",
            "accelerometer_rotation",
            ctx.snapshot.accelerometer_rotation,
        )],
        Some(Change::Apply(RotationLock::DoNothing)) | None => vec![],
    }
}

fn rotation(ctx: &BuildContext<'_>) -> Vec<Command> {
    // user_rotation counts quarter turns from the panel's natural orientation.
    let (landscape, portrait) = if ctx.native.is_landscape() { (0, 1) } else { (1, 0) };
    match ctx.changes.rotation {
        Some(Change::Apply(RotationLock::Landscape)) => vec![put("system", "user_rotation", landscape)],
        Some(Change::Apply(RotationLock::Portrait)) => vec![put("system", "user_rotation", portrait)],
        Some(Change::Restore) => vec![put("system", "user_rotation", ctx.snapshot.user_rotation)],
        _ => vec![],
    }
}

fn rotation_post(ctx: &BuildContext<'_>) -> Vec<Command> {
    // Car mode pins the orientation; leave it while a lock is held.
    if ctx.snapshot.dock_mode != DockMode::Car {
        return vec![];
    }
    let was_locked = is_locked(ctx.previous.rotation_lock);
    match ctx.changes.rotation {
        Some(Change::Apply(r)) if is_locked(r) && !was_locked => vec![Command::new("cmd uimode car no")],
        Some(Change::Apply(RotationLock::AutoRotate)) | Some(Change::Restore) if was_locked => {
            vec![Command::new("cmd uimode car yes")]
        }
        _ => vec![],
    }
}

fn chrome_command_line(caps: &PlatformCapabilities) -> &'static str {
    if caps.chrome_tmp_command_line {
        "/data/local/tmp/chrome-command-line"
    } else {
        "/data/local/chrome-command-line"
    }
}

fn chrome_enable(ctx: &BuildContext<'_>) -> Vec<Command> {
    let path = chrome_command_line(ctx.caps);
    match ctx.changes.chrome {
        Some(Toggle::Enable) => vec![
            Command::new(format!(
                "echo 'chrome --user-agent=\"{}\"' > {}",
                CHROME_USER_AGENT, path
            )),
            Command::new(format!("chmod 644 {}", path)),
        ],
        Some(Toggle::Restore) => vec![Command::new(format!("rm -f {}", path))],
        None => vec![],
    }
}

fn chrome_restart(ctx: &BuildContext<'_>) -> Vec<Command> {
    match ctx.changes.chrome {
        Some(_) => vec![Command::new(format!("am force-stop {}", CHROME_PACKAGE))],
        None => vec![],
    }
}

fn immersive(ctx: &BuildContext<'_>) -> Vec<Command> {
    if !ctx.caps.immersive {
        return vec![];
    }
    match ctx.changes.immersive {
        Some(Change::Apply(ImmersiveMode::ImmersiveMode)) => {
            vec![put("global", "policy_control", "immersive.full=*")]
        }
        Some(Change::Apply(ImmersiveMode::StatusOnly)) => {
            vec![put("global", "policy_control", "immersive.status=*")]
        }
        Some(Change::Restore) => vec![put("global", "policy_control", "null*")],
        _ => vec![],
    }
}

/// The value the freeform setting ends up at after this transition, if it
/// changes at all.
pub fn requested_freeform(changes: &ChangeSet, snapshot: &Snapshot) -> Option<bool> {
    match changes.freeform {
        Some(Toggle::Enable) => Some(true),
        Some(Toggle::Restore) => Some(snapshot.freeform),
        None => None,
    }
}

fn freeform(ctx: &BuildContext<'_>) -> Vec<Command> {
    if !ctx.caps.freeform {
        return vec![];
    }
    match requested_freeform(ctx.changes, ctx.snapshot) {
        Some(on) => vec![
            put("global", "enable_freeform_support", flag(on)),
            put("global", "force_resizable_activities", flag(on)),
        ],
        None => vec![],
    }
}

fn hdmi_rotation(ctx: &BuildContext<'_>) -> Vec<Command> {
    let value = match ctx.changes.hdmi_rotation {
        Some(Change::Apply(r)) => r.as_prop().to_string(),
        Some(Change::Restore) => ctx.snapshot.hdmi_rotation.clone(),
        None => return vec![],
    };
    let value = if value.is_empty() { HdmiRotation::Landscape.as_prop().to_string() } else { value };
    vec![Command::new(format!("setprop persist.demo.hdmirotation {}", value))]
}

fn navbar(ctx: &BuildContext<'_>) -> Vec<Command> {
    match ctx.changes.navbar {
        Some(Toggle::Enable) => vec![Command::new("setprop qemu.hw.mainkeys 0")],
        Some(Toggle::Restore) if ctx.snapshot.navbar.is_empty() => {
            vec![Command::new("setprop qemu.hw.mainkeys \"\"")]
        }
        Some(Toggle::Restore) => vec![Command::new(format!(
            "setprop qemu.hw.mainkeys {}",
            ctx.snapshot.navbar
        ))],
        None => vec![],
    }
}

fn daydreams_enable(ctx: &BuildContext<'_>) -> Vec<Command> {
    match ctx.changes.daydreams {
        Some(Toggle::Enable) => vec![put("secure", "screensaver_enabled", 1)],
        Some(Toggle::Restore) => vec![put("secure", "screensaver_enabled", ctx.snapshot.daydreams_enabled)],
        None => vec![],
    }
}

fn daydreams_charging(ctx: &BuildContext<'_>) -> Vec<Command> {
    match ctx.changes.daydreams {
        Some(Toggle::Enable) => vec![put("secure", "screensaver_activate_on_sleep", 1)],
        Some(Toggle::Restore) => vec![put(
            "secure",
            "screensaver_activate_on_sleep",
            ctx.snapshot.daydreams_on_charge,
        )],
        None => vec![],
    }
}

fn safe_mode_size(ctx: &BuildContext<'_>) -> Vec<Command> {
    if !ctx.safe_mode {
        return vec![];
    }
    match ctx.changes.size {
        Some(Change::Apply((w, h))) => vec![put("global", "display_size_forced", format!("{},{}", w, h))],
        Some(Change::Restore) => vec![Command::new("settings delete global display_size_forced")],
        None => vec![],
    }
}

fn safe_mode_density(ctx: &BuildContext<'_>) -> Vec<Command> {
    if !ctx.safe_mode {
        return vec![];
    }
    match ctx.changes.density {
        Some(Change::Apply(dpi)) => vec![put("secure", "display_density_forced", dpi)],
        Some(Change::Restore) => vec![Command::new("settings delete secure display_density_forced")],
        None => vec![],
    }
}

fn ui_refresh(ctx: &BuildContext<'_>) -> Vec<Command> {
    refresh::refresh_commands(ctx).0
}

fn ui_refresh_finalize(ctx: &BuildContext<'_>) -> Vec<Command> {
    refresh::refresh_commands(ctx).1
}

fn stay_on(ctx: &BuildContext<'_>) -> Vec<Command> {
    let snap = ctx.snapshot;
    let prev = ctx.previous.screen_timeout;
    match ctx.changes.screen_timeout {
        Some(Change::Apply(ScreenTimeout::AlwaysOn)) => {
            let mut v = vec![put("system", "screen_off_timeout", SCREEN_TIMEOUT_MAX)];
            if prev == ScreenTimeout::AlwaysOnCharging {
                v.push(put("global", "stay_on_while_plugged_in", snap.stay_on_while_plugged_in));
            }
            v
        }
        Some(Change::Apply(ScreenTimeout::AlwaysOnCharging)) => {
            let mut v = vec![put("global", "stay_on_while_plugged_in", STAY_ON_ALL_SOURCES)];
            if prev == ScreenTimeout::AlwaysOn {
                v.push(put("system", "screen_off_timeout", snap.screen_timeout));
            }
            v
        }
        Some(Change::Restore) => match prev {
            ScreenTimeout::AlwaysOn => vec![put("system", "screen_off_timeout", snap.screen_timeout)],
            ScreenTimeout::AlwaysOnCharging => {
                vec![put("global", "stay_on_while_plugged_in", snap.stay_on_while_plugged_in)]
            }
            ScreenTimeout::DoNothing => vec![],
        },
        _ => vec![],
    }
}

fn show_touches(ctx: &BuildContext<'_>) -> Vec<Command> {
    match ctx.changes.show_touches {
        Some(Toggle::Enable) => vec![put("system", "show_touches", 1)],
        Some(Toggle::Restore) => vec![put("system", "show_touches", ctx.snapshot.show_touches)],
        None => vec![],
    }
}

fn vibration(ctx: &BuildContext<'_>) -> Vec<Command> {
    let path = ctx.caps.vibration_path.as_deref();
    match ctx.changes.vibration_off {
        Some(Toggle::Enable) => {
            let mut v = vec![put("system", "haptic_feedback_enabled", 0)];
            if let Some(p) = path {
                v.push(Command::new(format!("echo 0 > {}", p)));
            }
            v
        }
        Some(Toggle::Restore) => {
            let mut v = vec![put(
                "system",
                "haptic_feedback_enabled",
                ctx.snapshot.haptic_feedback_enabled,
            )];
            if let (Some(p), Some(raw)) = (path, ctx.snapshot.vibration_raw.as_deref()) {
                v.push(Command::new(format!("echo {} > {}", raw, p)));
            }
            v
        }
        None => vec![],
    }
}

fn backlight(ctx: &BuildContext<'_>) -> Vec<Command> {
    let path = ctx.caps.backlight_path.as_deref();
    let delay = ctx.timing.backlight_delay_ms;
    match ctx.changes.backlight_off {
        Some(Toggle::Enable) => {
            let off = match path {
                Some(p) => Command::new(format!("echo 0 > {}", p)),
                None => put("system", "screen_brightness", 0),
            };
            vec![put("system", "screen_brightness_mode", 0).wait_before(delay), off]
        }
        Some(Toggle::Restore) => {
            let mut v = Vec::new();
            if let Some(raw) = ctx.snapshot.backlight_raw.as_deref() {
                v.push(match path {
                    Some(p) => Command::new(format!("echo {} > {}", raw, p)),
                    None => put("system", "screen_brightness", raw),
                });
            }
            v.push(put("system", "screen_brightness_mode", ctx.snapshot.auto_brightness_mode));
            if let Some(first) = v.first_mut() {
                first.delay_before_ms = delay;
            }
            v
        }
        None => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::profile::Overscan;

    struct Fixture {
        changes: ChangeSet,
        previous: Profile,
        snapshot: Snapshot,
        caps: PlatformCapabilities,
        native: NativeDisplay,
        safe_mode: bool,
    }

    impl Fixture {
        fn new(changes: ChangeSet) -> Self {
            Self {
                changes,
                previous: Profile::default(),
                snapshot: Snapshot::default(),
                caps: PlatformCapabilities::for_api_level(28),
                native: NativeDisplay { width: 1080, height: 1920, density: 480 },
                safe_mode: false,
            }
        }

        fn lines(&self, slot: Slot) -> Vec<String> {
            let ctx = BuildContext {
                changes: &self.changes,
                previous: &self.previous,
                snapshot: &self.snapshot,
                caps: &self.caps,
                native: &self.native,
                safe_mode: self.safe_mode,
                keep_vendor_home: false,
                strategy: UiRefreshStrategy::None,
                timing: TimingConfig::default(),
            };
            (slot.rule())(&ctx).into_iter().map(|c| c.line).collect()
        }
    }

    #[test]
    fn test_density_uses_am_before_wm_exists() {
        let mut f = Fixture::new(ChangeSet { density: Some(Change::Apply(240)), ..Default::default() });
        assert_eq!(f.lines(Slot::Density), vec!["wm density 240"]);
        assert_eq!(f.lines(Slot::DensityRepeat), vec!["wm density 240"]);
        f.caps = PlatformCapabilities::for_api_level(17);
        assert_eq!(f.lines(Slot::Density), vec!["am display-density 240"]);
    }

    #[test]
    fn test_overscan_gated_by_capability() {
        let o = Overscan { enabled: true, left: 10, top: 20, right: 30, bottom: 40 };
        let mut f = Fixture::new(ChangeSet { overscan: Some(Change::Apply(o)), ..Default::default() });
        assert_eq!(f.lines(Slot::Overscan), vec!["wm overscan 10,20,30,40"]);
        f.caps = PlatformCapabilities::for_api_level(30);
        assert!(f.lines(Slot::Overscan).is_empty());
    }

    #[test]
    fn test_rotation_lock_on_portrait_phone() {
        let f = Fixture::new(ChangeSet {
            rotation: Some(Change::Apply(RotationLock::Landscape)),
            ..Default::default()
        });
        assert_eq!(f.lines(Slot::RotationPre), vec!["settings put system accelerometer_rotation 0"]);
        assert_eq!(f.lines(Slot::Rotation), vec!["settings put system user_rotation 1"]);
        assert!(f.lines(Slot::RotationPost).is_empty());
    }

    #[test]
    fn test_rotation_restore_uses_snapshot() {
        let mut f = Fixture::new(ChangeSet { rotation: Some(Change::Restore), ..Default::default() });
        f.snapshot.accelerometer_rotation = 0;
        f.snapshot.user_rotation = 3;
        assert_eq!(f.lines(Slot::RotationPre), vec!["settings put system accelerometer_rotation 0"]);
        assert_eq!(f.lines(Slot::Rotation), vec!["settings put system user_rotation 3"]);
    }

    #[test]
    fn test_car_dock_is_left_while_locked() {
        let mut f = Fixture::new(ChangeSet {
            rotation: Some(Change::Apply(RotationLock::Portrait)),
            ..Default::default()
        });
        f.snapshot.dock_mode = DockMode::Car;
        assert_eq!(f.lines(Slot::RotationPost), vec!["cmd uimode car no"]);

        f.changes.rotation = Some(Change::Restore);
        f.previous.rotation_lock = RotationLock::Portrait;
        assert_eq!(f.lines(Slot::RotationPost), vec!["cmd uimode car yes"]);
    }

    #[test]
    fn test_stay_on_switch_restores_other_half() {
        let mut f = Fixture::new(ChangeSet {
            screen_timeout: Some(Change::Apply(ScreenTimeout::AlwaysOnCharging)),
            ..Default::default()
        });
        f.previous.screen_timeout = ScreenTimeout::AlwaysOn;
        f.snapshot.screen_timeout = 30000;
        assert_eq!(
            f.lines(Slot::StayOn),
            vec![
                "settings put global stay_on_while_plugged_in 7",
                "settings put system screen_off_timeout 30000"
            ]
        );
    }

    #[test]
    fn test_backlight_off_waits_first() {
        let mut f = Fixture::new(ChangeSet { backlight_off: Some(Toggle::Enable), ..Default::default() });
        f.caps.backlight_path = Some("/sys/class/leds/lcd-backlight/brightness".into());
        let ctx = BuildContext {
            changes: &f.changes,
            previous: &f.previous,
            snapshot: &f.snapshot,
            caps: &f.caps,
            native: &f.native,
            safe_mode: false,
            keep_vendor_home: false,
            strategy: UiRefreshStrategy::None,
            timing: TimingConfig::default(),
        };
        let cmds = backlight(&ctx);
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0].delay_before_ms, 2000);
        assert_eq!(cmds[1].line, "echo 0 > /sys/class/leds/lcd-backlight/brightness");
    }

    #[test]
    fn test_backlight_restore_writes_raw_value() {
        let mut f = Fixture::new(ChangeSet { backlight_off: Some(Toggle::Restore), ..Default::default() });
        f.snapshot.backlight_raw = Some("180".into());
        f.snapshot.auto_brightness_mode = 1;
        assert_eq!(
            f.lines(Slot::Backlight),
            vec![
                "settings put system screen_brightness 180",
                "settings put system screen_brightness_mode 1"
            ]
        );
    }

    #[test]
    fn test_safe_mode_slots_follow_size_and_density() {
        let mut f = Fixture::new(ChangeSet {
            size: Some(Change::Apply((1920, 1080))),
            density: Some(Change::Restore),
            ..Default::default()
        });
        assert!(f.lines(Slot::SafeModeSize).is_empty());
        f.safe_mode = true;
        assert_eq!(f.lines(Slot::SafeModeSize), vec!["settings put global display_size_forced 1920,1080"]);
        assert_eq!(f.lines(Slot::SafeModeDensity), vec!["settings delete secure display_density_forced"]);
    }

    #[test]
    fn test_chrome_paths_by_release() {
        let mut f = Fixture::new(ChangeSet { chrome: Some(Toggle::Restore), ..Default::default() });
        assert_eq!(f.lines(Slot::ChromeEnable), vec!["rm -f /data/local/tmp/chrome-command-line"]);
        assert_eq!(f.lines(Slot::ChromeRestart), vec!["am force-stop com.android.chrome"]);
        f.caps = PlatformCapabilities::for_api_level(22);
        assert_eq!(f.lines(Slot::ChromeEnable), vec!["rm -f /data/local/chrome-command-line"]);
    }

    #[test]
    fn test_freeform_restore_uses_snapshot() {
        let mut f = Fixture::new(ChangeSet { freeform: Some(Toggle::Restore), ..Default::default() });
        f.snapshot.freeform = false;
        assert_eq!(
            f.lines(Slot::Freeform),
            vec![
                "settings put global enable_freeform_support 0",
                "settings put global force_resizable_activities 0"
            ]
        );
    }
}
