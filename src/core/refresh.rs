//! UI refresh strategy: which restart, if any, makes the new display values
//! visible, and which slot order the batch is built in.

use crate::core::commands::rules::BuildContext;
use crate::core::commands::{BOOT_ORDER, Command, FULL_RESTART_ORDER, STANDARD_ORDER, Slot};
use crate::core::platform::PlatformCapabilities;
use crate::core::profile::UiRefresh;

const SYSTEM_UI_PROCESS: &str = "com.android.systemui";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UiRefreshStrategy {
    #[default]
    None,
    /// Restart the composition process and clear background apps.
    PartialRestart,
    /// Restart the whole framework (or reboot where the build needs it).
    FullRestart,
}

impl UiRefreshStrategy {
    pub fn select(caps: &PlatformCapabilities, reboot_required: bool, requested: UiRefresh) -> Self {
        if caps.reboot_workaround || reboot_required || requested == UiRefresh::ActivityManager {
            return Self::FullRestart;
        }
        match requested {
            UiRefresh::SystemUi => Self::PartialRestart,
            _ => Self::None,
        }
    }

    /// Slot order the batch is built in.
    pub fn order(&self) -> &'static [Slot] {
        match self {
            Self::FullRestart => &FULL_RESTART_ORDER,
            _ => &STANDARD_ORDER,
        }
    }

    /// Slots built separately for after the framework comes back.
    pub fn deferred_order(&self) -> &'static [Slot] {
        match self {
            Self::FullRestart => &BOOT_ORDER,
            _ => &[],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::PartialRestart => "partial-restart",
            Self::FullRestart => "full-restart",
        }
    }
}

impl std::fmt::Display for UiRefreshStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commands for the `ui-refresh` and `ui-refresh-finalize` slots.
pub fn refresh_commands(ctx: &BuildContext<'_>) -> (Vec<Command>, Vec<Command>) {
    let delay = ctx.timing.refresh_delay_ms;
    match ctx.strategy {
        UiRefreshStrategy::None => (vec![], vec![]),
        UiRefreshStrategy::PartialRestart => {
            let refresh = vec![Command::new(format!("pkill {}", SYSTEM_UI_PROCESS)).wait_before(delay)];
            let mut finalize = vec![Command::new("am kill-all")];
            let keep_home = ctx.caps.vendor_home && ctx.keep_vendor_home;
            if let Some(home) = ctx.caps.home_package.as_deref()
                && !keep_home
            {
                finalize.push(Command::new(format!("am force-stop {}", home)));
            }
            (refresh, finalize)
        }
        UiRefreshStrategy::FullRestart if ctx.caps.reboot_workaround => {
            (vec![Command::new("reboot").wait_before(delay)], vec![])
        }
        UiRefreshStrategy::FullRestart => (
            vec![Command::new("stop").wait_before(delay)],
            vec![Command::new("start").wait_before(delay)],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::TimingConfig;
    use crate::core::diff::ChangeSet;
    use crate::core::display::NativeDisplay;
    use crate::core::profile::Profile;
    use crate::core::state::Snapshot;

    fn lines(strategy: UiRefreshStrategy, caps: &PlatformCapabilities, keep_vendor_home: bool) -> (Vec<String>, Vec<String>) {
        let changes = ChangeSet::default();
        let previous = Profile::default();
        let snapshot = Snapshot::default();
        let native = NativeDisplay { width: 1080, height: 1920, density: 480 };
        let ctx = BuildContext {
            changes: &changes,
            previous: &previous,
            snapshot: &snapshot,
            caps,
            native: &native,
            safe_mode: false,
            keep_vendor_home,
            strategy,
            timing: TimingConfig::default(),
        };
        let (a, b) = refresh_commands(&ctx);
        (
            a.into_iter().map(|c| c.line).collect(),
            b.into_iter().map(|c| c.line).collect(),
        )
    }

    #[test]
    fn test_select_strategy() {
        let caps = PlatformCapabilities::default();
        assert_eq!(UiRefreshStrategy::select(&caps, false, UiRefresh::DoNothing), UiRefreshStrategy::None);
        assert_eq!(UiRefreshStrategy::select(&caps, false, UiRefresh::SystemUi), UiRefreshStrategy::PartialRestart);
        assert_eq!(UiRefreshStrategy::select(&caps, true, UiRefresh::SystemUi), UiRefreshStrategy::FullRestart);
        assert_eq!(
            UiRefreshStrategy::select(&caps, false, UiRefresh::ActivityManager),
            UiRefreshStrategy::FullRestart
        );

        let cm = PlatformCapabilities { reboot_workaround: true, ..PlatformCapabilities::for_api_level(22) };
        assert_eq!(UiRefreshStrategy::select(&cm, false, UiRefresh::DoNothing), UiRefreshStrategy::FullRestart);
    }

    #[test]
    fn test_partial_restart_stops_home() {
        let mut caps = PlatformCapabilities::default();
        caps.home_package = Some("com.example.launcher".into());
        let (refresh, finalize) = lines(UiRefreshStrategy::PartialRestart, &caps, true);
        assert_eq!(refresh, vec!["pkill com.android.systemui"]);
        assert_eq!(finalize, vec!["am kill-all", "am force-stop com.example.launcher"]);

        caps.vendor_home = true;
        let (_, finalize) = lines(UiRefreshStrategy::PartialRestart, &caps, true);
        assert_eq!(finalize, vec!["am kill-all"]);
    }

    #[test]
    fn test_full_restart_commands() {
        let caps = PlatformCapabilities::default();
        assert_eq!(
            lines(UiRefreshStrategy::FullRestart, &caps, false),
            (vec!["stop".to_string()], vec!["start".to_string()])
        );
        let cm = PlatformCapabilities { reboot_workaround: true, ..PlatformCapabilities::for_api_level(22) };
        assert_eq!(lines(UiRefreshStrategy::FullRestart, &cm, false), (vec!["reboot".to_string()], vec![]));
    }

    #[test]
    fn test_order_variants() {
        assert_eq!(UiRefreshStrategy::None.order().len(), 23);
        assert!(!UiRefreshStrategy::FullRestart.order().contains(&Slot::Vibration));
        assert!(UiRefreshStrategy::FullRestart.deferred_order().contains(&Slot::Backlight));
        assert!(UiRefreshStrategy::PartialRestart.deferred_order().is_empty());
    }
}
