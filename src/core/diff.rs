//! Per-setting change detection between the `Current` document and a target
//! profile.
//!
//! A field at its unmanaged default never produces `Apply`; moving an active
//! field back to its default produces `Restore`, which the command rules turn
//! into "put the snapshot value back".

use crate::core::profile::{
    Density, HdmiRotation, ImmersiveMode, Overscan, Profile, Resolution, RotationLock,
    ScreenTimeout,
};
use crate::core::state::CurrentState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change<T> {
    Apply(T),
    Restore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Enable,
    Restore,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub size: Option<Change<(u32, u32)>>,
    pub density: Option<Change<u32>>,
    pub overscan: Option<Change<Overscan>>,
    pub rotation: Option<Change<RotationLock>>,
    pub immersive: Option<Change<ImmersiveMode>>,
    pub screen_timeout: Option<Change<ScreenTimeout>>,
    pub hdmi_rotation: Option<Change<HdmiRotation>>,
    pub bluetooth: Option<Toggle>,
    pub wifi: Option<Toggle>,
    pub daydreams: Option<Toggle>,
    pub show_touches: Option<Toggle>,
    pub backlight_off: Option<Toggle>,
    pub vibration_off: Option<Toggle>,
    pub chrome: Option<Toggle>,
    pub navbar: Option<Toggle>,
    pub freeform: Option<Toggle>,
    pub taskbar: Option<Toggle>,
    pub clear_home: Option<Toggle>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        *self == ChangeSet::default()
    }

    /// Size or density will be touched by this transition.
    pub fn touches_size_or_density(&self) -> bool {
        self.size.is_some() || self.density.is_some()
    }
}

fn diff_value<T: PartialEq + Copy>(
    active: bool,
    target: T,
    current: T,
    is_default: impl Fn(&T) -> bool,
    same: impl Fn(&T, &T) -> bool,
) -> Option<Change<T>> {
    if !active {
        return if is_default(&target) { None } else { Some(Change::Apply(target)) };
    }
    if same(&target, &current) {
        None
    } else if is_default(&target) {
        Some(Change::Restore)
    } else {
        Some(Change::Apply(target))
    }
}

fn diff_enum<T: PartialEq + Copy + Default>(active: bool, target: T, current: T) -> Option<Change<T>> {
    diff_value(active, target, current, |t| *t == T::default(), |a, b| a == b)
}

fn diff_toggle(active: bool, target: bool, current: bool) -> Option<Toggle> {
    match (active, target, current) {
        (false, true, _) => Some(Toggle::Enable),
        (false, false, _) => None,
        (true, t, c) if t == c => None,
        (true, true, _) => Some(Toggle::Enable),
        (true, false, _) => Some(Toggle::Restore),
    }
}

/// Compare `target` against what `current` last applied.
pub fn compute(current: &CurrentState, target: &Profile) -> ChangeSet {
    let active = current.is_active();
    let c = &current.settings;

    let size = diff_value(
        active,
        target.resolution,
        c.resolution,
        |r| r.is_reset(),
        |a, b| a == b,
    )
    .map(|ch| match (ch, target.resolution) {
        (Change::Apply(_), Resolution::Custom { width, height }) => {
            Change::Apply((width, height))
        }
        _ => Change::Restore,
    });

    let density = diff_value(active, target.density, c.density, |d| d.is_reset(), |a, b| a == b)
        .map(|ch| match (ch, target.density) {
            (Change::Apply(_), Density::Dpi(dpi)) => Change::Apply(dpi),
            _ => Change::Restore,
        });

    let overscan = diff_value(
        active,
        target.overscan,
        c.overscan,
        |o| !o.enabled,
        |a, b| a.equivalent(b),
    );

    ChangeSet {
        size,
        density,
        overscan,
        rotation: diff_enum(active, target.rotation_lock, c.rotation_lock),
        immersive: diff_enum(active, target.immersive_mode, c.immersive_mode),
        screen_timeout: diff_enum(active, target.screen_timeout, c.screen_timeout),
        hdmi_rotation: diff_enum(active, target.hdmi_rotation, c.hdmi_rotation),
        bluetooth: diff_toggle(active, target.bluetooth_on, c.bluetooth_on),
        wifi: diff_toggle(active, target.wifi_on, c.wifi_on),
        daydreams: diff_toggle(active, target.daydreams_on, c.daydreams_on),
        show_touches: diff_toggle(active, target.show_touches, c.show_touches),
        backlight_off: diff_toggle(active, target.backlight_off, c.backlight_off),
        vibration_off: diff_toggle(active, target.vibration_off, c.vibration_off),
        chrome: diff_toggle(active, target.chrome_desktop_mode, c.chrome_desktop_mode),
        navbar: diff_toggle(active, target.navbar_forced, c.navbar_forced),
        freeform: diff_toggle(active, target.freeform, c.freeform),
        taskbar: diff_toggle(active, target.taskbar_enabled, c.taskbar_enabled),
        clear_home: diff_toggle(active, target.clear_home_default, c.clear_home_default),
    }
}

/// Everything `current` turned on, marked for restoration.
pub fn compute_revert(current: &CurrentState) -> ChangeSet {
    if !current.is_active() {
        return ChangeSet::default();
    }
    compute(current, &Profile::default())
}

/// Re-assert size and density whatever their previous value.
pub fn force_size_and_density(changes: &mut ChangeSet, target: &Profile) {
    changes.size = Some(match target.resolution {
        Resolution::Custom { width, height } => Change::Apply((width, height)),
        Resolution::Reset => Change::Restore,
    });
    changes.density = Some(match target.density {
        Density::Dpi(dpi) => Change::Apply(dpi),
        Density::Reset => Change::Restore,
    });
}
