use crate::core::commands::Command;
use crate::core::profile::Profile;
use serde::{Deserialize, Serialize};

/// UI mode type of the device when the snapshot was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DockMode {
    #[default]
    Normal,
    Desk,
    Car,
    Television,
    Appliance,
    Watch,
}

impl DockMode {
    /// Map the `UI_MODE_TYPE_*` nibble of a ui mode value.
    pub fn from_ui_mode(mode: u32) -> Self {
        match mode & 0x0f {
            2 => Self::Desk,
            3 => Self::Car,
            4 => Self::Television,
            5 => Self::Appliance,
            6 => Self::Watch,
            _ => Self::Normal,
        }
    }
}

/// Live system values captured once, right before the first profile of a
/// session is applied. Restoring these puts the device back where it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub bluetooth_on: bool,
    pub wifi_on: bool,
    pub freeform: bool,
    pub user_rotation: i32,
    pub accelerometer_rotation: i32,
    pub dock_mode: DockMode,
    pub screen_timeout: i64,
    pub stay_on_while_plugged_in: i32,
    pub haptic_feedback_enabled: i32,
    pub show_touches: i32,
    pub navbar: String,
    pub hdmi_rotation: String,
    pub daydreams_enabled: i32,
    pub daydreams_on_charge: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibration_raw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backlight_raw: Option<String>,
    pub auto_brightness_mode: i32,
}

impl Default for Snapshot {
    /// The fallback used for any value that cannot be read.
    fn default() -> Self {
        Self {
            bluetooth_on: false,
            wifi_on: true,
            freeform: false,
            user_rotation: 0,
            accelerometer_rotation: 1,
            dock_mode: DockMode::Normal,
            screen_timeout: 60_000,
            stay_on_while_plugged_in: 0,
            haptic_feedback_enabled: 1,
            show_touches: 0,
            navbar: String::new(),
            hdmi_rotation: "landscape".to_string(),
            daydreams_enabled: 0,
            daydreams_on_charge: 0,
            vibration_raw: None,
            backlight_raw: None,
            auto_brightness_mode: 0,
        }
    }
}

/// The `Current` document.
///
/// While `not_active` is true there is no snapshot and no active id. The
/// `settings` field always holds the last requested values, which may run
/// ahead of the live system until their commands have executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentState {
    pub not_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_profile_id: Option<String>,
    #[serde(default)]
    pub reboot_required: bool,
    #[serde(default)]
    pub settings: Profile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Snapshot>,
    /// Commands held back from a full restart, run once the framework is up.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deferred: Vec<Command>,
}

impl Default for CurrentState {
    fn default() -> Self {
        Self::inactive()
    }
}

impl CurrentState {
    pub fn inactive() -> Self {
        Self {
            not_active: true,
            active_profile_id: None,
            reboot_required: false,
            settings: Profile::default(),
            snapshot: None,
            deferred: Vec::new(),
        }
    }

    pub fn active(id: impl Into<String>, settings: Profile, snapshot: Snapshot) -> Self {
        Self {
            not_active: false,
            active_profile_id: Some(id.into()),
            reboot_required: false,
            settings,
            snapshot: Some(snapshot),
            deferred: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.not_active
    }

    /// Bring a document read from disk back in line with the active/inactive
    /// invariant. A document that claims to be active without a snapshot is
    /// kept active with fallback snapshot values so it can still be reverted.
    pub fn normalized(mut self) -> Self {
        if self.not_active {
            let reboot = self.reboot_required;
            let deferred = std::mem::take(&mut self.deferred);
            // Restores still pending: the old baseline is still the true one.
            let snapshot = if deferred.is_empty() { None } else { self.snapshot.take() };
            self = Self::inactive();
            self.reboot_required = reboot;
            self.deferred = deferred;
            self.snapshot = snapshot;
        } else if self.snapshot.is_none() {
            tracing::warn!(
                target: "altscreen::state",
                "Active state without snapshot, using fallback values"
            );
            self.snapshot = Some(Snapshot::default());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dock_mode_from_ui_mode() {
        assert_eq!(DockMode::from_ui_mode(0x11), DockMode::Normal);
        assert_eq!(DockMode::from_ui_mode(0x12), DockMode::Desk);
        assert_eq!(DockMode::from_ui_mode(0x23), DockMode::Car);
        assert_eq!(DockMode::from_ui_mode(0), DockMode::Normal);
    }

    #[test]
    fn test_inactive_normalization_drops_snapshot() {
        let mut st = CurrentState::active("1", Profile::default(), Snapshot::default());
        st.not_active = true;
        let st = st.normalized();
        assert!(st.snapshot.is_none());
        assert!(st.active_profile_id.is_none());
    }

    #[test]
    fn test_inactive_with_pending_restores_keeps_snapshot() {
        let mut st = CurrentState::inactive();
        st.snapshot = Some(Snapshot { haptic_feedback_enabled: 1, ..Default::default() });
        st.deferred = vec![Command::new("settings put system haptic_feedback_enabled 1")];
        let st = st.normalized();
        assert!(!st.is_active());
        assert_eq!(st.deferred.len(), 1);
        assert!(st.snapshot.is_some());
    }

    #[test]
    fn test_active_without_snapshot_gets_fallback() {
        let mut st = CurrentState::active("1", Profile::default(), Snapshot::default());
        st.snapshot = None;
        let st = st.normalized();
        assert_eq!(st.snapshot, Some(Snapshot::default()));
        assert!(st.is_active());
    }

    #[test]
    fn test_current_state_toml_round_trip() {
        let st = CurrentState::active("1700000000000", Profile::default(), Snapshot::default());
        let text = toml::to_string(&st).unwrap();
        let back: CurrentState = toml::from_str(&text).unwrap();
        assert_eq!(back, st);
    }
}
