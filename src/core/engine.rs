//! Transition executor.
//!
//! Runs blacklist check, snapshot capture, planning and dispatch for Load,
//! TurnOff and the operations built on them. Each transition reads `Current`
//! once at the start and writes it once at the end, after the batch has run.
//!
//! An [`Engine`] is **not** safe for concurrent use on the same store. The
//! daemon owns exactly one and feeds it from a single worker thread.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::common::{ANY_PROFILE, DaemonStatus, ProfileEntry};
use crate::core::blacklist::{self, Verdict};
use crate::core::commands::CommandBatch;
use crate::core::config::TimingConfig;
use crate::core::device::Device;
use crate::core::display::NativeDisplay;
use crate::core::error::TransitionError;
use crate::core::plan::{self, PlanEnv, TransitionPlan};
use crate::core::platform::PlatformCapabilities;
use crate::core::profile::Profile;
use crate::core::refresh::UiRefreshStrategy;
use crate::core::sink::{CommandSink, HelperDispatch, SinkOutcome};
use crate::core::snapshot;
use crate::core::state::{CurrentState, Snapshot};
use crate::core::store::{MainDocument, ProfileStore, ScratchDocument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Loaded(String),
    TurnedOff,
    ProfilesChanged,
    Reapplied,
}

impl std::fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loaded(id) => write!(f, "loaded {}", id),
            Self::TurnedOff => write!(f, "off"),
            Self::ProfilesChanged => write!(f, "profiles"),
            Self::Reapplied => write!(f, "reapplied"),
        }
    }
}

/// Fire-and-forget change callback.
pub type Notifier = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub profile_id: Option<String>,
    pub strategy: UiRefreshStrategy,
    pub commands: usize,
    pub helper_commands: usize,
    pub deferred: usize,
    pub actions: usize,
    /// Degraded success: the device needs a power cycle for full effect.
    pub reboot_required: bool,
    pub used_fallback: bool,
    pub snapshot_fallbacks: usize,
}

impl TransitionOutcome {
    fn from_plan(plan: &TransitionPlan, profile_id: Option<String>) -> Self {
        Self {
            profile_id,
            strategy: plan.strategy,
            commands: plan.batch.len(),
            helper_commands: plan.helper.len(),
            deferred: plan.deferred.len(),
            actions: plan.actions.len(),
            reboot_required: plan.reboot_required,
            used_fallback: false,
            snapshot_fallbacks: 0,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "commands={} helper={} deferred={} actions={} strategy={} reboot_required={} fallback={}",
            self.commands,
            self.helper_commands,
            self.deferred,
            self.actions,
            self.strategy,
            self.reboot_required,
            self.used_fallback
        )
    }
}

/// The three places a transition can send work.
pub struct Sinks {
    pub primary: Box<dyn CommandSink>,
    pub fallback: Box<dyn CommandSink>,
    pub helper: Box<dyn HelperDispatch>,
}

struct PreparedLoad {
    plan: TransitionPlan,
    target: Profile,
    snapshot: Snapshot,
    fallbacks: usize,
    current: CurrentState,
}

pub struct Engine<D: Device> {
    store: ProfileStore,
    device: D,
    caps: PlatformCapabilities,
    sinks: Sinks,
    timing: TimingConfig,
    notifier: Option<Notifier>,
}

impl<D: Device> Engine<D> {
    pub fn new(
        store: ProfileStore,
        device: D,
        caps: PlatformCapabilities,
        sinks: Sinks,
        timing: TimingConfig,
    ) -> Self {
        Self {
            store,
            device,
            caps,
            sinks,
            timing,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn caps(&self) -> &PlatformCapabilities {
        &self.caps
    }

    fn notify(&self, event: ChangeEvent) {
        debug!(target: "altscreen::engine", "Change: {}", event);
        if let Some(n) = &self.notifier {
            n(event);
        }
    }

    /// `Main`, with the native panel metrics captured on first use.
    fn main_document(&mut self) -> Result<(MainDocument, NativeDisplay), TransitionError> {
        let mut main = self.store.main().map_err(TransitionError::Store)?;
        if let Some(native) = main.native {
            return Ok((main, native));
        }
        let native = self
            .device
            .native_display()
            .map_err(TransitionError::NativeDisplay)?;
        info!(
            target: "altscreen::engine",
            "Captured native display {}x{} @ {}",
            native.width,
            native.height,
            native.density
        );
        main.native = Some(native);
        self.store.put_main(&main).map_err(TransitionError::Store)?;
        Ok((main, native))
    }

    fn env<'a>(&'a self, main: &MainDocument, native: &'a NativeDisplay) -> PlanEnv<'a> {
        PlanEnv {
            caps: &self.caps,
            native,
            safe_mode: main.safe_mode,
            keep_vendor_home: main.keep_vendor_home,
            timing: self.timing,
        }
    }

    fn saved_profile(&self, id: &str) -> Result<Profile, TransitionError> {
        self.store
            .saved(id)
            .map_err(TransitionError::Store)?
            .map(|p| p.settings)
            .ok_or_else(|| TransitionError::ProfileNotFound(id.to_string()))
    }

    fn check_blacklist(&self, target: &Profile, native: &NativeDisplay) -> Result<(), TransitionError> {
        match blacklist::check(target.resolution, target.density, native, self.caps.rejects_upscale) {
            Verdict::Accepted { smallest_width_dp } => {
                debug!(target: "altscreen::engine", "Accepted at {}dp", smallest_width_dp);
                Ok(())
            }
            Verdict::Blacklisted { smallest_width_dp, reason } => {
                warn!(
                    target: "altscreen::engine",
                    "Rejected {} / {}: {}",
                    target.resolution,
                    target.density,
                    reason
                );
                Err(TransitionError::Blacklisted {
                    resolution: target.resolution,
                    density: target.density,
                    smallest_width_dp,
                    reason,
                })
            }
        }
    }

    /// The stored snapshot while a session is active or its restores are
    /// still pending, a fresh capture otherwise.
    fn session_snapshot(&self, current: &CurrentState) -> (Snapshot, usize) {
        if (current.is_active() || !current.deferred.is_empty())
            && let Some(s) = &current.snapshot
        {
            return (s.clone(), 0);
        }
        let (snap, report) = snapshot::capture(&self.device, &self.caps);
        if !report.fallbacks.is_empty() {
            warn!(
                target: "altscreen::engine",
                "Snapshot used fallbacks for: {}",
                report.fallbacks.join(", ")
            );
        }
        (snap, report.fallbacks.len())
    }

    fn freeform_live(&self) -> Option<bool> {
        if !self.caps.freeform {
            return None;
        }
        match self.device.freeform_window_management() {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(target: "altscreen::engine", "Freeform state unknown: {:#}", e);
                None
            }
        }
    }

    /// Returns whether the fallback sink had to be used.
    fn dispatch(&mut self, batch: &CommandBatch) -> Result<bool, TransitionError> {
        if batch.is_empty() {
            return Ok(false);
        }
        match self.sinks.primary.dispatch(batch).map_err(TransitionError::Dispatch)? {
            SinkOutcome::Completed => Ok(false),
            SinkOutcome::NeedsFallback => {
                warn!(target: "altscreen::engine", "Privileged shell unavailable, using fallback");
                match self.sinks.fallback.dispatch(batch).map_err(TransitionError::Dispatch)? {
                    SinkOutcome::Completed => Ok(true),
                    SinkOutcome::NeedsFallback => Err(TransitionError::PermissionUnavailable),
                }
            }
        }
    }

    /// Helper queue and device actions. Failures here leave a setting
    /// unchanged and are only logged.
    fn dispatch_side_effects(&mut self, plan: &TransitionPlan) {
        if !plan.helper.is_empty()
            && let Err(e) = self.sinks.helper.dispatch(&plan.helper)
        {
            warn!(target: "altscreen::engine", "Helper dispatch failed: {:#}", e);
        }
        for action in &plan.actions {
            if let Err(e) = self.device.perform(action) {
                warn!(target: "altscreen::engine", "{:?} failed: {:#}", action, e);
            }
        }
    }

    fn prepare_load(&mut self, id: &str) -> Result<PreparedLoad, TransitionError> {
        let target = self.saved_profile(id)?;
        let (main, native) = self.main_document()?;
        self.check_blacklist(&target, &native)?;

        let current = self.store.current().map_err(TransitionError::Store)?;
        let (snapshot, fallbacks) = self.session_snapshot(&current);
        let freeform_live = self.freeform_live();
        let mut plan = plan::plan_load(&self.env(&main, &native), &current, &snapshot, &target, freeform_live);
        if !current.deferred.is_empty() {
            // Whatever the last full restart held back runs first, so the
            // plan starts from the state it assumed.
            debug!(target: "altscreen::engine", "Running {} pending commands first", current.deferred.len());
            plan.batch.commands.splice(0..0, current.deferred.iter().cloned());
        }
        Ok(PreparedLoad { plan, target, snapshot, fallbacks, current })
    }

    /// Apply saved profile `id`.
    pub fn load(&mut self, id: &str) -> Result<TransitionOutcome, TransitionError> {
        let PreparedLoad { plan, target, snapshot, fallbacks, current } = self.prepare_load(id)?;

        let used_fallback = self.dispatch(&plan.batch)?;
        self.dispatch_side_effects(&plan);

        let next = CurrentState {
            not_active: false,
            active_profile_id: Some(id.to_string()),
            reboot_required: current.reboot_required || plan.reboot_required,
            settings: target,
            snapshot: Some(snapshot),
            deferred: plan.deferred.clone(),
        };
        self.store.put_current(&next).map_err(TransitionError::Store)?;

        let mut outcome = TransitionOutcome::from_plan(&plan, Some(id.to_string()));
        outcome.used_fallback = used_fallback;
        outcome.snapshot_fallbacks = fallbacks;
        info!(target: "altscreen::engine", "Loaded {}: {}", id, outcome.summary());
        self.notify(ChangeEvent::Loaded(id.to_string()));
        Ok(outcome)
    }

    /// The batch [`Engine::load`] would dispatch, without running it.
    pub fn preview(&mut self, id: &str) -> Result<TransitionPlan, TransitionError> {
        self.prepare_load(id).map(|p| p.plan)
    }

    /// Revert everything the active profile changed.
    pub fn turn_off(&mut self) -> Result<TransitionOutcome, TransitionError> {
        let current = self.store.current().map_err(TransitionError::Store)?;
        if !current.is_active() {
            debug!(target: "altscreen::engine", "No active profile, nothing to revert");
            return Ok(TransitionOutcome::default());
        }

        let (main, native) = self.main_document()?;
        let freeform_live = self.freeform_live();
        let plan = plan::plan_revert(&self.env(&main, &native), &current, freeform_live);

        let used_fallback = self.dispatch(&plan.batch)?;
        self.dispatch_side_effects(&plan);

        let mut next = CurrentState::inactive();
        next.reboot_required = current.reboot_required || plan.reboot_required;
        next.deferred = plan.deferred.clone();
        if !next.deferred.is_empty() {
            next.snapshot = current.snapshot.clone();
        }
        self.store.put_current(&next).map_err(TransitionError::Store)?;

        let mut outcome = TransitionOutcome::from_plan(&plan, None);
        outcome.used_fallback = used_fallback;
        info!(target: "altscreen::engine", "Turned off: {}", outcome.summary());
        self.notify(ChangeEvent::TurnedOff);
        Ok(outcome)
    }

    /// Load `id`, or turn it off if it is the active profile. Decided from
    /// `Current`, not from what the caller last saw.
    pub fn toggle(&mut self, id: &str) -> Result<TransitionOutcome, TransitionError> {
        let current = self.store.current().map_err(TransitionError::Store)?;
        if current.is_active() && current.active_profile_id.as_deref() == Some(id) {
            self.turn_off()
        } else {
            self.load(id)
        }
    }

    /// Run boot-time commands and clear the pending reboot flag.
    pub fn reapply(&mut self) -> Result<TransitionOutcome, TransitionError> {
        let mut current = self.store.current().map_err(TransitionError::Store)?;
        let (main, native) = self.main_document()?;
        let commands = plan::plan_reapply(&self.env(&main, &native), &current);
        let batch = CommandBatch { commands, reboot_hint: false };

        let used_fallback = self.dispatch(&batch)?;

        if current.reboot_required || !current.deferred.is_empty() {
            current.reboot_required = false;
            current.deferred.clear();
            if !current.is_active() {
                current.snapshot = None;
            }
            self.store.put_current(&current).map_err(TransitionError::Store)?;
        }

        let outcome = TransitionOutcome {
            profile_id: current.active_profile_id.clone(),
            commands: batch.len(),
            used_fallback,
            ..Default::default()
        };
        if !batch.is_empty() {
            info!(target: "altscreen::engine", "Reapplied {} boot-time commands", batch.len());
            self.notify(ChangeEvent::Reapplied);
        }
        Ok(outcome)
    }

    /// Remove saved profile `id`, reverting the device first if it is active.
    pub fn delete(&mut self, id: &str) -> Result<(), TransitionError> {
        self.saved_profile(id)?;
        let current = self.store.current().map_err(TransitionError::Store)?;
        if current.is_active() && current.active_profile_id.as_deref() == Some(id) {
            self.turn_off()?;
        }
        self.store.remove_saved(id).map_err(TransitionError::Store)?;
        info!(target: "altscreen::engine", "Deleted profile {}", id);
        self.notify(ChangeEvent::ProfilesChanged);
        Ok(())
    }

    /// Start editing saved profile `id` in Scratch, or a blank one.
    pub fn begin_edit(&mut self, id: Option<&str>) -> Result<ScratchDocument> {
        self.store.begin_edit(id)
    }

    pub fn set_scratch_field(&mut self, key: &str, value: &str) -> Result<ScratchDocument> {
        self.store.set_scratch_field(key, value)
    }

    /// Save the profile being edited in Scratch.
    pub fn commit_scratch(&mut self, title: Option<&str>) -> Result<String> {
        let id = self.store.commit_scratch(title)?;
        self.notify(ChangeEvent::ProfilesChanged);
        Ok(id)
    }

    pub fn import<P: AsRef<Path>>(&mut self, path: P) -> Result<String> {
        let id = self.store.import(path)?;
        self.notify(ChangeEvent::ProfilesChanged);
        Ok(id)
    }

    /// Whether `selector` is active; [`ANY_PROFILE`] matches any profile.
    pub fn is_active(&self, selector: &str) -> Result<bool> {
        let current = self.store.current()?;
        if !current.is_active() {
            return Ok(false);
        }
        Ok(selector == ANY_PROFILE || current.active_profile_id.as_deref() == Some(selector))
    }

    pub fn list(&self) -> Result<Vec<ProfileEntry>> {
        let current = self.store.current()?;
        let active = current.active_profile_id.as_deref().filter(|_| current.is_active());
        Ok(self
            .store
            .list()?
            .into_iter()
            .map(|(id, p)| ProfileEntry {
                active: active == Some(id.as_str()),
                id,
                title: p.title,
            })
            .collect())
    }

    pub fn status(&self) -> Result<DaemonStatus> {
        let current = self.store.current()?;
        let profiles = self.store.list()?;
        let title = current.active_profile_id.as_deref().and_then(|id| {
            profiles
                .iter()
                .find(|(pid, _)| pid == id)
                .map(|(_, p)| p.title.clone())
        });
        Ok(DaemonStatus {
            active: current.is_active(),
            profile_id: current.active_profile_id.clone(),
            title,
            reboot_required: current.reboot_required,
            profiles: profiles.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::device::fake::FakeDevice;
    use crate::core::device::{DeviceAction, Namespace};
    use crate::core::profile::{Density, Resolution, RotationLock, SavedProfile, UiRefresh};
    use crate::core::sink::recording::{RecordingHelper, RecordingSink};
    use std::sync::Mutex;

    struct Harness {
        engine: Engine<FakeDevice>,
        primary: RecordingSink,
        fallback: RecordingSink,
        helper: RecordingHelper,
        events: Arc<Mutex<Vec<ChangeEvent>>>,
    }

    fn harness_with(device: FakeDevice, caps: PlatformCapabilities, primary: SinkOutcome) -> Harness {
        let primary = RecordingSink::new(primary);
        let fallback = RecordingSink::new(SinkOutcome::Completed);
        let helper = RecordingHelper::default();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink_events = events.clone();
        let engine = Engine::new(
            ProfileStore::in_memory(),
            device,
            caps,
            Sinks {
                primary: Box::new(primary.clone()),
                fallback: Box::new(fallback.clone()),
                helper: Box::new(helper.clone()),
            },
            TimingConfig::default(),
        )
        .with_notifier(Arc::new(move |e| sink_events.lock().unwrap().push(e)));
        Harness { engine, primary, fallback, helper, events }
    }

    fn harness() -> Harness {
        let mut dev = FakeDevice::phone();
        dev.set(Namespace::System, "user_rotation", "0");
        dev.set(Namespace::System, "accelerometer_rotation", "1");
        dev.set(Namespace::System, "haptic_feedback_enabled", "1");
        dev.set(Namespace::System, "screen_brightness", "200");
        dev.set(Namespace::System, "screen_brightness_mode", "1");
        harness_with(dev, PlatformCapabilities::for_api_level(28), SinkOutcome::Completed)
    }

    fn save(h: &mut Harness, id: &str, settings: Profile) {
        h.engine
            .store
            .put_saved(id, &SavedProfile { title: format!("Profile {}", id), settings })
            .unwrap();
    }

    fn desk() -> Profile {
        Profile {
            resolution: Resolution::Custom { width: 1920, height: 1080 },
            density: Density::Dpi(240),
            rotation_lock: RotationLock::Landscape,
            backlight_off: true,
            bluetooth_on: true,
            ..Default::default()
        }
    }

    fn all_lines(sink: &RecordingSink) -> Vec<String> {
        sink.taken()
            .into_iter()
            .flat_map(|b| b.commands.into_iter().map(|c| c.line))
            .collect()
    }

    #[test]
    fn test_load_persists_current_and_snapshot() {
        let mut h = harness();
        save(&mut h, "1", desk());
        let out = h.engine.load("1").unwrap();
        assert!(out.commands > 0);
        assert!(!out.used_fallback);

        let cur = h.engine.store.current().unwrap();
        assert!(cur.is_active());
        assert_eq!(cur.active_profile_id.as_deref(), Some("1"));
        assert_eq!(cur.settings, desk());
        let snap = cur.snapshot.unwrap();
        assert_eq!(snap.backlight_raw.as_deref(), Some("200"));
        assert_eq!(snap.auto_brightness_mode, 1);

        assert_eq!(h.engine.device().performed, vec![DeviceAction::SetBluetooth(true)]);
        assert_eq!(*h.events.lock().unwrap(), vec![ChangeEvent::Loaded("1".into())]);
        // Native display captured into Main.
        assert!(h.engine.store.main().unwrap().native.is_some());
    }

    #[test]
    fn test_reload_is_idempotent() {
        let mut h = harness();
        save(&mut h, "1", desk());
        h.engine.load("1").unwrap();
        let before = h.primary.taken().len();
        let out = h.engine.load("1").unwrap();
        assert_eq!(out.commands, 0);
        assert_eq!(h.primary.taken().len(), before);
    }

    #[test]
    fn test_switch_keeps_original_snapshot() {
        let mut h = harness();
        save(&mut h, "1", desk());
        save(&mut h, "2", Profile { density: Density::Dpi(320), ..Default::default() });
        h.engine.load("1").unwrap();
        let first = h.engine.store.current().unwrap().snapshot;

        // Live values drift while the profile is on.
        h.engine.device.set(Namespace::System, "screen_brightness", "0");
        h.engine.load("2").unwrap();
        assert_eq!(h.engine.store.current().unwrap().snapshot, first);
    }

    #[test]
    fn test_round_trip_restores_snapshot() {
        let mut h = harness();
        save(&mut h, "1", desk());
        h.engine.load("1").unwrap();
        h.engine.turn_off().unwrap();

        let cur = h.engine.store.current().unwrap();
        assert!(!cur.is_active());
        assert!(cur.snapshot.is_none());

        let revert = h.primary.taken().pop().unwrap();
        let lines: Vec<_> = revert.lines().collect();
        assert!(lines.contains(&"wm size reset"));
        assert!(lines.contains(&"wm density reset"));
        assert!(lines.contains(&"settings put system accelerometer_rotation 1"));
        assert!(lines.contains(&"settings put system user_rotation 0"));
        assert!(lines.contains(&"settings put system screen_brightness 200"));
        assert!(lines.contains(&"settings put system screen_brightness_mode 1"));
        assert_eq!(
            h.engine.device().performed,
            vec![DeviceAction::SetBluetooth(true), DeviceAction::SetBluetooth(false)]
        );
    }

    #[test]
    fn test_no_profile_active_after_turn_off() {
        let mut h = harness();
        save(&mut h, "1", desk());
        h.engine.load("1").unwrap();
        assert!(h.engine.is_active("1").unwrap());
        assert!(h.engine.is_active(ANY_PROFILE).unwrap());
        assert!(!h.engine.is_active("2").unwrap());

        h.engine.turn_off().unwrap();
        assert!(!h.engine.is_active("1").unwrap());
        assert!(!h.engine.is_active(ANY_PROFILE).unwrap());
    }

    #[test]
    fn test_blacklisted_load_touches_nothing() {
        let mut h = harness();
        save(
            &mut h,
            "tiny",
            Profile {
                resolution: Resolution::Custom { width: 640, height: 480 },
                density: Density::Dpi(320),
                ..Default::default()
            },
        );
        let err = h.engine.load("tiny").unwrap_err();
        assert!(matches!(err, TransitionError::Blacklisted { smallest_width_dp: 240, .. }));
        assert!(h.primary.taken().is_empty());
        assert!(!h.engine.store.current().unwrap().is_active());
        assert!(h.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_missing_profile() {
        let mut h = harness();
        assert!(matches!(h.engine.load("9"), Err(TransitionError::ProfileNotFound(_))));
        assert!(matches!(h.engine.delete("9"), Err(TransitionError::ProfileNotFound(_))));
    }

    #[test]
    fn test_fallback_sink_used_when_denied() {
        let mut h = harness_with(
            FakeDevice::phone(),
            PlatformCapabilities::for_api_level(28),
            SinkOutcome::NeedsFallback,
        );
        save(&mut h, "1", desk());
        let out = h.engine.load("1").unwrap();
        assert!(out.used_fallback);
        assert_eq!(h.fallback.taken().len(), 1);
        assert!(h.engine.store.current().unwrap().is_active());
    }

    #[test]
    fn test_permission_unavailable_keeps_current() {
        let mut h = harness_with(
            FakeDevice::phone(),
            PlatformCapabilities::for_api_level(28),
            SinkOutcome::NeedsFallback,
        );
        h.engine.sinks.fallback = Box::new(RecordingSink::new(SinkOutcome::NeedsFallback));
        save(&mut h, "1", desk());
        assert!(matches!(h.engine.load("1"), Err(TransitionError::PermissionUnavailable)));
        assert!(!h.engine.store.current().unwrap().is_active());
    }

    #[test]
    fn test_reboot_required_persisted_and_cleared() {
        let mut dev = FakeDevice::phone();
        dev.freeform_feature = false;
        let mut h = harness_with(dev, PlatformCapabilities::for_api_level(28), SinkOutcome::NeedsFallback);
        save(&mut h, "1", Profile { freeform: true, ..Default::default() });
        let out = h.engine.load("1").unwrap();
        assert!(out.reboot_required);
        assert!(out.used_fallback);
        assert!(h.engine.store.current().unwrap().reboot_required);
        assert!(h.engine.status().unwrap().reboot_required);

        h.engine.reapply().unwrap();
        assert!(!h.engine.store.current().unwrap().reboot_required);
    }

    #[test]
    fn test_full_restart_defers_boot_slots_to_reapply() {
        let mut h = harness();
        save(&mut h, "1", Profile { ui_refresh: UiRefresh::ActivityManager, ..desk() });
        let out = h.engine.load("1").unwrap();
        assert_eq!(out.strategy, UiRefreshStrategy::FullRestart);
        assert!(out.deferred > 0);
        assert!(!all_lines(&h.primary).iter().any(|l| l.contains("screen_brightness")));

        h.engine.reapply().unwrap();
        let last = h.primary.taken().pop().unwrap();
        assert!(last.lines().any(|l| l == "settings put system user_rotation 1"));
        assert!(last.lines().any(|l| l == "settings put system screen_brightness 0"));
        assert!(h.engine.store.current().unwrap().deferred.is_empty());
    }

    #[test]
    fn test_load_runs_pending_restores_and_keeps_baseline() {
        let mut h = harness();
        save(&mut h, "1", Profile { ui_refresh: UiRefresh::ActivityManager, vibration_off: true, ..Default::default() });
        save(&mut h, "2", Profile { density: Density::Dpi(320), ..Default::default() });
        h.engine.load("1").unwrap();
        h.engine.reapply().unwrap();
        h.engine.device.set(Namespace::System, "haptic_feedback_enabled", "0");

        h.engine.turn_off().unwrap();
        let pending = h.engine.store.current().unwrap();
        assert!(!pending.is_active());
        assert!(pending.deferred.iter().any(|c| c.line == "settings put system haptic_feedback_enabled 1"));

        h.engine.load("2").unwrap();
        let batch = h.primary.taken().pop().unwrap();
        let lines: Vec<_> = batch.lines().collect();
        let restore = lines
            .iter()
            .position(|l| *l == "settings put system haptic_feedback_enabled 1")
            .expect("pending restore dispatched");
        assert!(restore < lines.iter().position(|l| *l == "wm density 320").expect("density"));

        let cur = h.engine.store.current().unwrap();
        assert!(cur.deferred.is_empty());
        assert_eq!(cur.snapshot.unwrap().haptic_feedback_enabled, 1);
    }

    #[test]
    fn test_toggle_reads_current() {
        let mut h = harness();
        save(&mut h, "1", desk());
        h.engine.toggle("1").unwrap();
        assert!(h.engine.is_active("1").unwrap());
        h.engine.toggle("1").unwrap();
        assert!(!h.engine.is_active(ANY_PROFILE).unwrap());
    }

    #[test]
    fn test_delete_active_reverts_first() {
        let mut h = harness();
        save(&mut h, "1", desk());
        h.engine.load("1").unwrap();
        h.engine.delete("1").unwrap();
        assert!(!h.engine.is_active(ANY_PROFILE).unwrap());
        assert!(h.engine.list().unwrap().is_empty());
        assert_eq!(
            *h.events.lock().unwrap(),
            vec![ChangeEvent::Loaded("1".into()), ChangeEvent::TurnedOff, ChangeEvent::ProfilesChanged]
        );
    }

    #[test]
    fn test_preview_does_not_dispatch() {
        let mut h = harness();
        save(&mut h, "1", desk());
        let plan = h.engine.preview("1").unwrap();
        assert!(plan.batch.lines().any(|l| l == "wm size 1920x1080"));
        assert!(h.primary.taken().is_empty());
        assert!(!h.engine.store.current().unwrap().is_active());
    }

    #[test]
    fn test_helper_receives_secure_commands() {
        let mut caps = PlatformCapabilities::for_api_level(28);
        caps.secure_settings = false;
        let mut h = harness_with(FakeDevice::phone(), caps, SinkOutcome::Completed);
        save(&mut h, "1", Profile { show_touches: true, density: Density::Dpi(320), ..Default::default() });
        let out = h.engine.load("1").unwrap();
        assert_eq!(out.helper_commands, 1);
        assert_eq!(h.helper.commands.lock().unwrap()[0].line, "settings put system show_touches 1");
    }

    #[test]
    fn test_list_marks_active() {
        let mut h = harness();
        save(&mut h, "1", desk());
        save(&mut h, "2", Profile::default());
        h.engine.load("2").unwrap();
        let list = h.engine.list().unwrap();
        assert_eq!(list.len(), 2);
        assert!(!list[0].active);
        assert!(list[1].active);
        let status = h.engine.status().unwrap();
        assert_eq!(status.title.as_deref(), Some("Profile 2"));
        assert_eq!(status.profiles, 2);
    }
}
