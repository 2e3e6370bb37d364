//! Pure transition planning: change set, slot rules and refresh strategy
//! folded into the exact batch a transition dispatches.

use crate::core::commands::rules::{BuildContext, requested_freeform};
use crate::core::commands::{BOOT_ORDER, Command, CommandBatch, STANDARD_ORDER, Slot};
use crate::core::config::TimingConfig;
use crate::core::device::DeviceAction;
use crate::core::diff::{self, ChangeSet, Toggle};
use crate::core::display::NativeDisplay;
use crate::core::platform::PlatformCapabilities;
use crate::core::profile::{Profile, UiRefresh};
use crate::core::refresh::UiRefreshStrategy;
use crate::core::state::{CurrentState, Snapshot};

/// Everything about the device a plan depends on besides the two states.
#[derive(Debug, Clone)]
pub struct PlanEnv<'a> {
    pub caps: &'a PlatformCapabilities,
    pub native: &'a NativeDisplay,
    pub safe_mode: bool,
    pub keep_vendor_home: bool,
    pub timing: TimingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionPlan {
    pub changes: ChangeSet,
    /// Commands for the primary sink, in execution order.
    pub batch: CommandBatch,
    /// Commands routed to the privileged helper.
    pub helper: Vec<Command>,
    /// Commands held back until the framework has restarted.
    pub deferred: Vec<Command>,
    pub actions: Vec<DeviceAction>,
    pub strategy: UiRefreshStrategy,
    pub reboot_required: bool,
}

impl TransitionPlan {
    pub fn is_noop(&self) -> bool {
        self.batch.is_empty() && self.helper.is_empty() && self.deferred.is_empty() && self.actions.is_empty()
    }
}

struct Request<'a> {
    changes: ChangeSet,
    previous: &'a Profile,
    snapshot: &'a Snapshot,
    ui_refresh: UiRefresh,
    /// Size and density values re-asserted under a full restart.
    force_target: &'a Profile,
    freeform_live: Option<bool>,
    /// False only for a reload of the profile that is already applied.
    engaged: bool,
}

/// Plan a Load of `target` on top of `current`.
///
/// `snapshot` is the session snapshot: the one stored in `current` when a
/// profile is active, a fresh capture otherwise. `freeform_live` is the live
/// freeform window-management state, `None` when unknown.
pub fn plan_load(
    env: &PlanEnv<'_>,
    current: &CurrentState,
    snapshot: &Snapshot,
    target: &Profile,
    freeform_live: Option<bool>,
) -> TransitionPlan {
    build(
        env,
        Request {
            changes: diff::compute(current, target),
            previous: &current.settings,
            snapshot,
            ui_refresh: target.ui_refresh,
            force_target: target,
            freeform_live,
            engaged: !current.is_active() || current.settings != *target,
        },
    )
}

/// Plan the revert of whatever `current` applied.
pub fn plan_revert(env: &PlanEnv<'_>, current: &CurrentState, freeform_live: Option<bool>) -> TransitionPlan {
    if !current.is_active() {
        return TransitionPlan::default();
    }
    let fallback = Snapshot::default();
    let snapshot = current.snapshot.as_ref().unwrap_or(&fallback);
    let unmanaged = Profile::default();
    build(
        env,
        Request {
            changes: diff::compute_revert(current),
            previous: &current.settings,
            snapshot,
            ui_refresh: current.settings.ui_refresh,
            force_target: &unmanaged,
            freeform_live,
            engaged: true,
        },
    )
}

/// Commands to run once the device has booted.
///
/// Uses what a full restart deferred when there is any; otherwise rebuilds
/// the boot-time slots of the active profile as on a first activation.
pub fn plan_reapply(env: &PlanEnv<'_>, current: &CurrentState) -> Vec<Command> {
    if !current.deferred.is_empty() {
        return current.deferred.clone();
    }
    if !current.is_active() {
        return Vec::new();
    }
    let fallback = Snapshot::default();
    let snapshot = current.snapshot.as_ref().unwrap_or(&fallback);
    let unmanaged = Profile::default();
    let changes = diff::compute(&CurrentState::inactive(), &current.settings);
    let ctx = context(env, &changes, &unmanaged, snapshot, UiRefreshStrategy::None);
    BOOT_ORDER.iter().flat_map(|slot| (slot.rule())(&ctx)).collect()
}

fn context<'a>(
    env: &PlanEnv<'a>,
    changes: &'a ChangeSet,
    previous: &'a Profile,
    snapshot: &'a Snapshot,
    strategy: UiRefreshStrategy,
) -> BuildContext<'a> {
    BuildContext {
        changes,
        previous,
        snapshot,
        caps: env.caps,
        native: env.native,
        safe_mode: env.safe_mode,
        keep_vendor_home: env.keep_vendor_home,
        strategy,
        timing: env.timing,
    }
}

/// Whether any non-refresh slot has something to do.
fn armed(env: &PlanEnv<'_>, changes: &ChangeSet, previous: &Profile, snapshot: &Snapshot) -> bool {
    let ctx = context(env, changes, previous, snapshot, UiRefreshStrategy::None);
    STANDARD_ORDER
        .iter()
        .filter(|slot| !slot.is_refresh())
        .any(|slot| !(slot.rule())(&ctx).is_empty())
}

fn reboot_required(env: &PlanEnv<'_>, req: &Request<'_>) -> bool {
    let freeform_mismatch = env.caps.freeform
        && match (requested_freeform(&req.changes, req.snapshot), req.freeform_live) {
            (Some(wanted), Some(live)) => wanted != live,
            _ => false,
        };
    let resized_under_restart =
        req.changes.touches_size_or_density() && req.ui_refresh == UiRefresh::ActivityManager;
    freeform_mismatch || resized_under_restart
}

fn actions(changes: &ChangeSet, snapshot: &Snapshot) -> Vec<DeviceAction> {
    let mut out = Vec::new();
    match changes.wifi {
        Some(Toggle::Enable) => out.push(DeviceAction::SetWifi(true)),
        Some(Toggle::Restore) => out.push(DeviceAction::SetWifi(snapshot.wifi_on)),
        None => {}
    }
    match changes.bluetooth {
        Some(Toggle::Enable) => out.push(DeviceAction::SetBluetooth(true)),
        Some(Toggle::Restore) => out.push(DeviceAction::SetBluetooth(snapshot.bluetooth_on)),
        None => {}
    }
    match changes.taskbar {
        Some(Toggle::Enable) => out.push(DeviceAction::SetTaskbar(true)),
        Some(Toggle::Restore) => out.push(DeviceAction::SetTaskbar(false)),
        None => {}
    }
    if changes.clear_home == Some(Toggle::Enable) {
        out.push(DeviceAction::ClearHomeDefault);
    }
    out
}

fn build(env: &PlanEnv<'_>, req: Request<'_>) -> TransitionPlan {
    let reboot_required = reboot_required(env, &req);
    let strategy = UiRefreshStrategy::select(env.caps, reboot_required, req.ui_refresh);

    let mut changes = req.changes;
    if strategy == UiRefreshStrategy::FullRestart && req.engaged {
        diff::force_size_and_density(&mut changes, req.force_target);
    }
    let is_armed = req.engaged && armed(env, &changes, req.previous, req.snapshot);

    let ctx = context(env, &changes, req.previous, req.snapshot, strategy);
    let mut batch = CommandBatch { commands: Vec::new(), reboot_hint: reboot_required };
    let mut helper = Vec::new();

    for slot in strategy.order() {
        if slot.is_refresh() && !is_armed {
            continue;
        }
        let cmds = (slot.rule())(&ctx);
        if routes_to_helper(*slot, env.caps) {
            helper.extend(cmds);
        } else {
            batch.commands.extend(cmds);
        }
    }

    let deferred = strategy
        .deferred_order()
        .iter()
        .flat_map(|slot| (slot.rule())(&ctx))
        .collect();

    TransitionPlan {
        actions: actions(&changes, req.snapshot),
        changes,
        batch,
        helper,
        deferred,
        strategy,
        reboot_required,
    }
}

fn routes_to_helper(slot: Slot, caps: &PlatformCapabilities) -> bool {
    slot.needs_secure_settings() && !caps.secure_settings
}
