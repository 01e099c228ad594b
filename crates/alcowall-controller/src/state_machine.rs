//! Kiosk workflow state machine.
//!
//! The workflow is a tagged [`KioskState`] plus a pure transition function,
//! [`step`], that maps `(state, event)` to the next state and a list of
//! [`Effect`]s. The function never touches the device, the queue or the
//! clock; callers feed it timestamps through the events and apply the
//! effects themselves. This keeps every timing rule testable without timers.
//!
//! # State Flow
//!
//! ```text
//! Idle ──(credit >= threshold)──> Measuring ──(concluded)──> Displaying
//!  ^                                  │                          │
//!  └──────(fault / elapsed limit)─────┘                          │
//!  └──────────────────(cooldown / fault)─────────────────────────┘
//! ```
//!
//! # Measuring Policy
//!
//! - Every [`KioskEvent::Sample`] raises the local maximum and records whether
//!   it just increased.
//! - Every [`KioskEvent::CountdownStep`] decrements the countdown. At zero the
//!   measurement concludes if the delta is within the allowed error or the
//!   maximum has stopped rising. Otherwise a settle deadline of
//!   `settle_grace` is armed; the first non-rising sample or the deadline
//!   itself concludes.
//! - A tick that sees an active fault, or any event arriving after
//!   `max_measuring`, aborts back to Idle. Aborts never record a measurement.
//!
//! # Examples
//!
//! ```
//! use alcowall_controller::{Effect, KioskEvent, KioskPhase, StateMachine, WorkflowPolicy};
//! use alcowall_core::{FaultFlags, StateSnapshot};
//! use tokio::time::Instant;
//!
//! let mut machine = StateMachine::new(WorkflowPolicy::default());
//! let snapshot = StateSnapshot {
//!     credit: 150,
//!     alcohol_level: 0.0,
//!     proximity_distance: 10,
//!     faults: FaultFlags::default(),
//! };
//!
//! let effects = machine.handle(KioskEvent::Tick { now: Instant::now(), snapshot });
//!
//! assert_eq!(machine.phase(), KioskPhase::Measuring);
//! assert_eq!(effects, vec![Effect::DebitCredit(100)]);
//! ```

use alcowall_core::config::WorkflowConfig;
use alcowall_core::{FaultFlags, StateSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Maximum number of transitions kept in history.
pub const MAX_HISTORY_SIZE: usize = 100;

/// Coarse workflow phase, without per-state data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KioskPhase {
    #[default]
    Idle,
    Measuring,
    Displaying,
}

impl fmt::Display for KioskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Measuring => write!(f, "Measuring"),
            Self::Displaying => write!(f, "Displaying"),
        }
    }
}

/// Trackers of an ongoing measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasuringState {
    /// Reading captured when the measurement started.
    pub baseline: f64,
    pub local_max: f64,
    /// Whether the last sample raised the local maximum.
    pub rising: bool,
    /// Countdown steps left.
    pub countdown: u32,
    pub started_at: Instant,
    /// Armed when the countdown ended while the maximum was still rising.
    pub settle_deadline: Option<Instant>,
}

impl MeasuringState {
    fn new(baseline: f64, countdown: u32, now: Instant) -> Self {
        Self {
            baseline,
            local_max: baseline,
            rising: false,
            countdown,
            started_at: now,
            settle_deadline: None,
        }
    }

    /// Current measurement result.
    pub fn delta(&self) -> f64 {
        self.local_max - self.baseline
    }
}

/// Result shown to the user.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayingState {
    pub level: f64,
    pub entered_at: Instant,
}

/// Workflow state with the data owned by each phase.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum KioskState {
    #[default]
    Idle,
    Measuring(MeasuringState),
    Displaying(DisplayingState),
}

impl KioskState {
    pub fn phase(&self) -> KioskPhase {
        match self {
            Self::Idle => KioskPhase::Idle,
            Self::Measuring(_) => KioskPhase::Measuring,
            Self::Displaying(_) => KioskPhase::Displaying,
        }
    }
}

/// Inputs of the state machine. Each carries the time it was observed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KioskEvent {
    /// Controller tick with a snapshot of the live device values.
    Tick { now: Instant, snapshot: StateSnapshot },
    /// Fast sampler reading of the alcohol sensor.
    Sample { now: Instant, level: f64 },
    /// One second of the measurement countdown elapsed.
    CountdownStep { now: Instant },
}

impl KioskEvent {
    pub fn now(&self) -> Instant {
        match self {
            Self::Tick { now, .. } | Self::Sample { now, .. } | Self::CountdownStep { now } => *now,
        }
    }
}

/// Why a cycle returned to Idle early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    HardwareFault(FaultFlags),
    ElapsedTimeExceeded,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HardwareFault(faults) => {
                write!(f, "hardware fault: {}", faults.describe().unwrap_or("unknown"))
            }
            Self::ElapsedTimeExceeded => write!(f, "measurement took too long"),
        }
    }
}

/// Work the caller must carry out after a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    /// Debit this many cents. Emitted once per Idle to Measuring transition.
    DebitCredit(i64),
    /// Persist a concluded measurement with this level.
    RecordMeasurement(f64),
    /// A new result is on screen; display content may be fetched.
    EnteredDisplaying,
    /// The cycle was cut short and nothing was recorded for it.
    Aborted(AbortReason),
    /// The display cooldown expired.
    ReturnedIdle,
}

/// Thresholds and timings of the workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowPolicy {
    pub credit_threshold: i64,
    pub countdown_secs: u32,
    pub allowed_error: f64,
    pub max_measuring: Duration,
    pub display_cooldown: Duration,
    pub settle_grace: Duration,
}

impl Default for WorkflowPolicy {
    fn default() -> Self {
        Self::from(&WorkflowConfig::default())
    }
}

impl From<&WorkflowConfig> for WorkflowPolicy {
    fn from(config: &WorkflowConfig) -> Self {
        Self {
            credit_threshold: config.credit_threshold,
            countdown_secs: config.countdown_secs,
            allowed_error: config.allowed_error,
            max_measuring: Duration::from_secs(config.max_measuring_secs),
            display_cooldown: Duration::from_secs(config.display_cooldown_secs),
            settle_grace: Duration::from_millis(config.settle_grace_ms),
        }
    }
}

impl WorkflowPolicy {
    pub fn credit_threshold(mut self, cents: i64) -> Self {
        self.credit_threshold = cents;
        self
    }

    pub fn countdown_secs(mut self, secs: u32) -> Self {
        self.countdown_secs = secs;
        self
    }

    pub fn allowed_error(mut self, error: f64) -> Self {
        self.allowed_error = error;
        self
    }

    pub fn max_measuring(mut self, limit: Duration) -> Self {
        self.max_measuring = limit;
        self
    }

    pub fn display_cooldown(mut self, cooldown: Duration) -> Self {
        self.display_cooldown = cooldown;
        self
    }

    pub fn settle_grace(mut self, grace: Duration) -> Self {
        self.settle_grace = grace;
        self
    }
}

/// Compute the successor of `state` for `event`.
///
/// Events that do not apply to the current phase (a sample while Idle, a
/// countdown step while Displaying) leave the state unchanged.
pub fn step(state: KioskState, event: KioskEvent, policy: &WorkflowPolicy) -> (KioskState, Vec<Effect>) {
    match state {
        KioskState::Idle => step_idle(event, policy),
        KioskState::Measuring(measuring) => step_measuring(measuring, event, policy),
        KioskState::Displaying(displaying) => step_displaying(displaying, event, policy),
    }
}

fn step_idle(event: KioskEvent, policy: &WorkflowPolicy) -> (KioskState, Vec<Effect>) {
    let KioskEvent::Tick { now, snapshot } = event else {
        return (KioskState::Idle, Vec::new());
    };

    if snapshot.faults.any() || snapshot.credit < policy.credit_threshold {
        return (KioskState::Idle, Vec::new());
    }

    // An unread sensor reports -1; start from zero instead.
    let baseline = snapshot.alcohol_level.max(0.0);
    (
        KioskState::Measuring(MeasuringState::new(baseline, policy.countdown_secs, now)),
        vec![Effect::DebitCredit(policy.credit_threshold)],
    )
}

fn step_measuring(
    mut measuring: MeasuringState,
    event: KioskEvent,
    policy: &WorkflowPolicy,
) -> (KioskState, Vec<Effect>) {
    let now = event.now();

    if let KioskEvent::Tick { snapshot, .. } = event
        && snapshot.faults.any()
    {
        return abort(AbortReason::HardwareFault(snapshot.faults));
    }
    if now.saturating_duration_since(measuring.started_at) >= policy.max_measuring {
        return abort(AbortReason::ElapsedTimeExceeded);
    }

    match event {
        KioskEvent::Tick { .. } => {}
        KioskEvent::Sample { level, .. } => {
            if level.is_finite() && level >= 0.0 {
                measuring.rising = level > measuring.local_max;
                if measuring.rising {
                    measuring.local_max = level;
                }
            }
            if measuring.settle_deadline.is_some() && !measuring.rising {
                return conclude(measuring, now);
            }
        }
        KioskEvent::CountdownStep { .. } => {
            if measuring.settle_deadline.is_none() {
                measuring.countdown = measuring.countdown.saturating_sub(1);
                if measuring.countdown == 0 {
                    if measuring.delta() <= policy.allowed_error || !measuring.rising {
                        return conclude(measuring, now);
                    }
                    measuring.settle_deadline = Some(now + policy.settle_grace);
                }
            }
        }
    }

    if let Some(deadline) = measuring.settle_deadline
        && now >= deadline
    {
        return conclude(measuring, now);
    }

    (KioskState::Measuring(measuring), Vec::new())
}

fn step_displaying(
    displaying: DisplayingState,
    event: KioskEvent,
    policy: &WorkflowPolicy,
) -> (KioskState, Vec<Effect>) {
    let KioskEvent::Tick { now, snapshot } = event else {
        return (KioskState::Displaying(displaying), Vec::new());
    };

    if snapshot.faults.any() {
        return abort(AbortReason::HardwareFault(snapshot.faults));
    }
    if now.saturating_duration_since(displaying.entered_at) >= policy.display_cooldown {
        return (KioskState::Idle, vec![Effect::ReturnedIdle]);
    }
    (KioskState::Displaying(displaying), Vec::new())
}

fn conclude(measuring: MeasuringState, now: Instant) -> (KioskState, Vec<Effect>) {
    let level = measuring.delta();
    (
        KioskState::Displaying(DisplayingState {
            level,
            entered_at: now,
        }),
        vec![Effect::RecordMeasurement(level), Effect::EnteredDisplaying],
    )
}

fn abort(reason: AbortReason) -> (KioskState, Vec<Effect>) {
    (KioskState::Idle, vec![Effect::Aborted(reason)])
}

/// A phase change recorded in the machine's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: KioskPhase,
    pub to: KioskPhase,
    pub at: Instant,
}

impl StateTransition {
    pub fn new(from: KioskPhase, to: KioskPhase, at: Instant) -> Self {
        Self { from, to, at }
    }
}

/// Holds the current [`KioskState`] and a bounded transition history.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: KioskState,
    policy: WorkflowPolicy,
    history: VecDeque<StateTransition>,
}

impl StateMachine {
    /// Create a machine in Idle.
    pub fn new(policy: WorkflowPolicy) -> Self {
        Self::builder().with_policy(policy).build()
    }

    pub fn builder() -> StateMachineBuilder {
        StateMachineBuilder::default()
    }

    pub fn state(&self) -> &KioskState {
        &self.state
    }

    pub fn phase(&self) -> KioskPhase {
        self.state.phase()
    }

    pub fn policy(&self) -> &WorkflowPolicy {
        &self.policy
    }

    /// Countdown steps left, while Measuring.
    pub fn countdown(&self) -> Option<u32> {
        match &self.state {
            KioskState::Measuring(measuring) => Some(measuring.countdown),
            _ => None,
        }
    }

    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// The `n` most recent transitions, newest first.
    pub fn last_transitions(&self, n: usize) -> Vec<&StateTransition> {
        self.history.iter().rev().take(n).collect()
    }

    /// Feed one event and return the effects to apply.
    pub fn handle(&mut self, event: KioskEvent) -> Vec<Effect> {
        let (next, effects) = step(self.state, event, &self.policy);
        self.perform_state_change(next, event.now());
        effects
    }

    /// Force the machine back to Idle.
    pub fn reset(&mut self, now: Instant) {
        self.perform_state_change(KioskState::Idle, now);
    }

    fn perform_state_change(&mut self, next: KioskState, now: Instant) {
        let from = self.state.phase();
        self.state = next;
        if from != next.phase() {
            self.add_to_history(StateTransition::new(from, next.phase(), now));
        }
    }

    fn add_to_history(&mut self, transition: StateTransition) {
        self.history.push_back(transition);
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new(WorkflowPolicy::default())
    }
}

/// Builder for [`StateMachine`], mainly for restoring a machine mid-cycle.
#[derive(Debug, Default)]
pub struct StateMachineBuilder {
    policy: WorkflowPolicy,
    initial_state: KioskState,
    history: VecDeque<StateTransition>,
}

impl StateMachineBuilder {
    pub fn with_policy(mut self, policy: WorkflowPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_initial_state(mut self, state: KioskState) -> Self {
        self.initial_state = state;
        self
    }

    pub fn with_history(mut self, history: VecDeque<StateTransition>) -> Self {
        self.history = history;
        self
    }

    pub fn build(self) -> StateMachine {
        StateMachine {
            state: self.initial_state,
            policy: self.policy,
            history: self.history,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn snapshot(credit: i64, alcohol_level: f64) -> StateSnapshot {
        StateSnapshot {
            credit,
            alcohol_level,
            proximity_distance: 10,
            faults: FaultFlags::default(),
        }
    }

    fn door_open() -> StateSnapshot {
        StateSnapshot {
            faults: FaultFlags {
                service_door_open: true,
                ..FaultFlags::default()
            },
            ..snapshot(0, 0.0)
        }
    }

    fn policy() -> WorkflowPolicy {
        WorkflowPolicy::default().countdown_secs(3)
    }

    fn measuring_at(start: Instant) -> StateMachine {
        let mut machine = StateMachine::new(policy());
        machine.handle(KioskEvent::Tick {
            now: start,
            snapshot: snapshot(150, 0.0),
        });
        machine
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_new_machine_starts_idle() {
        let machine = StateMachine::default();
        assert_eq!(machine.phase(), KioskPhase::Idle);
        assert!(machine.history().is_empty());
        assert_eq!(machine.countdown(), None);
    }

    #[test]
    fn test_credit_reaching_threshold_starts_measuring() {
        let start = Instant::now();
        let mut machine = StateMachine::new(policy());

        let effects = machine.handle(KioskEvent::Tick {
            now: start,
            snapshot: snapshot(150, 0.02),
        });

        assert_eq!(effects, vec![Effect::DebitCredit(100)]);
        let KioskState::Measuring(measuring) = *machine.state() else {
            panic!("expected Measuring, got {:?}", machine.state());
        };
        assert_eq!(measuring.baseline, 0.02);
        assert_eq!(measuring.local_max, 0.02);
        assert_eq!(measuring.countdown, 3);
        assert_eq!(measuring.started_at, start);
    }

    #[rstest]
    #[case::below_threshold(snapshot(99, 0.0))]
    #[case::fault_active(StateSnapshot { credit: 500, ..door_open() })]
    fn test_idle_stays_idle(#[case] snapshot: StateSnapshot) {
        let mut machine = StateMachine::new(policy());
        let effects = machine.handle(KioskEvent::Tick {
            now: Instant::now(),
            snapshot,
        });

        assert!(effects.is_empty());
        assert_eq!(machine.phase(), KioskPhase::Idle);
    }

    #[test]
    fn test_unread_sensor_baseline_is_zero() {
        let mut machine = StateMachine::new(policy());
        machine.handle(KioskEvent::Tick {
            now: Instant::now(),
            snapshot: snapshot(100, -1.0),
        });

        let KioskState::Measuring(measuring) = *machine.state() else {
            panic!("expected Measuring");
        };
        assert_eq!(measuring.baseline, 0.0);
    }

    #[rstest]
    #[case::sample(KioskEvent::Sample { now: Instant::now(), level: 0.5 })]
    #[case::countdown(KioskEvent::CountdownStep { now: Instant::now() })]
    fn test_idle_ignores_measuring_events(#[case] event: KioskEvent) {
        let mut machine = StateMachine::new(policy());
        assert!(machine.handle(event).is_empty());
        assert_eq!(machine.phase(), KioskPhase::Idle);
    }

    #[test]
    fn test_small_delta_concludes_at_countdown_end() {
        let start = Instant::now();
        let mut machine = measuring_at(start);

        machine.handle(KioskEvent::Sample {
            now: start + Duration::from_millis(300),
            level: 0.05,
        });
        machine.handle(KioskEvent::CountdownStep { now: start + secs(1) });
        machine.handle(KioskEvent::CountdownStep { now: start + secs(2) });
        assert_eq!(machine.countdown(), Some(1));

        let effects = machine.handle(KioskEvent::CountdownStep { now: start + secs(3) });

        assert_eq!(
            effects,
            vec![Effect::RecordMeasurement(0.05), Effect::EnteredDisplaying]
        );
        assert!(matches!(
            machine.state(),
            KioskState::Displaying(DisplayingState { level, .. }) if *level == 0.05
        ));
    }

    #[test]
    fn test_large_delta_with_stable_maximum_concludes() {
        let start = Instant::now();
        let mut machine = measuring_at(start);

        machine.handle(KioskEvent::Sample { now: start + secs(1), level: 0.8 });
        machine.handle(KioskEvent::Sample { now: start + secs(2), level: 0.7 });
        machine.handle(KioskEvent::CountdownStep { now: start + secs(1) });
        machine.handle(KioskEvent::CountdownStep { now: start + secs(2) });
        let effects = machine.handle(KioskEvent::CountdownStep { now: start + secs(3) });

        assert_eq!(effects[0], Effect::RecordMeasurement(0.8));
        assert_eq!(machine.phase(), KioskPhase::Displaying);
    }

    #[test]
    fn test_rising_maximum_settles_on_first_flat_sample() {
        let start = Instant::now();
        let mut machine = measuring_at(start);

        for n in 1..=3 {
            machine.handle(KioskEvent::Sample {
                now: start + secs(n),
                level: 0.3 * n as f64,
            });
            machine.handle(KioskEvent::CountdownStep { now: start + secs(n) });
        }

        let KioskState::Measuring(measuring) = *machine.state() else {
            panic!("expected settling measurement");
        };
        assert_eq!(measuring.countdown, 0);
        assert_eq!(
            measuring.settle_deadline,
            Some(start + secs(3) + Duration::from_secs(1))
        );

        // Countdown steps no longer apply while settling.
        assert!(machine.handle(KioskEvent::CountdownStep {
            now: start + Duration::from_millis(3100)
        })
        .is_empty());

        let effects = machine.handle(KioskEvent::Sample {
            now: start + Duration::from_millis(3300),
            level: 0.5,
        });
        assert!(matches!(effects[0], Effect::RecordMeasurement(level) if (level - 0.9).abs() < 1e-9));
    }

    #[test]
    fn test_settle_deadline_forces_conclusion() {
        let start = Instant::now();
        let mut machine = measuring_at(start);

        machine.handle(KioskEvent::CountdownStep { now: start + secs(1) });
        machine.handle(KioskEvent::CountdownStep { now: start + secs(2) });
        machine.handle(KioskEvent::Sample { now: start + secs(3), level: 1.0 });
        machine.handle(KioskEvent::CountdownStep { now: start + secs(3) });
        assert_eq!(machine.phase(), KioskPhase::Measuring);

        let effects = machine.handle(KioskEvent::Tick {
            now: start + secs(4),
            snapshot: snapshot(0, 1.0),
        });
        assert_eq!(effects[0], Effect::RecordMeasurement(1.0));
    }

    #[test]
    fn test_fault_aborts_measuring() {
        let start = Instant::now();
        let mut machine = measuring_at(start);
        machine.handle(KioskEvent::Sample { now: start + secs(1), level: 0.4 });

        let effects = machine.handle(KioskEvent::Tick {
            now: start + secs(1),
            snapshot: door_open(),
        });

        assert_eq!(
            effects,
            vec![Effect::Aborted(AbortReason::HardwareFault(door_open().faults))]
        );
        assert_eq!(machine.phase(), KioskPhase::Idle);
    }

    #[test]
    fn test_elapsed_limit_aborts_measuring() {
        let start = Instant::now();
        let mut machine = StateMachine::new(
            policy()
                .countdown_secs(500)
                .max_measuring(Duration::from_secs(100)),
        );
        machine.handle(KioskEvent::Tick {
            now: start,
            snapshot: snapshot(100, 0.0),
        });

        for n in 1..100 {
            assert!(machine.handle(KioskEvent::CountdownStep { now: start + secs(n) }).is_empty());
        }
        let effects = machine.handle(KioskEvent::CountdownStep { now: start + secs(100) });

        assert_eq!(effects, vec![Effect::Aborted(AbortReason::ElapsedTimeExceeded)]);
        assert_eq!(machine.phase(), KioskPhase::Idle);
    }

    #[rstest]
    #[case::before_cooldown(9, KioskPhase::Displaying)]
    #[case::at_cooldown(10, KioskPhase::Idle)]
    fn test_displaying_cooldown(#[case] after: u64, #[case] expected: KioskPhase) {
        let start = Instant::now();
        let mut machine = StateMachine::builder()
            .with_policy(policy())
            .with_initial_state(KioskState::Displaying(DisplayingState {
                level: 0.2,
                entered_at: start,
            }))
            .build();

        machine.handle(KioskEvent::Tick {
            now: start + secs(after),
            snapshot: snapshot(500, 0.0),
        });

        assert_eq!(machine.phase(), expected);
    }

    #[test]
    fn test_fault_while_displaying_returns_idle() {
        let start = Instant::now();
        let mut machine = StateMachine::builder()
            .with_initial_state(KioskState::Displaying(DisplayingState {
                level: 0.2,
                entered_at: start,
            }))
            .build();

        let effects = machine.handle(KioskEvent::Tick {
            now: start + secs(1),
            snapshot: door_open(),
        });

        assert!(matches!(effects[..], [Effect::Aborted(AbortReason::HardwareFault(_))]));
        assert_eq!(machine.phase(), KioskPhase::Idle);
    }

    #[test]
    fn test_transition_history_is_recorded() {
        let start = Instant::now();
        let mut machine = measuring_at(start);
        machine.handle(KioskEvent::Sample { now: start, level: 0.0 });
        machine.reset(start + secs(1));

        let history = machine.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].from, KioskPhase::Idle);
        assert_eq!(history[0].to, KioskPhase::Measuring);
        assert_eq!(history[1].to, KioskPhase::Idle);
        assert_eq!(machine.last_transitions(1)[0].at, start + secs(1));
    }

    #[test]
    fn test_history_size_limit() {
        let start = Instant::now();
        let mut machine = StateMachine::new(policy());

        for n in 0..(MAX_HISTORY_SIZE as u64) {
            machine.handle(KioskEvent::Tick {
                now: start + secs(n),
                snapshot: snapshot(100, 0.0),
            });
            machine.reset(start + secs(n));
        }

        assert_eq!(machine.history().len(), MAX_HISTORY_SIZE);
        assert_eq!(machine.history()[0].from, KioskPhase::Idle);
    }

    #[test]
    fn test_policy_from_config() {
        let config = WorkflowConfig {
            countdown_secs: 3,
            settle_grace_ms: 250,
            ..WorkflowConfig::default()
        };
        let policy = WorkflowPolicy::from(&config);

        assert_eq!(policy.countdown_secs, 3);
        assert_eq!(policy.settle_grace, Duration::from_millis(250));
        assert_eq!(policy.max_measuring, Duration::from_secs(100));
        assert_eq!(policy.display_cooldown, Duration::from_secs(10));
    }

    #[test]
    fn test_phase_display_formatting() {
        assert_eq!(KioskPhase::Idle.to_string(), "Idle");
        assert_eq!(KioskPhase::Displaying.to_string(), "Displaying");
        assert_eq!(
            AbortReason::HardwareFault(door_open().faults).to_string(),
            "hardware fault: service door open"
        );
    }
}
