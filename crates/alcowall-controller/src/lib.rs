//! Workflow controller for the AlcoWall kiosk.
//!
//! - [`state_machine`] - the pure Idle / Measuring / Displaying state machine
//! - [`controller`] - the event loop that feeds it timer and sensor events and
//!   applies its effects
//! - [`worker`] - background jobs for queue flushes, highscores and display
//!   content
//! - [`presentation`] - the screen snapshot published to renderers

pub mod controller;
pub mod presentation;
pub mod state_machine;
pub mod worker;

pub use controller::{ControllerTimings, KioskStores, RunSummary, WorkflowController};
pub use presentation::{COME_CLOSER_HINT, Presentation, PresentationPublisher, proximity_hint};
pub use state_machine::{
    AbortReason, DisplayingState, Effect, KioskEvent, KioskPhase, KioskState, MeasuringState,
    StateMachine, StateMachineBuilder, StateTransition, WorkflowPolicy, step,
};
pub use worker::{WorkerMessage, WorkerPool};
