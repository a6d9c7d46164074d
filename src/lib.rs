//! Stepwise - sequential async step coordinator
//!
//! [`sequential_run`] resolves a list of [`Step`]s one at a time, in order,
//! and yields every result or the first failure. Later steps never start
//! once a step has failed.
//!
//! Around the coordinator:
//! - [`Contained`]: wrap a fallible callable so it never fails
//! - [`delay`]: pacing step that resolves after a fixed time
//! - [`Plan`] + [`Runner`]: YAML plans of values, pauses and shell commands

pub mod config;
pub mod contain;
pub mod coordinator;
pub mod delay;
pub mod error;
pub mod event_log;
pub mod plan;
pub mod runner;
pub mod step;

pub use config::RunnerConfig;
pub use contain::Contained;
pub use coordinator::sequential_run;
pub use delay::{delay, pause};
pub use error::{FixSuggestion, RunError, StepwiseError};
pub use event_log::{Event, EventKind, EventLog};
pub use plan::{Plan, PlanStep, StepAction, PLAN_SCHEMA};
pub use runner::{PlanOutcome, Runner, StepOutput};
pub use step::{Deferred, Resolution, Step};
