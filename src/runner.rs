//! Plan runner
//!
//! Turns each plan step into a coordinator [`Step`] and hands the whole list
//! to [`sequential_run`]. The coordinator stays silent; the runner is the
//! caller that logs, records events and maps failures back to step ids.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::config::RunnerConfig;
use crate::contain::Contained;
use crate::coordinator::sequential_run;
use crate::delay::pause;
use crate::error::{RunError, StepwiseError};
use crate::event_log::{EventKind, EventLog};
use crate::plan::{Plan, PlanStep, StepAction};
use crate::step::Step;

/// Output of one plan step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutput {
    pub id: String,
    pub output: Value,
}

/// Successful plan run: one output per step, in plan order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanOutcome {
    pub outputs: Vec<StepOutput>,
    pub duration_ms: u64,
}

impl PlanOutcome {
    pub fn get(&self, step_id: &str) -> Option<&Value> {
        self.outputs
            .iter()
            .find(|o| o.id == step_id)
            .map(|o| &o.output)
    }

    /// Outputs alone, in plan order
    pub fn values(&self) -> Vec<&Value> {
        self.outputs.iter().map(|o| &o.output).collect()
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

/// Runs plans through the sequential coordinator
pub struct Runner {
    config: RunnerConfig,
    event_log: EventLog,
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            event_log: EventLog::new(),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Events of the most recent run, for inspection/export
    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    #[instrument(skip_all, fields(steps = plan.steps.len()))]
    pub async fn run(&self, plan: &Plan) -> Result<PlanOutcome, StepwiseError> {
        self.event_log.begin_run();
        plan.validate()?;

        let start = Instant::now();
        self.event_log.emit(EventKind::RunStarted {
            step_count: plan.steps.len(),
        });
        info!("Running plan");

        let steps = plan
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| self.make_step(index, step));

        match sequential_run(steps).await {
            Ok(values) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                self.event_log.emit(EventKind::RunCompleted {
                    result_count: values.len(),
                    total_duration_ms: duration_ms,
                });
                info!(duration_ms, "Plan completed");

                let outputs = plan
                    .steps
                    .iter()
                    .zip(values)
                    .map(|(step, output)| StepOutput {
                        id: step.id.clone(),
                        output,
                    })
                    .collect();
                Ok(PlanOutcome {
                    outputs,
                    duration_ms,
                })
            }
            Err(failure) => {
                let failed_step: Arc<str> = plan
                    .steps
                    .get(failure.index())
                    .map(|s| Arc::from(s.id.as_str()))
                    .unwrap_or_else(|| Arc::from("?"));
                let err = step_error(&failed_step, failure);

                self.event_log.emit(EventKind::RunFailed {
                    error: err.to_string(),
                    failed_step: Some(Arc::clone(&failed_step)),
                });
                warn!(step_id = %failed_step, error = %err, "Plan failed");
                Err(err)
            }
        }
    }

    fn make_step(&self, index: usize, step: &PlanStep) -> Step<Value, StepwiseError> {
        let tracker = StepTracker {
            step_id: Arc::from(step.id.as_str()),
            index,
            event_log: self.event_log.clone(),
        };

        match (&step.action, step.contain) {
            // literals cannot fail, containment is irrelevant
            (StepAction::Value { value }, _) => {
                let value = value.clone();
                Step::immediate(move || {
                    let start = tracker.start();
                    tracker.settle(Ok(value), start)
                })
            }
            (action, false) => {
                let act = action_fn(
                    Arc::clone(&tracker.step_id),
                    action.clone(),
                    self.config.clone(),
                );
                Step::deferred(move || async move {
                    let mut act = act;
                    let start = tracker.start();
                    let outcome = act().await;
                    tracker.settle(outcome, start)
                })
            }
            (action, true) => {
                let contained = Contained::new();
                let guarded = contained.wrap_async(action_fn(
                    Arc::clone(&tracker.step_id),
                    action.clone(),
                    self.config.clone(),
                ));
                Step::deferred(move || async move {
                    let mut guarded = guarded;
                    let start = tracker.start();
                    let output = match guarded().await {
                        Some(output) => output,
                        None => {
                            tracker.contained(contained.take_last_error());
                            Value::Null
                        }
                    };
                    tracker.settle(Ok(output), start)
                })
            }
        }
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

/// Translate the coordinator's failure into a plan error
fn step_error(step_id: &str, failure: RunError<StepwiseError>) -> StepwiseError {
    match failure {
        RunError::Step { error, .. } => error,
        RunError::Unspecified { .. } => StepwiseError::StepFailed {
            step_id: step_id.to_string(),
            reason: "failed without an error".to_string(),
        },
        RunError::Panicked { message, .. } => StepwiseError::StepFailed {
            step_id: step_id.to_string(),
            reason: format!("panicked: {}", message),
        },
    }
}

/// Callable performing a non-literal action; each call starts a fresh attempt
fn action_fn(
    step_id: Arc<str>,
    action: StepAction,
    config: RunnerConfig,
) -> impl FnMut() -> BoxFuture<'static, Result<Value, StepwiseError>> + Send + 'static {
    move || {
        let step_id = Arc::clone(&step_id);
        let action = action.clone();
        let config = config.clone();
        async move {
            match action {
                StepAction::Value { value } => Ok(value),
                StepAction::Delay { delay_ms } => {
                    pause(Duration::from_millis(delay_ms)).await;
                    Ok(Value::Null)
                }
                StepAction::Exec { exec } => execute_exec(&step_id, &exec.command, &config).await,
            }
        }
        .boxed()
    }
}

#[instrument(skip(config), fields(shell = %config.shell))]
async fn execute_exec(
    step_id: &str,
    command: &str,
    config: &RunnerConfig,
) -> Result<Value, StepwiseError> {
    let output = tokio::time::timeout(
        config.exec_timeout,
        tokio::process::Command::new(&config.shell)
            .arg("-c")
            .arg(command)
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| StepwiseError::ExecTimeout {
        step_id: step_id.to_string(),
        timeout_ms: config.exec_timeout.as_millis() as u64,
    })?
    .map_err(|e| StepwiseError::ExecFailed {
        step_id: step_id.to_string(),
        reason: format!("Failed to execute command: {}", e),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(StepwiseError::ExecFailed {
            step_id: step_id.to_string(),
            reason: format!("Command failed ({}): {}", output.status, stderr.trim()),
        });
    }

    Ok(Value::String(
        String::from_utf8_lossy(&output.stdout).trim().to_string(),
    ))
}

/// Per-step event and log emitter, owned by the step's deferred callable
struct StepTracker {
    step_id: Arc<str>,
    index: usize,
    event_log: EventLog,
}

impl StepTracker {
    fn start(&self) -> Instant {
        self.event_log.emit(EventKind::StepStarted {
            step_id: Arc::clone(&self.step_id),
            index: self.index,
        });
        debug!(step_id = %self.step_id, index = self.index, "Step started");
        Instant::now()
    }

    fn settle(
        &self,
        outcome: Result<Value, StepwiseError>,
        start: Instant,
    ) -> Result<Value, StepwiseError> {
        let duration_ms = start.elapsed().as_millis() as u64;
        match &outcome {
            Ok(output) => {
                self.event_log.emit(EventKind::StepCompleted {
                    step_id: Arc::clone(&self.step_id),
                    output: output.clone(),
                    duration_ms,
                });
                debug!(step_id = %self.step_id, duration_ms, "Step completed");
            }
            Err(err) => {
                self.event_log.emit(EventKind::StepFailed {
                    step_id: Arc::clone(&self.step_id),
                    error: err.to_string(),
                    duration_ms,
                });
                debug!(step_id = %self.step_id, error = %err, "Step failed");
            }
        }
        outcome
    }

    fn contained(&self, error: Option<StepwiseError>) {
        let error = error.map(|e| e.to_string());
        warn!(
            step_id = %self.step_id,
            error = error.as_deref().unwrap_or("unknown"),
            "Step failed, continuing (contained)"
        );
        self.event_log.emit(EventKind::StepContained {
            step_id: Arc::clone(&self.step_id),
            error,
        });
    }
}
