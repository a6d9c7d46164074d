//! Plan parsing structures
//!
//! A plan is a YAML list of steps run in order by the [`Runner`](crate::Runner):
//!
//! ```yaml
//! schema: stepwise/plan@0.1
//! steps:
//!   - id: greet
//!     value: "hello"
//!   - id: wait
//!     delay_ms: 50
//!   - id: kernel
//!     exec:
//!       command: "uname -s"
//!     contain: true
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, StepwiseError};

pub const PLAN_SCHEMA: &str = "stepwise/plan@0.1";

#[derive(Debug, Clone, Deserialize)]
pub struct Plan {
    pub schema: String,
    #[serde(default)]
    pub steps: Vec<PlanStep>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanStep {
    pub id: String,
    /// Failure becomes a null output instead of stopping the plan
    #[serde(default)]
    pub contain: bool,
    #[serde(flatten)]
    pub action: StepAction,
}

/// Exec action - shell command
#[derive(Debug, Clone, Deserialize)]
pub struct ExecParams {
    pub command: String,
}

/// The 3 step actions - serde picks the first one whose key is present
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StepAction {
    Value { value: Value },
    Delay { delay_ms: u64 },
    Exec { exec: ExecParams },
}

impl StepAction {
    pub fn kind(&self) -> &'static str {
        match self {
            StepAction::Value { .. } => "value",
            StepAction::Delay { .. } => "delay",
            StepAction::Exec { .. } => "exec",
        }
    }
}

impl Plan {
    /// Parse and validate a plan from YAML
    pub fn parse(yaml: &str) -> Result<Self> {
        let plan: Plan = serde_yaml::from_str(yaml)?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::parse(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema != PLAN_SCHEMA {
            return Err(StepwiseError::InvalidSchema {
                expected: PLAN_SCHEMA.to_string(),
                found: self.schema.clone(),
            });
        }

        let mut seen = HashSet::with_capacity(self.steps.len());
        for (index, step) in self.steps.iter().enumerate() {
            if step.id.trim().is_empty() {
                return Err(StepwiseError::EmptyStepId { index });
            }
            if !seen.insert(step.id.as_str()) {
                return Err(StepwiseError::DuplicateStepId {
                    step_id: step.id.clone(),
                });
            }
            if let StepAction::Exec { exec } = &step.action {
                if exec.command.trim().is_empty() {
                    return Err(StepwiseError::EmptyCommand {
                        step_id: step.id.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }
}
