//! Run controller.
//!
//! Drives the six steps strictly sequentially in dependency order, skips
//! hard-dependents of failed steps, retries transient extraction failures
//! at most once, enforces the run-level deadline, then reconciles the two
//! sources and finalizes the report. Step failures never propagate past
//! the controller; only configuration and assembly errors abort a run.

use crate::error::{AutomationError, Result};
use crate::reconcile::{reconcile, ReconciliationReport};
use crate::report::{ReportAssembler, RunReport};
use crate::workflow::{RunState, Step, StepResult, StepStatus};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Outcome of a complete run, for the CLI exit-code decision and the
/// end-of-run summary.
#[derive(Debug)]
pub struct RunSummary {
    pub report: RunReport,
    pub statuses: Vec<(String, StepStatus)>,
    /// Failed steps that were not expected/tolerated cases.
    pub unexpected_failures: Vec<String>,
}

impl RunSummary {
    pub fn success(&self) -> bool {
        self.unexpected_failures.is_empty()
    }
}

pub struct RunController {
    steps: Vec<Box<dyn Step>>,
    tolerance: f64,
    max_transient_retries: u32,
    deadline: Duration,
}

impl RunController {
    pub fn new(
        steps: Vec<Box<dyn Step>>,
        tolerance: f64,
        max_transient_retries: u32,
        deadline: Duration,
    ) -> Self {
        Self {
            steps,
            tolerance,
            // Bounded by design: a single re-attempt at most.
            max_transient_retries: max_transient_retries.min(1),
            deadline,
        }
    }

    pub async fn run(self) -> Result<RunSummary> {
        let mut state = RunState::new();
        let mut assembler = ReportAssembler::new();
        let mut statuses: HashMap<&'static str, StepStatus> = self
            .steps
            .iter()
            .map(|step| (step.name(), StepStatus::Pending))
            .collect();
        let mut results: Vec<StepResult> = Vec::new();
        let started = Instant::now();

        info!(run_id = %assembler.run_id(), steps = self.steps.len(), "run started");

        for step in &self.steps {
            let name = step.name();

            if started.elapsed() >= self.deadline {
                warn!(step = name, "run deadline exceeded; not starting step");
                statuses.insert(name, StepStatus::Skipped);
                results.push(StepResult::skipped(name, "run deadline exceeded"));
                continue;
            }

            if let Some(blocker) = step
                .depends_on()
                .iter()
                .copied()
                .find(|dep| statuses.get(*dep) != Some(&StepStatus::Succeeded))
            {
                info!(step = name, dependency = blocker, "skipping: dependency did not succeed");
                statuses.insert(name, StepStatus::Skipped);
                results.push(StepResult::skipped(
                    name,
                    &format!("dependency '{blocker}' did not succeed"),
                ));
                continue;
            }

            statuses.insert(name, StepStatus::Running);
            let result = self.run_step(step.as_ref(), &mut state).await?;
            statuses.insert(name, result.status);
            results.push(result);
        }

        let reconciliation = self.reconcile_sources(&state);

        for result in results.iter().cloned() {
            assembler.record_step(result)?;
        }
        if let Some(reconciliation) = reconciliation {
            assembler.record_reconciliation(reconciliation)?;
        }
        let report = assembler.finalize()?;

        let unexpected_failures: Vec<String> = results
            .iter()
            .filter(|r| r.status == StepStatus::Failed && !r.expected_failure)
            .map(|r| r.step_name.clone())
            .collect();
        info!(
            elapsed_secs = started.elapsed().as_secs(),
            failures = unexpected_failures.len(),
            "run finished"
        );

        Ok(RunSummary {
            report,
            statuses: results
                .iter()
                .map(|r| (r.step_name.clone(), r.status))
                .collect(),
            unexpected_failures,
        })
    }

    /// Execute one step, applying the bounded transient retry. Converts
    /// step-local failures into a failed result; fatal errors propagate.
    async fn run_step(&self, step: &dyn Step, state: &mut RunState) -> Result<StepResult> {
        let name = step.name();
        let mut attempt = 0u32;
        loop {
            info!(step = name, attempt, "step running");
            match step.run(state).await {
                Ok(output) => {
                    info!(step = name, "step succeeded");
                    return Ok(StepResult::succeeded(name, output));
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) if e.is_transient() && attempt < self.max_transient_retries => {
                    warn!(step = name, error = %e, "transient failure; retrying once");
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_expected() {
                        info!(step = name, error = %e, "step failed (expected case)");
                    } else {
                        error!(step = name, error = %e, "step failed");
                    }
                    return Ok(StepResult::failed(name, &e));
                }
            }
        }
    }

    /// Reconcile when the web side produced matchable data and the API
    /// side either produced data or is known-unavailable (so the report
    /// can carry the distinct unavailable flag).
    fn reconcile_sources(&self, state: &RunState) -> Option<ReconciliationReport> {
        let web = state.web_records();
        let api = state.api_records();
        if web.is_empty() {
            return None;
        }
        if api.is_empty() && state.api_endpoint_present {
            // API step failed unexpectedly or was skipped; a blanket
            // missing_in_api report would be misleading.
            return None;
        }
        Some(reconcile(
            &web,
            &api,
            self.tolerance,
            state.api_endpoint_present,
        ))
    }
}
