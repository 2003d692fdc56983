//! In-process agent-run lifecycle simulator.
//!
//! Emulates a long-running remote agent job without a real backend: each
//! run walks a fixed step table, updating its progress and current step,
//! honouring cancellation at step boundaries, and firing the completion
//! notifier exactly once when it reaches `Completed` or `Failed`.
//!
//! The simulator owns run state exclusively; its executor task is the only
//! writer of `progress`/`current_step`. External callers read snapshots or
//! flip the cancellation flag via [`RunSimulator::cancel_run`], which the
//! executor observes at the next step boundary. Given the same step table,
//! the emitted `(current_step, progress)` sequence is identical on every
//! run; only wall-clock timing varies.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::adapters::agenthq::models::AgentRunInput;
use crate::domain::errors::{AgentApiError, RemoteResult};
use crate::domain::models::{AgentRun, RunResult, RunStatus};
use crate::services::notifier::CompletionNotifier;

/// One step in the simulated execution sequence.
#[derive(Debug, Clone)]
pub struct SimStep {
    /// Human-readable label shown in `current_step`.
    pub label: String,
    /// Simulated duration of the step.
    pub duration: Duration,
    /// Progress fraction reached while this step runs.
    pub progress: f64,
    /// When set, the step errors with this message instead of completing,
    /// driving the run to `Failed`.
    pub fail_with: Option<String>,
}

impl SimStep {
    /// Create a normal step.
    pub fn new(label: impl Into<String>, duration: Duration, progress: f64) -> Self {
        Self {
            label: label.into(),
            duration,
            progress,
            fail_with: None,
        }
    }

    /// Create a step that fails after its delay elapses.
    pub fn failing(
        label: impl Into<String>,
        duration: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            duration,
            progress: 0.0,
            fail_with: Some(error.into()),
        }
    }
}

/// The default ten-step execution sequence of a ticket-fix run.
pub fn default_steps() -> Vec<SimStep> {
    [
        ("Initializing agent", 2, 0.05),
        ("Analyzing ticket", 3, 0.15),
        ("Searching codebase for related files", 8, 0.30),
        ("Analyzing code context", 5, 0.45),
        ("Generating code fix", 10, 0.65),
        ("Running tests on generated code", 7, 0.80),
        ("Creating fix branch", 2, 0.85),
        ("Committing changes", 3, 0.90),
        ("Pushing to remote", 2, 0.95),
        ("Creating pull request", 3, 1.0),
    ]
    .into_iter()
    .map(|(label, secs, progress)| SimStep::new(label, Duration::from_secs(secs), progress))
    .collect()
}

/// Owns the authoritative state machine for simulated agent runs.
pub struct RunSimulator {
    runs: Arc<RwLock<HashMap<String, AgentRun>>>,
    handles: Mutex<HashMap<String, JoinHandle<()>>>,
    steps: Vec<SimStep>,
    notifier: Option<Arc<CompletionNotifier>>,
}

impl RunSimulator {
    /// Create a simulator with the default step table and no notifier.
    pub fn new() -> Self {
        Self::with_steps(default_steps())
    }

    /// Create a simulator with a custom step table.
    ///
    /// Progress fractions must be strictly increasing for non-failing
    /// steps, and the final step must reach 1.0.
    pub fn with_steps(steps: Vec<SimStep>) -> Self {
        let fractions: Vec<f64> = steps
            .iter()
            .filter(|s| s.fail_with.is_none())
            .map(|s| s.progress)
            .collect();
        assert!(
            fractions.windows(2).all(|w| w[0] < w[1]),
            "step progress fractions must be strictly increasing"
        );
        if let Some(last) = fractions.last() {
            assert!(
                (last - 1.0).abs() < f64::EPSILON || steps.last().is_some_and(|s| s.fail_with.is_some()),
                "final step progress must be 1.0"
            );
        }

        Self {
            runs: Arc::new(RwLock::new(HashMap::new())),
            handles: Mutex::new(HashMap::new()),
            steps,
            notifier: None,
        }
    }

    /// Attach a completion notifier, fired once per terminal run.
    pub fn with_notifier(mut self, notifier: Arc<CompletionNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Create a run and schedule its execution.
    ///
    /// Returns immediately with a snapshot of the freshly created run; the
    /// step sequence executes on a spawned task that does not block the
    /// caller.
    pub async fn create_run(&self, input: &AgentRunInput) -> AgentRun {
        let run_id = format!("run_{}", &Uuid::new_v4().simple().to_string()[..12]);
        let run = AgentRun::new(
            &run_id,
            &input.ticket_id,
            &input.ticket_summary,
            &input.repository,
        );

        info!(run_id = %run_id, ticket_id = %input.ticket_id, "created simulated run");

        {
            let mut runs = self.runs.write().await;
            runs.insert(run_id.clone(), run.clone());
        }

        let handle = tokio::spawn(execute_run(
            Arc::clone(&self.runs),
            self.steps.clone(),
            self.notifier.clone(),
            run_id.clone(),
        ));
        self.handles.lock().await.insert(run_id, handle);

        run
    }

    /// Snapshot of a run's current state.
    pub async fn run_status(&self, run_id: &str) -> RemoteResult<AgentRun> {
        let runs = self.runs.read().await;
        runs.get(run_id)
            .cloned()
            .ok_or_else(|| AgentApiError::not_found(format!("Run {run_id} not found")))
    }

    /// Request cancellation of a run.
    ///
    /// Returns `true` only when the run actually transitioned to
    /// `Cancelled` here; unknown ids and already-terminal runs report
    /// `false` (no-op, never re-notified). The in-flight executor halts at
    /// its next step boundary, so observing the final state may lag by up
    /// to one step duration.
    pub async fn cancel_run(&self, run_id: &str) -> bool {
        let mut runs = self.runs.write().await;
        match runs.get_mut(run_id) {
            None => {
                warn!(run_id = %run_id, "cancel requested for unknown run");
                false
            }
            Some(run) if run.is_terminal() => {
                info!(run_id = %run_id, status = run.status.as_str(), "cancel is a no-op, run already terminal");
                false
            }
            Some(run) => match run.transition_to(RunStatus::Cancelled) {
                Ok(()) => {
                    info!(run_id = %run_id, "run cancelled");
                    true
                }
                Err(reason) => {
                    warn!(run_id = %run_id, %reason, "cancel rejected");
                    false
                }
            },
        }
    }

    /// All runs, for diagnostics.
    pub async fn list_runs(&self) -> Vec<AgentRun> {
        let runs = self.runs.read().await;
        runs.values().cloned().collect()
    }

    /// Await the executor task of a run, if one is still tracked.
    ///
    /// The spawned execution is an explicit, awaitable unit of work; tests
    /// and owners use this to join it deterministically.
    pub async fn wait(&self, run_id: &str) {
        let handle = self.handles.lock().await.remove(run_id);
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                error!(run_id = %run_id, error = %err, "run executor task panicked");
            }
        }
    }
}

impl Default for RunSimulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Drive one run through the step table.
///
/// This task is the sole writer of run fields after creation. Cancellation
/// is observed only at step boundaries; the terminal transition re-checks
/// under the write lock so `Running -> Cancelled` and
/// `Running -> Completed/Failed` stay mutually exclusive.
async fn execute_run(
    runs: Arc<RwLock<HashMap<String, AgentRun>>>,
    steps: Vec<SimStep>,
    notifier: Option<Arc<CompletionNotifier>>,
    run_id: String,
) {
    for step in &steps {
        {
            let mut guard = runs.write().await;
            let Some(run) = guard.get_mut(&run_id) else {
                return;
            };
            if run.status == RunStatus::Cancelled {
                info!(run_id = %run_id, step = %step.label, "execution halted by cancellation");
                return;
            }
            if step.fail_with.is_none() {
                if let Err(reason) = run.advance(&step.label, step.progress) {
                    warn!(run_id = %run_id, %reason, "halting execution");
                    return;
                }
                info!(
                    run_id = %run_id,
                    step = %step.label,
                    progress_pct = (step.progress * 100.0) as u32,
                    "step started"
                );
            }
        }

        tokio::time::sleep(step.duration).await;

        if let Some(message) = &step.fail_with {
            let snapshot = {
                let mut guard = runs.write().await;
                let Some(run) = guard.get_mut(&run_id) else {
                    return;
                };
                if run.status == RunStatus::Cancelled {
                    return;
                }
                if run.fail(message.clone()).is_err() {
                    return;
                }
                run.clone()
            };
            error!(run_id = %run_id, error = %message, "run failed");
            notify(&notifier, &snapshot).await;
            return;
        }
    }

    let snapshot = {
        let mut guard = runs.write().await;
        let Some(run) = guard.get_mut(&run_id) else {
            return;
        };
        // A cancellation that raced the final step wins; stay silent.
        if run.status == RunStatus::Cancelled {
            info!(run_id = %run_id, "execution halted by cancellation before completion");
            return;
        }
        let result = RunResult::synthesized(
            &run.run_id,
            &run.ticket_id,
            &run.ticket_summary,
            &run.repository,
        );
        if run.complete(result).is_err() {
            return;
        }
        run.clone()
    };

    info!(run_id = %run_id, "run completed");
    notify(&notifier, &snapshot).await;
}

async fn notify(notifier: &Option<Arc<CompletionNotifier>>, run: &AgentRun) {
    if let Some(notifier) = notifier {
        notifier.notify(run).await;
    }
}
