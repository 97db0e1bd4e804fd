//! Sequential, fail-fast execution of a task list.

use std::time::{Duration, Instant};

use crate::error::{DeployError, DeployResult};

use super::{RunContext, TaskList};

/// Where the executor is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Idle,
    /// Running the step at this 1-based index.
    Running(usize),
    Succeeded,
    /// Stopped at the step at this 1-based index.
    Failed(usize),
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub steps: usize,
    pub elapsed: Duration,
}

/// Runs the steps of a [`TaskList`] in order, each at most once.
#[derive(Debug)]
pub struct Executor<'t> {
    tasks: &'t TaskList,
    state: ExecutorState,
}

impl<'t> Executor<'t> {
    pub fn new(tasks: &'t TaskList) -> Self {
        Self {
            tasks,
            state: ExecutorState::Idle,
        }
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    /// Run every step, stopping at the first failure.
    ///
    /// A failure is returned as [`DeployError::StepFailed`]. If an SSH
    /// session is still open at that point it is closed before returning;
    /// errors while closing are logged and do not replace the step error.
    pub async fn run(&mut self, ctx: &mut RunContext<'_>) -> DeployResult<RunSummary> {
        let start = Instant::now();

        for (index, step) in self.tasks.numbered() {
            self.state = ExecutorState::Running(index);
            tracing::info!(index, step = %step, "({index}) {}", step.describe(ctx.env));

            if let Err(source) = step.run(ctx).await {
                self.state = ExecutorState::Failed(index);
                tracing::error!(index, step = %step, error = %source, "Step failed");

                if let Some(mut session) = ctx.take_session() {
                    if let Err(e) = session.close().await {
                        tracing::warn!(error = %e, "Failed to close SSH session after error");
                    }
                }

                return Err(DeployError::StepFailed {
                    index,
                    step,
                    source: Box::new(source),
                });
            }
        }

        self.state = ExecutorState::Succeeded;
        Ok(RunSummary {
            steps: self.tasks.len(),
            elapsed: start.elapsed(),
        })
    }
}
