//! Selection and ordering of steps.

use derive_more::Deref;

use crate::config::EnvironmentConfig;

use super::Step;

/// The ordered steps of one run. Built once, never modified.
#[derive(Debug, Clone, PartialEq, Eq, Deref)]
pub struct TaskList(Vec<Step>);

impl TaskList {
    /// Pick the steps for an environment.
    ///
    /// Build runs only with a script and outside local-only mode. Backup,
    /// remote removal and local cleanup follow their configuration flags.
    /// Everything else always runs, and disconnect is always last.
    pub fn build(env: &EnvironmentConfig, local_only: bool) -> Self {
        let mut steps = Vec::with_capacity(9);

        if !local_only && env.script.is_some() {
            steps.push(Step::Build);
        }
        steps.extend([Step::Archive, Step::Connect, Step::Upload]);
        if env.bak_dir.is_some() {
            steps.push(Step::Backup);
        }
        if env.is_remove_remote_file {
            steps.push(Step::RemoveRemote);
        }
        steps.push(Step::Unzip);
        if env.is_remove_local_file {
            steps.push(Step::CleanLocal);
        }
        steps.push(Step::Disconnect);

        Self(steps)
    }

    /// 1-based position of a step, if present.
    pub fn position(&self, step: Step) -> Option<usize> {
        self.0.iter().position(|s| *s == step).map(|i| i + 1)
    }

    /// Steps paired with their 1-based index.
    pub fn numbered(&self) -> impl Iterator<Item = (usize, Step)> + '_ {
        self.0.iter().copied().enumerate().map(|(i, s)| (i + 1, s))
    }
}
