//! One deployment from start to finish.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{DateTime, Local};

use crate::{
    config::{DeployConfig, EnvironmentConfig},
    credential::{Prompter, RunMode, resolve_secret},
    error::{DeployError, DeployResult},
    pipeline::{Capabilities, Executor, RunContext, TaskList},
};

/// How a run was invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Skip the build step and deploy the artifact already on disk.
    pub local_only: bool,
    pub mode: RunMode,
    /// Directory the artifact path is relative to.
    pub workdir: PathBuf,
}

/// What a successful run reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    pub project_name: String,
    pub env_name: String,
    pub steps: usize,
    pub elapsed: Duration,
    pub verify_address: String,
}

/// The context of a single deployment.
#[derive(Debug)]
pub struct DeploymentRun {
    pub project_name: String,
    pub env: EnvironmentConfig,
    pub mode: RunMode,
    pub local_only: bool,
    pub workdir: PathBuf,
    pub started_at: DateTime<Local>,
    tasks: TaskList,
}

impl DeploymentRun {
    /// Resolve the environment and lay out the task list.
    ///
    /// Nothing is touched on disk or on the network.
    pub fn prepare(config: &DeployConfig, env_key: &str, options: RunOptions) -> DeployResult<Self> {
        let env = config.resolve_environment(env_key)?;
        let tasks = TaskList::build(&env, options.local_only);

        tracing::debug!(
            env = %env.key,
            mode = %options.mode,
            local_only = options.local_only,
            steps = tasks.len(),
            "Deployment prepared"
        );

        Ok(Self {
            project_name: config.project_name.clone(),
            env,
            mode: options.mode,
            local_only: options.local_only,
            workdir: options.workdir,
            started_at: Local::now(),
            tasks,
        })
    }

    pub fn tasks(&self) -> &TaskList {
        &self.tasks
    }

    /// Question asked before deploying.
    pub fn confirmation_prompt(&self, branch: Option<&str>) -> String {
        format!(
            "Deploy {} ({} branch) to {}?",
            self.project_name,
            branch.unwrap_or("unknown"),
            self.env.name
        )
    }

    /// Ask the operator to go ahead. Automation runs skip the question.
    pub fn confirm(&self, branch: Option<&str>, prompter: &dyn Prompter) -> DeployResult<()> {
        if self.mode.is_automation() {
            tracing::debug!("Automation mode, skipping confirmation");
            return Ok(());
        }

        if prompter.confirm(&self.confirmation_prompt(branch))? {
            Ok(())
        } else {
            Err(DeployError::Declined)
        }
    }

    /// Fill in the login secret. Must run before [`DeploymentRun::execute`].
    pub fn resolve_credentials<F>(&mut self, lookup: F, prompter: &dyn Prompter) -> DeployResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = resolve_secret(&self.env.key, self.mode, lookup, prompter)?;
        self.env.password = Some(secret);
        Ok(())
    }

    /// Run the task list.
    ///
    /// The reported elapsed time counts from [`DeploymentRun::prepare`], so it
    /// includes the confirmation and credential prompts.
    pub async fn execute(&self, capabilities: &Capabilities) -> DeployResult<DeployReport> {
        tracing::info!(
            project = %self.project_name,
            env = %self.env.name,
            host = %self.env.host,
            steps = self.tasks.len(),
            "Starting deployment"
        );

        let mut ctx = RunContext::new(&self.env, &self.workdir, self.started_at, capabilities);
        let summary = Executor::new(&self.tasks).run(&mut ctx).await?;

        Ok(DeployReport {
            project_name: self.project_name.clone(),
            env_name: self.env.name.clone(),
            steps: summary.steps,
            elapsed: (Local::now() - self.started_at)
                .to_std()
                .unwrap_or(summary.elapsed),
            verify_address: self.env.verification_address().to_string(),
        })
    }
}

/// Name of the checked-out git branch, if `workdir` is in a repository.
pub async fn current_branch(workdir: &Path) -> Option<String> {
    let output = tokio::process::Command::new("git")
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .current_dir(workdir)
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!branch.is_empty()).then_some(branch)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::pipeline::Step;

    const CONFIG: &str = r#"
        project_name = "site"

        [prod]
        name = "production"
        script = "build"
        host = "203.0.113.10"
        port = 22
        username = "deploy"
        dist_path = "dist"
        web_dir = "/var/www/site"
    "#;

    struct ScriptedPrompter {
        confirm: bool,
        questions: Mutex<Vec<String>>,
    }

    impl ScriptedPrompter {
        fn new(confirm: bool) -> Self {
            Self {
                confirm,
                questions: Mutex::new(Vec::new()),
            }
        }
    }

    impl Prompter for ScriptedPrompter {
        fn password(&self, prompt: &str) -> DeployResult<String> {
            self.questions.lock().unwrap().push(prompt.to_string());
            Ok("typed".to_string())
        }

        fn confirm(&self, prompt: &str) -> DeployResult<bool> {
            self.questions.lock().unwrap().push(prompt.to_string());
            Ok(self.confirm)
        }
    }

    fn prepare(mode: RunMode, local_only: bool) -> DeploymentRun {
        let config = DeployConfig::from_toml_str(CONFIG).unwrap();
        DeploymentRun::prepare(
            &config,
            "prod",
            RunOptions {
                local_only,
                mode,
                workdir: PathBuf::from("."),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_prepare_builds_task_list() {
        assert_eq!(
            prepare(RunMode::Interactive, false).tasks().first(),
            Some(&Step::Build)
        );
        assert_eq!(
            prepare(RunMode::Interactive, true).tasks().first(),
            Some(&Step::Archive)
        );
    }

    #[test]
    fn test_prepare_rejects_unknown_environment() {
        let config = DeployConfig::from_toml_str(CONFIG).unwrap();
        let options = RunOptions {
            local_only: false,
            mode: RunMode::Interactive,
            workdir: PathBuf::from("."),
        };
        assert!(matches!(
            DeploymentRun::prepare(&config, "qa", options),
            Err(DeployError::UnknownEnvironment { .. })
        ));
    }

    #[test]
    fn test_confirmation_prompt() {
        let run = prepare(RunMode::Interactive, false);
        assert_eq!(
            run.confirmation_prompt(Some("main")),
            "Deploy site (main branch) to production?"
        );
        assert_eq!(
            run.confirmation_prompt(None),
            "Deploy site (unknown branch) to production?"
        );
    }

    #[test]
    fn test_declined_confirmation() {
        let run = prepare(RunMode::Interactive, false);
        let prompter = ScriptedPrompter::new(false);
        assert!(matches!(
            run.confirm(Some("main"), &prompter),
            Err(DeployError::Declined)
        ));
    }

    #[test]
    fn test_automation_skips_confirmation() {
        let run = prepare(RunMode::Automation, false);
        let prompter = ScriptedPrompter::new(false);
        run.confirm(None, &prompter).unwrap();
        assert!(prompter.questions.lock().unwrap().is_empty());
    }

    #[test]
    fn test_resolve_credentials_sets_password_once() {
        let mut run = prepare(RunMode::Interactive, false);
        let prompter = ScriptedPrompter::new(true);
        run.resolve_credentials(|_| None, &prompter).unwrap();

        assert_eq!(run.env.password.as_ref().map(|s| s.expose()), Some("typed"));
        assert_eq!(prompter.questions.lock().unwrap().len(), 1);
    }
}
