//! Login secret resolution.
//!
//! The secret comes from `DROPSHIP_PASSWORD_<ENV>` when it is set. Without
//! it, interactive runs prompt for it and automation runs fail.

use std::fmt;

use dialoguer::{Confirm, Password};

use crate::error::{DeployError, DeployResult};

/// Prefix of the environment variable holding the login secret.
pub const SECRET_VAR_PREFIX: &str = "DROPSHIP_PASSWORD";

/// A login secret. Its `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Whether the run may ask the operator for input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum RunMode {
    Interactive,
    Automation,
}

impl RunMode {
    /// Automation mode is on when requested explicitly or when stdin is not a terminal.
    pub fn detect(automation_flag: bool, stdin_is_terminal: bool) -> Self {
        if automation_flag || !stdin_is_terminal {
            RunMode::Automation
        } else {
            RunMode::Interactive
        }
    }

    pub fn is_automation(&self) -> bool {
        matches!(self, RunMode::Automation)
    }
}

/// Operator input.
pub trait Prompter: Send + Sync {
    /// Ask for a secret without echoing it.
    fn password(&self, prompt: &str) -> DeployResult<String>;

    /// Ask a yes/no question.
    fn confirm(&self, prompt: &str) -> DeployResult<bool>;
}

/// [`Prompter`] backed by the terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn password(&self, prompt: &str) -> DeployResult<String> {
        Password::new()
            .with_prompt(prompt)
            .allow_empty_password(false)
            .interact()
            .map_err(|e| DeployError::Prompt(e.to_string()))
    }

    fn confirm(&self, prompt: &str) -> DeployResult<bool> {
        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|e| DeployError::Prompt(e.to_string()))
    }
}

/// Name of the variable holding the secret for an environment key.
///
/// `prod` maps to `DROPSHIP_PASSWORD_PROD`; characters that are not valid in
/// a variable name become `_`.
pub fn secret_var_name(env_key: &str) -> String {
    let suffix: String = env_key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{SECRET_VAR_PREFIX}_{suffix}")
}

/// Pick the login secret for an environment.
///
/// `lookup` reads environment variables; production callers pass
/// `|name| std::env::var(name).ok()`.
pub fn resolve_secret<F>(
    env_key: &str,
    mode: RunMode,
    lookup: F,
    prompter: &dyn Prompter,
) -> DeployResult<Secret>
where
    F: Fn(&str) -> Option<String>,
{
    let var = secret_var_name(env_key);

    if let Some(value) = lookup(&var).filter(|v| !v.is_empty()) {
        tracing::debug!(var = %var, "Using password from environment");
        return Ok(Secret::new(value));
    }

    if mode.is_automation() {
        return Err(DeployError::MissingSecret { var });
    }

    let answer = prompter.password("Server password")?;
    Ok(Secret::new(answer))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct CountingPrompter {
        asked: AtomicUsize,
    }

    impl Prompter for CountingPrompter {
        fn password(&self, _prompt: &str) -> DeployResult<String> {
            self.asked.fetch_add(1, Ordering::SeqCst);
            Ok("typed".to_string())
        }

        fn confirm(&self, _prompt: &str) -> DeployResult<bool> {
            Ok(true)
        }
    }

    #[test]
    fn test_run_mode_detection() {
        assert_eq!(RunMode::detect(false, true), RunMode::Interactive);
        assert_eq!(RunMode::detect(true, true), RunMode::Automation);
        assert_eq!(RunMode::detect(false, false), RunMode::Automation);
        assert_eq!(RunMode::detect(true, false), RunMode::Automation);
    }

    #[test]
    fn test_secret_var_name() {
        assert_eq!(secret_var_name("prod"), "DROPSHIP_PASSWORD_PROD");
        assert_eq!(secret_var_name("eu-west.1"), "DROPSHIP_PASSWORD_EU_WEST_1");
    }

    #[test]
    fn test_variable_wins_over_prompt() {
        let prompter = CountingPrompter::default();
        let secret = resolve_secret(
            "prod",
            RunMode::Interactive,
            |name| (name == "DROPSHIP_PASSWORD_PROD").then(|| "from-env".to_string()),
            &prompter,
        )
        .unwrap();

        assert_eq!(secret.expose(), "from-env");
        assert_eq!(prompter.asked.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_automation_without_variable_fails() {
        let prompter = CountingPrompter::default();
        let err = resolve_secret("qa", RunMode::Automation, |_| None, &prompter).unwrap_err();

        assert!(matches!(err, DeployError::MissingSecret { ref var } if var == "DROPSHIP_PASSWORD_QA"));
        assert_eq!(prompter.asked.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_variable_is_ignored() {
        let prompter = CountingPrompter::default();
        let secret = resolve_secret(
            "prod",
            RunMode::Interactive,
            |_| Some(String::new()),
            &prompter,
        )
        .unwrap();

        assert_eq!(secret.expose(), "typed");
        assert_eq!(prompter.asked.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{secret:?}"), "Secret(***)");
    }
}
