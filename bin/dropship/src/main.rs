//! dropship is a CLI tool to build a static site and publish it to a server over SSH.

mod cli;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{Table, presets::UTF8_FULL};
use is_terminal::IsTerminal;

use cli::{Cli, Command, DeployArgs, TargetArgs};
use dropship_deploy::{
    Capabilities, DeployConfig, DeployError, DeploymentRun, RunMode, RunOptions,
    TerminalPrompter, current_branch,
};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    match cli.command {
        Command::Deploy(args) => deploy(args).await,
        Command::Plan(args) => plan(args),
    }
}

fn prepare(target: &TargetArgs, mode: RunMode) -> Result<DeploymentRun> {
    let workdir = std::env::current_dir().context("Failed to read the current directory")?;
    let config = DeployConfig::load(&target.config)?;

    let run = DeploymentRun::prepare(
        &config,
        &target.env,
        RunOptions {
            local_only: target.local,
            mode,
            workdir,
        },
    )?;
    Ok(run)
}

async fn deploy(args: DeployArgs) -> Result<ExitCode> {
    let mode = RunMode::detect(args.ci, std::io::stdin().is_terminal());
    let mut run = prepare(&args.target, mode)?;

    let branch = current_branch(&run.workdir).await;
    tracing::info!(
        branch = branch.as_deref().unwrap_or("unknown"),
        mode = %mode,
        "Current branch"
    );

    let prompter = TerminalPrompter;
    match run.confirm(branch.as_deref(), &prompter) {
        Ok(()) => {}
        Err(DeployError::Declined) => {
            tracing::warn!("Deployment cancelled");
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    }

    run.resolve_credentials(|name| std::env::var(name).ok(), &prompter)?;

    let report = run.execute(&Capabilities::production()).await?;

    tracing::info!(
        project = %report.project_name,
        branch = branch.as_deref().unwrap_or("unknown"),
        env = %report.env_name,
        steps = report.steps,
        "✓ Deployment complete in {:.2}s",
        report.elapsed.as_secs_f64()
    );
    println!("Verify at: {}", report.verify_address);

    Ok(ExitCode::SUCCESS)
}

fn plan(args: TargetArgs) -> Result<ExitCode> {
    let run = prepare(&args, RunMode::Interactive)?;
    println!("{}", plan_table(&run));
    Ok(ExitCode::SUCCESS)
}

fn plan_table(run: &DeploymentRun) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Step", "Where", "Action"]);
    for (index, step) in run.tasks().numbered() {
        let side = if step.is_remote() { "remote" } else { "local" };
        table.add_row(vec![
            index.to_string(),
            step.to_string(),
            side.to_string(),
            step.describe(&run.env),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_plan_table_lists_steps_in_order() {
        let config = DeployConfig::from_toml_str(
            r#"
            project_name = "site"

            [prod]
            name = "production"
            host = "203.0.113.10"
            port = 22
            username = "deploy"
            dist_path = "dist"
            web_dir = "/var/www/site"
            bak_dir = "/var/www/backup"
            "#,
        )
        .unwrap();
        let run = DeploymentRun::prepare(
            &config,
            "prod",
            RunOptions {
                local_only: false,
                mode: RunMode::Interactive,
                workdir: PathBuf::from("."),
            },
        )
        .unwrap();

        let rendered = plan_table(&run).to_string();
        let archive = rendered.find("archive").unwrap();
        let backup = rendered.find("back up /var/www/site").unwrap();
        let disconnect = rendered.find("disconnect").unwrap();
        assert!(archive < backup && backup < disconnect);
        assert!(!rendered.contains("build"));

        let archive_row = rendered.lines().find(|l| l.contains("zip dist")).unwrap();
        assert!(archive_row.contains("local"));
        let unzip_row = rendered.lines().find(|l| l.contains("unzip")).unwrap();
        assert!(unzip_row.contains("remote"));
    }
}
