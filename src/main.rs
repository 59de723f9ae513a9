//! `berth` application entry point.
//!
//! This binary drives the provider from the command line. It uses `eyre` for
//! opaque error handling at the application boundary, converting
//! domain-specific errors into human-readable reports.
//!
//! Configuration is loaded with layered precedence via `OrthoConfig`:
//! 1. Application defaults
//! 2. Configuration file (`~/.config/berth/config.toml` or path from `BERTH_CONFIG_PATH`)
//! 3. Environment variables (`BERTH_*`)
//! 4. Command-line arguments

use std::collections::BTreeMap;

use berth::config::{
    AppConfig, Cli, Commands, ProjectArgs, StartArgs, TargetArgs, WorkspaceArgs, load_config,
};
use berth::error::{BerthError, ConfigError, Result as BerthResult};
use berth::logging::init_tracing;
use berth::provider::{
    FollowOutcome, Project, ProjectRequest, Provider, ProviderContext, WorkspaceRequest,
    preset_targets, target_manifest,
};
use berth::target::TargetDescriptor;
use clap::Parser;
use eyre::{Report, Result as EyreResult};
use serde::Serialize;
use tracing::{info, warn};

/// Application entry point.
///
/// Installs diagnostics, loads configuration with layered precedence and
/// dispatches to the subcommand on a multi-threaded runtime.
fn main() -> EyreResult<()> {
    let cli = Cli::parse();
    init_tracing(&mockable::DefaultEnv::new());

    // defaults < file < env < CLI
    let config = load_config(&cli).map_err(Report::from)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(&cli, &config))
}

async fn run(cli: &Cli, config: &AppConfig) -> EyreResult<()> {
    match &cli.command {
        Commands::Manifest => print_json(&target_manifest()),
        Commands::Presets => print_json(&preset_targets()),
        command => run_provider(command, config).await,
    }
}

/// Run a subcommand that needs an initialised provider.
///
/// The forwarding-socket directory this process claimed is released on every
/// exit path.
async fn run_provider(command: &Commands, config: &AppConfig) -> EyreResult<()> {
    let provider = Provider::new(ProviderContext::initialize(config)?);
    let outcome = dispatch(&provider, command).await;
    let released = provider.context().release_scratch();
    outcome?;
    released.map_err(Report::from)
}

async fn dispatch(provider: &Provider, command: &Commands) -> EyreResult<()> {
    match command {
        Commands::Start(args) => start(provider, args).await?,
        Commands::Stop(args) => provider.stop(&project_request(args)?).await?,
        Commands::Destroy(args) => provider.destroy(&project_request(args)?).await?,
        Commands::Info(args) => print_json(&provider.info(&project_request(args)?).await?)?,
        Commands::DestroyWorkspace(args) => {
            provider.destroy_workspace(&workspace_request(args)).await?;
        }
        Commands::WorkspaceInfo(args) => {
            print_json(&provider.workspace_info(&workspace_request(args))?)?;
        }
        Commands::Requirements => print_json(&provider.check_requirements().await)?,
        Commands::Manifest | Commands::Presets => {}
    }
    Ok(())
}

/// Start the project and, unless detached, stream its logs until the
/// container's log stream ends or the user interrupts.
async fn start(provider: &Provider, args: &StartArgs) -> EyreResult<()> {
    let follower = provider
        .create_and_start(&project_request(&args.project)?)
        .await?;
    if args.detach {
        return Ok(());
    }

    info!("following project logs; press ctrl-c to stop");
    if follower.follow_until(interrupted()).await == FollowOutcome::Interrupted {
        info!("stopped following project logs");
    }
    Ok(())
}

/// Complete on ctrl-c. Never completes when the signal cannot be watched.
async fn interrupted() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "cannot watch for ctrl-c; following until the log stream ends");
        std::future::pending::<()>().await;
    }
}

#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
fn print_json<T: Serialize>(value: &T) -> EyreResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn target(args: &TargetArgs) -> TargetDescriptor {
    TargetDescriptor::new(args.target.clone(), args.target_options.clone())
}

fn project_request(args: &ProjectArgs) -> BerthResult<ProjectRequest> {
    let project = Project {
        name: args.project.clone(),
        workspace_id: args.workspace.clone(),
        image: args.image.clone().unwrap_or_default(),
        user: args.user.clone(),
        env_vars: parse_env(&args.env)?,
        api_key: args.api_key.clone().unwrap_or_default(),
        build: None,
    };
    Ok(ProjectRequest::new(project, target(&args.target)))
}

fn workspace_request(args: &WorkspaceArgs) -> WorkspaceRequest {
    WorkspaceRequest {
        workspace_id: args.workspace.clone(),
        target: target(&args.target),
    }
}

fn parse_env(pairs: &[String]) -> BerthResult<BTreeMap<String, String>> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .filter(|(key, _)| !key.trim().is_empty())
                .map(|(key, value)| (String::from(key), String::from(value)))
                .ok_or_else(|| {
                    BerthError::from(ConfigError::InvalidValue {
                        field: String::from("env"),
                        reason: format!("expected KEY=value, got '{pair}'"),
                    })
                })
        })
        .collect()
}
