//! Given/when steps for project lifecycle scenarios.

use berth::agent::ReadinessDetector;
use berth::config::AppConfig;
use berth::logging::LogSink;
use berth::provider::{Pipeline, Project, ProjectRequest, ProviderContext, WorkingTree};
use berth::target::TargetDescriptor;
use camino::Utf8PathBuf;
use rstest_bdd_macros::{given, when};

use super::StepResult;
use super::engine::scripted_engine;
use super::state::{AgentScript, EngineContainer, LifecycleState};

/// Which pipeline operation a step runs.
#[derive(Clone, Copy)]
enum Operation {
    Start,
    Stop,
    Destroy,
}

#[given("a project {project} in workspace {workspace}")]
fn given_project(lifecycle_state: &LifecycleState, project: String, workspace: String) {
    lifecycle_state.project.set(Project {
        name: project,
        workspace_id: workspace,
        image: String::from("node:22"),
        api_key: String::from("k3y"),
        ..Project::default()
    });
}

#[given("the engine has no container for the project")]
fn given_no_container(lifecycle_state: &LifecycleState) {
    lifecycle_state.container.set(EngineContainer::Missing);
}

#[given("the engine has a stopped container for the project")]
fn given_stopped_container(lifecycle_state: &LifecycleState) {
    lifecycle_state.container.set(EngineContainer::Stopped);
}

#[given("the agent announces readiness")]
fn given_agent_ready(lifecycle_state: &LifecycleState) {
    lifecycle_state.agent.set(AgentScript::Ready);
}

#[given("the agent fails with {reason}")]
fn given_agent_fails(lifecycle_state: &LifecycleState, reason: String) {
    lifecycle_state.agent.set(AgentScript::Fails(reason));
}

#[when("the project is started")]
fn when_started(lifecycle_state: &LifecycleState) -> StepResult<()> {
    run(lifecycle_state, Operation::Start)
}

#[when("the project is stopped")]
fn when_stopped(lifecycle_state: &LifecycleState) -> StepResult<()> {
    run(lifecycle_state, Operation::Stop)
}

#[when("the project is destroyed")]
fn when_destroyed(lifecycle_state: &LifecycleState) -> StepResult<()> {
    run(lifecycle_state, Operation::Destroy)
}

fn context() -> StepResult<ProviderContext> {
    let config = AppConfig {
        base_path: Some(Utf8PathBuf::from("/nonexistent/berth")),
        scratch_dir: Some(Utf8PathBuf::from("/nonexistent/berth-socks")),
        ..AppConfig::default()
    };
    ProviderContext::from_config(&config).map_err(|e| format!("context should build: {e}"))
}

/// Run `operation` against a fresh engine reflecting the scenario so far.
///
/// The engine's container follows the outcome: a start leaves it running,
/// a stop leaves it stopped and a destroy removes it.
fn run(lifecycle_state: &LifecycleState, operation: Operation) -> StepResult<()> {
    let project = lifecycle_state
        .project
        .get()
        .ok_or_else(|| String::from("project should be configured"))?;
    let container = lifecycle_state
        .container
        .get()
        .unwrap_or(EngineContainer::Missing);
    let agent = lifecycle_state.agent.get().unwrap_or(AgentScript::Ready);
    let tracker = lifecycle_state
        .tracker
        .get()
        .ok_or_else(|| String::from("tracker should be configured"))?;
    let creates = lifecycle_state
        .creates
        .get()
        .ok_or_else(|| String::from("create counter should be configured"))?;
    let output = lifecycle_state.output.get().unwrap_or_default();

    let context = context()?;
    let detector = ReadinessDetector::default();
    let engine = scripted_engine(container, &agent, creates);
    let pipeline = Pipeline::new(engine, &context, &tracker, &detector);
    let tree = WorkingTree::Local(
        context
            .base_path()
            .join(&project.workspace_id)
            .join(project.container_name()),
    );

    let runtime =
        tokio::runtime::Runtime::new().map_err(|e| format!("failed to create runtime: {e}"))?;
    let result = runtime.block_on(async {
        match operation {
            Operation::Start => {
                let request = ProjectRequest::new(
                    project.clone(),
                    TargetDescriptor::new("local", r#"{"Sock Path":"/var/run/docker.sock"}"#),
                );
                pipeline
                    .create_and_start(&request, &tree, false, &LogSink::new(output.clone()))
                    .await
            }
            Operation::Stop => pipeline.stop(&project).await,
            Operation::Destroy => pipeline.destroy(&project, &tree).await,
        }
    });

    match result {
        Ok(()) => {
            let next = match operation {
                Operation::Start => EngineContainer::Running,
                Operation::Stop => EngineContainer::Stopped,
                Operation::Destroy => EngineContainer::Missing,
            };
            lifecycle_state.container.set(next);
            lifecycle_state.outcome.set(None);
        }
        Err(error) => lifecycle_state.outcome.set(Some(error.to_string())),
    }
    Ok(())
}
