//! A scripted container engine for lifecycle scenarios.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use berth::engine::{
    ContainerCreator, ContainerExecClient, ContainerLifecycleClient, ContainerLogStream,
    CreateContainerFuture, CreateExecFuture, EngineFuture, InspectExecFuture, StartExecFuture,
};
use bollard::auth::DockerCredentials;
use bollard::container::LogOutput;
use bollard::errors::Error as BollardError;
use bollard::exec::{CreateExecOptions, CreateExecResults, StartExecOptions, StartExecResults};
use bollard::models::{
    ContainerCreateBody, ContainerCreateResponse, ContainerInspectResponse, ContainerState,
    ExecInspectResponse,
};
use bollard::query_parameters::CreateContainerOptions;
use futures_util::{StreamExt, stream};
use mockall::mock;

use super::state::{AgentScript, EngineContainer};

mock! {
    #[derive(Debug)]
    pub(crate) LifecycleEngine {}

    impl ContainerCreator for LifecycleEngine {
        fn create_container<'a>(
            &'a self,
            options: Option<CreateContainerOptions>,
            config: ContainerCreateBody,
        ) -> CreateContainerFuture<'a>;
    }

    impl ContainerExecClient for LifecycleEngine {
        fn create_exec(&self, container_id: &str, options: CreateExecOptions<String>) -> CreateExecFuture<'_>;
        fn start_exec(&self, exec_id: &str, options: Option<StartExecOptions>) -> StartExecFuture<'_>;
        fn inspect_exec(&self, exec_id: &str) -> InspectExecFuture<'_>;
    }

    impl ContainerLifecycleClient for LifecycleEngine {
        fn start_container(&self, name: &str) -> EngineFuture<'_, ()>;
        fn stop_container(&self, name: &str) -> EngineFuture<'_, ()>;
        fn remove_container(&self, name: &str) -> EngineFuture<'_, ()>;
        fn inspect_container(&self, name: &str) -> EngineFuture<'_, ContainerInspectResponse>;
        fn container_logs(&self, name: &str) -> ContainerLogStream;
        fn inspect_image(&self, image: &str) -> EngineFuture<'_, ()>;
        fn pull_image(&self, image: &str, credentials: Option<DockerCredentials>) -> EngineFuture<'_, ()>;
        fn ping(&self) -> EngineFuture<'_, ()>;
    }
}

fn not_found() -> BollardError {
    BollardError::DockerResponseServerError {
        status_code: 404,
        message: String::from("no such container"),
    }
}

/// Build an engine holding `container` whose bootstrap follows `agent`.
pub(crate) fn scripted_engine(
    container: EngineContainer,
    agent: &AgentScript,
    creates: Arc<AtomicUsize>,
) -> Arc<MockLifecycleEngine> {
    let mut engine = MockLifecycleEngine::new();

    engine
        .expect_inspect_image()
        .returning(|_| Box::pin(async { Ok(()) }));
    engine.expect_inspect_container().returning(move |_| {
        Box::pin(async move {
            let running = match container {
                EngineContainer::Missing => return Err(not_found()),
                EngineContainer::Stopped => false,
                EngineContainer::Running => true,
            };
            Ok(ContainerInspectResponse {
                id: Some(String::from("c0ffee")),
                name: Some(String::from("/ws1-api")),
                state: Some(ContainerState {
                    running: Some(running),
                    ..ContainerState::default()
                }),
                ..ContainerInspectResponse::default()
            })
        })
    });
    engine.expect_create_container().returning(move |_, _| {
        creates.fetch_add(1, Ordering::SeqCst);
        Box::pin(async {
            Ok(ContainerCreateResponse {
                id: String::from("c0ffee"),
                warnings: Vec::new(),
            })
        })
    });
    engine
        .expect_start_container()
        .returning(|_| Box::pin(async { Ok(()) }));
    engine
        .expect_stop_container()
        .returning(|_| Box::pin(async { Ok(()) }));
    engine.expect_remove_container().returning(move |_| {
        Box::pin(async move {
            if container == EngineContainer::Missing {
                Err(not_found())
            } else {
                Ok(())
            }
        })
    });

    expect_agent(&mut engine, agent.clone());
    Arc::new(engine)
}

fn expect_agent(engine: &mut MockLifecycleEngine, agent: AgentScript) {
    engine.expect_create_exec().returning(|_, _| {
        Box::pin(async {
            Ok(CreateExecResults {
                id: String::from("exec-1"),
            })
        })
    });

    let script = agent.clone();
    engine.expect_start_exec().returning(move |_, _| {
        let output = match &script {
            AgentScript::Ready => stream::iter(vec![Ok(LogOutput::StdOut {
                message: Vec::from(&b"Daytona Agent started\n"[..]).into(),
            })])
            .chain(stream::pending())
            .boxed(),
            AgentScript::Fails(reason) => stream::iter(vec![Ok(LogOutput::StdErr {
                message: Vec::from(reason.as_bytes()).into(),
            })])
            .boxed(),
        };
        Box::pin(async move {
            Ok(StartExecResults::Attached {
                output,
                input: Box::pin(tokio::io::sink()),
            })
        })
    });

    let exit_code = match agent {
        AgentScript::Ready => None,
        AgentScript::Fails(_) => Some(1),
    };
    engine.expect_inspect_exec().returning(move |_| {
        Box::pin(async move {
            Ok(ExecInspectResponse {
                running: Some(false),
                exit_code,
                ..ExecInspectResponse::default()
            })
        })
    });
}
