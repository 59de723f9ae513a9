//! Given/when steps for readiness scenarios.

use std::sync::Arc;
use std::time::Duration;

use berth::agent::{ReadinessDetector, bootstrap_exec};
use berth::engine::{ContainerExecClient, CreateExecFuture, InspectExecFuture, StartExecFuture};
use berth::error::{AgentError, BerthError};
use berth::logging::LogSink;
use bollard::container::LogOutput;
use bollard::exec::{CreateExecOptions, CreateExecResults, StartExecOptions, StartExecResults};
use bollard::models::ExecInspectResponse;
use futures_util::{StreamExt, stream};
use mockall::mock;
use rstest_bdd_macros::{given, when};

use super::StepResult;
use super::state::{Chunk, ReadinessState};

mock! {
    #[derive(Debug)]
    BootstrapClient {}

    impl ContainerExecClient for BootstrapClient {
        fn create_exec(&self, container_id: &str, options: CreateExecOptions<String>) -> CreateExecFuture<'_>;
        fn start_exec(&self, exec_id: &str, options: Option<StartExecOptions>) -> StartExecFuture<'_>;
        fn inspect_exec(&self, exec_id: &str) -> InspectExecFuture<'_>;
    }
}

fn push_chunk(readiness_state: &ReadinessState, chunk: Chunk) {
    let mut chunks = readiness_state.chunks.get().unwrap_or_default();
    chunks.push(chunk);
    readiness_state.chunks.set(chunks);
}

#[given("the readiness marker is {marker}")]
fn given_marker(readiness_state: &ReadinessState, marker: String) {
    readiness_state.marker.set(marker);
}

#[given("the bootstrap command prints {line}")]
fn given_prints(readiness_state: &ReadinessState, line: String) {
    push_chunk(readiness_state, Chunk::Stdout(format!("{line}\n")));
}

#[given("the bootstrap command keeps running")]
fn given_keeps_running(readiness_state: &ReadinessState) {
    readiness_state.keep_open.set(true);
}

#[given("the bootstrap command exits with status {code}")]
fn given_exits(readiness_state: &ReadinessState, code: i64) {
    readiness_state.exit_code.set(code);
}

#[given("the bootstrap command fails with status {code} and stderr {text}")]
fn given_fails(readiness_state: &ReadinessState, code: i64, text: String) {
    push_chunk(readiness_state, Chunk::Stderr(text));
    readiness_state.exit_code.set(code);
}

#[given("readiness times out after {millis} milliseconds")]
fn given_timeout(readiness_state: &ReadinessState, millis: u64) {
    readiness_state.timeout_ms.set(millis);
}

fn client_for(readiness_state: &ReadinessState) -> MockBootstrapClient {
    let chunks = readiness_state.chunks.get().unwrap_or_default();
    let keep_open = readiness_state.keep_open.get().unwrap_or(false);
    let exit_code = readiness_state.exit_code.get();

    let mut client = MockBootstrapClient::new();
    client.expect_create_exec().times(1).returning(|_, _| {
        Box::pin(async {
            Ok(CreateExecResults {
                id: String::from("bdd-exec"),
            })
        })
    });

    client.expect_start_exec().times(1).returning(move |_, _| {
        let items: Vec<_> = chunks
            .iter()
            .map(|chunk| {
                Ok(match chunk {
                    Chunk::Stdout(text) => LogOutput::StdOut {
                        message: Vec::from(text.as_bytes()).into(),
                    },
                    Chunk::Stderr(text) => LogOutput::StdErr {
                        message: Vec::from(text.as_bytes()).into(),
                    },
                })
            })
            .collect();
        let output = if keep_open {
            stream::iter(items).chain(stream::pending()).boxed()
        } else {
            stream::iter(items).boxed()
        };
        Box::pin(async move {
            Ok(StartExecResults::Attached {
                output,
                input: Box::pin(tokio::io::sink()),
            })
        })
    });

    client.expect_inspect_exec().returning(move |_| {
        Box::pin(async move {
            Ok(ExecInspectResponse {
                running: Some(false),
                exit_code,
                ..ExecInspectResponse::default()
            })
        })
    });
    client
}

#[when("readiness is awaited")]
fn when_awaited(readiness_state: &ReadinessState) -> StepResult<()> {
    let marker = readiness_state
        .marker
        .get()
        .ok_or_else(|| String::from("marker should be configured"))?;
    let timeout = readiness_state.timeout_ms.get().map(Duration::from_millis);
    let buffer = readiness_state.sink.get().unwrap_or_default();
    let detector = ReadinessDetector::new(marker).with_timeout(timeout);
    let request = bootstrap_exec("ws1-api", None, "http://agent.example/script", "key")
        .map_err(|e| format!("bootstrap request should build: {e}"))?;
    let client = Arc::new(client_for(readiness_state));

    let runtime =
        tokio::runtime::Runtime::new().map_err(|e| format!("failed to create runtime: {e}"))?;
    let outcome = match runtime.block_on(detector.await_ready(client, &request, LogSink::new(buffer)))
    {
        Ok(()) => None,
        Err(BerthError::Agent(AgentError::BootstrapFailed { reason, .. })) => Some(reason),
        Err(other) => return Err(format!("unexpected error kind: {other}")),
    };
    readiness_state.outcome.set(outcome);
    Ok(())
}
