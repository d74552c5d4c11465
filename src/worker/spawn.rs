//! Process-backed compute units.
//!
//! By default each unit re-executes the current binary in its hidden `worker`
//! mode. The request goes to the child's stdin as one JSON line; responses come
//! back on its stdout. stderr is inherited so worker logs land next to ours.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};

use super::protocol::{WorkRequest, WorkResponse};
use super::unit::{ComputationRequest, UnitEvent, UnitExit, UnitHandle, UnitId, UnitSpawner};
use crate::error::{PrimesError, Result};
use crate::sieve::ComputationResult;

/// Sub-command that puts the binary into compute-unit mode.
pub const WORKER_SUBCOMMAND: &str = "worker";

/// How long a unit may take to exit on its own after it was asked to stop.
const DEFAULT_EXIT_GRACE: Duration = Duration::from_secs(2);

/// Spawns one OS process per compute unit.
#[derive(Debug, Clone)]
pub struct ProcessSpawner {
    program: PathBuf,
    args: Vec<String>,
    exit_grace: Duration,
}

impl ProcessSpawner {
    /// Drive an arbitrary program that speaks the worker protocol.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            exit_grace: DEFAULT_EXIT_GRACE,
        }
    }

    /// Re-execute the running binary in worker mode.
    pub fn current_exe() -> Result<Self> {
        let exe = std::env::current_exe().map_err(|e| {
            PrimesError::SpawnFailed(format!("Failed to get current executable: {}", e))
        })?;
        Ok(Self::new(exe, vec![WORKER_SUBCOMMAND.to_string()]))
    }

    /// Set the grace period before a stopping unit is killed.
    pub fn with_exit_grace(mut self, grace: Duration) -> Self {
        self.exit_grace = grace;
        self
    }
}

impl UnitSpawner for ProcessSpawner {
    fn name(&self) -> &'static str {
        "process"
    }

    fn spawn(&self, id: UnitId, request: ComputationRequest) -> Result<UnitHandle> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            PrimesError::SpawnFailed(format!("{}: {}", self.program.display(), e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PrimesError::SpawnFailed("Child stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PrimesError::SpawnFailed("Child stdout not captured".into()))?;

        tracing::debug!(unit = %id, pid = ?child.id(), "Worker process started");

        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(drive_process(
            id,
            child,
            stdin,
            stdout,
            request,
            tx,
            shutdown_rx,
            self.exit_grace,
        ));

        Ok(UnitHandle::new(id, rx, Some(shutdown_tx)))
    }
}

/// Feed the request to a worker process and translate everything it does into events.
///
/// Events are emitted in the order they happen: responses first, then the exit
/// status once the process is reaped.
#[allow(clippy::too_many_arguments)]
async fn drive_process(
    id: UnitId,
    mut child: Child,
    mut stdin: ChildStdin,
    stdout: ChildStdout,
    request: ComputationRequest,
    events: mpsc::UnboundedSender<UnitEvent>,
    mut shutdown: oneshot::Receiver<()>,
    exit_grace: Duration,
) {
    if let Err(e) = send_request(&mut stdin, request).await {
        // Broken pipe here usually means the program died at startup; the
        // exit status below carries the real cause.
        tracing::debug!(unit = %id, error = %e, "Failed to send request to worker");
    }
    drop(stdin);

    let mut lines = BufReader::new(stdout).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => {
                    let _ = events.send(parse_response(&line));
                }
                Ok(None) => break,
                Err(e) => {
                    let _ = events.send(UnitEvent::Error(format!("Failed to read from worker: {}", e)));
                    break;
                }
            },
            _ = &mut shutdown => {
                tracing::trace!(unit = %id, "Shutdown requested");
                break;
            }
        }
    }

    let exit = match stop(&mut child, exit_grace).await {
        Ok(status) => UnitExit::from(status),
        Err(e) => {
            let _ = events.send(UnitEvent::Error(format!("Failed to reap worker: {}", e)));
            return;
        }
    };
    tracing::debug!(unit = %id, %exit, "Worker process exited");
    let _ = events.send(UnitEvent::Exit(exit));
}

async fn send_request(stdin: &mut ChildStdin, request: ComputationRequest) -> Result<()> {
    let line = WorkRequest::compute(request.limit()).to_line()?;
    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await?;
    Ok(())
}

/// Map one stdout line to a unit event.
fn parse_response(line: &str) -> UnitEvent {
    match WorkResponse::from_line(line) {
        Ok(WorkResponse::Result {
            primes,
            duration_ms,
        }) => UnitEvent::Message(ComputationResult {
            primes,
            duration_ms,
        }),
        Ok(WorkResponse::Error { message }) => UnitEvent::Error(message),
        Err(e) => UnitEvent::Error(format!("Invalid worker response: {}", e)),
    }
}

/// Wait up to `grace` for the process to exit, then kill it.
async fn stop(child: &mut Child, grace: Duration) -> std::io::Result<std::process::ExitStatus> {
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            tracing::warn!(pid = ?child.id(), "Worker did not exit in time, killing it");
            child.start_kill()?;
            child.wait().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(body: &str) -> ProcessSpawner {
        ProcessSpawner::new("sh", vec!["-c".to_string(), body.to_string()])
            .with_exit_grace(Duration::from_millis(500))
    }

    async fn collect(mut handle: UnitHandle) -> Vec<UnitEvent> {
        let mut events = Vec::new();
        while let Some(event) = handle.next_event().await {
            events.push(event);
        }
        events
    }

    fn request(limit: i64) -> ComputationRequest {
        ComputationRequest::new(limit).unwrap()
    }

    #[tokio::test]
    async fn test_result_line_then_clean_exit() {
        let spawner = script(
            r#"read req; echo '{"type":"result","primes":[2,3,5,7],"duration_ms":0.5}'"#,
        );
        let events = collect(spawner.spawn(UnitId(1), request(10)).unwrap()).await;

        assert_eq!(
            events,
            vec![
                UnitEvent::Message(ComputationResult {
                    primes: vec![2, 3, 5, 7],
                    duration_ms: 0.5,
                }),
                UnitEvent::Exit(UnitExit::code(0)),
            ]
        );
    }

    #[tokio::test]
    async fn test_request_line_reaches_worker() {
        // Echo the request back inside an error message.
        let spawner = script(r#"read req; printf '{"type":"error","message":"%s"}\n' "$(echo "$req" | tr -d '"')""#);
        let events = collect(spawner.spawn(UnitId(2), request(42)).unwrap()).await;

        match &events[0] {
            UnitEvent::Error(msg) => {
                assert!(msg.contains("compute"));
                assert!(msg.contains("42"));
            }
            other => panic!("Expected Error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_line_then_failure_exit() {
        let spawner = script(r#"read req; echo '{"type":"error","message":"boom"}'; exit 1"#);
        let events = collect(spawner.spawn(UnitId(3), request(10)).unwrap()).await;

        assert_eq!(
            events,
            vec![
                UnitEvent::Error("boom".to_string()),
                UnitEvent::Exit(UnitExit::code(1)),
            ]
        );
    }

    #[tokio::test]
    async fn test_killed_worker_reports_signal() {
        let spawner = script("kill -9 $$");
        let events = collect(spawner.spawn(UnitId(4), request(10)).unwrap()).await;

        assert_eq!(events, vec![UnitEvent::Exit(UnitExit::signal(9))]);
    }

    #[tokio::test]
    async fn test_garbage_output_is_an_error_event() {
        let spawner = script("read req; echo 'segfault incoming'; exit 0");
        let events = collect(spawner.spawn(UnitId(5), request(10)).unwrap()).await;

        assert!(matches!(&events[0], UnitEvent::Error(msg) if msg.contains("Invalid worker response")));
        assert_eq!(events.last(), Some(&UnitEvent::Exit(UnitExit::code(0))));
    }

    #[tokio::test]
    async fn test_shutdown_kills_lingering_worker() {
        let spawner = script(
            r#"read req; echo '{"type":"result","primes":[2],"duration_ms":0.0}'; exec sleep 30"#,
        )
        .with_exit_grace(Duration::from_millis(100));
        let mut handle = spawner.spawn(UnitId(6), request(2)).unwrap();

        let first = handle.next_event().await;
        assert!(matches!(first, Some(UnitEvent::Message(_))));

        handle.shutdown();
        let exit = tokio::time::timeout(Duration::from_secs(10), handle.next_event())
            .await
            .expect("worker was not stopped");
        assert_eq!(exit, Some(UnitEvent::Exit(UnitExit::signal(9))));
    }

    #[tokio::test]
    async fn test_shutdown_after_error_kills_lingering_worker() {
        let spawner = script("read req; echo garbage; exec sleep 30")
            .with_exit_grace(Duration::from_millis(100));
        let mut handle = spawner.spawn(UnitId(8), request(10)).unwrap();

        let first = handle.next_event().await;
        assert!(matches!(first, Some(UnitEvent::Error(_))));

        handle.shutdown();
        let exit = tokio::time::timeout(Duration::from_secs(10), handle.next_event())
            .await
            .expect("worker was not stopped");
        assert_eq!(exit, Some(UnitEvent::Exit(UnitExit::signal(9))));
    }

    #[tokio::test]
    async fn test_dispatcher_reaps_worker_that_errors_and_lingers() {
        use crate::dispatcher::{Dispatcher, DispatcherConfig};
        use std::sync::Arc;

        // The worker records its pid, then reports an error and hangs.
        let pid_file = std::env::temp_dir()
            .join(format!("primes-api-unit-{}.pid", std::process::id()));
        let body = format!(
            r#"echo $$ > {}; read req; echo '{{"type":"error","message":"boom"}}'; exec sleep 30"#,
            pid_file.display()
        );
        let spawner = script(&body).with_exit_grace(Duration::from_millis(100));
        let dispatcher = Dispatcher::new(Arc::new(spawner), DispatcherConfig { worker_capacity: 1 });

        let submission = dispatcher.submit(10).unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(10), submission)
            .await
            .expect("submission never resolved");
        assert!(outcome.is_err());

        let pid: i32 = std::fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
        let _ = std::fs::remove_file(&pid_file);
        let pid = nix::unistd::Pid::from_raw(pid);

        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        // Signal 0 only checks whether the process still exists.
        while nix::sys::signal::kill(pid, None::<nix::sys::signal::Signal>).is_ok() {
            assert!(std::time::Instant::now() < deadline, "worker still running");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let spawner = ProcessSpawner::new("/nonexistent/primes-worker", Vec::new());
        let err = spawner.spawn(UnitId(7), request(10)).err().unwrap();
        assert!(matches!(err, PrimesError::SpawnFailed(_)));
    }
}
