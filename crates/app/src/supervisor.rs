use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stagehand_foundation::WorkerState;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::time::timeout;

const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Which worker class a `Start`/`Stop`/`Status` call addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerKind {
    ScriptPointer,
    Tracking,
}

impl WorkerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerKind::ScriptPointer => "script-pointer",
            WorkerKind::Tracking => "tracking",
        }
    }
}

/// One line of the worker's stdout IPC channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum WorkerStatusMessage {
    Started,
    Stopped,
    Failed { reason: String },
}

struct ManagedWorker {
    child: Child,
    stdin: ChildStdin,
    state: WorkerState,
}

/// C10: spawns each worker class as an isolated OS process so that an
/// inference panic or native-library fault in one pipeline cannot take down
/// the supervisor or the other pipeline.
pub struct ProcessSupervisor {
    exe_path: std::path::PathBuf,
    settings_path: std::path::PathBuf,
    workers: HashMap<WorkerKind, ManagedWorker>,
}

impl ProcessSupervisor {
    pub fn new(exe_path: std::path::PathBuf, settings_path: std::path::PathBuf) -> Self {
        Self {
            exe_path,
            settings_path,
            workers: HashMap::new(),
        }
    }

    /// Spawns `kind` as a child process re-executing this binary with
    /// `--worker <kind> --settings <path>`, and awaits its first `Started`
    /// or `Failed` status line. Returns `success=false` without spawning if
    /// the worker is already alive.
    pub async fn start(&mut self, kind: WorkerKind) -> bool {
        if self.workers.contains_key(&kind) {
            tracing::warn!(worker = kind.as_str(), "start requested but already alive");
            return false;
        }

        let mut command = tokio::process::Command::new(&self.exe_path);
        command
            .arg("--worker")
            .arg(kind.as_str())
            .arg("--settings")
            .arg(&self.settings_path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit());

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                tracing::error!(worker = kind.as_str(), error = %err, "failed to spawn worker");
                return false;
            }
        };

        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");
        let mut lines = BufReader::new(stdout).lines();

        let ack = timeout(Duration::from_secs(10), lines.next_line()).await;
        let (state, ok) = match ack {
            Ok(Ok(Some(line))) => match serde_json::from_str::<WorkerStatusMessage>(&line) {
                Ok(WorkerStatusMessage::Started) => (WorkerState::Running, true),
                Ok(WorkerStatusMessage::Failed { reason }) => {
                    (WorkerState::Failed { reason }, false)
                }
                _ => (
                    WorkerState::Failed {
                        reason: "malformed status line".to_string(),
                    },
                    false,
                ),
            },
            _ => (
                WorkerState::Failed {
                    reason: "worker did not acknowledge start in time".to_string(),
                },
                false,
            ),
        };

        self.workers.insert(
            kind,
            ManagedWorker {
                child,
                stdin,
                state,
            },
        );
        ok
    }

    /// Signals cancellation, awaits a `Stopped` acknowledgement up to
    /// `STOP_TIMEOUT`, then hard-kills the process if it hasn't exited.
    pub async fn stop(&mut self, kind: WorkerKind) -> bool {
        let Some(worker) = self.workers.get_mut(&kind) else {
            return false;
        };

        if worker.stdin.write_all(b"{\"cmd\":\"stop\"}\n").await.is_err() {
            tracing::warn!(worker = kind.as_str(), "failed to signal stop, killing");
        }

        let wait = timeout(STOP_TIMEOUT, worker.child.wait()).await;
        match wait {
            Ok(Ok(_)) => {
                worker.state = WorkerState::Stopped;
            }
            _ => {
                tracing::warn!(worker = kind.as_str(), "stop timed out, hard-killing");
                let _ = worker.child.kill().await;
                worker.state = WorkerState::Stopped;
            }
        }

        self.workers.remove(&kind);
        true
    }

    pub fn status(&self) -> HashMap<WorkerKind, WorkerState> {
        self.workers
            .iter()
            .map(|(kind, worker)| (*kind, worker.state.clone()))
            .collect()
    }
}

/// Prints a status line on stdout, the worker side of the supervisor IPC
/// channel.
pub fn emit_status(status: &WorkerStatusMessage) {
    println!("{}", serde_json::to_string(status).unwrap());
}

/// Spawns a task that reads `{"cmd":"stop"}` lines from stdin and requests
/// shutdown via `shutdown` once one arrives. Runs inside a worker process.
pub fn spawn_stop_listener(shutdown: stagehand_foundation::ShutdownHandler) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.contains("\"stop\"") {
                shutdown.request();
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn worker_kind_as_str_matches_cli_values() {
        assert_eq!(WorkerKind::ScriptPointer.as_str(), "script-pointer");
        assert_eq!(WorkerKind::Tracking.as_str(), "tracking");
    }

    #[test]
    fn status_message_round_trips_through_json() {
        let started = serde_json::to_string(&WorkerStatusMessage::Started).unwrap();
        assert_eq!(started, r#"{"status":"Started"}"#);
        let parsed: WorkerStatusMessage = serde_json::from_str(&started).unwrap();
        assert!(matches!(parsed, WorkerStatusMessage::Started));

        let failed = WorkerStatusMessage::Failed {
            reason: "device not found".to_string(),
        };
        let encoded = serde_json::to_string(&failed).unwrap();
        let parsed: WorkerStatusMessage = serde_json::from_str(&encoded).unwrap();
        match parsed {
            WorkerStatusMessage::Failed { reason } => assert_eq!(reason, "device not found"),
            _ => panic!("expected Failed variant"),
        }
    }

    #[test]
    fn new_supervisor_reports_empty_status() {
        let supervisor = ProcessSupervisor::new(PathBuf::from("/bin/true"), PathBuf::from("settings.json"));
        assert!(supervisor.status().is_empty());
    }

    #[tokio::test]
    async fn stop_on_unknown_worker_is_a_no_op_false() {
        let mut supervisor = ProcessSupervisor::new(PathBuf::from("/bin/true"), PathBuf::from("settings.json"));
        assert!(!supervisor.stop(WorkerKind::Tracking).await);
    }
}
