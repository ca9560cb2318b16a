//! Process execution primitives.

use bench_common::{BenchError, BenchResult, NodeIndex};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::debug;

/// Spawn a node process with stdout and stderr piped back to the harness.
///
/// Stdin is closed. The child is killed if its handle is dropped without
/// being reaped. On Unix the child gets its own process group so a terminal
/// Ctrl+C reaches only the harness, which then stops its children itself.
pub fn spawn_piped(node: NodeIndex, executable: &str, args: &[String]) -> BenchResult<Child> {
    let mut cmd = Command::new(executable);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    let child = cmd
        .spawn()
        .map_err(|e| BenchError::spawn(node, format!("{}: {}", executable, e)))?;

    debug!(node = %node, pid = ?child.id(), "Spawned node process");
    Ok(child)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_spawn_captures_stdout() {
        let mut child = spawn_piped(
            NodeIndex::new(1),
            "sh",
            &["-c".to_string(), "echo hello".to_string()],
        )
        .unwrap();

        let mut stdout = child.stdout.take().unwrap();
        let mut output = String::new();
        stdout.read_to_string(&mut output).await.unwrap();
        assert_eq!(output.trim(), "hello");
        assert!(child.wait().await.unwrap().success());
    }

    #[tokio::test]
    async fn test_spawn_missing_executable() {
        let err = spawn_piped(NodeIndex::new(4), "/definitely/not/here", &[]).unwrap_err();
        match err {
            BenchError::Spawn { node, reason } => {
                assert_eq!(node.get(), 4);
                assert!(reason.contains("/definitely/not/here"));
            }
            other => panic!("Wrong error type: {:?}", other),
        }
    }
}
