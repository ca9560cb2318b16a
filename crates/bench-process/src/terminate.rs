//! Process termination primitives.

use bench_common::{BenchError, BenchResult};

/// Ask a process to stop (SIGTERM).
pub fn terminate_gracefully(pid: u32) -> BenchResult<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
            .map_err(|e| BenchError::termination(pid, e.to_string()))
    }

    #[cfg(not(unix))]
    {
        Err(BenchError::termination(
            pid,
            "graceful termination is only supported on Unix",
        ))
    }
}

/// Force kill a process (SIGKILL).
pub fn force_kill(pid: u32) -> BenchResult<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        kill(Pid::from_raw(pid as i32), Signal::SIGKILL)
            .map_err(|e| BenchError::termination(pid, e.to_string()))
    }

    #[cfg(not(unix))]
    {
        Err(BenchError::termination(
            pid,
            "pid-based kill is only supported on Unix",
        ))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_terminate_gracefully_stops_sleeper() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();

        terminate_gracefully(pid).unwrap();
        let status = tokio::time::timeout(Duration::from_secs(5), child.wait())
            .await
            .expect("sleep did not exit after SIGTERM")
            .unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn test_force_kill() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();

        force_kill(pid).unwrap();
        let status = tokio::time::timeout(Duration::from_secs(5), child.wait())
            .await
            .expect("sleep did not exit after SIGKILL")
            .unwrap();
        assert!(!status.success());
    }
}
