/*
   PAM password authentication backend
   Copyright (C) The pamauth contributors 2026

   This program is free software; you can redistribute it and/or modify
   it under the terms of the GNU General Public License as published by
   the Free Software Foundation; either version 3 of the License, or
   (at your option) any later version.

   This program is distributed in the hope that it will be useful,
   but WITHOUT ANY WARRANTY; without even the implied warranty of
   MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
   GNU General Public License for more details.

   You should have received a copy of the GNU General Public License
   along with this program.  If not, see <http://www.gnu.org/licenses/>.
*/
//! Running the isolated worker process.
use std::ffi::OsString;
use std::fmt;
use std::io::{self, Read};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use pamauth_unix_common::constants::WORKER_EXIT_SUCCESS;
use zeroize::Zeroizing;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// How long the readers get to hit EOF once the process group is killed.
const KILL_GRACE: Duration = Duration::from_millis(500);
/// Diagnostics beyond this are drained and discarded.
const MAX_CAPTURE_BYTES: usize = 64 * 1024;
const READ_CHUNK: usize = 4096;

/// Everything needed to start one worker. Credentials travel in `env` only.
#[derive(Clone)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub env: Vec<(&'static str, Zeroizing<String>)>,
    pub timeout: Duration,
}

impl fmt::Debug for WorkerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env: Vec<&str> = self.env.iter().map(|(k, _)| *k).collect();
        f.debug_struct("WorkerCommand")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("env", &env)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    Exited(i32),
    Signalled(i32),
    TimedOut,
}

impl WorkerOutcome {
    pub fn is_success(self) -> bool {
        self == WorkerOutcome::Exited(i32::from(WORKER_EXIT_SUCCESS))
    }
}

impl fmt::Display for WorkerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerOutcome::Exited(code) => write!(f, "exited with status {}", code),
            WorkerOutcome::Signalled(sig) => write!(f, "killed by signal {}", sig),
            WorkerOutcome::TimedOut => write!(f, "timed out"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOutput {
    pub outcome: WorkerOutcome,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl WorkerOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Starts a worker and blocks until it finishes.
pub trait WorkerSpawner {
    fn run(&self, cmd: &WorkerCommand) -> io::Result<WorkerOutput>;
}

impl<T: WorkerSpawner + ?Sized> WorkerSpawner for &T {
    fn run(&self, cmd: &WorkerCommand) -> io::Result<WorkerOutput> {
        (**self).run(cmd)
    }
}

/// Spawns real child processes.
///
/// Each worker leads its own process group, so anything it forks is killed
/// along with it. The whole call, including collecting output, is bounded
/// by the command's timeout plus a short grace after a kill.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessSpawner;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// A chunk read from one of the pipes, or `None` once it reached EOF.
type Chunk = (Stream, Option<Vec<u8>>);

fn drain<R: Read + Send + 'static>(pipe: Option<R>, stream: Stream, tx: &Sender<Chunk>) -> usize {
    let Some(mut pipe) = pipe else {
        return 0;
    };
    let tx = tx.clone();
    thread::spawn(move || {
        let mut buf = [0u8; READ_CHUNK];
        let mut kept = 0;
        loop {
            match pipe.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    // Keep reading past the cap so the worker never blocks
                    // on a full pipe.
                    let take = n.min(MAX_CAPTURE_BYTES - kept);
                    if take > 0 {
                        kept += take;
                        if tx.send((stream, Some(buf[..take].to_vec()))).is_err() {
                            break;
                        }
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        let _ = tx.send((stream, None));
    });
    1
}

/// Output gathered from the reader threads.
struct Capture {
    rx: Receiver<Chunk>,
    open: usize,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl Capture {
    /// Gather chunks until both pipes are closed or `deadline` passes.
    /// Returns true when both pipes reached EOF.
    fn collect_until(&mut self, deadline: Instant) -> bool {
        while self.open > 0 {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(left) {
                Ok((Stream::Stdout, Some(chunk))) => self.stdout.extend_from_slice(&chunk),
                Ok((Stream::Stderr, Some(chunk))) => self.stderr.extend_from_slice(&chunk),
                Ok((_, None)) => self.open -= 1,
                Err(_) => break,
            }
        }
        self.open == 0
    }
}

fn outcome_from_status(status: ExitStatus) -> WorkerOutcome {
    match status.code() {
        Some(code) => WorkerOutcome::Exited(code),
        None => WorkerOutcome::Signalled(status.signal().unwrap_or_default()),
    }
}

/// SIGKILL every process in the worker's group. The group id is the
/// worker's pid.
fn kill_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    unsafe {
        libc::killpg(pgid, libc::SIGKILL);
    }
}

fn reap(child: &mut Child) {
    kill_group(child.id());
    let _ = child.kill();
    let _ = child.wait();
}

impl WorkerSpawner for ProcessSpawner {
    fn run(&self, cmd: &WorkerCommand) -> io::Result<WorkerOutput> {
        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);
        for (key, value) in &cmd.env {
            command.env(key, value.as_str());
        }

        let mut child = command.spawn()?;
        let pgid = child.id();
        let start = Instant::now();
        let deadline = start + cmd.timeout;

        let (tx, rx) = mpsc::channel();
        let open = drain(child.stdout.take(), Stream::Stdout, &tx)
            + drain(child.stderr.take(), Stream::Stderr, &tx);
        drop(tx);
        let mut capture = Capture {
            rx,
            open,
            stdout: Vec::new(),
            stderr: Vec::new(),
        };

        let outcome = loop {
            match child.try_wait() {
                Ok(Some(status)) => break outcome_from_status(status),
                Ok(None) if start.elapsed() >= cmd.timeout => {
                    warn!(
                        pid = pgid,
                        "Worker did not finish within {:?}, killing it", cmd.timeout
                    );
                    reap(&mut child);
                    break WorkerOutcome::TimedOut;
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    reap(&mut child);
                    return Err(e);
                }
            }
        };

        if outcome == WorkerOutcome::TimedOut {
            capture.collect_until(Instant::now() + KILL_GRACE);
        } else if !capture.collect_until(deadline) {
            // The worker is gone but something it started still holds the
            // pipes open.
            warn!(
                pid = pgid,
                "Worker left processes holding its output open, killing them"
            );
            kill_group(pgid);
            capture.collect_until(Instant::now() + KILL_GRACE);
        }

        Ok(WorkerOutput {
            outcome,
            stdout: capture.stdout,
            stderr: capture.stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> WorkerCommand {
        WorkerCommand {
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".into(), script.into()],
            env: vec![("PAMAUTH_TEST_VALUE", Zeroizing::new("hunter2".to_string()))],
            timeout,
        }
    }

    #[test]
    fn test_exit_codes() {
        for code in [0, 1, 2, 42] {
            let out = ProcessSpawner
                .run(&sh(&format!("exit {}", code), Duration::from_secs(10)))
                .unwrap();
            assert_eq!(out.outcome, WorkerOutcome::Exited(code));
            assert_eq!(out.outcome.is_success(), code == 0);
        }
    }

    #[test]
    fn test_signal() {
        let out = ProcessSpawner
            .run(&sh("kill -9 $$", Duration::from_secs(10)))
            .unwrap();
        assert_eq!(out.outcome, WorkerOutcome::Signalled(9));
        assert!(!out.outcome.is_success());
    }

    #[test]
    fn test_captures_output_and_env() {
        let out = ProcessSpawner
            .run(&sh(
                "printf '%s' \"$PAMAUTH_TEST_VALUE\"; echo oops >&2; exit 1",
                Duration::from_secs(10),
            ))
            .unwrap();
        assert_eq!(out.outcome, WorkerOutcome::Exited(1));
        assert_eq!(out.stdout_lossy(), "hunter2");
        assert_eq!(out.stderr_lossy(), "oops");
    }

    #[test]
    fn test_timeout_kills_worker() {
        let start = Instant::now();
        let out = ProcessSpawner
            .run(&sh("exec sleep 30", Duration::from_millis(200)))
            .unwrap();
        assert_eq!(out.outcome, WorkerOutcome::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_lingering_descendant_does_not_extend_wait() {
        let start = Instant::now();
        let out = ProcessSpawner
            .run(&sh("echo started; sleep 5 & exit 0", Duration::from_millis(200)))
            .unwrap();
        assert!(start.elapsed() < Duration::from_secs(3));
        assert_eq!(out.outcome, WorkerOutcome::Exited(0));
        assert_eq!(out.stdout_lossy(), "started");
    }

    #[test]
    fn test_timeout_kills_descendants() {
        let start = Instant::now();
        let out = ProcessSpawner
            .run(&sh(
                "echo started; sleep 30 & sleep 30",
                Duration::from_millis(200),
            ))
            .unwrap();
        assert!(start.elapsed() < Duration::from_secs(3));
        assert_eq!(out.outcome, WorkerOutcome::TimedOut);
        assert_eq!(out.stdout_lossy(), "started");
    }

    #[test]
    fn test_capture_is_capped() {
        let out = ProcessSpawner
            .run(&sh(
                "head -c 200000 /dev/zero; exit 1",
                Duration::from_secs(10),
            ))
            .unwrap();
        assert_eq!(out.outcome, WorkerOutcome::Exited(1));
        assert_eq!(out.stdout.len(), MAX_CAPTURE_BYTES);
    }

    #[test]
    fn test_missing_program() {
        let cmd = WorkerCommand {
            program: PathBuf::from("/nonexistent/pamauth_worker"),
            args: vec![],
            env: vec![],
            timeout: Duration::from_secs(1),
        };
        assert!(ProcessSpawner.run(&cmd).is_err());
    }

    #[test]
    fn test_debug_hides_env_values() {
        let printed = format!("{:?}", sh("true", Duration::from_secs(1)));
        assert!(printed.contains("PAMAUTH_TEST_VALUE"));
        assert!(!printed.contains("hunter2"));
    }
}
