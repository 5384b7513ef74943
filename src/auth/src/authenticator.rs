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
//! The credential submitter.
//!
//! Each call to [`PamAuthenticator::authenticate`] starts one fresh worker
//! process, hands it the credentials through its environment and reads the
//! verdict from its exit status. The calling process never loads libpam,
//! so native libraries bundled with it cannot clash with the system PAM
//! stack.
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use zeroize::Zeroizing;

use pamauth_unix_common::config::PamAuthConfig;
use pamauth_unix_common::constants::{
    ENV_DEBUG, ENV_PROBE, SUPERUSER_NAME, SYSTEM_WORKER_PATH, WORKER_BINARY_NAME,
};
use pamauth_unix_common::envelope::CredentialEnvelope;

use crate::spawner::{ProcessSpawner, WorkerCommand, WorkerOutput, WorkerSpawner};
use crate::BackendError;

fn flag_value(on: bool) -> Zeroizing<String> {
    Zeroizing::new(if on { "1" } else { "0" }.to_string())
}

/// Pick the worker executable: the configured override, then the system
/// install location, then a `pamauth_worker` next to the running binary.
pub fn find_worker(cfg: &PamAuthConfig) -> PathBuf {
    if let Some(path) = cfg.get_worker_path() {
        return PathBuf::from(path);
    }
    let system = Path::new(SYSTEM_WORKER_PATH);
    if system.exists() {
        return system.to_path_buf();
    }
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join(WORKER_BINARY_NAME))
            .unwrap_or_else(|| PathBuf::from(WORKER_BINARY_NAME)),
        Err(e) => {
            debug!(?e, "Unable to determine the running executable");
            PathBuf::from(WORKER_BINARY_NAME)
        }
    }
}

/// [`find_worker`], canonicalized. Fails when the worker does not exist.
pub fn resolve_worker(cfg: &PamAuthConfig) -> Result<PathBuf, BackendError> {
    let candidate = find_worker(cfg);
    fs::canonicalize(&candidate).map_err(|_| BackendError::WorkerMissing(candidate))
}

pub struct PamAuthenticator<S: WorkerSpawner = ProcessSpawner> {
    cfg: PamAuthConfig,
    spawner: S,
}

impl PamAuthenticator<ProcessSpawner> {
    pub fn new(cfg: PamAuthConfig) -> Self {
        Self::with_spawner(cfg, ProcessSpawner)
    }
}

impl<S: WorkerSpawner> PamAuthenticator<S> {
    pub fn with_spawner(cfg: PamAuthConfig, spawner: S) -> Self {
        PamAuthenticator { cfg, spawner }
    }

    pub fn config(&self) -> &PamAuthConfig {
        &self.cfg
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.cfg.get_worker_timeout())
    }

    fn command(
        &self,
        program: PathBuf,
        mut env: Vec<(&'static str, Zeroizing<String>)>,
        probe: bool,
    ) -> WorkerCommand {
        // Always set explicitly so nothing inherited from this process can
        // change the worker's mode.
        env.push((ENV_PROBE, flag_value(probe)));
        env.push((ENV_DEBUG, flag_value(self.cfg.get_debug())));
        WorkerCommand {
            program,
            args: vec![],
            env,
            timeout: self.timeout(),
        }
    }

    fn run(&self, cmd: &WorkerCommand) -> Result<WorkerOutput, BackendError> {
        self.spawner
            .run(cmd)
            .map_err(|e| BackendError::Spawn(cmd.program.clone(), e))
    }

    /// Check, in a worker, that the native PAM libraries can be loaded.
    pub fn probe(&self) -> Result<(), BackendError> {
        let worker = resolve_worker(&self.cfg)?;
        let cmd = self.command(worker, vec![], true);
        let output = self.run(&cmd)?;
        if output.outcome.is_success() {
            Ok(())
        } else {
            Err(BackendError::Unavailable(format!(
                "worker {}: {} {}",
                output.outcome,
                output.stdout_lossy(),
                output.stderr_lossy()
            )))
        }
    }

    /// Returns true if the given username and password authenticate for the
    /// configured PAM service. Every failure, including configuration and
    /// worker faults, is logged and reported as false.
    pub fn authenticate(&self, username: &str, password: &str) -> bool {
        if username == SUPERUSER_NAME {
            warn!("PAM authentication of {} is not supported", SUPERUSER_NAME);
            return false;
        }

        let worker = match resolve_worker(&self.cfg) {
            Ok(worker) => worker,
            Err(e) => {
                error!("{}", e);
                return false;
            }
        };

        let envelope = CredentialEnvelope::new(
            username,
            password,
            &self.cfg.get_pam_service(),
            &self.cfg.get_encoding(),
        );
        let cmd = self.command(worker, envelope.to_env(), false);
        debug!(?cmd, username, service = %envelope.service, "Starting PAM worker");

        match self.run(&cmd) {
            Ok(output) if output.outcome.is_success() => {
                debug!(username, "PAM authentication succeeded");
                true
            }
            Ok(output) => {
                error!(
                    "Pam auth failed for {}: worker {}: {} {}",
                    username,
                    output.outcome,
                    output.stdout_lossy(),
                    output.stderr_lossy()
                );
                false
            }
            Err(e) => {
                error!("Pam auth failed for {}: {}", username, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spawner::WorkerOutcome;
    use pamauth_unix_common::constants::{
        ENV_PAM_ENCODING, ENV_PAM_PASSWORD, ENV_PAM_SERVICE, ENV_PAM_USERNAME,
    };
    use std::cell::RefCell;
    use std::io;

    /// Records every command instead of starting a process.
    struct FakeSpawner {
        outcome: WorkerOutcome,
        runs: RefCell<Vec<WorkerCommand>>,
    }

    impl FakeSpawner {
        fn new(outcome: WorkerOutcome) -> Self {
            FakeSpawner {
                outcome,
                runs: RefCell::new(vec![]),
            }
        }

        fn env_of(cmd: &WorkerCommand, key: &str) -> Option<String> {
            cmd.env
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    impl WorkerSpawner for FakeSpawner {
        fn run(&self, cmd: &WorkerCommand) -> io::Result<WorkerOutput> {
            self.runs.borrow_mut().push(cmd.clone());
            Ok(WorkerOutput {
                outcome: self.outcome,
                stdout: vec![],
                stderr: b"pam_authenticate failed".to_vec(),
            })
        }
    }

    fn create_temp_config(contents: &str) -> String {
        let file_path = format!("/tmp/pamauth_test_config_{}.ini", uuid::Uuid::new_v4());
        fs::write(&file_path, contents).expect("Failed to write temporary config file");
        file_path
    }

    /// A configuration whose worker is this test binary, which always exists.
    fn config_with_existing_worker() -> PamAuthConfig {
        let exe = env::current_exe().unwrap();
        let path = create_temp_config(&format!(
            "[pam]\nworker_path = {}\nencoding = utf-8\n",
            exe.display()
        ));
        let cfg = PamAuthConfig::new(Some(&path)).unwrap();
        let _ = fs::remove_file(path);
        cfg
    }

    #[test]
    fn test_exit_status_mapping() {
        for (outcome, expected) in [
            (WorkerOutcome::Exited(0), true),
            (WorkerOutcome::Exited(1), false),
            (WorkerOutcome::Exited(2), false),
            (WorkerOutcome::Exited(137), false),
            (WorkerOutcome::Signalled(9), false),
            (WorkerOutcome::TimedOut, false),
        ] {
            let spawner = FakeSpawner::new(outcome);
            let auth = PamAuthenticator::with_spawner(config_with_existing_worker(), &spawner);
            assert_eq!(auth.authenticate("alice", "correct-horse"), expected);
            assert_eq!(spawner.runs.borrow().len(), 1);
        }
    }

    #[test]
    fn test_credentials_only_in_environment() {
        let spawner = FakeSpawner::new(WorkerOutcome::Exited(0));
        let auth = PamAuthenticator::with_spawner(config_with_existing_worker(), &spawner);
        assert!(auth.authenticate("alice", "correct-horse"));

        let runs = spawner.runs.borrow();
        let cmd = &runs[0];
        assert!(cmd.args.is_empty());
        assert!(!cmd.program.to_string_lossy().contains("correct-horse"));
        for arg in &cmd.args {
            assert!(!arg.to_string_lossy().contains("correct-horse"));
        }
        assert_eq!(
            FakeSpawner::env_of(cmd, ENV_PAM_USERNAME).as_deref(),
            Some("alice")
        );
        assert_eq!(
            FakeSpawner::env_of(cmd, ENV_PAM_PASSWORD).as_deref(),
            Some("correct-horse")
        );
        assert_eq!(
            FakeSpawner::env_of(cmd, ENV_PAM_SERVICE).as_deref(),
            Some("login")
        );
        assert_eq!(
            FakeSpawner::env_of(cmd, ENV_PAM_ENCODING).as_deref(),
            Some("utf-8")
        );
        assert_eq!(FakeSpawner::env_of(cmd, ENV_PROBE).as_deref(), Some("0"));
        assert_eq!(cmd.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_missing_worker_never_spawns() {
        let path = create_temp_config("[pam]\nworker_path = /nonexistent/pamauth_worker\n");
        let cfg = PamAuthConfig::new(Some(&path)).unwrap();
        let _ = fs::remove_file(path);

        let spawner = FakeSpawner::new(WorkerOutcome::Exited(0));
        let auth = PamAuthenticator::with_spawner(cfg, &spawner);
        assert!(!auth.authenticate("alice", "correct-horse"));
        assert_eq!(spawner.runs.borrow().len(), 0);
        assert!(matches!(auth.probe(), Err(BackendError::WorkerMissing(_))));
        assert_eq!(spawner.runs.borrow().len(), 0);
    }

    #[test]
    fn test_superuser_refused() {
        let spawner = FakeSpawner::new(WorkerOutcome::Exited(0));
        let auth = PamAuthenticator::with_spawner(config_with_existing_worker(), &spawner);
        assert!(!auth.authenticate("root", "anything"));
        assert_eq!(spawner.runs.borrow().len(), 0);
    }

    #[test]
    fn test_probe() {
        let spawner = FakeSpawner::new(WorkerOutcome::Exited(0));
        let auth = PamAuthenticator::with_spawner(config_with_existing_worker(), &spawner);
        assert!(auth.probe().is_ok());
        let runs = spawner.runs.borrow();
        assert_eq!(FakeSpawner::env_of(&runs[0], ENV_PROBE).as_deref(), Some("1"));
        assert_eq!(FakeSpawner::env_of(&runs[0], ENV_PAM_PASSWORD), None);

        let spawner = FakeSpawner::new(WorkerOutcome::Exited(1));
        let auth = PamAuthenticator::with_spawner(config_with_existing_worker(), &spawner);
        assert!(matches!(auth.probe(), Err(BackendError::Unavailable(_))));
    }

    #[test]
    fn test_find_worker_prefers_override() {
        let path = create_temp_config("[pam]\nworker_path = /opt/custom/worker\n");
        let cfg = PamAuthConfig::new(Some(&path)).unwrap();
        let _ = fs::remove_file(path);
        assert_eq!(find_worker(&cfg), PathBuf::from("/opt/custom/worker"));
    }

    #[test]
    fn test_real_worker_protocol() {
        use std::os::unix::fs::PermissionsExt;

        // A stand-in worker honouring the environment contract.
        let script = format!("/tmp/pamauth_test_worker_{}.sh", uuid::Uuid::new_v4());
        fs::write(
            &script,
            "#!/bin/sh\n\
             [ \"$#\" -eq 0 ] || exit 2\n\
             [ \"$PAMAUTH_PROBE\" = 0 ] || exit 3\n\
             [ \"$PAMAUTH_PAM_SERVICE\" = login ] || exit 4\n\
             [ \"$PAMAUTH_PAM_USERNAME\" = alice ] || exit 5\n\
             [ \"$PAMAUTH_PAM_PASSWORD\" = correct-horse ] && exit 0\n\
             echo 'Authentication failure' >&2\n\
             exit 1\n",
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o700)).unwrap();

        let path = create_temp_config(&format!("[pam]\nworker_path = {}\n", script));
        let cfg = PamAuthConfig::new(Some(&path)).unwrap();
        let _ = fs::remove_file(path);
        let auth = PamAuthenticator::new(cfg);

        // Executing a freshly written file can race with a concurrent fork
        // in another test thread (ETXTBSY), so retry a few times.
        let mut accepted = false;
        for _ in 0..5 {
            accepted = auth.authenticate("alice", "correct-horse");
            if accepted {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        assert!(accepted);
        assert!(!auth.authenticate("alice", "short"));
        assert!(!auth.authenticate("alice", "correct-horsf"));
        assert!(!auth.authenticate("bob", "correct-horse"));
        let _ = fs::remove_file(script);
    }
}
