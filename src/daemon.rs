//! External IPsec daemon control
//!
//! Wraps the `ipsec` command line tool: each action is one subprocess call
//! whose combined output is scanned for known failure signatures. The final
//! bring-up is driven through an explicit retry state machine so tests can
//! step attempts without sleeping.

use crate::error::{Result, SwitchError};
use std::time::Duration;
use tokio::process::Command;

/// Signature the daemon prints when the named connection is not loaded yet.
/// Typically a transient startup race right after a reload or restart.
const NOT_LOADED_SIGNATURE: &str = "no config named";

/// Handle on the external IPsec daemon
#[derive(Debug)]
pub struct IpsecDaemon {
    command: String,
    verbose: bool,
}

impl IpsecDaemon {
    /// Create a handle invoking the given command (normally `ipsec`)
    pub fn new(command: impl Into<String>, verbose: bool) -> Self {
        IpsecDaemon {
            command: command.into(),
            verbose,
        }
    }

    /// Tear down the named connection
    pub async fn down(&self, name: &str) -> Result<()> {
        self.run("down", Some(name)).await
    }

    /// Bring up the named connection, single attempt
    pub async fn up(&self, name: &str) -> Result<()> {
        self.run("up", Some(name)).await
    }

    /// Ask the daemon to reload its settings
    pub async fn reload(&self) -> Result<()> {
        self.run("reload", None).await
    }

    /// Restart the daemon
    pub async fn restart(&self) -> Result<()> {
        self.run("restart", None).await
    }

    async fn run(&self, action: &str, name: Option<&str>) -> Result<()> {
        let mut cmd = Command::new(&self.command);
        cmd.arg(action);
        if let Some(name) = name {
            cmd.arg(name);
        }

        let output = cmd.output().await.map_err(|e| SwitchError::Daemon {
            action: action.to_string(),
            output: format!("failed to launch {}: {e}", self.command),
        })?;

        let combined = combine_output(&output.stdout, &output.stderr);
        classify(action, name, output.status.success(), &combined)?;

        if self.verbose {
            log::info!("{} {action}: {}", self.command, combined.trim_end());
        } else {
            log::debug!("{} {action}: {}", self.command, combined.trim_end());
        }
        Ok(())
    }

    /// Bring the connection up, retrying until the daemon accepts it.
    ///
    /// The retry is unbounded on purpose: transient races after a reload or
    /// restart resolve within a few attempts, and anything worse is for an
    /// external supervisor to handle. Returns the attempt count.
    pub async fn bring_up(&self, name: &str, delay: Duration) -> u32 {
        let mut machine = BringUp::new(delay);
        loop {
            let result = self.up(name).await;
            match machine.on_attempt(&result) {
                None => break,
                Some(wait) => {
                    if let Err(err) = &result {
                        log::warn!("Connection error: {err}, retrying in {}s", wait.as_secs());
                    }
                    tokio::time::sleep(wait).await;
                }
            }
        }
        machine.attempts()
    }
}

/// Captured stdout followed by stderr, the way an operator would see it
fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut combined = String::from_utf8_lossy(stdout).into_owned();
    let err = String::from_utf8_lossy(stderr);
    if !err.is_empty() {
        if !combined.is_empty() && !combined.ends_with('\n') {
            combined.push('\n');
        }
        combined.push_str(&err);
    }
    combined
}

/// Map one action's exit status and combined output onto the error taxonomy
fn classify(action: &str, name: Option<&str>, exit_ok: bool, output: &str) -> Result<()> {
    if !exit_ok {
        return Err(SwitchError::Daemon {
            action: action.to_string(),
            output: output.trim_end().to_string(),
        });
    }

    if output.contains(NOT_LOADED_SIGNATURE) {
        return Err(SwitchError::ConfigNotLoaded(
            name.unwrap_or(action).to_string(),
        ));
    }

    Ok(())
}

/// States of the bring-up retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BringUpState {
    /// No attempt made yet
    Idle,
    /// The last attempt failed and the next one is pending
    Attempting { attempt: u32 },
    /// The daemon accepted the connection
    Succeeded { attempts: u32 },
}

/// Retry state machine for the final bring-up.
///
/// The machine only decides what happens after each attempt; the driver owns
/// the sleep.
#[derive(Debug, Clone)]
pub struct BringUp {
    state: BringUpState,
    delay: Duration,
}

impl BringUp {
    pub fn new(delay: Duration) -> Self {
        BringUp {
            state: BringUpState::Idle,
            delay,
        }
    }

    pub fn state(&self) -> BringUpState {
        self.state
    }

    /// Number of attempts recorded so far
    pub fn attempts(&self) -> u32 {
        match self.state {
            BringUpState::Idle => 0,
            BringUpState::Attempting { attempt } => attempt,
            BringUpState::Succeeded { attempts } => attempts,
        }
    }

    /// Record the outcome of one `up` attempt. Returns the delay to wait
    /// before the next attempt, or `None` once the connection is up. Every
    /// error retries; the loop has no failure exit.
    pub fn on_attempt<T>(&mut self, result: &Result<T>) -> Option<Duration> {
        let attempt = self.attempts() + 1;
        match result {
            Ok(_) => {
                self.state = BringUpState::Succeeded { attempts: attempt };
                None
            }
            Err(_) => {
                self.state = BringUpState::Attempting { attempt };
                Some(self.delay)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_success() {
        assert!(classify("up", Some("vpn1"), true, "connection 'vpn1' established").is_ok());
        assert!(classify("reload", None, true, "").is_ok());
    }

    #[test]
    fn test_classify_nonzero_exit() {
        let err = classify("up", Some("vpn1"), false, "initiation failed").unwrap_err();
        match err {
            SwitchError::Daemon { action, output } => {
                assert_eq!(action, "up");
                assert_eq!(output, "initiation failed");
            }
            other => panic!("expected Daemon error, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_unloaded_connection() {
        let err = classify("up", Some("vpn1"), true, "no config named vpn1").unwrap_err();
        assert!(matches!(err, SwitchError::ConfigNotLoaded(name) if name == "vpn1"));
    }

    #[test]
    fn test_combine_output() {
        assert_eq!(combine_output(b"out", b""), "out");
        assert_eq!(combine_output(b"", b"err"), "err");
        assert_eq!(combine_output(b"out", b"err"), "out\nerr");
        assert_eq!(combine_output(b"out\n", b"err"), "out\nerr");
    }

    #[test]
    fn test_bring_up_machine_transitions() {
        let delay = Duration::from_secs(3);
        let mut machine = BringUp::new(delay);
        assert_eq!(machine.state(), BringUpState::Idle);
        assert_eq!(machine.attempts(), 0);

        let failed: Result<()> = Err(SwitchError::ConfigNotLoaded("vpn1".to_string()));
        assert_eq!(machine.on_attempt(&failed), Some(delay));
        assert_eq!(machine.state(), BringUpState::Attempting { attempt: 1 });

        let failed: Result<()> = Err(SwitchError::Daemon {
            action: "up".to_string(),
            output: "busy".to_string(),
        });
        assert_eq!(machine.on_attempt(&failed), Some(delay));
        assert_eq!(machine.state(), BringUpState::Attempting { attempt: 2 });

        let ok: Result<()> = Ok(());
        assert_eq!(machine.on_attempt(&ok), None);
        assert_eq!(machine.state(), BringUpState::Succeeded { attempts: 3 });
        assert_eq!(machine.attempts(), 3);
    }

    #[test]
    fn test_bring_up_machine_immediate_success() {
        let mut machine = BringUp::new(Duration::from_secs(1));
        let ok: Result<()> = Ok(());
        assert_eq!(machine.on_attempt(&ok), None);
        assert_eq!(machine.state(), BringUpState::Succeeded { attempts: 1 });
    }

    #[cfg(unix)]
    mod subprocess {
        use super::*;
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        /// Writes an executable shell script standing in for the daemon
        fn fake_daemon(dir: &TempDir, body: &str) -> String {
            let path = dir.path().join("ipsec");
            let mut file = std::fs::File::create(&path).expect("Failed to create script");
            writeln!(file, "#!/bin/sh\n{body}").expect("Failed to write script");
            drop(file);

            let mut perms = std::fs::metadata(&path).expect("Failed to stat script").permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&path, perms).expect("Failed to chmod script");
            path.to_str().expect("Non-UTF8 temp path").to_string()
        }

        #[tokio::test]
        async fn test_up_succeeds_on_clean_exit() {
            let dir = TempDir::new().unwrap();
            let daemon = IpsecDaemon::new(fake_daemon(&dir, "echo connection established"), false);
            assert!(daemon.up("vpn1").await.is_ok());
        }

        #[tokio::test]
        async fn test_up_detects_unloaded_connection() {
            let dir = TempDir::new().unwrap();
            let daemon = IpsecDaemon::new(fake_daemon(&dir, "echo no config named \"$2\""), false);
            let err = daemon.up("vpn1").await.unwrap_err();
            assert!(matches!(err, SwitchError::ConfigNotLoaded(name) if name == "vpn1"));
        }

        #[tokio::test]
        async fn test_down_reports_nonzero_exit() {
            let dir = TempDir::new().unwrap();
            let daemon = IpsecDaemon::new(
                fake_daemon(&dir, "echo tunnel not found >&2\nexit 7"),
                false,
            );
            let err = daemon.down("vpn1").await.unwrap_err();
            match err {
                SwitchError::Daemon { action, output } => {
                    assert_eq!(action, "down");
                    assert!(output.contains("tunnel not found"));
                }
                other => panic!("expected Daemon error, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_launch_failure_is_daemon_error() {
            let daemon = IpsecDaemon::new("/nonexistent/ipsec-binary", false);
            let err = daemon.reload().await.unwrap_err();
            assert!(matches!(err, SwitchError::Daemon { .. }));
        }

        #[tokio::test]
        async fn test_bring_up_retries_until_success() {
            let dir = TempDir::new().unwrap();
            let marker = dir.path().join("loaded");
            // Fails with the transient signature once, then succeeds
            let body = format!(
                "if [ -e {marker} ]; then echo connection established; else touch {marker}; echo no config named \"$2\"; fi",
                marker = marker.display()
            );
            let daemon = IpsecDaemon::new(fake_daemon(&dir, &body), false);

            let attempts = daemon.bring_up("vpn1", Duration::from_millis(1)).await;
            assert_eq!(attempts, 2);
        }
    }
}
