//! Notifying the package manager that the manifest changed
//!
//! After a successful manifest write the external package manager has to
//! re-resolve. sdkpm only fires the request; it never waits for resolution
//! and a failed notification never undoes the write.

use crate::{Error, Result};
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Receives a request to re-resolve packages after a manifest write
pub trait ResolveNotifier {
    fn request_resolve(&self) -> Result<()>;
}

/// Does nothing; the package manager picks the change up on its own
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl ResolveNotifier for NoopNotifier {
    fn request_resolve(&self) -> Result<()> {
        Ok(())
    }
}

/// Spawns a configured shell command and returns without waiting for it
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    command: String,
    working_dir: PathBuf,
}

impl CommandNotifier {
    pub fn new<P: Into<PathBuf>>(command: impl Into<String>, working_dir: P) -> Self {
        Self {
            command: command.into(),
            working_dir: working_dir.into(),
        }
    }
}

impl ResolveNotifier for CommandNotifier {
    fn request_resolve(&self) -> Result<()> {
        let (shell, flag) = if cfg!(windows) {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };

        Command::new(shell)
            .arg(flag)
            .arg(&self.command)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Other(format!("failed to spawn '{}': {}", self.command, e)))?;

        tracing::debug!(command = %self.command, "requested package re-resolution");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_notifier() {
        assert!(NoopNotifier.request_resolve().is_ok());
    }

    #[test]
    fn test_command_notifier_missing_dir_fails() {
        let notifier = CommandNotifier::new("true", "/definitely/not/a/dir/sdkpm");
        assert!(notifier.request_resolve().is_err());
    }
}
