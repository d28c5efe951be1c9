//! Nameserver reload triggers.

use std::process::Command;

use tracing::{error, info, warn};

use crate::config::ReloadConfig;
use crate::error::WatchdogError;
use crate::metrics;

/// Tells the nameserver to pick up a freshly written zone set.
pub trait ReloadTrigger: Send + Sync {
    /// Trigger a reload.
    fn reload(&self) -> Result<(), WatchdogError>;
}

/// Runs a shell command via `sh -c`.
#[derive(Debug, Clone)]
pub struct ShellReload {
    command: String,
}

impl ShellReload {
    /// Create a trigger for `command`.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// The command line.
    pub fn command(&self) -> &str {
        &self.command
    }
}

impl ReloadTrigger for ShellReload {
    fn reload(&self) -> Result<(), WatchdogError> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .output()
            .map_err(|e| WatchdogError::ReloadTrigger(format!("{:?}: {e}", self.command)))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            warn!(command = %self.command, stderr = %stderr.trim(), "Reload command output");
        }
        Err(WatchdogError::ReloadTrigger(format!(
            "{:?} exited with {}",
            self.command, output.status
        )))
    }
}

/// Does nothing. Used when reloading is suppressed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReload;

impl ReloadTrigger for NoReload {
    fn reload(&self) -> Result<(), WatchdogError> {
        Ok(())
    }
}

/// Build the trigger described by `config`.
pub fn from_config(config: &ReloadConfig) -> Box<dyn ReloadTrigger> {
    if config.skip {
        info!("Nameserver reload disabled");
        Box::new(NoReload)
    } else {
        Box::new(ShellReload::new(&config.command))
    }
}

/// Run `trigger`, logging and counting the outcome.
///
/// A failure never touches the zone set that was just written.
pub fn run(trigger: &dyn ReloadTrigger) -> Result<(), WatchdogError> {
    let result = trigger.reload();
    metrics::record_reload(result.is_ok());
    match &result {
        Ok(()) => info!("Nameserver reload triggered"),
        Err(e) => error!("Nameserver reload failed: {}", e),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_successful_command() {
        assert!(ShellReload::new("true").reload().is_ok());
    }

    #[test]
    fn test_failing_command_is_reload_error() {
        let err = ShellReload::new("exit 3").reload().unwrap_err();
        assert!(matches!(err, WatchdogError::ReloadTrigger(_)));
        assert!(err.to_string().contains("exit 3"));
    }

    #[test]
    fn test_skip_uses_noop() {
        let trigger = from_config(&ReloadConfig {
            command: "exit 1".into(),
            skip: true,
        });
        assert!(trigger.reload().is_ok());
    }
}
