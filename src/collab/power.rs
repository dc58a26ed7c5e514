//! Host shutdown and restart

use std::process::Command;

use tracing::warn;

/// Errors from host power commands
#[derive(Debug, thiserror::Error)]
pub enum PowerError {
    #[error("Power control is disabled.")]
    Disabled,

    #[error("failed to run shutdown: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("shutdown exited with {0}")]
    Failed(std::process::ExitStatus),
}

/// Irreversible host power operations
pub trait PowerControl: Send {
    fn shutdown_host(&mut self) -> Result<(), PowerError>;
    fn restart_host(&mut self) -> Result<(), PowerError>;
}

/// Runs the platform `shutdown` command
pub struct SystemPower;

impl SystemPower {
    fn run(args: &[&str]) -> Result<(), PowerError> {
        warn!(?args, "issuing host power command");
        let status = Command::new("shutdown").args(args).status()?;
        if status.success() {
            Ok(())
        } else {
            Err(PowerError::Failed(status))
        }
    }
}

impl PowerControl for SystemPower {
    fn shutdown_host(&mut self) -> Result<(), PowerError> {
        if cfg!(target_os = "windows") {
            Self::run(&["/s", "/t", "1"])
        } else {
            Self::run(&["-h", "now"])
        }
    }

    fn restart_host(&mut self) -> Result<(), PowerError> {
        if cfg!(target_os = "windows") {
            Self::run(&["/r", "/t", "1"])
        } else {
            Self::run(&["-r", "now"])
        }
    }
}
