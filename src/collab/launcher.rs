//! Opening URLs and files with the desktop's default handler

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

/// Errors from the OS launcher
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("File not found.")]
    NotFound,

    #[error("Could not open {target}: {reason}")]
    Failed { target: String, reason: String },
}

/// Hands URLs and files to the operating system
pub trait Launcher: Send {
    /// Open a URL in the default browser
    fn open_url(&mut self, url: &str) -> Result<(), LaunchError>;

    /// Whether a path exists
    fn exists(&self, path: &str) -> bool;

    /// Open a file with its associated application
    fn open_file(&mut self, path: &str) -> Result<(), LaunchError>;
}

/// Launcher backed by `open`, `xdg-open` or `cmd /C start`
///
/// The opener is waited on so it never lingers as a zombie. It hands
/// the target to the desktop and returns right away.
pub struct SystemLauncher {
    program: String,
    leading_args: Vec<String>,
}

impl SystemLauncher {
    /// Launcher using the platform's default opener
    pub fn new() -> Self {
        let (program, leading_args) = default_opener();
        Self::with_opener(program, leading_args)
    }

    /// Launcher running `program [leading_args..] <target>`
    pub fn with_opener(program: &str, leading_args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            leading_args: leading_args.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    fn launch(&self, target: &str) -> Result<(), LaunchError> {
        debug!(program = %self.program, %target, "launching");
        let status = Command::new(&self.program)
            .args(&self.leading_args)
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .map_err(|e| LaunchError::Failed {
                target: target.to_string(),
                reason: e.to_string(),
            })?;

        if !status.success() {
            return Err(LaunchError::Failed {
                target: target.to_string(),
                reason: format!("{} exited with {}", self.program, status),
            });
        }
        Ok(())
    }
}

impl Default for SystemLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl Launcher for SystemLauncher {
    fn open_url(&mut self, url: &str) -> Result<(), LaunchError> {
        self.launch(url)
    }

    fn exists(&self, path: &str) -> bool {
        !path.is_empty() && Path::new(path).exists()
    }

    fn open_file(&mut self, path: &str) -> Result<(), LaunchError> {
        if !self.exists(path) {
            return Err(LaunchError::NotFound);
        }
        self.launch(path)
    }
}

#[cfg(target_os = "macos")]
fn default_opener() -> (&'static str, &'static [&'static str]) {
    ("open", &[])
}

#[cfg(target_os = "windows")]
fn default_opener() -> (&'static str, &'static [&'static str]) {
    ("cmd", &["/C", "start", ""])
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn default_opener() -> (&'static str, &'static [&'static str]) {
    ("xdg-open", &[])
}
