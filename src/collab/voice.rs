//! Speech output through the platform text-to-speech command

use std::io::Write;
use std::process::{Command, ExitStatus, Stdio};

use tracing::debug;

/// Errors from the speech-output engine
#[derive(Debug, thiserror::Error)]
pub enum SpeechOutputError {
    #[error("nothing to speak")]
    Empty,

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    Failed {
        program: &'static str,
        status: std::process::ExitStatus,
    },
}

/// Reads text aloud, returning when speaking is done
pub trait Speaker: Send {
    fn speak(&mut self, text: &str) -> Result<(), SpeechOutputError>;
}

/// Speaks through `say`, `espeak-ng` or Windows SAPI
pub struct SystemSpeaker;

impl Speaker for SystemSpeaker {
    fn speak(&mut self, text: &str) -> Result<(), SpeechOutputError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SpeechOutputError::Empty);
        }

        for engine in candidates(text) {
            let program = engine.program;
            debug!(program, chars = text.len(), "speaking");
            match run_engine(engine) {
                Ok(status) if status.success() => return Ok(()),
                Ok(status) => return Err(SpeechOutputError::Failed { program, status }),
                // Try the next engine when this one is not installed
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(source) => return Err(SpeechOutputError::Spawn { program, source }),
            }
        }

        Err(SpeechOutputError::Spawn {
            program: "text-to-speech",
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no text-to-speech engine installed",
            ),
        })
    }
}

/// One text-to-speech command
struct Engine {
    program: &'static str,
    command: Command,
    /// Text fed on stdin instead of the command line
    stdin_text: Option<String>,
}

/// Run an engine to completion, feeding stdin when asked
fn run_engine(mut engine: Engine) -> std::io::Result<ExitStatus> {
    engine.command.stdout(Stdio::null());
    let Some(text) = engine.stdin_text else {
        engine.command.stdin(Stdio::null());
        return engine.command.status();
    };

    let mut child = engine.command.stdin(Stdio::piped()).spawn()?;
    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(text.as_bytes()),
        None => Ok(()),
    };
    // stdin is closed here so the engine sees end of input
    let status = child.wait()?;
    written.map(|_| status)
}

#[cfg(target_os = "macos")]
fn candidates(text: &str) -> Vec<Engine> {
    let mut say = Command::new("say");
    say.args(["-f", "-"]);
    vec![Engine {
        program: "say",
        command: say,
        stdin_text: Some(text.to_string()),
    }]
}

#[cfg(target_os = "windows")]
fn candidates(text: &str) -> Vec<Engine> {
    let script = format!(
        "Add-Type -AssemblyName System.Speech; \
         (New-Object System.Speech.Synthesis.SpeechSynthesizer).Speak('{}')",
        text.replace('\'', "''")
    );
    let mut powershell = Command::new("powershell");
    powershell.args(["-NoProfile", "-Command", &script]);
    vec![Engine {
        program: "powershell",
        command: powershell,
        stdin_text: None,
    }]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn candidates(text: &str) -> Vec<Engine> {
    ["espeak-ng", "espeak"]
        .into_iter()
        .map(|program| {
            let mut command = Command::new(program);
            command.arg("--stdin");
            Engine {
                program,
                command,
                stdin_text: Some(text.to_string()),
            }
        })
        .collect()
}
