use std::io::Write;
use std::process::{Command, Stdio};

// ---------------------------------------------------------------------------
// CommandRunner trait (for testability)
// ---------------------------------------------------------------------------

/// Abstraction over external process execution so `adb` and `tesseract`
/// invocations can be faked in tests.
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, optionally feeding `stdin`, and collect its
    /// output. An `Err` means the process could not be started at all.
    fn run(&self, program: &str, args: &[&str], stdin: Option<&[u8]>) -> Result<CommandOutput, String>;
}

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl CommandOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Runner that spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str], stdin: Option<&[u8]>) -> Result<CommandOutput, String> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("{program}: {e}"))?;

        // Feed stdin from a helper thread so a chatty child cannot deadlock
        // on a full stdout pipe while we are still writing.
        let writer = match (stdin, child.stdin.take()) {
            (Some(bytes), Some(mut pipe)) => {
                let bytes = bytes.to_vec();
                Some(std::thread::spawn(move || pipe.write_all(&bytes)))
            }
            _ => None,
        };

        let output = child.wait_with_output().map_err(|e| format!("{program}: {e}"))?;
        if let Some(handle) = writer {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(format!("{program}: writing stdin: {e}")),
                Err(_) => return Err(format!("{program}: stdin writer panicked")),
            }
        }

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
