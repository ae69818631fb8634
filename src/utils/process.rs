use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::analyzers::error::AnalyzerFailure;

const PROCESS_TARGET: &str = "editguard::process";

/// A fully-built external command: program plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Renders the command line for logs and error messages.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn into_failure(self, program: &str) -> AnalyzerFailure {
        AnalyzerFailure::NonZeroExit {
            program: program.to_string(),
            status: self.status,
            stderr: self.stderr.trim().to_string(),
        }
    }
}

/// Runs an invocation to completion and captures its output.
///
/// A non-zero exit is not an error here: linters exit non-zero whenever they
/// report problems, so callers decide what the status means. The child is
/// killed if the returned future is dropped, which is how callers enforce
/// timeouts.
pub async fn run(invocation: &Invocation) -> Result<ProcessOutput, AnalyzerFailure> {
    debug!(target: PROCESS_TARGET, command = %invocation.display(), "spawning");

    let output = Command::new(&invocation.program)
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|err| AnalyzerFailure::Spawn {
            program: invocation.program.clone(),
            source: std::sync::Arc::new(err),
        })?;

    let result = ProcessOutput {
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    debug!(
        target: PROCESS_TARGET,
        command = %invocation.display(),
        status = ?result.status,
        stdout_bytes = result.stdout.len(),
        "process exited"
    );

    Ok(result)
}
