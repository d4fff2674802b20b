//! Hook command execution.
//!
//! Hooks are argv arrays run directly, without a shell. Before spawning,
//! any token that exactly equals a substitution key is replaced by its
//! value; substrings are never interpolated.

use crate::error::{CommandFailure, EngineError, Result};
use std::collections::HashMap;
use std::io::{self, Write};
use std::process::{Command, Stdio};
use tracing::debug;

/// Placeholder token replaced by the path of the file a hook runs for.
///
/// Before-hooks see the entry's source path, after-hooks its staged
/// destination path.
pub const TARGET_PLACEHOLDER: &str = "${target}";

/// Token-to-value map applied to hook arguments.
pub type Substitutions = HashMap<String, String>;

/// Substitutions binding `TARGET_PLACEHOLDER` to `target`.
pub fn target_substitution(target: impl Into<String>) -> Substitutions {
    HashMap::from([(TARGET_PLACEHOLDER.to_string(), target.into())])
}

/// Whether a hook is long enough to run.
///
/// A hook needs a program and at least one argument; a bare program name
/// counts as no hook.
pub fn is_runnable(command: &[String]) -> bool {
    command.len() > 1
}

/// Replace whole tokens that match a substitution key.
pub fn substitute(substitutions: &Substitutions, command: &[String]) -> Vec<String> {
    command
        .iter()
        .map(|token| substitutions.get(token).unwrap_or(token).clone())
        .collect()
}

/// Run `command` to completion after substitution.
///
/// The first token is the program, the rest are its arguments. Output is
/// written to `stdout` and `stderr` once the process exits; a `None` sink
/// discards that stream.
///
/// # Errors
/// - `InvalidCommand` if `command` is empty
/// - `CommandExecution` if the process cannot be spawned or exits unsuccessfully
/// - `Io` if captured output cannot be written to a sink
pub fn execute(
    substitutions: &Substitutions,
    command: &[String],
    stdout: Option<&mut dyn Write>,
    stderr: Option<&mut dyn Write>,
) -> Result<()> {
    if command.is_empty() {
        return Err(EngineError::InvalidCommand);
    }

    let argv = substitute(substitutions, command);
    debug!(?argv, "running command");

    let output = Command::new(&argv[0])
        .args(&argv[1..])
        .stdin(Stdio::null())
        .stdout(sink_stdio(stdout.is_some()))
        .stderr(sink_stdio(stderr.is_some()))
        .output()
        .map_err(|e| EngineError::CommandExecution {
            argv: argv.clone(),
            source: CommandFailure::Spawn(e),
        })?;

    let forwarded = forward_output(&output.stdout, stdout)
        .and_then(|()| forward_output(&output.stderr, stderr));

    // A non-zero exit wins over a failed sink write.
    if !output.status.success() {
        return Err(EngineError::CommandExecution {
            argv,
            source: CommandFailure::Status(output.status),
        });
    }

    forwarded.map_err(|e| EngineError::io(&argv[0], e))
}

fn forward_output(captured: &[u8], sink: Option<&mut dyn Write>) -> io::Result<()> {
    match sink {
        Some(sink) => sink.write_all(captured),
        None => Ok(()),
    }
}

fn sink_stdio(attached: bool) -> Stdio {
    if attached {
        Stdio::piped()
    } else {
        Stdio::null()
    }
}
