/// Pipes generated C through an external formatter. The backend only
/// guarantees syntactically valid C; layout is the formatter's job.
use std::io::Write;
use std::process::{Command, Stdio};

use crate::errors::GenError;

/// Format C source with `clang-format`, the default formatter.
pub fn format_c(source: &[u8]) -> Result<Vec<u8>, GenError> {
    run_formatter("clang-format", &["-style=Chromium"], source)
}

/// Run `cmd args...` with `source` on stdin, capturing stdout. The child is
/// always awaited before returning; spawn failures and non-zero exits both
/// surface as `FormatterFailed`.
pub fn run_formatter(cmd: &str, args: &[&str], source: &[u8]) -> Result<Vec<u8>, GenError> {
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|e| GenError::FormatterFailed(format!("could not spawn {cmd}: {e}")))?;

    {
        let mut stdin = child.stdin.take().ok_or_else(|| {
            GenError::FormatterFailed(format!("no stdin handle for {cmd}"))
        })?;
        stdin
            .write_all(source)
            .map_err(|e| GenError::FormatterFailed(format!("writing to {cmd}: {e}")))?;
        // Dropping the handle closes the pipe so the child sees EOF.
    }

    let output = child
        .wait_with_output()
        .map_err(|e| GenError::FormatterFailed(format!("waiting for {cmd}: {e}")))?;
    if !output.status.success() {
        return Err(GenError::FormatterFailed(format!(
            "{cmd} exited with {}",
            output.status
        )));
    }
    Ok(output.stdout)
}
