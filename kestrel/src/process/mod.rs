//! Child processes executed on the worker pool.

use crate::error::OperationError;
use crate::pool;

use std::process::{Command, Output};

/// Runs `command` to completion and collects its output.
///
/// The child is spawned and waited for on a pool thread. A non-zero exit
/// status becomes [`OperationError::Exit`], carrying the captured stderr.
pub async fn output(mut command: Command) -> Result<Output, OperationError> {
    let program = command.get_program().to_string_lossy().into_owned();

    let result = pool::submit(move || command.output()).await?;
    let output = result.map_err(|source| OperationError::Spawn {
        program: program.clone(),
        source,
    })?;

    if !output.status.success() {
        tracing::debug!(%program, status = %output.status, "child exited unsuccessfully");

        return Err(OperationError::Exit {
            program,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(output)
}
