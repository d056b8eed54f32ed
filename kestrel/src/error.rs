//! Error types surfaced by the runtime.
//!
//! Recoverable failures are plain values: an awaited operation yields an
//! [`OperationError`], awaiting a task yields a [`JoinError`] when the task
//! never produced an output, and [`timeout`](crate::time::timeout) yields
//! [`Elapsed`].
//!
//! Failures of the loop or pool primitives themselves, and misuse of the task
//! model (double resume, resume after completion, resume off the loop thread),
//! are not represented here. They go through [`abort`], which logs the cause
//! and terminates the process.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

/// A failure reported by a single asynchronous operation.
///
/// The error is delivered into the task that awaited the operation; the
/// runtime never interprets or suppresses it.
#[derive(thiserror::Error, Debug)]
pub enum OperationError {
    #[error("failed to {op} `{}`: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{program}` exited with {status}")]
    Exit {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Os(#[from] io::Error),

    #[error("blocking work panicked: {0}")]
    Panicked(String),

    #[error("the event loop is shutting down")]
    Shutdown,
}

impl OperationError {
    /// Returns the underlying I/O error kind, if this error wraps one.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            OperationError::Io { source, .. } | OperationError::Spawn { source, .. } => {
                Some(source.kind())
            }
            OperationError::Os(e) => Some(e.kind()),
            _ => None,
        }
    }
}

/// Returned when awaiting a task that was destroyed before it completed.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    #[error("task was destroyed before it completed")]
    Destroyed,
}

/// Errors returned by lifecycle calls.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("an event loop is already active in this process")]
    AlreadyInitialized,
}

/// The deadline given to [`timeout`](crate::time::timeout) elapsed first.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("deadline has elapsed")]
pub struct Elapsed(pub(crate) ());

/// Unrecoverable runtime failures.
#[derive(thiserror::Error, Debug)]
pub(crate) enum Fatal {
    #[error("programming error: {0}")]
    Programming(&'static str),

    #[error("{op} failed: {source}")]
    Environment {
        op: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Logs `fatal` and aborts the process.
#[cold]
#[track_caller]
pub(crate) fn abort(fatal: Fatal) -> ! {
    let location = std::panic::Location::caller();
    tracing::error!(error = %fatal, %location, "fatal runtime error");
    eprintln!("kestrel: {fatal} ({location})");
    std::process::abort()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_kind_is_exposed_for_io_variants() {
        let err = OperationError::Io {
            op: "read",
            path: PathBuf::from("/missing"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };

        assert_eq!(err.io_kind(), Some(io::ErrorKind::NotFound));
        assert_eq!(OperationError::Shutdown.io_kind(), None);
    }

    #[test]
    fn io_error_message_names_the_path() {
        let err = OperationError::Io {
            op: "read",
            path: PathBuf::from("/tmp/compile_commands.json"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };

        let message = err.to_string();
        assert!(message.starts_with("failed to read `/tmp/compile_commands.json`"));
    }

    #[test]
    fn environment_fatal_mentions_the_primitive() {
        let fatal = Fatal::Environment {
            op: "epoll_create1",
            source: io::Error::from(io::ErrorKind::OutOfMemory),
        };

        assert!(fatal.to_string().starts_with("epoll_create1 failed"));
    }
}
