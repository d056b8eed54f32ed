//! Filesystem operations executed on the worker pool.
//!
//! Each call moves the blocking `std::fs` call onto a pool thread and
//! resumes the awaiting task with the result. Failures carry the operation
//! and the path.

use crate::error::OperationError;
use crate::pool;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

async fn blocking<T, F>(op: &'static str, path: &Path, f: F) -> Result<T, OperationError>
where
    F: FnOnce(&Path) -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let target: PathBuf = path.to_path_buf();
    let result = pool::submit(move || f(&target)).await?;

    result.map_err(|source| OperationError::Io {
        op,
        path: path.to_path_buf(),
        source,
    })
}

/// Reads the whole file at `path`.
pub async fn read(path: impl AsRef<Path>) -> Result<Vec<u8>, OperationError> {
    blocking("read", path.as_ref(), |path| fs::read(path)).await
}

/// Reads the whole file at `path` as UTF-8.
pub async fn read_to_string(path: impl AsRef<Path>) -> Result<String, OperationError> {
    blocking("read", path.as_ref(), |path| fs::read_to_string(path)).await
}

/// Creates or truncates the file at `path` and writes `contents` to it.
pub async fn write(
    path: impl AsRef<Path>,
    contents: impl AsRef<[u8]>,
) -> Result<(), OperationError> {
    let contents = contents.as_ref().to_vec();
    blocking("write", path.as_ref(), move |path| fs::write(path, contents)).await
}

/// Creates `path` and any missing parent directories.
pub async fn create_dir_all(path: impl AsRef<Path>) -> Result<(), OperationError> {
    blocking("create directory", path.as_ref(), |path| {
        fs::create_dir_all(path)
    })
    .await
}

/// Returns the metadata of the file at `path`, following symlinks.
pub async fn metadata(path: impl AsRef<Path>) -> Result<fs::Metadata, OperationError> {
    blocking("stat", path.as_ref(), |path| fs::metadata(path)).await
}
