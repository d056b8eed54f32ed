use super::{JoinHandle, spawn};
use crate::error::JoinError;

use std::future::Future;

/// Runs every future as its own task and collects their outputs in input
/// order.
///
/// All futures are spawned before the first one is awaited, so they make
/// progress concurrently on the loop.
///
/// # Panics
///
/// Panics if no event loop is active on this thread.
pub async fn gather<I, F>(futures: I) -> Result<Vec<F::Output>, JoinError>
where
    I: IntoIterator<Item = F>,
    F: Future + 'static,
    F::Output: 'static,
{
    let handles: Vec<JoinHandle<F::Output>> = futures.into_iter().map(spawn).collect();

    let mut outputs = Vec::with_capacity(handles.len());
    for handle in handles {
        outputs.push(handle.await?);
    }

    Ok(outputs)
}
