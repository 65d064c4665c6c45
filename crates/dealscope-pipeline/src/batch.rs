//! Windowed concurrent execution.

use std::future::Future;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tracing::info;

use crate::cancel::CancellationToken;
use crate::error::PipelineError;

/// Scheduler notifications, delivered on the calling task.
#[derive(Debug)]
pub enum BatchEvent<'r, R> {
    Dispatched { index: usize },
    Completed { index: usize, result: &'r R },
}

/// Run `task` over `items` in fixed windows of `limit`.
///
/// Items inside a window run concurrently; windows run strictly one after
/// another. Cancellation is checked before each window. `on_event` runs on the
/// caller's task, so it may mutate caller state without locking. Results come
/// back in input order regardless of completion order.
pub async fn run_windows<'a, T, R, F, Fut, P>(
    items: &'a [T],
    limit: usize,
    cancel: &CancellationToken,
    mut task: F,
    mut on_event: P,
) -> Result<Vec<R>, PipelineError>
where
    F: FnMut(usize, &'a T) -> Fut,
    Fut: Future<Output = R>,
    P: FnMut(BatchEvent<'_, R>),
{
    let limit = limit.max(1);
    let mut slots: Vec<Option<R>> = (0..items.len()).map(|_| None).collect();
    let windows = items.len().div_ceil(limit);

    for (w, window) in items.chunks(limit).enumerate() {
        cancel.check()?;
        info!(window = w + 1, windows, size = window.len(), "dispatching batch window");

        let base = w * limit;
        let mut running = FuturesUnordered::new();
        for (offset, item) in window.iter().enumerate() {
            let index = base + offset;
            on_event(BatchEvent::Dispatched { index });
            let fut = task(index, item);
            running.push(async move { (index, fut.await) });
        }

        while let Some((index, result)) = running.next().await {
            on_event(BatchEvent::Completed {
                index,
                result: &result,
            });
            slots[index] = Some(result);
        }
    }

    Ok(slots.into_iter().flatten().collect())
}
