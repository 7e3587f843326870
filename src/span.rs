use std::future::Future;
use tokio::task::JoinHandle;
use tracing::Span;
use tracing_futures::Instrument;

/// Spawns a task that keeps logging inside the span it was spawned from.
pub fn spawn_in_current_span<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    spawn_in_span(future, Span::current())
}

pub fn spawn_in_span<F>(future: F, span: Span) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(future.instrument(span))
}
