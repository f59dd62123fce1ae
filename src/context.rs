//! Task-scoped trace propagation.
//!
//! Instrumented code rarely receives the active trace as a parameter. Instead the
//! front door runs each unit of work inside [`activate`], and any code executing
//! within that scope - including code resumed from nested awaits - can recover the
//! trace with [`current`].
//!
//! Storage is keyed by task identity via `tokio::task_local!`, so concurrently
//! interleaved units of work never observe each other's trace even though they
//! share worker threads.

use crate::trace::ObsyTrace;
use std::future::Future;
use std::sync::Arc;

tokio::task_local! {
    static ACTIVE_TRACE: Arc<ObsyTrace>;
}

/// Run `body` with `trace` active for its entire execution.
///
/// Every `current()` call made transitively from `body` - across any number of
/// suspension points - resolves to `trace`. Nested `activate` calls shadow the
/// outer trace for the duration of the inner scope only.
pub async fn activate<F>(trace: Arc<ObsyTrace>, body: F) -> F::Output
where
    F: Future,
{
    ACTIVE_TRACE.scope(trace, body).await
}

/// Return the trace active for the current scope, if any.
///
/// Outside any [`activate`] scope this returns `None`, in which case
/// instrumented calls pass through unrecorded.
pub fn current() -> Option<Arc<ObsyTrace>> {
    ACTIVE_TRACE.try_with(Arc::clone).ok()
}
