//! Carrying diagnostic tags across suspension points.
//!
//! A task may be suspended on one worker thread and resumed on another.
//! [`WithDiagnostics`] installs the task's tags around every poll and puts
//! the worker's own tags back when the poll returns, so the ambient mapping
//! seen by the task is always its own and the worker is never polluted.

use super::ambient::{self, DiagnosticTags};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A future that runs with its own ambient diagnostic tags.
#[must_use = "futures do nothing unless polled"]
pub struct WithDiagnostics<F> {
    inner: Pin<Box<F>>,
    tags: DiagnosticTags,
}

impl<F> WithDiagnostics<F> {
    /// Wraps `future` so it always observes exactly `tags`.
    pub fn new(tags: DiagnosticTags, future: F) -> Self {
        Self {
            inner: Box::pin(future),
            tags,
        }
    }

    /// The tags the wrapped future observed when it last suspended.
    #[must_use]
    pub fn tags(&self) -> &DiagnosticTags {
        &self.tags
    }
}

impl<F: Future> Future for WithDiagnostics<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let installed = Installed::swap_in(std::mem::take(&mut this.tags));
        let poll = this.inner.as_mut().poll(cx);
        this.tags = installed.swap_out();
        poll
    }
}

impl<F> std::fmt::Debug for WithDiagnostics<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WithDiagnostics")
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

/// Holds the worker's tags while a task's tags are installed.
///
/// Dropping without `swap_out` (a panicking poll) still restores the worker.
struct Installed {
    worker: Option<DiagnosticTags>,
}

impl Installed {
    fn swap_in(task_tags: DiagnosticTags) -> Self {
        Self {
            worker: Some(ambient::replace(task_tags)),
        }
    }

    fn swap_out(mut self) -> DiagnosticTags {
        ambient::replace(self.worker.take().unwrap_or_default())
    }
}

impl Drop for Installed {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            ambient::replace(worker);
        }
    }
}

/// Runs `future` with `call_tags` merged over the current ambient tags.
///
/// The merge is computed once, here; afterwards the future carries its own
/// mapping regardless of where it is polled.
pub fn with_diagnostics<F: Future>(call_tags: &DiagnosticTags, future: F) -> WithDiagnostics<F> {
    let mut merged = ambient::current();
    merged.extend(call_tags.iter().map(|(k, v)| (k.clone(), v.clone())));
    WithDiagnostics::new(merged, future)
}

/// Captures the current ambient tags for `future`, e.g. before spawning it.
pub fn propagate<F: Future>(future: F) -> WithDiagnostics<F> {
    WithDiagnostics::new(ambient::current(), future)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{clear, current, get, put};
    use futures::task::noop_waker;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn tags(pairs: &[(&str, &str)]) -> DiagnosticTags {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_resume_on_another_worker_sees_call_tags() {
        clear();
        let (tx, rx) = futures::channel::oneshot::channel::<()>();
        let observed = Arc::new(Mutex::new(Vec::new()));

        let seen = observed.clone();
        let mut task = Box::pin(with_diagnostics(&tags(&[("call", "c1")]), async move {
            seen.lock().push(get("call"));
            put("step", "suspended");
            let _ = rx.await;
            seen.lock().push(get("call"));
            seen.lock().push(get("step"));
            seen.lock().push(get("worker"));
        }));

        put("worker", "one");
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        assert!(task.as_mut().poll(&mut cx).is_pending());

        // The first worker gets its own tags back after the poll.
        assert_eq!(current(), tags(&[("worker", "one")]));

        tx.send(()).unwrap();
        let (worker_after, call_after) = std::thread::spawn(move || {
            put("worker", "two");
            let waker = noop_waker();
            let mut cx = Context::from_waker(&waker);
            assert!(task.as_mut().poll(&mut cx).is_ready());
            (get("worker"), get("call"))
        })
        .join()
        .unwrap();

        assert_eq!(worker_after.as_deref(), Some("two"));
        assert_eq!(call_after, None);
        assert_eq!(
            observed.lock().clone(),
            vec![
                Some("c1".to_string()),
                Some("c1".to_string()),
                Some("suspended".to_string()),
                None,
            ]
        );
        clear();
    }

    #[test]
    fn test_drop_between_polls_leaves_worker_clean() {
        clear();
        put("worker", "w");
        let (_tx, rx) = futures::channel::oneshot::channel::<()>();

        let mut task = Box::pin(with_diagnostics(&tags(&[("call", "c2")]), async move {
            let _ = rx.await;
        }));
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        assert!(task.as_mut().poll(&mut cx).is_pending());
        drop(task);

        assert_eq!(current(), tags(&[("worker", "w")]));
        clear();
    }

    #[test]
    fn test_with_diagnostics_merges_ambient() {
        clear();
        put("service", "api");
        let task = with_diagnostics(&tags(&[("call", "c3")]), async {});
        assert_eq!(task.tags(), &tags(&[("call", "c3"), ("service", "api")]));
        clear();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_calls_keep_their_own_tags() {
        let mut handles = Vec::new();
        for i in 0..32 {
            let id = format!("call-{i}");
            let call_tags = tags(&[("call", id.as_str())]);
            handles.push(tokio::spawn(with_diagnostics(&call_tags, async move {
                for _ in 0..20 {
                    tokio::task::yield_now().await;
                    assert_eq!(get("call").as_deref(), Some(id.as_str()));
                }
            })));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_propagate_into_spawned_task() {
        let outer = tags(&[("request", "r-9")]);
        let handle = tokio::spawn(with_diagnostics(&outer, async {
            tokio::spawn(propagate(async { get("request") })).await.unwrap()
        }));
        assert_eq!(handle.await.unwrap().as_deref(), Some("r-9"));
    }
}
