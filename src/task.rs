//! Per-task shadow stacks for async code.
//!
//! Stacks are thread-local, which is wrong for futures: a task can move
//! between worker threads, and many tasks interleave on one thread. Wrapping a
//! future with [`IsolateExt::isolate`] gives it its own set of stacks, swapped
//! in for the duration of each poll.

#[cfg(test)]
mod tests;

use core::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context as TaskContext, Poll},
};

use pin_project_lite::pin_project;

use crate::stack::{self, Context};

pin_project! {
    /// A future with its own shadow stacks. See [`IsolateExt::isolate`].
    pub struct Isolated<F> {
        #[pin]
        inner: F,
        context: Context,
    }
}

impl<F: Future> Future for Isolated<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _swapped = stack::swap_in(this.context);
        this.inner.poll(cx)
    }
}

impl<F> fmt::Debug for Isolated<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Isolated").finish_non_exhaustive()
    }
}

pub trait IsolateExt: Future + Sized {
    /// Gives this future its own shadow stacks, so the frames it records are
    /// keyed by the task rather than by whichever thread polls it.
    ///
    /// ```
    /// # async fn handler() {}
    /// use raisetrace::task::IsolateExt;
    ///
    /// # let _ =
    /// async { handler().await }.isolate()
    /// # ;
    /// ```
    fn isolate(self) -> Isolated<Self> {
        Isolated {
            inner: self,
            context: Context::default(),
        }
    }
}

impl<F: Future> IsolateExt for F {}
