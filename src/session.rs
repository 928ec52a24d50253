//! Capture sessions: run a unit of work with a hook enabled and hand back
//! the stacktrace of whatever error it raised.


use core::fmt;
use std::{error::Error as StdError, sync::Arc};

use tracing::instrument;

use crate::{hook::TraceHook, stacktrace::Stacktrace};

/// An error that left a capture session, with the stacktrace attached when
/// it was raised.
pub struct Captured<E: ?Sized> {
    error: Arc<E>,
    stacktrace: Option<Arc<Stacktrace>>,
}

impl<E: ?Sized> Captured<E> {
    pub fn error(&self) -> &Arc<E> {
        &self.error
    }

    pub fn into_error(self) -> Arc<E> {
        self.error
    }

    /// `None` when the error was never [raised](crate::raise) inside an
    /// instrumented call while the hook was enabled.
    pub fn stacktrace(&self) -> Option<&Stacktrace> {
        self.stacktrace.as_deref()
    }

    pub fn into_parts(self) -> (Arc<E>, Option<Arc<Stacktrace>>) {
        (self.error, self.stacktrace)
    }
}

impl<E: ?Sized> Clone for Captured<E> {
    fn clone(&self) -> Self {
        Self {
            error: Arc::clone(&self.error),
            stacktrace: self.stacktrace.clone(),
        }
    }
}

impl<E: ?Sized + fmt::Debug> fmt::Debug for Captured<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Captured")
            .field("error", &self.error)
            .field("stacktrace", &self.stacktrace)
            .finish()
    }
}

impl<E: ?Sized + fmt::Display> fmt::Display for Captured<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<E: StdError + 'static> StdError for Captured<E> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.error)
    }
}

impl TraceHook {
    /// Runs `work` with the hook enabled.
    ///
    /// An error coming out of `work` is returned as [`Captured`], together
    /// with the stacktrace attached when it was raised. The hook is disabled
    /// before this returns, however `work` exits.
    #[instrument(level = "debug", skip_all, fields(hook = ?self))]
    pub fn capture<T, E>(
        &self,
        work: impl FnOnce() -> Result<T, Arc<E>>,
    ) -> Result<T, Captured<E>>
    where
        E: ?Sized,
    {
        self.enable(|| {
            work().map_err(|error| Captured {
                stacktrace: self.stacktrace(&error),
                error,
            })
        })
    }

    /// Runs `work` with the hook enabled, passing the error and its
    /// stacktrace to `on_failure` if it fails.
    ///
    /// `on_failure` runs before the hook is disabled. The error is returned
    /// unchanged.
    #[instrument(level = "debug", skip_all, fields(hook = ?self))]
    pub fn capture_with<T, E>(
        &self,
        work: impl FnOnce() -> Result<T, Arc<E>>,
        on_failure: impl FnOnce(&Arc<E>, Option<&Stacktrace>),
    ) -> Result<T, Arc<E>>
    where
        E: ?Sized,
    {
        self.enable(|| {
            work().inspect_err(|error| {
                let stacktrace = self.stacktrace(error);
                on_failure(error, stacktrace.as_deref());
            })
        })
    }
}

/// [`TraceHook::capture`] on the [global](TraceHook::global) hook.
///
/// ```
/// use std::sync::Arc;
/// use raisetrace::{call_site, enter, raise_new};
///
/// fn parse(input: &str) -> Result<u32, Arc<std::num::ParseIntError>> {
///     let _frame = enter(call_site!("parse"));
///     input.parse().map_err(raise_new)
/// }
///
/// let captured = raisetrace::capture(|| parse("twelve")).unwrap_err();
/// let innermost = captured.stacktrace().and_then(|trace| trace.innermost());
/// assert_eq!(innermost.map(|frame| frame.method_id()), Some("parse"));
/// ```
pub fn capture<T, E>(work: impl FnOnce() -> Result<T, Arc<E>>) -> Result<T, Captured<E>>
where
    E: ?Sized,
{
    TraceHook::global().capture(work)
}

/// [`TraceHook::capture_with`] on the [global](TraceHook::global) hook.
pub fn capture_with<T, E>(
    work: impl FnOnce() -> Result<T, Arc<E>>,
    on_failure: impl FnOnce(&Arc<E>, Option<&Stacktrace>),
) -> Result<T, Arc<E>>
where
    E: ?Sized,
{
    TraceHook::global().capture_with(work, on_failure)
}

/// The stacktrace the [global](TraceHook::global) hook attached to `error`.
pub fn get_stacktrace<E: ?Sized>(error: &Arc<E>) -> Option<Arc<Stacktrace>> {
    TraceHook::global().stacktrace(error)
}
