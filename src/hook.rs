//! The trace hook: a subscription to call, return and raise events.


use core::{
    any::Any,
    fmt,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError},
};

use crate::{
    attach::{self, Attachments},
    config::{HookConfig, ScopeCapture},
    dispatch,
    error::Error,
    frame::{CallSite, Frame, Scope},
    stack::{self, Context, ExecutionStack, HookKey},
    stacktrace::Stacktrace,
};

static NEXT_HOOK: AtomicU64 = AtomicU64::new(1);

/// A handle to a trace hook.
///
/// While enabled, the hook keeps a shadow stack of instrumented calls for
/// every thread (or [isolated](crate::task::IsolateExt) task) and attaches a
/// [`Stacktrace`] to every error passed to [`raise`](crate::raise). Enabling
/// is reference counted: nested [`enable`](TraceHook::enable) calls on clones
/// of the same hook share one subscription, and the hook is only disabled once
/// the outermost one exits.
///
/// Independent hooks don't see each other's stacks or attachments.
#[derive(Clone)]
pub struct TraceHook {
    inner: Arc<HookInner>,
}

pub(crate) struct HookInner {
    id: u64,
    config: HookConfig,
    enables: Mutex<usize>,
    generation: AtomicU64,
    enabled: AtomicBool,
    attachments: Attachments,
}

impl TraceHook {
    pub fn new() -> Self {
        Self::with_config(HookConfig::default())
    }

    pub fn with_config(config: HookConfig) -> Self {
        Self {
            inner: Arc::new(HookInner {
                id: NEXT_HOOK.fetch_add(1, Ordering::Relaxed),
                config,
                enables: Mutex::new(0),
                generation: AtomicU64::new(0),
                enabled: AtomicBool::new(false),
                attachments: Attachments::default(),
            }),
        }
    }

    /// The process-wide hook used by [`capture`](crate::capture) and
    /// [`get_stacktrace`](crate::get_stacktrace), configured from the
    /// environment on first use.
    pub fn global() -> &'static TraceHook {
        static GLOBAL: OnceLock<TraceHook> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let config = HookConfig::from_env().unwrap_or_else(|err| {
                warn!(%err, "using the default trace hook configuration");
                HookConfig::default()
            });
            TraceHook::with_config(config)
        })
    }

    pub fn config(&self) -> &HookConfig {
        &self.inner.config
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    /// Runs `scope` with the hook enabled.
    ///
    /// The hook is disabled again on every way out of `scope`, including
    /// unwinding.
    pub fn enable<R>(&self, scope: impl FnOnce() -> R) -> R {
        let _enabled = self.enable_guard();
        scope()
    }

    /// Enables the hook until the returned guard is dropped.
    pub fn enable_guard(&self) -> EnableGuard {
        self.inner.acquire();
        EnableGuard {
            hook: Arc::clone(&self.inner),
        }
    }

    /// The stacktrace this hook attached to `error`, if any.
    pub fn stacktrace<E: ?Sized>(&self, error: &Arc<E>) -> Option<Arc<Stacktrace>> {
        self.inner.attachments.get(attach::key_of(error))
    }

    /// Number of frames currently on this context's stack.
    pub fn depth(&self) -> usize {
        let key = self.inner.key();
        stack::with_current(|context| {
            context.settle();
            context.stack(key).map_or(0, ExecutionStack::depth)
        })
        .unwrap_or(0)
    }
}

impl Default for TraceHook {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TraceHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceHook")
            .field("id", &self.inner.id)
            .field("config", &self.inner.config)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Keeps a [`TraceHook`] enabled.
#[must_use = "the hook is disabled again when the guard is dropped"]
pub struct EnableGuard {
    hook: Arc<HookInner>,
}

impl Drop for EnableGuard {
    fn drop(&mut self) {
        self.hook.release();
    }
}

impl fmt::Debug for EnableGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnableGuard")
            .field("hook", &self.hook.id)
            .finish()
    }
}

impl HookInner {
    pub(crate) fn key(&self) -> HookKey {
        HookKey {
            hook: self.id,
            generation: self.generation.load(Ordering::Acquire),
        }
    }

    fn enables(&self) -> MutexGuard<'_, usize> {
        self.enables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire(self: &Arc<Self>) {
        let mut enables = self.enables();
        if *enables == 0 {
            self.generation.fetch_add(1, Ordering::AcqRel);
            self.enabled.store(true, Ordering::Release);
            dispatch::subscribe(Arc::clone(self));
            debug!(hook = self.id, "trace hook enabled");
        }
        *enables += 1;
    }

    fn release(&self) {
        let mut enables = self.enables();
        *enables -= 1;
        if *enables == 0 {
            self.enabled.store(false, Ordering::Release);
            dispatch::unsubscribe(self.id);
            // other contexts drop theirs at their next event
            stack::with_current(|context| context.discard(self.id));
            debug!(hook = self.id, "trace hook disabled");
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub(crate) fn on_call(
        &self,
        context: &mut Context,
        activation: u64,
        site: &'static CallSite,
        scope: &Scope,
    ) {
        if !self.is_enabled() {
            return;
        }

        let scope = match scope {
            Scope::Live(binding) if self.config.scopes == ScopeCapture::Eager => {
                guarded(site, || binding.snapshot())
                    .map_or(Scope::Empty, |snapshot| Scope::Snapshot(Arc::new(snapshot)))
            }
            scope => scope.clone(),
        };

        context
            .stack_mut(self.key())
            .push(activation, Frame::new(site, scope));
    }

    pub(crate) fn on_return(&self, context: &mut Context, activation: u64) {
        if !self.is_enabled() {
            return;
        }
        if let Some(stack) = context.existing_mut(self.key()) {
            stack.pop(activation);
        }
    }

    pub(crate) fn on_raise<E>(&self, context: &mut Context, error: &Arc<E>)
    where
        E: ?Sized + Send + Sync + 'static,
    {
        if !self.is_enabled() {
            return;
        }
        if self.attachments.contains(attach::key_of(error)) {
            trace!(hook = self.id, "stacktrace already attached, keeping the first one");
            return;
        }
        // no call seen in this context since the hook was enabled
        let Some(stack) = context.stack(self.key()) else {
            return;
        };

        let stacktrace = Stacktrace::new(stack.frames());
        let depth = stacktrace.len();
        if self.attachments.attach(error, stacktrace) {
            trace!(hook = self.id, depth, "attached stacktrace");
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

/// Runs user code on behalf of the hook, turning a panic into a logged
/// failure.
pub(crate) fn guarded<R>(site: &'static CallSite, f: impl FnOnce() -> R) -> Option<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            let err = Error::ScopePanicked {
                method_id: site.location().method_id,
                message: panic_message(payload.as_ref()),
            };
            warn!(%err, "recording frame without its scope");
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        return (*msg).to_owned();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "<non-string panic payload>".to_owned()
}
