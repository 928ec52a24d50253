//! The event source: instrumented code reports calls, returns and raises
//! here, and they are delivered to every enabled [`TraceHook`].
//!
//! # how it works
//! enabled hooks sit in a copy-on-write list. delivering an event clones the
//! list (one refcount bump) and runs every hook against the current context,
//! so hooks can be enabled and disabled from other threads while events are
//! being delivered. when no hook is enabled, every event is a single atomic
//! load.
//!
//! events reported while a hook is running on the same thread (say, from a
//! `Debug` impl rendered into a scope snapshot) are dropped.
//!
//! an activation remembers the context it was entered in. when it is dropped
//! somewhere else (a task resumed on another worker, a guard sent to another
//! thread), the return is posted to that context and applied before its next
//! call or raise. every event also drops the stacks of hooks that are no
//! longer enabled, so a disable reaches all contexts that keep running.
//!
//! [`TraceHook`]: crate::TraceHook

use core::{
    cell::Cell,
    fmt,
    num::NonZeroU64,
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
};
use std::sync::{Arc, PoisonError, RwLock};

use crate::{
    frame::{CallSite, Scope},
    hook::{self, HookInner},
    stack::{self, Context, Returns},
    value::{Binding, ScopeSnapshot},
};

type Subscribers = Arc<[Arc<HookInner>]>;

static SUBSCRIBERS: RwLock<Option<Subscribers>> = RwLock::new(None);
static ACTIVE: AtomicUsize = AtomicUsize::new(0);
static NEXT_ACTIVATION: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static DELIVERING: Cell<bool> = const { Cell::new(false) };
}

fn subscribers() -> Option<Subscribers> {
    SUBSCRIBERS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

fn update(f: impl FnOnce(&mut Vec<Arc<HookInner>>)) {
    let mut subscribers = SUBSCRIBERS.write().unwrap_or_else(PoisonError::into_inner);
    let mut hooks = subscribers
        .as_deref()
        .map(<[_]>::to_vec)
        .unwrap_or_default();
    f(&mut hooks);
    ACTIVE.store(hooks.len(), Ordering::Release);
    *subscribers = (!hooks.is_empty()).then(|| hooks.into());
}

pub(crate) fn subscribe(hook: Arc<HookInner>) {
    update(|hooks| hooks.push(hook));
}

pub(crate) fn unsubscribe(id: u64) {
    update(|hooks| hooks.retain(|hook| hook.id() != id));
}

struct Delivering;

impl Delivering {
    fn enter() -> Option<Self> {
        DELIVERING
            .try_with(|delivering| (!delivering.replace(true)).then_some(Delivering))
            .ok()
            .flatten()
    }
}

impl Drop for Delivering {
    fn drop(&mut self) {
        let _ = DELIVERING.try_with(|delivering| delivering.set(false));
    }
}

fn deliver(event: impl FnOnce(&[Arc<HookInner>], &mut Context)) {
    if ACTIVE.load(Ordering::Acquire) == 0 {
        return;
    }
    let Some(_delivering) = Delivering::enter() else {
        return;
    };
    let Some(hooks) = subscribers() else {
        return;
    };
    stack::with_current(|context| {
        context.prune(|key| hooks.iter().any(|hook| hook.key() == key));
        event(&hooks[..], context);
    });
}

/// An instrumented call in progress. Dropping it reports the return.
///
/// Activations entered while no hook was enabled are inert and report
/// nothing.
#[must_use = "the call is reported as returned as soon as the activation is dropped"]
pub struct Activation {
    recorded: Option<Recorded>,
}

struct Recorded {
    id: NonZeroU64,
    home: Arc<Returns>,
}

impl Activation {
    /// Whether a hook was enabled when the call was entered.
    pub fn is_recorded(&self) -> bool {
        self.recorded.is_some()
    }
}

impl Drop for Activation {
    fn drop(&mut self) {
        let Some(Recorded { id, home }) = self.recorded.take() else {
            return;
        };
        deliver(|hooks, context| {
            if !context.owns(&home) {
                home.post(id.get());
                return;
            }
            for hook in hooks {
                hook.on_return(context, id.get());
            }
        });
    }
}

impl fmt::Debug for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activation")
            .field("id", &self.recorded.as_ref().map(|recorded| recorded.id))
            .finish()
    }
}

fn call(site: &'static CallSite, scope: impl FnOnce() -> Scope) -> Activation {
    let mut activation = Activation { recorded: None };
    deliver(|hooks, context| {
        let Some(id) = NonZeroU64::new(NEXT_ACTIVATION.fetch_add(1, Ordering::Relaxed)) else {
            return;
        };
        context.settle();
        let scope = scope();
        for hook in hooks {
            hook.on_call(context, id.get(), site, &scope);
        }
        activation.recorded = Some(Recorded {
            id,
            home: Arc::clone(context.returns()),
        });
    });
    activation
}

/// Reports a call without receiver or locals.
pub fn enter(site: &'static CallSite) -> Activation {
    call(site, || Scope::Empty)
}

/// Reports a call, snapshotting its receiver and locals.
///
/// `scope` only runs when a hook is enabled, so rendering the locals costs
/// nothing otherwise. A panic inside it is logged and the frame is recorded
/// without a scope.
pub fn enter_with<F>(site: &'static CallSite, scope: F) -> Activation
where
    F: FnOnce(ScopeSnapshot) -> ScopeSnapshot,
{
    call(site, || {
        hook::guarded(site, || scope(ScopeSnapshot::new()))
            .map_or(Scope::Empty, |snapshot| Scope::Snapshot(Arc::new(snapshot)))
    })
}

/// Reports a call with a live binding.
///
/// Hooks configured with [`ScopeCapture::Lazy`](crate::ScopeCapture::Lazy)
/// keep the binding and query it whenever a frame is inspected; all others
/// snapshot it right away.
pub fn enter_live<B>(site: &'static CallSite, binding: B) -> Activation
where
    B: Binding + 'static,
{
    call(site, || Scope::Live(Arc::new(binding)))
}

/// Reports a raise of `error`, attaching the current stack to it.
///
/// Returns `error` so this can be used in place: `Err(raise(err))`. Raising
/// the same error again keeps the stacktrace from the first raise.
pub fn raise<E>(error: Arc<E>) -> Arc<E>
where
    E: ?Sized + Send + Sync + 'static,
{
    deliver(|hooks, context| {
        context.settle();
        for hook in hooks {
            hook.on_raise(context, &error);
        }
    });
    error
}

/// Wraps `error` in an `Arc` and [raises](raise) it.
pub fn raise_new<E>(error: E) -> Arc<E>
where
    E: Send + Sync + 'static,
{
    raise(Arc::new(error))
}
