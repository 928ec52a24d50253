//! Shadow call stacks and the per-context storage they live in.
//!
//! Every execution context (a thread, or a future wrapped in
//! [`Isolated`](crate::task::Isolated)) owns one [`Context`], which holds one
//! [`ExecutionStack`] per hook that has seen a call in it. Only the owning
//! context ever touches its stacks, so pushing and popping needs no locks.
//! A return that happens in another context is posted to the owner's
//! [`Returns`] mailbox instead and applied by the owner before its next call
//! or raise.

#[cfg(test)]
mod tests;

use core::{
    cell::RefCell,
    mem,
    sync::atomic::{AtomicBool, Ordering},
};
use std::sync::{Arc, Mutex, PoisonError};

use crate::frame::Frame;

/// Identifies one enabled period of one hook.
///
/// The generation changes every time a hook goes from disabled to enabled,
/// which is how stacks left behind by an earlier period are recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HookKey {
    pub(crate) hook: u64,
    pub(crate) generation: u64,
}

struct Entry {
    activation: u64,
    frame: Frame,
}

pub(crate) struct ExecutionStack {
    key: HookKey,
    entries: Vec<Entry>,
}

impl ExecutionStack {
    fn new(key: HookKey) -> Self {
        Self {
            key,
            entries: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, activation: u64, frame: Frame) {
        self.entries.push(Entry { activation, frame });
    }

    /// Pops the frame of `activation`, along with every frame above it.
    ///
    /// Frames above it belong to activations whose return was never
    /// observed. An activation that is not on the stack at all is ignored.
    /// Returns the number of frames removed.
    pub(crate) fn pop(&mut self, activation: u64) -> usize {
        match self
            .entries
            .iter()
            .rposition(|entry| entry.activation == activation)
        {
            Some(at) => {
                let removed = self.entries.len() - at;
                self.entries.truncate(at);
                removed
            }
            None => 0,
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.entries.len()
    }

    /// Copies the frames out, innermost first.
    pub(crate) fn frames(&self) -> Vec<Frame> {
        self.entries
            .iter()
            .rev()
            .map(|entry| entry.frame.clone())
            .collect()
    }
}

/// Returns of activations that were entered in one context and dropped in
/// another, waiting for the owning context to apply them.
#[derive(Default)]
pub(crate) struct Returns {
    posted: AtomicBool,
    pending: Mutex<Vec<u64>>,
}

impl Returns {
    pub(crate) fn post(&self, activation: u64) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(activation);
        self.posted.store(true, Ordering::Release);
    }

    fn take(&self) -> Vec<u64> {
        if !self.posted.swap(false, Ordering::Acquire) {
            return Vec::new();
        }
        mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[derive(Default)]
pub(crate) struct Context {
    stacks: Vec<ExecutionStack>,
    returns: Arc<Returns>,
}

impl Context {
    /// The stack for `key`, created on first use.
    ///
    /// A stack left over from an earlier generation of the same hook is
    /// cleared.
    pub(crate) fn stack_mut(&mut self, key: HookKey) -> &mut ExecutionStack {
        match self.stacks.iter().position(|stack| stack.key.hook == key.hook) {
            Some(at) => {
                let stack = &mut self.stacks[at];
                if stack.key.generation != key.generation {
                    *stack = ExecutionStack::new(key);
                }
                stack
            }
            None => {
                self.stacks.push(ExecutionStack::new(key));
                let last = self.stacks.len() - 1;
                &mut self.stacks[last]
            }
        }
    }

    /// The stack for `key`, if this context has seen a call for it.
    pub(crate) fn stack(&self, key: HookKey) -> Option<&ExecutionStack> {
        self.stacks.iter().find(|stack| stack.key == key)
    }

    pub(crate) fn existing_mut(&mut self, key: HookKey) -> Option<&mut ExecutionStack> {
        self.stacks.iter_mut().find(|stack| stack.key == key)
    }

    pub(crate) fn discard(&mut self, hook: u64) {
        self.stacks.retain(|stack| stack.key.hook != hook);
    }

    /// Drops the stacks of hooks for which `is_current` no longer holds.
    pub(crate) fn prune(&mut self, is_current: impl Fn(HookKey) -> bool) {
        self.stacks.retain(|stack| is_current(stack.key));
    }

    /// Where activations entered here report returns that happen elsewhere.
    pub(crate) fn returns(&self) -> &Arc<Returns> {
        &self.returns
    }

    pub(crate) fn owns(&self, returns: &Arc<Returns>) -> bool {
        Arc::ptr_eq(&self.returns, returns)
    }

    /// Applies returns posted from other contexts to every stack.
    pub(crate) fn settle(&mut self) {
        for activation in self.returns.take() {
            for stack in &mut self.stacks {
                stack.pop(activation);
            }
        }
    }
}

thread_local! {
    static CURRENT: RefCell<Context> = RefCell::new(Context::default());
}

/// Runs `f` on the current context.
///
/// Returns `None` when the context is unavailable: during thread teardown,
/// or when it is already borrowed further up the stack.
pub(crate) fn with_current<R>(f: impl FnOnce(&mut Context) -> R) -> Option<R> {
    CURRENT
        .try_with(|current| {
            let mut context = current.try_borrow_mut().ok()?;
            Some(f(&mut context))
        })
        .ok()
        .flatten()
}

/// Puts `context` in place of the current one until the guard drops.
pub(crate) fn swap_in(context: &mut Context) -> Swapped<'_> {
    let swapped = swap(context);
    Swapped { context, swapped }
}

pub(crate) struct Swapped<'a> {
    context: &'a mut Context,
    swapped: bool,
}

impl Drop for Swapped<'_> {
    fn drop(&mut self) {
        if self.swapped {
            swap(self.context);
        }
    }
}

fn swap(context: &mut Context) -> bool {
    with_current(|current| mem::swap(current, context)).is_some()
}
