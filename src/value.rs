//! Receiver and local-variable bindings of an activation.
//!
//! A call either hands over a [`ScopeSnapshot`] that was rendered when the
//! call was entered, or a live [`Binding`] that is asked again every time a
//! frame is queried. Values are kept as their `Debug` rendering together with
//! the name of their type, which is all a trace reader ever needs and keeps
//! frames `Send + Sync` no matter what the instrumented code holds.

use core::fmt;
use std::any;

/// A rendered value of a receiver or local variable.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Value {
    type_name: &'static str,
    repr: String,
}

impl Value {
    pub fn of<T: fmt::Debug + ?Sized>(value: &T) -> Self {
        Self {
            type_name: any::type_name::<T>(),
            repr: format!("{value:?}"),
        }
    }

    /// The full path of the value's type, as reported by
    /// [`core::any::type_name`].
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The `Debug` rendering of the value at the time it was captured.
    pub fn repr(&self) -> &str {
        &self.repr
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr)
    }
}

/// Local variables of an activation, in the order they were bound.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Locals {
    vars: Vec<(&'static str, Value)>,
}

impl Locals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name`, replacing an earlier binding of the same name in place.
    pub fn insert(&mut self, name: &'static str, value: Value) {
        match self.vars.iter_mut().find(|(var, _)| *var == name) {
            Some((_, slot)) => *slot = value,
            None => self.vars.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars
            .iter()
            .find_map(|(var, value)| (*var == name).then_some(value))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.vars.iter().map(|(name, _)| *name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> + '_ {
        self.vars.iter().map(|(name, value)| (*name, value))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl FromIterator<(&'static str, Value)> for Locals {
    fn from_iter<I: IntoIterator<Item = (&'static str, Value)>>(iter: I) -> Self {
        let mut locals = Locals::new();
        for (name, value) in iter {
            locals.insert(name, value);
        }
        locals
    }
}

impl fmt::Debug for Locals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// An owned copy of a receiver and its locals, taken when a call is entered.
///
/// Built with the chained setters inside [`enter_with`](crate::enter_with):
///
/// ```
/// # use raisetrace::{call_site, enter_with};
/// fn area(width: u32, height: u32) -> u32 {
///     let _frame = enter_with(call_site!("area"), |scope| {
///         scope.local("width", &width).local("height", &height)
///     });
///     width * height
/// }
/// # assert_eq!(area(2, 3), 6);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSnapshot {
    receiver: Option<Value>,
    locals: Locals,
}

impl ScopeSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn receiver<T: fmt::Debug + ?Sized>(mut self, receiver: &T) -> Self {
        self.receiver = Some(Value::of(receiver));
        self
    }

    #[must_use]
    pub fn local<T: fmt::Debug + ?Sized>(mut self, name: &'static str, value: &T) -> Self {
        self.locals.insert(name, Value::of(value));
        self
    }

    pub fn receiver_value(&self) -> Option<&Value> {
        self.receiver.as_ref()
    }

    pub fn locals(&self) -> &Locals {
        &self.locals
    }
}

/// A handle to the receiver and locals of a running activation.
///
/// Implementations answer with the state *as of the query*, which is what a
/// hook configured with [`ScopeCapture::Lazy`](crate::ScopeCapture::Lazy)
/// keeps around after the call returned. The handle is shared through an
/// `Arc`, so it stays valid for as long as any frame refers to it; whatever
/// it reads must be owned by the handle itself (usually `Arc<Mutex<_>>`
/// cells shared with the activation).
pub trait Binding: Send + Sync {
    fn receiver(&self) -> Option<Value> {
        None
    }

    fn locals(&self) -> Locals {
        Locals::new()
    }

    fn snapshot(&self) -> ScopeSnapshot {
        ScopeSnapshot {
            receiver: self.receiver(),
            locals: self.locals(),
        }
    }
}

impl Binding for () {}

impl Binding for ScopeSnapshot {
    fn receiver(&self) -> Option<Value> {
        self.receiver.clone()
    }

    fn locals(&self) -> Locals {
        self.locals.clone()
    }

    fn snapshot(&self) -> ScopeSnapshot {
        self.clone()
    }
}

/// Adapts a closure rendering a [`ScopeSnapshot`] into a [`Binding`].
pub struct FnBinding<F>(pub F);

impl<F> Binding for FnBinding<F>
where
    F: Fn() -> ScopeSnapshot + Send + Sync,
{
    fn receiver(&self) -> Option<Value> {
        (self.0)().receiver
    }

    fn locals(&self) -> Locals {
        (self.0)().locals
    }

    fn snapshot(&self) -> ScopeSnapshot {
        (self.0)()
    }
}

impl<F> fmt::Debug for FnBinding<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnBinding(..)")
    }
}
