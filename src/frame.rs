use core::fmt;
use std::sync::Arc;

use crate::value::{Binding, Locals, ScopeSnapshot, Value};

/// Static description of an instrumented call site.
///
/// Usually created through [`call_site!`](crate::call_site), which fills in
/// the file and line of the invocation.
#[derive(Debug, PartialEq, Eq)]
pub struct CallSite {
    path: &'static str,
    lineno: u32,
    method_id: &'static str,
}

impl CallSite {
    pub const fn new(path: &'static str, lineno: u32, method_id: &'static str) -> Self {
        Self {
            path,
            lineno,
            method_id,
        }
    }

    pub fn location(&self) -> Location {
        Location {
            path: self.path,
            lineno: self.lineno,
            method_id: self.method_id,
        }
    }
}

/// Builds a `&'static CallSite` for the enclosing function.
///
/// ```
/// let site = raisetrace::call_site!("parse_header");
/// assert_eq!(site.location().method_id, "parse_header");
/// ```
#[macro_export]
macro_rules! call_site {
    ($method_id:expr) => {{
        static SITE: $crate::CallSite = $crate::CallSite::new(file!(), line!(), $method_id);
        &SITE
    }};
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub path: &'static str,
    pub lineno: u32,
    pub method_id: &'static str,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} in {}", self.path, self.lineno, self.method_id)
    }
}

#[derive(Clone)]
pub(crate) enum Scope {
    Empty,
    Snapshot(Arc<ScopeSnapshot>),
    /// Answers with the state at query time. Only kept by lazy hooks.
    Live(Arc<dyn Binding>),
}

/// One recorded activation.
#[derive(Clone)]
pub struct Frame {
    site: &'static CallSite,
    scope: Scope,
}

impl Frame {
    pub(crate) fn new(site: &'static CallSite, scope: Scope) -> Self {
        Self { site, scope }
    }

    pub fn location(&self) -> Location {
        self.site.location()
    }

    pub fn path(&self) -> &'static str {
        self.site.path
    }

    pub fn lineno(&self) -> u32 {
        self.site.lineno
    }

    pub fn method_id(&self) -> &'static str {
        self.site.method_id
    }

    /// The receiver of the call, if the call site reported one.
    pub fn receiver(&self) -> Option<Value> {
        match &self.scope {
            Scope::Empty => None,
            Scope::Snapshot(snapshot) => snapshot.receiver_value().cloned(),
            Scope::Live(binding) => binding.receiver(),
        }
    }

    /// Local variables of the call.
    ///
    /// For a live frame this asks the binding again, so the answer reflects
    /// the variables as they are now rather than when the error was raised.
    pub fn locals(&self) -> Locals {
        match &self.scope {
            Scope::Empty => Locals::new(),
            Scope::Snapshot(snapshot) => snapshot.locals().clone(),
            Scope::Live(binding) => binding.locals(),
        }
    }

    /// The type name of the receiver.
    pub fn class_name(&self) -> Option<&'static str> {
        self.receiver().map(|receiver| receiver.type_name())
    }

    /// Whether receiver and locals are read through a live binding.
    pub fn is_live(&self) -> bool {
        matches!(self.scope, Scope::Live(_))
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} in ", self.path(), self.lineno())?;
        if let Some(class_name) = self.class_name() {
            write!(f, "{class_name}#")?;
        }
        write!(f, "{} {:?}", self.method_id(), self.locals())
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("location", &self.location())
            .field("receiver", &self.receiver())
            .field("locals", &self.locals())
            .field("live", &self.is_live())
            .finish()
    }
}
