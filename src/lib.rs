//! Stacktraces for errors, recorded at the moment they are raised.
//!
//! Instrumented functions report their calls with [`enter`] (or
//! [`enter_with`] to include their locals) and report errors with [`raise`].
//! While a [`TraceHook`] is enabled, it keeps a cheap shadow stack of those
//! calls for every thread and, when an error is raised, attaches a copy of
//! that stack to the error. The stacktrace can be looked up later, long after
//! the error has propagated out of the frames it describes.
//!
//! ```
//! use std::sync::Arc;
//! use raisetrace::{call_site, enter_with, raise_new, TraceHook};
//!
//! #[derive(Debug)]
//! struct DivisionByZero;
//!
//! fn divide(a: i64, b: i64) -> Result<i64, Arc<DivisionByZero>> {
//!     let _frame = enter_with(call_site!("divide"), |scope| scope.local("a", &a).local("b", &b));
//!     if b == 0 {
//!         return Err(raise_new(DivisionByZero));
//!     }
//!     Ok(a / b)
//! }
//!
//! let hook = TraceHook::new();
//! let captured = hook.capture(|| divide(1, 0)).unwrap_err();
//! let trace = captured.stacktrace().unwrap();
//! assert_eq!(trace.len(), 1);
//! assert_eq!(trace.frames()[0].locals().get("b").unwrap().repr(), "0");
//! ```

#[macro_use]
extern crate tracing;

mod attach;
mod config;
mod dispatch;
mod error;
mod frame;
mod hook;
mod session;
mod stack;
mod stacktrace;
pub mod task;
mod value;

pub use config::{HookConfig, ScopeCapture};
pub use dispatch::{enter, enter_live, enter_with, raise, raise_new, Activation};
pub use error::{Error, Result};
pub use frame::{CallSite, Frame, Location};
pub use hook::{EnableGuard, TraceHook};
pub use session::{capture, capture_with, get_stacktrace, Captured};
pub use stacktrace::Stacktrace;
pub use value::{Binding, FnBinding, Locals, ScopeSnapshot, Value};
