use core::str::FromStr;
use std::env;

use crate::error::{Error, Result};

/// How a hook records the receiver and locals of live bindings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScopeCapture {
    /// Snapshot live bindings when the call is entered.
    #[default]
    Eager,
    /// Keep live bindings and ask them again whenever a frame is queried.
    /// Frames then report current values, not the ones at raise time.
    Lazy,
}

impl FromStr for ScopeCapture {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eager" => Ok(Self::Eager),
            "lazy" => Ok(Self::Lazy),
            _ => Err(Error::UnknownScopeCapture(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookConfig {
    pub scopes: ScopeCapture,
}

impl HookConfig {
    pub const SCOPES_ENV: &'static str = "RAISETRACE_SCOPES";

    /// Reads the configuration from `RAISETRACE_SCOPES`, defaulting when it
    /// is unset.
    pub fn from_env() -> Result<Self> {
        Self::from_var(env::var(Self::SCOPES_ENV))
    }

    fn from_var(scopes: Result<String, env::VarError>) -> Result<Self> {
        match scopes {
            Ok(scopes) => Ok(Self {
                scopes: scopes.parse()?,
            }),
            Err(env::VarError::NotPresent) => Ok(Self::default()),
            Err(env::VarError::NotUnicode(_)) => Err(Error::NotUnicode {
                var: Self::SCOPES_ENV,
            }),
        }
    }

    #[must_use]
    pub fn scopes(mut self, scopes: ScopeCapture) -> Self {
        self.scopes = scopes;
        self
    }
}
