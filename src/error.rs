use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown scope capture mode `{0}`, expected `eager` or `lazy`")]
    UnknownScopeCapture(String),

    #[error("{var} is not valid unicode")]
    NotUnicode { var: &'static str },

    /// A scope closure or binding panicked while a frame was being recorded.
    /// Never returned to callers, only logged.
    #[error("scope of `{method_id}` panicked while being captured: {message}")]
    ScopePanicked {
        method_id: &'static str,
        message: String,
    },
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
