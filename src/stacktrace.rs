use core::{fmt, slice};

use crate::frame::Frame;

/// The frames that were active when an error was raised, innermost first.
#[derive(Clone, Default)]
pub struct Stacktrace {
    frames: Box<[Frame]>,
}

impl Stacktrace {
    pub(crate) fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into_boxed_slice(),
        }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn iter(&self) -> slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The frame the error was raised in.
    pub fn innermost(&self) -> Option<&Frame> {
        self.frames.first()
    }

    pub fn outermost(&self) -> Option<&Frame> {
        self.frames.last()
    }
}

impl<'a> IntoIterator for &'a Stacktrace {
    type Item = &'a Frame;
    type IntoIter = slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for Stacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in self.iter() {
            writeln!(f, "    at {frame}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Stacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stacktrace")
            .field("frames", &self.frames)
            .finish()
    }
}
