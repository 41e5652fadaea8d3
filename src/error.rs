//! Describes dependency resolution errors

use crate::key::Key;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone)]
pub enum Error {
    /// No binding matches the requested key
    NotFound {
        key: Key,
        message: String,
    },
    /// A key was requested again while it was already being resolved
    DependencyLoop(DependencyLoop),
    /// An override request broke the active override policy
    Overriding(String),
    /// A misuse of the container detected at configuration or resolution time
    Configuration(String),
    /// A late-init container was used before its backing container was set
    UninitializedAccess,
    /// A search specification matched nothing
    NoResult(String),
    /// A factory produced a value of an unexpected type
    ResolveFailed(&'static str),
    /// An error raised by a creator function
    Other(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NotFound { message, .. } => f.write_str(message),
            Error::DependencyLoop(chain) => write!(f, "{chain}"),
            Error::Overriding(msg) => f.write_str(msg),
            Error::Configuration(msg) => f.write_str(msg),
            Error::UninitializedAccess => f.write_str("Accessing a late-init container before it has been initialized"),
            Error::NoResult(msg) => f.write_str(msg),
            Error::ResolveFailed(type_name) => write!(f, "Resolution Error: factory produced a value that is not a {type_name}"),
            Error::Other(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Wraps any displayable error raised by user code
    #[inline]
    pub fn other(err: impl Display) -> Self {
        Error::Other(err.to_string())
    }

    #[inline]
    pub(crate) fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    #[inline]
    pub(crate) fn overriding(msg: impl Into<String>) -> Self {
        Error::Overriding(msg.into())
    }

    /// Returns `true` for [`Error::NotFound`]
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

/// One step of a dependency loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopStep {
    /// Requested key
    pub key: Key,
    /// `0` for the active binding, `n` for the n-th overridden one
    pub override_level: usize,
}

/// The chain of requests that led back to a key already being resolved.
///
/// The first and the last step name the same key.
#[derive(Debug, Clone)]
pub struct DependencyLoop {
    steps: Vec<LoopStep>,
    qualified: bool,
}

impl DependencyLoop {
    #[inline]
    pub(crate) fn new(steps: Vec<LoopStep>, qualified: bool) -> Self {
        Self { steps, qualified }
    }

    /// Every step of the loop, closing back on the first one
    #[inline]
    pub fn steps(&self) -> &[LoopStep] {
        &self.steps
    }

    fn display_step(&self, step: &LoopStep) -> String {
        let desc = step.key.render_bind(self.qualified);
        if step.override_level != 0 {
            format!("overridden {desc}")
        } else {
            desc
        }
    }
}

impl Display for DependencyLoop {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Dependency recursion:")?;
        for (index, step) in self.steps.iter().enumerate() {
            match index {
                0 => f.write_str("     ")?,
                1 => f.write_str("    ╔╩>")?,
                _ => write!(f, "    ║{}╚>", "  ".repeat(index - 1))?,
            }
            writeln!(f, "{}", self.display_step(step))?;
        }
        write!(f, "    ╚{}╝", "══".repeat(self.steps.len().saturating_sub(1)))
    }
}
