//! compute-once attribute cells
//!
//! Every entity keeps one [Memo] per derived attribute. An attribute is resolved in two steps:
//!
//! 1. a pure presence check inspects the raw input and returns
//!    - `Ok(None)`: the field is absent, the default is adopted
//!    - `Ok(Some(raw))`: the field is present and well formed
//!    - `Err(_)`: the field is present but invalid (or required and absent)
//! 2. a construction step turning `raw` into the attribute, only run for present fields
//!
//! Whatever the outcome, it is stored and never recomputed.
use crate::error::{PlanParsingError, Result};
use std::sync::OnceLock;

/// Tri-state attribute cell: unevaluated, value or error
///
/// Backed by [OnceLock] so that concurrent first access runs the evaluation exactly once and every
/// caller observes the same value or the same error.
#[derive(Debug)]
pub struct Memo<T> {
    cell: OnceLock<Result<T>>,
}

/// Observable state of a [Memo]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    Unevaluated,
    Value,
    Error,
}

impl<T> Memo<T> {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    /// Get the cached outcome or evaluate `init`
    pub fn get_or_try_init(&self, init: impl FnOnce() -> Result<T>) -> Result<&T> {
        self.cell.get_or_init(init).as_ref().map_err(Clone::clone)
    }

    /// Resolve an attribute from a presence check, a construction step and a default
    pub fn resolve<R>(
        &self,
        check: impl FnOnce() -> Result<Option<R>>,
        build: impl FnOnce(R) -> Result<T>,
        default: impl FnOnce() -> T,
    ) -> Result<&T> {
        self.get_or_try_init(|| match check()? {
            Some(raw) => build(raw),
            None => Ok(default()),
        })
    }

    pub fn state(&self) -> MemoState {
        match self.cell.get() {
            None => MemoState::Unevaluated,
            Some(Ok(_)) => MemoState::Value,
            Some(Err(_)) => MemoState::Error,
        }
    }

    /// The cached error, if evaluation failed
    pub fn error(&self) -> Option<&PlanParsingError> {
        self.cell.get().and_then(|outcome| outcome.as_ref().err())
    }
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}
