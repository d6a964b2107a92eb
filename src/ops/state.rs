//! Operator lifecycle

use crate::error::{Error, Result};

/// Lifecycle state of an operator invocation
///
/// ```text
/// Constructed -> Validated -> Dispatched -> Succeeded
///                    |             |
///                    +-------------+------> Failed
/// ```
///
/// `Constructed -> Validated` happens inside the operator constructors: an
/// operator value only exists once its inputs have been validated. Terminal
/// states are final and nothing is retried.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OpState {
    /// Built from tensor specs, not yet checked
    Constructed,
    /// Specs (and, at execution, concrete values) accepted
    Validated,
    /// Native call in flight
    Dispatched,
    /// Result buffer handed to the caller
    Succeeded,
    /// Error returned to the caller
    Failed,
}

impl OpState {
    /// True if `next` is a legal successor of `self`
    pub const fn can_transition_to(self, next: OpState) -> bool {
        matches!(
            (self, next),
            (Self::Constructed, Self::Validated)
                | (Self::Constructed, Self::Failed)
                | (Self::Validated, Self::Dispatched)
                | (Self::Validated, Self::Failed)
                | (Self::Dispatched, Self::Succeeded)
                | (Self::Dispatched, Self::Failed)
        )
    }

    /// True for `Succeeded` and `Failed`
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// One execution of a validated operator
#[derive(Debug)]
pub(crate) struct Invocation {
    op: &'static str,
    state: OpState,
}

impl Invocation {
    pub(crate) fn start(op: &'static str) -> Self {
        log::debug!("{op}: {:?}", OpState::Validated);
        Self {
            op,
            state: OpState::Validated,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> OpState {
        self.state
    }

    pub(crate) fn advance(&mut self, next: OpState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidState {
                from: self.state,
                to: next,
            });
        }
        log::debug!("{}: {:?} -> {:?}", self.op, self.state, next);
        self.state = next;
        Ok(())
    }

    /// Move to the terminal state matching `result` and pass it through
    pub(crate) fn finish<T>(mut self, result: Result<T>) -> Result<T> {
        let next = if result.is_ok() {
            OpState::Succeeded
        } else {
            OpState::Failed
        };
        self.advance(next)?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_path() {
        let mut inv = Invocation::start("solve");
        assert_eq!(inv.state(), OpState::Validated);
        inv.advance(OpState::Dispatched).unwrap();
        assert_eq!(inv.finish(Ok(7)).unwrap(), 7);
    }

    #[test]
    fn test_failure_before_dispatch() {
        let inv = Invocation::start("cholesky");
        let err = inv
            .finish::<()>(Err(Error::shape("cholesky", "3x2")))
            .unwrap_err();
        assert!(err.is_shape_error());
    }

    #[test]
    fn test_success_requires_dispatch() {
        let inv = Invocation::start("solve");
        let err = inv.finish(Ok(())).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                from: OpState::Validated,
                to: OpState::Succeeded
            }
        ));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [OpState::Succeeded, OpState::Failed] {
            assert!(terminal.is_terminal());
            for next in [
                OpState::Constructed,
                OpState::Validated,
                OpState::Dispatched,
                OpState::Succeeded,
                OpState::Failed,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
        assert!(!OpState::Dispatched.can_transition_to(OpState::Validated));
        assert!(!OpState::Dispatched.is_terminal());
    }
}
