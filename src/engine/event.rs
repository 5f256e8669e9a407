//! Snippet events reported by `eval` and `drop`

use std::fmt;

use crate::engine::snippet::{SnippetId, Status};

/// Exception carried by an event for a directly executed snippet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalException {
    /// User code raised an exception
    User {
        /// Exception message
        message: String,
    },
    /// Execution reached a declaration that is not defined yet
    UnresolvedReference {
        /// Snippet owning the stub, when it is still known
        snippet: Option<SnippetId>,
        /// Member whose stub was reached
        member: String,
    },
}

impl fmt::Display for EvalException {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            EvalException::User { message } => write!(f, "exception: {}", message),
            EvalException::UnresolvedReference { member, .. } => {
                write!(f, "attempted to use {}, which cannot be used until its references are declared", member)
            }
        }
    }
}

/// One status transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetEvent {
    /// Snippet the event is about
    pub snippet: SnippetId,
    /// Status before the call
    pub previous_status: Status,
    /// Status after the call
    pub status: Status,
    /// Signature, definedness, or class name changed
    pub signature_changed: bool,
    /// Snippet whose change caused this event; `None` for the primary event
    pub cause: Option<SnippetId>,
    /// Display form of the value, for executed snippets that have one
    pub value: Option<String>,
    /// Exception raised while executing
    pub exception: Option<EvalException>,
}

impl SnippetEvent {
    /// Events for pulled-in dependents are only reported when they say
    /// something: the signature changed, the status changed, an exception was
    /// raised, or the event has no cause.
    pub fn is_interesting(&self) -> bool {
        self.signature_changed
            || self.cause.is_none()
            || self.status != self.previous_status
            || self.exception.is_some()
    }
}

impl fmt::Display for SnippetEvent {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "#{} {} -> {}", self.snippet, self.previous_status, self.status)?;
        if self.signature_changed {
            write!(f, " (signature changed)")?;
        }
        if let Some(cause) = self.cause {
            write!(f, " caused by #{}", cause)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(
        previous_status: Status,
        status: Status,
        cause: Option<SnippetId>,
    ) -> SnippetEvent {
        SnippetEvent {
            snippet: SnippetId::from_number(2),
            previous_status,
            status,
            signature_changed: false,
            cause,
            value: None,
            exception: None,
        }
    }

    #[test]
    fn test_unchanged_dependent_is_boring() {
        let cause = Some(SnippetId::from_number(1));
        assert!(!event(Status::Valid, Status::Valid, cause).is_interesting());
        assert!(event(Status::Valid, Status::RecoverableNotDefined, cause).is_interesting());
        assert!(event(Status::Valid, Status::Valid, None).is_interesting());
    }

    #[test]
    fn test_exception_is_interesting() {
        let mut ev = event(Status::Valid, Status::Valid, Some(SnippetId::from_number(1)));
        ev.exception = Some(EvalException::User {
            message: "boom".to_string(),
        });
        assert!(ev.is_interesting());
    }
}
