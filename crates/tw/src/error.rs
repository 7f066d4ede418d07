//! Error types for tw operations.
//!
//! Errors fall into four groups that callers can branch on:
//!
//! - **Validation**: malformed input rejected before any write
//!   ([`Error::InvalidId`], [`Error::Validation`])
//! - **State**: the operation is not legal for the issue's current state
//!   ([`Error::IllegalTransition`], [`Error::UndoneChildren`], [`Error::HasChildren`])
//! - **Not found**: the identifier is well-formed but no issue carries it
//!   ([`Error::IssueNotFound`])
//! - **Backend**: the store or external CLI failed; the diagnostic text is
//!   passed through unchanged

use crate::domain::IssueStatus;
use crate::ids::IssueId;
use thiserror::Error;

/// Result type for tw operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for tw operations.
#[derive(Debug, Error)]
pub enum Error {
    // ========== Validation ==========
    /// An identifier did not match the `PREFIX-N[-N[suffix]]` grammar.
    #[error("invalid issue id '{id}': {reason}")]
    InvalidId {
        /// The offending input
        id: String,
        /// Why it was rejected
        reason: String,
    },

    /// Input rejected before any write (empty title, illegal parent, ...).
    #[error("{0}")]
    Validation(String),

    // ========== State ==========
    /// Transition attempted from a status outside its allowed set.
    #[error("cannot transition {id}: status is {status}")]
    IllegalTransition {
        /// The issue being transitioned
        id: IssueId,
        /// Its current status
        status: IssueStatus,
    },

    /// Done refused because children are still open.
    #[error("cannot mark {id} as done: has undone children: {}", join_ids(.children))]
    UndoneChildren {
        /// The issue being closed
        id: IssueId,
        /// Children that are not done
        children: Vec<IssueId>,
    },

    /// Delete refused because the issue still has children.
    #[error("cannot delete {id}: it has children ({}). Delete children first.", join_ids(.children))]
    HasChildren {
        /// The issue being deleted
        id: IssueId,
        /// Its direct children
        children: Vec<IssueId>,
    },

    // ========== Not found ==========
    /// No issue with this identifier exists.
    #[error("issue not found: {0}")]
    IssueNotFound(IssueId),

    // ========== Backend ==========
    /// SQLite failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// External task CLI failure, with its stderr verbatim.
    #[error("backend error: {0}")]
    Backend(String),

    /// JSON encoding or decoding failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File system failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ========== Other ==========
    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invariant violated inside tw itself.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors raised because the identifier names no issue.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::IssueNotFound(_))
    }

    /// True for input rejected before any write.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::InvalidId { .. } | Error::Validation(_))
    }

    /// True for operations refused because of the issue's current state.
    pub fn is_state(&self) -> bool {
        matches!(
            self,
            Error::IllegalTransition { .. } | Error::UndoneChildren { .. } | Error::HasChildren { .. }
        )
    }
}

fn join_ids(ids: &[IssueId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
