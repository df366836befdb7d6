//! # Access Policy
//!
//! The role policy as data: one row per (resource, operation), naming who
//! may perform it.
//!
//! ```text
//! ┌──────────────┬──────────┬──────────┬────────┬────────┬────────┐
//! │ resource     │ list     │ retrieve │ create │ update │ delete │
//! ├──────────────┼──────────┼──────────┼────────┼────────┼────────┤
//! │ Book         │ public   │ public   │ staff  │ staff  │ staff  │
//! │ Author       │ public   │ public   │ staff  │ staff  │ staff  │
//! │ Loan         │ auth     │ auth     │ auth   │ auth   │   -    │
//! │ User         │ staff    │ staff    │   -    │ staff  │ staff  │
//! │ Registration │    -     │ public   │ public │   -    │   -    │
//! │ Session      │    -     │    -     │ public │   -    │   -    │
//! └──────────────┴──────────┴──────────┴────────┴────────┴────────┘
//! ```
//!
//! A pair missing from the table is not exposed at all and is denied for
//! everybody. Loan rows only require a signed-in caller; which loans that
//! caller may see is narrowed by the ledger (see [`crate::loan::LoanScope`]).

use crate::error::{CoreError, CoreResult};
use crate::types::Caller;

/// Things the gateway exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Book,
    Author,
    Loan,
    User,
    Registration,
    Session,
}

/// What a request wants to do with a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Retrieve,
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Reads never change state.
    pub fn is_read(&self) -> bool {
        matches!(self, Operation::List | Operation::Retrieve)
    }
}

/// Who may perform an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Requirement {
    /// Anyone, with or without a token.
    Public,
    /// Any caller with a valid token.
    Authenticated,
    /// Staff callers only.
    Staff,
}

use Operation::{Create, Delete, List, Retrieve, Update};
use Requirement::{Authenticated, Public, Staff};

/// The whole policy.
pub const POLICY: &[(Resource, Operation, Requirement)] = &[
    (Resource::Book, List, Public),
    (Resource::Book, Retrieve, Public),
    (Resource::Book, Create, Staff),
    (Resource::Book, Update, Staff),
    (Resource::Book, Delete, Staff),
    (Resource::Author, List, Public),
    (Resource::Author, Retrieve, Public),
    (Resource::Author, Create, Staff),
    (Resource::Author, Update, Staff),
    (Resource::Author, Delete, Staff),
    (Resource::Loan, List, Authenticated),
    (Resource::Loan, Retrieve, Authenticated),
    (Resource::Loan, Create, Authenticated),
    (Resource::Loan, Update, Authenticated),
    (Resource::User, List, Staff),
    (Resource::User, Retrieve, Staff),
    (Resource::User, Update, Staff),
    (Resource::User, Delete, Staff),
    (Resource::Registration, Retrieve, Public),
    (Resource::Registration, Create, Public),
    (Resource::Session, Create, Public),
];

/// Looks up the requirement for a pair, `None` when it is not exposed.
pub fn requirement(resource: Resource, operation: Operation) -> Option<Requirement> {
    POLICY
        .iter()
        .find(|(r, o, _)| *r == resource && *o == operation)
        .map(|(_, _, requirement)| *requirement)
}

/// Decides whether `caller` may perform `operation` on `resource`.
///
/// ## Errors
/// - `Unauthorized` when the entry needs a token and there is none
/// - `Forbidden` when the caller's role is too low, or the pair is not exposed
pub fn authorize(
    resource: Resource,
    operation: Operation,
    caller: Option<&Caller>,
) -> CoreResult<()> {
    let Some(required) = requirement(resource, operation) else {
        return Err(CoreError::forbidden(format!(
            "{operation:?} is not allowed on {resource:?}"
        )));
    };

    match (required, caller) {
        (Public, _) => Ok(()),
        (Authenticated | Staff, None) => Err(CoreError::unauthorized(
            "authentication credentials were not provided",
        )),
        (Authenticated, Some(_)) => Ok(()),
        (Staff, Some(caller)) if caller.is_staff() => Ok(()),
        (Staff, Some(_)) => Err(CoreError::forbidden(
            "you do not have permission to perform this action",
        )),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
