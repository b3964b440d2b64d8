//! UI-agnostic controllers.
//!
//! Controllers never touch the network. A user action returns an
//! [`Outbound`] request; whoever drives the controller runs it and hands the
//! [`Completion`] back through `handle`. Every outbound carries a unique
//! [`Ticket`], and a controller only applies a completion for a ticket it is
//! still waiting on. Closing a form or starting a newer fetch therefore
//! retires older requests without any explicit cancellation.

pub mod form;
pub mod list;
pub mod workspace;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::api::ApiError;
use crate::model::draft::FieldErrors;
use crate::model::task::{Task, TaskId, TaskPayload};

pub use form::{FormEvent, FormMode, TaskFormController};
pub use list::{FailedOperation, TaskListController};
pub use workspace::Workspace;

static NEXT_TICKET: AtomicU64 = AtomicU64::new(1);

/// Identity of one in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

impl Ticket {
    fn next() -> Self {
        Ticket(NEXT_TICKET.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which controller a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    List,
    EditForm,
    CreateForm,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    List,
    Create(TaskPayload),
    Update(TaskId, TaskPayload),
    Remove(TaskId),
}

impl Request {
    /// Short human description, used in logs and error banners.
    pub fn describe(&self) -> String {
        match self {
            Request::List => "load tasks".to_string(),
            Request::Create(payload) => format!("create '{}'", payload.title),
            Request::Update(id, _) => format!("update task {}", id),
            Request::Remove(id) => format!("delete task {}", id),
        }
    }

    pub fn is_mutation(&self) -> bool {
        !matches!(self, Request::List)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Tasks(Vec<Task>),
    Saved(Task),
    Removed(TaskId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub ticket: Ticket,
    pub origin: Origin,
    pub request: Request,
}

impl Outbound {
    fn new(origin: Origin, request: Request) -> Self {
        Self {
            ticket: Ticket::next(),
            origin,
            request,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub ticket: Ticket,
    pub origin: Origin,
    pub result: Result<Reply, ApiError>,
}

impl Completion {
    pub fn new(ticket: Ticket, origin: Origin, result: Result<Reply, ApiError>) -> Self {
        Self {
            ticket,
            origin,
            result,
        }
    }
}

/// A user action that is not allowed in the current state.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ActionError {
    #[error("another task is being edited")]
    EditInProgress,
    #[error("no task with id {0}")]
    UnknownTask(TaskId),
    #[error("a save is already in progress")]
    SubmissionInFlight,
    #[error("{0}")]
    Invalid(FieldErrors),
    #[error("no delete is waiting for confirmation")]
    NoPendingConfirmation,
    #[error("nothing to retry")]
    NothingToRetry,
    #[error("a form is already open")]
    FormAlreadyOpen,
    #[error("no form is open")]
    NoForm,
}
