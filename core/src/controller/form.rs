use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::controller::{ActionError, Completion, Origin, Outbound, Reply, Request, Ticket};
use crate::model::draft::{Draft, Field, FieldErrors};
use crate::model::task::{Status, Task, TaskId};

/// Create mode when opened without a task, edit mode when bound to one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit(TaskId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormEvent {
    /// The server accepted the draft. The owner closes the form and
    /// reconciles its collection.
    Saved(Task),
    /// The save failed; the form stays open with its fields editable.
    Failed,
    /// The completion belongs to a request this form no longer waits on.
    Stale,
}

/// Owns one editable draft and submits it as a create or an update.
#[derive(Debug, Clone)]
pub struct TaskFormController {
    origin: Origin,
    mode: FormMode,
    draft: Draft,
    errors: FieldErrors,
    in_flight: Option<Ticket>,
    last_error: Option<ApiError>,
}

impl TaskFormController {
    pub fn new(origin: Origin) -> Self {
        Self {
            origin,
            mode: FormMode::Create,
            draft: Draft::default(),
            errors: FieldErrors::default(),
            in_flight: None,
            last_error: None,
        }
    }

    pub fn for_task(origin: Origin, task: &Task) -> Self {
        let mut form = Self::new(origin);
        form.load(Some(task));
        form
    }

    /// Resets the form wholesale. Called once when the dialog opens; any
    /// previous edits and any pending save are discarded.
    pub fn load(&mut self, task: Option<&Task>) {
        match task {
            Some(task) => {
                self.mode = FormMode::Edit(task.id.clone());
                self.draft = Draft::from_task(task);
            }
            None => {
                self.mode = FormMode::Create;
                self.draft = Draft::default();
            }
        }
        self.errors = FieldErrors::default();
        self.last_error = None;
        if let Some(ticket) = self.in_flight.take() {
            debug!(%ticket, "form reloaded, abandoning pending save");
        }
    }

    pub fn mode(&self) -> &FormMode {
        &self.mode
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn last_error(&self) -> Option<&ApiError> {
        self.last_error.as_ref()
    }

    pub fn title(&self) -> &'static str {
        match self.mode {
            FormMode::Create => "Add New Task",
            FormMode::Edit(_) => "Edit Task",
        }
    }

    pub fn set_field(&mut self, field: Field, value: impl Into<String>) -> Result<(), ActionError> {
        self.ensure_editable()?;
        if let Err(e) = self.draft.set(field, value.into()) {
            let mut errors = FieldErrors::default();
            errors.insert(field, e.to_string());
            return Err(ActionError::Invalid(errors));
        }
        self.errors.clear(field);
        Ok(())
    }

    pub fn set_status(&mut self, status: Status) -> Result<(), ActionError> {
        self.ensure_editable()?;
        self.draft.status = status;
        self.errors.clear(Field::Status);
        Ok(())
    }

    /// Validates and, if the draft is acceptable, returns the save request.
    /// Nothing is sent while a previous save is still running.
    pub fn submit(&mut self, today: NaiveDate) -> Result<Outbound, ActionError> {
        self.ensure_editable()?;
        if let Err(errors) = self.draft.validate() {
            self.errors = errors.clone();
            return Err(ActionError::Invalid(errors));
        }

        let payload = self.draft.normalize(today);
        let request = match &self.mode {
            FormMode::Create => Request::Create(payload),
            FormMode::Edit(id) => Request::Update(id.clone(), payload),
        };
        let outbound = Outbound::new(self.origin, request);
        debug!(ticket = %outbound.ticket, action = %outbound.request.describe(), "submitting form");
        self.in_flight = Some(outbound.ticket);
        self.last_error = None;
        Ok(outbound)
    }

    pub fn complete(&mut self, completion: Completion) -> FormEvent {
        if self.in_flight != Some(completion.ticket) {
            debug!(ticket = %completion.ticket, "ignoring stale form completion");
            return FormEvent::Stale;
        }
        self.in_flight = None;

        match completion.result {
            Ok(Reply::Saved(task)) => {
                info!(id = %task.id, title = %task.title, "task saved");
                FormEvent::Saved(task)
            }
            Ok(other) => {
                warn!(reply = ?other, "unexpected reply to a save");
                self.last_error = Some(ApiError::Decode {
                    url: String::new(),
                    message: "unexpected reply to a save".to_string(),
                });
                FormEvent::Failed
            }
            Err(e) => {
                warn!(error = %e, "error saving task");
                self.last_error = Some(e);
                FormEvent::Failed
            }
        }
    }

    fn ensure_editable(&self) -> Result<(), ActionError> {
        if self.is_submitting() {
            Err(ActionError::SubmissionInFlight)
        } else {
            Ok(())
        }
    }
}
