use chrono::NaiveDate;
use tracing::debug;

use crate::controller::form::{FormEvent, TaskFormController};
use crate::controller::list::TaskListController;
use crate::controller::{ActionError, Completion, Origin, Outbound, Reply};
use crate::reconcile::ReconcileStrategy;

/// Top-level shell: the task list plus the "add task" dialog.
pub struct Workspace {
    list: TaskListController,
    create: Option<TaskFormController>,
}

impl Workspace {
    pub fn new(strategy: ReconcileStrategy) -> Self {
        Self {
            list: TaskListController::new(strategy),
            create: None,
        }
    }

    pub fn list(&self) -> &TaskListController {
        &self.list
    }

    pub fn list_mut(&mut self) -> &mut TaskListController {
        &mut self.list
    }

    pub fn mount(&mut self) -> Outbound {
        self.list.mount()
    }

    pub fn open_create(&mut self) -> Result<(), ActionError> {
        if self.create.is_some() {
            return Err(ActionError::FormAlreadyOpen);
        }
        if self.list.is_editing() {
            return Err(ActionError::EditInProgress);
        }
        let mut form = TaskFormController::new(Origin::CreateForm);
        form.load(None);
        self.create = Some(form);
        Ok(())
    }

    pub fn create_form(&self) -> Option<&TaskFormController> {
        self.create.as_ref()
    }

    pub fn create_form_mut(&mut self) -> Option<&mut TaskFormController> {
        self.create.as_mut()
    }

    pub fn cancel_create(&mut self) -> Result<(), ActionError> {
        if self.create.as_ref().is_some_and(|f| f.is_submitting()) {
            return Err(ActionError::SubmissionInFlight);
        }
        if self.create.take().is_some() {
            debug!("create cancelled");
        }
        Ok(())
    }

    pub fn submit_create(&mut self, today: NaiveDate) -> Result<Outbound, ActionError> {
        self.create.as_mut().ok_or(ActionError::NoForm)?.submit(today)
    }

    /// The open form, if any. An edit form takes precedence.
    pub fn active_form(&self) -> Option<&TaskFormController> {
        self.list.edit_form().or(self.create.as_ref())
    }

    pub fn active_form_mut(&mut self) -> Option<&mut TaskFormController> {
        if self.list.is_editing() {
            self.list.edit_form_mut()
        } else {
            self.create.as_mut()
        }
    }

    pub fn submit_active(&mut self, today: NaiveDate) -> Result<Outbound, ActionError> {
        if self.list.is_editing() {
            self.list.submit_edit(today)
        } else {
            self.submit_create(today)
        }
    }

    pub fn cancel_active(&mut self) -> Result<(), ActionError> {
        if self.list.is_editing() {
            self.list.cancel_edit()
        } else {
            self.cancel_create()
        }
    }

    /// Routes a completion to its controller and returns the follow-up
    /// request, if any.
    pub fn handle(&mut self, completion: Completion) -> Option<Outbound> {
        match completion.origin {
            Origin::CreateForm => self.handle_create(completion),
            Origin::List | Origin::EditForm => self.list.handle(completion),
        }
    }

    fn handle_create(&mut self, completion: Completion) -> Option<Outbound> {
        let Some(form) = self.create.as_mut() else {
            debug!(ticket = %completion.ticket, "create dialog already closed");
            return None;
        };
        match form.complete(completion) {
            FormEvent::Saved(task) => {
                self.create = None;
                self.list.reconcile(Reply::Saved(task))
            }
            FormEvent::Failed | FormEvent::Stale => None,
        }
    }
}
