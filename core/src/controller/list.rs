use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::controller::form::{FormEvent, TaskFormController};
use crate::controller::{ActionError, Completion, Origin, Outbound, Reply, Request, Ticket};
use crate::model::task::{Status, Task, TaskId, TaskPayload};
use crate::reconcile::{apply_removed, apply_saved, ReconcileStrategy};

/// A request that failed and can be issued again with `retry`.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedOperation {
    pub request: Request,
    pub error: ApiError,
}

impl FailedOperation {
    pub fn message(&self) -> String {
        format!("Could not {}: {}", self.request.describe(), self.error)
    }
}

/// Owns the cached task collection and mediates toggle, edit and delete.
pub struct TaskListController {
    tasks: Vec<Task>,
    strategy: ReconcileStrategy,
    fetch: Option<Ticket>,
    mutations: Vec<(Ticket, Request)>,
    editing: Option<TaskFormController>,
    pending_delete: Option<TaskId>,
    last_error: Option<FailedOperation>,
}

impl TaskListController {
    pub fn new(strategy: ReconcileStrategy) -> Self {
        Self {
            tasks: Vec::new(),
            strategy,
            fetch: None,
            mutations: Vec::new(),
            editing: None,
            pending_delete: None,
            last_error: None,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == *id)
    }

    pub fn strategy(&self) -> ReconcileStrategy {
        self.strategy
    }

    pub fn is_loading(&self) -> bool {
        self.fetch.is_some()
    }

    pub fn pending_mutations(&self) -> usize {
        self.mutations.len()
    }

    pub fn last_error(&self) -> Option<&FailedOperation> {
        self.last_error.as_ref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    pub fn mount(&mut self) -> Outbound {
        self.refresh()
    }

    /// Requests the full collection. A newer fetch supersedes one that is
    /// still running.
    pub fn refresh(&mut self) -> Outbound {
        let outbound = Outbound::new(Origin::List, Request::List);
        if let Some(old) = self.fetch.replace(outbound.ticket) {
            debug!(%old, new = %outbound.ticket, "superseding fetch");
        }
        outbound
    }

    /// Flips between completed and pending. An in-progress task becomes
    /// completed and will come back as pending.
    pub fn toggle(&mut self, id: &TaskId) -> Result<Outbound, ActionError> {
        self.send_status(id, Status::toggled)
    }

    /// Moves the task one step along pending -> in-progress -> completed.
    pub fn advance(&mut self, id: &TaskId) -> Result<Outbound, ActionError> {
        self.send_status(id, Status::advanced)
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    /// Edit and delete are offered only while no edit form is open.
    pub fn row_actions_enabled(&self) -> bool {
        !self.is_editing()
    }

    pub fn begin_edit(&mut self, id: &TaskId) -> Result<(), ActionError> {
        if self.is_editing() {
            return Err(ActionError::EditInProgress);
        }
        let task = self.get(id).ok_or_else(|| ActionError::UnknownTask(id.clone()))?;
        let form = TaskFormController::for_task(Origin::EditForm, task);
        self.editing = Some(form);
        Ok(())
    }

    pub fn edit_form(&self) -> Option<&TaskFormController> {
        self.editing.as_ref()
    }

    pub fn edit_form_mut(&mut self) -> Option<&mut TaskFormController> {
        self.editing.as_mut()
    }

    pub fn submit_edit(&mut self, today: NaiveDate) -> Result<Outbound, ActionError> {
        self.editing.as_mut().ok_or(ActionError::NoForm)?.submit(today)
    }

    /// Closes the edit form. Refused while its save is running, so a save
    /// the server accepts is always reconciled.
    pub fn cancel_edit(&mut self) -> Result<(), ActionError> {
        if self.editing.as_ref().is_some_and(|f| f.is_submitting()) {
            return Err(ActionError::SubmissionInFlight);
        }
        if self.editing.take().is_some() {
            debug!("edit cancelled");
        }
        Ok(())
    }

    pub fn request_delete(&mut self, id: &TaskId) -> Result<(), ActionError> {
        if self.is_editing() {
            return Err(ActionError::EditInProgress);
        }
        if self.get(id).is_none() {
            return Err(ActionError::UnknownTask(id.clone()));
        }
        self.pending_delete = Some(id.clone());
        Ok(())
    }

    pub fn pending_delete(&self) -> Option<&TaskId> {
        self.pending_delete.as_ref()
    }

    /// Answers the delete prompt. Declining is a no-op.
    pub fn confirm_delete(&mut self, confirmed: bool) -> Result<Option<Outbound>, ActionError> {
        let id = self.pending_delete.take().ok_or(ActionError::NoPendingConfirmation)?;
        if !confirmed {
            debug!(%id, "delete declined");
            return Ok(None);
        }
        Ok(Some(self.send_mutation(Request::Remove(id))))
    }

    /// Re-issues the last failed request.
    pub fn retry(&mut self) -> Result<Outbound, ActionError> {
        let failed = self.last_error.take().ok_or(ActionError::NothingToRetry)?;
        info!(action = %failed.request.describe(), "retrying");
        Ok(match failed.request {
            Request::List => self.refresh(),
            request => self.send_mutation(request),
        })
    }

    /// Applies a completion addressed to the list or its edit form and
    /// returns the follow-up request, if any.
    pub fn handle(&mut self, completion: Completion) -> Option<Outbound> {
        match completion.origin {
            Origin::EditForm => self.handle_edit(completion),
            Origin::List if self.fetch == Some(completion.ticket) => {
                self.fetch = None;
                self.handle_fetch(completion.result);
                None
            }
            Origin::List => self.handle_mutation(completion),
            Origin::CreateForm => {
                warn!(ticket = %completion.ticket, "create form completion routed to the list");
                None
            }
        }
    }

    /// Catches up with the server after a mutation succeeded.
    pub(crate) fn reconcile(&mut self, reply: Reply) -> Option<Outbound> {
        match self.strategy {
            ReconcileStrategy::FullReload => Some(self.refresh()),
            ReconcileStrategy::PatchById => {
                match reply {
                    Reply::Saved(task) => apply_saved(&mut self.tasks, task),
                    Reply::Removed(id) => apply_removed(&mut self.tasks, &id),
                    Reply::Tasks(tasks) => self.tasks = tasks,
                }
                None
            }
        }
    }

    fn send_status(&mut self, id: &TaskId, next: fn(Status) -> Status) -> Result<Outbound, ActionError> {
        let task = self.get(id).ok_or_else(|| ActionError::UnknownTask(id.clone()))?;
        let mut payload = TaskPayload::from(task);
        payload.status = next(task.status);
        Ok(self.send_mutation(Request::Update(id.clone(), payload)))
    }

    fn send_mutation(&mut self, request: Request) -> Outbound {
        let outbound = Outbound::new(Origin::List, request);
        debug!(ticket = %outbound.ticket, action = %outbound.request.describe(), "mutation sent");
        self.mutations.push((outbound.ticket, outbound.request.clone()));
        outbound
    }

    fn handle_fetch(&mut self, result: Result<Reply, ApiError>) {
        match result {
            Ok(Reply::Tasks(tasks)) => {
                info!(count = tasks.len(), "task list loaded");
                self.tasks = tasks;
                if matches!(self.last_error, Some(FailedOperation { request: Request::List, .. })) {
                    self.last_error = None;
                }
            }
            Ok(other) => warn!(reply = ?other, "unexpected reply to a fetch"),
            Err(error) => {
                // Keep showing the previous collection.
                warn!(%error, "error fetching tasks");
                match &self.last_error {
                    // Retrying the mutation re-fetches as well.
                    Some(failed) if failed.request.is_mutation() => {
                        debug!(action = %failed.request.describe(), "keeping earlier failure for retry");
                    }
                    _ => {
                        self.last_error = Some(FailedOperation {
                            request: Request::List,
                            error,
                        });
                    }
                }
            }
        }
    }

    fn handle_mutation(&mut self, completion: Completion) -> Option<Outbound> {
        let Some(pos) = self.mutations.iter().position(|(t, _)| *t == completion.ticket) else {
            debug!(ticket = %completion.ticket, "ignoring stale list completion");
            return None;
        };
        let (_, request) = self.mutations.remove(pos);

        match completion.result {
            Ok(reply) => {
                debug!(action = %request.describe(), "mutation applied");
                self.reconcile(reply)
            }
            Err(error) => {
                warn!(%error, action = %request.describe(), "error updating tasks");
                self.last_error = Some(FailedOperation { request, error });
                None
            }
        }
    }

    fn handle_edit(&mut self, completion: Completion) -> Option<Outbound> {
        let Some(form) = self.editing.as_mut() else {
            debug!(ticket = %completion.ticket, "edit form already closed");
            return None;
        };
        match form.complete(completion) {
            FormEvent::Saved(task) => {
                self.editing = None;
                self.reconcile(Reply::Saved(task))
            }
            FormEvent::Failed | FormEvent::Stale => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::draft::Field;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 6).unwrap()
    }

    fn sample() -> Vec<Task> {
        vec![
            Task::new(TaskId::new("1"), "Buy milk"),
            Task::new(TaskId::new("2"), "Write report").with_status(Status::InProgress),
            Task::new(TaskId::new("3"), "Call mom").with_status(Status::Completed),
        ]
    }

    fn loaded(strategy: ReconcileStrategy) -> TaskListController {
        let mut list = TaskListController::new(strategy);
        let fetch = list.mount();
        assert!(list.is_loading());
        let follow = list.handle(Completion::new(fetch.ticket, fetch.origin, Ok(Reply::Tasks(sample()))));
        assert!(follow.is_none());
        assert!(!list.is_loading());
        list
    }

    fn boom() -> ApiError {
        ApiError::Transport {
            method: "GET",
            url: "/tasks".to_string(),
            message: "connection refused".to_string(),
        }
    }

    fn id(s: &str) -> TaskId {
        TaskId::new(s)
    }

    #[test]
    fn fetch_keeps_server_order() {
        let list = loaded(ReconcileStrategy::FullReload);
        let titles: Vec<&str> = list.tasks().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Buy milk", "Write report", "Call mom"]);
    }

    #[test]
    fn failed_fetch_keeps_previous_collection() {
        let mut list = loaded(ReconcileStrategy::FullReload);
        let fetch = list.refresh();
        list.handle(Completion::new(fetch.ticket, fetch.origin, Err(boom())));

        assert_eq!(list.tasks().len(), 3);
        assert!(!list.is_loading());
        assert_eq!(list.last_error().map(|e| &e.request), Some(&Request::List));

        let retry = list.retry().unwrap();
        assert_eq!(retry.request, Request::List);
        assert!(list.is_loading());
        assert!(list.last_error().is_none());
    }

    #[test]
    fn failed_fetch_does_not_hide_failed_mutation() {
        let mut list = loaded(ReconcileStrategy::FullReload);
        let toggle = list.toggle(&id("1")).unwrap();
        list.handle(Completion::new(toggle.ticket, toggle.origin, Err(boom())));

        let fetch = list.refresh();
        list.handle(Completion::new(fetch.ticket, fetch.origin, Err(boom())));
        assert!(!list.is_loading());
        assert_eq!(list.last_error().map(|e| &e.request), Some(&toggle.request));

        let retry = list.retry().unwrap();
        assert_eq!(retry.request, toggle.request);
        let follow = list.handle(Completion::new(
            retry.ticket,
            retry.origin,
            Ok(Reply::Saved(Task::new(id("1"), "Buy milk").with_status(Status::Completed))),
        ));
        assert_eq!(follow.map(|o| o.request), Some(Request::List));
    }

    #[test]
    fn newer_fetch_supersedes_older() {
        let mut list = loaded(ReconcileStrategy::FullReload);
        let old = list.refresh();
        let new = list.refresh();

        list.handle(Completion::new(old.ticket, old.origin, Ok(Reply::Tasks(vec![]))));
        assert_eq!(list.tasks().len(), 3);
        assert!(list.is_loading());

        list.handle(Completion::new(new.ticket, new.origin, Ok(Reply::Tasks(vec![sample().remove(0)]))));
        assert_eq!(list.tasks().len(), 1);
    }

    #[test]
    fn toggle_sends_whole_task_with_flipped_status() {
        let mut list = loaded(ReconcileStrategy::FullReload);

        let out = list.toggle(&id("1")).unwrap();
        match &out.request {
            Request::Update(target, payload) => {
                assert_eq!(target, &id("1"));
                assert_eq!(payload.title, "Buy milk");
                assert_eq!(payload.status, Status::Completed);
            }
            other => panic!("expected update, got {:?}", other),
        }

        let out = list.toggle(&id("3")).unwrap();
        assert!(matches!(&out.request, Request::Update(_, p) if p.status == Status::Pending));

        let out = list.toggle(&id("2")).unwrap();
        assert!(matches!(&out.request, Request::Update(_, p) if p.status == Status::Completed));

        let out = list.advance(&id("2")).unwrap();
        assert!(matches!(&out.request, Request::Update(_, p) if p.status == Status::Completed));
        let out = list.advance(&id("1")).unwrap();
        assert!(matches!(&out.request, Request::Update(_, p) if p.status == Status::InProgress));
    }

    #[test]
    fn successful_mutation_triggers_one_fetch() {
        let mut list = loaded(ReconcileStrategy::FullReload);
        let out = list.toggle(&id("1")).unwrap();
        let saved = sample()[0].clone().with_status(Status::Completed);

        let follow = list.handle(Completion::new(out.ticket, out.origin, Ok(Reply::Saved(saved))));
        assert_eq!(follow.map(|o| o.request), Some(Request::List));
        assert!(list.is_loading());
        assert_eq!(list.pending_mutations(), 0);
    }

    #[test]
    fn patch_strategy_updates_in_place() {
        let mut list = loaded(ReconcileStrategy::PatchById);
        let out = list.toggle(&id("1")).unwrap();
        let saved = sample()[0].clone().with_status(Status::Completed);

        let follow = list.handle(Completion::new(out.ticket, out.origin, Ok(Reply::Saved(saved))));
        assert!(follow.is_none());
        assert_eq!(list.get(&id("1")).map(|t| t.status), Some(Status::Completed));

        list.request_delete(&id("2")).unwrap();
        let out = list.confirm_delete(true).unwrap().unwrap();
        list.handle(Completion::new(out.ticket, out.origin, Ok(Reply::Removed(id("2")))));
        assert!(list.get(&id("2")).is_none());
    }

    #[test]
    fn failed_mutation_is_recorded_and_retryable() {
        let mut list = loaded(ReconcileStrategy::FullReload);
        let out = list.toggle(&id("1")).unwrap();
        let follow = list.handle(Completion::new(out.ticket, out.origin, Err(boom())));

        assert!(follow.is_none());
        let failed = list.last_error().unwrap();
        assert_eq!(failed.request, out.request);
        assert!(failed.message().starts_with("Could not update task 1"));

        let again = list.retry().unwrap();
        assert_eq!(again.request, out.request);
        assert_ne!(again.ticket, out.ticket);
        assert_eq!(list.retry(), Err(ActionError::NothingToRetry));
    }

    #[test]
    fn delete_needs_confirmation() {
        let mut list = loaded(ReconcileStrategy::FullReload);

        list.request_delete(&id("1")).unwrap();
        assert_eq!(list.pending_delete(), Some(&id("1")));
        assert_eq!(list.confirm_delete(false), Ok(None));
        assert_eq!(list.pending_delete(), None);
        assert_eq!(list.confirm_delete(true), Err(ActionError::NoPendingConfirmation));

        list.request_delete(&id("1")).unwrap();
        let out = list.confirm_delete(true).unwrap().unwrap();
        assert_eq!(out.request, Request::Remove(id("1")));
    }

    #[test]
    fn unknown_rows_are_rejected() {
        let mut list = loaded(ReconcileStrategy::FullReload);
        assert_eq!(list.toggle(&id("9")), Err(ActionError::UnknownTask(id("9"))));
        assert_eq!(list.request_delete(&id("9")), Err(ActionError::UnknownTask(id("9"))));
        assert_eq!(list.begin_edit(&id("9")), Err(ActionError::UnknownTask(id("9"))));
    }

    #[test]
    fn open_edit_disables_edit_and_delete_on_every_row() {
        let mut list = loaded(ReconcileStrategy::FullReload);
        list.begin_edit(&id("2")).unwrap();

        assert!(!list.row_actions_enabled());
        for row in ["1", "2", "3"] {
            assert_eq!(list.begin_edit(&id(row)), Err(ActionError::EditInProgress));
            assert_eq!(list.request_delete(&id(row)), Err(ActionError::EditInProgress));
        }
        // The form is bound to the selected row.
        assert_eq!(list.edit_form().unwrap().draft().title, "Write report");

        list.cancel_edit().unwrap();
        assert!(list.row_actions_enabled());
        assert!(list.request_delete(&id("1")).is_ok());
    }

    #[test]
    fn saved_edit_closes_form_and_refetches() {
        let mut list = loaded(ReconcileStrategy::FullReload);
        list.begin_edit(&id("1")).unwrap();
        list.edit_form_mut().unwrap().set_field(Field::Title, "Buy oat milk").unwrap();
        let out = list.submit_edit(today()).unwrap();
        assert_eq!(out.origin, Origin::EditForm);

        let saved = Task::new(id("1"), "Buy oat milk");
        let follow = list.handle(Completion::new(out.ticket, out.origin, Ok(Reply::Saved(saved))));
        assert!(!list.is_editing());
        assert_eq!(follow.map(|o| o.request), Some(Request::List));
    }

    #[test]
    fn failed_edit_keeps_form_open() {
        let mut list = loaded(ReconcileStrategy::FullReload);
        list.begin_edit(&id("1")).unwrap();
        let out = list.submit_edit(today()).unwrap();

        let follow = list.handle(Completion::new(out.ticket, out.origin, Err(boom())));
        assert!(follow.is_none());
        assert!(list.is_editing());
        assert!(list.edit_form().unwrap().last_error().is_some());
        assert!(!list.edit_form().unwrap().is_submitting());
    }

    #[test]
    fn edit_cannot_be_cancelled_while_saving() {
        let mut list = loaded(ReconcileStrategy::FullReload);
        list.begin_edit(&id("1")).unwrap();
        list.edit_form_mut().unwrap().set_field(Field::Title, "Buy oat milk").unwrap();
        let out = list.submit_edit(today()).unwrap();
        assert_eq!(list.cancel_edit(), Err(ActionError::SubmissionInFlight));
        assert!(list.is_editing());

        let follow = list.handle(Completion::new(
            out.ticket,
            out.origin,
            Ok(Reply::Saved(Task::new(id("1"), "Buy oat milk"))),
        ));
        assert_eq!(follow.map(|o| o.request), Some(Request::List));
        assert!(!list.is_editing());
    }

    #[test]
    fn completion_for_a_previous_edit_form_is_ignored() {
        let mut list = loaded(ReconcileStrategy::FullReload);
        list.begin_edit(&id("1")).unwrap();
        let out = list.submit_edit(today()).unwrap();
        list.handle(Completion::new(out.ticket, out.origin, Err(boom())));
        list.cancel_edit().unwrap();

        list.begin_edit(&id("1")).unwrap();
        let follow = list.handle(Completion::new(
            out.ticket,
            out.origin,
            Ok(Reply::Saved(Task::new(id("1"), "Buy milk"))),
        ));
        assert!(follow.is_none());
        assert!(list.is_editing());
    }
}
