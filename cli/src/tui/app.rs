use chrono::{Local, NaiveDate};
use ratatui::widgets::TableState;
use taskdeck_core::{
    ActionError, Completion, Field, Outbound, ReconcileStrategy, Task, TaskId, Workspace,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Form,
    ConfirmDelete,
}

pub struct App {
    pub workspace: Workspace,
    pub state: TableState,
    pub focus: Field,
    pub cursor_position: usize,
    pub notice: Option<String>,
    pub should_quit: bool,
    today: fn() -> NaiveDate,
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

impl App {
    pub fn new(strategy: ReconcileStrategy) -> App {
        App {
            workspace: Workspace::new(strategy),
            state: TableState::default(),
            focus: Field::Title,
            cursor_position: 0,
            notice: None,
            should_quit: false,
            today: local_today,
        }
    }

    pub fn start(&mut self) -> Outbound {
        self.workspace.mount()
    }

    pub fn input_mode(&self) -> InputMode {
        if self.workspace.active_form().is_some() {
            InputMode::Form
        } else if self.workspace.list().pending_delete().is_some() {
            InputMode::ConfirmDelete
        } else {
            InputMode::Normal
        }
    }

    pub fn tasks(&self) -> &[Task] {
        self.workspace.list().tasks()
    }

    pub fn selected_task(&self) -> Option<&Task> {
        self.state.selected().and_then(|i| self.tasks().get(i))
    }

    fn selected_id(&self) -> Option<TaskId> {
        self.selected_task().map(|t| t.id.clone())
    }

    pub fn next(&mut self) {
        if self.tasks().is_empty() { return; }

        let i = match self.state.selected() {
            Some(i) => {
                if i >= self.tasks().len() - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        if self.tasks().is_empty() { return; }

        let i = match self.state.selected() {
            Some(i) => {
                if i == 0 {
                    self.tasks().len() - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    /// Feeds a finished request back into the workspace and returns the
    /// follow-up request, if any.
    pub fn apply(&mut self, completion: Completion) -> Option<Outbound> {
        let next = self.workspace.handle(completion);
        self.clamp_selection();
        next
    }

    fn clamp_selection(&mut self) {
        let len = self.tasks().len();
        match self.state.selected() {
            _ if len == 0 => self.state.select(None),
            Some(i) if i >= len => self.state.select(Some(len - 1)),
            None => self.state.select(Some(0)),
            Some(_) => {}
        }
    }

    fn report(&mut self, result: Result<Outbound, ActionError>) -> Option<Outbound> {
        match result {
            Ok(outbound) => {
                self.notice = None;
                Some(outbound)
            }
            Err(e) => {
                self.notice = Some(e.to_string());
                None
            }
        }
    }

    pub fn refresh(&mut self) -> Outbound {
        self.workspace.list_mut().refresh()
    }

    pub fn toggle_status(&mut self) -> Option<Outbound> {
        let id = self.selected_id()?;
        let result = self.workspace.list_mut().toggle(&id);
        self.report(result)
    }

    pub fn advance_status(&mut self) -> Option<Outbound> {
        let id = self.selected_id()?;
        let result = self.workspace.list_mut().advance(&id);
        self.report(result)
    }

    pub fn retry(&mut self) -> Option<Outbound> {
        let result = self.workspace.list_mut().retry();
        self.report(result)
    }

    pub fn dismiss_error(&mut self) {
        self.workspace.list_mut().dismiss_error();
        self.notice = None;
    }

    pub fn enter_add_mode(&mut self) {
        match self.workspace.open_create() {
            Ok(()) => self.focus_field(Field::Title),
            Err(e) => self.notice = Some(e.to_string()),
        }
    }

    pub fn enter_edit_mode(&mut self) {
        let Some(id) = self.selected_id() else { return };
        match self.workspace.list_mut().begin_edit(&id) {
            Ok(()) => self.focus_field(Field::Title),
            Err(e) => self.notice = Some(e.to_string()),
        }
    }

    pub fn request_delete(&mut self) {
        let Some(id) = self.selected_id() else { return };
        if let Err(e) = self.workspace.list_mut().request_delete(&id) {
            self.notice = Some(e.to_string());
        }
    }

    pub fn confirm_delete(&mut self, confirmed: bool) -> Option<Outbound> {
        match self.workspace.list_mut().confirm_delete(confirmed) {
            Ok(outbound) => outbound,
            Err(e) => {
                self.notice = Some(e.to_string());
                None
            }
        }
    }

    // Form editing

    fn focused_value(&self) -> String {
        self.workspace
            .active_form()
            .map(|f| f.draft().get(self.focus).to_string())
            .unwrap_or_default()
    }

    fn focus_field(&mut self, field: Field) {
        self.focus = field;
        self.cursor_position = self.focused_value().chars().count();
    }

    pub fn next_field(&mut self) {
        self.focus_field(self.focus.next());
    }

    pub fn previous_field(&mut self) {
        self.focus_field(self.focus.previous());
    }

    fn write_focused(&mut self, value: String) -> bool {
        let focus = self.focus;
        match self.workspace.active_form_mut() {
            Some(form) => form.set_field(focus, value).is_ok(),
            None => false,
        }
    }

    pub fn input_char(&mut self, c: char) {
        if self.focus == Field::Status {
            return;
        }
        let mut value = self.focused_value();
        let byte_index: usize = value.chars().take(self.cursor_position).map(|c| c.len_utf8()).sum();
        value.insert(byte_index, c);
        if self.write_focused(value) {
            self.cursor_position += 1;
        }
    }

    pub fn delete_char(&mut self) {
        if self.focus == Field::Status || self.cursor_position == 0 {
            return;
        }
        let mut value = self.focused_value();
        let byte_index: usize = value.chars().take(self.cursor_position - 1).map(|c| c.len_utf8()).sum();
        value.remove(byte_index);
        if self.write_focused(value) {
            self.cursor_position -= 1;
        }
    }

    pub fn move_cursor_left(&mut self) {
        if self.focus == Field::Status {
            self.cycle_status(false);
        } else if self.cursor_position > 0 {
            self.cursor_position -= 1;
        }
    }

    pub fn move_cursor_right(&mut self) {
        if self.focus == Field::Status {
            self.cycle_status(true);
        } else if self.cursor_position < self.focused_value().chars().count() {
            self.cursor_position += 1;
        }
    }

    fn cycle_status(&mut self, forward: bool) {
        if let Some(form) = self.workspace.active_form_mut() {
            let current = form.draft().status;
            let next = if forward { current.advanced() } else { current.retreated() };
            // Ignored while a save is running.
            let _ = form.set_status(next);
        }
    }

    pub fn submit_form(&mut self) -> Option<Outbound> {
        let result = self.workspace.submit_active((self.today)());
        if let Err(ActionError::Invalid(errors)) = &result {
            if errors.get(Field::Title).is_some() {
                self.focus_field(Field::Title);
            }
        }
        self.report(result)
    }

    pub fn cancel_form(&mut self) {
        match self.workspace.cancel_active() {
            Ok(()) => self.notice = None,
            Err(e) => self.notice = Some(e.to_string()),
        }
    }
}
