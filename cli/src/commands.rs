use std::collections::HashSet;
use std::io::{self, BufRead, Write};

use anyhow::{anyhow, bail, Result};
use chrono::{Local, NaiveDate};
use tabled::settings::object::Rows;
use tabled::settings::{Color, Modify, Style};
use tabled::{Table, Tabled};
use taskdeck_core::{
    format_due, settle, Config, Field, ReconcileStrategy, Status, Task, TaskApi, TaskId, Workspace,
};

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Due")]
    due: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Description")]
    description: String,
}

/// Field values given on the command line; `None` leaves the draft alone.
#[derive(Debug, Default)]
pub struct FieldArgs {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<Status>,
    pub due: Option<String>,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

async fn load<A: TaskApi>(api: &A, strategy: ReconcileStrategy) -> Result<Workspace> {
    let mut ws = Workspace::new(strategy);
    let fetch = ws.mount();
    settle(&mut ws, api, [fetch]).await;
    ensure_list_ok(&ws)?;
    Ok(ws)
}

fn ensure_list_ok(ws: &Workspace) -> Result<()> {
    match ws.list().last_error() {
        Some(failed) => Err(anyhow!(failed.message())),
        None => Ok(()),
    }
}

/// Resolves a full id or a unique prefix of one.
fn resolve_id(ws: &Workspace, reference: &str) -> Result<TaskId> {
    let tasks = ws.list().tasks();
    if let Some(task) = tasks.iter().find(|t| t.id.as_str() == reference) {
        return Ok(task.id.clone());
    }

    let matches: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.id.as_str().starts_with(reference))
        .collect();

    match matches.len() {
        1 => Ok(matches[0].id.clone()),
        0 => Err(anyhow!("No task matches '{}'", reference)),
        _ => {
            let ids: Vec<&str> = matches.iter().map(|t| t.id.as_str()).collect();
            Err(anyhow!("Ambiguous id '{}' matches {:?}", reference, ids))
        }
    }
}

fn apply_fields(ws: &mut Workspace, fields: FieldArgs) -> Result<()> {
    let form = ws.active_form_mut().ok_or_else(|| anyhow!("no form is open"))?;
    if let Some(title) = fields.title {
        form.set_field(Field::Title, title)?;
    }
    if let Some(description) = fields.description {
        form.set_field(Field::Description, description)?;
    }
    if let Some(status) = fields.status {
        form.set_status(status)?;
    }
    if let Some(due) = fields.due {
        form.set_field(Field::DueDate, due)?;
    }
    Ok(())
}

fn short_id(id: &TaskId) -> String {
    id.as_str().chars().take(8).collect()
}

pub fn render_table(tasks: &[Task]) -> String {
    let rows: Vec<TaskRow> = tasks
        .iter()
        .map(|task| TaskRow {
            id: short_id(&task.id),
            status: task.status.label().to_string(),
            due: task.due_date.map(format_due).unwrap_or_else(|| "-".to_string()),
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
        })
        .collect();

    let mut table = Table::new(rows);
    table
        .with(Style::modern())
        .with(Modify::new(Rows::first()).with(Color::FG_CYAN));
    table.to_string()
}

pub async fn list<A: TaskApi>(api: &A, strategy: ReconcileStrategy) -> Result<()> {
    let ws = load(api, strategy).await?;
    if ws.list().tasks().is_empty() {
        println!("No tasks found. Add a new task to get started!");
    } else {
        println!("{}", render_table(ws.list().tasks()));
    }
    Ok(())
}

pub async fn add<A: TaskApi>(api: &A, strategy: ReconcileStrategy, fields: FieldArgs) -> Result<()> {
    let mut ws = load(api, strategy).await?;
    let before: HashSet<TaskId> = ws.list().tasks().iter().map(|t| t.id.clone()).collect();

    ws.open_create()?;
    apply_fields(&mut ws, fields)?;
    let out = ws.submit_active(today())?;
    settle(&mut ws, api, [out]).await;

    if let Some(err) = ws.create_form().and_then(|f| f.last_error()) {
        bail!("Could not save task: {}", err);
    }
    ensure_list_ok(&ws)?;

    match ws.list().tasks().iter().find(|t| !before.contains(&t.id)) {
        Some(task) => println!("Task added: {} (ID: {})", task.title, task.id),
        None => println!("Task added."),
    }
    Ok(())
}

pub async fn edit<A: TaskApi>(
    api: &A,
    strategy: ReconcileStrategy,
    reference: &str,
    fields: FieldArgs,
) -> Result<()> {
    let mut ws = load(api, strategy).await?;
    let id = resolve_id(&ws, reference)?;

    ws.list_mut().begin_edit(&id)?;
    apply_fields(&mut ws, fields)?;
    let out = ws.submit_active(today())?;
    settle(&mut ws, api, [out]).await;

    if let Some(err) = ws.list().edit_form().and_then(|f| f.last_error()) {
        bail!("Could not save task: {}", err);
    }
    ensure_list_ok(&ws)?;
    println!("Task updated: {}", id);
    Ok(())
}

/// Runs a status change (`toggle` or `advance`) and reports the new status.
pub async fn change_status<A: TaskApi>(
    api: &A,
    strategy: ReconcileStrategy,
    reference: &str,
    advance: bool,
) -> Result<()> {
    let mut ws = load(api, strategy).await?;
    let id = resolve_id(&ws, reference)?;

    let out = if advance {
        ws.list_mut().advance(&id)?
    } else {
        ws.list_mut().toggle(&id)?
    };
    settle(&mut ws, api, [out]).await;
    ensure_list_ok(&ws)?;

    match ws.list().get(&id) {
        Some(task) => println!("{}: {}", task.title, task.status),
        None => println!("Task {} changed", id),
    }
    Ok(())
}

pub async fn delete<A: TaskApi>(
    api: &A,
    strategy: ReconcileStrategy,
    reference: &str,
    assume_yes: bool,
) -> Result<()> {
    let mut ws = load(api, strategy).await?;
    let id = resolve_id(&ws, reference)?;
    let title = ws.list().get(&id).map(|t| t.title.clone()).unwrap_or_default();

    ws.list_mut().request_delete(&id)?;
    let confirmed = assume_yes || confirm(&format!("Are you sure you want to delete '{}'?", title))?;

    match ws.list_mut().confirm_delete(confirmed)? {
        Some(out) => {
            settle(&mut ws, api, [out]).await;
            ensure_list_ok(&ws)?;
            println!("Task deleted: {}", title);
        }
        None => println!("Delete cancelled."),
    }
    Ok(())
}

pub fn show_config(config: &Config) {
    println!("api_url:   {}", config.api_url);
    println!("reconcile: {}", config.reconcile);
    println!("config:    {}", config.config_file().display());
    println!("log file:  {}", config.log_file().display());
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(parse_answer(&answer))
}

fn parse_answer(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskdeck_core::api::{Call, MemoryTaskApi};

    fn api() -> MemoryTaskApi {
        MemoryTaskApi::with_tasks(vec![
            Task::new(TaskId::new("abc123"), "Buy milk"),
            Task::new(TaskId::new("abd456"), "Write report"),
        ])
    }

    #[tokio::test]
    async fn ids_resolve_by_unique_prefix() {
        let ws = load(&api(), ReconcileStrategy::FullReload).await.unwrap();
        assert_eq!(resolve_id(&ws, "abc").unwrap(), TaskId::new("abc123"));
        assert_eq!(resolve_id(&ws, "abd456").unwrap(), TaskId::new("abd456"));
        assert!(resolve_id(&ws, "ab").is_err());
        assert!(resolve_id(&ws, "zzz").is_err());
    }

    #[tokio::test]
    async fn add_rejects_blank_title_without_calling_the_server() {
        let api = api();
        let fields = FieldArgs {
            title: Some("  ".to_string()),
            ..FieldArgs::default()
        };
        let err = add(&api, ReconcileStrategy::FullReload, fields).await.unwrap_err();
        assert!(err.to_string().contains("Title is required"));
        assert_eq!(api.calls(), vec![Call::List]);
    }

    #[tokio::test]
    async fn edit_and_toggle_update_the_server() {
        let api = api();
        let fields = FieldArgs {
            description: Some("2 litres".to_string()),
            ..FieldArgs::default()
        };
        edit(&api, ReconcileStrategy::FullReload, "abc", fields).await.unwrap();
        change_status(&api, ReconcileStrategy::FullReload, "abc", false).await.unwrap();

        let milk = api.tasks().into_iter().find(|t| t.title == "Buy milk").unwrap();
        assert_eq!(milk.description.as_deref(), Some("2 litres"));
        assert_eq!(milk.status, Status::Completed);
    }

    #[tokio::test]
    async fn delete_with_yes_removes_the_task() {
        let api = api();
        delete(&api, ReconcileStrategy::FullReload, "abd", true).await.unwrap();
        assert_eq!(api.tasks().len(), 1);
    }

    #[test]
    fn only_yes_confirms() {
        assert!(parse_answer("y\n"));
        assert!(parse_answer(" YES "));
        assert!(!parse_answer("\n"));
        assert!(!parse_answer("no"));
    }

    #[test]
    fn table_shows_short_ids_and_due_dates() {
        let mut task = Task::new(TaskId::new("65a1f0c2e4b0a1b2c3d4e5f6"), "Buy milk");
        task.due_date = NaiveDate::from_ymd_opt(2024, 3, 5);
        let rendered = render_table(&[task]);
        assert!(rendered.contains("65a1f0c2"));
        assert!(!rendered.contains("65a1f0c2e"));
        assert!(rendered.contains("Mar 5, 2024"));
    }
}
