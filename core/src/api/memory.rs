use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::api::{ApiError, TaskApi};
use crate::model::task::{parse_wire_date, Task, TaskId, TaskPayload};

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Create,
    Update(TaskId),
    Remove(TaskId),
}

#[derive(Default)]
struct MemoryState {
    tasks: Vec<Task>,
    calls: Vec<Call>,
    failures: VecDeque<ApiError>,
    gate: Option<Arc<Semaphore>>,
}

/// In-process stand-in for the REST backend.
///
/// Plays the server's role: it mints ids, keeps insertion order and answers
/// unknown ids with 404. Every call is recorded. Queued failures are returned
/// by the next calls in order, and an optional gate holds each call until a
/// permit is released.
#[derive(Default)]
pub struct MemoryTaskApi {
    state: Mutex<MemoryState>,
}

impl MemoryTaskApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let api = Self::new();
        api.lock().tasks = tasks;
        api
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Makes the next call fail with `error` instead of touching the data.
    pub fn fail_next(&self, error: ApiError) {
        self.lock().failures.push_back(error);
    }

    /// Holds every subsequent call until a permit is added to the returned
    /// semaphore.
    pub fn gate(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.lock().gate = Some(gate.clone());
        gate
    }

    pub fn open_gate(&self) {
        if let Some(gate) = self.lock().gate.take() {
            gate.close();
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panicking test thread must not wedge the others.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn enter(&self, call: Call) -> Result<(), ApiError> {
        let gate = {
            let mut state = self.lock();
            state.calls.push(call);
            state.gate.clone()
        };
        if let Some(gate) = gate {
            // A closed gate lets everything through.
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        match self.lock().failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn not_found(method: &'static str, id: &TaskId) -> ApiError {
    ApiError::Status {
        method,
        url: format!("/tasks/{}", id),
        status: 404,
        body: "Task not found".to_string(),
    }
}

impl TaskApi for MemoryTaskApi {
    async fn list(&self) -> Result<Vec<Task>, ApiError> {
        self.enter(Call::List).await?;
        Ok(self.lock().tasks.clone())
    }

    async fn create(&self, payload: &TaskPayload) -> Result<Task, ApiError> {
        self.enter(Call::Create).await?;
        if payload.title.trim().is_empty() {
            return Err(ApiError::Status {
                method: "POST",
                url: "/tasks".to_string(),
                status: 400,
                body: "title is required".to_string(),
            });
        }

        let task = Task {
            id: TaskId::new(Uuid::new_v4().simple().to_string()),
            title: payload.title.clone(),
            description: payload.description.clone(),
            status: payload.status,
            due_date: payload.due_date.as_deref().and_then(parse_wire_date),
        };
        self.lock().tasks.push(task.clone());
        Ok(task)
    }

    async fn update(&self, id: &TaskId, payload: &TaskPayload) -> Result<Task, ApiError> {
        self.enter(Call::Update(id.clone())).await?;
        let mut state = self.lock();
        let task = state
            .tasks
            .iter_mut()
            .find(|t| t.id == *id)
            .ok_or_else(|| not_found("PATCH", id))?;

        task.title = payload.title.clone();
        if payload.description.is_some() {
            task.description = payload.description.clone();
        }
        task.status = payload.status;
        task.due_date = payload.due_date.as_deref().and_then(parse_wire_date);
        Ok(task.clone())
    }

    async fn remove(&self, id: &TaskId) -> Result<(), ApiError> {
        self.enter(Call::Remove(id.clone())).await?;
        let mut state = self.lock();
        let before = state.tasks.len();
        state.tasks.retain(|t| t.id != *id);
        if state.tasks.len() == before {
            return Err(not_found("DELETE", id));
        }
        Ok(())
    }
}
