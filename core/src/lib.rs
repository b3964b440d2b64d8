pub mod api;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod model;
pub mod reconcile;
pub mod time;

pub use api::{ApiError, HttpTaskApi, MemoryTaskApi, TaskApi};
pub use config::{Config, Overrides};
pub use controller::{
    ActionError, Completion, FormEvent, FormMode, Origin, Outbound, Reply, Request,
    TaskFormController, TaskListController, Workspace,
};
pub use dispatch::{execute, settle, Dispatcher};
pub use model::draft::{Draft, Field, FieldErrors};
pub use model::task::{Status, Task, TaskId, TaskPayload};
pub use reconcile::ReconcileStrategy;
pub use time::{format_due, parse_human_date};
