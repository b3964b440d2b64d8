use std::collections::VecDeque;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::api::{ApiError, TaskApi};
use crate::controller::{Completion, Origin, Outbound, Reply, Request, Ticket, Workspace};

/// Performs the gateway call for one request.
pub async fn execute<A: TaskApi>(api: &A, request: Request) -> Result<Reply, ApiError> {
    match request {
        Request::List => api.list().await.map(Reply::Tasks),
        Request::Create(payload) => api.create(&payload).await.map(Reply::Saved),
        Request::Update(id, payload) => api.update(&id, &payload).await.map(Reply::Saved),
        Request::Remove(id) => {
            api.remove(&id).await?;
            Ok(Reply::Removed(id))
        }
    }
}

/// Runs requests on a tokio runtime and collects their completions for the
/// UI thread.
pub struct Dispatcher<A> {
    handle: Handle,
    api: Arc<A>,
    tx: UnboundedSender<Completion>,
    rx: UnboundedReceiver<Completion>,
    in_flight: usize,
}

impl<A: TaskApi + 'static> Dispatcher<A> {
    pub fn new(handle: Handle, api: Arc<A>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            handle,
            api,
            tx,
            rx,
            in_flight: 0,
        }
    }

    pub fn dispatch(&mut self, outbound: Outbound) {
        let Outbound { ticket, origin, request } = outbound;
        let action = request.describe();
        debug!(%ticket, %action, "dispatching");

        let api = self.api.clone();
        let mut reply = ReplyGuard {
            tx: Some(self.tx.clone()),
            ticket,
            origin,
            action,
        };
        self.in_flight += 1;
        self.handle.spawn(async move {
            let result = execute(api.as_ref(), request).await;
            reply.send(result);
        });
    }

    pub fn dispatch_all(&mut self, outbounds: impl IntoIterator<Item = Outbound>) {
        for outbound in outbounds {
            self.dispatch(outbound);
        }
    }

    /// Returns a finished completion without waiting.
    pub fn try_next(&mut self) -> Option<Completion> {
        let completion = self.rx.try_recv().ok()?;
        self.in_flight = self.in_flight.saturating_sub(1);
        Some(completion)
    }

    /// Waits for the next completion. `None` when nothing is in flight.
    pub async fn next(&mut self) -> Option<Completion> {
        if self.in_flight == 0 {
            return None;
        }
        let completion = self.rx.recv().await?;
        self.in_flight = self.in_flight.saturating_sub(1);
        Some(completion)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}

/// Delivers exactly one completion per dispatched request. A task that
/// panics or is dropped by the runtime reports `ApiError::Interrupted`.
struct ReplyGuard {
    tx: Option<UnboundedSender<Completion>>,
    ticket: Ticket,
    origin: Origin,
    action: String,
}

impl ReplyGuard {
    fn send(&mut self, result: Result<Reply, ApiError>) {
        if let Some(tx) = self.tx.take() {
            // The receiver is gone once the UI has shut down.
            let _ = tx.send(Completion::new(self.ticket, self.origin, result));
        }
    }
}

impl Drop for ReplyGuard {
    fn drop(&mut self) {
        if self.tx.is_some() {
            warn!(ticket = %self.ticket, action = %self.action, "request ended without a reply");
            let action = std::mem::take(&mut self.action);
            self.send(Err(ApiError::Interrupted { action }));
        }
    }
}

/// Runs `initial` and every follow-up request one after another until the
/// workspace has nothing left to ask for.
pub async fn settle<A: TaskApi>(
    workspace: &mut Workspace,
    api: &A,
    initial: impl IntoIterator<Item = Outbound>,
) {
    let mut queue: VecDeque<Outbound> = initial.into_iter().collect();
    while let Some(Outbound { ticket, origin, request }) = queue.pop_front() {
        let result = execute(api, request).await;
        if let Some(next) = workspace.handle(Completion::new(ticket, origin, result)) {
            queue.push_back(next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Call, MemoryTaskApi};
    use crate::model::task::{Task, TaskId, TaskPayload};
    use crate::reconcile::ReconcileStrategy;

    #[tokio::test]
    async fn execute_maps_requests_to_calls() {
        let api = MemoryTaskApi::with_tasks(vec![Task::new(TaskId::new("1"), "Buy milk")]);

        let reply = execute(&api, Request::Remove(TaskId::new("1"))).await.unwrap();
        assert_eq!(reply, Reply::Removed(TaskId::new("1")));
        assert_eq!(execute(&api, Request::List).await.unwrap(), Reply::Tasks(vec![]));
        assert_eq!(api.calls(), vec![Call::Remove(TaskId::new("1")), Call::List]);
    }

    #[tokio::test]
    async fn dispatcher_delivers_completions() {
        let api = Arc::new(MemoryTaskApi::with_tasks(vec![Task::new(TaskId::new("1"), "Buy milk")]));
        let mut dispatcher = Dispatcher::new(Handle::current(), api);
        let mut ws = Workspace::new(ReconcileStrategy::FullReload);

        let fetch = ws.mount();
        let ticket = fetch.ticket;
        dispatcher.dispatch(fetch);
        assert_eq!(dispatcher.in_flight(), 1);

        let completion = dispatcher.next().await.unwrap();
        assert_eq!(completion.ticket, ticket);
        assert!(ws.handle(completion).is_none());
        assert_eq!(ws.list().tasks().len(), 1);
        assert!(dispatcher.next().await.is_none());
        assert!(dispatcher.try_next().is_none());
    }

    struct PanickingApi;

    impl TaskApi for PanickingApi {
        async fn list(&self) -> Result<Vec<Task>, ApiError> {
            panic!("backend blew up")
        }

        async fn create(&self, _payload: &TaskPayload) -> Result<Task, ApiError> {
            panic!("backend blew up")
        }

        async fn update(&self, _id: &TaskId, _payload: &TaskPayload) -> Result<Task, ApiError> {
            panic!("backend blew up")
        }

        async fn remove(&self, _id: &TaskId) -> Result<(), ApiError> {
            panic!("backend blew up")
        }
    }

    #[tokio::test]
    async fn panicking_request_still_completes() {
        let mut dispatcher = Dispatcher::new(Handle::current(), Arc::new(PanickingApi));
        let mut ws = Workspace::new(ReconcileStrategy::FullReload);

        let fetch = ws.mount();
        let ticket = fetch.ticket;
        dispatcher.dispatch(fetch);

        let completion = dispatcher.next().await.unwrap();
        assert_eq!(completion.ticket, ticket);
        assert!(matches!(completion.result, Err(ApiError::Interrupted { .. })));
        assert_eq!(dispatcher.in_flight(), 0);

        ws.handle(completion);
        assert!(!ws.list().is_loading());
        let failed = ws.list().last_error().unwrap();
        assert!(failed.error.is_retryable());
    }
}
