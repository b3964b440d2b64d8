pub mod http;
pub mod memory;

use std::future::Future;

use thiserror::Error;

use crate::model::task::{Task, TaskId, TaskPayload};

pub use http::HttpTaskApi;
pub use memory::{Call, MemoryTaskApi};

/// Failure of a single gateway round trip.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("{method} {url} failed: {message}")]
    Transport {
        method: &'static str,
        url: String,
        message: String,
    },
    #[error("{method} {url} failed ({status}): {body}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },
    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },
    /// The request stopped without producing a response.
    #[error("request to {action} was interrupted")]
    Interrupted { action: String },
}

impl ApiError {
    /// Connection problems and 5xx responses are worth retrying; 4xx and
    /// undecodable bodies are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transport { .. } => true,
            ApiError::Status { status, .. } => *status >= 500,
            ApiError::Decode { .. } => false,
            ApiError::Interrupted { .. } => true,
        }
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The four REST operations the client depends on. One call is one round
/// trip: no retries, no caching.
pub trait TaskApi: Send + Sync {
    fn list(&self) -> impl Future<Output = Result<Vec<Task>, ApiError>> + Send;

    fn create(&self, payload: &TaskPayload) -> impl Future<Output = Result<Task, ApiError>> + Send;

    fn update(
        &self,
        id: &TaskId,
        payload: &TaskPayload,
    ) -> impl Future<Output = Result<Task, ApiError>> + Send;

    fn remove(&self, id: &TaskId) -> impl Future<Output = Result<(), ApiError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        let transport = ApiError::Transport {
            method: "GET",
            url: "http://localhost:5000/api/tasks".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(transport.is_retryable());

        let server = ApiError::Status {
            method: "PATCH",
            url: "x".to_string(),
            status: 503,
            body: String::new(),
        };
        assert!(server.is_retryable());
        assert_eq!(server.http_status(), Some(503));

        let missing = ApiError::Status {
            method: "DELETE",
            url: "x".to_string(),
            status: 404,
            body: "not found".to_string(),
        };
        assert!(!missing.is_retryable());
        assert_eq!(
            missing.to_string(),
            "DELETE x failed (404): not found"
        );
    }
}
