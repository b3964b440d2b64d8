use anyhow::{anyhow, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::{ApiError, TaskApi};
use crate::config::Config;
use crate::model::task::{Task, TaskId, TaskPayload};

/// REST client for the task backend.
#[derive(Clone)]
pub struct HttpTaskApi {
    http: reqwest::Client,
    base: Url,
    base_url: String,
}

impl HttpTaskApi {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let base_url = config.api_url.trim_end_matches('/').to_string();
        let base = Url::parse(&base_url).with_context(|| format!("invalid API URL: {}", base_url))?;
        if base.cannot_be_a_base() {
            return Err(anyhow!("invalid API URL: {}", base_url));
        }

        Ok(Self {
            http: reqwest::Client::builder().default_headers(headers).build()?,
            base,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, segments: &[&str]) -> String {
        let mut url = self.base.clone();
        // Checked in `new`: the base URL always has a path.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.to_string()
    }

    fn tasks_url(&self) -> String {
        self.url_for(&["tasks"])
    }

    /// Ids are opaque; they are percent-encoded as a single path segment.
    fn task_url(&self, id: &TaskId) -> String {
        self.url_for(&["tasks", id.as_str()])
    }

    async fn send(&self, method: &'static str, url: &str, request: RequestBuilder) -> Result<Response, ApiError> {
        debug!(method, url, "sending request");
        let resp = request.send().await.map_err(|e| ApiError::Transport {
            method,
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                method,
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn decode<T: DeserializeOwned>(url: &str, resp: Response) -> Result<T, ApiError> {
        resp.json::<T>().await.map_err(|e| ApiError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

impl TaskApi for HttpTaskApi {
    async fn list(&self) -> Result<Vec<Task>, ApiError> {
        let url = self.tasks_url();
        let resp = self.send("GET", &url, self.http.get(&url)).await?;
        Self::decode(&url, resp).await
    }

    async fn create(&self, payload: &TaskPayload) -> Result<Task, ApiError> {
        let url = self.tasks_url();
        let resp = self.send("POST", &url, self.http.post(&url).json(payload)).await?;
        Self::decode(&url, resp).await
    }

    async fn update(&self, id: &TaskId, payload: &TaskPayload) -> Result<Task, ApiError> {
        let url = self.task_url(id);
        let resp = self.send("PATCH", &url, self.http.patch(&url).json(payload)).await?;
        Self::decode(&url, resp).await
    }

    async fn remove(&self, id: &TaskId) -> Result<(), ApiError> {
        let url = self.task_url(id);
        // Whatever the server sends back on delete is ignored.
        self.send("DELETE", &url, self.http.delete(&url)).await?;
        Ok(())
    }
}
