//! REST backend for the FocusFlow task API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::{Backend, BackendError};
use crate::auth::SessionProvider;
use crate::config::ApiConfig;
use crate::task::Task;

/// HTTP client for `GET/POST /tasks` and `PUT/DELETE /tasks/{id}`.
pub struct RestBackend {
    base_url: String,
    client: Client,
    session: Arc<dyn SessionProvider>,
}

impl RestBackend {
    /// Create a backend for `base_url` with the given request timeout.
    pub fn new(
        base_url: impl AsRef<str>,
        timeout: Duration,
        session: Arc<dyn SessionProvider>,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Ok(Self {
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
            client,
            session,
        })
    }

    pub fn from_config(config: &ApiConfig, session: Arc<dyn SessionProvider>) -> Result<Self, BackendError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs), session)
    }

    fn tasks_url(&self) -> String {
        format!("{}/tasks", self.base_url)
    }

    fn task_url(&self, remote_id: &str) -> String {
        format!("{}/tasks/{}", self.base_url, remote_id)
    }

    /// Attach the bearer token when a session exists.
    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.current_session() {
            Some(session) => request.bearer_auth(session.token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, BackendError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();
        debug!("{what} -> {status}");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            Err(BackendError::NotFound(format!("{what}: {body}")))
        } else {
            Err(BackendError::Api {
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| BackendError::InvalidData(e.to_string()))
    }
}

#[async_trait]
impl Backend for RestBackend {
    fn backend_type(&self) -> &str {
        "rest"
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, BackendError> {
        let response = self.send(self.client.get(self.tasks_url()), "GET /tasks").await?;
        Self::parse(response).await
    }

    async fn create_task(&self, task: &Task) -> Result<Task, BackendError> {
        let response = self
            .send(self.client.post(self.tasks_url()).json(task), "POST /tasks")
            .await?;
        let created: Task = Self::parse(response).await?;
        if created.remote_id.is_none() {
            return Err(BackendError::InvalidData("created task has no _id".to_string()));
        }
        Ok(created)
    }

    async fn update_task(&self, remote_id: &str, task: &Task) -> Result<Task, BackendError> {
        let what = format!("PUT /tasks/{remote_id}");
        let response = self.send(self.client.put(self.task_url(remote_id)).json(task), &what).await?;
        Self::parse(response).await
    }

    async fn delete_task(&self, remote_id: &str) -> Result<(), BackendError> {
        let what = format!("DELETE /tasks/{remote_id}");
        self.send(self.client.delete(self.task_url(remote_id)), &what).await?;
        Ok(())
    }
}
