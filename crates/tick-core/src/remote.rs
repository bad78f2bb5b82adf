use std::future::Future;

use reqwest::{Client, Method, StatusCode};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::RemoteError;
use crate::task::{CompletionPatch, NewTask, Task, TaskId};

const COLLECTION_SEGMENT: &str = "todos";

/// The four exchanges the store performs against the task collection.
///
/// Each call is exactly one request, with no retry. Success is judged only by
/// the response status.
pub trait TaskRemote {
    fn list(&self) -> impl Future<Output = Result<Vec<Task>, RemoteError>>;

    fn create(&self, title: &str) -> impl Future<Output = Result<(), RemoteError>>;

    fn set_completion(
        &self,
        id: TaskId,
        completed: bool,
    ) -> impl Future<Output = Result<(), RemoteError>>;

    fn remove(&self, id: TaskId) -> impl Future<Output = Result<(), RemoteError>>;
}

#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    base: Url,
}

impl HttpRemote {
    pub fn new(base_url: &str) -> Result<Self, RemoteError> {
        let base = Url::parse(base_url.trim())
            .map_err(|err| RemoteError::InvalidBaseUrl(format!("{base_url}: {err}")))?;
        if base.cannot_be_a_base() {
            return Err(RemoteError::InvalidBaseUrl(base_url.to_string()));
        }

        let client = Client::builder()
            .user_agent(concat!("tick/", env!("CARGO_PKG_VERSION")))
            .build()?;

        debug!(base = %base, "built HTTP task remote");
        Ok(Self { client, base })
    }

    fn endpoint(&self, id: Option<TaskId>) -> Result<Url, RemoteError> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| RemoteError::InvalidBaseUrl(self.base.to_string()))?;
            segments.pop_if_empty().push(COLLECTION_SEGMENT);
            if let Some(id) = id {
                segments.push(&id.to_string());
            }
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, RemoteError> {
        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(body) = body.as_ref() {
            request = request.json(body);
        }

        let response = request.send().await.inspect_err(|err| {
            warn!(%method, %url, error = %err, "task request failed to complete");
        })?;

        let status = response.status();
        debug!(%method, %url, status = status.as_u16(), "task request answered");
        ensure_success(status).inspect_err(|err| {
            warn!(%method, %url, error = %err, "task request rejected");
        })?;
        Ok(response)
    }
}

impl TaskRemote for HttpRemote {
    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<Task>, RemoteError> {
        let url = self.endpoint(None)?;
        let response = self.send(Method::GET, url, None).await?;
        let body = response.text().await?;
        let tasks = decode_collection(&body)?;
        debug!(count = tasks.len(), "decoded task collection");
        Ok(tasks)
    }

    #[instrument(skip(self, title), fields(title_len = title.len()))]
    async fn create(&self, title: &str) -> Result<(), RemoteError> {
        let url = self.endpoint(None)?;
        let body = serde_json::to_value(NewTask {
            title: title.to_string(),
        })?;
        self.send(Method::POST, url, Some(body)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_completion(&self, id: TaskId, completed: bool) -> Result<(), RemoteError> {
        let url = self.endpoint(Some(id))?;
        let body = serde_json::to_value(CompletionPatch {
            is_completed: completed,
        })?;
        self.send(Method::PATCH, url, Some(body)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove(&self, id: TaskId) -> Result<(), RemoteError> {
        let url = self.endpoint(Some(id))?;
        self.send(Method::DELETE, url, None).await?;
        Ok(())
    }
}

fn ensure_success(status: StatusCode) -> Result<(), RemoteError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(RemoteError::Status {
            status: status.as_u16(),
        })
    }
}

/// A `null` or empty body is an empty collection, not an error.
fn decode_collection(body: &str) -> Result<Vec<Task>, RemoteError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let tasks: Option<Vec<Task>> = serde_json::from_str(body)?;
    Ok(tasks.unwrap_or_default())
}
