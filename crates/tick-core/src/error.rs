//! Failure types shared by the remote client and the task store.

use crate::task::TaskId;

/// One failed exchange with the remote task collection.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server responded with HTTP {status}")]
    Status { status: u16 },

    #[error("invalid response payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failures surfaced at the store boundary.
///
/// `Fetch` is only ever logged; the others are returned to the caller so the
/// view can raise an alert.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("task title must not be empty")]
    EmptyTitle,

    #[error("failed to fetch tasks: {0}")]
    Fetch(#[source] RemoteError),

    #[error("failed to create task: {0}")]
    Create(#[source] RemoteError),

    #[error("failed to update task {id}: {source}")]
    Update {
        id: TaskId,
        #[source]
        source: RemoteError,
    },

    #[error("failed to delete task {id}: {source}")]
    Delete {
        id: TaskId,
        #[source]
        source: RemoteError,
    },
}
