use std::cell::Cell;

use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::error::StoreError;
use crate::remote::TaskRemote;
use crate::task::{Task, TaskId};

/// What every view reads: the collection in remote order plus the one-shot
/// initial-load flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreState {
    pub tasks: Vec<Task>,
    pub loading: bool,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            loading: true,
        }
    }
}

impl StoreState {
    pub fn find(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }
}

/// Single authority over the task collection for one application session.
///
/// Local state changes only after the remote call it depends on has resolved;
/// a failed call never touches the collection. Every change is published on a
/// watch channel so all subscribed views see the same sequence of states.
#[derive(Debug)]
pub struct TaskStore<R> {
    remote: R,
    state: watch::Sender<StoreState>,
    initialized: Cell<bool>,
}

impl<R: TaskRemote> TaskStore<R> {
    pub fn new(remote: R) -> Self {
        Self {
            remote,
            state: watch::Sender::new(StoreState::default()),
            initialized: Cell::new(false),
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> StoreState {
        self.state.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Runs the first fetch. Later calls are no-ops.
    #[instrument(skip(self))]
    pub async fn initialize(&self) {
        if self.initialized.replace(true) {
            debug!("store already initialized");
            return;
        }
        info!("initializing task store");
        self.refresh().await;
    }

    /// Replaces the collection with the remote one.
    ///
    /// On failure the previous collection stays. `loading` goes false either
    /// way. Overlapping refreshes are not coordinated: whichever resolves last
    /// wins.
    #[instrument(skip(self))]
    pub async fn refresh(&self) {
        match self.remote.list().await {
            Ok(tasks) => {
                debug!(count = tasks.len(), "refreshed task collection");
                self.state.send_modify(|state| {
                    state.tasks = tasks;
                    state.loading = false;
                });
            }
            Err(err) => {
                let err = StoreError::Fetch(err);
                warn!(error = %err, "keeping previous task collection");
                self.state.send_if_modified(|state| {
                    let was_loading = state.loading;
                    state.loading = false;
                    was_loading
                });
            }
        }
    }

    /// Creates a task remotely, then re-fetches so the server-assigned id and
    /// timestamp come from the server.
    #[instrument(skip(self, title), fields(title_len = title.len()))]
    pub async fn add_todo(&self, title: &str) -> Result<(), StoreError> {
        if title.trim().is_empty() {
            debug!("rejected blank title");
            return Err(StoreError::EmptyTitle);
        }

        self.remote.create(title).await.map_err(|err| {
            let err = StoreError::Create(err);
            warn!(error = %err, "create rejected");
            err
        })?;

        info!("task created");
        self.refresh().await;
        Ok(())
    }

    /// Flips completion remotely and patches only the matching entry.
    #[instrument(skip(self))]
    pub async fn toggle_todo(&self, id: TaskId, current_status: bool) -> Result<(), StoreError> {
        let next = !current_status;
        self.remote
            .set_completion(id, next)
            .await
            .map_err(|source| {
                let err = StoreError::Update { id, source };
                warn!(error = %err, "completion update rejected");
                err
            })?;

        self.state.send_if_modified(|state| {
            let mut changed = false;
            for task in state.tasks.iter_mut().filter(|task| task.id == id) {
                changed |= task.is_completed != next;
                task.is_completed = next;
            }
            changed
        });
        info!(id, completed = next, "task completion updated");
        Ok(())
    }

    /// Removes remotely, then drops the matching entry locally.
    #[instrument(skip(self))]
    pub async fn delete_todo(&self, id: TaskId) -> Result<(), StoreError> {
        self.remote.remove(id).await.map_err(|source| {
            let err = StoreError::Delete { id, source };
            warn!(error = %err, "delete rejected");
            err
        })?;

        self.state.send_if_modified(|state| {
            let before = state.tasks.len();
            state.tasks.retain(|task| task.id != id);
            state.tasks.len() != before
        });
        info!(id, "task deleted");
        Ok(())
    }
}
