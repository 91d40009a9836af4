use std::sync::Arc;

use shared::domain::{NewProject, Project};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::{error::ControllerError, in_flight::InFlight, OrderBy, RemoteTable};

/// State backing the project list view: the fetched rows, the create form
/// buffer, and the busy/error flags.
pub struct ProjectListController {
    table: Arc<dyn RemoteTable>,
    in_flight: InFlight,
    inner: Mutex<ListState>,
}

#[derive(Default)]
struct ListState {
    records: Vec<Project>,
    pending: NewProject,
    last_error: Option<ControllerError>,
    fetch_generation: u64,
    closed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectListSnapshot {
    pub records: Vec<Project>,
    pub pending: NewProject,
    pub busy: bool,
    pub last_error: Option<ControllerError>,
}

impl ProjectListController {
    /// Builds a controller without loading anything. Views should use [`Self::mount`].
    pub fn new(table: Arc<dyn RemoteTable>) -> Arc<Self> {
        Arc::new(Self {
            table,
            in_flight: InFlight::default(),
            inner: Mutex::new(ListState::default()),
        })
    }

    /// Builds the controller and performs the initial fetch. A failed initial
    /// fetch is recorded in `last_error`, not returned.
    pub async fn mount(table: Arc<dyn RemoteTable>) -> Arc<Self> {
        let controller = Self::new(table);
        let _ = controller.fetch_all().await;
        controller
    }

    /// Reloads every project, newest first. Only the most recently issued
    /// fetch may replace the list; a superseded result is dropped.
    pub async fn fetch_all(&self) -> Result<(), ControllerError> {
        let _busy = self.in_flight.enter();
        let generation = {
            let mut inner = self.inner.lock().await;
            inner.fetch_generation += 1;
            inner.fetch_generation
        };

        let result = self.table.select_all(&OrderBy::newest_first()).await;

        let mut inner = self.inner.lock().await;
        let current = !inner.closed && generation == inner.fetch_generation;
        match result {
            Ok(records) => {
                if current {
                    info!(count = records.len(), "projects: fetched");
                    inner.records = records;
                    inner.last_error = None;
                } else {
                    debug!(
                        generation,
                        latest = inner.fetch_generation,
                        "projects: discarding superseded fetch result"
                    );
                }
                Ok(())
            }
            Err(err) => {
                error!(generation, "projects: fetch failed: {err:#}");
                if current {
                    inner.last_error = Some(ControllerError::FetchFailed);
                }
                Err(ControllerError::FetchFailed)
            }
        }
    }

    /// Inserts `input` and appends the stored row to the end of the list.
    /// The list is not re-sorted, so a fresh row sits after older ones until
    /// the next fetch.
    pub async fn create_one(&self, input: NewProject) -> Result<Project, ControllerError> {
        if !input.has_name() {
            let err = ControllerError::InvalidInput("project name is required".to_string());
            self.inner.lock().await.last_error = Some(err.clone());
            return Err(err);
        }

        let _busy = self.in_flight.enter();
        self.inner.lock().await.last_error = None;

        let result = self.table.insert_one(&input).await;

        let mut inner = self.inner.lock().await;
        match result {
            Ok(project) => {
                if inner.closed {
                    debug!(project_id = %project.id, "projects: controller closed, dropping created row");
                    return Ok(project);
                }
                info!(project_id = %project.id, name = %project.name, "projects: created");
                inner.records.push(project.clone());
                inner.pending = NewProject::default();
                Ok(project)
            }
            Err(err) => {
                error!("projects: create failed: {err:#}");
                if !inner.closed {
                    inner.last_error = Some(ControllerError::CreateFailed);
                }
                Err(ControllerError::CreateFailed)
            }
        }
    }

    /// Submits the form buffer.
    pub async fn submit_pending(&self) -> Result<Project, ControllerError> {
        let input = self.inner.lock().await.pending.clone();
        self.create_one(input).await
    }

    pub async fn set_pending_name(&self, name: impl Into<String>) {
        self.inner.lock().await.pending.name = name.into();
    }

    pub async fn set_pending_description(&self, description: impl Into<String>) {
        self.inner.lock().await.pending.description = description.into();
    }

    /// Stops applying results; calls still in flight resolve into nothing.
    pub async fn close(&self) {
        self.inner.lock().await.closed = true;
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_busy()
    }

    pub async fn records(&self) -> Vec<Project> {
        self.inner.lock().await.records.clone()
    }

    pub async fn snapshot(&self) -> ProjectListSnapshot {
        let inner = self.inner.lock().await;
        ProjectListSnapshot {
            records: inner.records.clone(),
            pending: inner.pending.clone(),
            busy: self.in_flight.is_busy(),
            last_error: inner.last_error.clone(),
        }
    }
}

#[cfg(test)]
#[path = "tests/projects_tests.rs"]
mod tests;
