//! Shared world state for worktree lifecycle BDD scenarios.

use gropius::bridge::adapters::ScriptedBridgeTransport;
use gropius::bridge::domain::{CommandResponse, CommandTemplate, EndpointResolver};
use gropius::bridge::services::{CommandDispatcher, DispatcherSettings, PollSettings};
use gropius::task::adapters::memory::{InMemoryIssueTracker, InMemoryTaskRepository};
use gropius::task::domain::{RecoveryAction, Task, TaskDraft, TaskId};
use gropius::task::ports::TaskRepository;
use gropius::task::services::{LifecycleSettings, TaskLifecycleError, TaskLifecycleService};
use gropius::worktree::services::WorktreeSlotAllocator;
use mockable::DefaultClock;
use rstest::fixture;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const AGENT_TEMPLATE: &str = "agent --cd {{ worktree_path | shell_quote }} {{ prompt | shell_quote }}";

/// Lifecycle service type used by the scenarios.
pub type Lifecycle = TaskLifecycleService<
    InMemoryTaskRepository,
    InMemoryIssueTracker,
    ScriptedBridgeTransport,
    DefaultClock,
>;

/// Services wired to in-memory adapters.
pub struct Services {
    pub repository: Arc<InMemoryTaskRepository>,
    pub tracker: Arc<InMemoryIssueTracker>,
    pub transport: Arc<ScriptedBridgeTransport>,
    pub slots: Arc<WorktreeSlotAllocator>,
    pub lifecycle: Lifecycle,
}

impl Services {
    /// Wires a lifecycle service over a pool of `slot_count` slots.
    ///
    /// # Errors
    ///
    /// Returns an error when the layout, endpoint or template is invalid.
    pub fn new(slot_count: usize, root_path: &str) -> Result<Self, eyre::Report> {
        let repository = Arc::new(InMemoryTaskRepository::new());
        let tracker = Arc::new(InMemoryIssueTracker::new());
        let transport = Arc::new(ScriptedBridgeTransport::new());
        let slots = Arc::new(WorktreeSlotAllocator::with_layout(slot_count, root_path)?);
        let dispatcher = Arc::new(CommandDispatcher::new(
            Arc::clone(&transport),
            &EndpointResolver::new("http://127.0.0.1:4312/run", "/run", None),
            DispatcherSettings::default(),
        )?);
        let mut settings = LifecycleSettings::new("main", CommandTemplate::new(AGENT_TEMPLATE)?);
        settings.poll = PollSettings {
            interval: Duration::ZERO,
            max_attempts: 5,
            stale_after: Duration::from_secs(300),
        };
        let lifecycle = TaskLifecycleService::new(
            Arc::clone(&repository),
            Arc::clone(&tracker),
            dispatcher,
            Arc::clone(&slots),
            Arc::new(DefaultClock),
            settings,
        );
        Ok(Self {
            repository,
            tracker,
            transport,
            slots,
            lifecycle,
        })
    }
}

/// Scenario world for worktree lifecycle behaviour tests.
#[derive(Default)]
pub struct LifecycleWorld {
    pub services: Option<Services>,
    pub tasks: HashMap<String, TaskId>,
    pub last_error: Option<TaskLifecycleError>,
    pub last_recovery: Option<RecoveryAction>,
}

impl LifecycleWorld {
    /// Returns the wired services.
    ///
    /// # Errors
    ///
    /// Returns an error when no slot pool step has run yet.
    pub fn services(&self) -> Result<&Services, eyre::Report> {
        self.services
            .as_ref()
            .ok_or_else(|| eyre::eyre!("scenario has no slot pool; add a pool step first"))
    }

    /// Returns the id of the task titled `title`.
    ///
    /// # Errors
    ///
    /// Returns an error when no such task was created in this scenario.
    pub fn task_id(&self, title: &str) -> Result<TaskId, eyre::Report> {
        self.tasks
            .get(title)
            .cloned()
            .ok_or_else(|| eyre::eyre!("no task titled {title:?} in scenario world"))
    }

    /// Loads the current record of the task titled `title`.
    ///
    /// # Errors
    ///
    /// Returns an error when the task is unknown or the lookup fails.
    pub fn stored_task(&self, title: &str) -> Result<Task, eyre::Report> {
        let task_id = self.task_id(title)?;
        run_async(self.services()?.repository.find_by_id(&task_id))?
            .ok_or_else(|| eyre::eyre!("task {title:?} missing from repository"))
    }

    /// Stores a `Formatted` task titled `title`.
    ///
    /// # Errors
    ///
    /// Returns an error when the task cannot be created or stored.
    pub fn store_task(&mut self, title: &str) -> Result<TaskId, eyre::Report> {
        let task = Task::new(TaskDraft::new(title, "Scenario task"), &DefaultClock)?;
        run_async(self.services()?.repository.store(&task))?;
        self.tasks.insert(title.to_owned(), task.id().clone());
        Ok(task.id().clone())
    }

    /// Creates the issue for the task titled `title`.
    ///
    /// # Errors
    ///
    /// Returns the lifecycle error when issue creation fails.
    pub fn create_issue(&self, title: &str) -> Result<(), eyre::Report> {
        let task_id = self.task_id(title)?;
        run_async(self.services()?.lifecycle.create_issue(&task_id))?;
        Ok(())
    }

    /// Creates the workspace for the task titled `title`.
    ///
    /// # Errors
    ///
    /// Returns the lifecycle error when workspace creation fails.
    pub fn create_worktree(&self, title: &str) -> Result<(), eyre::Report> {
        let task_id = self.task_id(title)?;
        run_async(self.services()?.lifecycle.create_worktree(&task_id))?;
        Ok(())
    }

    /// Runs the agent to completion for the task titled `title`.
    ///
    /// # Errors
    ///
    /// Returns the lifecycle error when the run fails.
    pub fn implement(&self, title: &str) -> Result<(), eyre::Report> {
        let task_id = self.task_id(title)?;
        let services = self.services()?;
        services
            .transport
            .respond_to("agent --cd", CommandResponse::succeeded("diff --git a/src/lib.rs"));
        run_async(services.lifecycle.run_agent(&task_id, |_| {}))?;
        Ok(())
    }

    /// Pushes the task titled `title` and opens its pull request.
    ///
    /// # Errors
    ///
    /// Returns the lifecycle error when either step fails.
    pub fn open_pull_request(&self, title: &str) -> Result<(), eyre::Report> {
        let task_id = self.task_id(title)?;
        let lifecycle = &self.services()?.lifecycle;
        run_async(lifecycle.push(&task_id))?;
        run_async(lifecycle.create_pull_request(&task_id))?;
        Ok(())
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> LifecycleWorld {
    LifecycleWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
