//! Shared wiring for in-memory lifecycle tests.
//!
//! The harness is assembled the way an embedding application would: from a
//! loaded configuration, with the scripted bridge transport and in-memory
//! tracker standing in for the network.

use gropius::bridge::adapters::ScriptedBridgeTransport;
use gropius::bridge::domain::CommandResponse;
use gropius::bridge::services::CommandDispatcher;
use gropius::config::{ConfigLoader, GropiusConfig};
use gropius::task::adapters::memory::{
    InMemoryIssueTracker, InMemoryTaskRepository, StaticTaskDrafter,
};
use gropius::task::domain::{Priority, Task, TaskDraft};
use gropius::task::ports::TaskRepository;
use gropius::task::services::{
    ReconciliationService, TaskIntakeService, TaskLifecycleService,
};
use gropius::worktree::services::WorktreeSlotAllocator;
use mockable::DefaultClock;
use rstest::fixture;
use std::sync::Arc;

/// Configuration every harness is built from.
pub const CONFIG: &str = "
repository:
  owner: acme
  name: widgets
  root_path: /srv/widgets
worktrees:
  max_slots: 2
bridge:
  endpoint: http://127.0.0.1:4312/run
  poll_interval_ms: 1
  max_poll_attempts: 20
";

/// Pattern matching the rendered agent command line.
pub const AGENT_COMMAND: &str = "codex exec";

pub type Lifecycle = TaskLifecycleService<
    InMemoryTaskRepository,
    InMemoryIssueTracker,
    ScriptedBridgeTransport,
    DefaultClock,
>;

pub type Intake = TaskIntakeService<InMemoryTaskRepository, StaticTaskDrafter, DefaultClock>;

pub type Reconciler =
    ReconciliationService<InMemoryTaskRepository, InMemoryIssueTracker, DefaultClock>;

/// Services wired to shared in-memory adapters.
pub struct Orchestrator {
    pub config: GropiusConfig,
    pub repository: Arc<InMemoryTaskRepository>,
    pub tracker: Arc<InMemoryIssueTracker>,
    pub transport: Arc<ScriptedBridgeTransport>,
    pub slots: Arc<WorktreeSlotAllocator>,
    pub intake: Intake,
    pub lifecycle: Lifecycle,
    pub reconciler: Reconciler,
}

/// Drafts returned by the static drafter, in order.
#[must_use]
pub fn drafts() -> Vec<TaskDraft> {
    vec![
        TaskDraft::new("Fix login redirect", "Users bounce back to the login page")
            .with_group("auth")
            .with_priority(Priority::High),
        TaskDraft::new("Add CSV export", "Export the report table as CSV").with_group("reports"),
    ]
}

/// Provides an orchestrator built from [`CONFIG`].
#[fixture]
pub fn orchestrator() -> Orchestrator {
    let config = ConfigLoader::load_from_str(CONFIG).expect("test config is valid");
    let repository = Arc::new(InMemoryTaskRepository::new());
    let tracker = Arc::new(InMemoryIssueTracker::new());
    let transport = Arc::new(ScriptedBridgeTransport::new());
    let clock = Arc::new(DefaultClock);
    let slots = Arc::new(
        WorktreeSlotAllocator::with_layout(
            config.worktrees.max_slots,
            &config.repository.root_path,
        )
        .expect("slot layout is valid"),
    );
    let dispatcher = Arc::new(
        CommandDispatcher::new(
            Arc::clone(&transport),
            &config.bridge.resolver(),
            config.bridge.dispatcher_settings(),
        )
        .expect("endpoint resolves"),
    );
    let lifecycle = TaskLifecycleService::new(
        Arc::clone(&repository),
        Arc::clone(&tracker),
        dispatcher,
        Arc::clone(&slots),
        Arc::clone(&clock),
        config.lifecycle_settings().expect("agent template compiles"),
    );
    let intake = TaskIntakeService::new(
        Arc::clone(&repository),
        Arc::new(StaticTaskDrafter::new(drafts())),
        Arc::clone(&clock),
    );
    let reconciler = ReconciliationService::new(
        Arc::clone(&repository),
        Arc::clone(&tracker),
        Arc::clone(&slots),
        clock,
    );
    Orchestrator {
        config,
        repository,
        tracker,
        transport,
        slots,
        intake,
        lifecycle,
        reconciler,
    }
}

impl Orchestrator {
    /// Drafts the first task from raw text and returns it.
    pub async fn drafted(&self) -> Task {
        self.intake
            .draft_tasks("login is broken; also we need csv export")
            .await
            .expect("drafting succeeds")
            .into_iter()
            .next()
            .expect("at least one draft")
    }

    /// Stores a plain task with `title`.
    pub async fn stored(&self, title: &str) -> Task {
        self.intake
            .create_task(TaskDraft::new(title, "Details"))
            .await
            .expect("task stored")
    }

    /// Creates the issue and workspace for `task`.
    pub async fn open_workspace(&self, task: &Task) -> Task {
        self.lifecycle
            .create_issue(task.id())
            .await
            .expect("issue created");
        self.lifecycle
            .create_worktree(task.id())
            .await
            .expect("worktree created")
    }

    /// Drives `task` from `Formatted` to `PrCreated`.
    pub async fn deliver_to_pull_request(&self, task: &Task) -> Task {
        self.open_workspace(task).await;
        self.transport
            .respond_to(AGENT_COMMAND, CommandResponse::succeeded("patched src/login.rs"));
        self.lifecycle
            .run_agent(task.id(), |_| {})
            .await
            .expect("agent run succeeds");
        self.lifecycle.push(task.id()).await.expect("push succeeds");
        self.lifecycle
            .create_pull_request(task.id())
            .await
            .expect("pull request created")
            .task
    }

    /// Reloads `task` from the repository.
    pub async fn reload(&self, task: &Task) -> Task {
        self.repository
            .find_by_id(task.id())
            .await
            .expect("lookup succeeds")
            .expect("task exists")
    }
}
