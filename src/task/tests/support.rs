//! Shared harness for task service tests.

use crate::bridge::adapters::ScriptedBridgeTransport;
use crate::bridge::domain::{CommandResponse, CommandTemplate, EndpointResolver};
use crate::bridge::services::{CommandDispatcher, DispatcherSettings, PollSettings};
use crate::task::adapters::memory::{InMemoryIssueTracker, InMemoryTaskRepository};
use crate::task::domain::{Task, TaskDraft};
use crate::task::ports::{IssueTracker, TaskRepository};
use crate::task::services::{LifecycleSettings, TaskLifecycleService};
use crate::worktree::services::WorktreeSlotAllocator;
use mockable::DefaultClock;
use std::sync::Arc;
use std::time::Duration;

pub const REPO_ROOT: &str = "/repo";
pub const AGENT_TEMPLATE: &str =
    "agent --cd {{ worktree_path | shell_quote }} {{ prompt | shell_quote }}";

pub type Service<I> =
    TaskLifecycleService<InMemoryTaskRepository, I, ScriptedBridgeTransport, DefaultClock>;

/// Lifecycle service wired to in-memory adapters, plus handles on each.
pub struct Harness<I: IssueTracker = InMemoryIssueTracker> {
    pub repository: Arc<InMemoryTaskRepository>,
    pub tracker: Arc<I>,
    pub transport: Arc<ScriptedBridgeTransport>,
    pub slots: Arc<WorktreeSlotAllocator>,
    pub service: Service<I>,
}

pub fn settings() -> LifecycleSettings {
    let template = CommandTemplate::new(AGENT_TEMPLATE).expect("agent template compiles");
    let mut settings = LifecycleSettings::new("main", template);
    settings.poll = PollSettings {
        interval: Duration::ZERO,
        max_attempts: 5,
        stale_after: Duration::from_secs(300),
    };
    settings
}

pub fn dispatcher(
    transport: &Arc<ScriptedBridgeTransport>,
) -> Arc<CommandDispatcher<ScriptedBridgeTransport>> {
    let resolver = EndpointResolver::new("http://127.0.0.1:4312/run", "/run", None);
    Arc::new(
        CommandDispatcher::new(
            Arc::clone(transport),
            &resolver,
            DispatcherSettings::default(),
        )
        .expect("endpoint resolves"),
    )
}

pub fn harness_with<I: IssueTracker>(issue_tracker: I, slot_count: usize) -> Harness<I> {
    let repository = Arc::new(InMemoryTaskRepository::new());
    let tracker = Arc::new(issue_tracker);
    let transport = Arc::new(ScriptedBridgeTransport::new());
    let slots = Arc::new(
        WorktreeSlotAllocator::with_layout(slot_count, REPO_ROOT).expect("valid layout"),
    );
    let service = TaskLifecycleService::new(
        Arc::clone(&repository),
        Arc::clone(&tracker),
        dispatcher(&transport),
        Arc::clone(&slots),
        Arc::new(DefaultClock),
        settings(),
    );
    Harness {
        repository,
        tracker,
        transport,
        slots,
        service,
    }
}

pub fn harness() -> Harness {
    harness_with(InMemoryIssueTracker::new(), 3)
}

impl<I: IssueTracker> Harness<I> {
    /// Stores a `Formatted` task.
    pub async fn formatted(&self, title: &str) -> Task {
        let task = Task::new(
            TaskDraft::new(title, "Make the widget behave").with_group("backend"),
            &DefaultClock,
        )
        .expect("valid draft");
        self.repository.store(&task).await.expect("task stored");
        task
    }

    /// Stores a task and creates its issue.
    pub async fn with_issue(&self, title: &str) -> Task {
        let task = self.formatted(title).await;
        self.service
            .create_issue(task.id())
            .await
            .expect("issue created")
    }

    /// Stores a task, creates its issue and opens its workspace.
    pub async fn active(&self, title: &str) -> Task {
        let task = self.with_issue(title).await;
        self.service
            .create_worktree(task.id())
            .await
            .expect("worktree created")
    }

    /// Drives a task to `Implemented` through a synchronous agent run.
    pub async fn implemented(&self, title: &str) -> Task {
        let task = self.active(title).await;
        self.transport
            .respond_to("agent --cd", CommandResponse::succeeded("diff --git a/lib.rs"));
        self.service
            .run_agent(task.id(), |_| {})
            .await
            .expect("agent implements task")
    }

    /// Drives a task to `PrCreated`.
    pub async fn with_pull_request(&self, title: &str) -> Task {
        let task = self.implemented(title).await;
        self.service.push(task.id()).await.expect("push succeeds");
        self.service
            .create_pull_request(task.id())
            .await
            .expect("pull request created")
            .task
    }

    pub async fn stored(&self, task: &Task) -> Task {
        self.repository
            .find_by_id(task.id())
            .await
            .expect("lookup succeeds")
            .expect("task exists")
    }
}
