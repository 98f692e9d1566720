//! Job record semantics.

use super::support::{epoch, millis};
use crate::bridge::domain::{BridgeJob, CommandResponse, JobId, JobSnapshot};
use chrono::TimeDelta;
use rstest::rstest;
use std::time::Duration;

fn running(stdout: &str, updated_after_secs: i64) -> JobSnapshot {
    JobSnapshot {
        stdout: stdout.to_owned(),
        started_at: Some(millis(epoch())),
        updated_at: Some(millis(epoch() + TimeDelta::seconds(updated_after_secs))),
        ..JobSnapshot::default()
    }
}

#[rstest]
fn idle_time_counts_from_last_update_or_start() {
    let mut job = BridgeJob::new(JobId::new("j1"), "agent", epoch());
    let now = epoch() + TimeDelta::seconds(90);

    assert_eq!(job.idle_for(now), Duration::from_secs(90));

    job.apply(&running("step 1", 60));

    assert_eq!(job.idle_for(now), Duration::from_secs(30));
    assert!(job.produced_output());
}

#[rstest]
fn finished_job_is_immutable() {
    let mut job = BridgeJob::new(JobId::new("j1"), "agent", epoch());
    job.apply(&JobSnapshot {
        done: true,
        success: Some(true),
        exit_code: Some(0),
        stdout: "done".to_owned(),
        ..JobSnapshot::default()
    });

    job.apply(&JobSnapshot {
        done: true,
        success: Some(false),
        exit_code: Some(1),
        stdout: "late".to_owned(),
        ..JobSnapshot::default()
    });

    assert!(job.succeeded());
    assert_eq!(job.exit_code(), Some(0));
    assert_eq!(job.stdout(), "done");
}

#[rstest]
#[case(Some(true), Some(0), true)]
#[case(None, Some(0), true)]
#[case(None, None, true)]
#[case(Some(false), Some(0), false)]
#[case(Some(true), Some(2), false)]
fn job_success_requires_flag_and_exit_code(
    #[case] success: Option<bool>,
    #[case] exit_code: Option<i32>,
    #[case] expected: bool,
) {
    let mut job = BridgeJob::new(JobId::new("j1"), "agent", epoch());
    job.apply(&JobSnapshot {
        done: true,
        success,
        exit_code,
        ..JobSnapshot::default()
    });

    assert_eq!(job.succeeded(), expected);
}

#[rstest]
fn command_response_parses_bridge_json() {
    let response: CommandResponse = serde_json::from_str(
        r#"{"success":false,"exitCode":128,"stdout":"","stderr":"fatal: boom","jobId":null}"#,
    )
    .expect("valid json");

    assert!(!response.is_success());
    assert_eq!(response.exit_code, Some(128));
}

#[rstest]
fn command_request_serialises_async_flag_and_context() {
    use crate::bridge::domain::{CommandContext, CommandRequest};

    let request = CommandRequest::new(
        "git status",
        CommandContext::for_purpose("status")
            .in_directory("/repo")
            .with_setup_timeout(),
        true,
    );

    let json = serde_json::to_value(&request).expect("serialises");

    assert_eq!(
        json,
        serde_json::json!({
            "command": "git status",
            "mode": "shell",
            "async": true,
            "cwd": "/repo",
            "purpose": "status",
        })
    );
}
