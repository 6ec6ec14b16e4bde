//! Governance flows through the public API: checkpoints, agent teams,
//! handoffs and the retry-loop breaker, each observed through a pipeline run.

use chrono::{Duration, TimeZone, Utc};

use rigour::core::types::{GateStatus, Report};
use rigour::governance::Governance;
use rigour::governance::checkpoint::{CheckpointInput, SessionStatus};
use rigour::io::config::PolicyConfig;
use rigour::io::handoffs::{HandoffLog, HandoffStatus, NewHandoff};
use rigour::pipeline::GatePipeline;

fn governance_only() -> PolicyConfig {
    let mut config = PolicyConfig::default();
    config.gates.protected_paths.enabled = false;
    config.gates.file_size.enabled = false;
    config.gates.context_drift.enabled = false;
    config.output.history = false;
    config
}

fn ids(report: &Report) -> Vec<&str> {
    report
        .failures
        .iter()
        .map(|f| f.finding.id.as_str())
        .collect()
}

fn input(progress: u8, score: u32) -> CheckpointInput {
    CheckpointInput {
        progress_pct: progress,
        files_changed: vec!["src/lib.rs".to_string()],
        summary: format!("step at {progress}%"),
        quality_score: score,
    }
}

#[test]
fn checkpoint_session_lifecycle_feeds_gate() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    let mut config = governance_only();
    config.gates.checkpoint.enabled = true;
    let governance = Governance::default();
    let supervisor = governance.checkpoint_supervisor(&config);
    let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("time");

    for (i, score) in [95, 85, 70].into_iter().enumerate() {
        let minutes = i64::try_from(i).expect("index") * 10;
        supervisor
            .record(root, input(20 * (i as u8 + 1), score), start + Duration::minutes(minutes))
            .expect("record");
    }
    let session = supervisor.session(root).expect("session");
    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.checkpoints.len(), 3);
    assert!(!session.checkpoints[2].warnings.is_empty());

    let pipeline = GatePipeline::from_config(&config, &governance).expect("pipeline");
    let report = pipeline.run_at(root, start + Duration::minutes(25));
    let found = ids(&report);
    assert!(found.contains(&"QUALITY_BELOW_THRESHOLD"));
    assert!(found.contains(&"DEGRADING_TREND"));
    assert!(!found.contains(&"CHECKPOINT_MISSING"));

    let late = pipeline.run_at(root, start + Duration::minutes(120));
    assert!(ids(&late).contains(&"CHECKPOINT_MISSING"));

    let aborted = supervisor
        .abort(root, "agent went off the rails", start + Duration::minutes(130))
        .expect("abort");
    assert_eq!(aborted.status, SessionStatus::Aborted);
    assert_eq!(aborted.checkpoints.last().map(|c| c.quality_score), Some(0));
    assert!(supervisor.complete(root, start + Duration::minutes(131)).is_err());
}

#[test]
fn overlapping_agent_scopes_fail_under_strict_ownership() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    let mut config = governance_only();
    config.gates.agent_team.enabled = true;
    config.gates.agent_team.max_concurrent_agents = 2;
    let governance = Governance::default();
    let roster = governance.roster();
    let now = Utc::now();

    roster
        .register(root, "planner", vec!["docs/**".to_string()], now)
        .expect("register");
    roster
        .register(root, "coder", vec!["src/**".to_string()], now)
        .expect("register");
    let pipeline = GatePipeline::from_config(&config, &governance).expect("pipeline");
    assert_eq!(pipeline.run(root).status, GateStatus::Pass);

    roster
        .register(root, "reviewer", vec!["src/**".to_string()], now)
        .expect("register");
    let report = pipeline.run(root);
    let found = ids(&report);
    assert!(found.contains(&"TOO_MANY_AGENTS"));
    assert!(found.contains(&"TASK_SCOPE_CONFLICT"));

    assert!(roster.deregister(root, "reviewer").expect("deregister"));
    assert!(!roster.deregister(root, "reviewer").expect("deregister again"));
    assert_eq!(pipeline.run(root).status, GateStatus::Pass);
}

#[test]
fn handoff_moves_through_lifecycle_and_stale_ones_are_flagged() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    let mut config = governance_only();
    config.gates.agent_team.enabled = true;
    let governance = Governance::default();
    let log = HandoffLog::new(root);
    let created = Utc::now() - Duration::hours(3);

    let request = |task: &str| NewHandoff {
        from_agent: "planner".to_string(),
        to_agent: "coder".to_string(),
        task: task.to_string(),
        files: vec!["src/api.rs".to_string()],
        context: None,
    };
    let done = log.initiate(request("wire the api"), created).expect("initiate");
    let waiting = log.initiate(request("write docs"), created).expect("initiate");
    assert_eq!(log.pending_for("coder").expect("pending").len(), 2);

    log.set_status(&done.id, HandoffStatus::Accepted, created)
        .expect("accept");
    log.set_status(&done.id, HandoffStatus::Completed, created)
        .expect("complete");
    assert!(
        log.set_status(&done.id, HandoffStatus::Rejected, created)
            .is_err()
    );

    let pipeline = GatePipeline::from_config(&config, &governance).expect("pipeline");
    let report = pipeline.run(root);
    let stale: Vec<_> = report
        .failures
        .iter()
        .filter(|f| f.finding.id == "STALE_HANDOFF")
        .collect();
    assert_eq!(stale.len(), 1);
    assert!(stale[0].finding.details.contains(&waiting.id));
}

#[test]
fn identical_failures_trip_retry_breaker_until_underlying_failure_is_fixed() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    let mut config = governance_only();
    config.gates.checkpoint.enabled = true;
    let governance = Governance::default();
    governance
        .checkpoint_supervisor(&config)
        .record(root, input(10, 40), Utc::now())
        .expect("record");
    let pipeline = GatePipeline::from_config(&config, &governance).expect("pipeline");

    for _ in 0..3 {
        let report = pipeline.run(root);
        assert!(!ids(&report).contains(&"RETRY_LOOP_DETECTED"));
    }
    let tripped = pipeline.run(root);
    assert_eq!(ids(&tripped)[0], "RETRY_LOOP_DETECTED");
    assert_eq!(tripped.summary[0].gate, "retry-loop-breaker");

    governance
        .checkpoint_supervisor(&config)
        .record(root, input(50, 95), Utc::now())
        .expect("record");
    // The breaker reads state left by earlier runs, so it reports once more.
    let carried = pipeline.run(root);
    assert_eq!(ids(&carried), vec!["RETRY_LOOP_DETECTED"]);
    assert_eq!(pipeline.run(root).status, GateStatus::Pass);
}
