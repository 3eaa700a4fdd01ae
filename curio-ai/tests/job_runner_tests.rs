//! Job orchestrator integration tests
//!
//! Drive complete analysis and curriculum jobs through a scripted backend and
//! check job rows, mirrored project status and lifecycle events.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use curio_ai::backends::BackendError;
use curio_ai::config::AllowAll;
use curio_ai::db;
use curio_ai::models::{
    CurriculumStatus, FailureReason, Job, JobKind, JobStatus, MatchTier, ProjectStatus,
    Technology, TechCategory, Importance, TokenUsage,
};
use curio_ai::validators::DEFAULT_ARCHITECTURE_SUMMARY;
use curio_ai::workflow::{RunnerSettings, StartError, StartOptions};
use curio_common::events::CurioEvent;
use helpers::*;
use serde_json::json;
use tokio::sync::Notify;

const ANALYSIS_REPLY: &str = r#"{
  "technologies": [
    {"name": "Next.js", "category": "framework", "version": "14.1.0", "confidence": 0.95, "importance": "core"},
    {"name": "React", "category": "library", "confidence": 0.9, "importance": "core"}
  ],
  "architecture_summary": "A Next.js storefront using the app router."
}"#;

async fn load_job(h: &Harness, job: &Job) -> Job {
    db::jobs::load_job(&h.pool, job.id).await.unwrap().unwrap()
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<CurioEvent>) -> Vec<CurioEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn technology(name: &str) -> Technology {
    Technology {
        name: name.to_string(),
        category: TechCategory::Framework,
        version: None,
        confidence: 0.9,
        importance: Importance::Core,
        description: String::new(),
        relationships: vec![],
    }
}

/// Project already analyzed with technology "A", ready for a curriculum run
async fn analyzed_project(h: &Harness) -> curio_ai::models::Project {
    let project = seed_project(&h.pool, nextjs_files()).await;
    db::technologies::upsert_technologies(&h.pool, project.id, &[technology("A")])
        .await
        .unwrap();
    db::projects::mark_analyzed(&h.pool, project.id, "An app built on A.")
        .await
        .unwrap();
    project
}

fn outline_reply(titles: &[&str], binding: &str) -> String {
    let modules: Vec<_> = titles
        .iter()
        .map(|t| json!({"title": t, "description": "d", "type": "concept", "tech_binding": binding}))
        .collect();
    json!({"title": "Learn A", "difficulty": "beginner", "modules": modules}).to_string()
}

/// Wait until the backend has received `calls` requests
async fn wait_for_calls(h: &Harness, calls: usize) {
    for _ in 0..400 {
        if h.backend.call_count() >= calls {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("backend never reached {} calls", calls);
}

fn missing_titles(events: Vec<CurioEvent>) -> Vec<String> {
    events
        .into_iter()
        .filter_map(|e| match e {
            CurioEvent::ModuleContentMissing { module_title, .. } => Some(module_title),
            _ => None,
        })
        .collect()
}

fn content_reply(titles: &[String]) -> String {
    let items: Vec<_> = titles
        .iter()
        .map(|t| json!({"module_title": t, "content": [{"type": "text", "content": format!("About {}", t)}]}))
        .collect();
    serde_json::Value::Array(items).to_string()
}

#[tokio::test]
async fn test_analysis_completes_and_mirrors_project() {
    let h = harness(vec![reply(ANALYSIS_REPLY)]).await;
    let project = seed_project(&h.pool, nextjs_files()).await;
    let mut rx = h.events.subscribe();

    let handle = h.runner.start_analysis(project.id, StartOptions::default()).await.unwrap();
    assert_eq!(handle.job.status, JobStatus::Pending);
    handle.task.await.unwrap();

    let job = load_job(&h, &handle.job).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.usage, CALL_USAGE);
    assert!(job.started_at.is_some() && job.completed_at.is_some());

    let project = db::projects::require_project(&h.pool, project.id).await.unwrap();
    assert_eq!(project.status, ProjectStatus::Analyzed);
    assert_eq!(
        project.architecture_summary.as_deref(),
        Some("A Next.js storefront using the app router.")
    );

    let names: Vec<String> = db::technologies::list_technologies(&h.pool, project.id)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.technology.name)
        .collect();
    assert_eq!(names, vec!["Next.js", "React"]);

    let events = drain(&mut rx);
    assert!(matches!(events[0], CurioEvent::JobQueued { .. }));
    assert!(matches!(events[1], CurioEvent::JobStarted { .. }));
    assert!(matches!(
        events[2],
        CurioEvent::JobCompleted { input_tokens: 10, output_tokens: 20, .. }
    ));
}

#[tokio::test]
async fn test_prose_before_fenced_payload_is_parsed() {
    let wrapped = format!("Here is the analysis you asked for:\n\n```json\n{}\n```\nLet me know!", ANALYSIS_REPLY);
    let h = harness(vec![reply(wrapped)]).await;
    let project = seed_project(&h.pool, nextjs_files()).await;

    let handle = h.runner.start_analysis(project.id, StartOptions::default()).await.unwrap();
    handle.task.await.unwrap();

    assert_eq!(load_job(&h, &handle.job).await.status, JobStatus::Completed);
    assert_eq!(db::technologies::list_technologies(&h.pool, project.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_all_nameless_entries_complete_with_default_summary() {
    let payload = json!({"technologies": [{"category": "library"}, {"name": "  "}, {"version": "1.0"}]});
    let h = harness(vec![reply(payload.to_string())]).await;
    let project = seed_project(&h.pool, nextjs_files()).await;

    let handle = h.runner.start_analysis(project.id, StartOptions::default()).await.unwrap();
    handle.task.await.unwrap();

    assert_eq!(load_job(&h, &handle.job).await.status, JobStatus::Completed);
    assert!(db::technologies::list_technologies(&h.pool, project.id).await.unwrap().is_empty());

    let project = db::projects::require_project(&h.pool, project.id).await.unwrap();
    assert_eq!(project.architecture_summary.as_deref(), Some(DEFAULT_ARCHITECTURE_SUMMARY));
    // Nothing new, so no enrichment calls
    assert_eq!(h.backend.call_count(), 1);
}

#[tokio::test]
async fn test_unparseable_analysis_fails_as_malformed_response() {
    let h = harness(vec![reply("I could not analyze this project, sorry.")]).await;
    let project = seed_project(&h.pool, nextjs_files()).await;

    let handle = h.runner.start_analysis(project.id, StartOptions::default()).await.unwrap();
    handle.task.await.unwrap();

    let job = load_job(&h, &handle.job).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure_reason, Some(FailureReason::MalformedResponse));
    assert_eq!(
        db::projects::require_project(&h.pool, project.id).await.unwrap().status,
        ProjectStatus::Error
    );
}

#[tokio::test]
async fn test_missing_credential_fails_from_pending() {
    let h = harness_with(
        vec![reply(ANALYSIS_REPLY)],
        StaticCredentials::default(),
        Arc::new(AllowAll),
        test_settings(),
    )
    .await;
    let project = seed_project(&h.pool, nextjs_files()).await;

    let handle = h.runner.start_analysis(project.id, StartOptions::default()).await.unwrap();
    handle.task.await.unwrap();

    let job = load_job(&h, &handle.job).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure_reason, Some(FailureReason::NoCredential));
    assert!(job.started_at.is_none(), "pre-flight failure never reaches processing");
    assert!(job.error_message.unwrap().contains("anthropic"));
    assert_eq!(h.backend.call_count(), 0);
}

#[tokio::test]
async fn test_empty_snapshot_fails_with_no_files() {
    let h = harness(vec![reply(ANALYSIS_REPLY)]).await;
    let project = seed_project(&h.pool, vec![]).await;

    let handle = h.runner.start_analysis(project.id, StartOptions::default()).await.unwrap();
    handle.task.await.unwrap();

    let job = load_job(&h, &handle.job).await;
    assert_eq!(job.failure_reason, Some(FailureReason::NoFiles));
    assert_eq!(h.backend.call_count(), 0);
}

#[tokio::test]
async fn test_backend_error_detail_reaches_job_message() {
    let h = harness(vec![Step::Fail(BackendError::Status {
        backend: "anthropic".into(),
        status: 429,
        message: "rate limit exceeded".into(),
    })])
    .await;
    let project = seed_project(&h.pool, nextjs_files()).await;
    let mut rx = h.events.subscribe();

    let handle = h.runner.start_analysis(project.id, StartOptions::default()).await.unwrap();
    handle.task.await.unwrap();

    let job = load_job(&h, &handle.job).await;
    assert_eq!(job.failure_reason, Some(FailureReason::BackendError));
    let message = job.error_message.unwrap();
    assert!(message.contains("429") && message.contains("rate limit exceeded"));

    let failed = drain(&mut rx)
        .into_iter()
        .find_map(|e| match e {
            CurioEvent::JobFailed { reason, .. } => Some(reason),
            _ => None,
        })
        .unwrap();
    assert_eq!(failed, "backend_error");
}

#[tokio::test]
async fn test_panic_in_pipeline_resolves_to_failed() {
    let h = harness(vec![Step::Panic]).await;
    let project = seed_project(&h.pool, nextjs_files()).await;

    let handle = h.runner.start_analysis(project.id, StartOptions::default()).await.unwrap();
    handle.task.await.unwrap();

    let job = load_job(&h, &handle.job).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure_reason, Some(FailureReason::Internal));
    assert!(job.error_message.unwrap().contains("scripted backend panic"));
}

#[tokio::test]
async fn test_second_start_rejected_while_active_then_timeout_fails_job() {
    let mut settings = test_settings();
    settings.job_timeout = Duration::from_millis(300);
    let h = harness_with(
        vec![Step::Hang],
        StaticCredentials::with_key("anthropic"),
        Arc::new(AllowAll),
        settings,
    )
    .await;
    let project = seed_project(&h.pool, nextjs_files()).await;

    let first = h.runner.start_analysis(project.id, StartOptions::default()).await.unwrap();

    let second = h.runner.start_analysis(project.id, StartOptions::default()).await;
    assert!(matches!(second, Err(StartError::AlreadyActive(id)) if id == project.id));

    // Curriculum shares the one-active-job guard
    let curriculum = h.runner.start_curriculum(project.id, StartOptions::default()).await;
    assert!(curriculum.is_err());

    first.task.await.unwrap();
    let job = load_job(&h, &first.job).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure_reason, Some(FailureReason::Timeout));

    // Terminal job frees the slot
    let next = h.runner.start_analysis(project.id, StartOptions::default()).await;
    assert!(next.is_ok());
}

#[tokio::test]
async fn test_enrichment_failure_never_reverts_completed_job() {
    // Analysis reply only; both enrichment calls see an exhausted script
    let h = harness(vec![reply(ANALYSIS_REPLY)]).await;
    let project = seed_project(&h.pool, nextjs_files()).await;
    let mut rx = h.events.subscribe();

    let handle = h.runner.start_analysis(project.id, StartOptions::default()).await.unwrap();
    handle.task.await.unwrap();

    let job = load_job(&h, &handle.job).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.usage, CALL_USAGE, "enrichment tokens are not billed to the job");
    assert_eq!(h.backend.call_count(), 3);

    let enrichment_failures = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, CurioEvent::EnrichmentFailed { .. }))
        .count();
    assert_eq!(enrichment_failures, 2);
}

#[tokio::test]
async fn test_enrichment_stores_reference_notes() {
    let h = harness(vec![
        reply(ANALYSIS_REPLY),
        reply("Next.js is a React framework."),
        reply("React renders components."),
    ])
    .await;
    let project = seed_project(&h.pool, nextjs_files()).await;

    let handle = h.runner.start_analysis(project.id, StartOptions::default()).await.unwrap();
    handle.task.await.unwrap();

    let notes = db::knowledge::list_knowledge(&h.pool, project.id).await.unwrap();
    assert_eq!(notes.len(), 2);
    assert!(notes.iter().any(|(tech, note)| tech == "React" && note == "React renders components."));
}

#[tokio::test]
async fn test_usage_gate_and_unknown_backend_reject_before_job_row() {
    let h = harness_with(
        vec![],
        StaticCredentials::with_key("anthropic"),
        Arc::new(DenyAll),
        test_settings(),
    )
    .await;
    let project = seed_project(&h.pool, nextjs_files()).await;

    let denied = h.runner.start_analysis(project.id, StartOptions::default()).await;
    assert!(matches!(denied, Err(StartError::UsageDenied(owner)) if owner == "alice"));

    let h = harness(vec![]).await;
    let project = seed_project(&h.pool, nextjs_files()).await;
    let unknown = h
        .runner
        .start_analysis(
            project.id,
            StartOptions {
                backend: Some("mistral".into()),
                ..StartOptions::default()
            },
        )
        .await;
    assert!(matches!(unknown, Err(StartError::UnknownBackend(name)) if name == "mistral"));
    assert!(db::jobs::latest_job(&h.pool, project.id, JobKind::Analysis).await.unwrap().is_none());
}

#[tokio::test]
async fn test_curriculum_requires_analysis() {
    let h = harness(vec![]).await;
    let project = seed_project(&h.pool, nextjs_files()).await;

    let result = h.runner.start_curriculum(project.id, StartOptions::default()).await;
    assert!(matches!(result, Err(StartError::NotAnalyzed(_))));

    let missing = h.runner.start_curriculum(uuid::Uuid::new_v4(), StartOptions::default()).await;
    assert!(matches!(missing, Err(StartError::ProjectNotFound(_))));
}

#[tokio::test]
async fn test_lowercased_content_titles_resolve_by_normalized_tier() {
    let titles = ["Intro to A", "A Components", "A State", "A Routing", "A Testing"];
    let lowered: Vec<String> = titles.iter().map(|t| t.to_lowercase()).collect();

    let h = harness(vec![reply(outline_reply(&titles, "A")), reply(content_reply(&lowered))]).await;
    let project = analyzed_project(&h).await;

    let handle = h.runner.start_curriculum(project.id, StartOptions::default()).await.unwrap();
    handle.task.await.unwrap();

    let job = load_job(&h, &handle.job).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.usage, TokenUsage::new(20, 40), "usage sums both phases");

    let modules = db::curricula::list_modules(&h.pool, project.id).await.unwrap();
    assert_eq!(modules.len(), 5);
    assert!(modules.iter().all(|m| m.resolution_tier == Some(MatchTier::Normalized)));
    assert!(modules.iter().all(|m| !m.content.is_empty()));
    assert_eq!(modules[0].title, "Intro to A");
    assert_eq!(modules[0].estimated_minutes, 10);

    let project = db::projects::require_project(&h.pool, project.id).await.unwrap();
    assert_eq!(project.curriculum_status, CurriculumStatus::Ready);
    assert_eq!(project.status, ProjectStatus::Analyzed);
}

#[tokio::test]
async fn test_count_mismatch_persists_unmatched_modules_empty() {
    let titles = ["Alpha", "Beta", "Gamma"];
    let items = vec!["alpha".to_string(), "something else".to_string()];

    let h = harness(vec![reply(outline_reply(&titles, "A")), reply(content_reply(&items))]).await;
    let project = analyzed_project(&h).await;
    let mut rx = h.events.subscribe();

    let handle = h.runner.start_curriculum(project.id, StartOptions::default()).await.unwrap();
    handle.task.await.unwrap();

    assert_eq!(load_job(&h, &handle.job).await.status, JobStatus::Completed);

    let modules = db::curricula::list_modules(&h.pool, project.id).await.unwrap();
    let tiers: Vec<_> = modules.iter().map(|m| m.resolution_tier).collect();
    assert_eq!(tiers, vec![Some(MatchTier::Normalized), None, None]);
    assert!(modules[1].content.is_empty());
    assert_eq!(modules[1].estimated_minutes, 30);

    assert_eq!(missing_titles(drain(&mut rx)), vec!["Beta", "Gamma"]);
}

#[tokio::test]
async fn test_unparseable_content_batch_counts_as_zero_items() {
    let titles = ["One", "Two"];
    let h = harness(vec![
        reply(outline_reply(&titles, "A")),
        reply("Sorry, I ran out of room."),
    ])
    .await;
    let project = analyzed_project(&h).await;

    let handle = h.runner.start_curriculum(project.id, StartOptions::default()).await.unwrap();
    handle.task.await.unwrap();

    assert_eq!(load_job(&h, &handle.job).await.status, JobStatus::Completed);
    let modules = db::curricula::list_modules(&h.pool, project.id).await.unwrap();
    assert!(modules.iter().all(|m| m.content.is_empty() && m.resolution_tier.is_none()));
}

#[tokio::test]
async fn test_content_transport_failure_fails_curriculum_job() {
    let titles = ["One"];
    let h = harness(vec![
        reply(outline_reply(&titles, "A")),
        Step::Fail(BackendError::Status {
            backend: "anthropic".into(),
            status: 401,
            message: "invalid x-api-key".into(),
        }),
    ])
    .await;
    let project = analyzed_project(&h).await;

    let handle = h.runner.start_curriculum(project.id, StartOptions::default()).await.unwrap();
    handle.task.await.unwrap();

    let job = load_job(&h, &handle.job).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure_reason, Some(FailureReason::NoCredential));

    let project = db::projects::require_project(&h.pool, project.id).await.unwrap();
    assert_eq!(project.curriculum_status, CurriculumStatus::Error);
    assert_eq!(project.status, ProjectStatus::Analyzed, "analysis status untouched");
}

#[tokio::test]
async fn test_batches_follow_technology_binding() {
    let outline = json!({"modules": [
        {"title": "React basics", "tech_binding": "React"},
        {"title": "Prisma models", "tech_binding": "Prisma"},
        {"title": "React hooks", "tech_binding": "react"}
    ]})
    .to_string();
    let h = harness(vec![
        reply(outline),
        reply(content_reply(&["React basics".into(), "React hooks".into()])),
        reply(content_reply(&["Prisma models".into()])),
    ])
    .await;
    let project = analyzed_project(&h).await;

    let handle = h.runner.start_curriculum(project.id, StartOptions::default()).await.unwrap();
    handle.task.await.unwrap();

    assert_eq!(h.backend.call_count(), 3);
    let modules = db::curricula::list_modules(&h.pool, project.id).await.unwrap();
    assert!(modules.iter().all(|m| m.resolution_tier == Some(MatchTier::Exact)));
}

#[tokio::test]
async fn test_recover_interrupted_fails_stale_jobs() {
    let h = harness(vec![]).await;
    let project = seed_project(&h.pool, nextjs_files()).await;

    let job = Job::new(project.id, JobKind::Analysis, "anthropic", "m");
    assert!(db::jobs::create_job(&h.pool, &job).await.unwrap());
    assert!(db::jobs::mark_processing(&h.pool, job.id).await.unwrap());
    db::projects::set_status(&h.pool, project.id, ProjectStatus::Analyzing).await.unwrap();

    assert_eq!(h.runner.recover_interrupted().await.unwrap(), 1);

    let job = load_job(&h, &job).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message.as_deref(), Some("interrupted by restart"));
    assert_eq!(
        db::projects::require_project(&h.pool, project.id).await.unwrap().status,
        ProjectStatus::Error
    );
    assert_eq!(h.runner.recover_interrupted().await.unwrap(), 0);
}

#[tokio::test]
async fn test_force_fail_only_touches_active_jobs() {
    let h = harness(vec![]).await;
    let project = seed_project(&h.pool, nextjs_files()).await;

    let job = Job::new(project.id, JobKind::Curriculum, "anthropic", "m");
    db::jobs::create_job(&h.pool, &job).await.unwrap();

    assert!(h.runner.force_fail(job.id, "stuck for an hour").await.unwrap());
    let failed = load_job(&h, &job).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.error_message.unwrap().contains("stuck for an hour"));
    assert_eq!(
        db::projects::require_project(&h.pool, project.id).await.unwrap().curriculum_status,
        CurriculumStatus::Error
    );

    assert!(!h.runner.force_fail(job.id, "again").await.unwrap());
    assert!(h.runner.force_fail(uuid::Uuid::new_v4(), "x").await.is_err());
}

#[tokio::test]
async fn test_force_fail_mid_analysis_discards_late_results() {
    let gate = Arc::new(Notify::new());
    let h = harness(vec![Step::Gated(gate.clone(), ANALYSIS_REPLY.to_string())]).await;
    let project = seed_project(&h.pool, nextjs_files()).await;
    let mut rx = h.events.subscribe();

    let handle = h.runner.start_analysis(project.id, StartOptions::default()).await.unwrap();
    wait_for_calls(&h, 1).await;
    assert_eq!(load_job(&h, &handle.job).await.status, JobStatus::Processing);

    assert!(h.runner.force_fail(handle.job.id, "stuck").await.unwrap());
    gate.notify_one();
    handle.task.await.unwrap();

    let job = load_job(&h, &handle.job).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure_reason, Some(FailureReason::Internal));

    let project = db::projects::require_project(&h.pool, project.id).await.unwrap();
    assert_eq!(project.status, ProjectStatus::Error);
    assert!(project.architecture_summary.is_none());
    assert!(db::technologies::list_technologies(&h.pool, project.id).await.unwrap().is_empty());
    assert!(!drain(&mut rx).iter().any(|e| matches!(e, CurioEvent::JobCompleted { .. })));
}

#[tokio::test]
async fn test_force_fail_mid_curriculum_discards_late_modules() {
    let gate = Arc::new(Notify::new());
    let titles = ["One", "Two"];
    let h = harness(vec![
        reply(outline_reply(&titles, "A")),
        Step::Gated(gate.clone(), content_reply(&["One".into(), "Two".into()])),
    ])
    .await;
    let project = analyzed_project(&h).await;
    let mut rx = h.events.subscribe();

    let handle = h.runner.start_curriculum(project.id, StartOptions::default()).await.unwrap();
    wait_for_calls(&h, 2).await;

    assert!(h.runner.force_fail(handle.job.id, "stuck").await.unwrap());
    gate.notify_one();
    handle.task.await.unwrap();

    assert_eq!(load_job(&h, &handle.job).await.status, JobStatus::Failed);
    assert!(db::curricula::list_modules(&h.pool, project.id).await.unwrap().is_empty());

    let project = db::projects::require_project(&h.pool, project.id).await.unwrap();
    assert_eq!(project.curriculum_status, CurriculumStatus::Error);
    assert_eq!(project.status, ProjectStatus::Analyzed);
    assert!(!drain(&mut rx).iter().any(|e| matches!(e, CurioEvent::JobCompleted { .. })));
}

#[tokio::test]
async fn test_matched_item_without_sections_is_reported_missing() {
    let titles = ["Intro", "Next steps"];
    let items = json!([
        {"module_title": "Intro", "content": []},
        {"module_title": "Next steps", "content": [{"type": "text", "content": "Keep going."}]}
    ])
    .to_string();
    let h = harness(vec![reply(outline_reply(&titles, "A")), reply(items)]).await;
    let project = analyzed_project(&h).await;
    let mut rx = h.events.subscribe();

    let handle = h.runner.start_curriculum(project.id, StartOptions::default()).await.unwrap();
    handle.task.await.unwrap();

    assert_eq!(load_job(&h, &handle.job).await.status, JobStatus::Completed);

    let modules = db::curricula::list_modules(&h.pool, project.id).await.unwrap();
    assert!(modules[0].content.is_empty());
    assert_eq!(modules[0].resolution_tier, None);
    assert_eq!(modules[0].estimated_minutes, 30);
    assert_eq!(modules[1].resolution_tier, Some(MatchTier::Exact));

    assert_eq!(missing_titles(drain(&mut rx)), vec!["Intro"]);
}

#[tokio::test]
async fn test_failed_status_mirror_does_not_leave_pending_job() {
    let h = harness(vec![reply(ANALYSIS_REPLY)]).await;
    let project = seed_project(&h.pool, nextjs_files()).await;

    sqlx::query(
        "CREATE TRIGGER block_project_status BEFORE UPDATE OF status ON projects \
         BEGIN SELECT RAISE(ABORT, 'project status is read-only'); END",
    )
    .execute(&h.pool)
    .await
    .unwrap();

    let result = h.runner.start_analysis(project.id, StartOptions::default()).await;
    assert!(matches!(result, Err(StartError::Storage(_))));

    let orphan = db::jobs::latest_job(&h.pool, project.id, JobKind::Analysis)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(orphan.status, JobStatus::Failed);
    assert_eq!(orphan.failure_reason, Some(FailureReason::Internal));

    sqlx::query("DROP TRIGGER block_project_status").execute(&h.pool).await.unwrap();

    let handle = h.runner.start_analysis(project.id, StartOptions::default()).await.unwrap();
    handle.task.await.unwrap();
    assert_eq!(load_job(&h, &handle.job).await.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_concurrent_batches_reconcile_to_their_own_modules() {
    let outline = json!({"modules": [
        {"title": "React basics", "tech_binding": "React"},
        {"title": "Tailwind layout", "tech_binding": "Tailwind"},
        {"title": "Prisma models", "tech_binding": "Prisma"},
        {"title": "React hooks", "tech_binding": "React"},
        {"title": "Tailwind themes", "tech_binding": "Tailwind"},
        {"title": "Tailwind forms", "tech_binding": "Tailwind"}
    ]})
    .to_string();

    let routes = vec![
        (
            "about React.".to_string(),
            content_reply(&["React basics".into(), "React hooks".into()]),
        ),
        ("about Prisma.".to_string(), content_reply(&["Prisma models".into()])),
        (
            "about Tailwind.".to_string(),
            content_reply(&["tailwind layout".into(), "tailwind themes".into(), "tailwind forms".into()]),
        ),
    ];

    let settings = RunnerSettings {
        content_concurrency: 3,
        ..test_settings()
    };
    let h = harness_with(
        vec![
            reply(outline),
            Step::Routed(routes.clone()),
            Step::Routed(routes.clone()),
            Step::Routed(routes),
        ],
        StaticCredentials::with_key("anthropic"),
        Arc::new(AllowAll),
        settings,
    )
    .await;
    let project = analyzed_project(&h).await;

    let handle = h.runner.start_curriculum(project.id, StartOptions::default()).await.unwrap();
    handle.task.await.unwrap();

    let job = load_job(&h, &handle.job).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.usage, TokenUsage::new(40, 80), "outline plus three batches");
    assert_eq!(h.backend.call_count(), 4);
    assert_eq!(h.backend.max_in_flight(), 3);

    let modules = db::curricula::list_modules(&h.pool, project.id).await.unwrap();
    assert_eq!(modules.len(), 6);
    for module in &modules {
        assert_eq!(
            module.content[0].content.to_lowercase(),
            format!("about {}", module.title.to_lowercase()),
            "{}",
            module.title
        );
        let expected = if module.tech_binding == "Tailwind" {
            MatchTier::Normalized
        } else {
            MatchTier::Exact
        };
        assert_eq!(module.resolution_tier, Some(expected), "{}", module.title);
    }
}
