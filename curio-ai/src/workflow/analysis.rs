//! Analysis pipeline: digest, hints, technology detection, enrichment

use super::JobError;
use crate::backends::{prompts, AnalysisResult, ChatMessage, GenerationBackend};
use crate::db;
use crate::models::{Hint, Job, Snapshot, Technology};
use crate::services::{assemble, cross_check, extract_hints, TtlCache};
use chrono::Utc;
use curio_common::events::{CurioEvent, EventBus};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Upper bound on reference notes generated per analysis
pub const ENRICHMENT_LIMIT: usize = 5;

const ENRICHMENT_MAX_TOKENS: u32 = 1024;

/// Rendered digest for the snapshot, from the cache when the fingerprint matches
pub async fn load_or_build_digest(
    pool: &SqlitePool,
    project_id: Uuid,
    snapshot: &Snapshot,
) -> curio_common::Result<String> {
    if let Some(document) = db::digests::load_digest(pool, project_id, snapshot.fingerprint()).await? {
        debug!(project_id = %project_id, "Digest cache hit");
        return Ok(document);
    }

    let document = assemble(snapshot);
    // The digest is an optimization artifact; a failed write only costs a rebuild
    if let Err(e) = db::digests::store_digest(pool, project_id, snapshot.fingerprint(), &document).await {
        warn!(project_id = %project_id, error = %e, "Failed to cache digest");
    }
    Ok(document)
}

/// Hints for the snapshot: cache, then recompute
pub fn hints_for(cache: &TtlCache<String, Vec<Hint>>, snapshot: &Snapshot) -> Vec<Hint> {
    let key = snapshot.fingerprint().to_string();
    if let Some(hints) = cache.get(&key) {
        return hints;
    }
    let hints = extract_hints(snapshot);
    cache.insert(key, hints.clone());
    hints
}

pub async fn run_analysis(
    pool: &SqlitePool,
    hint_cache: &TtlCache<String, Vec<Hint>>,
    backend: &dyn GenerationBackend,
    project_id: Uuid,
    snapshot: &Snapshot,
    prompt_override: Option<&str>,
) -> Result<AnalysisResult, JobError> {
    let digest = load_or_build_digest(pool, project_id, snapshot).await?;
    let hints = hints_for(hint_cache, snapshot);

    info!(
        project_id = %project_id,
        backend = backend.name(),
        model = backend.model(),
        files = snapshot.len(),
        digest_chars = digest.len(),
        hints = hints.len(),
        "Requesting technology analysis"
    );

    let result = backend.analyze(&digest, &hints, prompt_override).await?;

    let check = cross_check(&result.technologies, &hints);
    if !check.missing.is_empty() {
        let missing: Vec<&str> = check.missing.iter().map(|h| h.name.as_str()).collect();
        warn!(
            project_id = %project_id,
            confirmed = check.confirmed.len(),
            missing = ?missing,
            "Analysis did not report some statically detected technologies"
        );
    } else {
        debug!(project_id = %project_id, confirmed = check.confirmed.len(), "All hints confirmed");
    }

    Ok(result)
}

/// Reference notes for newly detected technologies
///
/// Runs after the job is `completed`. Failures are logged and broadcast but
/// never change the job outcome.
pub async fn enrich(
    pool: &SqlitePool,
    events: &EventBus,
    backend: &dyn GenerationBackend,
    job: &Job,
    project_name: &str,
    technologies: &[Technology],
    new_names: &[String],
) {
    let targets = technologies
        .iter()
        .filter(|t| new_names.contains(&t.name))
        .take(ENRICHMENT_LIMIT);

    for technology in targets {
        let outcome = async {
            let reply = backend
                .chat(
                    vec![ChatMessage::user(prompts::knowledge_prompt(technology, project_name))],
                    Some(prompts::KNOWLEDGE_SYSTEM_PROMPT),
                    Some(ENRICHMENT_MAX_TOKENS),
                )
                .await
                .map_err(|e| e.to_string())?;
            db::knowledge::store_knowledge(pool, job.project_id, &technology.name, reply.content.trim())
                .await
                .map_err(|e| e.to_string())
        }
        .await;

        match outcome {
            Ok(()) => debug!(job_id = %job.id, technology = %technology.name, "Stored reference note"),
            Err(message) => {
                warn!(
                    job_id = %job.id,
                    technology = %technology.name,
                    error = %message,
                    "Enrichment failed (job outcome unaffected)"
                );
                events.emit_lossy(CurioEvent::EnrichmentFailed {
                    job_id: job.id,
                    project_id: job.project_id,
                    technology: technology.name.clone(),
                    message,
                    timestamp: Utc::now(),
                });
            }
        }
    }
}
