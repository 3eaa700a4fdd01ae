//! Two-phase curriculum generation
//!
//! Phase 1 asks for an outline only. Outline modules are grouped by their
//! technology binding and Phase 2 asks for lesson content one group at a
//! time. Content is matched back to the outline by [`reconcile`]; a module
//! with no matched content, or matched to an item without sections, is kept
//! with an empty body and reported as missing.

use super::reconcile::{normalize_title, reconcile};
use super::JobError;
use crate::backends::{parse_payload, prompts, BackendError, ChatMessage, GenerationBackend};
use crate::models::{
    ContentBatchItem, ContentSection, CurriculumStructure, LearnerProfile, LearningModule,
    OutlineModule, Project, Snapshot, TechnologyRecord, TokenUsage,
};
use crate::validators::{validate_content_items, validate_outline};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

const WORDS_PER_MINUTE: usize = 200;
const MIN_MODULE_MINUTES: u32 = 10;
const EMPTY_MODULE_MINUTES: u32 = 30;
const MAX_EXCERPT_FILES: usize = 4;
const MAX_EXCERPT_CHARS: usize = 2000;
const UNBOUND_BATCH: &str = "general";

#[derive(Debug, Clone, Copy)]
pub struct CurriculumSettings {
    pub max_output_tokens: u32,
    /// Phase-2 calls in flight at once (1 = sequential)
    pub concurrency: usize,
}

/// Outline modules sharing one technology binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechnologyBatch {
    /// Binding as first written in the outline
    pub technology: String,
    /// Indices into the outline's modules, in outline order
    pub modules: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct CurriculumOutcome {
    pub structure: CurriculumStructure,
    pub modules: Vec<LearningModule>,
    /// Titles of modules persisted without content
    pub missing: Vec<String>,
    pub usage: TokenUsage,
}

/// Group by case- and whitespace-normalized binding, first appearance first
pub fn group_by_binding(modules: &[OutlineModule]) -> Vec<TechnologyBatch> {
    let mut batches: Vec<(String, TechnologyBatch)> = Vec::new();

    for (index, module) in modules.iter().enumerate() {
        let display = if module.tech_binding.trim().is_empty() {
            UNBOUND_BATCH
        } else {
            module.tech_binding.trim()
        };
        let key = normalize_title(display);

        match batches.iter_mut().find(|(k, _)| *k == key) {
            Some((_, batch)) => batch.modules.push(index),
            None => batches.push((
                key,
                TechnologyBatch {
                    technology: display.to_string(),
                    modules: vec![index],
                },
            )),
        }
    }

    batches.into_iter().map(|(_, batch)| batch).collect()
}

/// Outline estimate when present, otherwise derived from content length
pub fn estimate_minutes(outline_estimate: Option<u32>, content: &[ContentSection]) -> u32 {
    if let Some(minutes) = outline_estimate {
        return minutes;
    }
    if content.is_empty() {
        return EMPTY_MODULE_MINUTES;
    }

    let words: usize = content.iter().map(|s| s.content.split_whitespace().count()).sum();
    let minutes = words.div_ceil(WORDS_PER_MINUTE) as u32;
    minutes.max(MIN_MODULE_MINUTES)
}

/// Source excerpts for the files a batch's modules reference
pub fn source_excerpts(snapshot: &Snapshot, modules: &[&OutlineModule]) -> Vec<(String, String)> {
    let mut excerpts: Vec<(String, String)> = Vec::new();

    for wanted in modules.iter().flat_map(|m| m.relevant_files.iter()) {
        if excerpts.len() >= MAX_EXCERPT_FILES {
            break;
        }
        let wanted = wanted.trim_start_matches("./");
        let Some(file) = snapshot
            .files()
            .iter()
            .find(|f| f.path == wanted || f.path.ends_with(&format!("/{}", wanted)))
        else {
            continue;
        };
        let Some(content) = &file.content else {
            continue;
        };
        if excerpts.iter().any(|(path, _)| *path == file.path) {
            continue;
        }
        excerpts.push((file.path.clone(), content.chars().take(MAX_EXCERPT_CHARS).collect()));
    }

    excerpts
}

/// Phase 1
pub async fn generate_outline(
    backend: &dyn GenerationBackend,
    project: &Project,
    technologies: &[TechnologyRecord],
    profile: &LearnerProfile,
    max_output_tokens: u32,
) -> Result<(CurriculumStructure, TokenUsage), JobError> {
    let prompt = prompts::outline_prompt(
        &project.name,
        project.architecture_summary.as_deref(),
        technologies,
        profile,
    );

    let reply = backend
        .chat(
            vec![ChatMessage::user(prompt)],
            Some(prompts::CURRICULUM_SYSTEM_PROMPT),
            Some(max_output_tokens),
        )
        .await?;

    let payload = parse_payload(&reply.content)?;
    let structure = validate_outline(&payload)?;

    info!(
        project_id = %project.id,
        modules = structure.modules.len(),
        "Curriculum outline generated"
    );
    Ok((structure, reply.usage))
}

/// Phase 2 for one batch
///
/// An unparseable or empty reply is zero items. Transport, status and
/// timeout errors propagate.
pub async fn generate_batch_content(
    backend: &dyn GenerationBackend,
    batch: &TechnologyBatch,
    modules: &[&OutlineModule],
    snapshot: &Snapshot,
    max_output_tokens: u32,
) -> Result<(Vec<ContentBatchItem>, TokenUsage), BackendError> {
    let excerpts = source_excerpts(snapshot, modules);
    let owned: Vec<OutlineModule> = modules.iter().map(|m| (*m).clone()).collect();
    let prompt = prompts::content_prompt(&batch.technology, &owned, &excerpts);

    let reply = match backend
        .chat(
            vec![ChatMessage::user(prompt)],
            Some(prompts::CURRICULUM_SYSTEM_PROMPT),
            Some(max_output_tokens),
        )
        .await
    {
        Ok(reply) => reply,
        Err(BackendError::EmptyResponse { backend }) => {
            warn!(technology = %batch.technology, backend = %backend, "Empty content reply; treating as zero items");
            return Ok((Vec::new(), TokenUsage::default()));
        }
        Err(e) => return Err(e),
    };

    let items = match parse_payload(&reply.content) {
        Ok(payload) => validate_content_items(&payload),
        Err(e) => {
            warn!(technology = %batch.technology, error = %e, "Unparseable content reply; treating as zero items");
            Vec::new()
        }
    };

    debug!(
        technology = %batch.technology,
        modules = modules.len(),
        items = items.len(),
        "Content batch generated"
    );
    Ok((items, reply.usage))
}

pub async fn run_curriculum(
    backend: &dyn GenerationBackend,
    project: &Project,
    technologies: &[TechnologyRecord],
    snapshot: &Snapshot,
    profile: &LearnerProfile,
    settings: CurriculumSettings,
) -> Result<CurriculumOutcome, JobError> {
    let (structure, mut usage) =
        generate_outline(backend, project, technologies, profile, settings.max_output_tokens).await?;

    let batches = group_by_binding(&structure.modules);
    let concurrency = settings.concurrency.max(1);

    info!(
        project_id = %project.id,
        batches = batches.len(),
        concurrency,
        "Generating module content"
    );

    // `buffered` keeps replies in batch order regardless of completion order
    let replies: Vec<Result<(Vec<ContentBatchItem>, TokenUsage), BackendError>> =
        stream::iter(
            batches
                .iter()
                .map(|batch| {
                    let modules: Vec<&OutlineModule> =
                        batch.modules.iter().map(|&i| &structure.modules[i]).collect();
                    async move {
                        generate_batch_content(backend, batch, &modules, snapshot, settings.max_output_tokens)
                            .await
                    }
                })
                .collect::<Vec<_>>(),
        )
            .buffered(concurrency)
            .collect()
            .await;

    let mut content: Vec<Option<(Vec<ContentSection>, crate::models::MatchTier)>> =
        vec![None; structure.modules.len()];

    for (batch, reply) in batches.iter().zip(replies) {
        let (items, batch_usage) = reply?;
        usage += batch_usage;

        let titles: Vec<&str> = batch
            .modules
            .iter()
            .map(|&i| structure.modules[i].title.as_str())
            .collect();
        let resolutions = reconcile(&titles, &items);

        for (&module_index, resolution) in batch.modules.iter().zip(&resolutions) {
            debug!(
                module = %structure.modules[module_index].title,
                tier = resolution.tier.map(|t| t.as_str()).unwrap_or("unresolved"),
                "Reconciled module"
            );
            let (Some(item), Some(tier)) = (resolution.item, resolution.tier) else {
                continue;
            };
            if items[item].sections.is_empty() {
                warn!(
                    module = %structure.modules[module_index].title,
                    tier = tier.as_str(),
                    "Matched content item has no usable sections"
                );
                continue;
            }
            content[module_index] = Some((items[item].sections.clone(), tier));
        }
    }

    let now = Utc::now();
    let mut missing = Vec::new();
    let modules: Vec<LearningModule> = structure
        .modules
        .iter()
        .zip(content)
        .enumerate()
        .map(|(position, (outline, resolved))| {
            let (sections, tier) = match resolved {
                Some((sections, tier)) => (sections, Some(tier)),
                None => {
                    missing.push(outline.title.clone());
                    (Vec::new(), None)
                }
            };
            LearningModule {
                id: Uuid::new_v4(),
                project_id: project.id,
                position: position as u32,
                title: outline.title.clone(),
                description: outline.description.clone(),
                module_type: outline.module_type.clone(),
                tech_binding: outline.tech_binding.clone(),
                estimated_minutes: estimate_minutes(outline.estimated_minutes, &sections),
                content: sections,
                resolution_tier: tier,
                created_at: now,
            }
        })
        .collect();

    if !missing.is_empty() {
        warn!(
            project_id = %project.id,
            missing = missing.len(),
            total = modules.len(),
            "Some modules have no reconciled content"
        );
    }

    Ok(CurriculumOutcome {
        structure,
        modules,
        missing,
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SnapshotFile;

    fn outline(title: &str, binding: &str) -> OutlineModule {
        OutlineModule {
            title: title.to_string(),
            description: String::new(),
            module_type: "concept".into(),
            tech_binding: binding.to_string(),
            relevant_files: vec![],
            objectives: vec![],
            estimated_minutes: None,
        }
    }

    #[test]
    fn test_grouping_normalizes_binding_and_keeps_first_appearance() {
        let modules = vec![
            outline("a", "React"),
            outline("b", "Prisma"),
            outline("c", " react "),
            outline("d", ""),
            outline("e", "PRISMA"),
        ];

        let batches = group_by_binding(&modules);
        assert_eq!(
            batches,
            vec![
                TechnologyBatch { technology: "React".into(), modules: vec![0, 2] },
                TechnologyBatch { technology: "Prisma".into(), modules: vec![1, 4] },
                TechnologyBatch { technology: UNBOUND_BATCH.into(), modules: vec![3] },
            ]
        );
    }

    #[test]
    fn test_estimate_minutes() {
        assert_eq!(estimate_minutes(Some(45), &[]), 45);
        assert_eq!(estimate_minutes(None, &[]), EMPTY_MODULE_MINUTES);
        assert_eq!(estimate_minutes(None, &[ContentSection::text("short")]), MIN_MODULE_MINUTES);

        let long = "word ".repeat(4001);
        assert_eq!(estimate_minutes(None, &[ContentSection::text(long)]), 21);
    }

    #[test]
    fn test_source_excerpts_match_suffix_and_cap_length() {
        let big = "x".repeat(MAX_EXCERPT_CHARS + 100);
        let snapshot = Snapshot::new(vec![
            SnapshotFile::new("web/src/app/page.tsx", Some(big.as_str())),
            SnapshotFile::new("logo.png", None),
        ]);
        let mut module = outline("m", "Next.js");
        module.relevant_files = vec!["./src/app/page.tsx".into(), "logo.png".into(), "missing.ts".into()];

        let excerpts = source_excerpts(&snapshot, &[&module]);
        assert_eq!(excerpts.len(), 1);
        assert_eq!(excerpts[0].0, "web/src/app/page.tsx");
        assert_eq!(excerpts[0].1.len(), MAX_EXCERPT_CHARS);
    }
}
