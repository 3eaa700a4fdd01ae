//! Prompt text for every generation call

use crate::models::{
    Hint, LearnerProfile, OutlineModule, TechCategory, Technology, TechnologyRecord,
};
use std::fmt::Write;

pub const ANALYSIS_SYSTEM_PROMPT: &str = "You are a senior software architect. \
You identify the technologies a project uses from a structural digest of its source tree. \
You reply with a single JSON object and nothing else.";

pub const CURRICULUM_SYSTEM_PROMPT: &str = "You are an expert technical instructor. \
You design learning paths that teach a developer the exact stack of one real project. \
You reply with JSON only.";

pub const KNOWLEDGE_SYSTEM_PROMPT: &str = "You write concise reference notes about \
software technologies for developers onboarding onto a codebase.";

const DEFAULT_ANALYSIS_INSTRUCTIONS: &str = "Identify every significant technology in this project: \
languages, frameworks, libraries, databases, ORMs, styling, testing tools, build tools, \
infrastructure and external services. Prefer evidence from dependencies and imports over guesses.";

/// Prompt for technology detection
pub fn analysis_prompt(digest: &str, hints: &[Hint], instructions: Option<&str>) -> String {
    let mut prompt = String::with_capacity(digest.len() + 2048);
    prompt.push_str(instructions.unwrap_or(DEFAULT_ANALYSIS_INSTRUCTIONS));
    prompt.push_str("\n\n");

    if !hints.is_empty() {
        prompt.push_str("Static analysis suggests these technologies (low confidence, verify against the digest):\n");
        for hint in hints {
            let _ = write!(prompt, "- {} ({})", hint.name, hint.category.as_str());
            if let Some(version) = &hint.version {
                let _ = write!(prompt, " {}", version);
            }
            prompt.push('\n');
        }
        prompt.push('\n');
    }

    prompt.push_str(digest);
    prompt.push_str("\n\nRespond with JSON of this shape:\n");
    prompt.push_str(
        r#"{"technologies": [{"name": "...", "category": "...", "version": "... or null", "confidence": 0.0, "importance": "core|supporting|peripheral", "description": "...", "relationships": ["..."]}], "architecture_summary": "..."}"#,
    );
    let _ = write!(
        prompt,
        "\nValid categories: {}.",
        TechCategory::ALL
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    prompt
}

/// Phase-1 prompt: outline only, no lesson content
pub fn outline_prompt(
    project_name: &str,
    architecture_summary: Option<&str>,
    technologies: &[TechnologyRecord],
    profile: &LearnerProfile,
) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Design a learning curriculum for the project \"{}\".", project_name);
    if let Some(summary) = architecture_summary {
        let _ = writeln!(prompt, "\nArchitecture: {}", summary);
    }

    prompt.push_str("\nTechnologies in use:\n");
    for record in technologies {
        let tech = &record.technology;
        let _ = writeln!(
            prompt,
            "- {} [{}; {}]{}",
            tech.name,
            tech.category.as_str(),
            tech.importance.as_str(),
            tech.version
                .as_deref()
                .map(|v| format!(" {}", v))
                .unwrap_or_default()
        );
    }

    let _ = writeln!(prompt, "\nLearner experience level: {}", profile.experience_level.as_str());
    if !profile.goals.is_empty() {
        let _ = writeln!(prompt, "Learner goals: {}", profile.goals.join("; "));
    }
    if !profile.focus_technologies.is_empty() {
        let _ = writeln!(
            prompt,
            "Give extra depth to: {}",
            profile.focus_technologies.join(", ")
        );
    }

    prompt.push_str(
        "\nReturn ONLY the outline. Do not write lesson content. Each module teaches one technology \
and names it in tech_binding exactly as listed above.\n",
    );
    prompt.push_str(
        r#"{"title": "...", "description": "...", "difficulty": "beginner|intermediate|advanced", "estimated_hours": 0, "modules": [{"title": "...", "description": "...", "type": "concept|tutorial|exercise|deep_dive", "tech_binding": "...", "relevant_files": ["..."], "objectives": ["..."], "estimated_minutes": 0}]}"#,
    );
    prompt
}

/// Phase-2 prompt for one technology batch
pub fn content_prompt(technology: &str, modules: &[OutlineModule], excerpts: &[(String, String)]) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Write lesson content for these {} modules about {}.",
        modules.len(),
        technology
    );

    for (index, module) in modules.iter().enumerate() {
        let _ = writeln!(prompt, "\n{}. {}", index + 1, module.title);
        let _ = writeln!(prompt, "   {}", module.description);
        if !module.objectives.is_empty() {
            let _ = writeln!(prompt, "   Objectives: {}", module.objectives.join("; "));
        }
    }

    if !excerpts.is_empty() {
        prompt.push_str("\nRelevant source files from the project:\n");
        for (path, content) in excerpts {
            let _ = writeln!(prompt, "\n--- {} ---\n{}", path, content);
        }
    }

    prompt.push_str(
        "\nReturn a JSON array with one item per module, in the same order, reusing each module title verbatim:\n",
    );
    prompt.push_str(
        r#"[{"module_title": "...", "content": [{"type": "text|code|exercise", "title": "...", "content": "...", "language": "..."}]}]"#,
    );
    prompt
}

/// Reference-notes prompt for one newly detected technology
pub fn knowledge_prompt(technology: &Technology, project_name: &str) -> String {
    format!(
        "Write a short reference note (under 300 words) about {}{} as used in the project \"{}\". \
Cover what it is, its core concepts, and the pitfalls a newcomer hits first.",
        technology.name,
        technology
            .version
            .as_deref()
            .map(|v| format!(" {}", v))
            .unwrap_or_default(),
        project_name
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Importance;

    #[test]
    fn test_override_replaces_instructions_but_keeps_digest() {
        let prompt = analysis_prompt("# Project Digest", &[], Some("Only list databases."));
        assert!(prompt.starts_with("Only list databases."));
        assert!(prompt.contains("# Project Digest"));
        assert!(!prompt.contains(DEFAULT_ANALYSIS_INSTRUCTIONS));
    }

    #[test]
    fn test_hints_listed() {
        let hints = vec![Hint::new("React", TechCategory::Framework, Some("18.2.0".into()), 0.6, "package.json")];
        let prompt = analysis_prompt("d", &hints, None);
        assert!(prompt.contains("- React (framework) 18.2.0"));
    }

    #[test]
    fn test_knowledge_prompt_names_version() {
        let tech = Technology {
            name: "Prisma".into(),
            category: TechCategory::Orm,
            version: Some("5.1".into()),
            confidence: 0.9,
            importance: Importance::Core,
            description: String::new(),
            relationships: vec![],
        };
        assert!(knowledge_prompt(&tech, "shop").contains("Prisma 5.1"));
    }
}
