//! Deterministic technology hints
//!
//! Static rules over manifests, config files and extensions. Hints are
//! capped at [`HINT_CONFIDENCE_CAP`] and only cross-check generated output;
//! they are never persisted as technology records.

use super::file_classifier::{self, basename};
use super::manifest_parser::parse_manifest;
use crate::models::{Hint, Snapshot, TechCategory, Technology, HINT_CONFIDENCE_CAP};
use std::collections::BTreeMap;
use strsim::normalized_levenshtein;

/// Dependency name → (display name, category)
const KNOWN_DEPENDENCIES: &[(&str, &str, TechCategory)] = &[
    ("next", "Next.js", TechCategory::Framework),
    ("react", "React", TechCategory::Framework),
    ("vue", "Vue", TechCategory::Framework),
    ("nuxt", "Nuxt", TechCategory::Framework),
    ("svelte", "Svelte", TechCategory::Framework),
    ("@sveltejs/kit", "SvelteKit", TechCategory::Framework),
    ("@angular/core", "Angular", TechCategory::Framework),
    ("express", "Express", TechCategory::Framework),
    ("fastify", "Fastify", TechCategory::Framework),
    ("@nestjs/core", "NestJS", TechCategory::Framework),
    ("hono", "Hono", TechCategory::Framework),
    ("django", "Django", TechCategory::Framework),
    ("flask", "Flask", TechCategory::Framework),
    ("fastapi", "FastAPI", TechCategory::Framework),
    ("axum", "Axum", TechCategory::Framework),
    ("actix-web", "Actix Web", TechCategory::Framework),
    ("github.com/gin-gonic/gin", "Gin", TechCategory::Framework),
    ("prisma", "Prisma", TechCategory::Orm),
    ("@prisma/client", "Prisma", TechCategory::Orm),
    ("drizzle-orm", "Drizzle ORM", TechCategory::Orm),
    ("typeorm", "TypeORM", TechCategory::Orm),
    ("sequelize", "Sequelize", TechCategory::Orm),
    ("mongoose", "Mongoose", TechCategory::Orm),
    ("sqlalchemy", "SQLAlchemy", TechCategory::Orm),
    ("diesel", "Diesel", TechCategory::Orm),
    ("gorm.io/gorm", "GORM", TechCategory::Orm),
    ("pg", "PostgreSQL", TechCategory::Database),
    ("postgres", "PostgreSQL", TechCategory::Database),
    ("psycopg2", "PostgreSQL", TechCategory::Database),
    ("mysql2", "MySQL", TechCategory::Database),
    ("mongodb", "MongoDB", TechCategory::Database),
    ("redis", "Redis", TechCategory::Database),
    ("ioredis", "Redis", TechCategory::Database),
    ("better-sqlite3", "SQLite", TechCategory::Database),
    ("sqlx", "SQLx", TechCategory::Library),
    ("tailwindcss", "Tailwind CSS", TechCategory::Styling),
    ("styled-components", "styled-components", TechCategory::Styling),
    ("sass", "Sass", TechCategory::Styling),
    ("@emotion/react", "Emotion", TechCategory::Styling),
    ("jest", "Jest", TechCategory::Testing),
    ("vitest", "Vitest", TechCategory::Testing),
    ("@playwright/test", "Playwright", TechCategory::Testing),
    ("cypress", "Cypress", TechCategory::Testing),
    ("pytest", "pytest", TechCategory::Testing),
    ("typescript", "TypeScript", TechCategory::Language),
    ("vite", "Vite", TechCategory::BuildTool),
    ("webpack", "webpack", TechCategory::BuildTool),
    ("esbuild", "esbuild", TechCategory::BuildTool),
    ("turbo", "Turborepo", TechCategory::BuildTool),
    ("@supabase/supabase-js", "Supabase", TechCategory::Service),
    ("firebase", "Firebase", TechCategory::Service),
    ("stripe", "Stripe", TechCategory::Service),
    ("@clerk/nextjs", "Clerk", TechCategory::Service),
    ("next-auth", "NextAuth.js", TechCategory::Library),
    ("zod", "Zod", TechCategory::Library),
    ("zustand", "Zustand", TechCategory::Library),
    ("@reduxjs/toolkit", "Redux Toolkit", TechCategory::Library),
    ("@tanstack/react-query", "TanStack Query", TechCategory::Library),
    ("tokio", "Tokio", TechCategory::Library),
    ("serde", "Serde", TechCategory::Library),
    ("pydantic", "Pydantic", TechCategory::Library),
];

/// Config file prefix → (display name, category)
const KNOWN_CONFIG_FILES: &[(&str, &str, TechCategory)] = &[
    ("dockerfile", "Docker", TechCategory::Infrastructure),
    ("docker-compose", "Docker", TechCategory::Infrastructure),
    ("tailwind.config", "Tailwind CSS", TechCategory::Styling),
    ("next.config", "Next.js", TechCategory::Framework),
    ("vite.config", "Vite", TechCategory::BuildTool),
    ("tsconfig.json", "TypeScript", TechCategory::Language),
    ("vercel.json", "Vercel", TechCategory::Infrastructure),
    ("netlify.toml", "Netlify", TechCategory::Infrastructure),
    ("wrangler.toml", "Cloudflare Workers", TechCategory::Infrastructure),
    ("schema.prisma", "Prisma", TechCategory::Orm),
];

const PROD_DEPENDENCY_CONFIDENCE: f64 = HINT_CONFIDENCE_CAP;
const DEV_DEPENDENCY_CONFIDENCE: f64 = 0.5;
const CONFIG_FILE_CONFIDENCE: f64 = 0.5;
const LANGUAGE_BASE_CONFIDENCE: f64 = 0.3;

/// Titles at least this similar count as the same technology
const NAME_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Extract hints, sorted by confidence (descending) then name
pub fn extract_hints(snapshot: &Snapshot) -> Vec<Hint> {
    let mut by_key: BTreeMap<String, Hint> = BTreeMap::new();
    let mut language_counts: BTreeMap<&'static str, usize> = BTreeMap::new();

    for file in snapshot.files() {
        if let Some(content) = file.content.as_deref() {
            if let Some(manifest) = parse_manifest(&file.path, content) {
                let source = basename(&file.path).to_string();
                for dependency in &manifest.dependencies {
                    let Some((_, name, category)) = KNOWN_DEPENDENCIES
                        .iter()
                        .find(|(dep, _, _)| dependency.name.eq_ignore_ascii_case(dep))
                    else {
                        continue;
                    };
                    let confidence = if dependency.dev {
                        DEV_DEPENDENCY_CONFIDENCE
                    } else {
                        PROD_DEPENDENCY_CONFIDENCE
                    };
                    let version = dependency
                        .version
                        .as_deref()
                        .map(|v| v.trim_start_matches(['^', '~', '=', '>', '<', ' ']).to_string());
                    merge(
                        &mut by_key,
                        Hint::new(*name, *category, version, confidence, source.clone()),
                    );
                }
            }
        }

        let lower_name = basename(&file.path).to_ascii_lowercase();
        if let Some((_, name, category)) = KNOWN_CONFIG_FILES
            .iter()
            .find(|(prefix, _, _)| lower_name.starts_with(prefix))
        {
            merge(
                &mut by_key,
                Hint::new(
                    *name,
                    *category,
                    None,
                    CONFIG_FILE_CONFIDENCE,
                    format!("file:{}", file.path),
                ),
            );
        }

        if let Some(language) = file_classifier::language_for(&file.path) {
            *language_counts.entry(language).or_default() += 1;
        }
    }

    let total_sources: usize = language_counts.values().sum();
    for (language, count) in language_counts {
        // Share of source files scales the confidence within the cap
        let share = count as f64 / total_sources.max(1) as f64;
        let confidence = LANGUAGE_BASE_CONFIDENCE + share * (HINT_CONFIDENCE_CAP - LANGUAGE_BASE_CONFIDENCE);
        merge(
            &mut by_key,
            Hint::new(
                language,
                TechCategory::Language,
                None,
                confidence,
                format!("extension:{} files", count),
            ),
        );
    }

    let mut hints: Vec<Hint> = by_key.into_values().collect();
    hints.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.name.cmp(&b.name))
    });
    hints
}

/// Keep the strongest hint per name; a version from any source is kept
fn merge(by_key: &mut BTreeMap<String, Hint>, hint: Hint) {
    let key = crate::models::name_key(&hint.name);
    match by_key.get_mut(&key) {
        Some(existing) => {
            if existing.version.is_none() {
                existing.version = hint.version.clone();
            }
            if hint.confidence > existing.confidence {
                existing.confidence = hint.confidence;
                existing.source = hint.source;
            }
        }
        None => {
            by_key.insert(key, hint);
        }
    }
}

/// Agreement between hints and generated technologies
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HintCrossCheck {
    /// Hint names the generated output also reported
    pub confirmed: Vec<String>,
    /// Hints the generated output did not mention
    pub missing: Vec<Hint>,
}

/// Compare hints against validated technologies by fuzzy name match
pub fn cross_check(technologies: &[Technology], hints: &[Hint]) -> HintCrossCheck {
    let mut result = HintCrossCheck::default();

    for hint in hints {
        let hint_key = crate::models::name_key(&hint.name);
        let matched = technologies.iter().any(|t| {
            let tech_key = crate::models::name_key(&t.name);
            tech_key == hint_key || normalized_levenshtein(&tech_key, &hint_key) >= NAME_SIMILARITY_THRESHOLD
        });

        if matched {
            result.confirmed.push(hint.name.clone());
        } else {
            result.missing.push(hint.clone());
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Importance, SnapshotFile};

    fn next_project() -> Snapshot {
        Snapshot::new(vec![
            SnapshotFile::new(
                "package.json",
                Some(r#"{"dependencies":{"next":"^14.1.0","react":"18"},"devDependencies":{"jest":"29"}}"#),
            ),
            SnapshotFile::new("next.config.js", Some("module.exports = {}")),
            SnapshotFile::new("app/page.tsx", Some("")),
            SnapshotFile::new("app/layout.tsx", Some("")),
            SnapshotFile::new("lib/util.ts", Some("")),
        ])
    }

    #[test]
    fn test_hints_never_exceed_cap() {
        for hint in extract_hints(&next_project()) {
            assert!(hint.confidence <= HINT_CONFIDENCE_CAP, "{:?}", hint);
            assert!(hint.confidence >= 0.0);
        }
    }

    #[test]
    fn test_dependency_hints_merge_with_config_hints() {
        let hints = extract_hints(&next_project());
        let next: Vec<_> = hints.iter().filter(|h| h.name == "Next.js").collect();

        assert_eq!(next.len(), 1);
        assert_eq!(next[0].version.as_deref(), Some("14.1.0"));
        assert_eq!(next[0].source, "package.json");

        let jest = hints.iter().find(|h| h.name == "Jest").unwrap();
        assert_eq!(jest.confidence, DEV_DEPENDENCY_CONFIDENCE);
    }

    #[test]
    fn test_language_hints_from_extensions() {
        let hints = extract_hints(&next_project());
        let ts = hints.iter().find(|h| h.name == "TypeScript").unwrap();
        let js = hints.iter().find(|h| h.name == "JavaScript").unwrap();
        assert_eq!(ts.category, TechCategory::Language);
        assert!(ts.confidence > js.confidence);
    }

    #[test]
    fn test_hints_deterministic() {
        assert_eq!(extract_hints(&next_project()), extract_hints(&next_project()));
    }

    #[test]
    fn test_cross_check_fuzzy_match() {
        let technologies = vec![Technology {
            name: "NextJS".to_string(),
            category: TechCategory::Framework,
            version: None,
            confidence: 0.9,
            importance: Importance::Core,
            description: String::new(),
            relationships: Vec::new(),
        }];
        let hints = vec![
            Hint::new("Next.js", TechCategory::Framework, None, 0.6, "package.json"),
            Hint::new("Redis", TechCategory::Database, None, 0.6, "package.json"),
        ];

        let check = cross_check(&technologies, &hints);
        assert_eq!(check.confirmed, vec!["Next.js".to_string()]);
        assert_eq!(check.missing.len(), 1);
        assert_eq!(check.missing[0].name, "Redis");
    }
}
