//! Digest assembly
//!
//! Merges manifest and scanner output into one bounded text document.
//! Assembly is deterministic: identical snapshots render byte-identical
//! documents.

use super::file_classifier::{self, FileKind};
use super::import_extractor::{extract_imports, top_imported};
use super::manifest_parser::{parse_manifest, ManifestKind};
use super::pattern_analyzer::detect_patterns;
use super::route_detector::detect_routes;
use crate::models::{
    ConfigSummary, Dependency, Digest, InstructionExcerpt, RouteType, Snapshot, SnapshotFile,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use tracing::debug;

/// File tree entries rendered before the elision line
pub const FILE_TREE_LIMIT: usize = 200;

/// Most-imported modules listed
pub const TOP_IMPORTS_LIMIT: usize = 15;

/// Characters of an AI-instruction file kept in the digest
pub const INSTRUCTION_EXCERPT_LIMIT: usize = 4000;

/// Dependency → display name, first match wins
const FRAMEWORK_DETECTION: &[(&str, &str)] = &[
    ("next", "Next.js"),
    ("nuxt", "Nuxt"),
    ("@sveltejs/kit", "SvelteKit"),
    ("@remix-run/react", "Remix"),
    ("astro", "Astro"),
    ("gatsby", "Gatsby"),
    ("@angular/core", "Angular"),
    ("expo", "Expo"),
    ("react-native", "React Native"),
    ("svelte", "Svelte"),
    ("vue", "Vue"),
    ("solid-js", "SolidJS"),
    ("react", "React"),
    ("@nestjs/core", "NestJS"),
    ("express", "Express"),
    ("fastify", "Fastify"),
    ("hono", "Hono"),
    ("django", "Django"),
    ("fastapi", "FastAPI"),
    ("flask", "Flask"),
    ("axum", "Axum"),
    ("actix-web", "Actix Web"),
    ("rocket", "Rocket"),
    ("github.com/gin-gonic/gin", "Gin"),
    ("github.com/gofiber/fiber/v2", "Fiber"),
    ("github.com/labstack/echo/v4", "Echo"),
];

/// Lock file → package manager
const LOCK_FILES: &[(&str, &str)] = &[
    ("pnpm-lock.yaml", "pnpm"),
    ("yarn.lock", "yarn"),
    ("bun.lockb", "bun"),
    ("bun.lock", "bun"),
    ("package-lock.json", "npm"),
    ("poetry.lock", "poetry"),
    ("uv.lock", "uv"),
    ("pipfile.lock", "pipenv"),
    ("cargo.lock", "cargo"),
    ("go.sum", "go modules"),
];

/// Scan a snapshot into a structured digest
pub fn build_digest(snapshot: &Snapshot) -> Digest {
    let files = snapshot.files();

    let mut dependencies: BTreeSet<Dependency> = BTreeSet::new();
    let mut scripts: BTreeMap<String, String> = BTreeMap::new();
    let mut manifest_kinds: Vec<ManifestKind> = Vec::new();
    let mut import_edges = Vec::new();
    let mut build_configs = Vec::new();
    let mut language_counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut instruction_excerpt = None;

    for file in files {
        match file_classifier::classify(&file.path) {
            FileKind::Manifest => {
                let Some(content) = file.content.as_deref() else {
                    continue;
                };
                if let Some(parsed) = parse_manifest(&file.path, content) {
                    manifest_kinds.push(parsed.kind);
                    dependencies.extend(parsed.dependencies);
                    for (name, command) in parsed.scripts {
                        scripts.entry(name).or_insert(command);
                    }
                }
            }
            FileKind::Instruction => {
                if instruction_excerpt.is_none() {
                    instruction_excerpt = file.content.as_deref().map(|c| excerpt(&file.path, c));
                }
            }
            FileKind::BuildConfig => build_configs.push(file.path.clone()),
            FileKind::Source => {
                if let Some(language) = file_classifier::language_for(&file.path) {
                    *language_counts.entry(language).or_default() += 1;
                }
                if let Some(content) = file.content.as_deref() {
                    import_edges.extend(extract_imports(&file.path, content));
                }
            }
            FileKind::Other => {}
        }
    }

    let dependencies: Vec<Dependency> = dependencies.into_iter().collect();
    build_configs.sort();

    let config = ConfigSummary {
        framework: detect_framework(&dependencies),
        primary_language: primary_language(&language_counts, &manifest_kinds, &dependencies),
        package_manager: package_manager(files, &manifest_kinds),
        build_configs,
        scripts,
    };

    let mut file_tree: Vec<String> = files.iter().map(|f| f.path.clone()).collect();
    file_tree.sort();

    let digest = Digest {
        routes: detect_routes(files),
        pattern_tags: detect_patterns(files, &dependencies),
        dependencies,
        file_tree,
        import_edges,
        config,
        instruction_excerpt,
    };

    debug!(
        files = files.len(),
        dependencies = digest.dependencies.len(),
        routes = digest.routes.len(),
        patterns = digest.pattern_tags.len(),
        "Digest built"
    );
    digest
}

/// Build and render in one step
pub fn assemble(snapshot: &Snapshot) -> String {
    render_digest(&build_digest(snapshot))
}

fn detect_framework(dependencies: &[Dependency]) -> Option<String> {
    FRAMEWORK_DETECTION
        .iter()
        .find(|(dep, _)| dependencies.iter().any(|d| d.name.eq_ignore_ascii_case(dep)))
        .map(|(_, name)| name.to_string())
}

fn primary_language(
    counts: &BTreeMap<&'static str, usize>,
    manifests: &[ManifestKind],
    dependencies: &[Dependency],
) -> Option<String> {
    // Highest count wins; BTreeMap order makes ties resolve alphabetically
    let mut best: Option<(&str, usize)> = None;
    for (language, count) in counts {
        if best.map_or(true, |(_, c)| *count > c) {
            best = Some((*language, *count));
        }
    }
    if let Some((language, _)) = best {
        return Some(language.to_string());
    }

    let kind = manifests.first()?;
    if *kind == ManifestKind::PackageJson && dependencies.iter().any(|d| d.name == "typescript") {
        return Some("TypeScript".to_string());
    }
    Some(kind.language().to_string())
}

fn package_manager(files: &[SnapshotFile], manifests: &[ManifestKind]) -> Option<String> {
    let names: BTreeSet<String> = files
        .iter()
        .map(|f| file_classifier::basename(&f.path).to_ascii_lowercase())
        .collect();

    LOCK_FILES
        .iter()
        .find(|(lock, _)| names.contains(*lock))
        .map(|(_, manager)| manager.to_string())
        .or_else(|| manifests.first().map(|k| k.default_package_manager().to_string()))
}

fn excerpt(path: &str, content: &str) -> InstructionExcerpt {
    let original_chars = content.chars().count();
    let truncated = original_chars > INSTRUCTION_EXCERPT_LIMIT;
    let text = if truncated {
        content.chars().take(INSTRUCTION_EXCERPT_LIMIT).collect()
    } else {
        content.to_string()
    };
    InstructionExcerpt {
        path: path.to_string(),
        text,
        original_chars,
        truncated,
    }
}

/// Render a digest as a markdown-like document
pub fn render_digest(digest: &Digest) -> String {
    let mut out = String::new();
    out.push_str("# Project Digest\n\n");

    render_dependencies(&mut out, &digest.dependencies);
    render_file_tree(&mut out, &digest.file_tree);

    out.push_str("## Most Imported Modules\n");
    let top = top_imported(&digest.import_edges, TOP_IMPORTS_LIMIT);
    if top.is_empty() {
        out.push_str("(none)\n");
    }
    for (module, count) in top {
        let _ = writeln!(out, "- {} ({})", module, count);
    }
    out.push('\n');

    out.push_str("## Routes\n");
    if digest.routes.is_empty() {
        out.push_str("(none detected)\n");
    }
    let mut current: Option<RouteType> = None;
    for route in &digest.routes {
        if current != Some(route.route_type) {
            let _ = writeln!(out, "### {}", route.route_type.label());
            current = Some(route.route_type);
        }
        if route.methods.is_empty() {
            let _ = writeln!(out, "- {} ({})", route.path, route.file);
        } else {
            let _ = writeln!(out, "- {} [{}] ({})", route.path, route.methods.join(", "), route.file);
        }
    }
    out.push('\n');

    render_config(&mut out, &digest.config);

    out.push_str("## Architecture Patterns\n");
    if digest.pattern_tags.is_empty() {
        out.push_str("(none detected)\n");
    }
    for tag in &digest.pattern_tags {
        let _ = writeln!(out, "- {}", tag);
    }

    if let Some(excerpt) = &digest.instruction_excerpt {
        let _ = write!(out, "\n## AI Instructions ({})\n", excerpt.path);
        out.push_str(&excerpt.text);
        if !excerpt.text.ends_with('\n') {
            out.push('\n');
        }
        if excerpt.truncated {
            let _ = writeln!(
                out,
                "[truncated: showing {} of {} characters]",
                INSTRUCTION_EXCERPT_LIMIT, excerpt.original_chars
            );
        }
    }

    out
}

fn render_dependencies(out: &mut String, dependencies: &[Dependency]) {
    out.push_str("## Dependencies\n");
    for (label, dev) in [("Production", false), ("Development", true)] {
        let group: Vec<&Dependency> = dependencies.iter().filter(|d| d.dev == dev).collect();
        let _ = writeln!(out, "### {} ({})", label, group.len());
        if group.is_empty() {
            out.push_str("(none)\n");
        }
        for dependency in group {
            match &dependency.version {
                Some(version) => {
                    let _ = writeln!(out, "- {}@{}", dependency.name, version);
                }
                None => {
                    let _ = writeln!(out, "- {}", dependency.name);
                }
            }
        }
    }
    out.push('\n');
}

fn render_file_tree(out: &mut String, file_tree: &[String]) {
    let _ = writeln!(out, "## File Tree ({} files)", file_tree.len());
    for path in file_tree.iter().take(FILE_TREE_LIMIT) {
        out.push_str(path);
        out.push('\n');
    }
    if file_tree.len() > FILE_TREE_LIMIT {
        let _ = writeln!(out, "... and {} more files", file_tree.len() - FILE_TREE_LIMIT);
    }
    out.push('\n');
}

fn render_config(out: &mut String, config: &ConfigSummary) {
    out.push_str("## Configuration\n");
    let _ = writeln!(
        out,
        "- Framework: {}",
        config.framework.as_deref().unwrap_or("none detected")
    );
    let _ = writeln!(
        out,
        "- Primary language: {}",
        config.primary_language.as_deref().unwrap_or("unknown")
    );
    let _ = writeln!(
        out,
        "- Package manager: {}",
        config.package_manager.as_deref().unwrap_or("unknown")
    );
    if config.build_configs.is_empty() {
        out.push_str("- Build configs: none\n");
    } else {
        let _ = writeln!(out, "- Build configs: {}", config.build_configs.join(", "));
    }
    if config.scripts.is_empty() {
        out.push_str("- Scripts: none\n");
    } else {
        out.push_str("- Scripts:\n");
        for (name, command) in &config.scripts {
            let _ = writeln!(out, "  - {}: {}", name, command);
        }
    }
    out.push('\n');
}
