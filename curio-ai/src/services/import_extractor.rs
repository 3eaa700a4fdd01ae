//! Import/require graph extraction
//!
//! Two independent textual patterns: module-style `import`/`export ... from`
//! statements and call-style `require(...)` / dynamic `import(...)`.

use crate::models::{ImportEdge, ImportKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};

static MODULE_IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)^\s*(?:(?:import|export)\s[^'";]*?\bfrom\s*["']([^"'\n]+)["']|import\s*["']([^"'\n]+)["'])"#,
    )
    .unwrap()
});

static CALL_REQUIRE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\b(?:require|import)\s*\(\s*["']([^"'\n]+)["']\s*\)"#).unwrap()
});

/// External packages treated as frameworks rather than plain libraries
pub const FRAMEWORK_PACKAGES: &[&str] = &[
    "react",
    "react-dom",
    "react-native",
    "next",
    "vue",
    "nuxt",
    "svelte",
    "@sveltejs/kit",
    "@angular/core",
    "@remix-run/react",
    "@remix-run/node",
    "astro",
    "solid-js",
    "preact",
    "gatsby",
    "expo",
    "electron",
    "express",
    "fastify",
    "koa",
    "hono",
    "@nestjs/core",
    "@nestjs/common",
];

const INTERNAL_PREFIXES: &[&str] = &["./", "../", "/", "@/", "~/", "#"];

/// Extract import edges from one file, deduplicated in first-seen order
pub fn extract_imports(source_file: &str, content: &str) -> Vec<ImportEdge> {
    let mut seen = HashSet::new();
    let mut edges = Vec::new();

    let module_specs = MODULE_IMPORT_RE
        .captures_iter(content)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)));
    let call_specs = CALL_REQUIRE_RE
        .captures_iter(content)
        .filter_map(|c| c.get(1));

    for spec in module_specs.chain(call_specs) {
        let (module, kind) = classify_module(spec.as_str());
        if module.is_empty() || !seen.insert(module.clone()) {
            continue;
        }
        edges.push(ImportEdge {
            source_file: source_file.to_string(),
            module,
            kind,
        });
    }

    edges
}

/// Classify a module specifier and normalize external ones to a package name
pub fn classify_module(specifier: &str) -> (String, ImportKind) {
    let specifier = specifier.trim();

    if specifier == "." || INTERNAL_PREFIXES.iter().any(|p| specifier.starts_with(p)) {
        return (specifier.to_string(), ImportKind::Internal);
    }

    let package = package_name(specifier);
    let kind = if FRAMEWORK_PACKAGES.contains(&package.as_str()) {
        ImportKind::Framework
    } else {
        ImportKind::Library
    };
    (package, kind)
}

/// `@scope/name/sub` → `@scope/name`, `lodash/fp` → `lodash`, `node:fs` → `fs`
pub fn package_name(specifier: &str) -> String {
    let specifier = specifier.strip_prefix("node:").unwrap_or(specifier);
    let mut segments = specifier.split('/');

    match segments.next() {
        Some(scope) if scope.starts_with('@') => match segments.next() {
            Some(name) if !name.is_empty() => format!("{}/{}", scope, name),
            _ => scope.to_string(),
        },
        Some(first) => first.to_string(),
        None => String::new(),
    }
}

/// Most-imported external modules: count of importing files, descending,
/// ties broken by name
pub fn top_imported(edges: &[ImportEdge], limit: usize) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for edge in edges.iter().filter(|e| e.kind != ImportKind::Internal) {
        *counts.entry(edge.module.as_str()).or_default() += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(module, count)| (module.to_string(), count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(limit);
    ranked
}
