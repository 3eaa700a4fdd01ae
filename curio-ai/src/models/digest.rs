//! Digest structure (scanner output before rendering)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declared dependency from a manifest
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub version: Option<String>,
    /// Development-only (dev, test, build groups)
    pub dev: bool,
}

impl Dependency {
    pub fn new(name: impl Into<String>, version: Option<&str>, dev: bool) -> Self {
        Self {
            name: name.into(),
            version: version
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            dev,
        }
    }
}

/// Classification of an imported module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportKind {
    /// Relative or aliased project path
    Internal,
    /// External package on the framework allow-list
    Framework,
    /// Any other external package
    Library,
}

/// One import/require reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportEdge {
    pub source_file: String,
    /// Package name for external modules, raw specifier for internal ones
    pub module: String,
    pub kind: ImportKind,
}

/// Route kind, declared in display precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteType {
    Middleware,
    Layout,
    Page,
    Api,
}

impl RouteType {
    pub fn label(&self) -> &'static str {
        match self {
            RouteType::Middleware => "Middleware",
            RouteType::Layout => "Layouts",
            RouteType::Page => "Pages",
            RouteType::Api => "API Routes",
        }
    }
}

/// Route derived from a special file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub path: String,
    pub route_type: RouteType,
    pub file: String,
    /// Declared HTTP verb handlers (API routes)
    pub methods: Vec<String>,
}

/// Project configuration summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub framework: Option<String>,
    pub primary_language: Option<String>,
    pub package_manager: Option<String>,
    pub build_configs: Vec<String>,
    pub scripts: BTreeMap<String, String>,
}

/// Size-capped excerpt of an AI-instruction file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionExcerpt {
    pub path: String,
    pub text: String,
    pub original_chars: usize,
    pub truncated: bool,
}

/// Structured digest of a snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Digest {
    pub dependencies: Vec<Dependency>,
    pub file_tree: Vec<String>,
    pub import_edges: Vec<ImportEdge>,
    pub routes: Vec<Route>,
    pub config: ConfigSummary,
    pub pattern_tags: Vec<String>,
    pub instruction_excerpt: Option<InstructionExcerpt>,
}
