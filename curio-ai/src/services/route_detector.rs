//! Route table detection from file-system routing conventions
//!
//! Recognizes `page`, `route`, `layout` and `middleware` files with JS/TS
//! extensions. Route paths are derived from the file location: known
//! prefixes (`src/`, `app/`) and the file name are stripped, and
//! parenthesized grouping segments are removed.

use crate::models::{Route, RouteType, SnapshotFile};
use once_cell::sync::Lazy;
use regex::Regex;

const ROUTE_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs"];

pub const HTTP_VERBS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

static VERB_HANDLER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^\s*export\s+(?:async\s+)?(?:function\s+|(?:const|let|var)\s+)(GET|POST|PUT|PATCH|DELETE|HEAD|OPTIONS)\b",
    )
    .unwrap()
});

/// Route type of a special file, `None` for ordinary files
pub fn route_type_for(path: &str) -> Option<RouteType> {
    let name = super::file_classifier::basename(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if !ROUTE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
        return None;
    }

    match stem {
        "page" => Some(RouteType::Page),
        "route" => Some(RouteType::Api),
        "layout" => Some(RouteType::Layout),
        "middleware" => Some(RouteType::Middleware),
        _ => None,
    }
}

/// Derive the URL path served by a special file
pub fn derive_route_path(path: &str) -> String {
    let mut rest = path.trim_start_matches("./").replace('\\', "/");
    for prefix in ["src/", "app/"] {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped.to_string();
        }
    }

    let directory = match rest.rsplit_once('/') {
        Some((dir, _file)) => dir,
        None => "",
    };

    let segments: Vec<&str> = directory
        .split('/')
        .filter(|s| !s.is_empty())
        .filter(|s| !(s.starts_with('(') && s.ends_with(')')))
        .collect();

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Declared HTTP verb handlers, in canonical verb order
pub fn detect_methods(content: &str) -> Vec<String> {
    let found: Vec<&str> = VERB_HANDLER_RE
        .captures_iter(content)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    HTTP_VERBS
        .iter()
        .filter(|verb| found.contains(verb))
        .map(|verb| verb.to_string())
        .collect()
}

/// Detect routes, sorted by type precedence then path
pub fn detect_routes(files: &[SnapshotFile]) -> Vec<Route> {
    let mut routes: Vec<Route> = files
        .iter()
        .filter_map(|file| {
            let route_type = route_type_for(&file.path)?;
            let methods = match (route_type, &file.content) {
                (RouteType::Api, Some(content)) => detect_methods(content),
                _ => Vec::new(),
            };
            Some(Route {
                path: derive_route_path(&file.path),
                route_type,
                file: file.path.clone(),
                methods,
            })
        })
        .collect();

    routes.sort_by(|a, b| {
        a.route_type
            .cmp(&b.route_type)
            .then_with(|| a.path.cmp(&b.path))
            .then_with(|| a.file.cmp(&b.file))
    });
    routes
}
