//! Dependency manifest parsers
//!
//! Parsing is tolerant: malformed input yields an empty dependency list and
//! an empty script map (logged at `warn`), never an error. A single bad
//! entry inside an otherwise valid manifest is skipped.

use crate::models::Dependency;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use toml::Value as TomlValue;
use tracing::warn;

/// Supported manifest formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    PackageJson,
    RequirementsTxt,
    PyprojectToml,
    CargoToml,
    GoMod,
}

impl ManifestKind {
    /// Detect the manifest format from a path's file name
    pub fn detect(path: &str) -> Option<Self> {
        let name = super::file_classifier::basename(path).to_ascii_lowercase();
        match name.as_str() {
            "package.json" => Some(ManifestKind::PackageJson),
            "pyproject.toml" => Some(ManifestKind::PyprojectToml),
            "cargo.toml" => Some(ManifestKind::CargoToml),
            "go.mod" => Some(ManifestKind::GoMod),
            n if n.starts_with("requirements") && n.ends_with(".txt") => {
                Some(ManifestKind::RequirementsTxt)
            }
            _ => None,
        }
    }

    /// Language implied by the manifest
    pub fn language(&self) -> &'static str {
        match self {
            ManifestKind::PackageJson => "JavaScript",
            ManifestKind::RequirementsTxt | ManifestKind::PyprojectToml => "Python",
            ManifestKind::CargoToml => "Rust",
            ManifestKind::GoMod => "Go",
        }
    }

    /// Package manager implied by the manifest when no lock file says otherwise
    pub fn default_package_manager(&self) -> &'static str {
        match self {
            ManifestKind::PackageJson => "npm",
            ManifestKind::RequirementsTxt | ManifestKind::PyprojectToml => "pip",
            ManifestKind::CargoToml => "cargo",
            ManifestKind::GoMod => "go modules",
        }
    }
}

/// Parse result of one manifest
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedManifest {
    pub kind: ManifestKind,
    pub path: String,
    pub dependencies: Vec<Dependency>,
    pub scripts: BTreeMap<String, String>,
}

/// Parse `content` if `path` names a manifest; `None` for other files
pub fn parse_manifest(path: &str, content: &str) -> Option<ParsedManifest> {
    let kind = ManifestKind::detect(path)?;

    let (dependencies, scripts) = match kind {
        ManifestKind::PackageJson => parse_package_json(path, content),
        ManifestKind::RequirementsTxt => {
            let name = super::file_classifier::basename(path).to_ascii_lowercase();
            let dev = name.contains("dev") || name.contains("test");
            (parse_requirements_txt(content, dev), BTreeMap::new())
        }
        ManifestKind::PyprojectToml => parse_pyproject_toml(path, content),
        ManifestKind::CargoToml => (parse_cargo_toml(path, content), BTreeMap::new()),
        ManifestKind::GoMod => (parse_go_mod(content), BTreeMap::new()),
    };

    Some(ParsedManifest {
        kind,
        path: path.to_string(),
        dependencies,
        scripts,
    })
}

/// `package.json`: dependency tables plus the `scripts` map
pub fn parse_package_json(
    path: &str,
    content: &str,
) -> (Vec<Dependency>, BTreeMap<String, String>) {
    let root: JsonValue = match serde_json::from_str(content) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path, "Malformed package.json ignored: {}", e);
            return (Vec::new(), BTreeMap::new());
        }
    };

    let mut dependencies = Vec::new();
    for (table, dev) in [
        ("dependencies", false),
        ("peerDependencies", false),
        ("optionalDependencies", false),
        ("devDependencies", true),
    ] {
        if let Some(entries) = root.get(table).and_then(JsonValue::as_object) {
            for (name, version) in entries {
                dependencies.push(Dependency::new(name.as_str(), version.as_str(), dev));
            }
        }
    }

    let scripts = root
        .get("scripts")
        .and_then(JsonValue::as_object)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|(name, cmd)| cmd.as_str().map(|c| (name.clone(), c.to_string())))
                .collect()
        })
        .unwrap_or_default();

    (dependencies, scripts)
}

/// `requirements*.txt`: one requirement per line
pub fn parse_requirements_txt(content: &str, dev: bool) -> Vec<Dependency> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() || line.starts_with('-') || line.contains("://") {
                return None;
            }
            let (name, version) = split_python_requirement(line)?;
            Some(Dependency::new(name, version, dev))
        })
        .collect()
}

/// Split a PEP 508 requirement into name and version specifier
fn split_python_requirement(requirement: &str) -> Option<(&str, Option<&str>)> {
    let requirement = requirement.split(';').next().unwrap_or("").trim();
    let end = requirement
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'))
        .unwrap_or(requirement.len());
    let name = &requirement[..end];
    if name.is_empty() {
        return None;
    }

    let rest = requirement[end..].trim();
    // Drop extras such as `uvicorn[standard]`
    let rest = match rest.strip_prefix('[') {
        Some(after) => after.split_once(']').map(|(_, r)| r.trim()).unwrap_or(""),
        None => rest,
    };
    let version = rest.trim_start_matches(['=', '>', '<', '~', '!', ' ']);
    Some((name, (!version.is_empty()).then_some(version)))
}

/// `pyproject.toml`: PEP 621 tables and Poetry tables
pub fn parse_pyproject_toml(
    path: &str,
    content: &str,
) -> (Vec<Dependency>, BTreeMap<String, String>) {
    let root: TomlValue = match toml::from_str(content) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path, "Malformed pyproject.toml ignored: {}", e);
            return (Vec::new(), BTreeMap::new());
        }
    };

    let mut dependencies = Vec::new();
    let mut scripts = BTreeMap::new();

    if let Some(project) = root.get("project") {
        for requirement in toml_str_array(project.get("dependencies")) {
            if let Some((name, version)) = split_python_requirement(requirement) {
                dependencies.push(Dependency::new(name, version, false));
            }
        }
        if let Some(groups) = project.get("optional-dependencies").and_then(TomlValue::as_table) {
            for group in groups.values() {
                for requirement in toml_str_array(Some(group)) {
                    if let Some((name, version)) = split_python_requirement(requirement) {
                        dependencies.push(Dependency::new(name, version, true));
                    }
                }
            }
        }
        collect_toml_scripts(project.get("scripts"), &mut scripts);
    }

    if let Some(poetry) = root.get("tool").and_then(|t| t.get("poetry")) {
        collect_toml_dependency_table(poetry.get("dependencies"), false, &mut dependencies);
        collect_toml_dependency_table(poetry.get("dev-dependencies"), true, &mut dependencies);
        if let Some(groups) = poetry.get("group").and_then(TomlValue::as_table) {
            for group in groups.values() {
                collect_toml_dependency_table(group.get("dependencies"), true, &mut dependencies);
            }
        }
        collect_toml_scripts(poetry.get("scripts"), &mut scripts);
    }

    dependencies.retain(|d| !d.name.eq_ignore_ascii_case("python"));
    (dependencies, scripts)
}

/// `Cargo.toml`: dependency tables, including workspace dependencies
pub fn parse_cargo_toml(path: &str, content: &str) -> Vec<Dependency> {
    let root: TomlValue = match toml::from_str(content) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path, "Malformed Cargo.toml ignored: {}", e);
            return Vec::new();
        }
    };

    let mut dependencies = Vec::new();
    collect_toml_dependency_table(root.get("dependencies"), false, &mut dependencies);
    collect_toml_dependency_table(root.get("dev-dependencies"), true, &mut dependencies);
    collect_toml_dependency_table(root.get("build-dependencies"), true, &mut dependencies);
    if let Some(workspace) = root.get("workspace") {
        collect_toml_dependency_table(workspace.get("dependencies"), false, &mut dependencies);
    }
    dependencies
}

/// `go.mod`: single-line and block `require` directives
pub fn parse_go_mod(content: &str) -> Vec<Dependency> {
    let mut dependencies = Vec::new();
    let mut in_block = false;

    for line in content.lines() {
        let line = line.split("//").next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        if in_block {
            if line == ")" {
                in_block = false;
            } else {
                push_go_requirement(line, &mut dependencies);
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("require") {
            let rest = rest.trim();
            if rest == "(" {
                in_block = true;
            } else {
                push_go_requirement(rest, &mut dependencies);
            }
        }
    }

    dependencies
}

fn push_go_requirement(line: &str, dependencies: &mut Vec<Dependency>) {
    let mut parts = line.split_whitespace();
    if let Some(module) = parts.next() {
        dependencies.push(Dependency::new(module, parts.next(), false));
    }
}

fn toml_str_array(value: Option<&TomlValue>) -> impl Iterator<Item = &str> {
    value
        .and_then(TomlValue::as_array)
        .into_iter()
        .flatten()
        .filter_map(TomlValue::as_str)
}

/// `name = "1.0"` or `name = { version = "1.0", ... }`
fn collect_toml_dependency_table(
    table: Option<&TomlValue>,
    dev: bool,
    dependencies: &mut Vec<Dependency>,
) {
    let Some(table) = table.and_then(TomlValue::as_table) else {
        return;
    };

    for (name, spec) in table {
        let version = match spec {
            TomlValue::String(v) => Some(v.as_str()),
            TomlValue::Table(t) => t.get("version").and_then(TomlValue::as_str),
            _ => None,
        };
        dependencies.push(Dependency::new(name.as_str(), version, dev));
    }
}

fn collect_toml_scripts(table: Option<&TomlValue>, scripts: &mut BTreeMap<String, String>) {
    if let Some(table) = table.and_then(TomlValue::as_table) {
        for (name, target) in table {
            if let Some(target) = target.as_str() {
                scripts.insert(name.clone(), target.to_string());
            }
        }
    }
}
