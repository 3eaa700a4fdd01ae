//! File classification by name and extension

use super::manifest_parser::ManifestKind;

/// Role of a snapshot file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Dependency manifest (`package.json`, `Cargo.toml`, ...)
    Manifest,
    /// Instructions written for AI assistants (`CLAUDE.md`, `.cursorrules`, ...)
    Instruction,
    /// Build, bundler, container or tooling configuration
    BuildConfig,
    /// Source code
    Source,
    Other,
}

const INSTRUCTION_FILES: &[&str] = &[
    "claude.md",
    "agents.md",
    "gemini.md",
    ".cursorrules",
    ".windsurfrules",
    ".clinerules",
    "copilot-instructions.md",
];

/// Config file stems matched regardless of extension (`next.config.mjs`, ...)
const CONFIG_STEMS: &[&str] = &[
    "next.config",
    "nuxt.config",
    "vite.config",
    "vitest.config",
    "webpack.config",
    "rollup.config",
    "babel.config",
    "jest.config",
    "tailwind.config",
    "postcss.config",
    "svelte.config",
    "astro.config",
    "remix.config",
    "playwright.config",
    "drizzle.config",
    "eslint.config",
];

const CONFIG_FILES: &[&str] = &[
    "tsconfig.json",
    "jsconfig.json",
    "dockerfile",
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
    "makefile",
    "turbo.json",
    "nx.json",
    "vercel.json",
    "netlify.toml",
    "wrangler.toml",
    "pnpm-workspace.yaml",
    "lerna.json",
    ".babelrc",
    ".eslintrc",
    ".eslintrc.json",
    ".eslintrc.js",
    ".prettierrc",
    "build.rs",
    "setup.cfg",
    "tox.ini",
];

/// Extension → language
const SOURCE_LANGUAGES: &[(&str, &str)] = &[
    ("ts", "TypeScript"),
    ("tsx", "TypeScript"),
    ("mts", "TypeScript"),
    ("cts", "TypeScript"),
    ("js", "JavaScript"),
    ("jsx", "JavaScript"),
    ("mjs", "JavaScript"),
    ("cjs", "JavaScript"),
    ("py", "Python"),
    ("rs", "Rust"),
    ("go", "Go"),
    ("java", "Java"),
    ("kt", "Kotlin"),
    ("rb", "Ruby"),
    ("php", "PHP"),
    ("cs", "C#"),
    ("swift", "Swift"),
    ("vue", "Vue"),
    ("svelte", "Svelte"),
    ("astro", "Astro"),
    ("c", "C"),
    ("h", "C"),
    ("cpp", "C++"),
    ("hpp", "C++"),
];

/// Last path segment
pub fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Lower-cased extension without the dot
pub fn extension(path: &str) -> Option<String> {
    let name = basename(path);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => Some(ext.to_ascii_lowercase()),
        _ => None,
    }
}

/// Language of a source file, if its extension is known
pub fn language_for(path: &str) -> Option<&'static str> {
    let ext = extension(path)?;
    SOURCE_LANGUAGES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, language)| *language)
}

pub fn classify(path: &str) -> FileKind {
    if ManifestKind::detect(path).is_some() {
        return FileKind::Manifest;
    }

    let name = basename(path).to_ascii_lowercase();

    if INSTRUCTION_FILES.contains(&name.as_str()) {
        return FileKind::Instruction;
    }

    if is_build_config(path, &name) {
        return FileKind::BuildConfig;
    }

    if language_for(path).is_some() {
        return FileKind::Source;
    }

    FileKind::Other
}

fn is_build_config(path: &str, lower_name: &str) -> bool {
    if CONFIG_FILES.contains(&lower_name) {
        return true;
    }

    if lower_name.starts_with("dockerfile") {
        return true;
    }

    let lower_path = path.to_ascii_lowercase();
    if lower_path.starts_with(".github/workflows/") || lower_name == ".gitlab-ci.yml" {
        return true;
    }

    match lower_name.rsplit_once('.') {
        Some((stem, _)) => CONFIG_STEMS.contains(&stem),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_each_kind() {
        assert_eq!(classify("package.json"), FileKind::Manifest);
        assert_eq!(classify("services/api/Cargo.toml"), FileKind::Manifest);
        assert_eq!(classify("CLAUDE.md"), FileKind::Instruction);
        assert_eq!(classify(".github/copilot-instructions.md"), FileKind::Instruction);
        assert_eq!(classify("next.config.mjs"), FileKind::BuildConfig);
        assert_eq!(classify("Dockerfile"), FileKind::BuildConfig);
        assert_eq!(classify(".github/workflows/ci.yml"), FileKind::BuildConfig);
        assert_eq!(classify("src/app/page.tsx"), FileKind::Source);
        assert_eq!(classify("README.md"), FileKind::Other);
    }

    #[test]
    fn test_language_for() {
        assert_eq!(language_for("a/b.tsx"), Some("TypeScript"));
        assert_eq!(language_for("main.rs"), Some("Rust"));
        assert_eq!(language_for("Makefile"), None);
    }
}
