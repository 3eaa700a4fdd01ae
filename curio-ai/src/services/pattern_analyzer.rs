//! Architecture pattern detection
//!
//! A fixed table of independent boolean predicates over file presence,
//! dependency names and the concatenated source text. The result is a
//! deduplicated, sorted tag set.

use crate::models::{Dependency, SnapshotFile};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static USE_CLIENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*["']use client["']"#).unwrap());

static USE_SERVER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*["']use server["']"#).unwrap());

static ENCRYPTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:createCipheriv|createDecipheriv|crypto\.subtle|scrypt(?:Sync)?|pbkdf2(?:Sync)?|AES-GCM|aes-256-gcm)\b").unwrap()
});

static WEBSOCKET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bnew\s+WebSocket\s*\(").unwrap());

static ENV_ACCESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:process\.env|import\.meta\.env|os\.environ|std::env::var)\b").unwrap());

/// Inputs shared by every predicate
pub struct PatternContext {
    /// Lower-cased file paths
    paths: Vec<String>,
    /// Lower-cased dependency names
    dependencies: BTreeSet<String>,
    /// Concatenated source text
    source_text: String,
}

impl PatternContext {
    pub fn new(files: &[SnapshotFile], dependencies: &[Dependency]) -> Self {
        let paths = files.iter().map(|f| f.path.to_ascii_lowercase()).collect();
        let dependencies = dependencies
            .iter()
            .map(|d| d.name.to_ascii_lowercase())
            .collect();

        let mut source_text = String::new();
        for file in files {
            if super::file_classifier::language_for(&file.path).is_none() {
                continue;
            }
            if let Some(content) = &file.content {
                source_text.push_str(content);
                source_text.push('\n');
            }
        }

        Self {
            paths,
            dependencies,
            source_text,
        }
    }

    fn has_dep(&self, names: &[&str]) -> bool {
        names.iter().any(|n| self.dependencies.contains(*n))
    }

    fn has_dep_prefix(&self, prefix: &str) -> bool {
        self.dependencies.iter().any(|d| d.starts_with(prefix))
    }

    fn has_file(&self, names: &[&str]) -> bool {
        self.paths.iter().any(|p| {
            let base = super::file_classifier::basename(p);
            names.contains(&base)
        })
    }

    fn has_path_containing(&self, fragment: &str) -> bool {
        self.paths.iter().any(|p| p.contains(fragment))
    }

    fn source_contains(&self, needle: &str) -> bool {
        self.source_text.contains(needle)
    }
}

type Predicate = fn(&PatternContext) -> bool;

/// Tag → predicate
const PATTERNS: &[(&str, Predicate)] = &[
    ("api-routes", |c| {
        c.paths.iter().any(|p| {
            (p.contains("app/api/") && super::route_detector::route_type_for(p).is_some())
                || p.contains("pages/api/")
        })
    }),
    ("authentication", |c| {
        c.has_dep(&[
            "next-auth",
            "@auth/core",
            "@clerk/nextjs",
            "@clerk/clerk-react",
            "passport",
            "lucia",
            "@supabase/auth-helpers-nextjs",
            "@supabase/ssr",
            "firebase-admin",
            "django-allauth",
            "flask-login",
        ]) || c.source_contains("getServerSession(")
    }),
    ("ci-cd", |c| {
        c.has_path_containing(".github/workflows/")
            || c.has_file(&[".gitlab-ci.yml", "jenkinsfile", ".travis.yml"])
            || c.has_path_containing(".circleci/")
    }),
    ("client-components", |c| USE_CLIENT_RE.is_match(&c.source_text)),
    ("containerization", |c| {
        c.paths.iter().any(|p| super::file_classifier::basename(p).starts_with("dockerfile"))
            || c.has_file(&["docker-compose.yml", "docker-compose.yaml", "compose.yml", "compose.yaml"])
    }),
    ("data-fetching", |c| {
        c.has_dep(&["@tanstack/react-query", "swr", "@apollo/client", "urql", "axios"])
    }),
    ("encryption", |c| {
        c.has_dep(&["bcrypt", "bcryptjs", "argon2", "crypto-js", "jose", "cryptography", "ring"])
            || ENCRYPTION_RE.is_match(&c.source_text)
    }),
    ("env-config", |c| {
        c.has_file(&[".env.example", ".env.sample", ".env.template"])
            || c.has_dep(&["dotenv", "python-dotenv", "@t3-oss/env-nextjs"])
            || ENV_ACCESS_RE.is_match(&c.source_text)
    }),
    ("graphql", |c| {
        c.has_dep(&["graphql", "@apollo/server", "apollo-server", "graphql-yoga", "async-graphql"])
            || c.paths.iter().any(|p| p.ends_with(".graphql") || p.ends_with(".gql"))
    }),
    ("i18n", |c| {
        c.has_dep(&["next-intl", "i18next", "react-i18next", "next-i18next", "vue-i18n"])
    }),
    ("middleware", |c| {
        c.paths.iter().any(|p| {
            matches!(
                super::route_detector::route_type_for(p),
                Some(crate::models::RouteType::Middleware)
            )
        })
    }),
    ("monorepo", |c| {
        c.has_file(&["turbo.json", "nx.json", "pnpm-workspace.yaml", "lerna.json"])
            || c.paths.iter().filter(|p| super::file_classifier::basename(p) == "package.json").count() > 1
    }),
    ("orm", |c| {
        c.has_dep(&[
            "prisma",
            "@prisma/client",
            "drizzle-orm",
            "typeorm",
            "sequelize",
            "mongoose",
            "sqlalchemy",
            "diesel",
            "sea-orm",
            "gorm.io/gorm",
        ]) || c.paths.iter().any(|p| p.ends_with("schema.prisma"))
    }),
    ("payments", |c| {
        c.has_dep(&["stripe", "@stripe/stripe-js", "@stripe/react-stripe-js", "@paddle/paddle-js", "@lemonsqueezy/lemonsqueezy.js"])
    }),
    ("realtime", |c| {
        c.has_dep(&["socket.io", "socket.io-client", "ws", "pusher", "pusher-js", "ably", "@supabase/realtime-js"])
            || WEBSOCKET_RE.is_match(&c.source_text)
    }),
    ("server-actions", |c| USE_SERVER_RE.is_match(&c.source_text)),
    ("serverless", |c| {
        c.has_file(&["vercel.json", "netlify.toml", "serverless.yml", "wrangler.toml"])
    }),
    ("state-management", |c| {
        c.has_dep(&["redux", "@reduxjs/toolkit", "zustand", "jotai", "recoil", "mobx", "pinia", "vuex", "xstate"])
    }),
    ("tailwind", |c| {
        c.has_dep(&["tailwindcss"])
            || c.paths.iter().any(|p| super::file_classifier::basename(p).starts_with("tailwind.config"))
    }),
    ("testing", |c| {
        c.has_dep(&["jest", "vitest", "mocha", "@playwright/test", "cypress", "pytest", "@testing-library/react"])
            || c.paths.iter().any(|p| p.contains(".test.") || p.contains(".spec.") || p.contains("__tests__/"))
    }),
    ("trpc", |c| c.has_dep_prefix("@trpc/")),
    ("typescript", |c| {
        c.has_file(&["tsconfig.json"])
            || c.has_dep(&["typescript"])
            || c.paths.iter().any(|p| p.ends_with(".ts") || p.ends_with(".tsx"))
    }),
    ("validation", |c| {
        c.has_dep(&["zod", "yup", "joi", "valibot", "pydantic", "class-validator", "validator"])
    }),
];

/// Detect architecture pattern tags (sorted, deduplicated)
pub fn detect_patterns(files: &[SnapshotFile], dependencies: &[Dependency]) -> Vec<String> {
    let context = PatternContext::new(files, dependencies);
    let tags: BTreeSet<&str> = PATTERNS
        .iter()
        .filter(|(_, predicate)| predicate(&context))
        .map(|(tag, _)| *tag)
        .collect();
    tags.into_iter().map(str::to_string).collect()
}

/// Every tag the detector can produce
pub fn known_tags() -> Vec<&'static str> {
    PATTERNS.iter().map(|(tag, _)| *tag).collect()
}
