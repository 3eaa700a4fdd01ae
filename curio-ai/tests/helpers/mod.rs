//! Test helper utilities
//!
//! A scripted in-process generation backend, a static credential store and a
//! wired-up [`JobRunner`] over an in-memory database.

#![allow(dead_code)]

use async_trait::async_trait;
use curio_ai::backends::{
    BackendError, BackendProvider, CompletionRequest, CompletionResponse, GenerationBackend,
};
use curio_ai::config::{AllowAll, CredentialStore, UsageGate};
use curio_ai::db;
use curio_ai::models::{Project, Snapshot, SnapshotFile, TokenUsage};
use curio_ai::services::ModelResolver;
use curio_ai::workflow::{JobRunner, RunnerSettings};
use curio_common::events::EventBus;
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Usage reported by every scripted reply
pub const CALL_USAGE: TokenUsage = TokenUsage {
    input_tokens: 10,
    output_tokens: 20,
};

/// One scripted backend reply
pub enum Step {
    Reply(String),
    Fail(BackendError),
    Panic,
    Hang,
    /// Reply once the gate is notified
    Gated(Arc<Notify>, String),
    /// Reply with the first entry whose needle appears in the user prompt,
    /// after a short delay so concurrent calls overlap
    Routed(Vec<(String, String)>),
}

pub fn reply(value: impl Into<String>) -> Step {
    Step::Reply(value.into())
}

const ROUTED_DELAY: Duration = Duration::from_millis(25);

/// Backend that replays a fixed script and records every request
///
/// An exhausted script answers `EmptyResponse`.
pub struct ScriptedBackend {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<CompletionRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    /// Highest number of calls observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, BackendError> {
        let prompt: String = request.messages.iter().map(|m| m.content.as_str()).collect();
        self.requests.lock().unwrap().push(request);
        let step = self.steps.lock().unwrap().pop_front();

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let result = self.play(step, &prompt).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl ScriptedBackend {
    async fn play(&self, step: Option<Step>, prompt: &str) -> Result<CompletionResponse, BackendError> {
        match step {
            Some(Step::Reply(text)) => Ok(CompletionResponse {
                text,
                usage: CALL_USAGE,
            }),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Panic) => panic!("scripted backend panic"),
            Some(Step::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(BackendError::EmptyResponse {
                    backend: "anthropic".into(),
                })
            }
            Some(Step::Gated(gate, text)) => {
                gate.notified().await;
                Ok(CompletionResponse {
                    text,
                    usage: CALL_USAGE,
                })
            }
            Some(Step::Routed(routes)) => {
                tokio::time::sleep(ROUTED_DELAY).await;
                routes
                    .into_iter()
                    .find(|(needle, _)| prompt.contains(needle.as_str()))
                    .map(|(_, text)| CompletionResponse {
                        text,
                        usage: CALL_USAGE,
                    })
                    .ok_or_else(|| BackendError::EmptyResponse {
                        backend: "anthropic".into(),
                    })
            }
            None => Err(BackendError::EmptyResponse {
                backend: "anthropic".into(),
            }),
        }
    }
}

/// Hands out the same scripted backend for every job
pub struct ScriptedProvider(pub Arc<ScriptedBackend>);

impl BackendProvider for ScriptedProvider {
    fn create(
        &self,
        backend: &str,
        _api_key: &str,
        _model: &str,
    ) -> Result<Arc<dyn GenerationBackend>, BackendError> {
        if !curio_ai::backends::SUPPORTED_BACKENDS.iter().any(|b| *b == backend) {
            return Err(BackendError::UnknownBackend(backend.to_string()));
        }
        Ok(self.0.clone())
    }
}

/// Fixed keys by backend, ignoring the owner
#[derive(Default)]
pub struct StaticCredentials(pub HashMap<String, String>);

impl StaticCredentials {
    pub fn with_key(backend: &str) -> Self {
        Self(HashMap::from([(backend.to_string(), "sk-test".to_string())]))
    }
}

#[async_trait]
impl CredentialStore for StaticCredentials {
    async fn api_key(&self, _owner: &str, backend: &str) -> curio_common::Result<Option<String>> {
        Ok(self.0.get(backend).cloned())
    }
}

/// Gate that refuses every run
pub struct DenyAll;

#[async_trait]
impl UsageGate for DenyAll {
    async fn may_start(&self, _owner: &str) -> curio_common::Result<bool> {
        Ok(false)
    }
}

pub struct Harness {
    pub pool: SqlitePool,
    pub events: EventBus,
    pub backend: Arc<ScriptedBackend>,
    pub runner: JobRunner,
}

pub fn test_settings() -> RunnerSettings {
    RunnerSettings {
        default_backend: "anthropic".into(),
        job_timeout: Duration::from_secs(30),
        content_concurrency: 1,
        max_output_tokens: 2048,
        hint_cache_ttl: Duration::from_secs(60),
    }
}

pub async fn harness(steps: Vec<Step>) -> Harness {
    harness_with(
        steps,
        StaticCredentials::with_key("anthropic"),
        Arc::new(AllowAll),
        test_settings(),
    )
    .await
}

pub async fn harness_with(
    steps: Vec<Step>,
    credentials: StaticCredentials,
    usage_gate: Arc<dyn UsageGate>,
    settings: RunnerSettings,
) -> Harness {
    let pool = curio_common::db::init_memory_database().await.unwrap();
    let events = EventBus::new(64);
    let backend = ScriptedBackend::new(steps);

    let runner = JobRunner::new(
        pool.clone(),
        events.clone(),
        Arc::new(credentials),
        usage_gate,
        Arc::new(ScriptedProvider(backend.clone())),
        ModelResolver::new(pool.clone(), BTreeMap::new(), Duration::from_secs(60)),
        settings,
    );

    Harness {
        pool,
        events,
        backend,
        runner,
    }
}

/// Small Next.js project used by most scenarios
pub fn nextjs_files() -> Vec<SnapshotFile> {
    vec![
        SnapshotFile::new(
            "package.json",
            Some(r#"{"name":"shop","dependencies":{"next":"14.1.0","react":"18.2.0"},"scripts":{"dev":"next dev"}}"#),
        ),
        SnapshotFile::new(
            "src/app/page.tsx",
            Some("import React from 'react';\nexport default function Page() { return <main/>; }\n"),
        ),
    ]
}

pub async fn seed_project(pool: &SqlitePool, files: Vec<SnapshotFile>) -> Project {
    let project = Project::new("alice", "shop");
    db::projects::insert_project(pool, &project).await.unwrap();
    db::snapshots::store_snapshot(pool, project.id, &Snapshot::new(files))
        .await
        .unwrap();
    project
}
