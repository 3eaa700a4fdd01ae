//! Deterministic analysis services
//!
//! Scanner, manifest parsing, digest assembly and hint extraction never call
//! a generative model; identical snapshots give identical results.

pub mod digest_assembler;
pub mod file_classifier;
pub mod hint_extractor;
pub mod import_extractor;
pub mod manifest_parser;
pub mod model_resolver;
pub mod pattern_analyzer;
pub mod route_detector;
pub mod ttl_cache;

pub use digest_assembler::{assemble, build_digest, render_digest};
pub use file_classifier::{classify, FileKind};
pub use hint_extractor::{cross_check, extract_hints, HintCrossCheck};
pub use import_extractor::{extract_imports, top_imported};
pub use manifest_parser::{parse_manifest, ManifestKind, ParsedManifest};
pub use model_resolver::ModelResolver;
pub use pattern_analyzer::detect_patterns;
pub use route_detector::detect_routes;
pub use ttl_cache::TtlCache;
