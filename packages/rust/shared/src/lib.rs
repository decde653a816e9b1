//! Shared types, error model, and configuration for Dossier.
//!
//! This crate is the foundation depended on by all other Dossier crates.
//! It provides:
//! - [`DossierError`]: the unified error type
//! - Domain types ([`Subject`], [`SearchQuery`], [`SearchResultItem`],
//!   [`EvidenceSet`], [`Tier`], [`ResearchReport`])
//! - Configuration ([`AppConfig`], [`SearchProviderConfig`],
//!   [`LanguageModelConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, LanguageModelConfig, LanguageModelSettings, PipelineSettings, SearchProviderConfig,
    SearchSettings, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{DossierError, Result};
pub use types::{
    EvidenceSet, Phase, PhaseSummary, PipelineState, ReportId, ResearchReport, SearchQuery,
    SearchResultItem, Subject, Tier,
};
