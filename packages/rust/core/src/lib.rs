//! Research pipeline for Dossier.
//!
//! This crate sequences query templating, search execution, model-directed
//! refinement, identifier resolution and report synthesis into one run
//! (see [`pipeline::ResearchPipeline::research`]).

pub mod aggregate;
pub mod identifier;
pub mod pipeline;
pub mod planner;
pub mod synthesis;
pub mod templates;
pub mod tier;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregate::ResultAggregator;
pub use identifier::IdentifierExtractor;
pub use pipeline::{ProgressReporter, ResearchPipeline, SilentProgress};
pub use planner::FollowUpQueryPlanner;
pub use synthesis::ReportSynthesizer;
pub use templates::QueryTemplateGenerator;
pub use tier::{PhasePlan, TierPolicy};
