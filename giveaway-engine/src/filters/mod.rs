//! Filters: registry, availability resolution, configuration and evaluation

pub mod availability;
pub mod config;
pub mod evaluator;
pub mod registry;

pub use availability::{resolve_availability, resolve_filter, FilterAvailability, UnavailableReason};
pub use config::FilterConfiguration;
pub use evaluator::{
    evaluate_participant, EvaluationContext, EvaluationOutcome, Evaluator, ParticipantVerdict,
    QualificationReport,
};
pub use registry::{FilterCategory, FilterId, FilterSpec, FILTER_REGISTRY};
