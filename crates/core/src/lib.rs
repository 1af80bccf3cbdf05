pub mod config;
pub mod domain;
pub mod errors;
pub mod geo;
pub mod market;
pub mod money;
pub mod pipeline;
pub mod scoring;
pub mod store;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::ids::{InvestorId, ListingId, SignalId, TenantId};
pub use errors::{DomainError, LookupError, StoreError, TriageError};
pub use geo::GeoNormalizer;
pub use pipeline::{
    CounterfactualResult, OpportunityResult, OpportunityService, PipelineSettings, SignalTriage,
    SignalsPipeline, SignalsRunResult, SummaryPipeline, SummaryRunResult, TriageOutcome,
};
pub use store::{CrmStore, InMemoryStore, MarketStore};
