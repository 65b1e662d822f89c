//! Answer-engine provider adapters and the fallback chain that drives them.

pub mod adapters;
pub mod chain;
pub mod error;
pub mod parse;
pub mod registry;
pub mod request;
mod retry;

pub use adapters::{
    DirectLlmAdapter, HttpSettings, ProviderAdapter, ScrapeProxyAdapter, StructuredSearchAdapter,
};
pub use chain::{AttemptRecord, ChainEntry, ChainFailure, ChainSuccess, FallbackChain};
pub use error::ProviderError;
pub use registry::ProviderRegistry;
pub use request::{ParsedAnswer, ProviderRequest, ProviderResponse};
pub use retry::backoff_delay;
