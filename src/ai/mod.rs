//! AI Integration Layer
//!
//! The oracle adapter, the providers behind it, and reply validation.

pub mod oracle;
pub mod provider;
pub mod timeout;
pub mod validation;

pub use oracle::{Oracle, OracleOutcome, OracleReply};
pub use provider::{
    ChainConfig, ChainedProvider, ClaudeCodeProvider, LlmProvider, LlmResponse, OpenAiProvider,
    ProviderChain, ProviderChainBuilder, ProviderConfig, SharedProvider, create_provider,
    provider_from_config,
};
pub use timeout::with_timeout;
pub use validation::{JsonRepairer, RepairOutcome, extract_json_from_response};
