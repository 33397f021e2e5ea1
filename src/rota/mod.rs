//! Endpoint rotation: rate-limit-aware selection across providers and keys.
//!
//! This module decides which endpoint takes the next LLM call based on:
//! - Provider tier (better models first)
//! - Trailing-window usage against declared capacity
//! - Uniform spread across a provider's multiple keys

mod ledger;
mod selector;
mod status;

pub use ledger::UsageLedger;
pub use selector::{LlmParams, Selector, DEFAULT_TEMPERATURE};
pub use status::{EndpointStatus, StatusReport};
