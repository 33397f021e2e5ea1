//! llmrota - Rate-limit-aware LLM endpoint selection
//!
//! This library picks which provider API key should take the next LLM call.
//! Credentials are discovered from numbered environment slots, each
//! (provider, key) pair becomes an endpoint with a declared per-minute
//! capacity, and a trailing usage window steers calls away from endpoints
//! that are close to their limit. Making the calls is out of scope: the
//! caller takes the returned parameters to whatever executor it drives.

pub mod config;
pub mod error;
pub mod rota;

pub use config::{Config, Registry};
pub use error::{Error, Result};
pub use rota::{LlmParams, Selector, StatusReport};
