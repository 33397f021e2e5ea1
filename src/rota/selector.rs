//! Usage-aware endpoint selection.

use crate::config::{ApiKey, Config, Endpoint, Limits, Provider, Registry};
use crate::error::{Error, Result};
use rand::seq::SliceRandom;

use super::ledger::UsageLedger;
use super::status::StatusReport;

/// Sampling temperature handed out with every checkout. Kept low so
/// repeated agent steps stay consistent.
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Everything a task executor needs to call the selected endpoint.
#[derive(Debug, Clone)]
pub struct LlmParams {
    /// Derived endpoint name, for correlating with ledger and status output.
    pub endpoint: String,
    pub provider: Provider,
    pub model: String,
    pub api_key: ApiKey,
    /// Alternate base address, when the provider is not at its SDK default.
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl From<&Endpoint> for LlmParams {
    fn from(endpoint: &Endpoint) -> Self {
        Self {
            endpoint: endpoint.name.clone(),
            provider: endpoint.provider,
            model: endpoint.model.clone(),
            api_key: endpoint.api_key.clone(),
            base_url: endpoint.base_url.clone(),
            max_tokens: endpoint.max_tokens,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Selector over a fixed endpoint registry and a live usage ledger.
///
/// Construct one per process and share it by reference; the registry is
/// immutable and the ledger synchronizes internally, so `&self` methods are
/// safe from any thread.
pub struct Selector {
    registry: Registry,
    ledger: UsageLedger,
    limits: Limits,
}

impl Selector {
    /// Create a selector over a prebuilt registry.
    pub fn new(registry: Registry, limits: Limits) -> Self {
        let ledger = UsageLedger::new(limits.window());
        Self {
            registry,
            ledger,
            limits,
        }
    }

    /// Discover credentials from the process environment and wrap the
    /// resulting registry.
    pub fn from_env(config: &Config) -> Self {
        Self::new(Registry::from_env(config), config.limits.clone())
    }

    /// The underlying registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The underlying usage ledger.
    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    /// Whether the endpoint's trailing usage is at or past the early-warning
    /// margin of its declared capacity.
    pub fn is_near_limit(&self, endpoint: &Endpoint) -> bool {
        self.ledger.is_near_limit(
            &endpoint.name,
            endpoint.capacity_per_minute,
            self.limits.near_limit_ratio,
        )
    }

    /// Pick the best endpoint for the next call.
    ///
    /// Returns `None` only for an empty registry. A non-empty registry
    /// always yields an endpoint, even with every window saturated.
    pub fn select_best(&self) -> Option<&Endpoint> {
        if self.registry.is_empty() {
            return None;
        }

        // Walk tiers best-first; a lower tier is only reached once every
        // endpoint above it is near limit.
        for provider in Provider::TIER_ORDER {
            let candidates: Vec<&Endpoint> = self
                .registry
                .iter()
                .filter(|e| e.provider == provider && !self.is_near_limit(e))
                .collect();

            // Uniform choice spreads load across a provider's keys instead
            // of hammering the first one.
            if let Some(&endpoint) = candidates.choose(&mut rand::thread_rng()) {
                tracing::debug!(
                    endpoint = %endpoint.name,
                    provider = %provider,
                    usage = self.ledger.usage_count(&endpoint.name),
                    "Selected endpoint"
                );
                return Some(endpoint);
            }
        }

        // Everything is near its limit: hand out the least used endpoint
        // rather than refuse service. Ties go to registry order.
        let least_used = self
            .registry
            .iter()
            .enumerate()
            .min_by_key(|(idx, endpoint)| (self.ledger.usage_count(&endpoint.name), *idx))
            .map(|(_, endpoint)| endpoint);

        if let Some(endpoint) = least_used {
            tracing::warn!(
                endpoint = %endpoint.name,
                usage = self.ledger.usage_count(&endpoint.name),
                "All endpoints near limit - falling back to least used"
            );
        }

        least_used
    }

    /// Select an endpoint, record the usage, and hand back call parameters.
    ///
    /// The selected key is also published through the provider's executor
    /// env var, the side channel SDK-driven executors read credentials
    /// from. Fails only when the registry is empty; retrying after a failed
    /// upstream call is the caller's job.
    pub fn checkout(&self) -> Result<LlmParams> {
        let endpoint = self.select_best().ok_or(Error::NoEndpoints)?;

        self.ledger.record(&endpoint.name);

        unsafe {
            std::env::set_var(
                endpoint.provider.executor_env_var(),
                endpoint.api_key.expose_secret(),
            )
        };

        tracing::info!(
            endpoint = %endpoint.name,
            provider = %endpoint.provider,
            model = %endpoint.model,
            usage = self.ledger.usage_count(&endpoint.name),
            "Checked out endpoint"
        );

        Ok(LlmParams::from(endpoint))
    }

    /// Snapshot usage and near-limit state for every endpoint.
    ///
    /// Read-only apart from the ledger's lazy pruning.
    pub fn status(&self) -> StatusReport {
        StatusReport::collect(&self.registry, &self.ledger, &self.limits)
    }
}
