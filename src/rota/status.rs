//! Operator-facing status snapshots.

use serde::Serialize;

use crate::config::{Limits, Provider, Registry};

use super::ledger::{at_margin, UsageLedger};

/// Point-in-time view of one endpoint's usage.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointStatus {
    pub name: String,
    pub provider: Provider,
    pub model: String,
    pub usage_in_window: usize,
    pub capacity_per_minute: u32,
    pub near_limit: bool,
    /// Usage over declared capacity, one decimal place ("12.5%").
    pub utilization: String,
}

/// Registry-wide status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub total_endpoints: usize,
    pub endpoints: Vec<EndpointStatus>,
}

impl StatusReport {
    /// Snapshot current usage for every endpoint in the registry.
    ///
    /// Each row derives its near-limit flag from the same usage read it
    /// reports, so a row can never show a count that contradicts its flag.
    /// Read-only apart from the ledger's lazy pruning.
    pub fn collect(registry: &Registry, ledger: &UsageLedger, limits: &Limits) -> Self {
        let endpoints: Vec<EndpointStatus> = registry
            .iter()
            .map(|endpoint| {
                let usage = ledger.usage_count(&endpoint.name);
                EndpointStatus {
                    name: endpoint.name.clone(),
                    provider: endpoint.provider,
                    model: endpoint.model.clone(),
                    usage_in_window: usage,
                    capacity_per_minute: endpoint.capacity_per_minute,
                    near_limit: at_margin(
                        usage,
                        endpoint.capacity_per_minute,
                        limits.near_limit_ratio,
                    ),
                    utilization: format_utilization(usage, endpoint.capacity_per_minute),
                }
            })
            .collect();

        Self {
            total_endpoints: endpoints.len(),
            endpoints,
        }
    }
}

/// Usage over declared capacity, one decimal place. Zero-capacity endpoints
/// render as fully utilized, matching their always-near-limit margin.
fn format_utilization(usage: usize, capacity: u32) -> String {
    if capacity == 0 {
        return "100.0%".to_string();
    }
    format!("{:.1}%", usage as f64 / capacity as f64 * 100.0)
}
