//! Configuration for llmrota: providers, credentials, endpoints, tunables.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Token cap applied per call unless a provider override says otherwise.
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Root configuration structure.
///
/// Everything has a built-in default, so `Config::default()` (or an empty
/// TOML file) reproduces the stock behavior: a 60-second usage window, the
/// 80% near-limit margin, and the standard model/capacity table for each
/// provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Tunables for the trailing usage window.
///
/// The window length and the near-limit margin are the knobs of the
/// rate-limit heuristic. They are deliberately approximate: the selector
/// still hands out near-limit endpoints when nothing better exists.
#[derive(Debug, Clone, Deserialize)]
pub struct Limits {
    /// Length of the trailing usage window, in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Fraction of declared capacity at which an endpoint counts as
    /// near-limit (0.8 = early warning at 80% of capacity).
    #[serde(default = "default_near_limit_ratio")]
    pub near_limit_ratio: f64,
}

fn default_window_secs() -> u64 {
    60
}

fn default_near_limit_ratio() -> f64 {
    0.8
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            near_limit_ratio: default_near_limit_ratio(),
        }
    }
}

impl Limits {
    /// The trailing window as a `Duration`.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Per-provider override tables (`[providers.groq]` etc. in TOML).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub groq: ProviderOverrides,
    #[serde(default)]
    pub openai: ProviderOverrides,
    #[serde(default)]
    pub gemini: ProviderOverrides,
    #[serde(default)]
    pub anthropic: ProviderOverrides,
    #[serde(default)]
    pub kimi: ProviderOverrides,
}

impl ProvidersConfig {
    fn overrides(&self, provider: Provider) -> &ProviderOverrides {
        match provider {
            Provider::Groq => &self.groq,
            Provider::OpenAI => &self.openai,
            Provider::Gemini => &self.gemini,
            Provider::Anthropic => &self.anthropic,
            Provider::Kimi => &self.kimi,
        }
    }
}

/// Optional per-provider overrides for the built-in defaults.
///
/// Unset fields fall through to the provider's builtins; see
/// [`Config::profile`] for the merged view.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderOverrides {
    /// Model identifier handed to the task executor.
    pub model: Option<String>,
    /// Declared calls accepted per rolling window.
    pub capacity_per_minute: Option<u32>,
    /// Token cap per call.
    pub max_tokens: Option<u32>,
    /// Upper bound on numbered credential slots scanned for this provider.
    pub slots: Option<u32>,
    /// Alternate base address for providers not served at their SDK default.
    pub base_url: Option<String>,
}

/// Effective per-provider parameters: built-in defaults merged with any
/// configured overrides.
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    pub model: String,
    pub capacity_per_minute: u32,
    pub max_tokens: u32,
    pub slots: u32,
    pub base_url: Option<String>,
}

/// The supported model providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Groq,
    OpenAI,
    Gemini,
    Anthropic,
    Kimi,
}

impl Provider {
    /// Every provider in credential discovery order. Registry insertion
    /// follows this order, which makes it the tie-break order for the
    /// saturated fallback in selection.
    pub const DISCOVERY_ORDER: [Provider; 5] = [
        Provider::Groq,
        Provider::OpenAI,
        Provider::Gemini,
        Provider::Anthropic,
        Provider::Kimi,
    ];

    /// Tier preference for selection, best first. A lower tier is only
    /// considered once every higher tier is near its limit.
    pub const TIER_ORDER: [Provider; 5] = [
        Provider::OpenAI,
        Provider::Gemini,
        Provider::Anthropic,
        Provider::Groq,
        Provider::Kimi,
    ];

    /// Lowercase tag, as serialized in status payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Groq => "groq",
            Provider::OpenAI => "openai",
            Provider::Gemini => "gemini",
            Provider::Anthropic => "anthropic",
            Provider::Kimi => "kimi",
        }
    }

    /// Capitalized tag used in derived endpoint names (`Groq-1`).
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Groq => "Groq",
            Provider::OpenAI => "OpenAI",
            Provider::Gemini => "Gemini",
            Provider::Anthropic => "Anthropic",
            Provider::Kimi => "Kimi",
        }
    }

    /// Unnumbered primary credential variable for this provider. Numbered
    /// alternates append `_{slot}`; see [`slot_env_var`].
    pub fn primary_env_var(&self) -> &'static str {
        match self {
            Provider::Groq => "GROQ_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::Kimi => "KIMI_API_KEY",
        }
    }

    /// Credential variable the task executor reads at call time. Matches
    /// the primary variable except for kimi, whose SDK expects the
    /// Moonshot name.
    pub fn executor_env_var(&self) -> &'static str {
        match self {
            Provider::Kimi => "MOONSHOT_API_KEY",
            other => other.primary_env_var(),
        }
    }

    /// Built-in model identifier. [`Config::profile`] gives the effective
    /// value after overrides.
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Groq => "groq/llama-3.1-8b-instant",
            Provider::OpenAI => "gpt-4o-mini",
            Provider::Gemini => "gemini/gemma-3n-e2b-it",
            Provider::Anthropic => "claude-3-haiku-20240307",
            Provider::Kimi => "moonshot-v1-8k",
        }
    }

    /// Built-in declared capacity (calls per rolling window).
    pub fn default_capacity(&self) -> u32 {
        match self {
            Provider::Groq => 6000,
            Provider::OpenAI => 30000,
            Provider::Gemini => 15000,
            Provider::Anthropic => 10000,
            Provider::Kimi => 5000,
        }
    }

    /// Built-in bound on numbered credential slots.
    pub fn default_slots(&self) -> u32 {
        match self {
            Provider::Groq => 10,
            _ => 5,
        }
    }

    /// Built-in alternate base address, where the provider has one.
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Provider::Kimi => Some("https://api.moonshot.cn/v1"),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// API key wrapper that redacts in Debug/Display/Serialize and zeroizes on
/// drop.
///
/// The inner `SecretString` keeps the raw value out of logs and serialized
/// payloads; it is only reachable via `.expose_secret()`, so every read of
/// the actual key is auditable with a grep.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Access the raw key value.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Serialize for ApiKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for ApiKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(|s| ApiKey(SecretString::from(s)))
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        ApiKey(SecretString::from(s))
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        ApiKey(SecretString::from(s))
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::parse_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.window_secs == 0 {
            return Err(ConfigError::Validation(
                "limits.window_secs must be at least 1".to_string(),
            ));
        }

        let ratio = self.limits.near_limit_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(ConfigError::Validation(format!(
                "limits.near_limit_ratio must be in (0, 1], got {}",
                ratio
            )));
        }

        for provider in Provider::DISCOVERY_ORDER {
            let o = self.providers.overrides(provider);
            if matches!(&o.model, Some(m) if m.trim().is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "Provider '{}' override has empty model",
                    provider
                )));
            }
            if matches!(&o.base_url, Some(u) if u.trim().is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "Provider '{}' override has empty base_url",
                    provider
                )));
            }
            if o.capacity_per_minute == Some(0) {
                return Err(ConfigError::Validation(format!(
                    "Provider '{}' override has zero capacity_per_minute",
                    provider
                )));
            }
            if o.slots == Some(0) {
                return Err(ConfigError::Validation(format!(
                    "Provider '{}' override has zero slots",
                    provider
                )));
            }
            if o.max_tokens == Some(0) {
                return Err(ConfigError::Validation(format!(
                    "Provider '{}' override has zero max_tokens",
                    provider
                )));
            }
        }

        Ok(())
    }

    /// Effective parameters for one provider: built-in defaults merged with
    /// any overrides from `[providers.<tag>]`.
    pub fn profile(&self, provider: Provider) -> ProviderProfile {
        let o = self.providers.overrides(provider);
        ProviderProfile {
            model: o
                .model
                .clone()
                .unwrap_or_else(|| provider.default_model().to_string()),
            capacity_per_minute: o
                .capacity_per_minute
                .unwrap_or_else(|| provider.default_capacity()),
            max_tokens: o.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            slots: o.slots.unwrap_or_else(|| provider.default_slots()),
            base_url: o
                .base_url
                .clone()
                .or_else(|| provider.default_base_url().map(str::to_string)),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// One discovered credential: the provider it belongs to and the env slot it
/// came from.
///
/// Registry construction maps over a list of these, so tests and embedders
/// can inject credentials without touching the process environment.
#[derive(Debug, Clone)]
pub struct CredentialKey {
    pub provider: Provider,
    /// 1-based env slot the key was found in (1 = unnumbered primary).
    pub slot: u32,
    pub api_key: ApiKey,
}

/// Environment variable name for a provider's credential slot.
///
/// Slot 1 is the unnumbered primary variable; higher slots append the slot
/// number: `GROQ_API_KEY`, `GROQ_API_KEY_2`, ... `GROQ_API_KEY_10`.
pub fn slot_env_var(provider: Provider, slot: u32) -> String {
    if slot <= 1 {
        provider.primary_env_var().to_string()
    } else {
        format!("{}_{}", provider.primary_env_var(), slot)
    }
}

/// Scan every provider's credential slots through a custom lookup function.
///
/// The closure-based design makes discovery testable without touching global
/// env state. Providers are visited in discovery order, slots from 1 up to
/// the provider's effective slot bound. Slots whose value is missing or
/// blank after trimming are skipped without error. Purely configuration
/// parsing -- no network calls, no key validation against the provider.
pub fn discover_credentials_with<F>(config: &Config, lookup: F) -> Vec<CredentialKey>
where
    F: Fn(&str) -> Option<String>,
{
    let mut keys = Vec::new();

    for provider in Provider::DISCOVERY_ORDER {
        let slots = config.profile(provider).slots;
        for slot in 1..=slots {
            let var = slot_env_var(provider, slot);
            if let Some(value) = lookup(&var) {
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }
                keys.push(CredentialKey {
                    provider,
                    slot,
                    api_key: ApiKey::from(value),
                });
            }
        }
    }

    keys
}

/// Scan the real process environment for credentials.
pub fn discover_credentials(config: &Config) -> Vec<CredentialKey> {
    discover_credentials_with(config, |name| std::env::var(name).ok())
}

/// A single credentialed, rate-limited route to a model provider.
///
/// Immutable once constructed. Mutable usage state lives in the ledger,
/// keyed by `name`.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Derived display name, `{Provider}-{n}` with `n` the 1-based position
    /// among the provider's discovered keys.
    pub name: String,
    pub provider: Provider,
    /// Model identifier passed through to the task executor.
    pub model: String,
    pub api_key: ApiKey,
    /// Alternate base address, for providers not served at their SDK
    /// default host.
    pub base_url: Option<String>,
    /// Token cap per call.
    pub max_tokens: u32,
    /// Declared calls accepted per rolling window.
    pub capacity_per_minute: u32,
}

/// The full set of configured endpoints, in discovery order.
///
/// Immutable after construction and safe to share by reference across
/// request threads. Insertion order is meaningful: it is the tie-break
/// order when every endpoint is saturated.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    endpoints: Vec<Endpoint>,
}

impl Registry {
    /// Build a registry from explicit endpoints.
    ///
    /// Mainly for embedders and tests that want full control; the usual
    /// entry points are [`Registry::from_credentials`] and
    /// [`Registry::from_env`].
    pub fn from_endpoints(endpoints: Vec<Endpoint>) -> Self {
        if endpoints.is_empty() {
            tracing::warn!("No LLM credentials configured - selection will refuse all checkouts");
        } else {
            tracing::info!(endpoints = endpoints.len(), "endpoint registry built");
        }
        Self { endpoints }
    }

    /// Build a registry from a discovered credential list.
    ///
    /// Each credential yields one endpoint taking model, capacity, token cap
    /// and base URL from the provider's effective profile. Names number each
    /// provider's keys in discovery order, so a gap in credential slots never
    /// leaves a gap in names: keys in `GROQ_API_KEY` and `GROQ_API_KEY_3`
    /// come out as `Groq-1` and `Groq-2`.
    ///
    /// An empty credential list is not an error: the registry is built
    /// empty, a warning is logged, and the caller decides whether to
    /// proceed.
    pub fn from_credentials(keys: Vec<CredentialKey>, config: &Config) -> Self {
        let mut endpoints = Vec::with_capacity(keys.len());
        let mut counts: HashMap<Provider, u32> = HashMap::new();

        for key in keys {
            let profile = config.profile(key.provider);
            let ordinal = counts.entry(key.provider).or_insert(0);
            *ordinal += 1;
            let name = format!("{}-{}", key.provider.display_name(), ordinal);

            tracing::debug!(
                endpoint = %name,
                provider = %key.provider,
                model = %profile.model,
                slot = key.slot,
                "registered endpoint"
            );

            endpoints.push(Endpoint {
                name,
                provider: key.provider,
                model: profile.model,
                api_key: key.api_key,
                base_url: profile.base_url,
                max_tokens: profile.max_tokens,
                capacity_per_minute: profile.capacity_per_minute,
            });
        }

        Self::from_endpoints(endpoints)
    }

    /// Build a registry by scanning the process environment.
    pub fn from_env(config: &Config) -> Self {
        Self::from_credentials(discover_credentials(config), config)
    }

    /// Number of configured endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// True when no credentials were discovered.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Iterate endpoints in insertion (discovery) order.
    pub fn iter(&self) -> std::slice::Iter<'_, Endpoint> {
        self.endpoints.iter()
    }

    /// Look up an endpoint by derived name.
    pub fn get(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = Config::parse_str("").unwrap();
        assert_eq!(config.limits.window_secs, 60);
        assert_eq!(config.limits.near_limit_ratio, 0.8);
        assert_eq!(config.profile(Provider::Groq).capacity_per_minute, 6000);
    }

    #[test]
    fn test_parse_limits() {
        let toml = r#"
            [limits]
            window_secs = 30
            near_limit_ratio = 0.5
        "#;

        let config = Config::parse_str(toml).unwrap();
        assert_eq!(config.limits.window_secs, 30);
        assert_eq!(config.limits.near_limit_ratio, 0.5);
        assert_eq!(config.limits.window(), Duration::from_secs(30));
    }

    #[test]
    fn test_parse_provider_overrides() {
        let toml = r#"
            [providers.groq]
            model = "groq/llama-3.3-70b-versatile"
            capacity_per_minute = 100
            slots = 3

            [providers.kimi]
            base_url = "https://api.moonshot.ai/v1"
        "#;

        let config = Config::parse_str(toml).unwrap();

        let groq = config.profile(Provider::Groq);
        assert_eq!(groq.model, "groq/llama-3.3-70b-versatile");
        assert_eq!(groq.capacity_per_minute, 100);
        assert_eq!(groq.slots, 3);
        // Unset fields keep builtins
        assert_eq!(groq.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(groq.base_url, None);

        let kimi = config.profile(Provider::Kimi);
        assert_eq!(kimi.base_url.as_deref(), Some("https://api.moonshot.ai/v1"));
        assert_eq!(kimi.model, "moonshot-v1-8k");
    }

    #[test]
    fn test_default_profiles_match_builtins() {
        let config = Config::default();

        for provider in Provider::DISCOVERY_ORDER {
            let profile = config.profile(provider);
            assert_eq!(profile.model, provider.default_model());
            assert_eq!(profile.capacity_per_minute, provider.default_capacity());
            assert_eq!(profile.slots, provider.default_slots());
            assert_eq!(profile.max_tokens, DEFAULT_MAX_TOKENS);
            assert_eq!(profile.base_url.as_deref(), provider.default_base_url());
        }
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let toml = r#"
            [limits]
            window_secs = 0
        "#;

        let result = Config::parse_str(toml);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_range_ratio() {
        for bad in ["near_limit_ratio = 0.0", "near_limit_ratio = 1.5"] {
            let toml = format!("[limits]\n{}\n", bad);
            let result = Config::parse_str(&toml);
            assert!(
                matches!(result, Err(ConfigError::Validation(_))),
                "expected validation error for '{}'",
                bad
            );
        }
    }

    #[test]
    fn test_validate_rejects_empty_model_override() {
        let toml = r#"
            [providers.openai]
            model = "  "
        "#;

        let result = Config::parse_str(toml);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("openai"), "error should name the provider");
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let toml = r#"
            [providers.gemini]
            capacity_per_minute = 0
        "#;

        let result = Config::parse_str(toml);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // ── ApiKey redaction ──

    #[test]
    fn test_api_key_debug_redaction() {
        let key = ApiKey::from("gsk-super-secret");
        let debug_output = format!("{:?}", key);
        assert_eq!(debug_output, "[REDACTED]");
        assert!(!debug_output.contains("super-secret"));
    }

    #[test]
    fn test_api_key_display_redaction() {
        let key = ApiKey::from("gsk-super-secret");
        assert_eq!(format!("{}", key), "[REDACTED]");
    }

    #[test]
    fn test_api_key_serialize_redaction() {
        let key = ApiKey::from("sk-real-value");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"[REDACTED]\"");
    }

    #[test]
    fn test_api_key_expose_secret() {
        let key = ApiKey::from("the-actual-value");
        assert_eq!(key.expose_secret(), "the-actual-value");
    }

    #[test]
    fn test_endpoint_debug_redacts_key() {
        let endpoint = Endpoint {
            name: "Groq-1".to_string(),
            provider: Provider::Groq,
            model: "groq/llama-3.1-8b-instant".to_string(),
            api_key: ApiKey::from("gsk-ABCD1234secret"),
            base_url: None,
            max_tokens: 4000,
            capacity_per_minute: 6000,
        };

        let debug = format!("{:?}", endpoint);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("gsk-ABCD1234secret"));
    }

    // ── Slot naming ──

    #[test]
    fn test_slot_env_var_primary_is_unnumbered() {
        assert_eq!(slot_env_var(Provider::Groq, 1), "GROQ_API_KEY");
        assert_eq!(slot_env_var(Provider::Kimi, 1), "KIMI_API_KEY");
    }

    #[test]
    fn test_slot_env_var_alternates_are_numbered() {
        assert_eq!(slot_env_var(Provider::OpenAI, 2), "OPENAI_API_KEY_2");
        assert_eq!(slot_env_var(Provider::Groq, 10), "GROQ_API_KEY_10");
    }

    #[test]
    fn test_executor_env_var_maps_kimi_to_moonshot() {
        assert_eq!(Provider::Kimi.executor_env_var(), "MOONSHOT_API_KEY");
        assert_eq!(Provider::Groq.executor_env_var(), "GROQ_API_KEY");
    }

    // ── Discovery (lookup-injected, no global env state) ──

    /// Lookup helper backed by a fixed table.
    fn table_lookup<'a>(table: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name: &str| {
            table
                .iter()
                .find(|(var, _)| *var == name)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn test_discover_finds_primary_and_numbered_slots() {
        let table = [
            ("GROQ_API_KEY", "gsk-one"),
            ("GROQ_API_KEY_2", "gsk-two"),
            ("OPENAI_API_KEY", "sk-one"),
        ];

        let keys = discover_credentials_with(&Config::default(), table_lookup(&table));

        assert_eq!(keys.len(), 3);
        assert_eq!(keys[0].provider, Provider::Groq);
        assert_eq!(keys[0].slot, 1);
        assert_eq!(keys[1].slot, 2);
        assert_eq!(keys[2].provider, Provider::OpenAI);
        assert_eq!(keys[2].api_key.expose_secret(), "sk-one");
    }

    #[test]
    fn test_discover_skips_blank_slots() {
        let table = [
            ("GEMINI_API_KEY", "   "),
            ("GEMINI_API_KEY_2", ""),
            ("GEMINI_API_KEY_3", "AIza-real"),
        ];

        let keys = discover_credentials_with(&Config::default(), table_lookup(&table));

        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].slot, 3);
        assert_eq!(keys[0].api_key.expose_secret(), "AIza-real");
    }

    #[test]
    fn test_discover_respects_slot_bound() {
        // Anthropic scans 5 slots by default; slot 6 must be ignored.
        let table = [
            ("ANTHROPIC_API_KEY", "sk-ant-1"),
            ("ANTHROPIC_API_KEY_6", "sk-ant-6"),
        ];

        let keys = discover_credentials_with(&Config::default(), table_lookup(&table));

        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].slot, 1);
    }

    #[test]
    fn test_discover_slot_bound_is_configurable() {
        let toml = r#"
            [providers.anthropic]
            slots = 6
        "#;
        let config = Config::parse_str(toml).unwrap();

        let table = [("ANTHROPIC_API_KEY_6", "sk-ant-6")];
        let keys = discover_credentials_with(&config, table_lookup(&table));

        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].slot, 6);
    }

    #[test]
    fn test_discover_orders_providers_by_discovery_order() {
        let table = [
            ("KIMI_API_KEY", "kimi-key"),
            ("GROQ_API_KEY", "gsk-key"),
            ("ANTHROPIC_API_KEY", "sk-ant-key"),
        ];

        let keys = discover_credentials_with(&Config::default(), table_lookup(&table));

        let providers: Vec<Provider> = keys.iter().map(|k| k.provider).collect();
        assert_eq!(
            providers,
            vec![Provider::Groq, Provider::Anthropic, Provider::Kimi]
        );
    }

    // ── Registry construction ──

    #[test]
    fn test_registry_names_renumber_across_slot_gaps() {
        // Keys in slots 1 and 3 with slot 2 unset: names count the keys
        // that were found, they do not echo the slot numbers.
        let table = [
            ("GROQ_API_KEY", "gsk-one"),
            ("GROQ_API_KEY_3", "gsk-three"),
            ("OPENAI_API_KEY", "sk-one"),
        ];

        let config = Config::default();
        let keys = discover_credentials_with(&config, table_lookup(&table));
        let registry = Registry::from_credentials(keys, &config);

        let names: Vec<&str> = registry.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Groq-1", "Groq-2", "OpenAI-1"]);

        // The renumbered endpoint still carries the gap slot's credential.
        let groq_2 = registry.get("Groq-2").unwrap();
        assert_eq!(groq_2.api_key.expose_secret(), "gsk-three");
    }

    #[test]
    fn test_registry_numbering_is_per_provider() {
        // Embedders may hand over an interleaved list; each provider still
        // gets its own 1-based sequence.
        let keys = vec![
            CredentialKey {
                provider: Provider::Groq,
                slot: 1,
                api_key: ApiKey::from("gsk-a"),
            },
            CredentialKey {
                provider: Provider::OpenAI,
                slot: 1,
                api_key: ApiKey::from("sk-a"),
            },
            CredentialKey {
                provider: Provider::Groq,
                slot: 2,
                api_key: ApiKey::from("gsk-b"),
            },
        ];
        let registry = Registry::from_credentials(keys, &Config::default());

        let names: Vec<&str> = registry.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Groq-1", "OpenAI-1", "Groq-2"]);
    }

    #[test]
    fn test_registry_endpoints_take_profile_values() {
        let toml = r#"
            [providers.groq]
            model = "groq/custom"
            capacity_per_minute = 12
            max_tokens = 1024
        "#;
        let config = Config::parse_str(toml).unwrap();

        let keys = vec![CredentialKey {
            provider: Provider::Groq,
            slot: 1,
            api_key: ApiKey::from("gsk-one"),
        }];
        let registry = Registry::from_credentials(keys, &config);

        let endpoint = registry.get("Groq-1").unwrap();
        assert_eq!(endpoint.model, "groq/custom");
        assert_eq!(endpoint.capacity_per_minute, 12);
        assert_eq!(endpoint.max_tokens, 1024);
        assert_eq!(endpoint.base_url, None);
    }

    #[test]
    fn test_registry_kimi_carries_base_url() {
        let config = Config::default();
        let keys = vec![CredentialKey {
            provider: Provider::Kimi,
            slot: 1,
            api_key: ApiKey::from("kimi-key"),
        }];
        let registry = Registry::from_credentials(keys, &config);

        let endpoint = registry.get("Kimi-1").unwrap();
        assert_eq!(
            endpoint.base_url.as_deref(),
            Some("https://api.moonshot.cn/v1")
        );
    }

    #[test]
    fn test_empty_registry_is_valid() {
        let registry = Registry::from_credentials(Vec::new(), &Config::default());
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.get("Groq-1").is_none());
    }
}
